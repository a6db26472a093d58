/// Inventory item endpoints
///
/// # Endpoints
///
/// - `GET /api/v1/items` - List items (ITEMS_READ)
/// - `POST /api/v1/items` - Create an item (ITEMS_CREATE)
/// - `GET /api/v1/items/:item_id` - Get an item (ITEMS_READ)
/// - `PUT /api/v1/items/:item_id` - Update an item (ITEMS_UPDATE)
/// - `DELETE /api/v1/items/:item_id` - Delete an item (ITEMS_DELETE)

use crate::{
    error::{ApiError, ApiResult},
    extract::{Session, ValidatedJson},
    routes::Pagination,
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Json,
};
use saaskit_shared::{
    auth::{authorization::require_permission, permissions::Permission},
    models::item::{CreateItem, Item, UpdateItem},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Item create request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(range(exclusive_min = 0.0, message = "Price must be greater than 0"))]
    pub price: f64,

    #[serde(default)]
    #[validate(range(min = 0, message = "Quantity must not be negative"))]
    pub quantity: i32,

    pub image_path: Option<String>,
}

/// Item update request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(range(exclusive_min = 0.0, message = "Price must be greater than 0"))]
    pub price: Option<f64>,

    #[validate(range(min = 0, message = "Quantity must not be negative"))]
    pub quantity: Option<i32>,

    pub image_path: Option<String>,
}

fn item_not_found() -> ApiError {
    ApiError::NotFound("Item not found.".to_string())
}

pub async fn list_items(mut session: Session, Query(page): Query<Pagination>) -> ApiResult<Json<Vec<Item>>> {
    let page = page.checked()?;
    require_permission(&mut session.tx, &session.user, Permission::ItemsRead).await?;

    let items = Item::list(&mut session.tx, page.skip, page.limit).await?;
    session.commit().await?;
    Ok(Json(items))
}

/// Create an item in the caller's tenant
///
/// # Errors
///
/// - `403 Forbidden`: Missing ITEMS_CREATE, or a superadmin without a tenant
pub async fn create_item(
    mut session: Session,
    ValidatedJson(req): ValidatedJson<CreateItemRequest>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    require_permission(&mut session.tx, &session.user, Permission::ItemsCreate).await?;
    let tenant_id = session
        .user
        .tenant_id
        .ok_or_else(|| ApiError::Forbidden("Superadmins cannot create items for tenants.".to_string()))?;

    let item = Item::create(
        &mut session.tx,
        CreateItem {
            name: req.name,
            price: req.price,
            quantity: req.quantity,
            image_path: req.image_path,
            tenant_id,
            created_by: session.user.user_id,
        },
    )
    .await?;

    session.commit().await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(mut session: Session, Path(item_id): Path<Uuid>) -> ApiResult<Json<Item>> {
    require_permission(&mut session.tx, &session.user, Permission::ItemsRead).await?;

    let item = Item::find_by_id(&mut session.tx, item_id)
        .await?
        .ok_or_else(item_not_found)?;

    session.commit().await?;
    Ok(Json(item))
}

pub async fn update_item(
    mut session: Session,
    Path(item_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateItemRequest>,
) -> ApiResult<Json<Item>> {
    require_permission(&mut session.tx, &session.user, Permission::ItemsUpdate).await?;

    let item = Item::update(
        &mut session.tx,
        item_id,
        UpdateItem {
            name: req.name,
            price: req.price,
            quantity: req.quantity,
            image_path: req.image_path,
        },
        session.user.user_id,
    )
    .await?
    .ok_or_else(item_not_found)?;

    session.commit().await?;
    Ok(Json(item))
}

pub async fn delete_item(mut session: Session, Path(item_id): Path<Uuid>) -> ApiResult<StatusCode> {
    require_permission(&mut session.tx, &session.user, Permission::ItemsDelete).await?;

    if !Item::delete(&mut session.tx, item_id).await? {
        return Err(item_not_found());
    }

    session.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
