/// Customer endpoints
///
/// Customer emails are unique within a tenant; a duplicate answers 409.
///
/// # Endpoints
///
/// - `GET /api/v1/customers` - List customers (CUSTOMERS_READ)
/// - `POST /api/v1/customers` - Create a customer (CUSTOMERS_CREATE)
/// - `GET /api/v1/customers/:customer_id` - Get a customer (CUSTOMERS_READ)
/// - `PUT /api/v1/customers/:customer_id` - Update a customer (CUSTOMERS_UPDATE)
/// - `DELETE /api/v1/customers/:customer_id` - Delete a customer (CUSTOMERS_DELETE)

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
    models::customer::{CreateCustomer, Customer, UpdateCustomer},
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

/// Customer create request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub customer_data: Option<JsonValue>,
}

/// Customer update request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub customer_data: Option<JsonValue>,
}

fn customer_not_found() -> ApiError {
    ApiError::NotFound("Customer not found.".to_string())
}

pub async fn list_customers(
    mut session: Session,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Customer>>> {
    let page = page.checked()?;
    require_permission(&mut session.tx, &session.user, Permission::CustomersRead).await?;

    let customers = Customer::list(&mut session.tx, page.skip, page.limit).await?;
    session.commit().await?;
    Ok(Json(customers))
}

/// Create a customer in the caller's tenant
///
/// # Errors
///
/// - `409 Conflict`: Email already used by another customer of the tenant
pub async fn create_customer(
    mut session: Session,
    ValidatedJson(req): ValidatedJson<CreateCustomerRequest>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    require_permission(&mut session.tx, &session.user, Permission::CustomersCreate).await?;
    let tenant_id = session.tenant_id()?;

    let customer = Customer::create(
        &mut session.tx,
        CreateCustomer {
            tenant_id,
            name: req.name,
            email: req.email,
            customer_data: req.customer_data,
            created_by: session.user.user_id,
        },
    )
    .await?;

    session.commit().await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(mut session: Session, Path(customer_id): Path<Uuid>) -> ApiResult<Json<Customer>> {
    require_permission(&mut session.tx, &session.user, Permission::CustomersRead).await?;

    let customer = Customer::find_by_id(&mut session.tx, customer_id)
        .await?
        .ok_or_else(customer_not_found)?;

    session.commit().await?;
    Ok(Json(customer))
}

pub async fn update_customer(
    mut session: Session,
    Path(customer_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateCustomerRequest>,
) -> ApiResult<Json<Customer>> {
    require_permission(&mut session.tx, &session.user, Permission::CustomersUpdate).await?;

    let customer = Customer::update(
        &mut session.tx,
        customer_id,
        UpdateCustomer {
            name: req.name,
            email: req.email,
            customer_data: req.customer_data,
        },
        session.user.user_id,
    )
    .await?
    .ok_or_else(customer_not_found)?;

    session.commit().await?;
    Ok(Json(customer))
}

pub async fn delete_customer(mut session: Session, Path(customer_id): Path<Uuid>) -> ApiResult<StatusCode> {
    require_permission(&mut session.tx, &session.user, Permission::CustomersDelete).await?;

    if !Customer::delete(&mut session.tx, customer_id).await? {
        return Err(customer_not_found());
    }

    session.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
