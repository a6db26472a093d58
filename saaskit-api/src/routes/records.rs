/// Record endpoints for custom objects
///
/// Record payloads are validated against the object's current field
/// definitions on both create and update; an update replaces the whole
/// `data` document.
///
/// # Endpoints
///
/// - `GET /api/v1/records/:object_slug` - List records (RECORDS_READ)
/// - `POST /api/v1/records/:object_slug` - Create a record (RECORDS_CREATE)
/// - `GET /api/v1/records/:object_slug/:record_id` - Get a record (RECORDS_READ)
/// - `PUT /api/v1/records/:object_slug/:record_id` - Replace a record's data (RECORDS_UPDATE)
/// - `DELETE /api/v1/records/:object_slug/:record_id` - Delete a record (RECORDS_DELETE)

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
    models::{
        custom_object::{CustomField, CustomObject},
        record::{validate_record_data, FieldRule, Record},
    },
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

/// Record create/update request
#[derive(Debug, Deserialize, Validate)]
pub struct RecordRequest {
    /// Field slug to value
    pub data: JsonValue,
}

/// Object definition plus the rules its records must satisfy
struct Schema {
    object: CustomObject,
    rules: Vec<FieldRule>,
}

async fn load_object(conn: &mut PgConnection, slug: &str) -> ApiResult<CustomObject> {
    CustomObject::find_by_slug(conn, slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Custom object definition not found.".to_string()))
}

async fn load_schema(conn: &mut PgConnection, slug: &str) -> ApiResult<Schema> {
    let object = load_object(conn, slug).await?;
    let rules = CustomField::list_for_object(conn, object.id)
        .await?
        .iter()
        .map(FieldRule::from_field)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Schema { object, rules })
}

fn record_not_found() -> ApiError {
    ApiError::NotFound("Record not found.".to_string())
}

pub async fn list_records(
    mut session: Session,
    Path(object_slug): Path<String>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Record>>> {
    let page = page.checked()?;
    require_permission(&mut session.tx, &session.user, Permission::RecordsRead).await?;

    let object = load_object(&mut session.tx, &object_slug).await?;
    let records = Record::list_for_object(&mut session.tx, object.id, page.skip, page.limit).await?;

    session.commit().await?;
    Ok(Json(records))
}

/// Create a record
///
/// # Example
///
/// ```text
/// POST /api/v1/records/projects
/// {"data": {"title": "Launch", "due": "2025-03-01", "status": "open"}}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Data violates the field definitions
/// - `404 Not Found`: Object doesn't exist
pub async fn create_record(
    mut session: Session,
    Path(object_slug): Path<String>,
    ValidatedJson(req): ValidatedJson<RecordRequest>,
) -> ApiResult<(StatusCode, Json<Record>)> {
    require_permission(&mut session.tx, &session.user, Permission::RecordsCreate).await?;

    let schema = load_schema(&mut session.tx, &object_slug).await?;
    let data = validate_record_data(&req.data, &schema.rules)?;

    let record = Record::create(
        &mut session.tx,
        schema.object.id,
        schema.object.tenant_id,
        data,
        session.user.user_id,
    )
    .await?;

    session.commit().await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_record(
    mut session: Session,
    Path((object_slug, record_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<Record>> {
    require_permission(&mut session.tx, &session.user, Permission::RecordsRead).await?;

    let object = load_object(&mut session.tx, &object_slug).await?;
    let record = Record::find(&mut session.tx, object.id, record_id)
        .await?
        .ok_or_else(record_not_found)?;

    session.commit().await?;
    Ok(Json(record))
}

/// Replace a record's data
///
/// The new data goes through the same validation as on create.
pub async fn update_record(
    mut session: Session,
    Path((object_slug, record_id)): Path<(String, Uuid)>,
    ValidatedJson(req): ValidatedJson<RecordRequest>,
) -> ApiResult<Json<Record>> {
    require_permission(&mut session.tx, &session.user, Permission::RecordsUpdate).await?;

    let schema = load_schema(&mut session.tx, &object_slug).await?;
    let data = validate_record_data(&req.data, &schema.rules)?;

    let record = Record::update_data(&mut session.tx, schema.object.id, record_id, data, session.user.user_id)
        .await?
        .ok_or_else(record_not_found)?;

    session.commit().await?;
    Ok(Json(record))
}

pub async fn delete_record(
    mut session: Session,
    Path((object_slug, record_id)): Path<(String, Uuid)>,
) -> ApiResult<StatusCode> {
    require_permission(&mut session.tx, &session.user, Permission::RecordsDelete).await?;

    let object = load_object(&mut session.tx, &object_slug).await?;
    if !Record::delete(&mut session.tx, object.id, record_id).await? {
        return Err(record_not_found());
    }

    session.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
