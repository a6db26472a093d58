/// Custom object definition endpoints
///
/// Tenants define their own object types and typed fields; records of
/// those objects are served by the `records` routes.
///
/// # Endpoints
///
/// - `GET /api/v1/custom-objects` - List objects (CUSTOM_OBJECTS_READ)
/// - `POST /api/v1/custom-objects` - Define an object (CUSTOM_OBJECTS_CREATE)
/// - `GET /api/v1/custom-objects/:object_slug` - Object with its fields (CUSTOM_OBJECTS_READ)
/// - `POST /api/v1/custom-objects/:object_slug/fields` - Add a field (CUSTOM_OBJECTS_CREATE)

use crate::{
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::{Session, ValidatedJson},
};
use axum::{extract::Path, http::StatusCode, Json};
use saaskit_shared::{
    auth::{authorization::require_permission, permissions::Permission},
    models::custom_object::{
        is_valid_slug, validate_field_options, CreateCustomField, CreateCustomObject, CustomField,
        CustomObject, FieldType,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use validator::{Validate, ValidationError};

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        let mut err = ValidationError::new("slug");
        err.message = Some("Slug may only contain lowercase letters and underscores".into());
        Err(err)
    }
}

/// Object definition request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomObjectRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
}

/// Field definition request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomFieldRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(custom(function = "validate_slug"))]
    pub slug: String,

    /// One of `text`, `number`, `date`, `boolean`, `select`
    pub field_type: String,

    #[serde(default)]
    pub is_required: bool,

    /// `{"options": [...]}` for select fields
    pub options: Option<JsonValue>,
}

impl CreateCustomFieldRequest {
    /// Parses the field type and checks the options against it
    fn definition(&self) -> ApiResult<FieldType> {
        let invalid = |field: &str, message: String| {
            ApiError::ValidationError(vec![ValidationErrorDetail {
                field: field.to_string(),
                message,
            }])
        };

        let field_type = FieldType::from_str(&self.field_type).ok_or_else(|| {
            invalid(
                "field_type",
                format!("Unknown field type '{}'", self.field_type),
            )
        })?;
        validate_field_options(field_type, self.options.as_ref()).map_err(|msg| invalid("options", msg))?;

        Ok(field_type)
    }
}

/// Object definition with its fields
#[derive(Debug, Serialize)]
pub struct CustomObjectResponse {
    #[serde(flatten)]
    pub object: CustomObject,

    pub fields: Vec<CustomField>,
}

/// Loads an object by slug or answers 404
async fn find_object(conn: &mut PgConnection, slug: &str) -> ApiResult<CustomObject> {
    CustomObject::find_by_slug(conn, slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Custom object not found.".to_string()))
}

pub async fn list_custom_objects(mut session: Session) -> ApiResult<Json<Vec<CustomObject>>> {
    require_permission(&mut session.tx, &session.user, Permission::CustomObjectsRead).await?;

    let objects = CustomObject::list(&mut session.tx).await?;
    session.commit().await?;
    Ok(Json(objects))
}

/// Define a new object type
///
/// # Errors
///
/// - `409 Conflict`: Slug already used in the tenant
/// - `422 Unprocessable Entity`: Slug isn't `[a-z_]+`
pub async fn create_custom_object(
    mut session: Session,
    ValidatedJson(req): ValidatedJson<CreateCustomObjectRequest>,
) -> ApiResult<(StatusCode, Json<CustomObject>)> {
    require_permission(&mut session.tx, &session.user, Permission::CustomObjectsCreate).await?;
    let tenant_id = session.tenant_id()?;

    let object = CustomObject::create(
        &mut session.tx,
        CreateCustomObject {
            tenant_id,
            name: req.name,
            slug: req.slug,
            created_by: session.user.user_id,
        },
    )
    .await?;

    session.commit().await?;
    Ok((StatusCode::CREATED, Json(object)))
}

pub async fn get_custom_object(
    mut session: Session,
    Path(object_slug): Path<String>,
) -> ApiResult<Json<CustomObjectResponse>> {
    require_permission(&mut session.tx, &session.user, Permission::CustomObjectsRead).await?;

    let object = find_object(&mut session.tx, &object_slug).await?;
    let fields = CustomField::list_for_object(&mut session.tx, object.id).await?;

    session.commit().await?;
    Ok(Json(CustomObjectResponse { object, fields }))
}

/// Add a field to an object
///
/// # Errors
///
/// - `404 Not Found`: Object doesn't exist
/// - `409 Conflict`: Field slug already used on the object
/// - `422 Unprocessable Entity`: Unknown type, or options that don't fit it
pub async fn create_custom_field(
    mut session: Session,
    Path(object_slug): Path<String>,
    ValidatedJson(req): ValidatedJson<CreateCustomFieldRequest>,
) -> ApiResult<(StatusCode, Json<CustomField>)> {
    require_permission(&mut session.tx, &session.user, Permission::CustomObjectsCreate).await?;
    let field_type = req.definition()?;

    let object = find_object(&mut session.tx, &object_slug).await?;

    let field = CustomField::create(
        &mut session.tx,
        CreateCustomField {
            object_id: object.id,
            tenant_id: object.tenant_id,
            name: req.name,
            slug: req.slug,
            field_type,
            is_required: req.is_required,
            options: req.options,
            created_by: session.user.user_id,
        },
    )
    .await?;

    session.commit().await?;
    Ok((StatusCode::CREATED, Json(field)))
}
