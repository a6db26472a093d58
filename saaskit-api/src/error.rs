/// Error handling for the API server
///
/// Every handler returns [`ApiResult`]. Errors from the shared crate convert
/// through `?` into the matching HTTP status, and the response body always
/// has the same shape:
///
/// ```json
/// { "error": "conflict", "message": "A plan with this name already exists." }
/// ```
///
/// # Example
///
/// ```no_run
/// use saaskit_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(found: bool) -> ApiResult<Json<Value>> {
///     if !found {
///         return Err(ApiError::NotFound("Item not found.".to_string()));
///     }
///     Ok(Json(json!({ "ok": true })))
/// }
/// ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use saaskit_shared::auth::api_key::ApiKeyError;
use saaskit_shared::auth::authorization::AuthzError;
use saaskit_shared::auth::context::AuthError;
use saaskit_shared::auth::permissions::UnknownPermission;
use saaskit_shared::entitlements::EntitlementError;
use saaskit_shared::models::record::RecordValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::ValidationErrorsKind;

use crate::services::identity::IdentityError;
use crate::services::payments::GatewayError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Error code of responses to callers that haven't accepted the Terms of Service
pub const TERMS_NOT_ACCEPTED: &str = "TERMS_NOT_ACCEPTED";

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Payment required (402) - entitlement checks
    PaymentRequired(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Forbidden (403) with the `TERMS_NOT_ACCEPTED` code
    TermsNotAccepted,

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., duplicate slug
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// Not implemented (501)
    NotImplemented(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "TERMS_NOT_ACCEPTED")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::PaymentRequired(msg) => write!(f, "Payment required: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::TermsNotAccepted => write!(f, "Forbidden: Terms of Service not accepted"),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// HTTP status of this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::Forbidden(_) | ApiError::TermsNotAccepted => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::PaymentRequired(msg) => ("payment_required", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::TermsNotAccepted => (
                TERMS_NOT_ACCEPTED,
                "You must accept the Terms of Service to continue.".to_string(),
                None,
            ),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ("internal_error", "An internal error occurred".to_string(), None)
            }
            ApiError::NotImplemented(msg) => ("not_implemented", msg, None),
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg, None),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Message for a unique-constraint violation
fn conflict_message(constraint: &str) -> String {
    match constraint {
        "tenants_slug_key" => "A tenant with this slug already exists.",
        "users_email_key" => "A user with this email already exists.",
        "uq_user_roles_tenant_name" => "A role with this name already exists in your tenant.",
        "uq_customers_tenant_email" => "A customer with this email already exists.",
        "uq_custom_objects_tenant_slug" => "A custom object with this slug already exists.",
        "uq_custom_fields_object_slug" => "A field with this slug already exists for this object.",
        "plans_name_key" => "A plan with this name already exists.",
        "uq_plan_entitlements_plan_feature" => "This feature slug already exists for this plan.",
        _ => return format!("Constraint violation: {}", constraint),
    }
    .to_string()
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                match db_err.code().as_deref() {
                    // unique_violation
                    Some("23505") => {
                        return ApiError::Conflict(conflict_message(db_err.constraint().unwrap_or_default()))
                    }
                    // foreign_key_violation, check_violation
                    Some("23503") | Some("23514") => {
                        return ApiError::BadRequest(format!(
                            "Constraint violation: {}",
                            db_err.constraint().unwrap_or("unknown")
                        ))
                    }
                    // insufficient_privilege: row-level security rejected the write
                    Some("42501") => {
                        return ApiError::Forbidden("Not authorized to access this resource".to_string())
                    }
                    _ => {}
                }

                // Other database errors are internal
                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert authentication errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Not authenticated".to_string()),
            AuthError::InvalidFormat => {
                ApiError::Unauthorized("Invalid authorization header format".to_string())
            }
            AuthError::InvalidToken(_) => {
                ApiError::Unauthorized("Could not validate credentials".to_string())
            }
            AuthError::InvalidApiKey | AuthError::ExpiredApiKey => ApiError::Unauthorized(err.to_string()),
            AuthError::ProfileNotFound => ApiError::NotFound("User profile not found".to_string()),
            AuthError::Database(err) => ApiError::InternalError(format!("Database error: {}", err)),
            AuthError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::TermsNotAccepted => ApiError::TermsNotAccepted,
            AuthzError::DatabaseError(err) => ApiError::InternalError(format!("Database error: {}", err)),
            other => ApiError::Forbidden(other.to_string()),
        }
    }
}

/// Convert entitlement errors to API errors
impl From<EntitlementError> for ApiError {
    fn from(err: EntitlementError) -> Self {
        match err {
            EntitlementError::DatabaseError(err) => {
                ApiError::InternalError(format!("Database error: {}", err))
            }
            other => ApiError::PaymentRequired(other.to_string()),
        }
    }
}

impl From<RecordValidationError> for ApiError {
    fn from(err: RecordValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<UnknownPermission> for ApiError {
    fn from(err: UnknownPermission) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "permissions".to_string(),
            message: err.to_string(),
        }])
    }
}

impl From<ApiKeyError> for ApiError {
    fn from(err: ApiKeyError) -> Self {
        ApiError::InternalError(format!("API key operation failed: {}", err))
    }
}

/// Convert identity provider errors to API errors
impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::AlreadyExists => ApiError::BadRequest(err.to_string()),
            IdentityError::Rejected { message, .. } => ApiError::BadRequest(message),
            IdentityError::Http(e) => {
                tracing::error!(error = %e, "Identity provider unreachable");
                ApiError::ServiceUnavailable("Identity provider is unavailable.".to_string())
            }
            IdentityError::InvalidResponse(msg) => {
                ApiError::InternalError(format!("Identity provider response: {}", msg))
            }
        }
    }
}

/// Convert payment provider errors to API errors
impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unsupported(msg) => ApiError::NotImplemented(msg.to_string()),
            other => {
                tracing::error!(error = %other, "Payment provider request failed");
                ApiError::ServiceUnavailable("The payment provider could not process the request.".to_string())
            }
        }
    }
}

/// Collects field errors, descending into nested structs
///
/// Nested fields keep their own names since nested request parts are
/// flattened into the body.
fn collect_field_errors(errors: &validator::ValidationErrors, out: &mut Vec<ValidationErrorDetail>) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(errs) => {
                out.extend(errs.iter().map(|e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid {}", field)),
                }));
            }
            ValidationErrorsKind::Struct(nested) => collect_field_errors(nested, out),
            ValidationErrorsKind::List(items) => {
                for nested in items.values() {
                    collect_field_errors(nested, out);
                }
            }
        }
    }
}

/// Convert request-body validation failures to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details = Vec::new();
        collect_field_errors(&errors, &mut details);
        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}

/// Malformed JSON bodies
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "body".to_string(),
            message: rejection.body_text(),
        }])
    }
}
