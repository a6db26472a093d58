/// Tenant-defined object types and their fields
///
/// Tenants describe their own data shapes at runtime: a [`CustomObject`]
/// names a type (e.g. "Project") and owns a list of [`CustomField`]s that
/// constrain the JSON documents stored as records (see `models::record`).
///
/// Slugs are lowercase ASCII letters and underscores, unique per tenant for
/// objects and per object for fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use uuid::Uuid;

/// Supported field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Boolean,
    Select,
}

impl FieldType {
    /// Converts type to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
            FieldType::Select => "select",
        }
    }

    /// Parses type from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(FieldType::Text),
            "number" => Some(FieldType::Number),
            "date" => Some(FieldType::Date),
            "boolean" => Some(FieldType::Boolean),
            "select" => Some(FieldType::Select),
            _ => None,
        }
    }
}

/// Checks a slug against `^[a-z_]+$`
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

/// Checks the `options` payload against the field type
///
/// Select fields need `{"options": [..]}` with at least one entry; every
/// other type must not carry options.
///
/// # Errors
///
/// Returns a message suitable for a 422 response.
pub fn validate_field_options(field_type: FieldType, options: Option<&JsonValue>) -> Result<(), String> {
    match (field_type, options) {
        (FieldType::Select, None) => Err("Options are required for 'select' field type.".to_string()),
        (FieldType::Select, Some(options)) => {
            let valid = options
                .get("options")
                .and_then(JsonValue::as_array)
                .map(|list| !list.is_empty())
                .unwrap_or(false);
            if valid {
                Ok(())
            } else {
                Err("Options for 'select' must be an object with a non-empty 'options' list.".to_string())
            }
        }
        (_, Some(_)) => Err("Options are only allowed for 'select' field type.".to_string()),
        (_, None) => Ok(()),
    }
}

/// Custom object definition
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomObject {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

/// Field of a custom object
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomField {
    pub id: Uuid,
    pub object_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub slug: String,

    /// See [`FieldType`]
    pub field_type: String,

    pub is_required: bool,

    /// `{"options": [..]}` for select fields
    pub options: Option<JsonValue>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl CustomField {
    /// Gets the parsed field type
    pub fn kind(&self) -> Option<FieldType> {
        FieldType::from_str(&self.field_type)
    }
}

/// Input for creating a custom object
#[derive(Debug, Clone)]
pub struct CreateCustomObject {
    pub tenant_id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_by: Uuid,
}

/// Input for creating a field
#[derive(Debug, Clone)]
pub struct CreateCustomField {
    pub object_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub slug: String,
    pub field_type: FieldType,
    pub is_required: bool,
    pub options: Option<JsonValue>,
    pub created_by: Uuid,
}

impl CustomObject {
    /// Creates an object definition
    ///
    /// # Errors
    ///
    /// Returns a database error if the slug is taken within the tenant.
    pub async fn create(conn: &mut PgConnection, data: CreateCustomObject) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, CustomObject>(
            r#"
            INSERT INTO custom_objects (tenant_id, name, slug, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(data.tenant_id)
        .bind(data.name)
        .bind(data.slug)
        .bind(data.created_by)
        .fetch_one(conn)
        .await
    }

    /// Lists object definitions visible to the session
    pub async fn list(conn: &mut PgConnection) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CustomObject>("SELECT * FROM custom_objects ORDER BY name")
            .fetch_all(conn)
            .await
    }

    /// Finds an object definition by slug
    pub async fn find_by_slug(conn: &mut PgConnection, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CustomObject>("SELECT * FROM custom_objects WHERE slug = $1")
            .bind(slug)
            .fetch_optional(conn)
            .await
    }
}

impl CustomField {
    /// Adds a field to an object
    ///
    /// # Errors
    ///
    /// Returns a database error if the slug is taken within the object.
    pub async fn create(conn: &mut PgConnection, data: CreateCustomField) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, CustomField>(
            r#"
            INSERT INTO custom_fields
                (object_id, tenant_id, name, slug, field_type, is_required, options, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(data.object_id)
        .bind(data.tenant_id)
        .bind(data.name)
        .bind(data.slug)
        .bind(data.field_type.as_str())
        .bind(data.is_required)
        .bind(data.options)
        .bind(data.created_by)
        .fetch_one(conn)
        .await
    }

    /// Lists the fields of an object in creation order
    pub async fn list_for_object(conn: &mut PgConnection, object_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CustomField>(
            "SELECT * FROM custom_fields WHERE object_id = $1 ORDER BY created_at",
        )
        .bind(object_id)
        .fetch_all(conn)
        .await
    }
}
