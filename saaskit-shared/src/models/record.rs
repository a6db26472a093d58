/// Records of custom objects and their validation
///
/// A record's `data` is a JSON object whose keys are field slugs of its
/// custom object. [`validate_record_data`] enforces the field definitions
/// before anything is written.
///
/// # Example
///
/// ```
/// use saaskit_shared::models::record::{validate_record_data, FieldRule};
/// use saaskit_shared::models::custom_object::FieldType;
/// use serde_json::json;
///
/// let rules = vec![
///     FieldRule::new("title", FieldType::Text, true),
///     FieldRule::new("due", FieldType::Date, false),
/// ];
///
/// let clean = validate_record_data(&json!({"title": "Launch", "due": "2025-03-01"}), &rules).unwrap();
/// assert_eq!(clean["due"], "2025-03-01");
///
/// assert!(validate_record_data(&json!({"due": "2025-03-01"}), &rules).is_err());
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sqlx::PgConnection;
use uuid::Uuid;

use super::custom_object::{CustomField, FieldType};

/// Reasons a record payload is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordValidationError {
    #[error("Record data must be a JSON object")]
    NotAnObject,

    #[error("Missing required field: '{0}'")]
    MissingField(String),

    #[error("Unknown field: '{0}'")]
    UnknownField(String),

    #[error("Field '{field}' must be of type {expected}")]
    WrongType { field: String, expected: &'static str },

    #[error("Field '{0}' must be a date in YYYY-MM-DD format")]
    InvalidDate(String),

    #[error("Value for field '{field}' is not one of the allowed options: {allowed}")]
    InvalidOption { field: String, allowed: String },

    #[error("Field '{0}' has an unsupported type definition")]
    BrokenDefinition(String),
}

/// The subset of a field definition needed for validation
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub slug: String,
    pub field_type: FieldType,
    pub is_required: bool,
    pub options: Vec<JsonValue>,
}

impl FieldRule {
    /// Rule without select options
    pub fn new(slug: &str, field_type: FieldType, is_required: bool) -> Self {
        Self {
            slug: slug.to_string(),
            field_type,
            is_required,
            options: Vec::new(),
        }
    }

    /// Rule for a select field
    pub fn select(slug: &str, is_required: bool, options: Vec<JsonValue>) -> Self {
        Self {
            options,
            ..Self::new(slug, FieldType::Select, is_required)
        }
    }

    /// Builds a rule from a stored field definition
    ///
    /// # Errors
    ///
    /// `BrokenDefinition` if the stored type is unknown.
    pub fn from_field(field: &CustomField) -> Result<Self, RecordValidationError> {
        let field_type = field
            .kind()
            .ok_or_else(|| RecordValidationError::BrokenDefinition(field.slug.clone()))?;
        let options = field
            .options
            .as_ref()
            .and_then(|o| o.get("options"))
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            slug: field.slug.clone(),
            field_type,
            is_required: field.is_required,
            options,
        })
    }
}

/// Validates and normalizes record data against field rules
///
/// Required fields must be present and non-null. Unknown keys are rejected.
/// Every present key is type checked, `null` included, so an optional field
/// is left empty by omitting its key. A select field accepts `null` only when
/// `null` is one of its options. Dates must be `YYYY-MM-DD`.
///
/// # Returns
///
/// The normalized JSON object to store
pub fn validate_record_data(
    data: &JsonValue,
    rules: &[FieldRule],
) -> Result<JsonValue, RecordValidationError> {
    let object = data.as_object().ok_or(RecordValidationError::NotAnObject)?;

    for rule in rules.iter().filter(|r| r.is_required) {
        match object.get(&rule.slug) {
            None | Some(JsonValue::Null) => {
                return Err(RecordValidationError::MissingField(rule.slug.clone()))
            }
            Some(_) => {}
        }
    }

    let mut clean = Map::new();
    for (key, value) in object {
        let rule = rules
            .iter()
            .find(|r| &r.slug == key)
            .ok_or_else(|| RecordValidationError::UnknownField(key.clone()))?;

        let normalized = match rule.field_type {
            FieldType::Text => expect(value.is_string(), key, "text", value)?,
            FieldType::Number => expect(value.is_number(), key, "number", value)?,
            FieldType::Boolean => expect(value.is_boolean(), key, "boolean", value)?,
            FieldType::Date => JsonValue::String(normalize_date(key, value)?),
            FieldType::Select => {
                if !rule.options.contains(value) {
                    let allowed = rule
                        .options
                        .iter()
                        .map(|o| o.as_str().map(str::to_string).unwrap_or_else(|| o.to_string()))
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(RecordValidationError::InvalidOption {
                        field: key.clone(),
                        allowed,
                    });
                }
                value.clone()
            }
        };
        clean.insert(key.clone(), normalized);
    }

    Ok(JsonValue::Object(clean))
}

fn expect(
    ok: bool,
    field: &str,
    expected: &'static str,
    value: &JsonValue,
) -> Result<JsonValue, RecordValidationError> {
    if ok {
        Ok(value.clone())
    } else {
        Err(RecordValidationError::WrongType {
            field: field.to_string(),
            expected,
        })
    }
}

fn normalize_date(field: &str, value: &JsonValue) -> Result<String, RecordValidationError> {
    let raw = value
        .as_str()
        .ok_or_else(|| RecordValidationError::InvalidDate(field.to_string()))?;

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.format("%Y-%m-%d").to_string())
        .map_err(|_| RecordValidationError::InvalidDate(field.to_string()))
}

/// Record row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Record {
    pub id: Uuid,
    pub object_id: Uuid,
    pub tenant_id: Uuid,
    pub data: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl Record {
    /// Stores a validated record
    pub async fn create(
        conn: &mut PgConnection,
        object_id: Uuid,
        tenant_id: Uuid,
        data: JsonValue,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Record>(
            r#"
            INSERT INTO records (object_id, tenant_id, data, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(object_id)
        .bind(tenant_id)
        .bind(data)
        .bind(created_by)
        .fetch_one(conn)
        .await
    }

    /// Finds a record of a given object
    ///
    /// A record id that belongs to another object yields `None`.
    pub async fn find(
        conn: &mut PgConnection,
        object_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Record>("SELECT * FROM records WHERE id = $1 AND object_id = $2")
            .bind(id)
            .bind(object_id)
            .fetch_optional(conn)
            .await
    }

    /// Lists records of an object, newest first
    pub async fn list_for_object(
        conn: &mut PgConnection,
        object_id: Uuid,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Record>(
            r#"
            SELECT * FROM records
            WHERE object_id = $1
            ORDER BY created_at DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(object_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(conn)
        .await
    }

    /// Replaces a record's data
    pub async fn update_data(
        conn: &mut PgConnection,
        object_id: Uuid,
        id: Uuid,
        data: JsonValue,
        updated_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Record>(
            r#"
            UPDATE records
            SET data = $3, updated_by = $4, updated_at = NOW()
            WHERE id = $1 AND object_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(object_id)
        .bind(data)
        .bind(updated_by)
        .fetch_optional(conn)
        .await
    }

    /// Deletes a record of a given object
    pub async fn delete(conn: &mut PgConnection, object_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM records WHERE id = $1 AND object_id = $2")
            .bind(id)
            .bind(object_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> Vec<FieldRule> {
        vec![
            FieldRule::new("title", FieldType::Text, true),
            FieldRule::new("budget", FieldType::Number, false),
            FieldRule::new("done", FieldType::Boolean, false),
            FieldRule::new("due", FieldType::Date, false),
            FieldRule::select("stage", false, vec![json!("lead"), json!("won")]),
        ]
    }

    #[test]
    fn test_valid_record_passes() {
        let data = json!({"title": "Deal", "budget": 12.5, "done": false, "stage": "won"});
        let clean = validate_record_data(&data, &rules()).unwrap();
        assert_eq!(clean, data);
    }

    #[test]
    fn test_missing_required_field() {
        let err = validate_record_data(&json!({"budget": 1}), &rules()).unwrap_err();
        assert_eq!(err, RecordValidationError::MissingField("title".to_string()));

        let err = validate_record_data(&json!({"title": null}), &rules()).unwrap_err();
        assert_eq!(err, RecordValidationError::MissingField("title".to_string()));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = validate_record_data(&json!({"title": "x", "color": "red"}), &rules()).unwrap_err();
        assert_eq!(err, RecordValidationError::UnknownField("color".to_string()));
    }

    #[test]
    fn test_type_mismatches() {
        assert!(matches!(
            validate_record_data(&json!({"title": 5}), &rules()),
            Err(RecordValidationError::WrongType { expected: "text", .. })
        ));
        assert!(matches!(
            validate_record_data(&json!({"title": "x", "budget": "10"}), &rules()),
            Err(RecordValidationError::WrongType { expected: "number", .. })
        ));
        assert!(matches!(
            validate_record_data(&json!({"title": "x", "done": "yes"}), &rules()),
            Err(RecordValidationError::WrongType { expected: "boolean", .. })
        ));
    }

    #[test]
    fn test_date_normalization() {
        let clean = validate_record_data(&json!({"title": "x", "due": "2025-03-01"}), &rules()).unwrap();
        assert_eq!(clean["due"], "2025-03-01");

        let err = validate_record_data(&json!({"title": "x", "due": "2025-03-01T10:00:00Z"}), &rules()).unwrap_err();
        assert_eq!(err, RecordValidationError::InvalidDate("due".to_string()));

        let err = validate_record_data(&json!({"title": "x", "due": "03/01/2025"}), &rules()).unwrap_err();
        assert_eq!(err, RecordValidationError::InvalidDate("due".to_string()));
    }

    #[test]
    fn test_select_options_enforced() {
        let err = validate_record_data(&json!({"title": "x", "stage": "lost"}), &rules()).unwrap_err();
        assert_eq!(
            err,
            RecordValidationError::InvalidOption {
                field: "stage".to_string(),
                allowed: "lead, won".to_string()
            }
        );
    }

    #[test]
    fn test_null_values_are_type_checked() {
        assert!(matches!(
            validate_record_data(&json!({"title": "x", "budget": null}), &rules()),
            Err(RecordValidationError::WrongType { expected: "number", .. })
        ));
        assert!(matches!(
            validate_record_data(&json!({"title": "x", "done": null}), &rules()),
            Err(RecordValidationError::WrongType { expected: "boolean", .. })
        ));
        assert_eq!(
            validate_record_data(&json!({"title": "x", "due": null}), &rules()).unwrap_err(),
            RecordValidationError::InvalidDate("due".to_string())
        );
        assert!(matches!(
            validate_record_data(&json!({"title": "x", "stage": null}), &rules()),
            Err(RecordValidationError::InvalidOption { .. })
        ));

        let rules = vec![
            FieldRule::new("title", FieldType::Text, false),
            FieldRule::select("stage", false, vec![json!("lead"), JsonValue::Null]),
        ];
        assert!(matches!(
            validate_record_data(&json!({"title": null}), &rules),
            Err(RecordValidationError::WrongType { expected: "text", .. })
        ));
        let clean = validate_record_data(&json!({"stage": null}), &rules).unwrap();
        assert_eq!(clean, json!({"stage": null}));
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(
            validate_record_data(&json!(["title"]), &rules()).unwrap_err(),
            RecordValidationError::NotAnObject
        );
    }
}
