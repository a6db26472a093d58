/// Append-only audit trail of sensitive tenant actions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use uuid::Uuid;

/// Actions written to the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UserInvited,
    UserRoleUpdated,
}

impl AuditAction {
    /// Converts action to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserInvited => "USER_INVITED",
            AuditAction::UserRoleUpdated => "USER_ROLE_UPDATED",
        }
    }
}

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub tenant_id: Uuid,

    /// Acting user; cleared if the user is later deleted
    pub user_id: Option<Uuid>,

    pub action: String,
    pub details: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    /// Appends an entry
    pub async fn record(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        user_id: Uuid,
        action: AuditAction,
        details: JsonValue,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs (tenant_id, user_id, action, details)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(action.as_str())
        .bind(details)
        .fetch_one(conn)
        .await
    }

    /// Lists entries visible to the session, newest first
    pub async fn list(conn: &mut PgConnection, skip: i64, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs ORDER BY created_at DESC OFFSET $1 LIMIT $2",
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(conn)
        .await
    }
}
