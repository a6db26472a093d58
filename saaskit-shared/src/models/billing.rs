/// Checkout tracking and webhook idempotency records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use uuid::Uuid;

/// Status of a freshly created checkout
pub const CHECKOUT_PENDING: &str = "PENDING";

/// A checkout session opened at the payment provider
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CheckoutSession {
    /// Provider session id
    pub id: String,
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// Records a pending checkout
    ///
    /// A repeated provider id is ignored rather than duplicated.
    pub async fn create_pending(
        conn: &mut PgConnection,
        id: &str,
        tenant_id: Uuid,
        plan_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO checkout_sessions (id, tenant_id, plan_id, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(plan_id)
        .bind(CHECKOUT_PENDING)
        .execute(conn)
        .await?;
        Ok(())
    }
}

/// A webhook event received from the payment provider
///
/// The provider's event id is the primary key, which makes redelivery
/// detection a single lookup.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    pub received_at: DateTime<Utc>,
    pub processed_successfully: bool,
    pub payload: Option<JsonValue>,
}

impl WebhookEvent {
    /// Finds an event by provider id
    pub async fn find(conn: &mut PgConnection, id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, WebhookEvent>("SELECT * FROM webhook_events WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Stores a newly received event as not yet processed
    pub async fn insert(
        conn: &mut PgConnection,
        id: &str,
        event_type: &str,
        payload: &JsonValue,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, WebhookEvent>(
            r#"
            INSERT INTO webhook_events (id, event_type, payload)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(conn)
        .await
    }

    /// Marks an event as successfully processed
    pub async fn mark_processed(conn: &mut PgConnection, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE webhook_events SET processed_successfully = TRUE WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }
}
