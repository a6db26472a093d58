/// Payment webhook processing
///
/// A delivery goes through two system transactions:
///
/// 1. **Receipt** ([`receive`]): look the event up by provider id. A
///    processed event is a duplicate; an unknown one is stored unprocessed
///    and committed, so a crash during processing leaves a record behind.
/// 2. **Processing** ([`finish`]): the provider-specific state machine runs
///    in a fresh transaction, which also flips `processed_successfully`.
///    Business errors roll back and are acknowledged so the provider
///    doesn't retry; database and gateway errors surface as 500 so it does.
///
/// Events that exist but failed earlier are processed again.

pub mod dodo;
pub mod signature;
pub mod stripe;

use chrono::{DateTime, Utc};
use saaskit_shared::db::session::begin_system;
use saaskit_shared::models::billing::WebhookEvent;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info, warn};

use crate::services::payments::GatewayError;

/// Failure while applying an event
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The event can't be applied; retrying won't help
    #[error("{0}")]
    Business(String),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payment provider failure
    #[error("Payment provider error: {0}")]
    Gateway(#[from] GatewayError),
}

/// What to do with a delivery after receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    /// Already processed successfully
    Duplicate,

    /// New, or a retry of an earlier failure
    Process,
}

/// Acknowledgement body returned to the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WebhookAck {
    Processed,
    Duplicate { message: String },
    Error { detail: String },
}

impl WebhookAck {
    pub fn duplicate() -> Self {
        WebhookAck::Duplicate {
            message: "Event already processed.".to_string(),
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        WebhookAck::Error { detail: detail.into() }
    }
}

/// Records receipt of an event in its own system transaction
pub async fn receive(
    pool: &PgPool,
    event_id: &str,
    event_type: &str,
    payload: &JsonValue,
) -> Result<Receipt, sqlx::Error> {
    let mut tx = begin_system(pool).await?;

    match WebhookEvent::find(&mut tx, event_id).await? {
        Some(existing) if existing.processed_successfully => {
            info!(event_id, "Skipping already processed webhook event");
            return Ok(Receipt::Duplicate);
        }
        Some(_) => info!(event_id, "Retrying previously failed webhook event"),
        None => {
            WebhookEvent::insert(&mut tx, event_id, event_type, payload).await?;
        }
    }

    tx.commit().await?;
    Ok(Receipt::Process)
}

/// Completes processing of an event
///
/// On success the event is marked processed and the transaction committed.
///
/// # Errors
///
/// Database and gateway errors; business errors become
/// [`WebhookAck::Error`].
pub async fn finish(
    mut tx: Transaction<'static, Postgres>,
    event_id: &str,
    result: Result<(), WebhookError>,
) -> Result<WebhookAck, WebhookError> {
    match result {
        Ok(()) => {
            WebhookEvent::mark_processed(&mut tx, event_id).await?;
            tx.commit().await?;
            info!(event_id, "Webhook event processed");
            Ok(WebhookAck::Processed)
        }
        Err(WebhookError::Business(detail)) => {
            tx.rollback().await?;
            warn!(event_id, reason = %detail, "Could not process webhook event");
            Ok(WebhookAck::error(detail))
        }
        Err(err) => {
            error!(event_id, error = %err, "Unexpected error processing webhook event");
            Err(err)
        }
    }
}

/// Parses an ISO-8601 timestamp (`Z` or offset)
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ack_bodies() {
        assert_eq!(
            serde_json::to_value(WebhookAck::Processed).unwrap(),
            json!({ "status": "processed" })
        );
        assert_eq!(
            serde_json::to_value(WebhookAck::duplicate()).unwrap(),
            json!({ "status": "duplicate", "message": "Event already processed." })
        );
        assert_eq!(
            serde_json::to_value(WebhookAck::error("Tenant not found.")).unwrap(),
            json!({ "status": "error", "detail": "Tenant not found." })
        );
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("2025-01-15T10:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-01-15T10:00:00+00:00");
        assert!(parse_timestamp("2025-01-15T12:00:00+02:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
