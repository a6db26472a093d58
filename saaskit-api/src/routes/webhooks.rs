/// Payment provider webhooks
///
/// Both endpoints read the raw body, since signatures are computed over the
/// exact bytes sent.
///
/// # Endpoints
///
/// - `POST /api/v1/webhooks/dodo` - Standard Webhooks signed; 202 on success
/// - `POST /api/v1/webhooks/stripe` - `Stripe-Signature` signed; always 200 unless retry is wanted
///
/// # Responses
///
/// ```json
/// {"status": "processed"}
/// {"status": "duplicate", "message": "Event already processed."}
/// {"status": "error", "detail": "..."}
/// ```
///
/// Unexpected failures answer 500 so the provider retries the delivery.

use crate::{
    app::AppState,
    billing::{
        self, dodo,
        signature::{verify_standard_webhook, verify_stripe_signature, WEBHOOK_ID_HEADER},
        stripe::{self, StripeEvent},
        Receipt, WebhookAck, WebhookError,
    },
    config::GatewayKind,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use saaskit_shared::db::session::begin_system;
use serde_json::Value as JsonValue;
use tracing::warn;

fn retry_later(err: WebhookError) -> ApiError {
    ApiError::InternalError(format!("Webhook processing failed: {}", err))
}

/// Dodo Payments webhook
///
/// # Errors
///
/// - `400 Bad Request`: Bad signature or body that isn't JSON
/// - `500 Internal Server Error`: Processing failed unexpectedly
/// - `503 Service Unavailable`: No Dodo webhook secret configured
pub async fn dodo_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<WebhookAck>)> {
    let secret = state
        .config
        .payments
        .dodo
        .as_ref()
        .map(|dodo| dodo.webhook_secret.as_str())
        .ok_or_else(|| ApiError::ServiceUnavailable("Dodo Payments webhooks are not configured.".to_string()))?;

    verify_standard_webhook(&headers, &body, secret, chrono::Utc::now().timestamp()).map_err(|e| {
        warn!(error = %e, "Rejected Dodo webhook");
        ApiError::BadRequest(format!("Invalid webhook signature: {}", e))
    })?;

    let payload: JsonValue = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Invalid JSON payload.".to_string()))?;

    // Verified above, so the header is present
    let event_id = headers
        .get(WEBHOOK_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let event_type = payload.get("type").and_then(JsonValue::as_str).unwrap_or_default();

    if billing::receive(&state.db, &event_id, event_type, &payload).await? == Receipt::Duplicate {
        return Ok((StatusCode::ACCEPTED, Json(WebhookAck::duplicate())));
    }

    let mut tx = begin_system(&state.db).await?;
    let result = dodo::process_event(&mut tx, &event_id, &payload).await;
    let ack = billing::finish(tx, &event_id, result).await.map_err(retry_later)?;

    Ok((StatusCode::ACCEPTED, Json(ack)))
}

/// Stripe webhook
///
/// Signature and payload problems are acknowledged with 200 and an error
/// status, so Stripe doesn't keep retrying a delivery that can never pass.
///
/// # Errors
///
/// - `500 Internal Server Error`: Processing failed unexpectedly
/// - `503 Service Unavailable`: Stripe isn't the active gateway
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let secret = match (&state.config.payments.stripe, state.config.payments.gateway) {
        (Some(stripe), GatewayKind::Stripe) => stripe.webhook_secret.as_str(),
        _ => {
            return Err(ApiError::ServiceUnavailable(
                "Stripe webhooks are not configured.".to_string(),
            ))
        }
    };

    if let Err(e) = verify_stripe_signature(&headers, &body, secret, chrono::Utc::now().timestamp()) {
        warn!(error = %e, "Rejected Stripe webhook");
        return Ok(Json(WebhookAck::error(format!("Invalid signature: {}", e))));
    }

    let Some((event, payload)) = serde_json::from_slice::<JsonValue>(&body)
        .ok()
        .and_then(|payload| StripeEvent::from_payload(&payload).map(|event| (event, payload)))
    else {
        warn!("Stripe webhook payload is not a valid event");
        return Ok(Json(WebhookAck::error("Invalid payload.")));
    };

    if billing::receive(&state.db, &event.id, &event.event_type, &payload).await? == Receipt::Duplicate {
        return Ok(Json(WebhookAck::duplicate()));
    }

    let mut tx = begin_system(&state.db).await?;
    let result = stripe::process_event(&mut tx, state.payments.as_ref(), &event).await;
    let ack = billing::finish(tx, &event.id, result).await.map_err(retry_later)?;

    Ok(Json(ack))
}
