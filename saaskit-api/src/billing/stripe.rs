/// Stripe subscription events
///
/// Checkout events carry our tenant id as `client_reference_id`; every other
/// event is matched through the tenant's stored Stripe customer id. Events
/// created before the tenant's last update are stale and skipped.
///
/// | Event | Tenant change |
/// |---|---|
/// | `checkout.session.completed` (subscription mode) | plan by price id, active, subscription and customer ids, period end |
/// | `invoice.payment_failed` | past_due |
/// | `customer.subscription.updated`, `customer.subscription.deleted` | canceled when cancelling at period end, inactive when canceled or unpaid |

use chrono::{DateTime, TimeZone, Utc};
use saaskit_shared::models::plan::Plan;
use saaskit_shared::models::tenant::{SubscriptionChange, SubscriptionStatus, Tenant};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::WebhookError;
use crate::services::payments::PaymentGateway;

/// Envelope fields of a Stripe event
#[derive(Debug, Clone, PartialEq)]
pub struct StripeEvent {
    pub id: String,
    pub event_type: String,
    pub created: DateTime<Utc>,
    pub object: JsonValue,
}

impl StripeEvent {
    /// Reads an event payload; `None` if the envelope is incomplete
    pub fn from_payload(payload: &JsonValue) -> Option<Self> {
        Some(Self {
            id: payload.get("id")?.as_str()?.to_string(),
            event_type: payload.get("type")?.as_str()?.to_string(),
            created: Utc.timestamp_opt(payload.get("created")?.as_i64()?, 0).single()?,
            object: payload.get("data")?.get("object")?.clone(),
        })
    }

    fn object_str(&self, key: &str) -> Option<&str> {
        self.object
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// How the tenant of an event is found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantLookup {
    ById(String),
    ByCustomer(String),
    Missing,
}

/// Picks the tenant lookup for an event
///
/// # Errors
///
/// `Business` for a checkout event without `client_reference_id`.
pub fn tenant_lookup(event: &StripeEvent) -> Result<TenantLookup, WebhookError> {
    if event.event_type.starts_with("checkout.session.") {
        return event
            .object_str("client_reference_id")
            .map(|id| TenantLookup::ById(id.to_string()))
            .ok_or_else(|| {
                WebhookError::Business("Missing client_reference_id in checkout session.".to_string())
            });
    }

    Ok(event
        .object_str("customer")
        .map(|c| TenantLookup::ByCustomer(c.to_string()))
        .unwrap_or(TenantLookup::Missing))
}

/// Tenant change requested by an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Completed subscription checkout
    Activate {
        subscription_id: String,
        customer_id: String,
    },
    PastDue,
    Canceled,
    Inactive,
    Unhandled,
}

/// Decides the transition of an event
///
/// # Errors
///
/// `Business` for a completed subscription checkout without subscription or
/// customer id.
pub fn transition(event: &StripeEvent) -> Result<Transition, WebhookError> {
    let transition = match event.event_type.as_str() {
        "checkout.session.completed" => {
            if event.object_str("mode") != Some("subscription") {
                return Ok(Transition::Unhandled);
            }
            match (event.object_str("subscription"), event.object_str("customer")) {
                (Some(subscription_id), Some(customer_id)) => Transition::Activate {
                    subscription_id: subscription_id.to_string(),
                    customer_id: customer_id.to_string(),
                },
                _ => {
                    return Err(WebhookError::Business(
                        "Subscription or Customer ID missing in webhook payload.".to_string(),
                    ))
                }
            }
        }
        "invoice.payment_failed" => Transition::PastDue,
        "customer.subscription.updated" | "customer.subscription.deleted" => {
            let cancel_at_period_end = event
                .object
                .get("cancel_at_period_end")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false);
            if cancel_at_period_end {
                Transition::Canceled
            } else if matches!(event.object_str("status"), Some("canceled") | Some("unpaid")) {
                Transition::Inactive
            } else {
                Transition::Unhandled
            }
        }
        _ => Transition::Unhandled,
    };
    Ok(transition)
}

/// Price id of the first subscription item
pub fn subscription_price_id(subscription: &JsonValue) -> Option<&str> {
    subscription
        .pointer("/items/data/0/price/id")
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
}

/// Period end of a subscription object
pub fn subscription_period_end(subscription: &JsonValue) -> Option<DateTime<Utc>> {
    subscription
        .get("current_period_end")
        .or_else(|| subscription.pointer("/items/data/0/current_period_end"))
        .and_then(JsonValue::as_i64)
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
}

/// Tenant change for a completed subscription checkout
///
/// A price that matches no plan still activates the tenant but clears its
/// plan, so no entitlements carry over from an earlier subscription.
pub fn activation_change(
    plan_id: Option<Uuid>,
    subscription_id: String,
    customer_id: String,
    subscription: &JsonValue,
) -> SubscriptionChange {
    SubscriptionChange {
        plan_id: Some(plan_id),
        status: Some(SubscriptionStatus::Active),
        current_period_ends_at: subscription_period_end(subscription),
        external_subscription_id: Some(subscription_id),
        external_customer_id: Some(customer_id),
    }
}

/// Applies an event to its tenant
///
/// Runs on a system transaction. Completed checkouts read the subscription
/// from Stripe to learn the price and period end.
///
/// # Errors
///
/// `Business` when the tenant or identifiers are missing; `Database` and
/// `Gateway` on infrastructure failures.
pub async fn process_event(
    conn: &mut PgConnection,
    gateway: &dyn PaymentGateway,
    event: &StripeEvent,
) -> Result<(), WebhookError> {
    info!(event_id = %event.id, event_type = %event.event_type, "Processing Stripe webhook event");

    let tenant = match tenant_lookup(event)? {
        TenantLookup::ById(id) => match Uuid::parse_str(&id) {
            Ok(id) => Tenant::find_by_id(conn, id).await?,
            Err(_) => None,
        },
        TenantLookup::ByCustomer(customer) => Tenant::find_by_external_customer_id(conn, &customer).await?,
        TenantLookup::Missing => None,
    }
    .ok_or_else(|| {
        WebhookError::Business(format!(
            "Could not find tenant for event {} with ID {}.",
            event.event_type, event.id
        ))
    })?;

    if event.created < tenant.updated_at {
        info!(event_id = %event.id, tenant_id = %tenant.id, "Skipping stale Stripe webhook event");
        return Ok(());
    }

    let change = match transition(event)? {
        Transition::Activate {
            subscription_id,
            customer_id,
        } => {
            let subscription = gateway
                .subscription_details(&subscription_id)
                .await?
                .ok_or_else(|| {
                    WebhookError::Business(format!("Stripe subscription {} not found.", subscription_id))
                })?;
            let price_id = subscription_price_id(&subscription).ok_or_else(|| {
                WebhookError::Business("Price ID not found in Stripe subscription object.".to_string())
            })?;

            let plan = Plan::find_by_external_price_id(conn, price_id).await?;
            if plan.is_none() {
                warn!(
                    price_id,
                    tenant_id = %tenant.id,
                    "No plan matches the Stripe price; clearing the tenant's plan"
                );
            }

            activation_change(plan.map(|p| p.id), subscription_id, customer_id, &subscription)
        }
        Transition::PastDue => SubscriptionChange {
            status: Some(SubscriptionStatus::PastDue),
            ..Default::default()
        },
        Transition::Canceled => SubscriptionChange {
            status: Some(SubscriptionStatus::Canceled),
            ..Default::default()
        },
        Transition::Inactive => SubscriptionChange {
            status: Some(SubscriptionStatus::Inactive),
            ..Default::default()
        },
        Transition::Unhandled => {
            info!(event_id = %event.id, event_type = %event.event_type, "Unhandled Stripe event type");
            return Ok(());
        }
    };

    Tenant::update_subscription(conn, tenant.id, change).await?;
    info!(
        event_id = %event.id,
        tenant_id = %tenant.id,
        event_type = %event.event_type,
        "Tenant subscription updated from Stripe event"
    );

    Ok(())
}
