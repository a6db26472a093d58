/// Payment gateway clients
///
/// The active provider is chosen by `PAYMENT_GATEWAY`. Handlers talk to it
/// through [`PaymentGateway`]; webhook processing uses
/// [`PaymentGateway::subscription_details`] to read live subscription data.
///
/// # Providers
///
/// - **Stripe**: form-encoded REST API, plans referenced by price id
/// - **Dodo Payments**: JSON REST API, plans referenced by product id

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use saaskit_shared::models::plan::Plan;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::config::{DodoConfig, GatewayKind, StripeConfig};

/// Stripe API base URL
const STRIPE_BASE_URL: &str = "https://api.stripe.com/v1";

/// Errors returned by payment providers
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response
    #[error("Payment provider error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response didn't have the expected shape
    #[error("Unexpected payment provider response: {0}")]
    InvalidResponse(String),

    /// Provider has no such feature
    #[error("{0}")]
    Unsupported(&'static str),
}

/// Input of a hosted checkout
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    /// Provider-side plan reference (price id or product id)
    pub plan_reference: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    pub customer_email: Option<&'a str>,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
}

/// A checkout page created at the provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostedCheckout {
    pub session_id: String,
    pub checkout_url: String,
}

/// Operations of a payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Which provider this is
    fn kind(&self) -> GatewayKind;

    /// The plan id this provider sells, if the plan is configured for it
    fn plan_reference<'a>(&self, plan: &'a Plan) -> Option<&'a str> {
        match self.kind() {
            GatewayKind::Stripe => plan.external_price_id.as_deref(),
            GatewayKind::Dodo => plan.external_product_id.as_deref(),
        }
        .filter(|id| !id.is_empty())
    }

    /// Creates a hosted checkout for a subscription
    async fn create_checkout(&self, request: CheckoutRequest<'_>) -> Result<HostedCheckout, GatewayError>;

    /// Creates a self-service billing portal session and returns its URL
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, GatewayError>;

    /// Live subscription data; `None` if the provider doesn't know the id
    async fn subscription_details(&self, subscription_id: &str) -> Result<Option<JsonValue>, GatewayError>;
}

fn bearer_client(api_key: &str) -> Result<reqwest::Client, GatewayError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| GatewayError::InvalidResponse("API key contains invalid characters".to_string()))?,
    );

    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .timeout(std::time::Duration::from_secs(20))
        .build()?)
}

async fn error_from(response: reqwest::Response) -> GatewayError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    GatewayError::Api { status, message }
}

async fn json_body(response: reqwest::Response) -> Result<JsonValue, GatewayError> {
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    response
        .json()
        .await
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

fn string_field(value: &JsonValue, key: &str) -> Result<String, GatewayError> {
    value
        .get(key)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::InvalidResponse(format!("missing '{}'", key)))
}

/// Stripe REST client
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    base_url: String,
}

impl StripeGateway {
    /// Creates a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: bearer_client(&config.api_key)?,
            base_url: STRIPE_BASE_URL.to_string(),
        })
    }

    /// Form fields of a subscription checkout
    fn checkout_form(request: &CheckoutRequest<'_>) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", request.plan_reference.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "success_url",
                format!("{}?session_id={{CHECKOUT_SESSION_ID}}", request.success_url),
            ),
            ("cancel_url", request.cancel_url.to_string()),
            ("client_reference_id", request.tenant_id.to_string()),
            ("payment_method_collection", "always".to_string()),
        ];
        if let Some(email) = request.customer_email {
            form.push(("customer_email", email.to_string()));
        }
        form
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Stripe
    }

    async fn create_checkout(&self, request: CheckoutRequest<'_>) -> Result<HostedCheckout, GatewayError> {
        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .form(&Self::checkout_form(&request))
            .send()
            .await?;
        let session = json_body(response).await?;

        Ok(HostedCheckout {
            session_id: string_field(&session, "id")?,
            checkout_url: string_field(&session, "url")?,
        })
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(format!("{}/billing_portal/sessions", self.base_url))
            .form(&[("customer", customer_id), ("return_url", return_url)])
            .send()
            .await?;
        let session = json_body(response).await?;
        string_field(&session, "url")
    }

    async fn subscription_details(&self, subscription_id: &str) -> Result<Option<JsonValue>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/subscriptions/{}", self.base_url, subscription_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        json_body(response).await.map(Some)
    }
}

/// Dodo Payments REST client
#[derive(Clone)]
pub struct DodoGateway {
    client: reqwest::Client,
    base_url: String,
}

impl DodoGateway {
    /// Creates a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &DodoConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: bearer_client(&config.api_key)?,
            base_url: config.base_url.clone(),
        })
    }

    /// JSON body of a subscription checkout
    fn checkout_body(request: &CheckoutRequest<'_>) -> JsonValue {
        let email = request.customer_email.unwrap_or_default();
        let name = email.split('@').next().unwrap_or_default();

        json!({
            "product_cart": [{ "product_id": request.plan_reference, "quantity": 1 }],
            "customer": { "email": email, "name": name },
            "return_url": request.success_url,
            "metadata": {
                "internal_tenant_id": request.tenant_id.to_string(),
                "internal_user_id": request.user_id.to_string(),
            },
        })
    }
}

#[async_trait]
impl PaymentGateway for DodoGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Dodo
    }

    async fn create_checkout(&self, request: CheckoutRequest<'_>) -> Result<HostedCheckout, GatewayError> {
        let response = self
            .client
            .post(format!("{}/checkouts", self.base_url))
            .json(&Self::checkout_body(&request))
            .send()
            .await?;
        let session = json_body(response).await?;

        Ok(HostedCheckout {
            session_id: string_field(&session, "session_id")?,
            checkout_url: string_field(&session, "checkout_url")?,
        })
    }

    async fn create_portal_session(&self, _customer_id: &str, _return_url: &str) -> Result<String, GatewayError> {
        Err(GatewayError::Unsupported(
            "Customer portal not implemented for Dodo Payments yet.",
        ))
    }

    async fn subscription_details(&self, subscription_id: &str) -> Result<Option<JsonValue>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/subscriptions/{}", self.base_url, subscription_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        json_body(response).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn request(email: Option<&'static str>) -> CheckoutRequest<'static> {
        CheckoutRequest {
            plan_reference: "price_123",
            success_url: "https://app.example.com/billing/success",
            cancel_url: "https://app.example.com/billing",
            customer_email: email,
            tenant_id: Uuid::nil(),
            user_id: Uuid::nil(),
        }
    }

    #[test]
    fn test_stripe_checkout_form() {
        let form = StripeGateway::checkout_form(&request(Some("owner@example.com")));
        let get = |key: &str| form.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str());

        assert_eq!(get("mode"), Some("subscription"));
        assert_eq!(get("line_items[0][price]"), Some("price_123"));
        assert_eq!(
            get("success_url"),
            Some("https://app.example.com/billing/success?session_id={CHECKOUT_SESSION_ID}")
        );
        assert_eq!(get("client_reference_id"), Some(Uuid::nil().to_string().as_str()));
        assert_eq!(get("customer_email"), Some("owner@example.com"));
    }

    #[test]
    fn test_dodo_checkout_body() {
        let body = DodoGateway::checkout_body(&request(Some("jane.doe@example.com")));

        assert_eq!(body["product_cart"][0]["product_id"], "price_123");
        assert_eq!(body["product_cart"][0]["quantity"], 1);
        assert_eq!(body["customer"]["name"], "jane.doe");
        assert_eq!(body["metadata"]["internal_tenant_id"], Uuid::nil().to_string());
    }

    #[test]
    fn test_plan_reference_follows_gateway() {
        let now = Utc::now();
        let plan = Plan {
            id: Uuid::new_v4(),
            name: "Pro".to_string(),
            is_active: true,
            external_product_id: Some("pdt_1".to_string()),
            external_price_id: None,
            created_at: now,
            updated_at: now,
        };

        let dodo = DodoGateway::new(&DodoConfig {
            api_key: "key".to_string(),
            webhook_secret: "whsec_x".to_string(),
            base_url: "https://test.dodopayments.com".to_string(),
        })
        .unwrap();
        let stripe = StripeGateway::new(&StripeConfig {
            api_key: "sk_test".to_string(),
            publishable_key: None,
            webhook_secret: "whsec_y".to_string(),
        })
        .unwrap();

        assert_eq!(dodo.plan_reference(&plan), Some("pdt_1"));
        assert_eq!(stripe.plan_reference(&plan), None);
    }
}
