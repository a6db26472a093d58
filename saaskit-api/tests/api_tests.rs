/// Integration tests for the SaaSKit API
///
/// The first group runs the full router over a pool that never connects,
/// covering everything decided before a query: authentication, request
/// validation, webhook signatures, middleware.
///
/// Tests marked `#[ignore]` need a migrated PostgreSQL database:
///
/// ```bash
/// DATABASE_URL=postgres://... cargo test -p saaskit-api -- --ignored
/// ```

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use common::{
    dodo_signature, empty_request, json_request, offline_app, send, stripe_signature, token_for,
    TestContext,
};
use saaskit_api::billing::{self, Receipt, WebhookAck, WebhookError};
use saaskit_shared::auth::jwt::{create_token, IdentityClaims};
use saaskit_shared::db::session::begin_system;
use saaskit_shared::models::billing::WebhookEvent;
use saaskit_shared::models::tenant::{SubscriptionChange, SubscriptionStatus, Tenant};
use serde_json::json;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Public endpoints and middleware
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_reports_degraded_without_database() {
    let app = offline_app();

    let (response, body) = send(&app, empty_request("GET", "/api/v1/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
    assert_eq!(body["version"], saaskit_api::VERSION);
}

#[tokio::test]
async fn test_security_headers_applied() {
    let app = offline_app();

    let (response, _) = send(&app, empty_request("GET", "/api/v1/health", None)).await;
    let headers = response.headers();

    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("content-security-policy"));
    // Not in production mode
    assert!(!headers.contains_key("strict-transport-security"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = offline_app();

    let (response, _) = send(&app, empty_request("GET", "/api/v1/does-not-exist", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_missing_credentials_rejected() {
    let app = offline_app();

    for uri in ["/api/v1/items", "/api/v1/users/me", "/api/v1/permissions", "/api/v1/plans"] {
        let (response, body) = send(&app, empty_request("GET", uri, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let app = offline_app();

    let (response, body) = send(&app, empty_request("GET", "/api/v1/items", Some("not-a-jwt"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Could not validate credentials");
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let app = offline_app();
    let claims = IdentityClaims::with_expiration(Uuid::new_v4(), None, Duration::hours(-2));
    let token = create_token(&claims, common::JWT_SECRET).unwrap();

    let (response, _) = send(&app, empty_request("GET", "/api/v1/items", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_rejected() {
    let app = offline_app();
    let claims = IdentityClaims::new(Uuid::new_v4(), None);
    let token = create_token(&claims, "another-secret-that-is-also-32-characters-long").unwrap();

    let (response, _) = send(&app, empty_request("GET", "/api/v1/items", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Identity proxy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_signup_proxies_to_identity_provider() {
    let app = offline_app();

    let request = json_request(
        "POST",
        "/api/v1/auth/signup",
        None,
        json!({ "email": "new@example.com", "password": "correct-horse" }),
    );
    let (response, body) = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        body["message"],
        "Signup successful. Please check your email to confirm your account."
    );
}

#[tokio::test]
async fn test_signup_validates_body() {
    let app = offline_app();

    let request = json_request(
        "POST",
        "/api/v1/auth/signup",
        None,
        json!({ "email": "not-an-email", "password": "short" }),
    );
    let (response, body) = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["field"].as_str())
        .collect();
    assert_eq!(fields, ["email", "password"]);
}

#[tokio::test]
async fn test_forgot_password_is_always_generic() {
    let app = offline_app();

    let request = json_request(
        "POST",
        "/api/v1/auth/forgot-password",
        None,
        json!({ "email": "nobody@example.com" }),
    );
    let (response, body) = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body["message"],
        "If an account with this email exists, a password reset link has been sent."
    );
}

// ---------------------------------------------------------------------------
// Onboarding checks that run before the database
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_onboarding_requires_terms() {
    let app = offline_app();
    let token = token_for(Uuid::new_v4(), Some("founder@example.com"));

    let request = json_request(
        "POST",
        "/api/v1/onboarding/tenant",
        Some(&token),
        json!({ "name": "Acme", "slug": "acme", "terms_accepted": false }),
    );
    let (response, body) = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You must accept the Terms and Conditions to proceed.");
}

#[tokio::test]
async fn test_onboarding_validates_slug_length() {
    let app = offline_app();
    let token = token_for(Uuid::new_v4(), Some("founder@example.com"));

    let request = json_request(
        "POST",
        "/api/v1/onboarding/tenant",
        Some(&token),
        json!({ "name": "Acme", "slug": "ac", "terms_accepted": true }),
    );
    let (response, body) = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "slug");
}

#[tokio::test]
async fn test_onboarding_needs_email_claim() {
    let app = offline_app();
    let token = token_for(Uuid::new_v4(), None);

    let request = json_request(
        "POST",
        "/api/v1/onboarding/tenant",
        Some(&token),
        json!({ "name": "Acme", "slug": "acme", "terms_accepted": true }),
    );
    let (response, body) = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Access token does not carry an email address.");
}

#[tokio::test]
async fn test_onboarding_rejects_api_keys() {
    let app = offline_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/onboarding/tenant")
        .header("content-type", "application/json")
        .header("x-api-key", "sk_live_abcdefghijklmnop")
        .body(Body::from(
            json!({ "name": "Acme", "slug": "acme", "terms_accepted": true }).to_string(),
        ))
        .unwrap();
    let (response, _) = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Webhook signatures
// ---------------------------------------------------------------------------

fn dodo_request(msg_id: &str, timestamp: i64, signature: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks/dodo")
        .header("webhook-id", msg_id)
        .header("webhook-timestamp", timestamp.to_string())
        .header("webhook-signature", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn stripe_request(signature: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks/stripe")
        .header("stripe-signature", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_dodo_webhook_bad_signature_is_400() {
    let app = offline_app();
    let body = json!({ "type": "subscription.active", "data": {} }).to_string();
    let now = Utc::now().timestamp();

    let forged = dodo_signature("msg_1", now, "{\"type\":\"something.else\"}");
    let (response, body) = send(&app, dodo_request("msg_1", now, &forged, &body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_dodo_webhook_stale_timestamp_is_400() {
    let app = offline_app();
    let body = json!({ "type": "subscription.active", "data": {} }).to_string();
    let old = Utc::now().timestamp() - 600;

    let signature = dodo_signature("msg_2", old, &body);
    let (response, _) = send(&app, dodo_request("msg_2", old, &signature, &body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dodo_webhook_invalid_json_is_400() {
    let app = offline_app();
    let body = "definitely not json";
    let now = Utc::now().timestamp();

    let signature = dodo_signature("msg_3", now, body);
    let (response, json) = send(&app, dodo_request("msg_3", now, &signature, body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Invalid JSON payload.");
}

#[tokio::test]
async fn test_stripe_webhook_bad_signature_is_acknowledged() {
    let app = offline_app();
    let body = json!({ "id": "evt_1", "type": "invoice.payment_failed" }).to_string();

    let request = stripe_request("t=1,v1=deadbeef", &body);
    let (response, json) = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn test_stripe_webhook_incomplete_event_is_acknowledged() {
    let app = offline_app();
    let body = json!({ "id": "evt_2" }).to_string();

    let signature = stripe_signature(Utc::now().timestamp(), &body);
    let (response, json) = send(&app, stripe_request(&signature, &body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json, json!({ "status": "error", "detail": "Invalid payload." }));
}

// ---------------------------------------------------------------------------
// Database-backed flows
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_item_crud() {
    let ctx = TestContext::new().await.unwrap();
    let token = ctx.admin_token.as_str();

    let (response, item) = send(
        &ctx.app,
        json_request(
            "POST",
            "/api/v1/items",
            Some(token),
            json!({ "name": "Widget", "price": 9.99, "quantity": 3 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(item["tenant_id"], ctx.tenant.id.to_string());
    let item_id = item["id"].as_str().unwrap().to_string();

    let (response, updated) = send(
        &ctx.app,
        json_request(
            "PUT",
            &format!("/api/v1/items/{}", item_id),
            Some(token),
            json!({ "quantity": 5 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(updated["quantity"], 5);
    assert_eq!(updated["name"], "Widget");

    let (response, list) = send(&ctx.app, empty_request("GET", "/api/v1/items?limit=10", Some(token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (response, _) = send(
        &ctx.app,
        empty_request("DELETE", &format!("/api/v1/items/{}", item_id), Some(token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (response, _) = send(
        &ctx.app,
        empty_request("GET", &format!("/api/v1/items/{}", item_id), Some(token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pagination_limits_enforced() {
    let ctx = TestContext::new().await.unwrap();

    let (response, _) = send(
        &ctx.app,
        empty_request("GET", "/api/v1/items?limit=1001", Some(&ctx.admin_token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_custom_object_records() {
    let ctx = TestContext::new().await.unwrap();
    let token = ctx.admin_token.as_str();

    let (response, _) = send(
        &ctx.app,
        json_request(
            "POST",
            "/api/v1/custom-objects",
            Some(token),
            json!({ "name": "Projects", "slug": "projects" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    for field in [
        json!({ "name": "Title", "slug": "title", "field_type": "text", "is_required": true }),
        json!({ "name": "Due", "slug": "due", "field_type": "date" }),
        json!({
            "name": "Status",
            "slug": "status",
            "field_type": "select",
            "options": { "options": ["open", "closed"] }
        }),
    ] {
        let (response, _) = send(
            &ctx.app,
            json_request("POST", "/api/v1/custom-objects/projects/fields", Some(token), field),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let (response, record) = send(
        &ctx.app,
        json_request(
            "POST",
            "/api/v1/records/projects",
            Some(token),
            json!({ "data": { "title": "Launch", "due": "2025-03-01T09:00:00Z", "status": "open" } }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(record["data"]["due"], "2025-03-01");

    let (response, error) = send(
        &ctx.app,
        json_request(
            "POST",
            "/api/v1/records/projects",
            Some(token),
            json!({ "data": { "status": "archived", "title": "Other" } }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error["message"].as_str().unwrap().contains("status"));

    let (response, object) = send(
        &ctx.app,
        empty_request("GET", "/api/v1/custom-objects/projects", Some(token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(object["fields"].as_array().unwrap().len(), 3);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_last_admin_cannot_delete_self() {
    let ctx = TestContext::new().await.unwrap();

    let (response, body) = send(
        &ctx.app,
        empty_request(
            "DELETE",
            &format!("/api/v1/users/{}", ctx.admin.id),
            Some(&ctx.admin_token),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Admins cannot delete themselves.");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_tenants_cannot_see_each_other() {
    let first = TestContext::new().await.unwrap();
    let second = TestContext::new().await.unwrap();

    let (_, item) = send(
        &first.app,
        json_request(
            "POST",
            "/api/v1/items",
            Some(&first.admin_token),
            json!({ "name": "Private", "price": 1.0 }),
        ),
    )
    .await;
    let item_id = item["id"].as_str().unwrap();

    let (response, _) = send(
        &second.app,
        empty_request("GET", &format!("/api/v1/items/{}", item_id), Some(&second.admin_token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    first.cleanup().await.unwrap();
    second.cleanup().await.unwrap();
}

// ---------------------------------------------------------------------------
// Webhook idempotency (database)
// ---------------------------------------------------------------------------

fn subscription_updated(event_id: &str, customer: &str) -> String {
    json!({
        "id": event_id,
        "type": "customer.subscription.updated",
        "created": Utc::now().timestamp() + 60,
        "data": { "object": { "customer": customer, "status": "active" } }
    })
    .to_string()
}

async fn deliver_stripe(ctx: &TestContext, body: &str) -> serde_json::Value {
    let signature = stripe_signature(Utc::now().timestamp(), body);
    let (response, json) = send(&ctx.app, stripe_request(&signature, body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    json
}

async fn stored_event(ctx: &TestContext, event_id: &str) -> Option<WebhookEvent> {
    let mut tx = begin_system(&ctx.db).await.unwrap();
    WebhookEvent::find(&mut tx, event_id).await.unwrap()
}

async fn link_customer(ctx: &TestContext, customer: &str) {
    let mut tx = begin_system(&ctx.db).await.unwrap();
    Tenant::update_subscription(
        &mut tx,
        ctx.tenant.id,
        SubscriptionChange {
            external_customer_id: Some(customer.to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_replayed_webhook_event_is_duplicate() {
    let ctx = TestContext::new().await.unwrap();
    let customer = format!("cus_{}", Uuid::new_v4().simple());
    link_customer(&ctx, &customer).await;

    let event_id = format!("evt_{}", Uuid::new_v4().simple());
    let body = subscription_updated(&event_id, &customer);

    let first = deliver_stripe(&ctx, &body).await;
    assert_eq!(first["status"], "processed");
    assert!(stored_event(&ctx, &event_id).await.unwrap().processed_successfully);

    let second = deliver_stripe(&ctx, &body).await;
    assert_eq!(second["status"], "duplicate");
    assert_eq!(second["message"], "Event already processed.");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_failed_webhook_event_is_reprocessed() {
    let ctx = TestContext::new().await.unwrap();
    let customer = format!("cus_{}", Uuid::new_v4().simple());
    let event_id = format!("evt_{}", Uuid::new_v4().simple());
    let body = subscription_updated(&event_id, &customer);

    // No tenant carries this customer id yet
    let first = deliver_stripe(&ctx, &body).await;
    assert_eq!(first["status"], "error");
    let stored = stored_event(&ctx, &event_id).await.unwrap();
    assert!(!stored.processed_successfully);

    let retry = deliver_stripe(&ctx, &body).await;
    assert_eq!(retry["status"], "error");

    link_customer(&ctx, &customer).await;
    let fixed = deliver_stripe(&ctx, &body).await;
    assert_eq!(fixed["status"], "processed");
    assert!(stored_event(&ctx, &event_id).await.unwrap().processed_successfully);

    let replay = deliver_stripe(&ctx, &body).await;
    assert_eq!(replay["status"], "duplicate");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_business_error_rolls_back_event_changes() {
    let ctx = TestContext::new().await.unwrap();
    let event_id = format!("evt_{}", Uuid::new_v4().simple());
    let payload = json!({ "id": event_id, "type": "invoice.payment_failed" });

    let receipt = billing::receive(&ctx.db, &event_id, "invoice.payment_failed", &payload)
        .await
        .unwrap();
    assert_eq!(receipt, Receipt::Process);

    let mut tx = begin_system(&ctx.db).await.unwrap();
    Tenant::update_subscription(
        &mut tx,
        ctx.tenant.id,
        SubscriptionChange {
            status: Some(SubscriptionStatus::PastDue),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let ack = billing::finish(tx, &event_id, Err(WebhookError::Business("no tenant".to_string())))
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::error("no tenant"));

    let mut tx = begin_system(&ctx.db).await.unwrap();
    let tenant = Tenant::find_by_id(&mut tx, ctx.tenant.id).await.unwrap().unwrap();
    assert_eq!(tenant.subscription_status, ctx.tenant.subscription_status);
    drop(tx);

    assert!(!stored_event(&ctx, &event_id).await.unwrap().processed_successfully);
    let again = billing::receive(&ctx.db, &event_id, "invoice.payment_failed", &payload)
        .await
        .unwrap();
    assert_eq!(again, Receipt::Process);

    ctx.cleanup().await.unwrap();
}
