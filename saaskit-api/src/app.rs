/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use saaskit_api::{app::AppState, config::Config};
/// use saaskit_shared::db::pool::create_pool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.pool_config()).await?;
/// let state = AppState::from_config(pool, config)?;
/// let app = saaskit_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::{Config, GatewayKind};
use crate::middleware::security::SecurityHeadersLayer;
use crate::services::identity::{GoTrueClient, IdentityProvider};
use crate::services::payments::{DodoGateway, PaymentGateway, StripeGateway};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use saaskit_shared::auth::context::{AuthSettings, API_KEY_HEADER};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Token and API key settings
    pub auth: Arc<AuthSettings>,

    /// Identity provider client
    pub identity: Arc<dyn IdentityProvider>,

    /// Active payment gateway
    pub payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    /// Creates new application state from ready-made service clients
    pub fn new(
        db: PgPool,
        config: Config,
        identity: Arc<dyn IdentityProvider>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            db,
            auth: Arc::new(config.auth_settings()),
            config: Arc::new(config),
            identity,
            payments,
        }
    }

    /// Creates state with the HTTP clients named by the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be built or the selected gateway
    /// has no credentials.
    pub fn from_config(db: PgPool, config: Config) -> anyhow::Result<Self> {
        let identity: Arc<dyn IdentityProvider> = Arc::new(GoTrueClient::new(&config.identity)?);

        let payments: Arc<dyn PaymentGateway> = match config.payments.gateway {
            GatewayKind::Stripe => {
                let stripe = config
                    .payments
                    .stripe
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("Stripe is not configured"))?;
                Arc::new(StripeGateway::new(stripe)?)
            }
            GatewayKind::Dodo => {
                let dodo = config
                    .payments
                    .dodo
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("Dodo Payments is not configured"))?;
                Arc::new(DodoGateway::new(dodo)?)
            }
        };

        Ok(Self::new(db, config, identity, payments))
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /api/v1
/// ├── /health                          # public
/// ├── /public/plans                    # public
/// ├── /webhooks/{dodo,stripe}          # signature-verified
/// ├── /auth/{signup,forgot-password}   # public, proxied to the identity provider
/// ├── /auth/complete-invite            # authenticated, terms not yet accepted
/// ├── /onboarding/tenant               # JWT, no profile yet
/// ├── /tenants, /users, /roles, /items, /customers,
/// │   /custom-objects, /records, /api-keys, /audit-logs,
/// │   /subscriptions, /permissions     # authenticated, RLS-scoped
/// └── /plans, /superadmin              # superadmin
/// ```
///
/// Authentication is done per handler by the [`crate::extract::Session`]
/// extractor, which opens the request's RLS-scoped transaction.
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Response compression
/// 4. Security headers
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let auth_routes = Router::new()
        .route("/signup", post(routes::auth::signup))
        .route("/forgot-password", post(routes::auth::forgot_password))
        .route("/complete-invite", post(routes::auth::complete_invite));

    let tenant_routes = Router::new()
        .route("/", post(routes::tenants::create_tenant))
        .route(
            "/me",
            get(routes::tenants::get_my_tenant).put(routes::tenants::update_my_tenant),
        );

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users))
        .route("/me", get(routes::users::get_me))
        .route("/invite", post(routes::users::invite_user))
        .route(
            "/:user_id",
            put(routes::users::update_user_role).delete(routes::users::delete_user),
        );

    let role_routes = Router::new()
        .route("/", get(routes::roles::list_roles).post(routes::roles::create_role))
        .route(
            "/:role_id",
            get(routes::roles::get_role)
                .put(routes::roles::update_role)
                .delete(routes::roles::delete_role),
        );

    let item_routes = Router::new()
        .route("/", get(routes::items::list_items).post(routes::items::create_item))
        .route(
            "/:item_id",
            get(routes::items::get_item)
                .put(routes::items::update_item)
                .delete(routes::items::delete_item),
        );

    let customer_routes = Router::new()
        .route(
            "/",
            get(routes::customers::list_customers).post(routes::customers::create_customer),
        )
        .route(
            "/:customer_id",
            get(routes::customers::get_customer)
                .put(routes::customers::update_customer)
                .delete(routes::customers::delete_customer),
        );

    let api_key_routes = Router::new()
        .route(
            "/",
            get(routes::api_keys::list_api_keys).post(routes::api_keys::create_api_key),
        )
        .route("/:api_key_id", delete(routes::api_keys::delete_api_key));

    let custom_object_routes = Router::new()
        .route(
            "/",
            get(routes::custom_objects::list_custom_objects)
                .post(routes::custom_objects::create_custom_object),
        )
        .route("/:object_slug", get(routes::custom_objects::get_custom_object))
        .route("/:object_slug/fields", post(routes::custom_objects::create_custom_field));

    let record_routes = Router::new()
        .route(
            "/:object_slug",
            get(routes::records::list_records).post(routes::records::create_record),
        )
        .route(
            "/:object_slug/:record_id",
            get(routes::records::get_record)
                .put(routes::records::update_record)
                .delete(routes::records::delete_record),
        );

    let plan_routes = Router::new()
        .route("/", get(routes::plans::list_plans).post(routes::plans::create_plan))
        .route("/:plan_id", put(routes::plans::update_plan))
        .route("/:plan_id/entitlements", post(routes::plans::create_entitlement))
        .route(
            "/entitlements/:entitlement_id",
            delete(routes::plans::delete_entitlement),
        );

    let subscription_routes = Router::new()
        .route("/me", get(routes::subscriptions::get_my_subscription))
        .route(
            "/checkout-session",
            post(routes::subscriptions::create_checkout_session),
        )
        .route(
            "/customer-portal-session",
            post(routes::subscriptions::create_customer_portal_session),
        );

    let superadmin_routes = Router::new()
        .route("/tenants", get(routes::superadmin::list_tenants))
        .route(
            "/tenants/:tenant_id",
            get(routes::superadmin::get_tenant)
                .put(routes::superadmin::update_tenant)
                .delete(routes::superadmin::delete_tenant),
        )
        .route(
            "/tenants/:tenant_id/assign-plan",
            post(routes::superadmin::assign_plan),
        );

    let webhook_routes = Router::new()
        .route("/dodo", post(routes::webhooks::dodo_webhook))
        .route("/stripe", post(routes::webhooks::stripe_webhook));

    let v1_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/public/plans", get(routes::public::list_public_plans))
        .route("/onboarding/tenant", post(routes::onboarding::onboard_tenant))
        .route("/audit-logs", get(routes::audit_logs::list_audit_logs))
        .route("/permissions", get(routes::permissions::list_permissions))
        .nest("/auth", auth_routes)
        .nest("/tenants", tenant_routes)
        .nest("/users", user_routes)
        .nest("/roles", role_routes)
        .nest("/items", item_routes)
        .nest("/customers", customer_routes)
        .nest("/api-keys", api_key_routes)
        .nest("/custom-objects", custom_object_routes)
        .nest("/records", record_routes)
        .nest("/plans", plan_routes)
        .nest("/subscriptions", subscription_routes)
        .nest("/superadmin", superadmin_routes)
        .nest("/webhooks", webhook_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                HeaderName::from_static(API_KEY_HEADER),
            ])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .nest("/api/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
