//! # SaaSKit API Server
//!
//! Multi-tenant SaaS backend: tenants, users and roles, tenant-defined
//! objects and records, plans with entitlements, and Stripe/Dodo billing.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p saaskit-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines and `RUST_LOG` to override the
//! default filter.

use saaskit_api::{
    app::{build_router, AppState},
    config::Config,
};
use saaskit_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "saaskit_api=debug,saaskit_shared=info,tower_http=debug".into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("SaaSKit API Server v{} starting...", saaskit_api::VERSION);

    let config = Config::from_env()?;
    tracing::info!(
        gateway = config.payments.gateway.as_str(),
        production = config.api.production,
        "Configuration loaded"
    );

    let pool = create_pool(config.pool_config()).await?;
    run_migrations(&pool).await?;

    let address = config.bind_address();
    let state = AppState::from_config(pool.clone(), config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown signal received, closing database pool...");
    close_pool(pool).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
