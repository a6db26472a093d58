/// Database layer for SaaSKit
///
/// This module provides connection pooling, migrations and RLS session
/// scoping.
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: Embedded migration runner
/// - `session`: Transaction-local RLS parameters
/// - Models are in the `models` module at crate root level
///
/// # Example
///
/// ```no_run
/// use saaskit_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
pub mod session;
