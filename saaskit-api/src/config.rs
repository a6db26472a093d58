/// Configuration management for the API server
///
/// `.env` is loaded with `dotenvy`, then the process environment is read
/// through the `config` crate into a flat settings struct and validated into
/// the typed [`Config`].
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default `0.0.0.0:8000`)
/// - `PRODUCTION`: enables HSTS (default false)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
/// - `SUPABASE_URL`, `SUPABASE_KEY`, `SUPABASE_SERVICE_ROLE_KEY`: identity provider (required)
/// - `SUPABASE_JWT_SECRET`: HS256 secret of identity tokens (required, 32+ chars)
/// - `JWT_AUDIENCE`: expected `aud` claim (default `authenticated`)
/// - `SUPERADMIN_USER_ID`: identity-provider user id of the platform superadmin
/// - `PAYMENT_GATEWAY`: `stripe` or `dodo` (default `dodo`)
/// - `STRIPE_API_KEY`, `STRIPE_PUBLISHABLE_KEY`, `STRIPE_WEBHOOK_SECRET`
/// - `DODO_API_KEY`, `DODO_WEBHOOK_SECRET`, `DODO_BASE_URL`
/// - `CORS_ORIGINS_STR`: comma-separated origins, `*` for any (default `http://localhost:3000`)
/// - `FRONTEND_ACCEPT_INVITE_URL`: redirect target of invitation emails
///
/// # Example
///
/// ```no_run
/// use saaskit_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use saaskit_shared::auth::context::AuthSettings;
use saaskit_shared::auth::jwt::DEFAULT_AUDIENCE;
use saaskit_shared::db::pool::DatabaseConfig as PoolConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default Dodo Payments API (test mode)
pub const DEFAULT_DODO_BASE_URL: &str = "https://test.dodopayments.com";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub identity: IdentityConfig,
    pub payments: PaymentsConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS on)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Token validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HS256 secret of the identity provider
    ///
    /// IMPORTANT: must be kept secret.
    pub jwt_secret: String,

    pub audience: String,
    pub superadmin_user_id: Option<Uuid>,
}

/// Identity provider (GoTrue) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub url: String,

    /// Public key for self-service calls (signup, password recovery)
    pub anon_key: String,

    /// Admin key for user management
    pub service_role_key: String,

    /// Where invitation emails send the invited user
    pub accept_invite_url: Option<String>,
}

/// Which payment provider handles checkouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    Stripe,
    Dodo,
}

impl GatewayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::Stripe => "stripe",
            GatewayKind::Dodo => "dodo",
        }
    }
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stripe" => Ok(GatewayKind::Stripe),
            "dodo" => Ok(GatewayKind::Dodo),
            other => anyhow::bail!("PAYMENT_GATEWAY must be 'stripe' or 'dodo', got '{}'", other),
        }
    }
}

/// Payment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    pub gateway: GatewayKind,
    pub stripe: Option<StripeConfig>,
    pub dodo: Option<DodoConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    pub api_key: String,
    pub publishable_key: Option<String>,

    /// `whsec_...` signing secret of the webhook endpoint
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DodoConfig {
    pub api_key: String,

    /// Standard Webhooks secret (`whsec_<base64>`)
    pub webhook_secret: String,

    pub base_url: String,
}

/// Environment variables as read by the `config` crate
#[derive(Debug, Deserialize)]
struct RawSettings {
    api_host: String,
    api_port: u16,
    production: bool,
    database_url: Option<String>,
    database_max_connections: u32,
    supabase_url: Option<String>,
    supabase_key: Option<String>,
    supabase_service_role_key: Option<String>,
    supabase_jwt_secret: Option<String>,
    jwt_audience: String,
    superadmin_user_id: Option<String>,
    payment_gateway: String,
    stripe_api_key: Option<String>,
    stripe_publishable_key: Option<String>,
    stripe_webhook_secret: Option<String>,
    dodo_api_key: Option<String>,
    dodo_webhook_secret: Option<String>,
    dodo_base_url: String,
    cors_origins_str: String,
    frontend_accept_invite_url: Option<String>,
}

fn required(value: Option<String>, name: &str) -> anyhow::Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", name))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    /// - The selected payment gateway has no credentials
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_source(config::Environment::default())
    }

    /// Loads configuration from an environment source
    ///
    /// Tests pass `Environment::default().source(Some(map))`.
    pub fn from_source(environment: config::Environment) -> anyhow::Result<Self> {
        let raw: RawSettings = config::Config::builder()
            .set_default("api_host", "0.0.0.0")?
            .set_default("api_port", 8000)?
            .set_default("production", false)?
            .set_default("database_max_connections", 10)?
            .set_default("jwt_audience", DEFAULT_AUDIENCE)?
            .set_default("payment_gateway", "dodo")?
            .set_default("dodo_base_url", DEFAULT_DODO_BASE_URL)?
            .set_default("cors_origins_str", "http://localhost:3000")?
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> anyhow::Result<Self> {
        let jwt_secret = required(raw.supabase_jwt_secret, "SUPABASE_JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("SUPABASE_JWT_SECRET must be at least 32 characters long");
        }

        let superadmin_user_id = match non_empty(raw.superadmin_user_id) {
            Some(id) => Some(
                Uuid::parse_str(id.trim())
                    .map_err(|_| anyhow::anyhow!("SUPERADMIN_USER_ID must be a UUID"))?,
            ),
            None => None,
        };

        let gateway: GatewayKind = raw.payment_gateway.parse()?;

        let stripe = match (non_empty(raw.stripe_api_key), non_empty(raw.stripe_webhook_secret)) {
            (Some(api_key), Some(webhook_secret)) => Some(StripeConfig {
                api_key,
                publishable_key: non_empty(raw.stripe_publishable_key),
                webhook_secret,
            }),
            _ => None,
        };
        let dodo = match (non_empty(raw.dodo_api_key), non_empty(raw.dodo_webhook_secret)) {
            (Some(api_key), Some(webhook_secret)) => Some(DodoConfig {
                api_key,
                webhook_secret,
                base_url: raw.dodo_base_url.trim_end_matches('/').to_string(),
            }),
            _ => None,
        };

        match gateway {
            GatewayKind::Stripe if stripe.is_none() => {
                anyhow::bail!("STRIPE_API_KEY and STRIPE_WEBHOOK_SECRET are required when PAYMENT_GATEWAY=stripe")
            }
            GatewayKind::Dodo if dodo.is_none() => {
                anyhow::bail!("DODO_API_KEY and DODO_WEBHOOK_SECRET are required when PAYMENT_GATEWAY=dodo")
            }
            _ => {}
        }

        let cors_origins = raw
            .cors_origins_str
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            api: ApiConfig {
                host: raw.api_host,
                port: raw.api_port,
                cors_origins,
                production: raw.production,
            },
            database: DatabaseConfig {
                url: required(raw.database_url, "DATABASE_URL")?,
                max_connections: raw.database_max_connections,
            },
            auth: AuthConfig {
                jwt_secret,
                audience: raw.jwt_audience,
                superadmin_user_id,
            },
            identity: IdentityConfig {
                url: required(raw.supabase_url, "SUPABASE_URL")?
                    .trim_end_matches('/')
                    .to_string(),
                anon_key: required(raw.supabase_key, "SUPABASE_KEY")?,
                service_role_key: required(raw.supabase_service_role_key, "SUPABASE_SERVICE_ROLE_KEY")?,
                accept_invite_url: non_empty(raw.frontend_accept_invite_url),
            },
            payments: PaymentsConfig {
                gateway,
                stripe,
                dodo,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Settings used to authenticate requests
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            jwt_secret: self.auth.jwt_secret.clone(),
            audience: self.auth.audience.clone(),
            superadmin_user_id: self.auth.superadmin_user_id,
        }
    }

    /// Pool settings for the shared database layer
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::default().source(Some(map))
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgresql://localhost/saaskit"),
            ("SUPABASE_URL", "https://project.supabase.co/"),
            ("SUPABASE_KEY", "anon-key"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service-key"),
            ("SUPABASE_JWT_SECRET", "a-very-long-jwt-secret-of-at-least-32-chars"),
            ("DODO_API_KEY", "dodo-key"),
            ("DODO_WEBHOOK_SECRET", "whsec_c2VjcmV0"),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_source(env(&base())).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.auth.audience, "authenticated");
        assert_eq!(config.payments.gateway, GatewayKind::Dodo);
        assert_eq!(config.api.cors_origins, vec!["http://localhost:3000".to_string()]);
        assert_eq!(config.identity.url, "https://project.supabase.co");
        assert_eq!(
            config.payments.dodo.as_ref().map(|d| d.base_url.as_str()),
            Some(DEFAULT_DODO_BASE_URL)
        );
        assert!(!config.api.production);
        assert!(config.auth.superadmin_user_id.is_none());
    }

    #[test]
    fn test_overrides() {
        let admin = Uuid::new_v4().to_string();
        let mut vars = base();
        vars.push(("API_PORT", "9090"));
        vars.push(("PRODUCTION", "true"));
        vars.push(("CORS_ORIGINS_STR", "https://app.example.com, https://admin.example.com"));
        vars.push(("SUPERADMIN_USER_ID", admin.as_str()));

        let config = Config::from_source(env(&vars)).unwrap();

        assert_eq!(config.api.port, 9090);
        assert!(config.api.production);
        assert_eq!(config.api.cors_origins.len(), 2);
        assert_eq!(config.auth.superadmin_user_id.map(|u| u.to_string()), Some(admin));
    }

    #[test]
    fn test_missing_database_url() {
        let vars: Vec<_> = base().into_iter().filter(|(k, _)| *k != "DATABASE_URL").collect();
        let err = Config::from_source(env(&vars)).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let mut vars = base();
        vars.retain(|(k, _)| *k != "SUPABASE_JWT_SECRET");
        vars.push(("SUPABASE_JWT_SECRET", "short"));
        assert!(Config::from_source(env(&vars)).is_err());
    }

    #[test]
    fn test_stripe_gateway_requires_keys() {
        let mut vars = base();
        vars.push(("PAYMENT_GATEWAY", "stripe"));
        let err = Config::from_source(env(&vars)).unwrap_err();
        assert!(err.to_string().contains("STRIPE_API_KEY"));

        vars.push(("STRIPE_API_KEY", "sk_test_123"));
        vars.push(("STRIPE_WEBHOOK_SECRET", "whsec_abc"));
        let config = Config::from_source(env(&vars)).unwrap();
        assert_eq!(config.payments.gateway, GatewayKind::Stripe);
        assert!(config.payments.stripe.is_some());
    }

    #[test]
    fn test_invalid_gateway() {
        let mut vars = base();
        vars.push(("PAYMENT_GATEWAY", "paypal"));
        assert!(Config::from_source(env(&vars)).is_err());
    }

    #[test]
    fn test_bind_address() {
        let config = Config::from_source(env(&base())).unwrap();
        let settings = config.auth_settings();
        assert_eq!(settings.audience, "authenticated");
        assert_eq!(config.pool_config().max_connections, 10);
    }
}
