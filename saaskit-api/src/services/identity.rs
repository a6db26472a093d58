/// Identity provider client
///
/// User accounts and credentials live in the external identity provider
/// (Supabase GoTrue). The API only keeps profiles; anything touching
/// passwords, invitations or confirmation emails goes through
/// [`IdentityProvider`].
///
/// # API Reference
///
/// - Self-service calls (`/auth/v1/signup`, `/auth/v1/recover`) use the anon key
/// - Admin calls (`/auth/v1/invite`, `/auth/v1/admin/users`) use the service role key
/// - Both send the key as `apikey` and as a bearer token

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::IdentityConfig;

/// Errors returned by the identity provider
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// An account with this email exists
    #[error("User with this email already exists.")]
    AlreadyExists,

    /// Provider rejected the request
    #[error("Identity provider error: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response didn't have the expected shape
    #[error("Unexpected identity provider response: {0}")]
    InvalidResponse(String),
}

/// Account operations delegated to the identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Self-service signup; the provider sends the confirmation email
    async fn sign_up(&self, email: &str, password: &str) -> Result<(), IdentityError>;

    /// Sends a password reset email
    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError>;

    /// Creates an account and emails an invitation link
    ///
    /// Returns the new account's id.
    async fn invite_user(&self, email: &str, redirect_to: Option<&str>) -> Result<Uuid, IdentityError>;

    /// Creates a confirmed account with a password
    async fn create_user(&self, email: &str, password: &str) -> Result<Uuid, IdentityError>;

    /// Sets a user's password
    async fn update_password(&self, user_id: Uuid, password: &str) -> Result<(), IdentityError>;

    /// Deletes an account
    async fn delete_user(&self, user_id: Uuid) -> Result<(), IdentityError>;
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    id: Option<Uuid>,
    user: Option<Box<AccountResponse>>,
}

impl AccountResponse {
    fn account_id(&self) -> Option<Uuid> {
        self.id.or_else(|| self.user.as_ref().and_then(|u| u.account_id()))
    }
}

/// GoTrue REST client
#[derive(Clone)]
pub struct GoTrueClient {
    base_url: String,
    public: reqwest::Client,
    admin: reqwest::Client,
}

fn client_with_key(key: &str) -> Result<reqwest::Client, IdentityError> {
    let mut headers = HeaderMap::new();
    let invalid = |_| IdentityError::InvalidResponse("identity key contains invalid characters".to_string());
    headers.insert("apikey", HeaderValue::from_str(key).map_err(invalid)?);
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", key)).map_err(invalid)?,
    );

    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .timeout(std::time::Duration::from_secs(15))
        .build()?)
}

impl GoTrueClient {
    /// Creates a client for the configured project
    ///
    /// # Errors
    ///
    /// Returns error if a key isn't a valid header value or the HTTP client fails to build.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        Ok(Self {
            base_url: config.url.clone(),
            public: client_with_key(&config.anon_key)?,
            admin: client_with_key(&config.service_role_key)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, IdentityError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                ["msg", "message", "error_description", "error"]
                    .iter()
                    .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
            })
            .unwrap_or(body);

        if message.to_lowercase().contains("already") {
            return Err(IdentityError::AlreadyExists);
        }

        Err(IdentityError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn account_id(response: reqwest::Response) -> Result<Uuid, IdentityError> {
        let account: AccountResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        account
            .account_id()
            .ok_or_else(|| IdentityError::InvalidResponse("missing user id".to_string()))
    }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<(), IdentityError> {
        let response = self
            .public
            .post(self.url("/signup"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        let response = self
            .public
            .post(self.url("/recover"))
            .json(&json!({ "email": email }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn invite_user(&self, email: &str, redirect_to: Option<&str>) -> Result<Uuid, IdentityError> {
        let mut request = self.admin.post(self.url("/invite"));
        if let Some(redirect_to) = redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }
        let response = request.json(&json!({ "email": email })).send().await?;
        Self::account_id(response).await
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<Uuid, IdentityError> {
        let response = self
            .admin
            .post(self.url("/admin/users"))
            .json(&json!({
                "email": email,
                "password": password,
                "email_confirm": true,
            }))
            .send()
            .await?;
        Self::account_id(response).await
    }

    async fn update_password(&self, user_id: Uuid, password: &str) -> Result<(), IdentityError> {
        let response = self
            .admin
            .put(self.url(&format!("/admin/users/{}", user_id)))
            .json(&json!({ "password": password }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), IdentityError> {
        let response = self
            .admin
            .delete(self.url(&format!("/admin/users/{}", user_id)))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
