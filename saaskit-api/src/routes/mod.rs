/// API route handlers
///
/// Every module maps to one URL prefix under `/api/v1`. Authenticated
/// handlers take a [`Session`](crate::extract::Session), run their queries on
/// its transaction and commit before answering.
///
/// # Modules
///
/// - `health`: Liveness and database status
/// - `auth`: Signup, password reset and invite completion via the identity provider
/// - `onboarding`: Self-service tenant creation
/// - `tenants`, `superadmin`: Tenant management
/// - `users`, `roles`, `permissions`: Membership and access control
/// - `items`, `customers`: Tenant resources
/// - `custom_objects`, `records`: User-defined objects
/// - `api_keys`: Personal API keys
/// - `audit_logs`: Audit trail
/// - `plans`, `public`, `subscriptions`: Billing plans and checkout
/// - `webhooks`: Payment provider callbacks

pub mod api_keys;
pub mod audit_logs;
pub mod auth;
pub mod custom_objects;
pub mod customers;
pub mod health;
pub mod items;
pub mod onboarding;
pub mod permissions;
pub mod plans;
pub mod public;
pub mod records;
pub mod roles;
pub mod subscriptions;
pub mod superadmin;
pub mod tenants;
pub mod users;
pub mod webhooks;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ApiResult;

/// Largest page a list endpoint returns
pub const MAX_PAGE_SIZE: i64 = 1000;

fn default_limit() -> i64 {
    100
}

/// `?skip=&limit=` query parameters of list endpoints
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct Pagination {
    #[serde(default)]
    #[validate(range(min = 0, message = "skip must not be negative"))]
    pub skip: i64,

    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000, message = "limit must be between 1 and 1000"))]
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}

impl Pagination {
    /// Returns the parameters once they passed validation
    ///
    /// # Errors
    ///
    /// 422 for a negative `skip` or a `limit` outside `1..=1000`.
    pub fn checked(self) -> ApiResult<Self> {
        self.validate()?;
        Ok(self)
    }
}

/// Plain `{ "message": ... }` body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
