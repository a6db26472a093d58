//! # SaaSKit Shared Library
//!
//! Domain core of the SaaSKit multi-tenant backend, used by the API server.
//!
//! ## Module Organization
//!
//! - `auth`: Credential verification, tenant-context resolution, permission
//!   bitmasks and authorization checks
//! - `db`: Connection pool, embedded migrations and RLS session scoping
//! - `models`: Row types and their queries
//! - `entitlements`: Plan-based feature gating

pub mod auth;
pub mod db;
pub mod entitlements;
pub mod models;

/// Current version of the SaaSKit shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
