/// Authentication and authorization
///
/// This module provides the per-request security pipeline of SaaSKit:
///
/// # Modules
///
/// - [`jwt`]: Identity-provider token validation
/// - [`api_key`]: API key generation, prefix parsing and Argon2 hashing
/// - [`permissions`]: Bitmask permission model
/// - [`context`]: Credential extraction and tenant-context resolution
/// - [`authorization`]: Terms, permission, tenant-admin and superadmin checks
///
/// # Security Features
///
/// - **JWT**: HS256 with audience and expiry validation
/// - **API Keys**: 256-bit random secrets, Argon2id hashes, prefix lookup
/// - **Tenant isolation**: resolved identity is written to transaction-local
///   settings read by PostgreSQL row-level security policies
///
/// # Example
///
/// ```no_run
/// use saaskit_shared::auth::permissions::{Permission, PermissionSet};
/// use saaskit_shared::auth::api_key::generate_api_key;
///
/// let viewer = PermissionSet::from_names(["ITEMS_READ"]).unwrap();
/// assert!(viewer.contains(Permission::ItemsRead));
///
/// let key = generate_api_key();
/// assert!(key.full_key.starts_with("sk_live_"));
/// ```

pub mod api_key;
pub mod authorization;
pub mod context;
pub mod jwt;
pub mod permissions;
