/// Clients for external services
///
/// - `identity`: account management at the identity provider
/// - `payments`: checkout, billing portal and subscription lookups

pub mod identity;
pub mod payments;
