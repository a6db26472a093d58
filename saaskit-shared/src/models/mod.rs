/// Database models for SaaSKit
///
/// Row structs and their queries. Every query takes a `&mut PgConnection`
/// and is meant to run on the request's RLS-scoped transaction, so the
/// functions here never filter by tenant themselves unless a lookup needs
/// an explicit tenant argument.
///
/// # Models
///
/// - `tenant`: Organizations and their subscription state
/// - `user`: Application-side user profiles
/// - `role`: Tenant roles carrying permission bitmasks
/// - `api_key`: Hashed API keys
/// - `audit_log`: Audit trail of sensitive actions
/// - `item`: Inventory items
/// - `customer`: Tenant customers
/// - `custom_object`: Tenant-defined object types and fields
/// - `record`: Records of custom objects and their validation
/// - `plan`: Plans and entitlements
/// - `usage`: Metered usage
/// - `billing`: Checkout sessions and webhook idempotency
///
/// # Example
///
/// ```no_run
/// use saaskit_shared::db::session::{begin_scoped, SessionParams};
/// use saaskit_shared::models::item::Item;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid, tenant_id: Uuid) -> Result<(), sqlx::Error> {
/// let mut tx = begin_scoped(&pool, &SessionParams::tenant_user(user_id, tenant_id)).await?;
/// let items = Item::list(&mut tx, 0, 100).await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

pub mod api_key;
pub mod audit_log;
pub mod billing;
pub mod custom_object;
pub mod customer;
pub mod item;
pub mod plan;
pub mod record;
pub mod role;
pub mod tenant;
pub mod usage;
pub mod user;
