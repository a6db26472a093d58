/// Row-level-security session scoping
///
/// Tenant isolation is enforced by PostgreSQL policies that read three
/// transaction-local settings:
///
/// - `app.current_user_id`
/// - `app.current_tenant_id`
/// - `app.is_superadmin`
///
/// Every request opens one transaction, applies its [`SessionParams`] with
/// `set_config(name, value, true)`, and runs all of its queries on that
/// transaction. The settings vanish at commit or rollback, so a pooled
/// connection never leaks one request's identity into the next.
///
/// # Example
///
/// ```no_run
/// use saaskit_shared::db::session::{begin_scoped, SessionParams};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let params = SessionParams::tenant_user(Uuid::new_v4(), Uuid::new_v4());
/// let mut tx = begin_scoped(&pool, &params).await?;
///
/// // Only rows of that tenant are visible here
/// let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
///     .fetch_one(&mut *tx)
///     .await?;
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

/// Values applied to the RLS settings of a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionParams {
    pub user_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub is_superadmin: bool,
}

impl SessionParams {
    /// Privileged session used by trusted server-side flows
    pub fn system() -> Self {
        Self {
            user_id: None,
            tenant_id: None,
            is_superadmin: true,
        }
    }

    /// Regular tenant member
    pub fn tenant_user(user_id: Uuid, tenant_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            tenant_id: Some(tenant_id),
            is_superadmin: false,
        }
    }
}

/// Applies session parameters to the current transaction
///
/// Unset values are written as empty strings, which the policy helper
/// functions read as NULL. Must run inside a transaction; outside one the
/// settings would be dropped at the end of the statement.
pub async fn apply(conn: &mut PgConnection, params: &SessionParams) -> Result<(), sqlx::Error> {
    let user_id = params.user_id.map(|id| id.to_string()).unwrap_or_default();
    let tenant_id = params.tenant_id.map(|id| id.to_string()).unwrap_or_default();
    let is_superadmin = if params.is_superadmin { "true" } else { "false" };

    sqlx::query(
        r#"
        SELECT
            set_config('app.current_user_id', $1, true),
            set_config('app.current_tenant_id', $2, true),
            set_config('app.is_superadmin', $3, true)
        "#,
    )
    .bind(&user_id)
    .bind(&tenant_id)
    .bind(is_superadmin)
    .execute(&mut *conn)
    .await?;

    debug!(
        user_id = %user_id,
        tenant_id = %tenant_id,
        is_superadmin = params.is_superadmin,
        "Applied RLS session parameters"
    );

    Ok(())
}

/// Begins a transaction scoped to `params`
pub async fn begin_scoped(
    pool: &PgPool,
    params: &SessionParams,
) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    apply(&mut tx, params).await?;
    Ok(tx)
}

/// Begins a privileged system transaction
pub async fn begin_system(pool: &PgPool) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
    begin_scoped(pool, &SessionParams::system()).await
}
