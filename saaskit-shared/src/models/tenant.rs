/// Tenant model and database operations
///
/// A tenant is an isolated customer organization. Every tenant-owned row
/// references `tenants(id)` with `ON DELETE CASCADE`, so deleting a tenant
/// removes all of its data in one statement.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tenants (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT NOT NULL,
///     slug TEXT NOT NULL UNIQUE CHECK (char_length(slug) >= 3),
///     admin_user_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     tenant_data JSONB,
///     logo_path TEXT,
///     plan_id UUID REFERENCES plans(id) ON DELETE SET NULL,
///     subscription_status TEXT NOT NULL DEFAULT 'inactive',
///     current_period_ends_at TIMESTAMPTZ,
///     external_subscription_id TEXT,
///     external_customer_id TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     created_by UUID,
///     updated_by UUID
/// );
/// ```
///
/// All functions take a `&mut PgConnection` so they run inside the caller's
/// RLS-scoped transaction (see `db::session`).
///
/// # Example
///
/// ```no_run
/// use saaskit_shared::db::session::begin_system;
/// use saaskit_shared::models::tenant::{CreateTenant, Tenant};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let mut tx = begin_system(&pool).await?;
///
/// let tenant = Tenant::create(&mut tx, CreateTenant {
///     name: "Acme Corp".to_string(),
///     slug: "acme".to_string(),
///     ..Default::default()
/// }).await?;
///
/// tx.commit().await?;
/// println!("Created tenant: {}", tenant.id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use uuid::Uuid;

/// Subscription lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    Inactive,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    /// Converts status to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    /// Parses status from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "trialing" => Some(SubscriptionStatus::Trialing),
            "inactive" => Some(SubscriptionStatus::Inactive),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "canceled" => Some(SubscriptionStatus::Canceled),
            _ => None,
        }
    }

    /// Statuses a superadmin may assign manually
    pub fn is_assignable(&self) -> bool {
        !matches!(self, SubscriptionStatus::Canceled)
    }
}

/// Tenant model representing an organization
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,

    /// URL-safe unique identifier, at least 3 chars
    pub slug: String,

    /// User who onboarded the tenant
    pub admin_user_id: Option<Uuid>,

    /// Free-form tenant settings
    pub tenant_data: Option<JsonValue>,

    /// Storage path of the tenant logo
    pub logo_path: Option<String>,

    /// Currently subscribed plan
    pub plan_id: Option<Uuid>,

    /// See [`SubscriptionStatus`]
    pub subscription_status: String,

    pub current_period_ends_at: Option<DateTime<Utc>>,

    /// Subscription id at the payment provider
    pub external_subscription_id: Option<String>,

    /// Customer id at the payment provider
    pub external_customer_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl Tenant {
    /// Gets the parsed subscription status
    pub fn status(&self) -> Option<SubscriptionStatus> {
        SubscriptionStatus::from_str(&self.subscription_status)
    }

    /// Whether the tenant currently has an active subscription to a plan
    pub fn has_active_subscription(&self) -> bool {
        self.plan_id.is_some() && self.status() == Some(SubscriptionStatus::Active)
    }
}

/// Input for creating a new tenant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub slug: String,
    pub tenant_data: Option<JsonValue>,
    pub logo_path: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Input for updating an existing tenant
///
/// Only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub tenant_data: Option<JsonValue>,
    pub logo_path: Option<String>,
}

/// Subscription fields changed by billing flows
///
/// `plan_id` is tri-state: `None` leaves the plan alone, `Some(None)` clears
/// it and `Some(Some(id))` assigns a plan.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionChange {
    pub plan_id: Option<Option<Uuid>>,
    pub status: Option<SubscriptionStatus>,
    pub current_period_ends_at: Option<DateTime<Utc>>,
    pub external_subscription_id: Option<String>,
    pub external_customer_id: Option<String>,
}

impl Tenant {
    /// Creates a new tenant
    ///
    /// # Errors
    ///
    /// Returns a database error on slug conflict (`tenants_slug_key`).
    pub async fn create(conn: &mut PgConnection, data: CreateTenant) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (name, slug, tenant_data, logo_path, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
            "#,
        )
        .bind(data.name)
        .bind(data.slug)
        .bind(data.tenant_data)
        .bind(data.logo_path)
        .bind(data.created_by)
        .fetch_one(conn)
        .await
    }

    /// Finds a tenant by ID
    ///
    /// Returns `None` both when the tenant doesn't exist and when RLS hides it.
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Finds a tenant by its payment-provider customer id
    pub async fn find_by_external_customer_id(
        conn: &mut PgConnection,
        customer_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE external_customer_id = $1")
            .bind(customer_id)
            .fetch_optional(conn)
            .await
    }

    /// Lists tenants visible to the session, newest first
    pub async fn list(conn: &mut PgConnection, skip: i64, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants ORDER BY created_at DESC OFFSET $1 LIMIT $2",
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(conn)
        .await
    }

    /// Updates an existing tenant
    ///
    /// Only non-None fields in `data` are written.
    ///
    /// # Returns
    ///
    /// The updated tenant, or `None` if it doesn't exist
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdateTenant,
        updated_by: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE tenants SET updated_at = NOW(), updated_by = $2");
        let mut bind_count = 2;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.slug.is_some() {
            bind_count += 1;
            query.push_str(&format!(", slug = ${}", bind_count));
        }
        if data.tenant_data.is_some() {
            bind_count += 1;
            query.push_str(&format!(", tenant_data = ${}", bind_count));
        }
        if data.logo_path.is_some() {
            bind_count += 1;
            query.push_str(&format!(", logo_path = ${}", bind_count));
        }

        query.push_str(" WHERE id = $1 RETURNING *");

        let mut q = sqlx::query_as::<_, Tenant>(&query).bind(id).bind(updated_by);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(slug) = data.slug {
            q = q.bind(slug);
        }
        if let Some(tenant_data) = data.tenant_data {
            q = q.bind(tenant_data);
        }
        if let Some(logo_path) = data.logo_path {
            q = q.bind(logo_path);
        }

        q.fetch_optional(conn).await
    }

    /// Records the onboarding user as the tenant's admin
    pub async fn set_admin_user(
        conn: &mut PgConnection,
        id: Uuid,
        admin_user_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tenants SET admin_user_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(admin_user_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Applies a subscription change from a billing flow
    ///
    /// Only `Some` fields are written; `updated_at` always advances, which the
    /// Stripe webhook uses to detect stale events. `plan_id: Some(None)` writes
    /// NULL.
    pub async fn update_subscription(
        conn: &mut PgConnection,
        id: Uuid,
        change: SubscriptionChange,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE tenants SET updated_at = NOW()");
        let mut bind_count = 1;

        if change.plan_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", plan_id = ${}", bind_count));
        }
        if change.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(", subscription_status = ${}", bind_count));
        }
        if change.current_period_ends_at.is_some() {
            bind_count += 1;
            query.push_str(&format!(", current_period_ends_at = ${}", bind_count));
        }
        if change.external_subscription_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", external_subscription_id = ${}", bind_count));
        }
        if change.external_customer_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", external_customer_id = ${}", bind_count));
        }

        query.push_str(" WHERE id = $1 RETURNING *");

        let mut q = sqlx::query_as::<_, Tenant>(&query).bind(id);

        if let Some(plan_id) = change.plan_id {
            q = q.bind(plan_id);
        }
        if let Some(status) = change.status {
            q = q.bind(status.as_str());
        }
        if let Some(period_end) = change.current_period_ends_at {
            q = q.bind(period_end);
        }
        if let Some(subscription_id) = change.external_subscription_id {
            q = q.bind(subscription_id);
        }
        if let Some(customer_id) = change.external_customer_id {
            q = q.bind(customer_id);
        }

        q.fetch_optional(conn).await
    }

    /// Deletes a tenant and, through cascades, everything it owns
    ///
    /// # Returns
    ///
    /// true if a row was deleted
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_conversion() {
        assert_eq!(SubscriptionStatus::PastDue.as_str(), "past_due");
        assert_eq!(SubscriptionStatus::from_str("active"), Some(SubscriptionStatus::Active));
        assert_eq!(SubscriptionStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_assignable_statuses() {
        assert!(SubscriptionStatus::Active.is_assignable());
        assert!(SubscriptionStatus::PastDue.is_assignable());
        assert!(!SubscriptionStatus::Canceled.is_assignable());
    }

    #[test]
    fn test_has_active_subscription() {
        let now = Utc::now();
        let mut tenant = Tenant {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            slug: "acme".to_string(),
            admin_user_id: None,
            tenant_data: None,
            logo_path: None,
            plan_id: Some(Uuid::new_v4()),
            subscription_status: "active".to_string(),
            current_period_ends_at: None,
            external_subscription_id: None,
            external_customer_id: None,
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        };
        assert!(tenant.has_active_subscription());

        tenant.subscription_status = "past_due".to_string();
        assert!(!tenant.has_active_subscription());

        tenant.subscription_status = "active".to_string();
        tenant.plan_id = None;
        assert!(!tenant.has_active_subscription());
    }
}
