/// Subscription plans and their entitlements
///
/// Plans form a public catalogue managed by superadmins. Each plan carries
/// a set of [`PlanEntitlement`]s keyed by feature slug; entitlements are
/// evaluated by the `entitlements` module.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE plans (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT NOT NULL UNIQUE,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     external_product_id TEXT,
///     external_price_id TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE plan_entitlements (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     plan_id UUID NOT NULL REFERENCES plans(id) ON DELETE CASCADE,
///     feature_slug TEXT NOT NULL,
///     entitlement_type TEXT NOT NULL,
///     value INTEGER NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (plan_id, feature_slug)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

/// Kinds of entitlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntitlementType {
    /// Feature on/off; granted when value is 1
    Flag,

    /// Upper bound on a countable resource
    Limit,

    /// Upper bound on usage within the billing period
    Meter,
}

impl EntitlementType {
    /// Converts type to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementType::Flag => "FLAG",
            EntitlementType::Limit => "LIMIT",
            EntitlementType::Meter => "METER",
        }
    }

    /// Parses type from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "FLAG" => Some(EntitlementType::Flag),
            "LIMIT" => Some(EntitlementType::Limit),
            "METER" => Some(EntitlementType::Meter),
            _ => None,
        }
    }
}

/// Plan row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,

    /// Inactive plans are hidden from the public catalogue
    pub is_active: bool,

    /// Product id at the payment provider (Dodo checkouts)
    pub external_product_id: Option<String>,

    /// Price id at the payment provider (Stripe checkouts)
    pub external_price_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entitlement row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlanEntitlement {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub feature_slug: String,

    /// See [`EntitlementType`]
    pub entitlement_type: String,

    pub value: i32,
    pub created_at: DateTime<Utc>,
}

impl PlanEntitlement {
    /// Gets the parsed entitlement type
    pub fn kind(&self) -> Option<EntitlementType> {
        EntitlementType::from_str(&self.entitlement_type)
    }
}

/// Input for creating a plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePlan {
    pub name: String,
    pub is_active: bool,
    pub external_product_id: Option<String>,
    pub external_price_id: Option<String>,
}

/// Input for updating a plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePlan {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub external_product_id: Option<String>,
    pub external_price_id: Option<String>,
}

impl Plan {
    /// Creates a plan
    ///
    /// # Errors
    ///
    /// Returns a database error if the name is taken.
    pub async fn create(conn: &mut PgConnection, data: CreatePlan) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Plan>(
            r#"
            INSERT INTO plans (name, is_active, external_product_id, external_price_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(data.name)
        .bind(data.is_active)
        .bind(data.external_product_id)
        .bind(data.external_price_id)
        .fetch_one(conn)
        .await
    }

    /// Finds a plan by ID
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Finds a plan by payment-provider product id
    pub async fn find_by_external_product_id(
        conn: &mut PgConnection,
        product_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE external_product_id = $1")
            .bind(product_id)
            .fetch_optional(conn)
            .await
    }

    /// Finds a plan by payment-provider price id
    pub async fn find_by_external_price_id(
        conn: &mut PgConnection,
        price_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE external_price_id = $1")
            .bind(price_id)
            .fetch_optional(conn)
            .await
    }

    /// Lists plans by name, optionally only active ones
    pub async fn list(conn: &mut PgConnection, only_active: bool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Plan>(
            "SELECT * FROM plans WHERE is_active OR NOT $1 ORDER BY name",
        )
        .bind(only_active)
        .fetch_all(conn)
        .await
    }

    /// Updates the provided fields
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdatePlan,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Plan>(
            r#"
            UPDATE plans
            SET name = COALESCE($2, name),
                is_active = COALESCE($3, is_active),
                external_product_id = COALESCE($4, external_product_id),
                external_price_id = COALESCE($5, external_price_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.is_active)
        .bind(data.external_product_id)
        .bind(data.external_price_id)
        .fetch_optional(conn)
        .await
    }
}

impl PlanEntitlement {
    /// Adds an entitlement to a plan
    ///
    /// # Errors
    ///
    /// Returns a database error if the plan already has this feature slug.
    pub async fn create(
        conn: &mut PgConnection,
        plan_id: Uuid,
        feature_slug: &str,
        entitlement_type: EntitlementType,
        value: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PlanEntitlement>(
            r#"
            INSERT INTO plan_entitlements (plan_id, feature_slug, entitlement_type, value)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(plan_id)
        .bind(feature_slug)
        .bind(entitlement_type.as_str())
        .bind(value)
        .fetch_one(conn)
        .await
    }

    /// Entitlements of one plan
    pub async fn list_for_plan(conn: &mut PgConnection, plan_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PlanEntitlement>(
            "SELECT * FROM plan_entitlements WHERE plan_id = $1 ORDER BY feature_slug",
        )
        .bind(plan_id)
        .fetch_all(conn)
        .await
    }

    /// Entitlements of several plans at once
    pub async fn list_for_plans(
        conn: &mut PgConnection,
        plan_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PlanEntitlement>(
            "SELECT * FROM plan_entitlements WHERE plan_id = ANY($1) ORDER BY feature_slug",
        )
        .bind(plan_ids)
        .fetch_all(conn)
        .await
    }

    /// The entitlement a plan grants for one feature
    pub async fn find_for_feature(
        conn: &mut PgConnection,
        plan_id: Uuid,
        feature_slug: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PlanEntitlement>(
            "SELECT * FROM plan_entitlements WHERE plan_id = $1 AND feature_slug = $2",
        )
        .bind(plan_id)
        .bind(feature_slug)
        .fetch_optional(conn)
        .await
    }

    /// Removes an entitlement
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM plan_entitlements WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
