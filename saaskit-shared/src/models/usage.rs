/// Metered usage records
///
/// Each row adds `usage_amount` units of a feature for a tenant. METER
/// entitlements compare the sum over the current billing window against the
/// plan's allowance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

/// Usage row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub feature_slug: String,
    pub usage_amount: i32,
    pub recorded_at: DateTime<Utc>,
}

impl UsageRecord {
    /// Appends a usage row
    pub async fn record(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        feature_slug: &str,
        usage_amount: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, UsageRecord>(
            r#"
            INSERT INTO usage_records (tenant_id, feature_slug, usage_amount)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(feature_slug)
        .bind(usage_amount)
        .fetch_one(conn)
        .await
    }

    /// Sums usage of a feature within `[start, end]`
    pub async fn total_between(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        feature_slug: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(usage_amount), 0)::BIGINT
            FROM usage_records
            WHERE tenant_id = $1
              AND feature_slug = $2
              AND recorded_at >= $3
              AND recorded_at <= $4
            "#,
        )
        .bind(tenant_id)
        .bind(feature_slug)
        .bind(start)
        .bind(end)
        .fetch_one(conn)
        .await
    }
}
