/// Plan entitlement enforcement
///
/// Features are gated by the entitlements of the tenant's plan. Access is
/// granted only while the tenant's subscription is `active`.
///
/// # Entitlement Kinds
///
/// - **FLAG**: feature on when value is 1
/// - **LIMIT**: count of a resource must stay below value (`max_users`
///   counts the tenant's users)
/// - **METER**: usage within the current billing window plus the amount
///   about to be consumed must not exceed value
///
/// The billing window is the 30 days ending at `current_period_ends_at`;
/// without a period end, usage counts as zero.
///
/// # Example
///
/// ```no_run
/// use saaskit_shared::auth::context::AuthenticatedUser;
/// use saaskit_shared::entitlements::check_entitlement;
/// use sqlx::PgConnection;
///
/// # async fn example(conn: &mut PgConnection, user: &AuthenticatedUser) -> Result<(), Box<dyn std::error::Error>> {
/// // Before inviting another user
/// check_entitlement(conn, user, "max_users", 1).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use sqlx::PgConnection;
use std::fmt;
use uuid::Uuid;

use crate::auth::context::AuthenticatedUser;
use crate::models::plan::{EntitlementType, PlanEntitlement};
use crate::models::tenant::Tenant;
use crate::models::usage::UsageRecord;
use crate::models::user::User;

/// Feature slug whose LIMIT is checked against the tenant's user count
pub const MAX_USERS: &str = "max_users";

/// Length of the metering window
pub const METER_WINDOW_DAYS: i64 = 30;

/// Entitlement enforcement error
#[derive(Debug)]
pub enum EntitlementError {
    /// No tenant, no plan, or subscription not active
    NoActiveSubscription,

    /// Plan doesn't include the feature (or the flag is off)
    FeatureNotIncluded(String),

    /// LIMIT reached
    LimitReached { feature: String, limit: i64, current: i64 },

    /// METER allowance would be exceeded
    QuotaExceeded { feature: String, limit: i64, used: i64 },

    /// Database error
    DatabaseError(sqlx::Error),
}

impl fmt::Display for EntitlementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntitlementError::NoActiveSubscription => write!(f, "No active subscription found."),
            EntitlementError::FeatureNotIncluded(feature) => {
                write!(f, "Your plan does not include the feature: {}.", feature)
            }
            EntitlementError::LimitReached { feature, limit, .. } => {
                write!(f, "You have reached the limit of {} for {}.", limit, feature)
            }
            EntitlementError::QuotaExceeded { feature, limit, used } => write!(
                f,
                "You have exceeded your quota for {} ({}/{}).",
                feature, used, limit
            ),
            EntitlementError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for EntitlementError {}

impl From<sqlx::Error> for EntitlementError {
    fn from(err: sqlx::Error) -> Self {
        EntitlementError::DatabaseError(err)
    }
}

/// The usage figure an entitlement is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// FLAGs have no usage
    None,

    /// Current count of the limited resource; `None` if it isn't tracked
    Count(Option<i64>),

    /// Metered usage in the window, plus the amount about to be consumed
    Metered { used: i64, consumed: i64 },
}

/// Decides an entitlement without touching the database
pub fn evaluate(
    feature: &str,
    kind: EntitlementType,
    value: i32,
    usage: Usage,
) -> Result<(), EntitlementError> {
    let limit = i64::from(value);

    match (kind, usage) {
        (EntitlementType::Flag, _) => {
            if value == 1 {
                Ok(())
            } else {
                Err(EntitlementError::FeatureNotIncluded(feature.to_string()))
            }
        }
        (EntitlementType::Limit, Usage::Count(Some(current))) if current >= limit => {
            Err(EntitlementError::LimitReached {
                feature: feature.to_string(),
                limit,
                current,
            })
        }
        (EntitlementType::Meter, Usage::Metered { used, consumed }) if used + consumed > limit => {
            Err(EntitlementError::QuotaExceeded {
                feature: feature.to_string(),
                limit,
                used,
            })
        }
        _ => Ok(()),
    }
}

/// Start and end of the metering window ending at `period_end`
pub fn meter_window(period_end: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (period_end - Duration::days(METER_WINDOW_DAYS), period_end)
}

/// Metered usage of a feature in the tenant's current window
pub async fn current_usage(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    feature_slug: &str,
    period_end: Option<DateTime<Utc>>,
) -> Result<i64, sqlx::Error> {
    match period_end {
        Some(end) => {
            let (start, end) = meter_window(end);
            UsageRecord::total_between(conn, tenant_id, feature_slug, start, end).await
        }
        None => Ok(0),
    }
}

/// Checks that the caller's plan grants `feature_slug`
///
/// Superadmins bypass the check.
///
/// # Arguments
///
/// * `conn` - The request's scoped connection
/// * `user` - Authenticated caller
/// * `feature_slug` - Feature to check
/// * `consumed` - Units about to be used (METER only)
///
/// # Errors
///
/// Any [`EntitlementError`]; the API maps all but database errors to 402.
pub async fn check_entitlement(
    conn: &mut PgConnection,
    user: &AuthenticatedUser,
    feature_slug: &str,
    consumed: i64,
) -> Result<(), EntitlementError> {
    if user.is_superadmin {
        return Ok(());
    }

    let tenant_id = user.tenant_id.ok_or(EntitlementError::NoActiveSubscription)?;
    let tenant = Tenant::find_by_id(conn, tenant_id)
        .await?
        .ok_or(EntitlementError::NoActiveSubscription)?;
    let plan_id = match tenant.plan_id {
        Some(plan_id) if tenant.has_active_subscription() => plan_id,
        _ => return Err(EntitlementError::NoActiveSubscription),
    };

    let entitlement = PlanEntitlement::find_for_feature(conn, plan_id, feature_slug)
        .await?
        .ok_or_else(|| EntitlementError::FeatureNotIncluded(feature_slug.to_string()))?;
    let kind = entitlement
        .kind()
        .ok_or_else(|| EntitlementError::FeatureNotIncluded(feature_slug.to_string()))?;

    let usage = match kind {
        EntitlementType::Flag => Usage::None,
        EntitlementType::Limit if feature_slug == MAX_USERS => {
            Usage::Count(Some(User::count_in_tenant(conn, tenant_id).await?))
        }
        EntitlementType::Limit => Usage::Count(None),
        EntitlementType::Meter => Usage::Metered {
            used: current_usage(conn, tenant_id, feature_slug, tenant.current_period_ends_at).await?,
            consumed,
        },
    };

    evaluate(feature_slug, kind, entitlement.value, usage)
}

/// Appends usage of a metered feature for the caller's tenant
///
/// Callers check the METER with [`check_entitlement`] first, on the same
/// transaction, so the check and the write commit together.
///
/// # Errors
///
/// `NoActiveSubscription` when the caller has no tenant.
pub async fn record_usage(
    conn: &mut PgConnection,
    user: &AuthenticatedUser,
    feature_slug: &str,
    amount: i32,
) -> Result<UsageRecord, EntitlementError> {
    let tenant_id = user.tenant_id.ok_or(EntitlementError::NoActiveSubscription)?;
    Ok(UsageRecord::record(conn, tenant_id, feature_slug, amount).await?)
}
