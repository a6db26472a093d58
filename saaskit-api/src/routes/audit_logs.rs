/// Audit log endpoint
///
/// `GET /api/v1/audit-logs?skip=0&limit=100` lists the tenant's audit
/// trail, newest first. Tenant admins only.

use crate::{error::ApiResult, extract::Session, routes::Pagination};
use axum::{extract::Query, Json};
use saaskit_shared::{auth::authorization::require_tenant_admin, models::audit_log::AuditLog};

pub async fn list_audit_logs(
    mut session: Session,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<AuditLog>>> {
    let page = page.checked()?;
    require_tenant_admin(&mut session.tx, &session.user).await?;

    let logs = AuditLog::list(&mut session.tx, page.skip, page.limit).await?;
    session.commit().await?;
    Ok(Json(logs))
}
