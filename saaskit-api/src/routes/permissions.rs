/// Permission catalogue
///
/// `GET /api/v1/permissions` returns every grantable permission grouped by
/// resource, for building role editors.

use crate::{error::ApiResult, extract::Session};
use axum::Json;
use saaskit_shared::auth::permissions::{permission_groups, PermissionGroup};

pub async fn list_permissions(session: Session) -> ApiResult<Json<Vec<PermissionGroup>>> {
    session.commit().await?;
    Ok(Json(permission_groups()))
}
