/// Unauthenticated plan listing
///
/// `GET /api/v1/public/plans` returns active plans with their entitlements,
/// for pricing pages.

use crate::{
    app::AppState,
    error::ApiResult,
    routes::plans::{with_entitlements, PlanResponse},
};
use axum::{extract::State, Json};
use saaskit_shared::{db::session::begin_system, models::plan::Plan};

pub async fn list_public_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<PlanResponse>>> {
    let mut tx = begin_system(&state.db).await?;

    let plans = Plan::list(&mut tx, true).await?;
    let plans = with_entitlements(&mut tx, plans).await?;

    tx.commit().await?;
    Ok(Json(plans))
}
