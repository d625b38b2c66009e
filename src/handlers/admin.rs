use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::MaybeSession,
    error::{ApiResult, ErrorBody},
    guard::require_admin,
    models::AdminDashboardStats,
};

/// get_admin_stats
///
/// [Admin Route] Counts and revenue for the dashboard. Revenue is the sum of
/// order totals that are paid or further along (never pending or cancelled).
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Stats", body = AdminDashboardStats),
        (status = 403, description = "Not Admin", body = ErrorBody)
    )
)]
pub async fn get_admin_stats(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
) -> ApiResult<Json<AdminDashboardStats>> {
    require_admin(session.as_ref())?;
    Ok(Json(state.repo.get_stats().await?))
}
