use axum::extract::{Path, State};
use axum::Json;
use standup_core::analytics::{self, Dashboard, TREND_WINDOW_DAYS};

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/owners/:id/trends: updates and blockers per day, last two weeks.
pub async fn get_trends(
    State(app): State<AppState>,
    Path(owner_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let days = tokio::task::spawn_blocking(move || {
        analytics::trends(&app.db, owner_id, app.clock.now())
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(serde_json::json!({
        "owner_id": owner_id,
        "window_days": TREND_WINDOW_DAYS,
        "days": days,
    })))
}

/// GET /api/owners/:id/dashboard: the owner's projects with their status and
/// this month's counts.
pub async fn get_dashboard(
    State(app): State<AppState>,
    Path(owner_id): Path<i64>,
) -> Result<Json<Dashboard>, AppError> {
    let dashboard = tokio::task::spawn_blocking(move || {
        analytics::dashboard(&app.db, owner_id, app.clock.now())
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(dashboard))
}
