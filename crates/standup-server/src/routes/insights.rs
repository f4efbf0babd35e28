use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use standup_core::analytics::{self, InsightReport};
use standup_core::model::Insight;
use standup_core::types::ProjectId;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct GenerateInsightBody {
    pub date: NaiveDate,
    /// Summarize even if not every member has answered.
    #[serde(default)]
    pub force: bool,
}

/// POST /api/projects/:id/insights: generate the day's insight on demand.
pub async fn generate_insight(
    State(app): State<AppState>,
    Path(project_id): Path<ProjectId>,
    Json(body): Json<GenerateInsightBody>,
) -> Result<(StatusCode, Json<Insight>), AppError> {
    let manual = app.manual.clone();
    let insight = tokio::task::spawn_blocking(move || {
        manual.force_or_request(project_id, body.date, body.force)
    })
    .await
    .map_err(AppError::join)??;

    Ok((StatusCode::CREATED, Json(insight)))
}

/// GET /api/projects/:id/insights/:date: the insight, or why there is none yet.
pub async fn get_insight(
    State(app): State<AppState>,
    Path((project_id, date)): Path<(ProjectId, NaiveDate)>,
) -> Result<Json<InsightReport>, AppError> {
    let report = tokio::task::spawn_blocking(move || {
        analytics::insight_report(&app.db, app.clock.as_ref(), project_id, date)
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(report))
}
