use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use standup_core::content::ContentOutcome;
use standup_core::types::ProjectId;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct GenerateContentBody {
    pub owner_id: i64,
    pub dates: Vec<NaiveDate>,
}

/// POST /api/projects/:id/content: write content from several days of
/// insights. 201 when new, 200 when an earlier piece already covered them.
pub async fn generate_content(
    State(app): State<AppState>,
    Path(project_id): Path<ProjectId>,
    Json(body): Json<GenerateContentBody>,
) -> Result<(StatusCode, Json<ContentOutcome>), AppError> {
    let content = app.content.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        content.generate(project_id, body.owner_id, &body.dates)
    })
    .await
    .map_err(AppError::join)??;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}
