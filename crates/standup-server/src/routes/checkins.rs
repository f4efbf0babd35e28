use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use standup_core::model::ResponseFields;
use standup_core::submission::Submitted;
use standup_core::types::ProjectId;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct SubmitCheckinBody {
    /// Signed token from the reminder link.
    pub payload: String,
    pub project_id: ProjectId,
    pub did_yesterday: String,
    pub doing_today: String,
    pub blockers: String,
}

/// POST /api/checkins: record one member's answers for the day in the link.
///
/// When this response completes the day, the summary is generated before
/// replying and returned alongside the response.
pub async fn submit_checkin(
    State(app): State<AppState>,
    Json(body): Json<SubmitCheckinBody>,
) -> Result<(StatusCode, Json<Submitted>), AppError> {
    let engine = app.submissions.clone();
    let submitted = tokio::task::spawn_blocking(move || {
        engine.submit(
            &body.payload,
            body.project_id,
            ResponseFields {
                did_yesterday: body.did_yesterday,
                doing_today: body.doing_today,
                blockers: body.blockers,
            },
        )
    })
    .await
    .map_err(AppError::join)??;

    Ok((StatusCode::CREATED, Json(submitted)))
}
