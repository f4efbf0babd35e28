use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDate;
use standup_core::types::ProjectId;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct SendReminderBody {
    pub date: NaiveDate,
    pub email: String,
}

/// POST /api/projects/:id/reminders: re-send one member's link for a day
/// that was already dispatched.
pub async fn send_reminder(
    State(app): State<AppState>,
    Path(project_id): Path<ProjectId>,
    Json(body): Json<SendReminderBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let reminders = app.reminders.clone();
    let email = body.email.clone();
    tokio::task::spawn_blocking(move || {
        reminders.send_reminder(project_id, body.date, &body.email)
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(serde_json::json!({
        "project_id": project_id,
        "date": body.date,
        "email": email,
        "sent": true,
    })))
}
