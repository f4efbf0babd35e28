use axum::extract::Query;
use axum::Json;
use standup_core::schedule::{format_offset, ScheduleTimes};
use standup_core::types::weekday_name;

use crate::error::AppError;

#[derive(serde::Deserialize)]
pub struct ConvertQuery {
    /// Comma-separated weekday names, e.g. `Monday,Thursday`.
    pub days: String,
    /// `HH:MM` at the given offset.
    pub time: String,
    /// Whole-hour UTC offset: `+1`, `-5`, `UTC+3`, `0`.
    #[serde(default = "default_offset")]
    pub offset: String,
}

fn default_offset() -> String {
    "0".to_string()
}

/// GET /api/schedules/convert: preview the UTC days and time a local
/// schedule will fire at.
pub async fn convert(Query(query): Query<ConvertQuery>) -> Result<Json<serde_json::Value>, AppError> {
    let days: Vec<&str> = query
        .days
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .collect();
    if days.is_empty() {
        return Err(AppError::bad_request("days must name at least one weekday"));
    }
    let times = ScheduleTimes::parse(&days, &query.time, &query.offset)?;

    Ok(Json(serde_json::json!({
        "local_days": times.local_days().iter().map(|d| weekday_name(*d)).collect::<Vec<_>>(),
        "local_time": times.local_time().format("%H:%M").to_string(),
        "offset": format_offset(times.offset_hours()),
        "utc_days": times.utc_days().iter().map(|d| weekday_name(*d)).collect::<Vec<_>>(),
        "utc_time": times.utc_time().format("%H:%M").to_string(),
    })))
}
