use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ScheduleError;

pub type ProjectId = i64;
pub type MemberId = i64;
pub type ScheduleId = i64;
pub type TrackerId = i64;
pub type ResponseId = i64;
pub type InsightId = i64;
pub type ContentId = i64;

// ---------------------------------------------------------------------------
// TrackerStatus
// ---------------------------------------------------------------------------

/// Lifecycle of one check-in firing.
///
/// Transitions: `Created → EmailsSent → AboutToProcess → Completed`.
/// `AboutToProcess` may fall back to `EmailsSent` when summarization fails
/// so that a manual trigger can claim it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerStatus {
    Created,
    EmailsSent,
    AboutToProcess,
    Completed,
}

impl TrackerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackerStatus::Created => "created",
            TrackerStatus::EmailsSent => "emails_sent",
            TrackerStatus::AboutToProcess => "about_to_process",
            TrackerStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrackerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(TrackerStatus::Created),
            "emails_sent" => Ok(TrackerStatus::EmailsSent),
            "about_to_process" => Ok(TrackerStatus::AboutToProcess),
            "completed" => Ok(TrackerStatus::Completed),
            _ => Err(format!("unknown tracker status '{s}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// DiversionRange
// ---------------------------------------------------------------------------

/// How far the team's updates drift from the project description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiversionRange {
    #[serde(rename = "on track")]
    OnTrack,
    #[serde(rename = "slightly off")]
    SlightlyOff,
    #[serde(rename = "significantly off")]
    SignificantlyOff,
}

impl DiversionRange {
    pub fn as_str(self) -> &'static str {
        match self {
            DiversionRange::OnTrack => "on track",
            DiversionRange::SlightlyOff => "slightly off",
            DiversionRange::SignificantlyOff => "significantly off",
        }
    }
}

impl fmt::Display for DiversionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiversionRange {
    type Err = String;

    /// Accepts the canonical labels case-insensitively, with `_` or `-`
    /// standing in for spaces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "on track" => Ok(DiversionRange::OnTrack),
            "slightly off" => Ok(DiversionRange::SlightlyOff),
            "significantly off" => Ok(DiversionRange::SignificantlyOff),
            _ => Err(format!("unknown diversion range '{s}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Weekday names
// ---------------------------------------------------------------------------

/// Full English weekday name, as used in schedules and reminder payloads.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Parse a weekday name. Full names and three-letter abbreviations are
/// accepted in any case.
pub fn parse_weekday(name: &str) -> Result<Weekday, ScheduleError> {
    let lower = name.trim().to_lowercase();
    let day = match lower.as_str() {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => {
            return Err(ScheduleError::InvalidSchedule(format!(
                "unknown weekday '{name}'"
            )))
        }
    };
    Ok(day)
}
