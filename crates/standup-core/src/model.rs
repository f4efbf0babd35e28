use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::ScheduleTimes;
use crate::types::{
    ContentId, DiversionRange, InsightId, MemberId, ProjectId, ResponseId, ScheduleId, TrackerId,
    TrackerStatus,
};

// ---------------------------------------------------------------------------
// Project / ProjectMember
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    /// Product description handed to the summarizer as the alignment baseline.
    pub description: String,
    pub owner_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub active: bool,
}

impl Project {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub owner_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// A person's relation to a project. The invitation workflow owns the flags;
/// the check-in engine only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectMember {
    pub id: MemberId,
    pub project_id: ProjectId,
    pub email: String,
    pub active: bool,
    pub accepted: bool,
    pub rejected: bool,
    pub guest: bool,
    pub creator: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewMember {
    pub email: String,
    pub active: bool,
    pub accepted: bool,
    pub guest: bool,
    pub creator: bool,
}

impl NewMember {
    /// A member who has accepted the invitation and receives check-ins.
    pub fn active(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            active: true,
            accepted: true,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub project_id: ProjectId,
    pub times: ScheduleTimes,
    pub active: bool,
    pub ended: bool,
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Bookkeeping for one firing of a schedule on one local date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tracker {
    pub id: TrackerId,
    pub schedule_id: ScheduleId,
    pub local_date: NaiveDate,
    pub status: TrackerStatus,
    pub expected: u32,
    pub received: u32,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    /// Host that created the row; only used when debugging multi-instance runs.
    pub origin_host: String,
    /// Set while a summarization claim is held.
    pub claimed_at: Option<DateTime<Utc>>,
}

impl Tracker {
    pub fn is_complete(&self) -> bool {
        self.received >= self.expected
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// The three free-text answers of a check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFields {
    pub did_yesterday: String,
    pub doing_today: String,
    pub blockers: String,
}

#[derive(Debug, Clone)]
pub struct NewResponse {
    pub project_id: ProjectId,
    pub member_id: MemberId,
    pub schedule_id: ScheduleId,
    pub local_date: NaiveDate,
    pub local_weekday: String,
    pub fields: ResponseFields,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub id: ResponseId,
    pub project_id: ProjectId,
    pub member_id: MemberId,
    pub schedule_id: ScheduleId,
    pub local_date: NaiveDate,
    pub local_weekday: String,
    pub did_yesterday: String,
    pub doing_today: String,
    pub blockers: String,
    pub has_blocker: bool,
    pub created_at: DateTime<Utc>,
}

const NO_BLOCKER_PHRASES: &[&str] = &["none", "no blockers", "n/a", "na", "nope"];

/// Whether a blockers answer describes an actual blocker.
///
/// Empty answers, the stock "nothing" phrases and anything under four
/// characters are treated as no blocker.
pub fn is_blocker_present(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    if normalized.chars().count() < 4 {
        return false;
    }
    !NO_BLOCKER_PHRASES.contains(&normalized.as_str())
}

// ---------------------------------------------------------------------------
// Insight
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub id: InsightId,
    pub tracker_id: TrackerId,
    pub project_id: ProjectId,
    pub schedule_id: ScheduleId,
    pub local_date: NaiveDate,
    /// Responses consumed by the summarizer, in the order they were sent.
    pub response_ids: Vec<ResponseId>,
    pub summary: String,
    pub blockers: String,
    pub diversion_range: DiversionRange,
    pub diversion_context: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInsight {
    pub tracker_id: TrackerId,
    pub project_id: ProjectId,
    pub schedule_id: ScheduleId,
    pub local_date: NaiveDate,
    pub response_ids: Vec<ResponseId>,
    pub summary: String,
    pub blockers: String,
    pub diversion_range: DiversionRange,
    pub diversion_context: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// GeneratedContent
// ---------------------------------------------------------------------------

/// Narrative written from several days of insights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedContent {
    pub id: ContentId,
    pub project_id: ProjectId,
    pub owner_id: i64,
    pub local_dates: Vec<NaiveDate>,
    /// Sorted ascending.
    pub insight_ids: Vec<InsightId>,
    pub content: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

impl GeneratedContent {
    /// Whether this content already consumed every one of `ids`.
    pub fn covers(&self, ids: &[InsightId]) -> bool {
        ids.iter().all(|id| self.insight_ids.binary_search(id).is_ok())
    }
}

#[derive(Debug, Clone)]
pub struct NewContent {
    pub project_id: ProjectId,
    pub owner_id: i64,
    pub local_dates: Vec<NaiveDate>,
    pub insight_ids: Vec<InsightId>,
    pub content: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}
