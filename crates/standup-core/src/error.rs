use chrono::NaiveDate;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ScheduleError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}

// ---------------------------------------------------------------------------
// SignerError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("unexpected payload kind '{found}', expected '{expected}'")]
    WrongKind { expected: String, found: String },

    #[error("unsupported payload version {0}")]
    UnsupportedVersion(u32),
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

// ---------------------------------------------------------------------------
// DeliveryError
// ---------------------------------------------------------------------------

/// A notifier could not hand a link to its recipient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery to {recipient} failed: {reason}")]
pub struct DeliveryError {
    pub recipient: String,
    pub reason: String,
}

impl DeliveryError {
    pub fn new(recipient: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// SummarizationError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SummarizationError {
    #[error("no responses recorded for this check-in")]
    NoResponses,

    #[error("summary already generated for this check-in")]
    AlreadySummarized,

    #[error("summarizer failed: {0}")]
    SummarizationFailed(String),

    #[error("check-in date {0} is in the future")]
    FutureDate(NaiveDate),

    #[error("no check-in schedule is set for this project")]
    NoSchedule,

    #[error("no check-in was sent for this date")]
    NoCheckInSent,

    #[error("no check-in responses submitted yet")]
    NoResponsesYet,

    #[error("expecting {expected} response(s), but {received} have been submitted")]
    IncompleteExpectation { expected: u32, received: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// SubmissionError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("invalid check-in link: {0}")]
    InvalidPayload(#[from] SignerError),

    #[error("not an active team member of this project")]
    NotATeamMember,

    #[error("no check-in exists for this link")]
    NoSuchCheckIn,

    #[error("all updates have been submitted for {0}")]
    AlreadyComplete(String),

    #[error("check-in already submitted for {0}")]
    DuplicateSubmission(String),

    #[error("response recorded, but summary generation failed: {0}")]
    Summarization(#[from] SummarizationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// ReminderError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("project not found or inactive: {0}")]
    ProjectNotFound(i64),

    #[error("date {0} is outside the project's active range")]
    OutOfRange(NaiveDate),

    #[error("no check-in is scheduled on {0}")]
    NotACheckInDay(NaiveDate),

    #[error("no check-in was sent for this date")]
    NoCheckInSent,

    #[error("summary already generated for this date, check-ins are closed")]
    AlreadyProcessed,

    #[error("not an active team member of this project")]
    NotATeamMember,

    #[error("reminder not sent: {0}")]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// ContentError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("project {0} not found or not owned by the requester")]
    NotProjectOwner(i64),

    #[error("no dates given")]
    NoDates,

    #[error("no insights exist for the given dates")]
    NoInsights,

    #[error("found {found} summarized day(s), content needs at least {required}")]
    NotEnoughSummaries { found: usize, required: usize },

    #[error("content generation failed: {0}")]
    GenerationFailed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// StandupError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StandupError {
    #[error("not initialized: no standup.yaml in {0}")]
    NotInitialized(String),

    #[error("project not found: {0}")]
    ProjectNotFound(i64),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Summarization(#[from] SummarizationError),

    #[error(transparent)]
    Reminder(#[from] ReminderError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StandupError>;
