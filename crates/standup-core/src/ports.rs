//! Collaborators the engine calls out to: the summarizer and the notifier.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DeliveryError;
use crate::types::DiversionRange;

// ---------------------------------------------------------------------------
// SummarizerPort
// ---------------------------------------------------------------------------

/// One member's check-in as handed to the summarizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub email: String,
    pub did_yesterday: String,
    pub doing_today: String,
    pub blockers: String,
}

/// What the summarizer must return. Implementations fail rather than fill in
/// a missing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryDraft {
    pub summary: String,
    pub blockers: String,
    pub diversion_range: DiversionRange,
    pub diversion_context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SummarizerFailure(pub String);

pub trait SummarizerPort: Send + Sync {
    fn summarize(
        &self,
        responses: &[ResponseRecord],
        project_description: &str,
    ) -> Result<SummaryDraft, SummarizerFailure>;

    /// Turn several days of summaries into one piece of narrative content.
    fn write_content(
        &self,
        _summaries: &[String],
        _project_description: &str,
    ) -> Result<String, SummarizerFailure> {
        Err(SummarizerFailure(
            "this summarizer does not write content".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// NotifierPort
// ---------------------------------------------------------------------------

pub trait NotifierPort: Send + Sync {
    /// Deliver a check-in link. Callers log failures and carry on.
    fn send_checkin_reminder(&self, email: &str, link: &str) -> Result<(), DeliveryError>;
}

/// Notifier that only writes the link to the log. Used when no mail relay is
/// configured and in local runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotifierPort for LogNotifier {
    fn send_checkin_reminder(&self, email: &str, link: &str) -> Result<(), DeliveryError> {
        tracing::info!(%email, %link, "check-in reminder");
        Ok(())
    }
}
