use std::path::Path;
use std::sync::Arc;

use insight_agent::GeminiSummarizer;
use standup_core::clock::{Clock, SystemClock};
use standup_core::config::{Config, LinksConfig};
use standup_core::content::ContentService;
use standup_core::dispatch::Dispatcher;
use standup_core::manual::ManualSummaryTrigger;
use standup_core::payload::PayloadSigner;
use standup_core::ports::{
    LogNotifier, NotifierPort, ResponseRecord, SummarizerFailure, SummarizerPort, SummaryDraft,
};
use standup_core::reminder::ReminderService;
use standup_core::store::CheckinDb;
use standup_core::submission::SubmissionEngine;
use standup_core::summarize::SummarizationCoordinator;

/// Collaborators the engines are assembled from.
pub struct Collaborators {
    pub db: Arc<CheckinDb>,
    pub summarizer: Arc<dyn SummarizerPort>,
    pub notifier: Arc<dyn NotifierPort>,
    pub clock: Arc<dyn Clock>,
    pub signer: PayloadSigner,
    pub links: LinksConfig,
    pub instance: String,
    /// Summarization claims older than this are released by each sweep.
    pub stale_claim_after: chrono::Duration,
}

/// Shared application state passed to all route handlers and the scheduler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<CheckinDb>,
    pub clock: Arc<dyn Clock>,
    pub links: LinksConfig,
    pub signer: PayloadSigner,
    pub dispatcher: Arc<Dispatcher>,
    pub submissions: Arc<SubmissionEngine>,
    pub manual: Arc<ManualSummaryTrigger>,
    pub reminders: Arc<ReminderService>,
    pub content: Arc<ContentService>,
}

impl AppState {
    pub fn new(parts: Collaborators) -> Self {
        let Collaborators {
            db,
            summarizer,
            notifier,
            clock,
            signer,
            links,
            instance,
            stale_claim_after,
        } = parts;

        let coordinator = Arc::new(SummarizationCoordinator::new(
            db.clone(),
            summarizer.clone(),
            clock.clone(),
        ));
        Self {
            dispatcher: Arc::new(Dispatcher::new(
                db.clone(),
                notifier.clone(),
                signer.clone(),
                links.clone(),
                instance,
            )
            .with_stale_claim_after(stale_claim_after)),
            submissions: Arc::new(SubmissionEngine::new(
                db.clone(),
                signer.clone(),
                coordinator.clone(),
                clock.clone(),
                links.reminder_ttl(),
            )),
            manual: Arc::new(ManualSummaryTrigger::new(
                db.clone(),
                coordinator,
                clock.clone(),
            )),
            reminders: Arc::new(ReminderService::new(
                db.clone(),
                notifier,
                signer.clone(),
                links.clone(),
                clock.clone(),
            )),
            content: Arc::new(ContentService::new(db.clone(), summarizer, clock.clone())),
            db,
            clock,
            links,
            signer,
        }
    }

    /// Open the database under `root` and wire the production collaborators:
    /// system clock, log notifier and the Gemini summarizer.
    pub fn from_config(root: &Path, config: &Config) -> anyhow::Result<Self> {
        let db_path = config.database_path(root);
        let db = Arc::new(CheckinDb::open(&db_path)?);
        tracing::debug!(path = %db_path.display(), "database opened");

        let signer = PayloadSigner::new(Config::signing_secret()?)?;
        let summarizer: Arc<dyn SummarizerPort> =
            match GeminiSummarizer::from_config(&config.summarizer) {
                Ok(gemini) => Arc::new(gemini),
                Err(e) => {
                    tracing::warn!(error = %e, "summarizer disabled");
                    Arc::new(UnavailableSummarizer(e.to_string()))
                }
            };

        Ok(Self::new(Collaborators {
            db,
            summarizer,
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            signer,
            links: config.links.clone(),
            instance: config.scheduler.instance(),
            stale_claim_after: config.scheduler.stale_claim_after(),
        }))
    }
}

/// Stands in for the model client when it cannot be built, so that
/// submissions still record and only the summary step fails.
struct UnavailableSummarizer(String);

impl SummarizerPort for UnavailableSummarizer {
    fn summarize(
        &self,
        _responses: &[ResponseRecord],
        _project_description: &str,
    ) -> Result<SummaryDraft, SummarizerFailure> {
        Err(SummarizerFailure(self.0.clone()))
    }
}
