//! Fixtures shared by the engine tests.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::clock::{Clock, ManualClock};
use crate::config::LinksConfig;
use crate::dispatch::Dispatcher;
use crate::error::DeliveryError;
use crate::model::{
    NewMember, NewProject, NewResponse, Project, ProjectMember, Response, ResponseFields,
    Schedule, Tracker,
};
use crate::payload::{PayloadSigner, ReminderPayload};
use crate::ports::{NotifierPort, ResponseRecord, SummarizerFailure, SummarizerPort, SummaryDraft};
use crate::schedule::ScheduleTimes;
use crate::store::{CheckinDb, RecordOutcome};
use crate::summarize::SummarizationCoordinator;
use crate::types::DiversionRange;

// ---------------------------------------------------------------------------
// ScriptedSummarizer
// ---------------------------------------------------------------------------

type SummarizerCall = (Vec<ResponseRecord>, String);

pub struct ScriptedSummarizer {
    outcome: Result<SummaryDraft, String>,
    calls: Mutex<Vec<SummarizerCall>>,
    content_calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedSummarizer {
    pub fn ok() -> Self {
        Self {
            outcome: Ok(SummaryDraft {
                summary: "Radio wiring is done; testing starts today.".into(),
                blockers: "Vendor keys outstanding.".into(),
                diversion_range: DiversionRange::OnTrack,
                diversion_context: "Work matches the lander plan.".into(),
            }),
            calls: Mutex::new(Vec::new()),
            content_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
            content_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<SummarizerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn content_calls(&self) -> Vec<Vec<String>> {
        self.content_calls.lock().unwrap().clone()
    }
}

impl SummarizerPort for ScriptedSummarizer {
    fn summarize(
        &self,
        responses: &[ResponseRecord],
        project_description: &str,
    ) -> Result<SummaryDraft, SummarizerFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((responses.to_vec(), project_description.to_string()));
        self.outcome.clone().map_err(SummarizerFailure)
    }

    fn write_content(
        &self,
        summaries: &[String],
        _project_description: &str,
    ) -> Result<String, SummarizerFailure> {
        self.content_calls.lock().unwrap().push(summaries.to_vec());
        match &self.outcome {
            Ok(_) => Ok(format!("A week on the lander: {}", summaries.join(" "))),
            Err(message) => Err(SummarizerFailure(message.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail_for: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn fail_for(&self, email: &str) {
        self.fail_for.lock().unwrap().push(email.to_string());
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotifierPort for RecordingNotifier {
    fn send_checkin_reminder(&self, email: &str, link: &str) -> Result<(), DeliveryError> {
        if self.fail_for.lock().unwrap().iter().any(|e| e == email) {
            return Err(DeliveryError::new(email, "mailbox unavailable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), link.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// One project ("Apollo") with a Monday 09:00 UTC+1 schedule and `n` active
/// members `m0@example.com..`. The clock sits on Monday 2024-01-08 08:00 UTC,
/// the hour that schedule fires.
pub struct Harness {
    pub db: Arc<CheckinDb>,
    pub project: Project,
    pub schedule: Schedule,
    pub members: Vec<ProjectMember>,
    pub summarizer: Arc<ScriptedSummarizer>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub signer: PayloadSigner,
    pub links: LinksConfig,
}

impl Harness {
    pub fn new(member_count: usize) -> Self {
        Self::with_summarizer(member_count, ScriptedSummarizer::ok())
    }

    pub fn with_summarizer(member_count: usize, summarizer: ScriptedSummarizer) -> Self {
        let db = Arc::new(CheckinDb::open_in_memory().unwrap());
        let project = db
            .create_project(&NewProject {
                title: "Apollo".into(),
                description: "Ship the lander".into(),
                owner_id: 42,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            })
            .unwrap();
        let times = ScheduleTimes::parse(&["Monday"], "09:00", "+1").unwrap();
        let schedule = db.create_schedule(project.id, &times).unwrap();
        let members = (0..member_count)
            .map(|i| {
                db.add_member(project.id, &NewMember::active(format!("m{i}@example.com")))
                    .unwrap()
            })
            .collect();
        Self {
            db,
            project,
            schedule,
            members,
            summarizer: Arc::new(summarizer),
            notifier: Arc::new(RecordingNotifier::default()),
            clock: Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2024, 1, 8, 8, 0, 0).unwrap(),
            )),
            signer: PayloadSigner::new("harness-secret").unwrap(),
            links: LinksConfig {
                frontend_url: "https://app.test".into(),
                ..Default::default()
            },
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The local check-in date the schedule fires for at [`Harness::now`].
    pub fn date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
    }

    pub fn coordinator(&self) -> SummarizationCoordinator {
        SummarizationCoordinator::new(
            self.db.clone(),
            self.summarizer.clone(),
            self.clock.clone(),
        )
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.db.clone(),
            self.notifier.clone(),
            self.signer.clone(),
            self.links.clone(),
            "test-host",
        )
    }

    /// Create today's tracker as the sweep would, without sending mail.
    pub fn dispatch_today(&self) -> Tracker {
        let tracker = self
            .db
            .create_tracker(
                self.schedule.id,
                self.date(),
                self.members.len() as u32,
                "test-host",
                self.now(),
            )
            .unwrap()
            .unwrap();
        self.db.mark_emails_sent(tracker.id).unwrap();
        self.db.get_tracker(tracker.id).unwrap().unwrap()
    }

    /// Record a response for member `i` straight through the store.
    pub fn respond(&self, i: usize, blockers: &str) -> Response {
        let outcome = self
            .db
            .record_response(&NewResponse {
                project_id: self.project.id,
                member_id: self.members[i].id,
                schedule_id: self.schedule.id,
                local_date: self.date(),
                local_weekday: "Monday".into(),
                fields: fields(blockers),
                created_at: self.now(),
            })
            .unwrap();
        match outcome {
            RecordOutcome::Recorded { response, .. } => response,
            other => panic!("response for member {i} not recorded: {other:?}"),
        }
    }

    /// A signed check-in link token for member `i` for today's firing.
    pub fn token_for(&self, i: usize) -> String {
        self.token_for_email(&self.members[i].email)
    }

    pub fn token_for_email(&self, email: &str) -> String {
        let payload = ReminderPayload {
            member_email: email.to_string(),
            local_datetime: self.date().and_hms_opt(9, 0, 0).unwrap(),
            local_weekday: "Monday".into(),
            offset_hours: 1,
            schedule_id: self.schedule.id,
        };
        self.signer
            .sign(&payload, self.now() - Duration::minutes(1))
            .unwrap()
    }
}

pub fn fields(blockers: &str) -> ResponseFields {
    ResponseFields {
        did_yesterday: "Wired the radio".into(),
        doing_today: "Testing the radio".into(),
        blockers: blockers.into(),
    }
}
