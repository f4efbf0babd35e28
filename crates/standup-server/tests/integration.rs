use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use chrono::{NaiveDate, TimeZone, Utc};
use http_body_util::BodyExt;
use standup_core::clock::ManualClock;
use standup_core::error::DeliveryError;
use standup_core::model::{NewInsight, NewMember, NewProject, Project};
use standup_core::payload::PayloadSigner;
use standup_core::ports::{
    NotifierPort, ResponseRecord, SummarizerFailure, SummarizerPort, SummaryDraft,
};
use standup_core::schedule::ScheduleTimes;
use standup_core::store::CheckinDb;
use standup_core::types::DiversionRange;
use standup_server::{AppState, Collaborators};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Outbox(Mutex<Vec<(String, String)>>);

impl Outbox {
    fn token_for(&self, email: &str) -> String {
        let sent = self.0.lock().unwrap();
        let (_, link) = sent
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .expect("no link sent to member");
        link.rsplit("payload=").next().unwrap().to_string()
    }
}

impl NotifierPort for Outbox {
    fn send_checkin_reminder(&self, email: &str, link: &str) -> Result<(), DeliveryError> {
        self.0
            .lock()
            .unwrap()
            .push((email.to_string(), link.to_string()));
        Ok(())
    }
}

struct FixedSummarizer;

impl SummarizerPort for FixedSummarizer {
    fn summarize(
        &self,
        responses: &[ResponseRecord],
        _project_description: &str,
    ) -> Result<SummaryDraft, SummarizerFailure> {
        Ok(SummaryDraft {
            summary: format!("{} update(s)", responses.len()),
            blockers: "None".into(),
            diversion_range: DiversionRange::OnTrack,
            diversion_context: "Aligned with the roadmap.".into(),
        })
    }

    fn write_content(
        &self,
        summaries: &[String],
        _project_description: &str,
    ) -> Result<String, SummarizerFailure> {
        Ok(format!("Story of {} day(s)", summaries.len()))
    }
}

struct Fixture {
    app: AppState,
    outbox: Arc<Outbox>,
    project: Project,
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
}

/// A project with two members and a Monday 09:00 UTC check-in, with the
/// clock set to that hour.
fn fixture() -> Fixture {
    let db = Arc::new(CheckinDb::open_in_memory().unwrap());
    let project = db
        .create_project(&NewProject {
            title: "Apollo".into(),
            description: "Ship the lander".into(),
            owner_id: 7,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        })
        .unwrap();
    for email in ["ada@example.com", "bob@example.com"] {
        db.add_member(project.id, &NewMember::active(email)).unwrap();
    }
    db.create_schedule(
        project.id,
        &ScheduleTimes::parse(&["Monday"], "09:00", "0").unwrap(),
    )
    .unwrap();

    let outbox = Arc::new(Outbox::default());
    let app = AppState::new(Collaborators {
        db,
        summarizer: Arc::new(FixedSummarizer),
        notifier: outbox.clone(),
        clock: Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap(),
        )),
        signer: PayloadSigner::new("integration-secret").unwrap(),
        links: Default::default(),
        instance: "integration".into(),
        stale_claim_after: chrono::Duration::minutes(30),
    });
    Fixture {
        app,
        outbox,
        project,
    }
}

impl Fixture {
    fn dispatch(&self) {
        let stop = std::sync::atomic::AtomicBool::new(false);
        let report = self
            .app
            .dispatcher
            .sweep(self.app.clock.now(), &stop)
            .unwrap();
        assert_eq!(report.dispatched, 1);
    }

    fn router(&self) -> axum::Router {
        standup_server::build_router(self.app.clone())
    }

    fn checkin_body(&self, email: &str, blockers: &str) -> serde_json::Value {
        serde_json::json!({
            "payload": self.outbox.token_for(email),
            "project_id": self.project.id,
            "did_yesterday": "Wrote the parser",
            "doing_today": "Writing the lexer",
            "blockers": blockers,
        })
    }
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a POST request with a JSON body via `oneshot` and return (status, parsed JSON body).
async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_day_from_dispatch_to_insight() {
    let f = fixture();
    f.dispatch();
    let report_uri = format!("/api/projects/{}/insights/2024-01-08", f.project.id);

    let (status, json) = get(f.router(), &report_uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "no_responses_yet");

    let (status, json) = post_json(
        f.router(),
        "/api/checkins",
        f.checkin_body("ada@example.com", "Waiting on vendor"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["response"]["has_blocker"], true);
    assert!(json.get("insight").is_none());

    let (_, json) = get(f.router(), &report_uri).await;
    assert_eq!(json["status"], "awaiting_responses");
    assert_eq!(json["expected"], 2);
    assert_eq!(json["received"], 1);

    let (status, json) = post_json(
        f.router(),
        "/api/checkins",
        f.checkin_body("bob@example.com", "none"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["insight"]["summary"], "2 update(s)");
    assert_eq!(json["insight"]["diversion_range"], "on track");

    let (_, json) = get(f.router(), &report_uri).await;
    assert_eq!(json["status"], "generated");
    assert_eq!(json["responses"].as_array().unwrap().len(), 2);
    assert_eq!(json["responses"][0]["email"], "ada@example.com");

    let (status, _) = post_json(
        f.router(),
        &format!("/api/projects/{}/insights", f.project.id),
        serde_json::json!({ "date": "2024-01-08", "force": true }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn duplicate_submission_is_a_conflict() {
    let f = fixture();
    f.dispatch();
    let body = f.checkin_body("ada@example.com", "");
    let (status, _) = post_json(f.router(), "/api/checkins", body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = post_json(f.router(), "/api/checkins", body).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("Monday"));
}

#[tokio::test]
async fn tampered_token_is_rejected() {
    let f = fixture();
    f.dispatch();
    let mut body = f.checkin_body("ada@example.com", "");
    let token = body["payload"].as_str().unwrap().to_string();
    body["payload"] = serde_json::Value::String(format!("x{token}"));

    let (status, json) = post_json(f.router(), "/api/checkins", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn manual_trigger_requires_force_until_everyone_answered() {
    let f = fixture();
    f.dispatch();
    post_json(
        f.router(),
        "/api/checkins",
        f.checkin_body("ada@example.com", ""),
    )
    .await;
    let uri = format!("/api/projects/{}/insights", f.project.id);

    let (status, json) = post_json(
        f.router(),
        &uri,
        serde_json::json!({ "date": "2024-01-08" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("expecting 2"));
    assert_eq!(json["expected"], 2);
    assert_eq!(json["received"], 1);

    let (status, json) = post_json(
        f.router(),
        &uri,
        serde_json::json!({ "date": "2024-01-08", "force": true }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["summary"], "1 update(s)");

    let (status, _) = post_json(
        f.router(),
        &uri,
        serde_json::json!({ "date": "2024-02-05", "force": true }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reminder_needs_a_dispatched_day() {
    let f = fixture();
    let uri = format!("/api/projects/{}/reminders", f.project.id);
    let body = serde_json::json!({ "date": "2024-01-08", "email": "ada@example.com" });

    let (status, _) = post_json(f.router(), &uri, body.clone()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    f.dispatch();
    let (status, json) = post_json(f.router(), &uri, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sent"], true);

    let (status, _) = post_json(
        f.router(),
        &uri,
        serde_json::json!({ "date": "2024-01-08", "email": "eve@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn trends_count_updates_and_blockers() {
    let f = fixture();
    f.dispatch();
    post_json(
        f.router(),
        "/api/checkins",
        f.checkin_body("ada@example.com", "Blocked on review"),
    )
    .await;

    let (status, json) = get(f.router(), "/api/owners/7/trends").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["window_days"], 14);
    assert_eq!(json["days"][0]["date"], "2024-01-08");
    assert_eq!(json["days"][0]["updates"], 1);
    assert_eq!(json["days"][0]["blockers"], 1);

    let (_, json) = get(f.router(), "/api/owners/8/trends").await;
    assert!(json["days"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn convert_previews_utc_schedule() {
    let f = fixture();
    let (status, json) = get(
        f.router(),
        "/api/schedules/convert?days=Tuesday&time=00:30&offset=UTC%2B1",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["utc_days"][0], "Monday");
    assert_eq!(json["utc_time"], "23:30");
    assert_eq!(json["offset"], "UTC+1");

    let (status, _) = get(
        f.router(),
        "/api/schedules/convert?days=Funday&time=09:00",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_project_report_is_404() {
    let f = fixture();
    let (status, json) = get(f.router(), "/api/projects/999/insights/2024-01-08").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn content_needs_two_summaries_and_is_written_once() {
    let f = fixture();
    f.dispatch();
    for email in ["ada@example.com", "bob@example.com"] {
        post_json(f.router(), "/api/checkins", f.checkin_body(email, "")).await;
    }
    let uri = format!("/api/projects/{}/content", f.project.id);

    let (status, json) = post_json(
        f.router(),
        &uri,
        serde_json::json!({ "owner_id": 7, "dates": ["2024-01-08"] }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("at least 2"));

    // The Monday before, summarized earlier.
    let previous = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let tracker = f
        .app
        .db
        .create_tracker(1, previous, 2, "integration", f.app.clock.now())
        .unwrap()
        .unwrap();
    f.app
        .db
        .insert_insight(&NewInsight {
            tracker_id: tracker.id,
            project_id: f.project.id,
            schedule_id: 1,
            local_date: previous,
            response_ids: Vec::new(),
            summary: "Parser design agreed".into(),
            blockers: "None".into(),
            diversion_range: DiversionRange::OnTrack,
            diversion_context: "Aligned with the roadmap.".into(),
            created_at: f.app.clock.now(),
        })
        .unwrap()
        .unwrap();

    let body = serde_json::json!({ "owner_id": 7, "dates": ["2024-01-01", "2024-01-08"] });
    let (status, json) = post_json(f.router(), &uri, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["created"], true);
    assert_eq!(json["content"]["content"], "Story of 2 day(s)");
    let id = json["content"]["id"].clone();

    let (status, json) = post_json(f.router(), &uri, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["created"], false);
    assert_eq!(json["content"]["id"], id);

    let (status, _) = post_json(
        f.router(),
        &uri,
        serde_json::json!({ "owner_id": 8, "dates": ["2024-01-01", "2024-01-08"] }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn dashboard_lists_projects_with_status() {
    let f = fixture();
    f.dispatch();
    post_json(
        f.router(),
        "/api/checkins",
        f.checkin_body("ada@example.com", ""),
    )
    .await;

    let (status, json) = get(f.router(), "/api/owners/7/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["projects"][0]["title"], "Apollo");
    assert_eq!(json["projects"][0]["status"], "active");
    assert_eq!(json["analytics"]["active_projects"], 1);
    assert_eq!(json["analytics"]["team_members"], 2);
    assert_eq!(json["analytics"]["submitted_responses"], 1);

    f.app.db.set_project_active(f.project.id, false).unwrap();
    let (_, json) = get(f.router(), "/api/owners/7/dashboard").await;
    assert_eq!(json["projects"][0]["status"], "deactivated");
    assert_eq!(json["analytics"]["active_projects"], 0);
}

