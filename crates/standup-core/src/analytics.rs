//! Read paths: the per-day insight report, the owner's two-week trend and
//! the owner dashboard.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::error::{Result, StandupError};
use crate::manual::project_today;
use crate::model::{Insight, Project, Schedule};
use crate::store::{CheckinDb, DailyActivity};
use crate::types::{MemberId, ProjectId};

/// Days covered by [`trends`], today included.
pub const TREND_WINDOW_DAYS: i64 = 14;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseView {
    pub email: String,
    pub did_yesterday: String,
    pub doing_today: String,
    pub blockers: String,
    pub has_blocker: bool,
    pub created_at: DateTime<Utc>,
}

/// What the project page shows for one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsightReport {
    Generated {
        insight: Insight,
        responses: Vec<ResponseView>,
    },
    FutureDate,
    NoSchedule,
    NotACheckInDay,
    NoCheckInSent,
    NoResponsesYet,
    AwaitingResponses {
        expected: u32,
        received: u32,
    },
    /// Everyone answered but no summary exists yet.
    ReadyToGenerate {
        expected: u32,
        received: u32,
    },
}

pub fn insight_report(
    db: &CheckinDb,
    clock: &dyn Clock,
    project_id: ProjectId,
    local_date: NaiveDate,
) -> Result<InsightReport> {
    if db.get_project(project_id)?.is_none() {
        return Err(StandupError::ProjectNotFound(project_id));
    }

    if let Some(insight) = db.insight_for(project_id, local_date)? {
        let responses = db.responses_by_ids(&insight.response_ids)?;
        let mut emails: HashMap<MemberId, String> = HashMap::new();
        let mut views = Vec::with_capacity(responses.len());
        for r in responses {
            let email = match emails.get(&r.member_id) {
                Some(email) => email.clone(),
                None => {
                    let email = db.member(r.member_id)?.map(|m| m.email).unwrap_or_default();
                    emails.insert(r.member_id, email.clone());
                    email
                }
            };
            views.push(ResponseView {
                email,
                did_yesterday: r.did_yesterday,
                doing_today: r.doing_today,
                blockers: r.blockers,
                has_blocker: r.has_blocker,
                created_at: r.created_at,
            });
        }
        return Ok(InsightReport::Generated {
            insight,
            responses: views,
        });
    }

    let schedule = db.schedule_for_project(project_id)?;
    if local_date > project_today(schedule.as_ref(), clock) {
        return Ok(InsightReport::FutureDate);
    }
    let Some(schedule) = schedule else {
        return Ok(InsightReport::NoSchedule);
    };
    if !schedule.times.fires_on(local_date) {
        return Ok(InsightReport::NotACheckInDay);
    }
    let Some(tracker) = db.find_tracker(schedule.id, local_date)? else {
        return Ok(InsightReport::NoCheckInSent);
    };

    Ok(match (tracker.received, tracker.expected) {
        (0, _) => InsightReport::NoResponsesYet,
        (received, expected) if received < expected => {
            InsightReport::AwaitingResponses { expected, received }
        }
        (received, expected) => InsightReport::ReadyToGenerate { expected, received },
    })
}

/// Updates and blockers per day over the last [`TREND_WINDOW_DAYS`] days,
/// across every project `owner_id` owns. Days without responses are omitted.
pub fn trends(db: &CheckinDb, owner_id: i64, now: DateTime<Utc>) -> Result<Vec<DailyActivity>> {
    let since = now.date_naive() - Duration::days(TREND_WINDOW_DAYS - 1);
    Ok(db.daily_activity(owner_id, since)?)
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    /// The schedule was ended by the owner.
    Ended,
    /// Deactivated and past its end date.
    Expired,
    Deactivated,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Ended => "ended",
            ProjectStatus::Expired => "expired",
            ProjectStatus::Deactivated => "deactivated",
        })
    }
}

/// An active project stays active until its schedule is ended; the end date
/// only decides between expired and deactivated once it is switched off.
pub fn project_status(
    project: &Project,
    schedule: Option<&Schedule>,
    today: NaiveDate,
) -> ProjectStatus {
    let ended = schedule.is_some_and(|s| s.ended);
    if project.active && !ended {
        ProjectStatus::Active
    } else if ended {
        ProjectStatus::Ended
    } else if project.end_date < today {
        ProjectStatus::Expired
    } else {
        ProjectStatus::Deactivated
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub status: ProjectStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardCounts {
    /// Active projects starting in the current month.
    pub active_projects: u32,
    pub active_projects_last_month: u32,
    /// Distinct active member emails across the owner's projects.
    pub team_members: u32,
    /// Responses dated in the current month.
    pub submitted_responses: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub projects: Vec<ProjectSummary>,
    pub analytics: DashboardCounts,
}

/// Every project `owner_id` owns with its status.
pub fn project_summaries(
    db: &CheckinDb,
    owner_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<ProjectSummary>> {
    let today = now.date_naive();
    db.projects_for_owner(owner_id)?
        .into_iter()
        .map(|project| -> Result<ProjectSummary> {
            let schedule = db.schedule_for_project(project.id)?;
            Ok(ProjectSummary {
                status: project_status(&project, schedule.as_ref(), today),
                project,
            })
        })
        .collect()
}

pub fn dashboard(db: &CheckinDb, owner_id: i64, now: DateTime<Utc>) -> Result<Dashboard> {
    let projects = project_summaries(db, owner_id, now)?;
    if projects.is_empty() {
        return Ok(Dashboard {
            projects,
            analytics: DashboardCounts::default(),
        });
    }

    let this_month = month_start(now.date_naive());
    let last_month = month_start(this_month - Duration::days(1));
    let started_in = |month: NaiveDate| {
        projects
            .iter()
            .filter(|s| s.project.active && month_start(s.project.start_date) == month)
            .count()
    };
    let submitted_responses = db
        .daily_activity(owner_id, this_month)?
        .iter()
        .map(|day| day.updates)
        .sum();

    let analytics = DashboardCounts {
        active_projects: count(started_in(this_month)),
        active_projects_last_month: count(started_in(last_month)),
        team_members: db.active_member_count_for_owner(owner_id)?,
        submitted_responses,
    };
    Ok(Dashboard {
        projects,
        analytics,
    })
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewMember, NewProject};
    use crate::testing::Harness;

    fn report(h: &Harness, date: NaiveDate) -> InsightReport {
        insight_report(&h.db, h.clock.as_ref(), h.project.id, date).unwrap()
    }

    #[test]
    fn report_walks_through_the_day() {
        let h = Harness::new(2);
        assert_eq!(report(&h, h.date()), InsightReport::NoCheckInSent);

        let tracker = h.dispatch_today();
        assert_eq!(report(&h, h.date()), InsightReport::NoResponsesYet);

        h.respond(0, "Waiting on vendor");
        assert_eq!(
            report(&h, h.date()),
            InsightReport::AwaitingResponses {
                expected: 2,
                received: 1
            }
        );

        h.respond(1, "none");
        assert_eq!(
            report(&h, h.date()),
            InsightReport::ReadyToGenerate {
                expected: 2,
                received: 2
            }
        );

        h.coordinator()
            .summarize_tracker(tracker.id, h.project.id)
            .unwrap();
        let InsightReport::Generated { insight, responses } = report(&h, h.date()) else {
            panic!("expected a generated report");
        };
        assert_eq!(insight.tracker_id, tracker.id);
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].email, "m0@example.com");
        assert!(responses[0].has_blocker);
        assert!(!responses[1].has_blocker);
    }

    #[test]
    fn report_rejects_future_and_off_days() {
        let h = Harness::new(1);
        assert_eq!(
            report(&h, h.date() + Duration::days(7)),
            InsightReport::FutureDate
        );
        assert_eq!(
            report(&h, h.date() - Duration::days(1)),
            InsightReport::NotACheckInDay
        );
        assert!(matches!(
            insight_report(&h.db, h.clock.as_ref(), 999, h.date()),
            Err(StandupError::ProjectNotFound(999))
        ));
    }

    #[test]
    fn report_serializes_with_status_tag() {
        let json = serde_json::to_value(InsightReport::AwaitingResponses {
            expected: 3,
            received: 1,
        })
        .unwrap();
        assert_eq!(json["status"], "awaiting_responses");
        assert_eq!(json["expected"], 3);
    }

    #[test]
    fn trends_cover_two_weeks() {
        let h = Harness::new(2);
        h.dispatch_today();
        h.respond(0, "Blocked on design review");
        h.respond(1, "n/a");

        let points = trends(&h.db, h.project.owner_id, h.now()).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].updates, 2);
        assert_eq!(points[0].blockers, 1);

        let later = h.now() + Duration::days(TREND_WINDOW_DAYS);
        assert!(trends(&h.db, h.project.owner_id, later).unwrap().is_empty());
    }

    #[test]
    fn status_follows_active_flag_schedule_and_end_date() {
        let h = Harness::new(0);
        let today = h.date();
        let mut project = h.project.clone();
        let mut schedule = h.schedule.clone();

        assert_eq!(
            project_status(&project, Some(&schedule), today),
            ProjectStatus::Active
        );
        assert_eq!(project_status(&project, None, today), ProjectStatus::Active);

        schedule.ended = true;
        assert_eq!(
            project_status(&project, Some(&schedule), today),
            ProjectStatus::Ended
        );

        schedule.ended = false;
        project.active = false;
        assert_eq!(
            project_status(&project, Some(&schedule), today),
            ProjectStatus::Deactivated
        );
        let after_end = project.end_date + Duration::days(1);
        assert_eq!(
            project_status(&project, Some(&schedule), after_end),
            ProjectStatus::Expired
        );
    }

    #[test]
    fn dashboard_counts_this_and_last_month() {
        let h = Harness::new(2);
        // Harness project starts 2024-01-01; add one from December.
        let december = h
            .db
            .create_project(&NewProject {
                title: "Gemini".into(),
                description: "Dock in orbit".into(),
                owner_id: h.project.owner_id,
                start_date: NaiveDate::from_ymd_opt(2023, 12, 4).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            })
            .unwrap();
        // Shared member counts once.
        h.db.add_member(december.id, &NewMember::active("M0@example.com"))
            .unwrap();
        h.db.add_member(december.id, &NewMember::active("g1@example.com"))
            .unwrap();
        h.dispatch_today();
        h.respond(0, "");
        h.respond(1, "Blocked on keys");

        let board = dashboard(&h.db, h.project.owner_id, h.now()).unwrap();
        assert_eq!(board.projects.len(), 2);
        assert!(board
            .projects
            .iter()
            .all(|p| p.status == ProjectStatus::Active));
        assert_eq!(
            board.analytics,
            DashboardCounts {
                active_projects: 1,
                active_projects_last_month: 1,
                team_members: 3,
                submitted_responses: 2,
            }
        );

        h.db.set_project_active(december.id, false).unwrap();
        let board = dashboard(&h.db, h.project.owner_id, h.now()).unwrap();
        assert_eq!(board.analytics.active_projects_last_month, 0);
        let gemini = board
            .projects
            .iter()
            .find(|p| p.project.id == december.id)
            .unwrap();
        assert_eq!(gemini.status, ProjectStatus::Deactivated);
    }

    #[test]
    fn owner_without_projects_gets_zeroes() {
        let h = Harness::new(1);
        let board = dashboard(&h.db, 999, h.now()).unwrap();
        assert!(board.projects.is_empty());
        assert_eq!(board.analytics, DashboardCounts::default());
    }

    #[test]
    fn summary_flattens_project_fields() {
        let h = Harness::new(0);
        let json = serde_json::to_value(ProjectSummary {
            project: h.project.clone(),
            status: ProjectStatus::Expired,
        })
        .unwrap();
        assert_eq!(json["title"], "Apollo");
        assert_eq!(json["status"], "expired");
    }
}
