//! The hourly sweep: find due schedules, open a tracker, mail the members.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::Serialize;

use crate::config::LinksConfig;
use crate::error::{ReminderError, Result, StoreError};
use crate::model::{ProjectMember, Schedule, Tracker};
use crate::payload::{PayloadSigner, ReminderPayload};
use crate::ports::NotifierPort;
use crate::store::CheckinStore;
use crate::types::{weekday_name, ProjectId};

/// Counters for one sweep, logged at the end and printed by `standup sweep`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub due: u32,
    pub dispatched: u32,
    /// A tracker for this schedule and date already existed.
    pub already_dispatched: u32,
    pub no_members: u32,
    /// The project is deactivated or the local date falls outside its range.
    pub out_of_range: u32,
    pub failed: u32,
    pub reminders_sent: u32,
    pub reminders_failed: u32,
    /// Summarization claims older than the stale-claim window, handed back.
    pub stale_claims_released: u32,
    /// The stop flag was raised before every due schedule was handled.
    pub interrupted: bool,
}

enum ScheduleOutcome {
    Dispatched { sent: u32, failed: u32 },
    AlreadyDispatched,
    NoMembers,
    OutOfRange,
}

/// Claims older than this are treated as abandoned by a crashed holder.
pub const DEFAULT_STALE_CLAIM_MINUTES: i64 = 30;

pub struct Dispatcher {
    db: Arc<dyn CheckinStore>,
    notifier: Arc<dyn NotifierPort>,
    signer: PayloadSigner,
    links: LinksConfig,
    instance: String,
    stale_claim_after: Duration,
}

impl Dispatcher {
    pub fn new(
        db: Arc<dyn CheckinStore>,
        notifier: Arc<dyn NotifierPort>,
        signer: PayloadSigner,
        links: LinksConfig,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            db,
            notifier,
            signer,
            links,
            instance: instance.into(),
            stale_claim_after: Duration::minutes(DEFAULT_STALE_CLAIM_MINUTES),
        }
    }

    pub fn with_stale_claim_after(mut self, after: Duration) -> Self {
        self.stale_claim_after = after;
        self
    }

    /// Dispatch every schedule due in the UTC hour containing `now`.
    ///
    /// Claims held longer than the stale-claim window are released first so a
    /// crashed summarization can be retried by the manual trigger.
    ///
    /// `stop` is checked between schedules only: a schedule that has started
    /// always finishes its mail batch and tracker update. Failures on one
    /// schedule are logged and counted; only an unreadable schedule table
    /// fails the whole sweep.
    pub fn sweep(
        &self,
        now: DateTime<Utc>,
        stop: &AtomicBool,
    ) -> std::result::Result<SweepReport, StoreError> {
        let cutoff = now - self.stale_claim_after;
        let stale_claims_released = match self.db.release_stale_claims(cutoff) {
            Ok(0) => 0,
            Ok(released) => {
                tracing::warn!(released, %cutoff, "released stale summarization claims");
                released
            }
            Err(e) => {
                tracing::error!(error = %e, "could not release stale claims");
                0
            }
        };

        let due = self.db.due_schedules(now)?;
        let mut report = SweepReport {
            due: count(due.len()),
            stale_claims_released,
            ..Default::default()
        };
        tracing::info!(
            hour = now.hour(),
            weekday = weekday_name(now.weekday()),
            due = due.len(),
            "dispatch sweep"
        );

        for schedule in &due {
            if stop.load(Ordering::SeqCst) {
                tracing::info!("sweep interrupted by shutdown");
                report.interrupted = true;
                break;
            }
            match self.dispatch_schedule(schedule, now) {
                Ok(ScheduleOutcome::Dispatched { sent, failed }) => {
                    report.dispatched += 1;
                    report.reminders_sent += sent;
                    report.reminders_failed += failed;
                }
                Ok(ScheduleOutcome::AlreadyDispatched) => report.already_dispatched += 1,
                Ok(ScheduleOutcome::NoMembers) => report.no_members += 1,
                Ok(ScheduleOutcome::OutOfRange) => report.out_of_range += 1,
                Err(e) => {
                    tracing::error!(schedule_id = schedule.id, error = %e, "dispatch failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            dispatched = report.dispatched,
            already_dispatched = report.already_dispatched,
            failed = report.failed,
            reminders_sent = report.reminders_sent,
            "sweep finished"
        );
        Ok(report)
    }

    fn dispatch_schedule(&self, schedule: &Schedule, now: DateTime<Utc>) -> Result<ScheduleOutcome> {
        let local = schedule
            .times
            .local_datetime(now)
            .with_nanosecond(0)
            .unwrap_or_else(|| schedule.times.local_datetime(now));
        let local_date = local.date();

        let in_range = self
            .db
            .get_project(schedule.project_id)?
            .is_some_and(|p| p.active && p.covers(local_date));
        if !in_range {
            tracing::info!(
                schedule_id = schedule.id,
                project_id = schedule.project_id,
                %local_date,
                "project inactive or out of range, skipping"
            );
            return Ok(ScheduleOutcome::OutOfRange);
        }

        let members = self.db.active_members(schedule.project_id)?;
        if members.is_empty() {
            tracing::info!(
                schedule_id = schedule.id,
                project_id = schedule.project_id,
                "no active members, skipping"
            );
            return Ok(ScheduleOutcome::NoMembers);
        }

        // The tracker goes in first; a rerun that loses the insert sends nothing.
        let Some(tracker) = self.db.create_tracker(
            schedule.id,
            local_date,
            count(members.len()),
            &self.instance,
            now,
        )?
        else {
            tracing::info!(
                schedule_id = schedule.id,
                %local_date,
                "tracker already exists, skipping"
            );
            return Ok(ScheduleOutcome::AlreadyDispatched);
        };

        let mut sent = 0;
        let mut failed = 0;
        for member in &members {
            let payload = ReminderPayload {
                member_email: member.email.clone(),
                local_datetime: local,
                local_weekday: weekday_name(local_date.weekday()).to_string(),
                offset_hours: schedule.times.offset_hours(),
                schedule_id: schedule.id,
            };
            match self.send(schedule.project_id, member, &payload, now) {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(
                        schedule_id = schedule.id,
                        tracker_id = tracker.id,
                        email = %member.email,
                        error = %e,
                        "reminder not delivered"
                    );
                    failed += 1;
                }
            }
        }

        self.db.mark_emails_sent(tracker.id)?;
        log_dispatched(&tracker, sent, failed);
        Ok(ScheduleOutcome::Dispatched { sent, failed })
    }

    fn send(
        &self,
        project_id: ProjectId,
        member: &ProjectMember,
        payload: &ReminderPayload,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let token = self.signer.sign(payload, now)?;
        let link = self.links.checkin_link(project_id, &token);
        self.notifier
            .send_checkin_reminder(&member.email, &link)
            .map_err(|e| ReminderError::from(e).into())
    }
}

fn log_dispatched(tracker: &Tracker, sent: u32, failed: u32) {
    tracing::info!(
        schedule_id = tracker.schedule_id,
        tracker_id = tracker.id,
        local_date = %tracker.local_date,
        expected = tracker.expected,
        sent,
        failed,
        "check-in dispatched"
    );
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
