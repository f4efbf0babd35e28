//! Re-sending a check-in link to one member for a day already dispatched.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use crate::clock::Clock;
use crate::config::LinksConfig;
use crate::error::ReminderError;
use crate::payload::{PayloadSigner, ReminderPayload};
use crate::ports::NotifierPort;
use crate::store::CheckinStore;
use crate::types::{weekday_name, ProjectId};

pub struct ReminderService {
    db: Arc<dyn CheckinStore>,
    notifier: Arc<dyn NotifierPort>,
    signer: PayloadSigner,
    links: LinksConfig,
    clock: Arc<dyn Clock>,
}

impl ReminderService {
    pub fn new(
        db: Arc<dyn CheckinStore>,
        notifier: Arc<dyn NotifierPort>,
        signer: PayloadSigner,
        links: LinksConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            notifier,
            signer,
            links,
            clock,
        }
    }

    /// Send `member_email` a fresh link for `local_date`.
    ///
    /// Never creates a tracker: the day must already have been dispatched.
    pub fn send_reminder(
        &self,
        project_id: ProjectId,
        local_date: NaiveDate,
        member_email: &str,
    ) -> Result<(), ReminderError> {
        let project = self
            .db
            .get_project(project_id)?
            .filter(|p| p.active)
            .ok_or(ReminderError::ProjectNotFound(project_id))?;
        if !project.covers(local_date) {
            return Err(ReminderError::OutOfRange(local_date));
        }

        let schedule = self
            .db
            .schedule_for_project(project_id)?
            .filter(|s| s.times.fires_on(local_date))
            .ok_or(ReminderError::NotACheckInDay(local_date))?;
        let tracker = self
            .db
            .find_tracker(schedule.id, local_date)?
            .ok_or(ReminderError::NoCheckInSent)?;
        if tracker.processed {
            return Err(ReminderError::AlreadyProcessed);
        }

        let member = self
            .db
            .find_active_member(project_id, member_email)?
            .ok_or(ReminderError::NotATeamMember)?;

        let payload = ReminderPayload {
            member_email: member.email.clone(),
            local_datetime: local_date.and_time(schedule.times.local_time()),
            local_weekday: weekday_name(local_date.weekday()).to_string(),
            offset_hours: schedule.times.offset_hours(),
            schedule_id: schedule.id,
        };
        let token = self.signer.sign(&payload, self.clock.now())?;
        let link = self.links.checkin_link(project_id, &token);
        self.notifier
            .send_checkin_reminder(&member.email, &link)
            .map_err(ReminderError::Delivery)?;

        tracing::info!(
            project_id,
            tracker_id = tracker.id,
            member_id = member.id,
            %local_date,
            "reminder re-sent"
        );
        Ok(())
    }
}
