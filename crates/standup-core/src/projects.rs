//! Project lifecycle: creation with a schedule, rescheduling, membership and
//! shutting a project's check-ins down.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::LinksConfig;
use crate::error::{Result, StandupError};
use crate::model::{NewMember, NewProject, Project, ProjectMember, Schedule};
use crate::payload::{InviteAction, InvitePayload, PayloadSigner};
use crate::schedule::ScheduleTimes;
use crate::store::CheckinDb;
use crate::types::ProjectId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectWithSchedule {
    pub project: Project,
    pub schedule: Schedule,
}

pub fn create_project(
    db: &CheckinDb,
    project: &NewProject,
    times: &ScheduleTimes,
) -> Result<ProjectWithSchedule> {
    if project.title.trim().is_empty() {
        return Err(StandupError::InvalidInput("project title is empty".into()));
    }
    if project.end_date < project.start_date {
        return Err(StandupError::InvalidInput(format!(
            "end date {} is before start date {}",
            project.end_date, project.start_date
        )));
    }
    let project = db.create_project(project)?;
    let schedule = db.create_schedule(project.id, times)?;
    tracing::info!(
        project_id = project.id,
        schedule_id = schedule.id,
        "project created"
    );
    Ok(ProjectWithSchedule { project, schedule })
}

/// Replace the project's local schedule; the UTC half is recomputed from it.
pub fn reschedule(db: &CheckinDb, project_id: ProjectId, times: &ScheduleTimes) -> Result<Schedule> {
    let schedule = require_schedule(db, project_id)?;
    let updated = db.update_schedule_times(schedule.id, times)?;
    tracing::info!(
        project_id,
        schedule_id = updated.id,
        utc_time = %updated.times.utc_time(),
        "schedule updated"
    );
    Ok(updated)
}

pub fn add_member(db: &CheckinDb, project_id: ProjectId, email: &str) -> Result<ProjectMember> {
    let email = email.trim();
    if !email.contains('@') {
        return Err(StandupError::InvalidInput(format!(
            "'{email}' is not an email address"
        )));
    }
    require_project(db, project_id)?;
    Ok(db.add_member(project_id, &NewMember::active(email))?)
}

/// Enable or disable an existing member. Disabled members get no reminders
/// and cannot submit.
pub fn set_member_active(
    db: &CheckinDb,
    project_id: ProjectId,
    email: &str,
    active: bool,
) -> Result<ProjectMember> {
    require_project(db, project_id)?;
    let member = db.find_member(project_id, email)?.ok_or_else(|| {
        StandupError::InvalidInput(format!("{} is not a member of project {project_id}", email.trim()))
    })?;
    db.set_member_active(member.id, active)?;
    Ok(ProjectMember { active, ..member })
}

/// Stop check-ins without ending the project; reversible.
pub fn deactivate(db: &CheckinDb, project_id: ProjectId) -> Result<()> {
    let schedule = require_schedule(db, project_id)?;
    db.set_project_active(project_id, false)?;
    db.set_schedule_active(schedule.id, false)?;
    Ok(())
}

pub fn activate(db: &CheckinDb, project_id: ProjectId) -> Result<()> {
    let schedule = require_schedule(db, project_id)?;
    db.set_project_active(project_id, true)?;
    db.set_schedule_active(schedule.id, true)?;
    Ok(())
}

/// Mark the project finished; its schedule never fires again.
pub fn complete(db: &CheckinDb, project_id: ProjectId) -> Result<()> {
    let schedule = require_schedule(db, project_id)?;
    db.set_schedule_ended(schedule.id, true)?;
    Ok(())
}

/// Accept and reject links for one invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InviteLinks {
    pub accept: String,
    pub reject: String,
}

/// Sign the pair of invitation links for `email`. Acting on them happens
/// outside this crate.
pub fn invite_links(
    db: &CheckinDb,
    signer: &PayloadSigner,
    links: &LinksConfig,
    project_id: ProjectId,
    email: &str,
    now: DateTime<Utc>,
) -> Result<InviteLinks> {
    let project = require_project(db, project_id)?;
    if !project.active {
        return Err(StandupError::InvalidInput(format!(
            "project {project_id} is inactive"
        )));
    }
    let email = email.trim();
    if !email.contains('@') {
        return Err(StandupError::InvalidInput(format!(
            "'{email}' is not an email address"
        )));
    }
    let sign = |action| {
        signer.sign(
            &InvitePayload {
                project_id,
                member_email: email.to_string(),
                action,
            },
            now,
        )
    };
    Ok(InviteLinks {
        accept: links.invite_link(&sign(InviteAction::Accept)?),
        reject: links.invite_link(&sign(InviteAction::Reject)?),
    })
}

fn require_project(db: &CheckinDb, project_id: ProjectId) -> Result<Project> {
    db.get_project(project_id)?
        .ok_or(StandupError::ProjectNotFound(project_id))
}

fn require_schedule(db: &CheckinDb, project_id: ProjectId) -> Result<Schedule> {
    require_project(db, project_id)?;
    db.schedule_for_project(project_id)?
        .ok_or(StandupError::ProjectNotFound(project_id))
}
