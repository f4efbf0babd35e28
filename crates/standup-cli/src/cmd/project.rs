use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use standup_core::analytics::{self, project_status};
use standup_core::config::Config;
use standup_core::model::NewProject;
use standup_core::payload::PayloadSigner;
use standup_core::projects;
use standup_core::schedule::{format_offset, ScheduleTimes};
use standup_core::store::CheckinDb;
use standup_core::types::{weekday_name, ProjectId};
use std::path::Path;

#[derive(clap::Args)]
pub struct ScheduleArgs {
    /// Check-in weekdays, comma-separated or repeated (e.g. Monday,Thursday)
    #[arg(long, required = true, value_delimiter = ',')]
    pub days: Vec<String>,
    /// Local time of day, HH:MM
    #[arg(long)]
    pub time: String,
    /// Whole-hour UTC offset: +1, -5, UTC+3, 0
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub offset: String,
}

impl ScheduleArgs {
    fn times(&self) -> anyhow::Result<ScheduleTimes> {
        Ok(ScheduleTimes::parse(&self.days, &self.time, &self.offset)?)
    }
}

#[derive(Subcommand)]
pub enum ProjectSubcommand {
    /// Create a project together with its check-in schedule
    Create {
        #[arg(long)]
        title: String,
        /// Product description the daily insight is measured against
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        owner: i64,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// List projects owned by an owner
    List {
        #[arg(long)]
        owner: i64,
    },
    /// Show a project, its schedule and members
    Show { id: ProjectId },
    /// Replace the check-in schedule
    Reschedule {
        id: ProjectId,
        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// Manage project members
    Member {
        #[command(subcommand)]
        subcommand: MemberSubcommand,
    },
    /// Print signed accept/reject invitation links for an email
    Invite { id: ProjectId, email: String },
    /// Pause check-ins
    Deactivate { id: ProjectId },
    /// Resume check-ins
    Activate { id: ProjectId },
    /// End the project; its schedule never fires again
    Complete { id: ProjectId },
}

#[derive(Subcommand)]
pub enum MemberSubcommand {
    /// Add an active member
    Add { id: ProjectId, email: String },
    /// Stop sending check-ins to a member
    Disable { id: ProjectId, email: String },
    /// Re-enable a disabled member
    Enable { id: ProjectId, email: String },
}

pub fn run(root: &Path, subcmd: ProjectSubcommand, json: bool) -> anyhow::Result<()> {
    let (config, db) = super::open_db(root)?;
    match subcmd {
        ProjectSubcommand::Create {
            title,
            description,
            owner,
            start,
            end,
            schedule,
        } => {
            let new = NewProject {
                title,
                description,
                owner_id: owner,
                start_date: start,
                end_date: end,
            };
            let created = projects::create_project(&db, &new, &schedule.times()?)?;
            if json {
                return print_json(&created);
            }
            println!(
                "Created project {} '{}' (fires {} at {} UTC)",
                created.project.id,
                created.project.title,
                day_names(created.schedule.times.utc_days()),
                created.schedule.times.utc_time().format("%H:%M"),
            );
            Ok(())
        }
        ProjectSubcommand::List { owner } => list(&db, owner, json),
        ProjectSubcommand::Show { id } => show(&db, id, json),
        ProjectSubcommand::Reschedule { id, schedule } => {
            let updated = projects::reschedule(&db, id, &schedule.times()?)?;
            if json {
                return print_json(&updated);
            }
            println!(
                "Project {id} now fires {} at {} UTC",
                day_names(updated.times.utc_days()),
                updated.times.utc_time().format("%H:%M"),
            );
            Ok(())
        }
        ProjectSubcommand::Member { subcommand } => member(&db, subcommand, json),
        ProjectSubcommand::Invite { id, email } => invite(&db, &config, id, &email, json),
        ProjectSubcommand::Deactivate { id } => {
            projects::deactivate(&db, id)?;
            done(id, "deactivated", json)
        }
        ProjectSubcommand::Activate { id } => {
            projects::activate(&db, id)?;
            done(id, "activated", json)
        }
        ProjectSubcommand::Complete { id } => {
            projects::complete(&db, id)?;
            done(id, "completed", json)
        }
    }
}

fn day_names(days: &[chrono::Weekday]) -> String {
    days.iter()
        .map(|d| weekday_name(*d))
        .collect::<Vec<_>>()
        .join(", ")
}

fn done(id: ProjectId, what: &str, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(&serde_json::json!({ "project_id": id, "status": what }))
    } else {
        println!("Project {id} {what}.");
        Ok(())
    }
}

fn list(db: &CheckinDb, owner: i64, json: bool) -> anyhow::Result<()> {
    let projects = analytics::project_summaries(db, owner, Utc::now())?;
    if json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("No projects for owner {owner}.");
        return Ok(());
    }
    let rows = projects
        .iter()
        .map(|s| {
            vec![
                s.project.id.to_string(),
                s.project.title.clone(),
                s.project.start_date.to_string(),
                s.project.end_date.to_string(),
                s.status.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "TITLE", "START", "END", "STATUS"], rows);
    Ok(())
}

fn show(db: &CheckinDb, id: ProjectId, json: bool) -> anyhow::Result<()> {
    let project = db
        .get_project(id)?
        .with_context(|| format!("project {id} not found"))?;
    let schedule = db.schedule_for_project(id)?;
    let members = db.active_members(id)?;
    let status = project_status(&project, schedule.as_ref(), Utc::now().date_naive());

    if json {
        return print_json(&serde_json::json!({
            "project": project,
            "status": status,
            "schedule": schedule,
            "members": members,
        }));
    }

    println!("{} (#{})", project.title, project.id);
    if !project.description.is_empty() {
        println!("  {}", project.description);
    }
    println!("  dates:    {} .. {}", project.start_date, project.end_date);
    println!("  status:   {status}");
    match &schedule {
        Some(s) => println!(
            "  schedule: {} at {} {} (UTC: {} at {}){}",
            day_names(s.times.local_days()),
            s.times.local_time().format("%H:%M"),
            format_offset(s.times.offset_hours()),
            day_names(s.times.utc_days()),
            s.times.utc_time().format("%H:%M"),
            if s.ended { ", ended" } else { "" },
        ),
        None => println!("  schedule: none"),
    }
    println!("  members:  {}", members.len());
    for m in &members {
        println!("    {}", m.email);
    }
    Ok(())
}

fn member(db: &CheckinDb, subcmd: MemberSubcommand, json: bool) -> anyhow::Result<()> {
    let member = match subcmd {
        MemberSubcommand::Add { id, email } => projects::add_member(db, id, &email)?,
        MemberSubcommand::Disable { id, email } => {
            projects::set_member_active(db, id, &email, false)?
        }
        MemberSubcommand::Enable { id, email } => {
            projects::set_member_active(db, id, &email, true)?
        }
    };
    if json {
        return print_json(&member);
    }
    let state = if member.active { "active" } else { "disabled" };
    println!(
        "{} on project {} is {state}.",
        member.email, member.project_id
    );
    Ok(())
}

fn invite(
    db: &CheckinDb,
    config: &Config,
    id: ProjectId,
    email: &str,
    json: bool,
) -> anyhow::Result<()> {
    let signer = PayloadSigner::new(Config::signing_secret()?)?;
    let links = projects::invite_links(db, &signer, &config.links, id, email, Utc::now())?;
    if json {
        return print_json(&links);
    }
    println!("Accept: {}", links.accept);
    println!("Reject: {}", links.reject);
    Ok(())
}
