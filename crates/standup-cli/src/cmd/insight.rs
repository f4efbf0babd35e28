use crate::output::{print_json, print_table};
use chrono::NaiveDate;
use standup_core::analytics::{self, InsightReport};
use standup_core::clock::SystemClock;
use standup_core::types::ProjectId;
use std::path::Path;

pub fn run(root: &Path, project_id: ProjectId, date: NaiveDate, json: bool) -> anyhow::Result<()> {
    let (_, db) = super::open_db(root)?;
    let report = analytics::insight_report(&db, &SystemClock, project_id, date)?;

    if json {
        return print_json(&report);
    }

    match report {
        InsightReport::Generated { insight, responses } => {
            println!("Insight for project {project_id} on {date}");
            println!("\nSummary:\n  {}", insight.summary);
            println!("\nBlockers:\n  {}", insight.blockers);
            println!(
                "\nDiversion: {}\n  {}",
                insight.diversion_range, insight.diversion_context
            );
            println!();
            let rows = responses
                .into_iter()
                .map(|r| {
                    vec![
                        r.email,
                        r.did_yesterday,
                        r.doing_today,
                        if r.has_blocker { r.blockers } else { "-".into() },
                    ]
                })
                .collect();
            print_table(&["MEMBER", "YESTERDAY", "TODAY", "BLOCKERS"], rows);
        }
        InsightReport::FutureDate => println!("{date} is in the future."),
        InsightReport::NoSchedule => println!("Project {project_id} has no check-in schedule."),
        InsightReport::NotACheckInDay => println!("No check-in is scheduled on {date}."),
        InsightReport::NoCheckInSent => println!("No check-in was sent on {date}."),
        InsightReport::NoResponsesYet => println!("No responses submitted yet for {date}."),
        InsightReport::AwaitingResponses { expected, received } => {
            println!("Waiting for responses: {received} of {expected} submitted.")
        }
        InsightReport::ReadyToGenerate { expected, received } => println!(
            "All {received} of {expected} responses are in; run `standup generate {project_id} {date}`."
        ),
    }
    Ok(())
}
