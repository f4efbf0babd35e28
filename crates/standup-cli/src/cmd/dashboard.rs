use crate::output::{print_json, print_table};
use chrono::Utc;
use standup_core::analytics;
use std::path::Path;

pub fn run(root: &Path, owner_id: i64, json: bool) -> anyhow::Result<()> {
    let (_, db) = super::open_db(root)?;
    let board = analytics::dashboard(&db, owner_id, Utc::now())?;

    if json {
        return print_json(&board);
    }
    let counts = &board.analytics;
    println!(
        "Active projects: {} this month, {} last month",
        counts.active_projects, counts.active_projects_last_month
    );
    println!("Team members:    {}", counts.team_members);
    println!("Responses:       {} this month", counts.submitted_responses);
    if board.projects.is_empty() {
        println!("\nNo projects for owner {owner_id}.");
        return Ok(());
    }
    println!();
    let rows = board
        .projects
        .iter()
        .map(|s| vec![s.project.id.to_string(), s.project.title.clone(), s.status.to_string()])
        .collect();
    print_table(&["ID", "TITLE", "STATUS"], rows);
    Ok(())
}
