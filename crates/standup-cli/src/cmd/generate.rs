use crate::output::print_json;
use chrono::NaiveDate;
use standup_core::types::ProjectId;
use std::path::Path;

/// Generate the insight for `date`, optionally before everyone has answered.
pub fn run(
    root: &Path,
    project_id: ProjectId,
    date: NaiveDate,
    force: bool,
    json: bool,
) -> anyhow::Result<()> {
    let (_, app) = super::app_state(root)?;
    let insight = app.manual.force_or_request(project_id, date, force)?;

    if json {
        return print_json(&insight);
    }
    println!(
        "Generated insight {} from {} response(s).",
        insight.id,
        insight.response_ids.len()
    );
    println!("\n{}", insight.summary);
    println!("\nDiversion: {}", insight.diversion_range);
    Ok(())
}
