use crate::output::print_json;
use chrono::NaiveDate;
use standup_core::types::ProjectId;
use std::path::Path;

/// Write behind-the-scenes content from the insights on `dates`.
pub fn run(
    root: &Path,
    project_id: ProjectId,
    owner_id: i64,
    dates: &[NaiveDate],
    json: bool,
) -> anyhow::Result<()> {
    let (_, app) = super::app_state(root)?;
    let outcome = app.content.generate(project_id, owner_id, dates)?;

    if json {
        return print_json(&outcome);
    }
    if outcome.created {
        println!(
            "Wrote content {} from {} day(s).",
            outcome.content.id,
            outcome.content.local_dates.len()
        );
    } else {
        println!(
            "Content {} already covers these days.",
            outcome.content.id
        );
    }
    println!("\n{}", outcome.content.content);
    Ok(())
}
