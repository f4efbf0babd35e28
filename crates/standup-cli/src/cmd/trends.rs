use crate::output::{print_json, print_table};
use chrono::Utc;
use standup_core::analytics::{self, TREND_WINDOW_DAYS};
use std::path::Path;

pub fn run(root: &Path, owner_id: i64, json: bool) -> anyhow::Result<()> {
    let (_, db) = super::open_db(root)?;
    let days = analytics::trends(&db, owner_id, Utc::now())?;

    if json {
        return print_json(&serde_json::json!({
            "owner_id": owner_id,
            "window_days": TREND_WINDOW_DAYS,
            "days": days,
        }));
    }
    if days.is_empty() {
        println!("No check-ins in the last {TREND_WINDOW_DAYS} days.");
        return Ok(());
    }
    let rows = days
        .iter()
        .map(|d| {
            vec![
                d.date.to_string(),
                d.updates.to_string(),
                d.blockers.to_string(),
            ]
        })
        .collect();
    print_table(&["DATE", "UPDATES", "BLOCKERS"], rows);
    Ok(())
}
