use crate::output::print_json;
use chrono::NaiveDate;
use standup_core::types::ProjectId;
use std::path::Path;

pub fn run(
    root: &Path,
    project_id: ProjectId,
    date: NaiveDate,
    email: &str,
    json: bool,
) -> anyhow::Result<()> {
    let (_, app) = super::app_state(root)?;
    app.reminders.send_reminder(project_id, date, email)?;

    if json {
        print_json(&serde_json::json!({
            "project_id": project_id,
            "date": date,
            "email": email,
            "sent": true,
        }))
    } else {
        println!("Reminder for {date} sent to {email}.");
        Ok(())
    }
}
