use crate::output::print_json;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::atomic::AtomicBool;

/// Run one dispatch sweep for the hour containing `at` (default: now).
pub fn run(root: &Path, at: Option<DateTime<Utc>>, json: bool) -> anyhow::Result<()> {
    let (_, app) = super::app_state(root)?;
    let now = at.unwrap_or_else(|| app.clock.now());
    let stop = AtomicBool::new(false);
    let report = app.dispatcher.sweep(now, &stop)?;

    if json {
        return print_json(&report);
    }
    println!("Sweep at {}", now.format("%Y-%m-%d %H:%M UTC"));
    println!("  due:                {}", report.due);
    println!("  dispatched:         {}", report.dispatched);
    println!("  already dispatched: {}", report.already_dispatched);
    println!("  no members:         {}", report.no_members);
    println!("  out of range:       {}", report.out_of_range);
    println!("  failed:             {}", report.failed);
    println!(
        "  reminders:          {} sent, {} failed",
        report.reminders_sent, report.reminders_failed
    );
    if report.stale_claims_released > 0 {
        println!("  stale claims:       {} released", report.stale_claims_released);
    }
    if report.failed > 0 {
        anyhow::bail!("{} schedule(s) failed to dispatch", report.failed);
    }
    Ok(())
}
