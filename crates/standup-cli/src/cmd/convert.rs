use crate::output::{print_json, print_table};
use standup_core::schedule::{format_offset, ScheduleTimes};
use standup_core::types::weekday_name;

pub fn run(days: &[String], time: &str, offset: &str, json: bool) -> anyhow::Result<()> {
    let days: Vec<&str> = days
        .iter()
        .flat_map(|d| d.split(','))
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .collect();
    if days.is_empty() {
        anyhow::bail!("at least one weekday is required");
    }
    let times = ScheduleTimes::parse(&days, time, offset)?;
    let names = |ds: &[chrono::Weekday]| -> Vec<&'static str> {
        ds.iter().map(|d| weekday_name(*d)).collect()
    };

    if json {
        return print_json(&serde_json::json!({
            "local_days": names(times.local_days()),
            "local_time": times.local_time().format("%H:%M").to_string(),
            "offset": format_offset(times.offset_hours()),
            "utc_days": names(times.utc_days()),
            "utc_time": times.utc_time().format("%H:%M").to_string(),
        }));
    }

    print_table(
        &["", "DAYS", "TIME"],
        vec![
            vec![
                format_offset(times.offset_hours()),
                names(times.local_days()).join(", "),
                times.local_time().format("%H:%M").to_string(),
            ],
            vec![
                "UTC".to_string(),
                names(times.utc_days()).join(", "),
                times.utc_time().format("%H:%M").to_string(),
            ],
        ],
    );
    Ok(())
}
