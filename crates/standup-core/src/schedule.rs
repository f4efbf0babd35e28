//! Local-to-UTC conversion of weekly check-in schedules.
//!
//! A schedule is authored as a local triple (weekdays, time of day, whole-hour
//! offset). The dispatcher only ever looks at the derived UTC weekdays and UTC
//! time, so the two halves must never drift apart. [`ScheduleTimes`] owns both
//! halves and can only be built (or edited) through the converter.

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday,
};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::error::ScheduleError;
use crate::types::{parse_weekday, weekday_name};

pub const MIN_OFFSET_HOURS: i32 = -12;
pub const MAX_OFFSET_HOURS: i32 = 14;

/// Monday 2024-01-01. Any week works as long as weekday arithmetic around it
/// is unambiguous; this one keeps the anchor dates readable in tests.
fn reference_monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Convert local weekdays + time at `offset_hours` into UTC weekdays + time.
///
/// Each day is shifted on its own; the output has one entry per input day,
/// in input order.
pub fn to_utc(
    local_days: &[Weekday],
    local_time: NaiveTime,
    offset_hours: i32,
) -> Result<(Vec<Weekday>, NaiveTime), ScheduleError> {
    validate_days(local_days)?;
    validate_offset(offset_hours)?;
    Ok(shift(local_days, local_time, -offset_hours))
}

/// Inverse of [`to_utc`]: recover the local weekdays + time from the UTC pair.
pub fn from_utc(
    utc_days: &[Weekday],
    utc_time: NaiveTime,
    offset_hours: i32,
) -> Result<(Vec<Weekday>, NaiveTime), ScheduleError> {
    validate_days(utc_days)?;
    validate_offset(offset_hours)?;
    Ok(shift(utc_days, utc_time, offset_hours))
}

fn shift(days: &[Weekday], time: NaiveTime, hours: i32) -> (Vec<Weekday>, NaiveTime) {
    let mut out_time = time;
    let shifted = days
        .iter()
        .map(|day| {
            let date = reference_monday() + Duration::days(i64::from(day.num_days_from_monday()));
            let moved = NaiveDateTime::new(date, time) + Duration::hours(i64::from(hours));
            out_time = moved.time();
            moved.weekday()
        })
        .collect();
    (shifted, out_time)
}

fn validate_days(days: &[Weekday]) -> Result<(), ScheduleError> {
    if days.is_empty() {
        return Err(ScheduleError::InvalidSchedule(
            "at least one check-in day is required".into(),
        ));
    }
    for (i, day) in days.iter().enumerate() {
        if days[..i].contains(day) {
            return Err(ScheduleError::InvalidSchedule(format!(
                "duplicate check-in day '{}'",
                weekday_name(*day)
            )));
        }
    }
    Ok(())
}

fn validate_offset(offset_hours: i32) -> Result<(), ScheduleError> {
    if !(MIN_OFFSET_HOURS..=MAX_OFFSET_HOURS).contains(&offset_hours) {
        return Err(ScheduleError::InvalidSchedule(format!(
            "timezone offset {offset_hours} is outside [{MIN_OFFSET_HOURS}, +{MAX_OFFSET_HOURS}]"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a 24-hour `HH:MM` (or `HH:MM:SS`) time of day.
pub fn parse_local_time(raw: &str) -> Result<NaiveTime, ScheduleError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| ScheduleError::InvalidSchedule(format!("invalid time of day '{raw}'")))
}

static OFFSET_RE: OnceLock<Regex> = OnceLock::new();

fn offset_re() -> &'static Regex {
    OFFSET_RE.get_or_init(|| Regex::new(r"^(?i:utc|gmt)?\s*([+-]?\d{1,2})?$").unwrap())
}

/// Parse a whole-hour offset: `+1`, `-5`, `0`, `UTC+1`, `UTC-03`, `UTC`.
pub fn parse_offset(raw: &str) -> Result<i32, ScheduleError> {
    let trimmed = raw.trim();
    let invalid = || ScheduleError::InvalidSchedule(format!("invalid timezone offset '{raw}'"));
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let caps = offset_re().captures(trimmed).ok_or_else(invalid)?;
    let hours = match caps.get(1) {
        Some(m) => m.as_str().parse::<i32>().map_err(|_| invalid())?,
        None => 0,
    };
    validate_offset(hours)?;
    Ok(hours)
}

/// Render an offset the way it is shown to users: `UTC+1`, `UTC-5`, `UTC+0`.
pub fn format_offset(offset_hours: i32) -> String {
    format!("UTC{offset_hours:+}")
}

pub fn parse_days<S: AsRef<str>>(names: &[S]) -> Result<Vec<Weekday>, ScheduleError> {
    names.iter().map(|n| parse_weekday(n.as_ref())).collect()
}

// ---------------------------------------------------------------------------
// ScheduleTimes
// ---------------------------------------------------------------------------

/// The local triple together with its UTC derivation.
///
/// Fields are private: the only ways to obtain a value are [`ScheduleTimes::new`]
/// and [`ScheduleTimes::reschedule`], both of which run the converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleTimes {
    local_days: Vec<Weekday>,
    local_time: NaiveTime,
    offset_hours: i32,
    utc_days: Vec<Weekday>,
    utc_time: NaiveTime,
}

impl ScheduleTimes {
    pub fn new(
        local_days: Vec<Weekday>,
        local_time: NaiveTime,
        offset_hours: i32,
    ) -> Result<Self, ScheduleError> {
        // Minute precision; seconds would make the hourly sweep ambiguous.
        let local_time = local_time
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(local_time);
        let (utc_days, utc_time) = to_utc(&local_days, local_time, offset_hours)?;
        Ok(Self {
            local_days,
            local_time,
            offset_hours,
            utc_days,
            utc_time,
        })
    }

    /// Parse the user-facing form (`["Monday"]`, `"09:00"`, `"UTC+1"`).
    pub fn parse<S: AsRef<str>>(
        days: &[S],
        time: &str,
        offset: &str,
    ) -> Result<Self, ScheduleError> {
        Self::new(
            parse_days(days)?,
            parse_local_time(time)?,
            parse_offset(offset)?,
        )
    }

    /// Replace the local triple, recomputing the UTC half.
    pub fn reschedule(
        &mut self,
        local_days: Vec<Weekday>,
        local_time: NaiveTime,
        offset_hours: i32,
    ) -> Result<(), ScheduleError> {
        *self = Self::new(local_days, local_time, offset_hours)?;
        Ok(())
    }

    pub fn local_days(&self) -> &[Weekday] {
        &self.local_days
    }

    pub fn local_time(&self) -> NaiveTime {
        self.local_time
    }

    pub fn offset_hours(&self) -> i32 {
        self.offset_hours
    }

    pub fn utc_days(&self) -> &[Weekday] {
        &self.utc_days
    }

    pub fn utc_time(&self) -> NaiveTime {
        self.utc_time
    }

    /// True when the hourly sweep at `now` should fire this schedule.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.utc_time.hour() == now.hour() && self.utc_days.contains(&now.weekday())
    }

    /// Wall-clock time at the schedule's offset for the UTC instant `now`.
    pub fn local_datetime(&self, now: DateTime<Utc>) -> NaiveDateTime {
        local_datetime(now, self.offset_hours)
    }

    /// True when `date` (a local calendar date) is one of the local check-in days.
    pub fn fires_on(&self, date: NaiveDate) -> bool {
        self.local_days.contains(&date.weekday())
    }
}

/// Wall-clock time at `offset_hours` for the UTC instant `now`.
pub fn local_datetime(now: DateTime<Utc>, offset_hours: i32) -> NaiveDateTime {
    now.naive_utc() + Duration::hours(i64::from(offset_hours))
}
