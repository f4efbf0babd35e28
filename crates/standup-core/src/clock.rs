use chrono::{DateTime, Duration, DurationRound, Utc};
use std::sync::Mutex;

/// Source of "now" for everything that depends on wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Time remaining until the next top of the hour after `now`.
///
/// Exactly on the hour returns a full hour, so a sweep that finishes at
/// `HH:00:00.000` never fires twice for the same hour.
pub fn until_next_hour(now: DateTime<Utc>) -> Duration {
    let floor = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
    floor + Duration::hours(1) - now
}
