pub mod checkins;
pub mod content;
pub mod insights;
pub mod reminders;
pub mod schedules;
pub mod trends;
