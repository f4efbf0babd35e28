pub mod analytics;
pub mod clock;
pub mod config;
pub mod content;
pub mod dispatch;
pub mod error;
pub mod io;
pub mod manual;
pub mod migrations;
pub mod model;
pub mod paths;
pub mod payload;
pub mod ports;
pub mod projects;
pub mod reminder;
pub mod schedule;
pub mod store;
pub mod submission;
pub mod summarize;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{Result, StandupError};
