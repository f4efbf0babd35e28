pub mod config;
pub mod content;
pub mod convert;
pub mod dashboard;
pub mod generate;
pub mod init;
pub mod insight;
pub mod project;
pub mod remind;
pub mod serve;
pub mod sweep;
pub mod trends;

use std::path::Path;

use anyhow::Context;
use standup_core::config::Config;
use standup_core::store::CheckinDb;
use standup_server::AppState;

/// Load the config (defaults when `standup.yaml` is absent) and open the
/// database it points at. Enough for commands that never sign or summarize.
pub(crate) fn open_db(root: &Path) -> anyhow::Result<(Config, CheckinDb)> {
    let config = Config::load_or_default(root).context("failed to load config")?;
    let path = config.database_path(root);
    let db = CheckinDb::open(&path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    Ok((config, db))
}

/// Full service wiring, including the signing secret and summarizer.
pub(crate) fn app_state(root: &Path) -> anyhow::Result<(Config, AppState)> {
    let config = Config::load_or_default(root).context("failed to load config")?;
    let state = AppState::from_config(root, &config)?;
    Ok((config, state))
}
