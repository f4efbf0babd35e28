use crate::error::{Result, StandupError};
use crate::paths;
use crate::types::ProjectId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the HMAC key for check-in and invite links.
pub const SIGNING_SECRET_ENV: &str = "STANDUP_SIGNING_SECRET";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// DatabaseConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; relative paths resolve against the data root.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DB_FILE)
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl DatabaseConfig {
    pub fn resolve(&self, root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            root.join(&self.path)
        }
    }
}

// ---------------------------------------------------------------------------
// LinksConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    #[serde(default = "default_link_ttl_hours")]
    pub reminder_ttl_hours: u32,
    #[serde(default = "default_link_ttl_hours")]
    pub invite_ttl_hours: u32,
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_link_ttl_hours() -> u32 {
    7 * 24
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            frontend_url: default_frontend_url(),
            reminder_ttl_hours: default_link_ttl_hours(),
            invite_ttl_hours: default_link_ttl_hours(),
        }
    }
}

impl LinksConfig {
    pub fn reminder_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.reminder_ttl_hours))
    }

    pub fn invite_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.invite_ttl_hours))
    }

    /// The link a member follows to fill in a check-in.
    pub fn checkin_link(&self, project_id: ProjectId, token: &str) -> String {
        format!(
            "{}/check-in?project_id={project_id}&payload={token}",
            self.frontend_url.trim_end_matches('/')
        )
    }

    pub fn invite_link(&self, token: &str) -> String {
        format!(
            "{}/invite?payload={token}",
            self.frontend_url.trim_end_matches('/')
        )
    }
}

// ---------------------------------------------------------------------------
// SchedulerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Claims older than this are considered abandoned at startup and at
    /// every sweep.
    #[serde(default = "default_stale_claim_minutes")]
    pub stale_claim_minutes: u32,
    /// Sweep the hour the server starts in instead of waiting for the next
    /// top of the hour.
    #[serde(default)]
    pub catch_up_on_start: bool,
    /// Tag written on trackers this instance creates. Defaults to `$HOSTNAME`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_stale_claim_minutes() -> u32 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_claim_minutes: default_stale_claim_minutes(),
            catch_up_on_start: false,
            instance_name: None,
        }
    }
}

impl SchedulerConfig {
    pub fn instance(&self) -> String {
        self.instance_name
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn stale_claim_after(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.stale_claim_minutes))
    }
}

// ---------------------------------------------------------------------------
// SummarizerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash-001".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SummarizerConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    7700
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            database: DatabaseConfig::default(),
            links: LinksConfig::default(),
            scheduler: SchedulerConfig::default(),
            summarizer: SummarizerConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(StandupError::NotInitialized(root.display().to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(StandupError::NotInitialized(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn database_path(&self, root: &Path) -> PathBuf {
        self.database.resolve(root)
    }

    /// Read the link signing secret from [`SIGNING_SECRET_ENV`].
    pub fn signing_secret() -> Result<String> {
        std::env::var(SIGNING_SECRET_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StandupError::InvalidConfig(format!("{SIGNING_SECRET_ENV} is not set")))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level, message: String| warnings.push(ConfigWarning { level, message });

        let url = self.links.frontend_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            push(
                WarnLevel::Error,
                format!("links.frontend_url '{url}' must start with http:// or https://"),
            );
        }
        if self.links.reminder_ttl_hours == 0 {
            push(
                WarnLevel::Error,
                "links.reminder_ttl_hours is 0, every check-in link would be expired".to_string(),
            );
        } else if self.links.reminder_ttl_hours > 30 * 24 {
            push(
                WarnLevel::Warning,
                format!(
                    "links.reminder_ttl_hours={} (over 30 days is unusual)",
                    self.links.reminder_ttl_hours
                ),
            );
        }
        if self.links.invite_ttl_hours == 0 {
            push(
                WarnLevel::Error,
                "links.invite_ttl_hours is 0, every invite link would be expired".to_string(),
            );
        }

        if self.scheduler.stale_claim_minutes == 0 {
            push(
                WarnLevel::Error,
                "scheduler.stale_claim_minutes is 0, in-flight summaries would be released"
                    .to_string(),
            );
        }

        if self.summarizer.model.trim().is_empty() {
            push(WarnLevel::Error, "summarizer.model is empty".to_string());
        }
        if self.summarizer.timeout_secs == 0 {
            push(WarnLevel::Error, "summarizer.timeout_secs is 0".to_string());
        }
        if self.summarizer.api_key().is_none() {
            push(
                WarnLevel::Warning,
                format!(
                    "{} is not set, summaries cannot be generated",
                    self.summarizer.api_key_env
                ),
            );
        }

        if self.server.port == 0 {
            push(
                WarnLevel::Warning,
                "server.port is 0, an ephemeral port will be chosen".to_string(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
