//! Controller configuration.
//!
//! Tunables and the class table come from a TOML file (path in `ROLE_SYNC_CONFIG`,
//! default `role-sync.toml`). Secrets are read from the environment only and never
//! appear in the file.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notify::{DEFAULT_QUEUE_CAPACITY, DEFAULT_TEMPLATES, NotifyConfig};
use crate::scheduler::SchedulerConfig;
use crate::types::{ChannelId, EligibilityRule, GuildId, RoleClassDefinition, TagStrategy};

/// Env var naming the config file.
pub const CONFIG_PATH_ENV: &str = "ROLE_SYNC_CONFIG";
/// Config file used when `ROLE_SYNC_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "role-sync.toml";
/// Overrides `scheduler.interval_secs`, in minutes.
pub const INTERVAL_MINS_ENV: &str = "ROLE_SYNC_INTERVAL_MINS";

/// Upper bound on the scheduler interval and initial delay (one week).
pub const MAX_SCHEDULE_SECS: u64 = 7 * 24 * 60 * 60;

pub const PLATFORM_TOKEN_ENV: &str = "ROLE_SYNC_PLATFORM_TOKEN";
pub const UPSTREAM_API_KEY_ENV: &str = "ROLE_SYNC_UPSTREAM_API_KEY";
pub const EVENT_SECRET_ENV: &str = "ROLE_SYNC_EVENT_SECRET";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ─── File layout ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub platform: PlatformConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub classes: Vec<RoleClassDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// The managed guild.
    pub guild_id: GuildId,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the profile service, without the `/api/sync` suffix.
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    #[serde(default = "default_snapshot_ttl")]
    pub snapshot_ttl_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        SchedulerSection {
            interval_secs: default_interval(),
            initial_delay_secs: default_initial_delay(),
            snapshot_ttl_secs: default_snapshot_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Celebrations are disabled when unset.
    #[serde(default)]
    pub channel_id: Option<ChannelId>,

    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_request_timeout")]
    pub post_timeout_secs: u64,

    #[serde(default = "default_templates")]
    pub templates: Vec<String>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        NotificationsConfig {
            channel_id: None,
            cooldown_secs: default_cooldown(),
            queue_capacity: default_queue_capacity(),
            post_timeout_secs: default_request_timeout(),
            templates: default_templates(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: default_listen_addr(),
        }
    }
}

// Defaults
fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_interval() -> u64 {
    600
}
fn default_initial_delay() -> u64 {
    30
}
fn default_snapshot_ttl() -> u64 {
    300
}
fn default_cooldown() -> u64 {
    3600
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_templates() -> Vec<String> {
    DEFAULT_TEMPLATES.iter().map(|t| t.to_string()).collect()
}
fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

// ─── Loading ──────────────────────────────────────────────────────────────────

impl Config {
    /// Loads the file named by `ROLE_SYNC_CONFIG` and applies env overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::load(&path)?;
        config.override_interval_mins(std::env::var(INTERVAL_MINS_ENV).ok().as_deref())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies an interval override given in minutes. Unparseable values are ignored.
    fn override_interval_mins(&mut self, raw: Option<&str>) -> Result<(), ConfigError> {
        let Some(mins) = raw.and_then(|s| s.trim().parse::<u64>().ok()) else {
            return Ok(());
        };
        self.scheduler.interval_secs = mins.checked_mul(60).ok_or_else(|| {
            ConfigError::Invalid(format!("{} of {} minutes overflows", INTERVAL_MINS_ENV, mins))
        })?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Invalid("scheduler interval must be non-zero".into()));
        }
        if self.scheduler.interval_secs > MAX_SCHEDULE_SECS
            || self.scheduler.initial_delay_secs > MAX_SCHEDULE_SECS
        {
            return Err(ConfigError::Invalid(format!(
                "scheduler interval and initial delay must not exceed {}s",
                MAX_SCHEDULE_SECS
            )));
        }

        let mut names = HashSet::new();
        for class in &self.classes {
            if !names.insert(class.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate class name {:?}",
                    class.name
                )));
            }
            let is_range = matches!(class.rule, EligibilityRule::KingdomRange);
            match (&class.tag, is_range) {
                (TagStrategy::Dynamic, false) => {
                    return Err(ConfigError::Invalid(format!(
                        "class {:?} needs a static tag",
                        class.name
                    )));
                }
                (TagStrategy::Static(_), true) => {
                    return Err(ConfigError::Invalid(format!(
                        "range class {:?} must use dynamic tags",
                        class.name
                    )));
                }
                _ => {}
            }
            if class.endpoint.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "class {:?} has no endpoint",
                    class.name
                )));
            }
        }
        Ok(())
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.scheduler.interval_secs),
            initial_delay: Duration::from_secs(self.scheduler.initial_delay_secs),
        }
    }

    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.scheduler.snapshot_ttl_secs)
    }

    /// Notification settings, or `None` if no channel is configured.
    pub fn notify(&self) -> Option<NotifyConfig> {
        let n = &self.notifications;
        n.channel_id.as_ref().map(|channel| NotifyConfig {
            channel: channel.clone(),
            cooldown: Duration::from_secs(n.cooldown_secs),
            queue_capacity: n.queue_capacity,
            post_timeout: Duration::from_secs(n.post_timeout_secs),
            templates: n.templates.clone(),
        })
    }
}

/// Credentials read from the environment.
#[derive(Clone)]
pub struct Secrets {
    pub platform_token: String,
    pub upstream_api_key: String,
    pub event_secret: Vec<u8>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets").finish_non_exhaustive()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        fn required(name: &'static str) -> Result<String, ConfigError> {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        }

        Ok(Secrets {
            platform_token: required(PLATFORM_TOKEN_ENV)?,
            upstream_api_key: required(UPSTREAM_API_KEY_ENV)?,
            event_secret: required(EVENT_SECRET_ENV)?.into_bytes(),
        })
    }
}
