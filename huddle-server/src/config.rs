//! Coordinator configuration.
//!
//! Loaded from an optional TOML file, then overridden by `HUDDLE_*` environment variables.

use crate::error::ConfigError;
use huddle_core::{IceServerConfig, MeetingInfo, ScheduledMeeting, TeamInfo};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub reminders: ReminderConfig,

    /// STUN/TURN servers advertised to clients on connect.
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<IceServerConfig>,

    /// Bearer key required by the internal notification endpoint. Disabled when unset.
    #[serde(default)]
    pub internal_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Bound of each room's command queue.
    #[serde(default = "default_room_queue_capacity")]
    pub room_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            room_queue_capacity: default_room_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider.
    #[serde(default)]
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// REST base URL of the meeting store. Without it an in-memory store is used.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub service_token: Option<String>,

    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,

    /// Meetings preloaded into the in-memory store. Ignored when `base_url` is set.
    #[serde(default)]
    pub seed: Vec<MeetingInfo>,

    #[serde(default)]
    pub teams: Vec<TeamInfo>,

    #[serde(default)]
    pub schedule: Vec<ScheduledMeeting>,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            service_token: None,
            timeout_secs: default_store_timeout(),
            seed: Vec::new(),
            teams: Vec::new(),
            schedule: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between scans of the schedule.
    #[serde(default = "default_reminder_interval")]
    pub interval_secs: u64,
}

impl ReminderConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_reminder_interval(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_owned()
}

fn default_room_queue_capacity() -> usize {
    100
}

fn default_store_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_reminder_interval() -> u64 {
    60
}

fn default_ice_servers() -> Vec<IceServerConfig> {
    vec![IceServerConfig {
        urls: vec!["stun:stun.l.google.com:19302".to_owned()],
        username: None,
        credential: None,
    }]
}

impl Config {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self {
                ice_servers: default_ice_servers(),
                ..Self::default()
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `HUDDLE_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("HUDDLE_BIND") {
            self.server.bind = bind;
        }
        if let Some(secret) = lookup("HUDDLE_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(url) = lookup("HUDDLE_STORE_URL") {
            self.store.base_url = Some(url);
        }
        if let Some(token) = lookup("HUDDLE_STORE_TOKEN") {
            self.store.service_token = Some(token);
        }
        if let Some(key) = lookup("HUDDLE_INTERNAL_API_KEY") {
            self.internal_api_key = Some(key);
        }
        if let Some(urls) = lookup("HUDDLE_ICE_URLS") {
            let urls: Vec<String> = urls
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_owned)
                .collect();
            if !urls.is_empty() {
                self.ice_servers = vec![IceServerConfig {
                    urls,
                    username: lookup("HUDDLE_ICE_USERNAME"),
                    credential: lookup("HUDDLE_ICE_CREDENTIAL"),
                }];
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::Validation(
                "auth.jwt_secret must be set (or HUDDLE_JWT_SECRET)".into(),
            ));
        }
        if self.reminders.enabled && self.reminders.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "reminders.interval_secs must be greater than zero".into(),
            ));
        }
        if self.server.room_queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "server.room_queue_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
