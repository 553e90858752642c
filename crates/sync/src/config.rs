// Client configuration file.
//
// `~/.tripline/config.toml`. The auth token is never stored here;
// binaries take it from the command line or the environment.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::connection::ReconnectPolicy;
use crate::retry::RetryPolicy;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_PUSH_URL: &str = "ws://localhost:5000/ws";

/// Root directory for tripline client state: `~/.tripline/`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".tripline"))
}

/// Path to the config file: `~/.tripline/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

// ── Client config ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the pull API and the authorization service.
    pub api_url: String,
    /// Push channel endpoint.
    pub push_url: String,
    pub timings: Timings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            push_url: DEFAULT_PUSH_URL.into(),
            timings: Timings::default(),
        }
    }
}

impl ClientConfig {
    /// Load from `~/.tripline/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        config_path().map(|p| Self::load_or_default(&p)).unwrap_or_default()
    }

    /// Like `load_from`, but falls back to defaults. A missing file is
    /// silent; any other failure is logged before it is ignored.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring unreadable config, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        self.save_to(&path)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Plain-text schemes are accepted only for loopback hosts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("api_url", &self.api_url, "https", "http")?;
        validate_url("push_url", &self.push_url, "wss", "ws")?;
        if self.timings.max_reconnect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "timings.max_reconnect_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Delays and limits, in milliseconds.
///
/// `settle_delay_ms` and `access_retry_delay_ms` paper over the lag between
/// a grant change and the read path observing it; they are tuned guesses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Timings {
    pub settle_delay_ms: u64,
    pub access_retry_delay_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub stable_connection_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            access_retry_delay_ms: 2000,
            reconnect_delay_ms: 1000,
            max_reconnect_attempts: 5,
            stable_connection_ms: 10_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl Timings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            retry_delay: Duration::from_millis(self.access_retry_delay_ms),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            delay: Duration::from_millis(self.reconnect_delay_ms),
            max_attempts: self.max_reconnect_attempts,
            stable_after: Duration::from_millis(self.stable_connection_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn validate_url(field: &str, value: &str, secure: &str, plain: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(value)
        .map_err(|error| ConfigError::Invalid(format!("invalid {field} `{value}`: {error}")))?;
    match parsed.scheme() {
        scheme if scheme == secure => Ok(()),
        scheme if scheme == plain && is_loopback_host(parsed.host_str()) => Ok(()),
        _ => Err(ConfigError::Invalid(format!(
            "{field} must use {secure} ({plain} is allowed only for localhost testing)"
        ))),
    }
}

fn is_loopback_host(host: Option<&str>) -> bool {
    let Some(host) = host else {
        return false;
    };
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.parse::<IpAddr>().is_ok_and(|addr| addr.is_loopback())
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}
