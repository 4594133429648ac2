//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/davcal/config.toml` by default:
//!
//! ```toml
//! [caldav]
//! url = "https://calendar.dingtalk.com"
//! username = "alice"
//! password = "pass::dav/alice"
//! timeout_secs = 30
//! verify_tls = true
//! calendar = "Work"
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```
//!
//! `username` and `password` accept secret references (see [`crate::secret`]).
//! Command-line flags and `CALDAV_*` / `LOG_*` environment variables win over
//! the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use davcal_caldav::CalDavConfig;
use davcal_core::{TracingConfig, TracingOutputFormat, parse_level};

use crate::error::{ClientError, ClientResult};
use crate::secret::{self, SecretRef};

/// Server used when neither the file nor the environment names one.
pub const DEFAULT_URL: &str = "https://calendar.dingtalk.com";

const REDACTED: &str = "********";

/// Configuration for the davcal client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// CalDAV server settings.
    pub caldav: CalDavSettings,

    /// Log settings.
    pub logging: LoggingSettings,
}

/// CalDAV server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalDavSettings {
    /// Base URL (the calendar home).
    pub url: String,

    /// Username (supports `pass::` and `env::` prefixes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password (supports `pass::` and `env::` prefixes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// Calendar to use instead of the first discovered one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar: Option<String>,
}

impl Default for CalDavSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: None,
            password: None,
            timeout_secs: CalDavConfig::DEFAULT_TIMEOUT_SECS,
            verify_tls: true,
            calendar: None,
        }
    }
}

/// Log settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    pub level: String,

    /// Output format: `pretty`, `compact` or `json`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Values from the command line and environment that replace file settings.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
    pub calendar: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if it is absent.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("davcal")
    }

    /// Applies command-line and environment values on top of the file.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        let caldav = &mut self.caldav;
        if let Some(url) = &overrides.url {
            caldav.url = url.clone();
        }
        if let Some(username) = &overrides.username {
            caldav.username = Some(username.clone());
        }
        if let Some(password) = &overrides.password {
            caldav.password = Some(password.clone());
        }
        if let Some(timeout) = overrides.timeout_secs {
            caldav.timeout_secs = timeout;
        }
        if let Some(calendar) = &overrides.calendar {
            caldav.calendar = Some(calendar.clone());
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(format) = &overrides.log_format {
            self.logging.format = format.clone();
        }
        self
    }

    /// Builds the session configuration, resolving secret references.
    ///
    /// Credentials are only attached when both username and password are
    /// set; the session rejects a configuration without them when opened.
    pub fn to_caldav_config(&self) -> ClientResult<CalDavConfig> {
        let settings = &self.caldav;
        let mut config = CalDavConfig::new(&settings.url).map_err(|e| {
            ClientError::Config(format!("invalid CalDAV url `{}`: {}", settings.url, e))
        })?;

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            config = config.with_credentials(secret::resolve(username)?, secret::resolve(password)?);
        }
        config = config.with_timeout(Duration::from_secs(settings.timeout_secs));
        if !settings.verify_tls {
            config = config.with_insecure_tls();
        }
        Ok(config)
    }

    /// Builds the tracing setup; `--debug` wins over the `[logging]` table.
    pub fn tracing_config(&self, debug: bool) -> ClientResult<TracingConfig> {
        if debug {
            return Ok(TracingConfig::cli_debug());
        }
        let level = parse_level(&self.logging.level)
            .map_err(|e| ClientError::Config(e.to_string()))?;
        let format: TracingOutputFormat = self
            .logging
            .format
            .parse()
            .map_err(|e: davcal_core::TracingError| ClientError::Config(e.to_string()))?;
        Ok(TracingConfig::default().with_level(level).with_format(format))
    }

    /// A copy safe to print: literal passwords are masked, references kept.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(password) = config.caldav.password.as_mut() {
            if !SecretRef::parse(password).is_reference() {
                *password = REDACTED.to_string();
            }
        }
        config
    }
}
