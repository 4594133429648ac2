//! CalDAV session configuration.

use std::time::Duration;
use url::Url;

use crate::error::{CalDavError, CalDavResult};

/// Configuration for a CalDAV session.
#[derive(Clone)]
pub struct CalDavConfig {
    /// Base URL of the CalDAV server (the calendar home).
    pub url: Url,

    /// Username for authentication.
    pub username: Option<String>,

    /// Password for authentication.
    pub password: Option<String>,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,
}

impl CalDavConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a new CalDAV configuration with the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(url.as_ref())?;
        Ok(Self {
            url: parsed,
            username: None,
            password: None,
            verify_tls: true,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("davcal/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Sets the credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Disables TLS verification (for testing only).
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the base URL as a string.
    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }

    /// Returns true if both username and password are set and non-empty.
    pub fn has_credentials(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        filled(&self.username) && filled(&self.password)
    }

    /// Checks that the configuration can be used to open a session.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if credentials are missing or the URL
    /// is not http(s).
    pub fn validate(&self) -> CalDavResult<()> {
        if !matches!(self.url.scheme(), "http" | "https") {
            return Err(CalDavError::configuration(format!(
                "unsupported URL scheme `{}`",
                self.url.scheme()
            )));
        }
        if !self.has_credentials() {
            return Err(CalDavError::configuration(
                "CalDAV username and password must both be set",
            ));
        }
        if self.timeout.is_zero() {
            return Err(CalDavError::configuration("timeout must be greater than zero"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CalDavConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalDavConfig")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
