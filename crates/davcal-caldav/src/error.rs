//! Error types for CalDAV operations.
//!
//! Every failure that crosses the session boundary is a [`CalDavError`]
//! tagged with a [`CalDavErrorCode`]. Callers match on the code; the message
//! is for humans.

use std::fmt;
use thiserror::Error;

/// The category of a CalDAV error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalDavErrorCode {
    /// The session has not been opened (or has been closed).
    NotInitialized,
    /// The object or collection does not exist.
    NotFound,
    /// A conditional write or delete did not match the current version token.
    PreconditionFailed,
    /// The payload holds no component of the expected kind.
    MalformedObject,
    /// Network or protocol-level failure.
    Transport,
    /// Missing or invalid configuration (e.g. absent credentials).
    Configuration,
}

impl CalDavErrorCode {
    /// Returns a machine-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::NotFound => "not_found",
            Self::PreconditionFailed => "precondition_failed",
            Self::MalformedObject => "malformed_object",
            Self::Transport => "transport_error",
            Self::Configuration => "configuration_error",
        }
    }
}

impl fmt::Display for CalDavErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while talking to a CalDAV server.
#[derive(Debug, Error)]
pub struct CalDavError {
    code: CalDavErrorCode,
    message: String,
    /// HTTP status that produced this error, when there was one.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CalDavError {
    /// Creates a new error with the given code and message.
    pub fn new(code: CalDavErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// The session is not active.
    pub fn not_initialized() -> Self {
        Self::new(
            CalDavErrorCode::NotInitialized,
            "session is not open; call open() first",
        )
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CalDavErrorCode::NotFound, message)
    }

    /// Creates a precondition-failed error.
    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::new(CalDavErrorCode::PreconditionFailed, message)
    }

    /// Creates a malformed-object error.
    pub fn malformed_object(message: impl Into<String>) -> Self {
        Self::new(CalDavErrorCode::MalformedObject, message)
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(CalDavErrorCode::Transport, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(CalDavErrorCode::Configuration, message)
    }

    /// Records the HTTP status that produced this error.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> CalDavErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Shorthand for `code() == NotFound`.
    pub fn is_not_found(&self) -> bool {
        self.code == CalDavErrorCode::NotFound
    }

    /// Shorthand for `code() == PreconditionFailed`.
    pub fn is_precondition_failed(&self) -> bool {
        self.code == CalDavErrorCode::PreconditionFailed
    }
}

impl fmt::Display for CalDavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        Ok(())
    }
}

impl From<reqwest::Error> for CalDavError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "connection failed".to_string()
        } else {
            "request failed".to_string()
        };
        Self::transport(message).with_source(err)
    }
}

/// A specialized Result type for CalDAV operations.
pub type CalDavResult<T> = Result<T, CalDavError>;
