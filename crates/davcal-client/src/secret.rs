//! Secret references in configuration values.
//!
//! `username` and `password` in `config.toml` may point at a secret kept
//! outside the file:
//!
//! - `pass::path/in/store` runs `pass show path/in/store` and takes the first line
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - anything else is the literal value

use crate::error::{ClientError, ClientResult};

/// A parsed configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretRef<'a> {
    /// Entry in the `pass` password store.
    Pass(&'a str),
    /// Environment variable.
    Env(&'a str),
    /// Literal value.
    Plain(&'a str),
}

impl<'a> SecretRef<'a> {
    /// Classifies a raw configuration value.
    pub fn parse(value: &'a str) -> Self {
        if let Some(path) = value.strip_prefix("pass::") {
            Self::Pass(path)
        } else if let Some(var) = value.strip_prefix("env::") {
            Self::Env(var)
        } else {
            Self::Plain(value)
        }
    }

    /// Returns true for `pass::` and `env::` values.
    pub fn is_reference(&self) -> bool {
        !matches!(self, Self::Plain(_))
    }

    /// Produces the secret value.
    pub fn resolve(&self) -> ClientResult<String> {
        match *self {
            Self::Pass(path) => resolve_pass(path),
            Self::Env(var) => std::env::var(var).map_err(|_| {
                ClientError::Config(format!("environment variable `{}` is not set", var))
            }),
            Self::Plain(value) => Ok(value.to_string()),
        }
    }
}

/// Resolves a configuration value that may be a secret reference.
pub fn resolve(value: &str) -> ClientResult<String> {
    SecretRef::parse(value).resolve()
}

fn resolve_pass(path: &str) -> ClientResult<String> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| ClientError::Config(format!("failed to run `pass show {}`: {}", path, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ClientError::Config(format!(
            "`pass show {}` failed ({}): {}",
            path,
            output.status,
            stderr.trim()
        )));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| ClientError::Config(format!("`pass show {}` produced no output", path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prefixes() {
        assert_eq!(SecretRef::parse("pass::dav/work"), SecretRef::Pass("dav/work"));
        assert_eq!(SecretRef::parse("env::DAV_PASS"), SecretRef::Env("DAV_PASS"));
        assert_eq!(SecretRef::parse("hunter2"), SecretRef::Plain("hunter2"));
        assert!(!SecretRef::parse("env:DAV_PASS").is_reference());
        assert!(SecretRef::parse("env::DAV_PASS").is_reference());
    }

    #[test]
    fn plain_text_passthrough() {
        assert_eq!(resolve("alice").unwrap(), "alice");
        assert_eq!(resolve("").unwrap(), "");
    }

    #[test]
    fn env_reference_resolves() {
        unsafe {
            std::env::set_var("_DAVCAL_TEST_SECRET", "s3cret");
        }
        assert_eq!(resolve("env::_DAVCAL_TEST_SECRET").unwrap(), "s3cret");
        unsafe {
            std::env::remove_var("_DAVCAL_TEST_SECRET");
        }
    }

    #[test]
    fn env_reference_missing_var_errors() {
        let err = resolve("env::_DAVCAL_UNSET_VAR_98765").unwrap_err();
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn pass_reference_unknown_entry_errors() {
        assert!(resolve("pass::davcal/no/such/entry/98765").is_err());
    }
}
