//! Configuration commands.

use std::io::Write;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Writes the effective configuration as TOML, passwords masked.
pub fn dump<W: Write>(config: &ClientConfig, out: &mut W) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&config.redacted())
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    writeln!(out, "# config.toml ({})", ClientConfig::default_path().display())?;
    writeln!(out, "{}", toml_str)?;
    Ok(())
}

/// Checks that the configuration can open a session.
///
/// Resolves secret references and checks the URL, credentials, timeout and
/// logging settings. Nothing is sent to the server.
pub fn validate<W: Write>(config: &ClientConfig, out: &mut W) -> ClientResult<()> {
    let caldav = config.to_caldav_config()?;
    caldav.validate()?;
    config.tracing_config(false)?;

    writeln!(out, "Configuration is valid ({}).", caldav.url_str())?;
    Ok(())
}

/// Shows the configuration file path.
pub fn path<W: Write>(out: &mut W) -> ClientResult<()> {
    writeln!(out, "config: {}", ClientConfig::default_path().display())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.caldav.url = "https://dav.example.com/dav/alice/".to_string();
        config.caldav.username = Some("alice".to_string());
        config.caldav.password = Some("hunter2".to_string());
        config
    }

    #[test]
    fn dump_masks_password() {
        let mut out = Vec::new();
        dump(&valid_config(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("# config.toml ("));
        assert!(text.contains("username = \"alice\""));
        assert!(text.contains("password = \"********\""));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn validate_accepts_complete_config() {
        let mut out = Vec::new();
        validate(&valid_config(), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Configuration is valid (https://dav.example.com/dav/alice/).\n"
        );
    }

    #[test]
    fn validate_rejects_missing_credentials() {
        let mut config = valid_config();
        config.caldav.password = None;
        let err = validate(&config, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, ClientError::CalDav(e) if e.code().as_str() == "configuration_error"));
    }

    #[test]
    fn validate_rejects_bad_log_level() {
        let mut config = valid_config();
        config.logging.level = "loud".to_string();
        assert!(matches!(
            validate(&config, &mut Vec::new()),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn path_names_config_toml() {
        let mut out = Vec::new();
        path(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("config: "));
        assert!(text.trim_end().ends_with("config.toml"));
    }
}
