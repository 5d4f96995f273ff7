//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILCOMPOSE_CONFIG` (environment variable)
//! 2. `~/.config/mailcompose/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailcompose\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::encode::charset::CharsetPolicy;
use crate::transport::smtp::{SmtpMode, SmtpSettings};

/// Environment variable holding the SMTP password.
pub const PASSWORD_ENV: &str = "MAILCOMPOSE_SMTP_PASSWORD";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// SMTP server used by `send`.
    pub smtp: SmtpConfig,
    /// Message composition defaults.
    pub compose: ComposeConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// SMTP server settings. The password is never stored here; it comes from
/// the command line or `MAILCOMPOSE_SMTP_PASSWORD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// "plain", "tls" or "starttls".
    pub mode: SmtpMode,
    pub login: Option<String>,
    /// Socket timeout in seconds (0 = none).
    pub timeout_secs: u64,
    /// Name sent with EHLO (default: local host name).
    pub helo_name: Option<String>,
}

/// Message composition defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Charset for headers and text bodies.
    pub default_charset: String,
    /// "utf8-fallback" or "strict".
    pub charset_policy: CharsetPolicy,
    /// Seed for generated Message-Id headers (none = no Message-Id).
    pub message_id_seed: Option<String>,
    /// Force quoted-printable on text and HTML bodies.
    pub quoted_printable: bool,
    /// Default sender, e.g. `"Jane Doe <jane@example.com>"`.
    pub from: Option<String>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            mode: SmtpMode::Plain,
            login: None,
            timeout_secs: 60,
            helo_name: None,
        }
    }
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            default_charset: "utf-8".to_string(),
            charset_policy: CharsetPolicy::Utf8Fallback,
            message_id_seed: None,
            quoted_printable: false,
            from: None,
        }
    }
}

impl SmtpConfig {
    /// Connection settings, with the password taken from the environment.
    pub fn to_settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.host.clone(),
            port: self.port,
            mode: self.mode,
            login: self.login.clone(),
            password: std::env::var(PASSWORD_ENV).ok(),
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            helo_name: self.helo_name.clone(),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Config::default(),
    }
}

/// Load configuration from `path`, falling back to defaults on error.
pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
    save_config_to(config, &path)
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILCOMPOSE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailcompose").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailcompose")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mailcompose.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.smtp.port, 25);
        assert_eq!(cfg.smtp.mode, SmtpMode::Plain);
        assert_eq!(cfg.compose.default_charset, "utf-8");
        assert_eq!(cfg.compose.charset_policy, CharsetPolicy::Utf8Fallback);
        assert!(!cfg.compose.quoted_printable);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.smtp.mode = SmtpMode::StartTls;
        cfg.compose.charset_policy = CharsetPolicy::Strict;
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        assert!(toml_str.contains("mode = \"starttls\""));
        assert!(toml_str.contains("charset_policy = \"strict\""));
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.smtp.mode, SmtpMode::StartTls);
        assert_eq!(parsed.compose.charset_policy, CharsetPolicy::Strict);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[smtp]
host = "mail.example.org"
mode = "tls"
port = 465

[compose]
default_charset = "iso-8859-1"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.smtp.host, "mail.example.org");
        assert_eq!(cfg.smtp.mode, SmtpMode::Tls);
        assert_eq!(cfg.compose.default_charset, "iso-8859-1");
        // Other fields use defaults
        assert_eq!(cfg.smtp.timeout_secs, 60);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_to_settings() {
        let smtp = SmtpConfig {
            timeout_secs: 0,
            login: Some("me".into()),
            ..Default::default()
        };
        let settings = smtp.to_settings();
        assert_eq!(settings.port, 25);
        assert!(settings.timeout.is_none());
        assert_eq!(settings.login.as_deref(), Some("me"));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.compose.from = Some("Jane <jane@example.com>".into());
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path);
        assert_eq!(loaded.compose.from.as_deref(), Some("Jane <jane@example.com>"));
    }

    #[test]
    fn test_save_config_follows_env_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mailcompose").join("config.toml");
        std::env::set_var("MAILCOMPOSE_CONFIG", &path);

        let mut cfg = Config::default();
        cfg.smtp.host = "mail.example.org".into();
        save_config(&cfg).unwrap();
        let loaded = load_config();
        std::env::remove_var("MAILCOMPOSE_CONFIG");

        assert!(path.exists());
        assert_eq!(loaded.smtp.host, "mail.example.org");
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[smtp]\nport = \"not a number\"\n").unwrap();
        let cfg = load_config_from(&path);
        assert_eq!(cfg.smtp.port, 25);
    }
}
