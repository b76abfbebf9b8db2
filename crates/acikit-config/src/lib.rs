//! Controller credentials and connection settings.
//!
//! Loads a flat TOML file (`acikit.toml` by default) merged with
//! `ACIKIT_`-prefixed environment variables, and translates the result
//! into an [`acikit_api::SessionConfig`]. Scripts that manage many
//! fabrics keep one file per controller and point at it explicitly.

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use acikit_api::SessionConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config struct ───────────────────────────────────────────────────

/// Flat controller configuration.
///
/// The keys mirror what operators already keep in their credential
/// files: `url`, `login`, `password`, plus a few session knobs.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Controller root URL, e.g. `https://apic.example.com`.
    pub url: String,

    /// Login name.
    pub login: String,

    /// Password (plaintext in the file -- prefer `ACIKIT_PASSWORD`).
    #[serde(default)]
    pub password: Option<String>,

    /// Verify the controller's TLS certificate.
    #[serde(default)]
    pub verify_tls: bool,

    /// Open the event channel and allow subscriptions.
    #[serde(default = "default_subscriptions")]
    pub subscriptions_enabled: bool,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_subscriptions() -> bool {
    true
}
fn default_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            login: String::new(),
            password: None,
            verify_tls: false,
            subscriptions_enabled: default_subscriptions(),
            timeout: default_timeout(),
        }
    }
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load configuration from `acikit.toml` in the working directory,
/// overridden by `ACIKIT_`-prefixed environment variables.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(Path::new("acikit.toml"))
}

/// Load configuration from an explicit TOML path plus the environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ACIKIT_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Build a [`SessionConfig`] from this config, validating the URL
    /// and requiring a password from file or environment.
    pub fn into_session_config(self) -> Result<SessionConfig, ConfigError> {
        let url: url::Url = self.url.parse().map_err(|_| ConfigError::Validation {
            field: "url".into(),
            reason: format!("invalid URL: {}", self.url),
        })?;

        if self.login.is_empty() {
            return Err(ConfigError::Validation {
                field: "login".into(),
                reason: "login must not be empty".into(),
            });
        }

        let password = self.password.ok_or_else(|| ConfigError::Validation {
            field: "password".into(),
            reason: "set it in the config file or via ACIKIT_PASSWORD".into(),
        })?;

        let mut session = SessionConfig::new(url, self.login, SecretString::from(password));
        session.verify_tls = self.verify_tls;
        session.subscriptions_enabled = self.subscriptions_enabled;
        session.timeout = Duration::from_secs(self.timeout);
        Ok(session)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
