//! TOML-based configuration system for patchtester.
//!
//! Sensitive values (the Perforce password or ticket) are stored as `_env`
//! fields that reference environment variable names. The actual secrets are
//! resolved at runtime via [`AppConfig::resolve_env_vars`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::model::Branch;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Perforce server settings.
    #[serde(default)]
    pub p4: P4Config,

    /// Release catalog: release name -> branch details.
    #[serde(default)]
    pub releases: BTreeMap<String, ReleaseConfig>,

    /// Integration behaviour.
    #[serde(default)]
    pub integration: IntegrationConfig,

    /// Where patch requests are read from.
    #[serde(default)]
    pub requests: RequestsConfig,

    /// Report delivery.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

// ---------------------------------------------------------------------------
// Perforce
// ---------------------------------------------------------------------------

/// Perforce server connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct P4Config {
    /// `P4PORT`, e.g. `ssl:perforce.example.com:1666`. Empty uses the environment.
    #[serde(default)]
    pub port: String,

    /// `P4USER`. Empty uses the environment.
    #[serde(default)]
    pub user: String,

    /// Environment variable holding the password or ticket.
    #[serde(default)]
    pub password_env: Option<String>,

    /// Default client workspace when `--client` is not given.
    #[serde(default)]
    pub client: Option<String>,

    /// Resolved password (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub password: Option<String>,
}

// ---------------------------------------------------------------------------
// Releases
// ---------------------------------------------------------------------------

/// One release / branch known to the tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseConfig {
    /// Short version name, e.g. `1.0`.
    pub version: String,
    /// Long release name, used by the ticket system.
    pub release_name: String,
    /// Depot path prefix of the branch.
    pub stream_prefix: String,
}

// ---------------------------------------------------------------------------
// Integration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Top-level path components ignored by cross-component detection.
    #[serde(default = "default_excluded_components")]
    pub excluded_components: Vec<String>,

    /// Lines of each local edit's description quoted in suggestions.
    #[serde(default = "default_description_lines")]
    pub description_lines: usize,
}

fn default_excluded_components() -> Vec<String> {
    vec!["testSpecs".into(), "SCons".into(), "buildMap".into()]
}
fn default_description_lines() -> usize {
    4
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            excluded_components: default_excluded_components(),
            description_lines: default_description_lines(),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestsConfig {
    /// TOML export of patch requests.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Report email configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// SMTP server address (e.g. `smtp.example.com:587`).
    #[serde(default)]
    pub email_smtp: Option<String>,

    /// Domain appended to the logged-in user when no explicit addresses are set.
    #[serde(default)]
    pub email_domain: Option<String>,

    /// Sender email address.
    #[serde(default)]
    pub email_from: Option<String>,

    /// Recipient email addresses.
    #[serde(default)]
    pub email_recipients: Vec<String>,
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!(releases = config.releases.len(), "configuration parsed successfully");
        Ok(config)
    }

    /// Resolve `*_env` fields from environment variables. Missing variables
    /// only log a warning.
    pub fn resolve_env_vars(&mut self) {
        if let Some(ref env_name) = self.p4.password_env {
            self.p4.password = resolve_optional_env(env_name, "p4.password_env");
        }
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, release) in &self.releases {
            if !release.stream_prefix.starts_with("//") {
                return Err(ConfigError::InvalidValue {
                    field: format!("releases.{}.stream_prefix", name),
                    detail: "stream prefix must be a depot path starting with //".into(),
                });
            }
            if release.stream_prefix.ends_with('/') {
                return Err(ConfigError::InvalidValue {
                    field: format!("releases.{}.stream_prefix", name),
                    detail: "stream prefix must not end with /".into(),
                });
            }
        }
        if self.integration.description_lines == 0 {
            return Err(ConfigError::InvalidValue {
                field: "integration.description_lines".into(),
                detail: "must be > 0".into(),
            });
        }
        if self.notifications.email_smtp.is_some()
            && self.notifications.email_recipients.is_empty()
            && self.notifications.email_domain.is_none()
        {
            return Err(ConfigError::InvalidValue {
                field: "notifications.email_recipients".into(),
                detail: "set recipients or email_domain when email_smtp is configured".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars();
        config.validate()?;
        Ok(config)
    }

    /// Look up a release by name and turn it into a branch descriptor.
    pub fn branch(&self, name: &str) -> Option<Branch> {
        self.releases.get(name).map(|r| Branch {
            name: r.version.clone(),
            release_name: r.release_name.clone(),
            prefix: r.stream_prefix.clone(),
        })
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}
