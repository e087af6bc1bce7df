//! Console configuration persistence for the Otto console.
//!
//! This module reads a small JSON file that records connection and save
//! settings. The file lives in the standard configuration directory
//! (`~/.config/otto/console.json` on most platforms). Environment variables
//! override values from the file; command-line flags override both.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs_next::config_dir;
use otto_api::{ClientSettings, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::expand_tilde;

/// Environment variable allowing callers to override the configuration file path.
pub const CONFIG_PATH_ENV: &str = "OTTO_CONSOLE_CONFIG";
/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "OTTO_BASE_URL";
/// Environment variable carrying the API token.
pub const TOKEN_ENV: &str = "OTTO_TOKEN";

/// Default filename for the JSON payload.
pub const CONFIG_FILE_NAME: &str = "console.json";

/// Quiet window applied to edits when nothing is configured.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 1000;

/// Error surfaced when reading or writing the configuration fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure (for example, permissions or missing directory).
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization failure while saving.
    #[error("config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persisted configuration values. Every field is optional; unset fields use defaults.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base URL of the Otto admin API (for example, `https://otto.example.com/api`).
    pub api_base_url: Option<String>,
    /// API token. Prefer `OTTO_TOKEN` over storing it in the file.
    pub api_token: Option<String>,
    /// Quiet window for coalescing edits, in milliseconds.
    pub save_debounce_ms: Option<u64>,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: Option<u64>,
}

impl ConsoleConfig {
    /// Load the configuration from the default location and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = default_config_path();
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load the configuration from `path` without environment overrides.
    ///
    /// A missing file yields defaults; a malformed file is reported and ignored.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(config) => {
                    debug!(path = %path.display(), "loaded console config");
                    Ok(config)
                }
                Err(error) => {
                    warn!(
                        path = %path.display(),
                        error = %error,
                        "Failed to parse console config; using defaults"
                    );
                    Ok(Self::default())
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(ConfigError::Io(error)),
        }
    }

    /// Write the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(base_url) = non_empty_env(BASE_URL_ENV) {
            self.api_base_url = Some(base_url);
        }
        if let Some(token) = non_empty_env(TOKEN_ENV) {
            self.api_token = Some(token);
        }
    }

    /// Effective quiet window for coalescing edits.
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms.unwrap_or(DEFAULT_SAVE_DEBOUNCE_MS))
    }

    /// Connection settings for the API client.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.api_base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            token: self.api_token.clone(),
            timeout: self
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

/// Location of the configuration file, honoring [`CONFIG_PATH_ENV`].
pub fn default_config_path() -> PathBuf {
    if let Some(path) = non_empty_env(CONFIG_PATH_ENV) {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("otto")
        .join(CONFIG_FILE_NAME)
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
