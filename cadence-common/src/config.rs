//! Bootstrap configuration loading and secret resolution
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config directory (`~/.config/cadence/<file>`)
//! 4. No file: built-in defaults

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name used under the platform config directory
pub const CONFIG_DIR_NAME: &str = "cadence";

/// HTTP server bootstrap settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5725
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Locate the TOML config file, if any.
///
/// A path given on the command line or through `env_var_name` is returned even when
/// the file does not exist, so that loading reports the mistake instead of silently
/// falling back to defaults. The per-user location is only returned when present.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join(CONFIG_DIR_NAME).join(file_name))
        .filter(|p| p.exists())
}

/// Load and deserialize a TOML config file, or defaults when `path` is `None`.
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No config file found, using built-in defaults");
        return Ok(T::default());
    };

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Where a resolved secret came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Environment,
    Toml,
}

impl SecretSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretSource::Environment => "environment",
            SecretSource::Toml => "TOML",
        }
    }
}

/// A secret value plus its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    pub value: String,
    pub source: SecretSource,
}

/// Resolve a secret (API key, token) from ENV → TOML.
///
/// Warns when both sources carry a value, since only the environment one is used.
pub fn resolve_secret(
    name: &str,
    env_var_name: &str,
    toml_value: Option<&str>,
) -> Option<ResolvedSecret> {
    let env_value = std::env::var(env_var_name).ok().filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in both environment ({}) and TOML config. Using environment (highest priority).",
            name, env_var_name
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable", name);
        return Some(ResolvedSecret {
            value: value.trim().to_string(),
            source: SecretSource::Environment,
        });
    }

    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", name);
        return Some(ResolvedSecret {
            value: value.trim().to_string(),
            source: SecretSource::Toml,
        });
    }

    None
}

/// Validate a key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
