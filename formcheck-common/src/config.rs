//! Configuration loading and resolution
//!
//! Every setting resolves with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`FORMCHECK_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: the service logs a
//! warning and continues with defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "FORMCHECK_CONFIG";

/// Logging section of the TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `"info"` or `"formcheck_ai=debug"`
    pub level: Option<String>,
}

/// `[polling]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollingToml {
    pub interval_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub max_backoff_ms: Option<u64>,
    /// 0 disables the deadline
    pub timeout_secs: Option<u64>,
}

/// `[overlay]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayToml {
    pub include_analytics_panel: Option<bool>,
    /// Caption width reserved besides the panel (pixels)
    pub caption_margin: Option<f64>,
    pub panel_width: Option<f64>,
    pub caption_min_chars: Option<usize>,
    pub panel_min_chars: Option<usize>,
    pub point_tolerance_secs: Option<f64>,
    pub jump_dwell_secs: Option<f64>,
    pub selection_override_secs: Option<u64>,
    pub frame_rate: Option<u32>,
}

/// Parsed TOML config file; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the remote AI analyzer
    pub analyzer_url: Option<String>,
    /// User id sent with upload-target requests
    pub user_id: Option<String>,
    /// Muscle group used when a job request names none
    pub muscle_group: Option<String>,
    /// HTTP port of the local service
    pub port: Option<u16>,
    /// Payloads up to this size go inline in `auto` mode
    pub inline_max_bytes: Option<u64>,
    #[serde(default)]
    pub polling: PollingToml,
    #[serde(default)]
    pub overlay: OverlayToml,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compiled defaults used when no other tier supplies a value
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefaults {
    pub analyzer_url: String,
    pub user_id: String,
    pub muscle_group: String,
    pub port: u16,
    pub inline_max_bytes: u64,
    pub poll_interval_ms: u64,
    pub poll_max_retries: u32,
    pub poll_max_backoff_ms: u64,
    pub poll_timeout_secs: u64,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            analyzer_url: "http://127.0.0.1:8000".to_string(),
            user_id: "local-user".to_string(),
            muscle_group: "Chest".to_string(),
            port: 5760,
            inline_max_bytes: 8 * 1024 * 1024,
            poll_interval_ms: 3000,
            poll_max_retries: 5,
            poll_max_backoff_ms: 30_000,
            poll_timeout_secs: 600,
            log_level: "info".to_string(),
        }
    }
}

/// Locate the config file for a service
///
/// Priority: explicit path → `FORMCHECK_CONFIG` → `<config_dir>/formcheck/<service>.toml`.
/// Returns `None` when no candidate exists on disk.
pub fn resolve_config_path(cli_arg: Option<&Path>, service_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let default_path = dirs::config_dir()?
        .join("formcheck")
        .join(format!("{}.toml", service_name));

    if default_path.exists() {
        Some(default_path)
    } else {
        debug!("No config file at {}", default_path.display());
        None
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

/// Resolve one setting through CLI → ENV → TOML → default
///
/// An environment value that fails to parse is logged and skipped.
pub fn resolve_setting<T>(cli: Option<T>, env_var: &str, toml: Option<T>, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = cli {
        return value;
    }

    if let Ok(raw) = std::env::var(env_var) {
        match raw.trim().parse::<T>() {
            Ok(value) => return value,
            Err(e) => warn!("Ignoring {}={:?}: {}", env_var, raw, e),
        }
    }

    toml.unwrap_or(default)
}

/// Validate an analyzer base URL (must be http or https)
pub fn validate_base_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(Error::Config(format!(
            "Analyzer URL must start with http:// or https://, got {:?}",
            url
        )))
    }
}
