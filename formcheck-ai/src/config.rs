//! Configuration resolution for formcheck-ai
//!
//! Each setting resolves CLI → ENV (`FORMCHECK_*`) → TOML → compiled default.

use formcheck_common::config::{resolve_setting, validate_base_url, CompiledDefaults, TomlConfig};
use formcheck_common::Result;
use std::time::Duration;
use tracing::info;

use crate::overlay::scheduler::OverlayConfig;
use crate::services::job_orchestrator::{OrchestratorConfig, PollingConfig};

pub const ENV_ANALYZER_URL: &str = "FORMCHECK_ANALYZER_URL";
pub const ENV_USER_ID: &str = "FORMCHECK_USER_ID";
pub const ENV_MUSCLE_GROUP: &str = "FORMCHECK_MUSCLE_GROUP";
pub const ENV_PORT: &str = "FORMCHECK_PORT";
pub const ENV_INLINE_MAX_BYTES: &str = "FORMCHECK_INLINE_MAX_BYTES";
pub const ENV_POLL_INTERVAL_MS: &str = "FORMCHECK_POLL_INTERVAL_MS";
pub const ENV_POLL_MAX_RETRIES: &str = "FORMCHECK_POLL_MAX_RETRIES";
pub const ENV_POLL_TIMEOUT_SECS: &str = "FORMCHECK_POLL_TIMEOUT_SECS";
pub const ENV_LOG_LEVEL: &str = "FORMCHECK_LOG_LEVEL";
pub const ENV_ANALYTICS_PANEL: &str = "FORMCHECK_ANALYTICS_PANEL";

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub analyzer_url: Option<String>,
    pub log_level: Option<String>,
    pub inline_max_bytes: Option<u64>,
    pub include_analytics_panel: Option<bool>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub port: u16,
    pub analyzer_url: String,
    pub log_level: String,
    pub orchestrator: OrchestratorConfig,
    pub overlay: OverlayConfig,
}

impl ServiceConfig {
    /// Resolve every setting; only an invalid analyzer URL is an error
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::default();

        let analyzer_url = resolve_setting(
            cli.analyzer_url.clone(),
            ENV_ANALYZER_URL,
            toml.analyzer_url.clone(),
            defaults.analyzer_url,
        );
        let analyzer_url = validate_base_url(&analyzer_url)?;

        let port = resolve_setting(cli.port, ENV_PORT, toml.port, defaults.port);
        let log_level = resolve_setting(
            cli.log_level.clone(),
            ENV_LOG_LEVEL,
            toml.logging.level.clone(),
            defaults.log_level,
        );

        let polling = PollingConfig {
            interval: Duration::from_millis(
                resolve_setting(
                    None,
                    ENV_POLL_INTERVAL_MS,
                    toml.polling.interval_ms,
                    defaults.poll_interval_ms,
                )
                .max(1),
            ),
            max_retries: resolve_setting(
                None,
                ENV_POLL_MAX_RETRIES,
                toml.polling.max_retries,
                defaults.poll_max_retries,
            ),
            max_backoff: Duration::from_millis(
                toml.polling.max_backoff_ms.unwrap_or(defaults.poll_max_backoff_ms),
            ),
            timeout: match resolve_setting(
                None,
                ENV_POLL_TIMEOUT_SECS,
                toml.polling.timeout_secs,
                defaults.poll_timeout_secs,
            ) {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        };

        let orchestrator = OrchestratorConfig {
            polling,
            inline_max_bytes: resolve_setting(
                cli.inline_max_bytes,
                ENV_INLINE_MAX_BYTES,
                toml.inline_max_bytes,
                defaults.inline_max_bytes,
            ),
            user_id: resolve_setting(None, ENV_USER_ID, toml.user_id.clone(), defaults.user_id),
            default_muscle_group: resolve_setting(
                None,
                ENV_MUSCLE_GROUP,
                toml.muscle_group.clone(),
                defaults.muscle_group,
            ),
        };

        let base = OverlayConfig::default();
        let section = &toml.overlay;
        let overlay = OverlayConfig {
            include_analytics_panel: resolve_setting(
                cli.include_analytics_panel,
                ENV_ANALYTICS_PANEL,
                section.include_analytics_panel,
                base.include_analytics_panel,
            ),
            caption_margin: section.caption_margin.unwrap_or(base.caption_margin),
            panel_width: section.panel_width.unwrap_or(base.panel_width),
            caption_min_chars: section.caption_min_chars.unwrap_or(base.caption_min_chars),
            panel_min_chars: section.panel_min_chars.unwrap_or(base.panel_min_chars),
            point_tolerance_secs: section.point_tolerance_secs.unwrap_or(base.point_tolerance_secs),
            jump_dwell_secs: section.jump_dwell_secs.unwrap_or(base.jump_dwell_secs),
            selection_override: section
                .selection_override_secs
                .map(Duration::from_secs)
                .unwrap_or(base.selection_override),
            frame_rate: section.frame_rate.unwrap_or(base.frame_rate).max(1),
            ..base
        };

        info!(
            port,
            analyzer_url = %analyzer_url,
            poll_interval_ms = orchestrator.polling.interval.as_millis() as u64,
            analytics_panel = overlay.include_analytics_panel,
            "Configuration resolved"
        );

        Ok(Self {
            port,
            analyzer_url,
            log_level,
            orchestrator,
            overlay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcheck_common::config::{OverlayToml, PollingToml};

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::resolve(&CliOverrides::default(), &TomlConfig::default()).unwrap();
        assert_eq!(config.analyzer_url, "http://127.0.0.1:8000");
        assert_eq!(config.orchestrator.polling.interval, Duration::from_secs(3));
        assert_eq!(config.orchestrator.polling.timeout, Some(Duration::from_secs(600)));
        assert!(config.overlay.include_analytics_panel);
    }

    #[test]
    fn test_toml_sections_apply() {
        let toml = TomlConfig {
            analyzer_url: Some("https://analyzer.example/".to_string()),
            polling: PollingToml {
                max_backoff_ms: Some(9_000),
                ..Default::default()
            },
            overlay: OverlayToml {
                caption_margin: Some(40.0),
                panel_width: Some(280.0),
                jump_dwell_secs: Some(4.0),
                selection_override_secs: Some(8),
                ..Default::default()
            },
            ..Default::default()
        };
        let config = ServiceConfig::resolve(&CliOverrides::default(), &toml).unwrap();
        assert_eq!(config.analyzer_url, "https://analyzer.example");
        assert_eq!(config.orchestrator.polling.max_backoff, Duration::from_millis(9_000));
        assert_eq!(config.overlay.caption_margin, 40.0);
        assert_eq!(config.overlay.caption_max_width(1280.0), 1280.0 - 320.0);
        assert_eq!(config.overlay.jump_dwell_secs, 4.0);
        assert_eq!(config.overlay.selection_override, Duration::from_secs(8));
    }

    #[test]
    fn test_invalid_analyzer_url_is_rejected() {
        let cli = CliOverrides {
            analyzer_url: Some("localhost:8000".to_string()),
            ..Default::default()
        };
        assert!(ServiceConfig::resolve(&cli, &TomlConfig::default()).is_err());
    }
}
