//! # virtclock configuration
//!
//! Layered settings for the `virtclock` binary: logging, metrics, and the
//! default replay timeline.

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod replay;
mod telemetry;
mod validation;

pub use error::ConfigError;
pub use replay::ReplayConfig;
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/virtclock.yaml";
const ENV_PREFIX: &str = "VIRTCLOCK_";

/// Top‑level configuration container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, Default)]
pub struct VirtclockConfig {
    /// Log filter and metrics switch.
    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,

    /// Default timeline for `virtclock replay`.
    #[serde(default)]
    #[validate(nested)]
    pub replay: ReplayConfig,
}

impl VirtclockConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/virtclock.yaml`, skipped when missing
    /// 3. `config/<VIRTCLOCK_ENV>.yaml`, skipped when missing or `VIRTCLOCK_ENV` is unset
    /// 4. `VIRTCLOCK_*` environment variables, `__` separating nested keys
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        if let Ok(env) = std::env::var("VIRTCLOCK_ENV") {
            let env_file = format!("config/{env}.yaml");
            if Path::new(&env_file).exists() {
                figment = figment.merge(Yaml::file(env_file));
            }
        }

        Self::extract(figment)
    }

    /// Load configuration from a specific file, still honouring environment overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let figment = Figment::from(Serialized::defaults(Self::default())).merge(Yaml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn default_config_validates() {
        let config = VirtclockConfig::default();
        config.validate().expect("default config should validate");
        assert_eq!(config.telemetry.log_filter, "info");
        assert!(!config.telemetry.metrics);
        assert_eq!(config.replay.step_ms, 1);
        assert_eq!(config.replay.steps, 10);
    }

    #[test]
    fn load_without_files_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = VirtclockConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config, VirtclockConfig::default());
            Ok(())
        });
    }

    #[test]
    fn layers_merge_in_order() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/virtclock.yaml",
                "telemetry:\n  log_filter: debug\nreplay:\n  steps: 20\n  step_ms: 5\n",
            )?;
            jail.create_file("config/ci.yaml", "replay:\n  steps: 30\n")?;
            jail.set_env("VIRTCLOCK_ENV", "ci");
            jail.set_env("VIRTCLOCK_REPLAY__STEP_MS", "7");

            let config = VirtclockConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.telemetry.log_filter, "debug");
            assert_eq!(config.replay.steps, 30);
            assert_eq!(config.replay.step_ms, 7);
            Ok(())
        });
    }

    #[test]
    fn environment_override() {
        Jail::expect_with(|jail| {
            jail.set_env("VIRTCLOCK_TELEMETRY__METRICS", "true");
            let config = VirtclockConfig::load().map_err(|e| e.to_string())?;
            assert!(config.telemetry.metrics);
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("bad.yaml", "replay:\n  step_ms: 0\n  steps: 0\n")?;
            let err = VirtclockConfig::load_from_path("bad.yaml")
                .expect_err("zero step must fail validation");
            let message = err.to_string();
            assert!(matches!(err, ConfigError::Validation(_)));
            assert!(message.contains("replay.step_ms"), "{message}");
            assert!(message.contains("replay.steps"), "{message}");
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_reported() {
        let err = VirtclockConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        Jail::expect_with(|jail| {
            jail.create_file("broken.yaml", "replay: [1, 2\n")?;
            let err = VirtclockConfig::load_from_path("broken.yaml").unwrap_err();
            assert!(matches!(err, ConfigError::Parsing(_)));
            Ok(())
        });
    }
}
