//! Logging and metrics switches.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation::validate_log_filter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TelemetryConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    #[validate(custom(function = "validate_log_filter"))]
    pub log_filter: String,

    /// Collect Prometheus counters and print them after a replay.
    #[serde(default)]
    pub metrics: bool,
}

fn default_log_filter() -> String {
    "info".into()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            metrics: false,
        }
    }
}
