use std::path::PathBuf;

use thiserror::Error;
use virtclock_config::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Scenario file not found: {0}")]
    ScenarioNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scenario parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid scenario:\n{0}")]
    InvalidScenario(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Scenario start {0}ms is out of range")]
    StartOutOfRange(i64),

    #[error("Step {step} lies beyond the representable time range")]
    TimelineOverflow { step: u64 },

    #[error("State hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}
