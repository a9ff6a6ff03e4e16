//! Default timeline for replaying scenarios on a virtual clock.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation::validate_unix_ms;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ReplayConfig {
    /// Virtual start time in milliseconds since the Unix epoch.
    #[serde(default)]
    #[validate(custom(function = "validate_unix_ms"))]
    pub start_unix_ms: i64,

    /// Virtual time added per step.
    #[serde(default = "default_step_ms")]
    #[validate(range(min = 1, max = 86_400_000))]
    pub step_ms: u64,

    #[serde(default = "default_steps")]
    #[validate(range(min = 1, max = 1_000_000))]
    pub steps: u64,
}

fn default_step_ms() -> u64 {
    1
}

fn default_steps() -> u64 {
    10
}

impl ReplayConfig {
    /// Start of the timeline. Falls back to the epoch for an unvalidated,
    /// out-of-range `start_unix_ms`.
    pub fn start_time(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.start_unix_ms)
            .single()
            .unwrap_or_default()
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            start_unix_ms: 0,
            step_ms: default_step_ms(),
            steps: default_steps(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_time_from_millis() {
        let config = ReplayConfig {
            start_unix_ms: 1_500,
            ..ReplayConfig::default()
        };
        assert_eq!(config.start_time().timestamp_millis(), 1_500);
    }

    #[test]
    fn step_bounds() {
        let mut config = ReplayConfig::default();
        config.step_ms = 0;
        assert!(config.validate().is_err());
        config.step_ms = 1;
        config.steps = 1_000_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unrepresentable_start_is_rejected() {
        let config = ReplayConfig {
            start_unix_ms: i64::MAX,
            ..ReplayConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.start_time(), DateTime::<Utc>::default());
    }
}
