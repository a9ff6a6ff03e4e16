//! Custom validation functions for configuration.

use chrono::{TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

static FILTER_PATTERN: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_:\-]+(=[A-Za-z]+)?(,[A-Za-z0-9_:\-]+(=[A-Za-z]+)?)*$")
});

/// Validate a `tracing` filter of the form `target=level,level`.
pub fn validate_log_filter(filter: &str) -> Result<(), ValidationError> {
    let re = FILTER_PATTERN
        .as_ref()
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(filter) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_filter").with_message(
            "expected directives like `info` or `virtclock_core=trace,warn`".into(),
        ))
    }
}

/// Validate that milliseconds since the epoch map to a representable instant.
pub fn validate_unix_ms(ms: i64) -> Result<(), ValidationError> {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("timestamp_out_of_range")),
    }
}
