//! ## virtclock-telemetry::logging
//! **Structured logging bootstrap**
//!
//! Installs a `tracing-subscriber` formatter. `RUST_LOG` wins over the
//! configured filter when set.

use tracing::debug;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Calling it twice is harmless; the
    /// second install is ignored.
    pub fn init(default_filter: &str) {
        let installed = fmt()
            .with_env_filter(Self::filter(default_filter))
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .is_ok();
        debug!(filter = default_filter, installed, "logging initialised");
    }

    fn filter(default_filter: &str) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| Self::fallback(default_filter))
    }

    /// The configured filter, or `info` when it does not parse.
    fn fallback(default_filter: &str) -> EnvFilter {
        EnvFilter::try_new(default_filter).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}
