//! # Virtclock Telemetry
//!
//! Logging bootstrap, the host diagnostic sink, and Prometheus counters for
//! virtual-time subscriptions.

pub mod logging;
pub mod metrics;
pub mod sink;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
pub use sink::DiagnosticSink;
