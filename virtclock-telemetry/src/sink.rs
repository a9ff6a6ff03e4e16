//! ## virtclock-telemetry::sink
//! **Host-supplied diagnostic hooks**
//!
//! The clock reports subscription lifecycle events through this trait. Nothing
//! in the clock depends on a sink being installed; it only observes.

use std::panic::Location;

/// Receiver of subscription diagnostics.
///
/// `caller` is the source location that created the subscription.
pub trait DiagnosticSink: Send + Sync {
    /// A subscription of the given kind (`ticker`, `timer`, `after`, `after_func`) was registered.
    fn subscription_created(&self, kind: &'static str, caller: &'static Location<'static>);

    /// A tick was accepted by the consumer.
    fn tick_delivered(&self, _caller: &'static Location<'static>) {}

    /// No consumer took the tick within the grace window.
    fn tick_dropped(&self, caller: &'static Location<'static>);
}
