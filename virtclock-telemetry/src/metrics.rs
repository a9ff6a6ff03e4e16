//! ## virtclock-telemetry::metrics
//! **Prometheus counters for subscription activity**

use std::panic::Location;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use crate::sink::DiagnosticSink;

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub subscriptions_created: IntCounterVec,
    pub ticks_delivered: IntCounter,
    pub ticks_dropped: IntCounter,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let subscriptions_created = IntCounterVec::new(
            Opts::new(
                "virtclock_subscriptions_total",
                "Subscriptions registered on a virtual clock",
            ),
            &["kind"],
        )?;
        let ticks_delivered = IntCounter::new(
            "virtclock_ticks_delivered_total",
            "Ticks accepted by a consumer",
        )?;
        let ticks_dropped = IntCounter::new(
            "virtclock_ticks_dropped_total",
            "Ticks abandoned after the delivery grace window",
        )?;

        registry.register(Box::new(subscriptions_created.clone()))?;
        registry.register(Box::new(ticks_delivered.clone()))?;
        registry.register(Box::new(ticks_dropped.clone()))?;

        Ok(Self {
            registry,
            subscriptions_created,
            ticks_delivered,
            ticks_dropped,
        })
    }

    /// Renders every registered metric in the Prometheus text format.
    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl DiagnosticSink for MetricsRecorder {
    fn subscription_created(&self, kind: &'static str, _caller: &'static Location<'static>) {
        self.subscriptions_created.with_label_values(&[kind]).inc();
    }

    fn tick_delivered(&self, _caller: &'static Location<'static>) {
        self.ticks_delivered.inc();
    }

    fn tick_dropped(&self, _caller: &'static Location<'static>) {
        self.ticks_dropped.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_sink_events() {
        let metrics = MetricsRecorder::new().unwrap();
        let here = Location::caller();

        metrics.subscription_created("ticker", here);
        metrics.subscription_created("ticker", here);
        metrics.subscription_created("after", here);
        metrics.tick_delivered(here);
        metrics.tick_dropped(here);

        assert_eq!(
            metrics
                .subscriptions_created
                .with_label_values(&["ticker"])
                .get(),
            2
        );
        assert_eq!(metrics.ticks_delivered.get(), 1);
        assert_eq!(metrics.ticks_dropped.get(), 1);
    }

    #[test]
    fn gathers_text_format() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.tick_dropped(Location::caller());

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("virtclock_ticks_dropped_total 1"));
    }
}
