//! Drives a [`Scenario`] across a virtual timeline and hashes what was delivered.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use blake3::Hasher;
use chrono::{SecondsFormat, TimeDelta};
use crossbeam::channel::{unbounded, Receiver};
use tracing::{debug, info, instrument};
use virtclock_core::prelude::*;
use virtclock_telemetry::DiagnosticSink;

use crate::error::CliError;
use crate::scenario::{Kind, Scenario, SubscriptionSpec};

/// One observed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub step: u64,
    pub name: String,
    pub at: Timestamp,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {:>6}  {:<24} {}",
            self.step,
            self.name,
            self.at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

#[derive(Debug)]
pub struct ReplayReport {
    pub trace: Vec<TraceEntry>,
    /// Subscriptions still registered when the timeline ended.
    pub live_subscriptions: usize,
    /// Hex BLAKE3 digest of the trace.
    pub hash: String,
}

impl ReplayReport {
    pub fn check_hash(&self, expected: &str) -> Result<(), CliError> {
        if self.hash.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(CliError::HashMismatch {
                expected: expected.to_owned(),
                actual: self.hash.clone(),
            })
        }
    }
}

/// Timeline parameters.
#[derive(Debug, Clone, Copy)]
pub struct Timeline {
    pub start: Timestamp,
    pub step: Duration,
    pub steps: u64,
}

enum Handle {
    Ticker(VirtualTicker),
    Timer(VirtualTimer),
    After(Receiver<Timestamp>),
    AfterFunc {
        timer: VirtualTimer,
        ran: Receiver<Timestamp>,
    },
}

struct Slot<'a> {
    spec: &'a SubscriptionSpec,
    handle: Option<Handle>,
    reset_done: bool,
    stop_done: bool,
}

impl Slot<'_> {
    fn apply(&mut self, clock: &VirtualClock, offset_ms: u64) {
        let spec = self.spec;
        if self.handle.is_none() && spec.create_at_ms <= offset_ms {
            debug!(name = %spec.name, offset_ms, "creating subscription");
            self.handle = Some(create(clock, spec));
        }
        let Some(handle) = &self.handle else {
            return;
        };

        if !self.reset_done && spec.reset_at_ms.is_some_and(|at| at <= offset_ms) {
            self.reset_done = true;
            if let Handle::Ticker(ticker) = handle {
                let period = spec.reset_period_ms.unwrap_or(spec.period_ms);
                debug!(name = %spec.name, offset_ms, period, "resetting ticker");
                ticker.reset(Duration::from_millis(period));
            }
        }

        if !self.stop_done && spec.stop_at_ms.is_some_and(|at| at <= offset_ms) {
            self.stop_done = true;
            debug!(name = %spec.name, offset_ms, "stopping subscription");
            match handle {
                Handle::Ticker(ticker) => ticker.stop(),
                Handle::Timer(timer) | Handle::AfterFunc { timer, .. } => {
                    timer.stop();
                }
                Handle::After(_) => {}
            }
        }
    }

    fn drain(&self, step: u64, trace: &mut Vec<TraceEntry>) {
        let Some(handle) = &self.handle else {
            return;
        };
        let name = self.spec.name.as_str();
        match handle {
            Handle::Ticker(ticker) => record(trace, step, name, ticker.c()),
            Handle::Timer(timer) => record(trace, step, name, timer.c()),
            Handle::After(rx) => record(trace, step, name, rx),
            Handle::AfterFunc { timer, ran } => {
                record(trace, step, name, timer.c());
                record(trace, step, &format!("{name}:callback"), ran);
            }
        }
    }
}

fn record(trace: &mut Vec<TraceEntry>, step: u64, name: &str, rx: &Receiver<Timestamp>) {
    trace.extend(rx.try_iter().map(|at| TraceEntry {
        step,
        name: name.to_owned(),
        at,
    }));
}

fn create(clock: &VirtualClock, spec: &SubscriptionSpec) -> Handle {
    let d = Duration::from_millis(spec.period_ms);
    match spec.kind {
        Kind::Ticker => Handle::Ticker(clock.new_ticker(d)),
        Kind::Timer => Handle::Timer(clock.new_timer(d)),
        Kind::After => Handle::After(clock.after(d)),
        Kind::AfterFunc => {
            let (tx, ran) = unbounded();
            let inner = clock.clone();
            let timer = clock.after_func(d, move || {
                let _ = tx.send(inner.now());
            });
            Handle::AfterFunc { timer, ran }
        }
    }
}

/// Runs `scenario` on a fresh [`VirtualClock`].
///
/// Actions scheduled at an offset apply once the clock has reached it, after
/// that step's deliveries have been drained. Step 0 is the start itself.
#[instrument(
    level = "info",
    skip_all,
    fields(steps = timeline.steps, subscriptions = scenario.subscriptions.len())
)]
pub fn run(
    scenario: &Scenario,
    timeline: Timeline,
    sink: Option<Arc<dyn DiagnosticSink>>,
) -> Result<ReplayReport, CliError> {
    let clock = match sink {
        Some(sink) => VirtualClock::with_sink(timeline.start, sink),
        None => VirtualClock::new(timeline.start),
    };
    let step_ms = u64::try_from(timeline.step.as_millis()).unwrap_or(u64::MAX);

    let mut slots: Vec<Slot<'_>> = scenario
        .subscriptions
        .iter()
        .map(|spec| Slot {
            spec,
            handle: None,
            reset_done: false,
            stop_done: false,
        })
        .collect();
    let mut trace = Vec::new();

    for slot in &mut slots {
        slot.apply(&clock, 0);
    }

    for step in 1..=timeline.steps {
        let offset = TimeDelta::from_std(timeline.step)
            .ok()
            .and_then(|delta| delta.checked_mul(i32::try_from(step).ok()?))
            .and_then(|delta| timeline.start.checked_add_signed(delta))
            .ok_or(CliError::TimelineOverflow { step })?;
        clock.set_timestamp(offset);

        for slot in &slots {
            slot.drain(step, &mut trace);
        }
        let offset_ms = step_ms.saturating_mul(step);
        for slot in &mut slots {
            slot.apply(&clock, offset_ms);
        }
    }

    let hash = hash_trace(&trace);
    let live_subscriptions = clock.live_subscriptions();
    info!(deliveries = trace.len(), live_subscriptions, %hash, "replay complete");

    Ok(ReplayReport {
        trace,
        live_subscriptions,
        hash,
    })
}

fn hash_trace(trace: &[TraceEntry]) -> String {
    let mut hasher = Hasher::new();
    for entry in trace {
        hasher.update(&entry.step.to_le_bytes());
        hasher.update(entry.name.as_bytes());
        hasher.update(&[0]);
        hasher.update(&entry.at.timestamp_millis().to_le_bytes());
    }
    hex::encode(hasher.finalize().as_bytes())
}
