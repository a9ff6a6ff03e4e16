//! Per-wait state read by its owner and by the firing pass concurrently.

use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::TimeDelta;
use crossbeam::channel::{SendTimeoutError, Sender};
use parking_lot::Mutex;

use super::{Timestamp, DELIVERY_GRACE};

/// Registry key of a subscription. Never reused within a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Why a subscription left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// A one-shot subscription fired.
    Fired,
    /// `stop()` was called or the ticker handle was dropped.
    Stopped,
}

pub(crate) type RemovalHook = Box<dyn FnOnce(Removal) + Send>;

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// Nobody took the tick within the grace window.
    Dropped,
    /// Every receiver is gone.
    Abandoned,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    duration: Duration,
    last_fire: Timestamp,
}

impl Window {
    fn is_due(&self, t: Timestamp) -> bool {
        // A duration beyond the representable range can never elapse.
        let Ok(duration) = TimeDelta::from_std(self.duration) else {
            return false;
        };
        t.signed_duration_since(self.last_fire) >= duration
    }
}

pub(crate) struct Subscription {
    id: SubscriptionId,
    kind: &'static str,
    caller: &'static Location<'static>,
    periodic: bool,
    window: Mutex<Window>,
    active: AtomicBool,
    tx: Sender<Timestamp>,
    on_remove: Mutex<Option<RemovalHook>>,
}

impl Subscription {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: SubscriptionId,
        kind: &'static str,
        caller: &'static Location<'static>,
        periodic: bool,
        duration: Duration,
        start: Timestamp,
        tx: Sender<Timestamp>,
        on_remove: Option<RemovalHook>,
    ) -> Self {
        Self {
            id,
            kind,
            caller,
            periodic,
            window: Mutex::new(Window {
                duration,
                last_fire: start,
            }),
            active: AtomicBool::new(true),
            tx,
            on_remove: Mutex::new(on_remove),
        }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.kind
    }

    pub(crate) fn caller(&self) -> &'static Location<'static> {
        self.caller
    }

    pub(crate) fn is_periodic(&self) -> bool {
        self.periodic
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn is_due(&self, t: Timestamp) -> bool {
        self.window.lock().is_due(t)
    }

    #[cfg(test)]
    pub(crate) fn last_fire(&self) -> Timestamp {
        self.window.lock().last_fire
    }

    /// Rebases the window to `t` when it is due. Only the caller that gets
    /// `true` may fire this threshold crossing.
    pub(crate) fn claim(&self, t: Timestamp) -> bool {
        let mut window = self.window.lock();
        if !window.is_due(t) {
            return false;
        }
        window.last_fire = t;
        true
    }

    /// Sets a new duration and restarts the window at `now`. The window start
    /// never moves backwards.
    pub(crate) fn reset(&self, duration: Duration, now: Timestamp) {
        let mut window = self.window.lock();
        window.duration = duration;
        window.last_fire = window.last_fire.max(now);
    }

    /// Marks the subscription removed and runs the removal hook. Must only be
    /// called by whoever took it out of the registry.
    pub(crate) fn retire(&self, cause: Removal) {
        self.active.store(false, Ordering::Release);
        let hook = self.on_remove.lock().take();
        if let Some(hook) = hook {
            hook(cause);
        }
    }

    pub(crate) fn deliver(&self, t: Timestamp) -> Delivery {
        match self.tx.send_timeout(t, DELIVERY_GRACE) {
            Ok(()) => Delivery::Delivered,
            Err(SendTimeoutError::Timeout(_)) => Delivery::Dropped,
            Err(SendTimeoutError::Disconnected(_)) => Delivery::Abandoned,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("caller", &format_args!("{}", self.caller))
            .field("periodic", &self.periodic)
            .field("window", &*self.window.lock())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crossbeam::channel::bounded;

    fn at_ms(ms: i64) -> Timestamp {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn subscription(
        duration_ms: u64,
        periodic: bool,
    ) -> (Subscription, crossbeam::channel::Receiver<Timestamp>) {
        let (tx, rx) = bounded(1);
        let sub = Subscription::new(
            SubscriptionId::new(7),
            "ticker",
            Location::caller(),
            periodic,
            Duration::from_millis(duration_ms),
            at_ms(0),
            tx,
            None,
        );
        (sub, rx)
    }

    #[test]
    fn due_at_exact_threshold() {
        let (sub, _rx) = subscription(3, true);
        assert!(!sub.is_due(at_ms(2)));
        assert!(sub.is_due(at_ms(3)));
        assert!(sub.is_due(at_ms(30)));
    }

    #[test]
    fn past_time_is_never_due() {
        let (sub, _rx) = subscription(0, true);
        assert!(sub.is_due(at_ms(0)));
        assert!(!sub.is_due(at_ms(-1)));
    }

    #[test]
    fn oversized_duration_never_elapses() {
        let (tx, _rx) = bounded(1);
        let sub = Subscription::new(
            SubscriptionId::new(1),
            "timer",
            Location::caller(),
            false,
            Duration::MAX,
            at_ms(0),
            tx,
            None,
        );
        assert!(!sub.is_due(Timestamp::MAX_UTC));
    }

    #[test]
    fn claim_rebases_to_delivered_time() {
        let (sub, _rx) = subscription(3, true);
        assert!(sub.claim(at_ms(30)));
        assert_eq!(sub.last_fire(), at_ms(30));
        // Same threshold crossing cannot be claimed twice.
        assert!(!sub.claim(at_ms(30)));
        assert!(!sub.claim(at_ms(32)));
        assert!(sub.claim(at_ms(33)));
    }

    #[test]
    fn reset_restarts_window_without_regressing() {
        let (sub, _rx) = subscription(3, true);
        assert!(sub.claim(at_ms(9)));

        sub.reset(Duration::from_millis(5), at_ms(4));
        assert_eq!(sub.last_fire(), at_ms(9));

        sub.reset(Duration::from_millis(5), at_ms(10));
        assert_eq!(sub.last_fire(), at_ms(10));
        assert!(!sub.is_due(at_ms(14)));
        assert!(sub.is_due(at_ms(15)));
    }

    #[test]
    fn retire_runs_hook_once() {
        let (tx, _rx) = bounded(1);
        let (hook_tx, hook_rx) = bounded(2);
        let sub = Subscription::new(
            SubscriptionId::new(1),
            "after_func",
            Location::caller(),
            false,
            Duration::ZERO,
            at_ms(0),
            tx,
            Some(Box::new(move |cause| {
                let _ = hook_tx.send(cause);
            })),
        );

        sub.retire(Removal::Fired);
        sub.retire(Removal::Stopped);

        assert!(!sub.is_active());
        assert_eq!(hook_rx.try_iter().collect::<Vec<_>>(), vec![Removal::Fired]);
    }

    #[test]
    fn delivery_outcomes() {
        let (sub, rx) = subscription(1, true);
        assert_eq!(sub.deliver(at_ms(1)), Delivery::Delivered);
        // Slot is full and nobody reads.
        assert_eq!(sub.deliver(at_ms(2)), Delivery::Dropped);
        assert_eq!(rx.try_recv(), Ok(at_ms(1)));

        drop(rx);
        assert_eq!(sub.deliver(at_ms(3)), Delivery::Abandoned);
    }
}
