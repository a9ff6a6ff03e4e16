//! # Virtual Clock
//!
//! A deterministic clock for tests of time-dependent logic. Time only moves
//! when [`VirtualClock::set_timestamp`] is called; every registered wait is
//! evaluated against the new time on that call.
//!
//! ## Locking
//! - Current time and the registry are behind independent locks, so readers
//!   of `now()` never wait on a firing pass.
//! - The firing pass snapshots due subscriptions under the registry read lock,
//!   releases it, then removes and delivers per subscription. No registry lock
//!   is held while a delivery is attempted or a removal hook runs.
//! - Removal is keyed by id and is the single gate between firing and
//!   `stop()`: whoever takes the entry out of the map wins.

use std::collections::HashMap;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use virtclock_telemetry::DiagnosticSink;

use super::subscription::{Delivery, Removal, RemovalHook, Subscription, SubscriptionId};
use super::ticker::VirtualTicker;
use super::timer::VirtualTimer;
use super::{Clock, Timestamp};

/// State shared by a clock and every handle it has issued.
pub(crate) struct ClockCore {
    now: RwLock<Timestamp>,
    registry: RwLock<HashMap<SubscriptionId, Arc<Subscription>>>,
    next_id: AtomicU64,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl ClockCore {
    pub(crate) fn now(&self) -> Timestamp {
        *self.now.read()
    }

    /// Takes `id` out of the registry and retires it. Returns `true` only for
    /// the call that performed the removal.
    pub(crate) fn release(&self, id: SubscriptionId, cause: Removal) -> bool {
        let removed = self.registry.write().remove(&id);
        match removed {
            Some(subscription) => {
                trace!(%id, ?cause, "subscription removed");
                subscription.retire(cause);
                true
            }
            None => false,
        }
    }
}

/// Link from a handle back to the clock that owns its subscription.
pub(crate) struct Registration {
    core: Weak<ClockCore>,
    subscription: Arc<Subscription>,
}

impl Registration {
    pub(crate) fn id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    pub(crate) fn stop(&self) -> bool {
        self.core
            .upgrade()
            .is_some_and(|core| core.release(self.subscription.id(), Removal::Stopped))
    }

    pub(crate) fn reset(&self, duration: Duration) {
        if !self.subscription.is_active() {
            return;
        }
        if let Some(core) = self.core.upgrade() {
            self.subscription.reset(duration, core.now());
        }
    }

    #[cfg(test)]
    pub(crate) fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

/// Clock whose time is set by the test driver.
///
/// Cloning is cheap; clones share time and registry.
#[derive(Clone)]
pub struct VirtualClock {
    core: Arc<ClockCore>,
}

impl VirtualClock {
    /// Creates a clock at `initial` with no subscriptions.
    pub fn new(initial: Timestamp) -> Self {
        Self::build(initial, None)
    }

    /// Like [`VirtualClock::new`], reporting subscription diagnostics to `sink`.
    pub fn with_sink(initial: Timestamp, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self::build(initial, Some(sink))
    }

    fn build(initial: Timestamp, sink: Option<Arc<dyn DiagnosticSink>>) -> Self {
        Self {
            core: Arc::new(ClockCore {
                now: RwLock::new(initial),
                registry: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                sink,
            }),
        }
    }

    /// Sets the current time to `t` and fires every subscription whose wait
    /// has elapsed. Calls need not be chronological; the last write wins.
    ///
    /// Each due subscription is rebased to `t`, removed first if one-shot, and
    /// then offered `t` for up to [`DELIVERY_GRACE`](super::DELIVERY_GRACE).
    /// A tick nobody takes in that window is dropped.
    pub fn set_timestamp(&self, t: Timestamp) {
        *self.core.now.write() = t;

        let due: Vec<Arc<Subscription>> = self
            .core
            .registry
            .read()
            .values()
            .filter(|subscription| subscription.claim(t))
            .cloned()
            .collect();

        trace!(%t, due = due.len(), "firing pass");
        for subscription in due {
            self.fire(&subscription, t);
        }
    }

    /// Number of subscriptions that may still fire.
    pub fn live_subscriptions(&self) -> usize {
        self.core.registry.read().len()
    }

    fn fire(&self, subscription: &Subscription, t: Timestamp) {
        if subscription.is_periodic() {
            if !subscription.is_active() {
                return;
            }
        } else if !self.core.release(subscription.id(), Removal::Fired) {
            // Stopped between the scan and now.
            return;
        }

        match subscription.deliver(t) {
            Delivery::Delivered => {
                if let Some(sink) = &self.core.sink {
                    sink.tick_delivered(subscription.caller());
                }
            }
            Delivery::Dropped => {
                warn!(
                    id = %subscription.id(),
                    caller = %subscription.caller(),
                    %t,
                    "ticker dropped message"
                );
                if let Some(sink) = &self.core.sink {
                    sink.tick_dropped(subscription.caller());
                }
            }
            // Only a one-shot can get here, and it already left the registry.
            Delivery::Abandoned => {
                debug!(
                    id = %subscription.id(),
                    caller = %subscription.caller(),
                    "receiver gone, tick discarded"
                );
            }
        }
    }

    fn subscribe(
        &self,
        kind: &'static str,
        duration: Duration,
        periodic: bool,
        on_remove: Option<RemovalHook>,
        caller: &'static Location<'static>,
    ) -> (Registration, Receiver<Timestamp>) {
        let (tx, rx) = bounded(1);
        let id = SubscriptionId::new(self.core.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Arc::new(Subscription::new(
            id,
            kind,
            caller,
            periodic,
            duration,
            self.core.now(),
            tx,
            on_remove,
        ));

        self.core
            .registry
            .write()
            .insert(id, Arc::clone(&subscription));

        debug!(%id, kind = subscription.kind(), %caller, ?duration, "added new subscription");
        if let Some(sink) = &self.core.sink {
            sink.subscription_created(kind, caller);
        }

        let registration = Registration {
            core: Arc::downgrade(&self.core),
            subscription,
        };
        (registration, rx)
    }
}

impl Clock for VirtualClock {
    type Ticker = VirtualTicker;
    type Timer = VirtualTimer;

    fn now(&self) -> Timestamp {
        self.core.now()
    }

    /// Blocks until virtual time has advanced by `d`. Another thread must
    /// drive the clock.
    #[track_caller]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        // Err means the tick was dropped and the subscription released.
        let _ = self.after(d).recv();
    }

    #[track_caller]
    fn after(&self, d: Duration) -> Receiver<Timestamp> {
        let (_registration, rx) = self.subscribe("after", d, false, None, Location::caller());
        rx
    }

    #[track_caller]
    fn after_func<F>(&self, d: Duration, f: F) -> VirtualTimer
    where
        F: FnOnce() + Send + 'static,
    {
        let hook: RemovalHook = Box::new(move |cause| {
            if cause == Removal::Fired {
                f();
            }
        });
        let (registration, rx) =
            self.subscribe("after_func", d, false, Some(hook), Location::caller());
        VirtualTimer::new(registration, rx)
    }

    #[track_caller]
    fn new_ticker(&self, d: Duration) -> VirtualTicker {
        let (registration, rx) = self.subscribe("ticker", d, true, None, Location::caller());
        VirtualTicker::new(registration, rx)
    }

    #[track_caller]
    fn new_timer(&self, d: Duration) -> VirtualTimer {
        let (registration, rx) = self.subscribe("timer", d, false, None, Location::caller());
        VirtualTimer::new(registration, rx)
    }
}

impl std::fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualClock")
            .field("now", &self.core.now())
            .field("live_subscriptions", &self.live_subscriptions())
            .finish()
    }
}
