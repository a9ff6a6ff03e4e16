//! ## virtclock-core::time
//! **Clock contract, virtual clock, and real clock**
//!
//! ### Key Submodules:
//! - `virtual_clock`: `VirtualClock`, time advanced explicitly through `set_timestamp`
//! - `subscription`: per-wait state shared between handles and the firing pass
//! - `ticker` / `timer`: consumer handles for periodic and one-shot waits
//! - `system`: `SystemClock`, delegating to OS time and helper threads
//!
//! Code that needs time should be generic over [`Clock`] so tests can swap in
//! a [`VirtualClock`].

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use crossbeam::channel::Receiver;

mod subscription;
mod system;
mod ticker;
mod timer;
mod virtual_clock;

pub use subscription::SubscriptionId;
pub use system::{SystemClock, SystemTicker, SystemTimer};
pub use ticker::VirtualTicker;
pub use timer::VirtualTimer;
pub use virtual_clock::VirtualClock;

/// A point in (virtual or real) time.
pub type Timestamp = DateTime<Utc>;

/// How long the firing pass waits for a consumer before dropping a tick.
pub const DELIVERY_GRACE: Duration = Duration::from_millis(20);

/// Capabilities of the `time` facilities a component depends on.
pub trait Clock: Send + Sync {
    type Ticker: Ticker;
    type Timer: Timer;

    /// Current time.
    fn now(&self) -> Timestamp;

    /// Time elapsed since `t`. Negative when `t` is in the future.
    fn since(&self, t: Timestamp) -> TimeDelta {
        self.now().signed_duration_since(t)
    }

    /// Blocks the calling thread for at least `d`. A zero duration returns immediately.
    #[track_caller]
    fn sleep(&self, d: Duration);

    /// Returns a channel that receives the current time once, `d` after the call.
    #[track_caller]
    fn after(&self, d: Duration) -> Receiver<Timestamp>;

    /// Runs `f` once `d` has elapsed. The returned timer can cancel it.
    #[track_caller]
    fn after_func<F>(&self, d: Duration, f: F) -> Self::Timer
    where
        F: FnOnce() + Send + 'static;

    /// Returns a ticker that fires every time at least `d` has elapsed since its last fire.
    #[track_caller]
    fn new_ticker(&self, d: Duration) -> Self::Ticker;

    /// Returns a one-shot timer firing after `d`.
    #[track_caller]
    fn new_timer(&self, d: Duration) -> Self::Timer;
}

/// A periodic wait.
pub trait Ticker: Send {
    /// Channel on which ticks are delivered.
    fn c(&self) -> &Receiver<Timestamp>;

    /// Stops the ticker. Idempotent.
    fn stop(&self);

    /// Changes the period to `d` and restarts the wait window from now.
    fn reset(&self, d: Duration);
}

/// A one-shot wait.
pub trait Timer: Send {
    /// Channel on which the single tick is delivered.
    fn c(&self) -> &Receiver<Timestamp>;

    /// Cancels the timer. Returns `false` if it already fired or was already stopped.
    fn stop(&self) -> bool;
}
