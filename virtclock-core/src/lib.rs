//! # virtclock-core
//!
//! Deterministic virtual time for testing time-dependent logic (timeouts,
//! periodic polling, delayed callbacks) without sleeping in real time.
//!
//! ### Key Submodules:
//! - `time`: the [`Clock`] contract, [`VirtualClock`] and [`SystemClock`]
//! - `deadline`: cancellable deadlines built on any [`Clock`]
//! - `error`: error types for the fallible edges
//!
//! ```
//! use std::time::Duration;
//! use chrono::{TimeZone, Utc};
//! use virtclock_core::{Clock, Ticker, VirtualClock};
//!
//! let clock = VirtualClock::new(Utc.timestamp_millis_opt(0).unwrap());
//! let ticker = clock.new_ticker(Duration::from_millis(3));
//!
//! clock.set_timestamp(Utc.timestamp_millis_opt(3).unwrap());
//! assert_eq!(ticker.c().try_recv().unwrap().timestamp_millis(), 3);
//! ```

pub mod deadline;
pub mod error;
pub mod time;

pub mod prelude {
    pub use crate::deadline::*;
    pub use crate::error::*;
    pub use crate::time::*;
}

pub use deadline::Deadline;
pub use error::DeadlineError;
pub use time::{
    Clock, SubscriptionId, SystemClock, SystemTicker, SystemTimer, Ticker, Timer, Timestamp,
    VirtualClock, VirtualTicker, VirtualTimer, DELIVERY_GRACE,
};
