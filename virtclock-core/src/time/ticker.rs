use std::time::Duration;

use crossbeam::channel::Receiver;

use super::subscription::SubscriptionId;
use super::virtual_clock::Registration;
use super::{Ticker, Timestamp};

/// Periodic subscription on a [`VirtualClock`](super::VirtualClock).
///
/// Dropping the handle stops the ticker.
pub struct VirtualTicker {
    registration: Registration,
    rx: Receiver<Timestamp>,
}

impl VirtualTicker {
    pub(crate) fn new(registration: Registration, rx: Receiver<Timestamp>) -> Self {
        Self { registration, rx }
    }

    /// Registry id, as shown in the clock's log events.
    pub fn id(&self) -> SubscriptionId {
        self.registration.id()
    }

    #[cfg(test)]
    pub(crate) fn registration(&self) -> &Registration {
        &self.registration
    }
}

impl Ticker for VirtualTicker {
    fn c(&self) -> &Receiver<Timestamp> {
        &self.rx
    }

    fn stop(&self) {
        self.registration.stop();
    }

    /// No-op once the ticker is stopped.
    fn reset(&self, d: Duration) {
        self.registration.reset(d);
    }
}

impl Drop for VirtualTicker {
    fn drop(&mut self) {
        self.registration.stop();
    }
}
