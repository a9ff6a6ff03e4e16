use crossbeam::channel::Receiver;

use super::subscription::SubscriptionId;
use super::virtual_clock::Registration;
use super::{Timer, Timestamp};

/// One-shot subscription on a [`VirtualClock`](super::VirtualClock).
///
/// Unlike [`VirtualTicker`](super::VirtualTicker), dropping the handle leaves
/// the timer armed so an `after_func` callback still runs.
pub struct VirtualTimer {
    registration: Registration,
    rx: Receiver<Timestamp>,
}

impl VirtualTimer {
    pub(crate) fn new(registration: Registration, rx: Receiver<Timestamp>) -> Self {
        Self { registration, rx }
    }

    /// Registry id, as shown in the clock's log events.
    pub fn id(&self) -> SubscriptionId {
        self.registration.id()
    }
}

impl Timer for VirtualTimer {
    fn c(&self) -> &Receiver<Timestamp> {
        &self.rx
    }

    fn stop(&self) -> bool {
        self.registration.stop()
    }
}
