//! ## virtclock-core::deadline
//! **Cancellable deadlines on any [`Clock`]**
//!
//! A [`Deadline`] finishes exactly once, either when its timeout elapses on
//! the clock it was created from or when [`Deadline::cancel`] is called,
//! whichever comes first.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::DeadlineError;
use crate::time::{Clock, Timer, Timestamp};

struct Outcome {
    err: Option<DeadlineError>,
    // Dropped on finish, which disconnects every `done()` receiver.
    done_tx: Option<Sender<()>>,
}

struct DeadlineState {
    outcome: Mutex<Outcome>,
    done_rx: Receiver<()>,
}

impl DeadlineState {
    fn finish(&self, err: DeadlineError) {
        let mut outcome = self.outcome.lock();
        if outcome.err.is_some() {
            return;
        }
        outcome.err = Some(err);
        outcome.done_tx = None;
        debug!(%err, "deadline finished");
    }
}

pub struct Deadline<T: Timer> {
    state: Arc<DeadlineState>,
    timer: T,
    deadline: Timestamp,
}

impl<T: Timer> Deadline<T> {
    /// Starts a deadline that expires `timeout` after `clock.now()`.
    #[track_caller]
    pub fn with_timeout<C>(clock: &C, timeout: Duration) -> Self
    where
        C: Clock<Timer = T>,
    {
        let now = clock.now();
        let deadline = TimeDelta::from_std(timeout)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(Timestamp::MAX_UTC);

        let (done_tx, done_rx) = bounded(0);
        let state = Arc::new(DeadlineState {
            outcome: Mutex::new(Outcome {
                err: None,
                done_tx: Some(done_tx),
            }),
            done_rx,
        });

        let expired = Arc::clone(&state);
        let timer = clock.after_func(timeout, move || {
            expired.finish(DeadlineError::DeadlineExceeded);
        });

        Self {
            state,
            timer,
            deadline,
        }
    }

    /// Channel that disconnects once the deadline has finished. Receiving on
    /// it blocks until then and never yields a value.
    pub fn done(&self) -> &Receiver<()> {
        &self.state.done_rx
    }

    /// `None` while pending, otherwise the reason it finished.
    pub fn err(&self) -> Option<DeadlineError> {
        self.state.outcome.lock().err
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Absolute expiry time on the originating clock.
    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    /// Cancels the deadline. No-op if it already finished.
    pub fn cancel(&self) {
        self.timer.stop();
        self.state.finish(DeadlineError::Canceled);
    }
}

impl<T: Timer> Drop for Deadline<T> {
    fn drop(&mut self) {
        self.timer.stop();
    }
}
