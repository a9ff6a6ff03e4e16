//! Real clock backed by OS time and one helper thread per wait.
//!
//! Ticks go into a one-slot buffer with `try_send`; a consumer that falls
//! behind loses ticks instead of stalling the helper thread.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};

use super::{Clock, Ticker, Timer, Timestamp};

/// Shortest period a [`SystemTicker`] runs at.
const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const STOPPED: u8 = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Ticker = SystemTicker;
    type Timer = SystemTimer;

    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn sleep(&self, d: Duration) {
        thread::sleep(d);
    }

    fn after(&self, d: Duration) -> Receiver<Timestamp> {
        let SystemTimer { rx, .. } = SystemTimer::spawn(d, None);
        rx
    }

    fn after_func<F>(&self, d: Duration, f: F) -> SystemTimer
    where
        F: FnOnce() + Send + 'static,
    {
        SystemTimer::spawn(d, Some(Box::new(f)))
    }

    fn new_ticker(&self, d: Duration) -> SystemTicker {
        SystemTicker::spawn(d)
    }

    fn new_timer(&self, d: Duration) -> SystemTimer {
        SystemTimer::spawn(d, None)
    }
}

/// One-shot wait on wall-clock time.
pub struct SystemTimer {
    state: Arc<AtomicU8>,
    cancel: Sender<()>,
    rx: Receiver<Timestamp>,
}

impl SystemTimer {
    fn spawn(d: Duration, callback: Option<Box<dyn FnOnce() + Send>>) -> Self {
        let (tx, rx) = bounded(1);
        let (cancel, cancelled) = bounded::<()>(1);
        let state = Arc::new(AtomicU8::new(PENDING));
        let thread_state = Arc::clone(&state);
        let deadline = Instant::now().checked_add(d);

        thread::spawn(move || {
            let Some(deadline) = deadline else {
                // Beyond the representable range: only a stop ends the wait.
                let _ = cancelled.recv();
                return;
            };
            match cancelled.recv_deadline(deadline) {
                Ok(()) => return,
                Err(RecvTimeoutError::Timeout) => {}
                // Handle dropped; a dropped handle does not cancel.
                Err(RecvTimeoutError::Disconnected) => {
                    thread::sleep(deadline.saturating_duration_since(Instant::now()));
                }
            }
            if thread_state
                .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                if let Some(callback) = callback {
                    callback();
                }
                let _ = tx.try_send(Utc::now());
            }
        });

        Self { state, cancel, rx }
    }
}

impl Timer for SystemTimer {
    fn c(&self) -> &Receiver<Timestamp> {
        &self.rx
    }

    fn stop(&self) -> bool {
        let won = self
            .state
            .compare_exchange(PENDING, STOPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            let _ = self.cancel.try_send(());
        }
        won
    }
}

enum Control {
    Reset(Duration),
    Stop,
}

/// Periodic wait on wall-clock time. Dropping the handle stops the thread.
pub struct SystemTicker {
    control: Sender<Control>,
    rx: Receiver<Timestamp>,
}

impl SystemTicker {
    fn spawn(d: Duration) -> Self {
        let (tx, rx) = bounded(1);
        let (control, commands) = unbounded();

        thread::spawn(move || {
            let mut period = d.max(MIN_TICK_PERIOD);
            loop {
                match commands.recv_timeout(period) {
                    Ok(Control::Reset(d)) => period = d.max(MIN_TICK_PERIOD),
                    Ok(Control::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        let _ = tx.try_send(Utc::now());
                    }
                }
            }
        });

        Self { control, rx }
    }
}

impl Ticker for SystemTicker {
    fn c(&self) -> &Receiver<Timestamp> {
        &self.rx
    }

    fn stop(&self) {
        let _ = self.control.send(Control::Stop);
    }

    fn reset(&self, d: Duration) {
        let _ = self.control.send(Control::Reset(d));
    }
}
