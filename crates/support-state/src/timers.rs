//! Timer handles for rate-limited work
//!
//! Scroll events arrive in bursts. Stores use a [`Debouncer`] to collapse a
//! burst into one trailing action and a [`Throttle`] to enforce a minimum
//! interval between actions. Both are owned by the store that uses them and
//! are cancelled when it is disposed.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Owned debounce timer
///
/// Each call to [`schedule`](Debouncer::schedule) replaces the pending action.
/// Only the waiting phase is cancellable: once the delay elapses the action is
/// spawned detached, so a later reschedule never interrupts work in progress.
/// Must be used from within a tokio runtime.
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    /// Create an idle debouncer
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay`, replacing any pending action
    pub fn schedule<F>(&self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(action);
        });

        if let Some(previous) = self.pending.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the pending action, if any
    ///
    /// Returns true if an action was still waiting.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                waiting
            }
            None => false,
        }
    }

    /// Whether an action is waiting to fire
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}

/// Minimum-interval gate
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_fired: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Create a throttle allowing one action per `min_interval`
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_fired: Mutex::new(None),
        }
    }

    /// Configured interval
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Time until the next action is allowed
    pub fn remaining(&self) -> Duration {
        match *self.last_fired.lock() {
            Some(last) => self.min_interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Record an action if the interval has elapsed
    pub fn try_acquire(&self) -> bool {
        let mut last_fired = self.last_fired.lock();
        let now = Instant::now();
        let ready = match *last_fired {
            Some(last) => now.duration_since(last) >= self.min_interval,
            None => true,
        };
        if ready {
            *last_fired = Some(now);
        }
        ready
    }

    /// Forget the last action
    pub fn reset(&self) {
        *self.last_fired.lock() = None;
    }
}
