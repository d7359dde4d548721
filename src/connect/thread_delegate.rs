use std::sync::{Condvar, Mutex};
use std::time::Duration;

#[cfg(test)] use mockall::automock;

/// The connect task's view of its own thread: waiting out the backoff delay,
/// and asking whether it was cancelled. Injected at construction so retry
/// timing and cancellation can be tested deterministically, without real
/// timers.
#[cfg_attr(test, automock)]
pub trait ThreadDelegate: Send + Sync {
    /// Sleeps for up to `duration`. May return early - in particular when a
    /// cancellation request arrives - and the caller is expected to ask
    /// `take_cancelled` afterwards whether the early return actually meant
    /// cancellation.
    fn sleep(&self, duration: Duration);

    /// Whether a cancellation was requested. Clears the flag it reads, so a
    /// wakeup that was *not* a cancellation leaves the task free to continue.
    fn take_cancelled(&self) -> bool;
}

/// Production implementation: a cancel flag and the condvar that makes the
/// backoff sleep interruptible. `cancel` may be called from any thread, any
/// number of times.
pub struct CancelSignal {
    cancelled: Mutex<bool>,
    wakeup: Condvar,
}

impl CancelSignal {
    pub fn new() -> CancelSignal {
        CancelSignal {
            cancelled: Mutex::new(false),
            wakeup: Condvar::new(),
        }
    }

    pub fn cancel(&self) {
        let mut cancelled = self.cancelled.lock()
            .expect("this is a bug: a thread panicked holding the cancel flag");
        *cancelled = true;
        self.wakeup.notify_all();
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadDelegate for CancelSignal {
    fn sleep(&self, duration: Duration) {
        let cancelled = self.cancelled.lock()
            .expect("this is a bug: a thread panicked holding the cancel flag");

        // returns as soon as the flag is set; the flag is read under the same
        //  lock the canceller writes it under, so no wakeup can be lost
        let _ = self.wakeup.wait_timeout_while(cancelled, duration, |cancelled| !*cancelled)
            .expect("this is a bug: a thread panicked holding the cancel flag");
    }

    fn take_cancelled(&self) -> bool {
        let mut cancelled = self.cancelled.lock()
            .expect("this is a bug: a thread panicked holding the cancel flag");
        std::mem::replace(&mut *cancelled, false)
    }
}
