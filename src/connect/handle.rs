use std::sync::mpsc;
use std::sync::Arc;

use tracing::{debug, error};

use crate::connect::socket::ConnectSocket;
use crate::connect::task::{ConnectError, ReconnectTask, SocketSlot};
use crate::connect::thread_delegate::CancelSignal;

/// The submit-a-callable contract of whatever worker pool the embedding
/// application runs the connect task on. The pool itself is not this crate's
/// business.
pub trait TaskRunner {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

/// Runs every job on a freshly spawned thread.
pub struct ThreadRunner;

impl TaskRunner for ThreadRunner {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        let spawned = std::thread::Builder::new()
            .name("connect-worker".to_string())
            .spawn(job);
        if let Err(e) = spawned {
            // the job is dropped with its outcome sender, so the handle
            //  observes TaskGone rather than hanging
            error!("spawning the connect worker thread failed: {}", e);
        }
    }
}

/// Handle on a submitted connect task.
///
/// Cancelling does two things, in this order: it shuts down whatever socket
/// the task holds in flight - that is what unblocks a worker stuck inside a
/// connect call with no native timeout - and then it raises the cancel signal
/// so the backoff sleep wakes and the task's cancellation check fires.
pub struct ConnectHandle {
    signal: Arc<CancelSignal>,
    slot: Arc<SocketSlot>,
    outcome: mpsc::Receiver<Result<Arc<dyn ConnectSocket>, ConnectError>>,
}

impl ConnectHandle {
    pub fn cancel(&self) {
        debug!("cancelling connect task");
        self.slot.shutdown_in_flight();
        self.signal.cancel();
    }

    /// Blocks until the task produces its outcome: the connected socket, or
    /// [`ConnectError::Cancelled`]. [`ConnectError::TaskGone`] means the
    /// runner dropped the task without ever running it to completion.
    pub fn await_connected(self) -> Result<Arc<dyn ConnectSocket>, ConnectError> {
        match self.outcome.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(ConnectError::TaskGone),
        }
    }
}

impl ReconnectTask {
    /// Hands the task to the runner and returns the handle the submitter can
    /// cancel it through or wait on.
    pub fn submit_to(self, runner: &dyn TaskRunner) -> ConnectHandle {
        let signal = self.cancel_signal();
        let slot = self.socket_slot();
        let (outcome_sender, outcome) = mpsc::channel();

        runner.execute(Box::new(move || {
            if outcome_sender.send(self.run()).is_err() {
                debug!("connect outcome discarded, the handle was dropped");
            }
        }));

        ConnectHandle { signal, slot, outcome }
    }
}
