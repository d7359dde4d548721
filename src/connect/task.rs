use std::sync::{Arc, Mutex};

use tracing::{debug, info, trace, warn};

use crate::config::LinkConfig;
use crate::connect::socket::{close_quietly, ConnectSocket, SocketProvider};
use crate::connect::thread_delegate::{CancelSignal, ThreadDelegate};

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum ConnectError {
    #[error("the connect task was cancelled")]
    Cancelled,

    #[error("the connect task was dropped by its runner before producing an outcome")]
    TaskGone,
}

/// The socket currently being connected, published so that a canceller on
/// another thread can shut it down while the worker thread is blocked inside
/// the connect call.
///
/// Both threads may try to close the same socket - the canceller through
/// `shutdown_in_flight`, the worker through its own close-on-failure - and
/// shutting down twice is a safe no-op, so the race is harmless.
pub struct SocketSlot {
    in_flight: Mutex<Option<Arc<dyn ConnectSocket>>>,
}

impl SocketSlot {
    fn new() -> SocketSlot {
        SocketSlot {
            in_flight: Mutex::new(None),
        }
    }

    fn publish(&self, socket: Arc<dyn ConnectSocket>) {
        *self.lock() = Some(socket);
    }

    fn take(&self) -> Option<Arc<dyn ConnectSocket>> {
        self.lock().take()
    }

    pub fn shutdown_in_flight(&self) {
        // clone out of the lock so a blocked connect cannot stall the canceller
        let in_flight = self.lock().clone();
        if let Some(socket) = in_flight {
            close_quietly(socket.as_ref());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<dyn ConnectSocket>>> {
        self.in_flight.lock()
            .expect("this is a bug: a thread panicked holding the socket slot")
    }
}

/// Connects to the configured remote endpoint, retrying forever on transport
/// failure and stopping only for an external cancellation.
///
/// The task runs synchronously on whatever thread calls [`ReconnectTask::run`];
/// submitting it to a runner and cancelling it from outside is the job of
/// [`ReconnectTask::submit_to`](crate::connect::handle).
pub struct ReconnectTask {
    provider: Arc<dyn SocketProvider>,
    config: LinkConfig,
    signal: Arc<CancelSignal>,
    delegate: Arc<dyn ThreadDelegate>,
    slot: Arc<SocketSlot>,
}

impl ReconnectTask {
    pub fn new(provider: Arc<dyn SocketProvider>, config: LinkConfig) -> anyhow::Result<ReconnectTask> {
        let signal = Arc::new(CancelSignal::new());
        ReconnectTask::with_delegate(provider, config, signal.clone(), signal)
    }

    /// Injection point for tests and for embedders with their own timing: the
    /// delegate answers the sleep and cancellation-check calls, while the
    /// signal remains the sink a cancellation request is forwarded to.
    pub fn with_delegate(
        provider: Arc<dyn SocketProvider>,
        config: LinkConfig,
        signal: Arc<CancelSignal>,
        delegate: Arc<dyn ThreadDelegate>,
    ) -> anyhow::Result<ReconnectTask> {
        config.validate()?;
        Ok(ReconnectTask {
            provider,
            config,
            signal,
            delegate,
            slot: Arc::new(SocketSlot::new()),
        })
    }

    pub(crate) fn cancel_signal(&self) -> Arc<CancelSignal> {
        self.signal.clone()
    }

    pub(crate) fn socket_slot(&self) -> Arc<SocketSlot> {
        self.slot.clone()
    }

    /// Runs the retry loop until a connect succeeds or a cancellation is
    /// confirmed. At most one socket is in flight at any instant, and every
    /// failed attempt's socket is closed before the next step.
    pub fn run(&self) -> Result<Arc<dyn ConnectSocket>, ConnectError> {
        let mut failed_before = false;
        loop {
            if failed_before {
                // Sleep before trying to connect again and again. The very
                //  first attempt goes out immediately.
                debug!("failed connecting to {}, retrying after {:?}",
                    self.config.remote_addr, self.config.reconnect_delay);
                self.delegate.sleep(self.config.reconnect_delay);
                if self.delegate.take_cancelled() {
                    return Err(ConnectError::Cancelled);
                }
            }
            failed_before = true;

            let socket = match self.provider.fresh_socket() {
                Ok(socket) => socket,
                Err(e) => {
                    warn!("acquiring a socket failed: {}", e);
                    continue;
                }
            };
            self.slot.publish(socket.clone());

            match socket.connect(self.config.remote_addr) {
                Ok(()) => {
                    self.slot.take();
                    info!("connected to {}", self.config.remote_addr);
                    return Ok(socket);
                }
                Err(e) => {
                    trace!("connect attempt to {} failed: {}", self.config.remote_addr, e);
                    close_quietly(socket.as_ref());
                    self.slot.take();
                }
            }
        }
    }
}
