use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;

#[cfg(test)] use mockall::automock;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::trace;

/// This is an abstraction for the socket resource the connect task works on,
///  introduced to facilitate mocking the I/O part away for testing.
///
/// `shutdown_now` must be safe to call from a thread other than the one
/// blocked in `connect` - that is the mechanism by which a cancellation
/// unblocks a connect call that has no native timeout. Shutting down a socket
/// that never connected or was already shut down is expected to report an
/// error, which callers swallow.
#[cfg_attr(test, automock)]
pub trait ConnectSocket: Send + Sync {
    fn connect(&self, addr: SocketAddr) -> io::Result<()>;

    fn shutdown_now(&self) -> io::Result<()>;

    /// A readable/writable handle to the connected transport.
    fn try_clone_stream(&self) -> io::Result<TcpStream>;
}

/// Yields a fresh, unconnected socket for every connection attempt.
#[cfg_attr(test, automock)]
pub trait SocketProvider: Send + Sync {
    fn fresh_socket(&self) -> io::Result<Arc<dyn ConnectSocket>>;
}

/// Best-effort close: a socket that is being discarded anyway must not turn
/// its own close failure into a task failure.
pub fn close_quietly(socket: &dyn ConnectSocket) {
    if let Err(e) = socket.shutdown_now() {
        trace!("ignoring error shutting down socket: {}", e);
    }
}

pub struct TcpConnectSocket {
    inner: Socket,
}

impl ConnectSocket for TcpConnectSocket {
    fn connect(&self, addr: SocketAddr) -> io::Result<()> {
        self.inner.connect(&addr.into())
    }

    fn shutdown_now(&self) -> io::Result<()> {
        self.inner.shutdown(Shutdown::Both)
    }

    fn try_clone_stream(&self) -> io::Result<TcpStream> {
        Ok(self.inner.try_clone()?.into())
    }
}

pub struct TcpSocketProvider {
    domain: Domain,
}

impl TcpSocketProvider {
    pub fn for_address(addr: SocketAddr) -> TcpSocketProvider {
        TcpSocketProvider {
            domain: Domain::for_address(addr),
        }
    }
}

impl SocketProvider for TcpSocketProvider {
    fn fresh_socket(&self) -> io::Result<Arc<dyn ConnectSocket>> {
        let inner = Socket::new(self.domain, Type::STREAM, Some(Protocol::TCP))?;
        Ok(Arc::new(TcpConnectSocket { inner }))
    }
}
