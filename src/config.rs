use std::net::SocketAddr;
use std::time::Duration;
use anyhow::bail;

/// Configuration of one control link: where to connect, and how long to wait
/// between failed connection attempts.
///
/// A `LinkConfig` is immutable for the lifetime of the connect task it is
/// handed to.
#[derive(Clone, Debug)]
pub struct LinkConfig {
    pub remote_addr: SocketAddr,

    /// The delay between a failed connection attempt and the next one. The
    /// very first attempt is always made immediately.
    ///
    /// There is deliberately no cap on the number of attempts or the total
    /// elapsed time: the supervisory system may be down for hours, and the
    /// link is supposed to come back up without operator intervention.
    /// Callers that need a deadline impose it externally by cancelling the
    /// connect handle.
    pub reconnect_delay: Duration,
}

impl LinkConfig {
    pub fn new(remote_addr: SocketAddr, reconnect_delay: Duration) -> LinkConfig {
        LinkConfig {
            remote_addr,
            reconnect_delay,
        }
    }

    /// NB: An address that is well-formed but unreachable passes validation -
    ///  the connect task cannot distinguish "permanently unreachable" from
    ///  "transiently unreachable" anyway, and treats both as retryable.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.remote_addr.ip().is_unspecified() {
            bail!("remote address must name a specific host, got {}", self.remote_addr);
        }
        if self.remote_addr.port() == 0 {
            bail!("remote address must have a non-zero port, got {}", self.remote_addr);
        }
        Ok(())
    }
}
