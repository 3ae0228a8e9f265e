use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::Result;

/// Receive buffer size: Ethernet MTU plus headroom.
pub const DATAGRAM_BUFFER_SIZE: usize = 2048;

/// Poll interval for the `running` flag between socket reads.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Inbound UDP socket for RTP/RTCP datagrams.
///
/// Binds one socket and reads it from a single thread via
/// [`run`](Self::run), handing each datagram to a callback together with
/// the sender's address. The read timeout keeps the loop responsive to the
/// `running` flag so shutdown completes within one poll interval.
pub struct UdpInbound {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpInbound {
    /// Bind `address:port`. Port 0 asks the OS to choose one; the result
    /// is available through [`local_addr`](Self::local_addr).
    pub fn bind(address: &str, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind((address, port))?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        let local_addr = socket.local_addr()?;
        tracing::info!(addr = %local_addr, "UDP inbound socket bound");
        Ok(Self { socket, local_addr })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Read datagrams until `running` clears, delivering each to
    /// `on_datagram(local_port, remote, bytes)`.
    ///
    /// The buffer is reused across reads; the callback must copy anything
    /// it keeps. Consumes the socket — call from a dedicated thread.
    pub fn run(self, running: Arc<AtomicBool>, mut on_datagram: impl FnMut(u16, SocketAddr, &[u8])) {
        let mut buf = [0u8; DATAGRAM_BUFFER_SIZE];
        let local_port = self.local_addr.port();

        while running.load(Ordering::SeqCst) {
            match self.socket.recv_from(&mut buf) {
                Ok((len, remote)) => on_datagram(local_port, remote, &buf[..len]),
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    if running.load(Ordering::SeqCst) {
                        tracing::warn!(error = %e, "UDP receive error");
                    }
                }
            }
        }
        tracing::debug!("receive loop exited");
    }
}
