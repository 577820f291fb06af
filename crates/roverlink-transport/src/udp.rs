use std::io;
use std::net::{SocketAddr, UdpSocket};

use tracing::debug;

use crate::error::{Result, TransportError};

/// A datagram socket as seen by a periodic link loop.
///
/// Both operations must return immediately: `try_recv_from` reports
/// `WouldBlock` when nothing is pending.
pub trait DatagramTransport: Send {
    /// Send one datagram to `dest`.
    fn send_to(&self, payload: &[u8], dest: SocketAddr) -> io::Result<usize>;

    /// Receive one pending datagram, if any.
    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

/// Non-blocking UDP socket.
#[derive(Debug)]
pub struct UdpEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpEndpoint {
    /// Bind to `addr` and switch the socket to non-blocking mode.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        socket
            .set_nonblocking(true)
            .map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = socket.local_addr()?;

        debug!(%local_addr, "bound udp endpoint");

        Ok(Self { socket, local_addr })
    }

    /// Bind an ephemeral port on all interfaces (control-station side).
    pub fn bind_ephemeral() -> Result<Self> {
        Self::bind(SocketAddr::from(([0, 0, 0, 0], 0)))
    }

    /// The locally bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Clone the underlying socket handle.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            socket: self.socket.try_clone()?,
            local_addr: self.local_addr,
        })
    }
}

impl DatagramTransport for UdpEndpoint {
    fn send_to(&self, payload: &[u8], dest: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(payload, dest)
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    fn recv_with_deadline(
        endpoint: &UdpEndpoint,
        buf: &mut [u8],
    ) -> io::Result<(usize, SocketAddr)> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            match endpoint.try_recv_from(buf) {
                Err(err) if err.kind() == io::ErrorKind::WouldBlock && Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(5));
                }
                other => return other,
            }
        }
    }

    #[test]
    fn empty_socket_would_block() {
        let endpoint = UdpEndpoint::bind(loopback()).unwrap();
        let mut buf = [0u8; 64];
        let err = endpoint.try_recv_from(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn datagram_round_trip_reports_sender() {
        let a = UdpEndpoint::bind(loopback()).unwrap();
        let b = UdpEndpoint::bind(loopback()).unwrap();

        a.send_to(b"ping", b.local_addr()).unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = recv_with_deadline(&b, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(from, a.local_addr());
    }

    #[test]
    fn bind_conflict_is_reported() {
        let first = UdpEndpoint::bind(loopback()).unwrap();
        let err = UdpEndpoint::bind(first.local_addr()).unwrap_err();
        assert!(matches!(err, TransportError::Bind { .. }));
    }

    #[test]
    fn clone_shares_socket() {
        let a = UdpEndpoint::bind(loopback()).unwrap();
        let a2 = a.try_clone().unwrap();
        assert_eq!(a.local_addr(), a2.local_addr());
    }
}
