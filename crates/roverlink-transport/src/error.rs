use std::io;
use std::net::SocketAddr;

use crate::endpoint::Endpoint;

/// How a failure should be treated by the loop that observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Expected steady-state condition (no data yet, peer briefly unreachable).
    /// Swallowed locally; the loop continues.
    Transient,
    /// A payload that could not be decoded. The message is discarded.
    Malformed,
    /// The connection is gone or could not be established.
    ConnectionLost,
}

/// Errors that can occur in link transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint host could not be resolved to a socket address.
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        endpoint: Endpoint,
        source: io::Error,
    },

    /// Failed to bind a local socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    /// Failed to connect to the remote endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        source: io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(io::Error),

    /// An I/O error occurred on an established socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Classify this error for the owning loop.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Resolve { .. } | TransportError::Connect { .. } => {
                ErrorKind::ConnectionLost
            }
            TransportError::Bind { source, .. } => classify_io(source),
            TransportError::Accept(source) | TransportError::Io(source) => classify_io(source),
        }
    }
}

/// Classify an I/O error raised by a stream socket.
pub fn classify_io(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
            ErrorKind::Transient
        }
        _ => ErrorKind::ConnectionLost,
    }
}

/// Classify an I/O error raised by a datagram socket.
///
/// Datagram peers come and go without a connection, so refusal and
/// reachability errors (often delivered late via ICMP) are transient too.
pub fn classify_datagram_io(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::WouldBlock
        | io::ErrorKind::TimedOut
        | io::ErrorKind::Interrupted
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::AddrNotAvailable => ErrorKind::Transient,
        _ => ErrorKind::ConnectionLost,
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
