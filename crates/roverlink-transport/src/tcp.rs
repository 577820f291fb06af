use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};

/// Connect to a TCP endpoint, bounded by `timeout`.
///
/// The returned stream is non-blocking for reads and writes and has Nagle
/// disabled, since every frame on the reliable channels is small.
pub fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<TcpStream> {
    let addr = endpoint.resolve()?;
    let stream =
        TcpStream::connect_timeout(&addr, timeout).map_err(|source| TransportError::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;
    configure_stream(&stream)?;
    debug!(%endpoint, "connected");
    Ok(stream)
}

/// Shut a stream down in both directions.
///
/// Any in-flight receive on a clone of the stream returns immediately.
/// Errors (typically `NotConnected` after the peer went away) are ignored.
pub fn shutdown_stream(stream: &TcpStream) {
    if let Err(err) = stream.shutdown(Shutdown::Both) {
        debug!(error = %err, "stream shutdown ignored");
    }
}

fn configure_stream(stream: &TcpStream) -> io::Result<()> {
    stream.set_nonblocking(true)?;
    stream.set_nodelay(true)
}

/// Non-blocking TCP listener used by the rover-side endpoints.
#[derive(Debug)]
pub struct StreamListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl StreamListener {
    /// Bind and listen on `addr`.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        info!(%local_addr, "listening for stream connections");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept a pending connection, if one is waiting.
    pub fn try_accept(&self) -> Result<Option<(TcpStream, SocketAddr)>> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                configure_stream(&stream).map_err(TransportError::Accept)?;
                debug!(%peer, "accepted connection");
                Ok(Some((stream, peer)))
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// The locally bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
