//! Network transport primitives for the rover link.
//!
//! Provides the two socket shapes every link conversation is built on:
//! - Non-blocking UDP endpoints for the fixed-rate control/telemetry exchange
//! - TCP connect/accept helpers for the reliable science and route channels
//!
//! This is the lowest layer of roverlink. It also owns the [`ErrorKind`]
//! classification that every higher layer uses to decide whether a failure
//! is swallowed, discarded, or escalated into a reconnect.

pub mod endpoint;
pub mod error;
pub mod tcp;
pub mod udp;

pub use endpoint::{Endpoint, ParseEndpointError};
pub use error::{classify_datagram_io, classify_io, ErrorKind, Result, TransportError};
pub use tcp::{connect, shutdown_stream, StreamListener};
pub use udp::{DatagramTransport, UdpEndpoint};
