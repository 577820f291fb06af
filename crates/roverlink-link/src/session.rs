//! Reliable stream session with bounded reconnects.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──ok──▶ Connected
//!      ▲                        │                  │
//!      └──── budget exhausted ──┘   failures ≥ threshold
//!      └──────────────── Draining ◀────────────────┘
//! ```
//!
//! Connect attempts are a bounded loop with a fixed backoff between them.
//! While connected, each poll makes one non-blocking read; connection-level
//! read errors count toward the failure threshold, and reaching it drains the
//! stream and starts a fresh connect with the reconnect budget.

use std::net::TcpStream;
use std::time::Duration;

use roverlink_frame::{FrameReader, FrameWriter, WireFrame};
use roverlink_transport::{Endpoint, ErrorKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::{LinkError, Result};
use crate::stop::{SessionStream, SocketSlot, StopSignal, StreamShutdown};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Draining,
}

/// Retry budget and failure threshold for a [`ReconnectingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Attempts made by the first connect.
    pub initial_attempts: u32,
    /// Attempts made after a connection is lost.
    pub reconnect_attempts: u32,
    /// Wait between failed attempts.
    pub backoff_ms: u64,
    /// Consecutive receive failures that force a reconnect.
    pub failure_threshold: u32,
    /// Bound on a single connect attempt.
    pub connect_timeout_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_attempts: 5,
            reconnect_attempts: 10,
            backoff_ms: 10_000,
            failure_threshold: 10,
            connect_timeout_ms: 2_000,
        }
    }
}

impl ReconnectPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Waits taken by a connect call that fails every one of `attempts`.
    ///
    /// There is no wait after the final attempt.
    pub fn backoff_schedule(&self, attempts: u32) -> Vec<Duration> {
        vec![self.backoff(); attempts.saturating_sub(1) as usize]
    }
}

/// Opens a fresh stream for each connect attempt.
pub trait Connector: Send {
    type Stream: SessionStream;

    fn endpoint(&self) -> &Endpoint;

    fn connect(&mut self) -> Result<Self::Stream>;
}

/// TCP connector with a per-attempt timeout.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    endpoint: Endpoint,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn connect(&mut self) -> Result<TcpStream> {
        Ok(roverlink_transport::connect(&self.endpoint, self.timeout)?)
    }
}

/// Result of one non-blocking receive.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<M> {
    Message(M),
    /// Nothing complete has arrived (or the session is not connected).
    Idle,
    /// A malformed message was dropped.
    Discarded,
    /// A connection-level failure was counted.
    Failed,
}

struct Connection<S, M> {
    reader: FrameReader<S, M>,
    writer: FrameWriter<S>,
}

/// Stream session that reconnects within a bounded budget.
pub struct ReconnectingSession<C: Connector, M> {
    connector: C,
    policy: ReconnectPolicy,
    state: SessionState,
    failures: u32,
    connection: Option<Connection<C::Stream, M>>,
    slot: SocketSlot,
    attempts: u64,
    reconnects: u64,
}

impl<C: Connector, M: WireFrame> ReconnectingSession<C, M> {
    pub fn new(connector: C, policy: ReconnectPolicy) -> Self {
        Self::with_slot(connector, policy, SocketSlot::new())
    }

    /// Register every connected stream in `slot` so an owner can shut it down.
    pub fn with_slot(connector: C, policy: ReconnectPolicy, slot: SocketSlot) -> Self {
        Self {
            connector,
            policy,
            state: SessionState::Disconnected,
            failures: 0,
            connection: None,
            slot,
            attempts: 0,
            reconnects: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Connect attempts made over the session's lifetime.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Times the failure threshold forced a reconnect.
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.connector.endpoint()
    }

    /// Try up to `max_attempts` times, waiting the backoff between attempts.
    ///
    /// On exhaustion the session is left `Disconnected` and nothing more is
    /// attempted until `connect` is called again.
    pub fn connect(&mut self, max_attempts: u32, stop: &StopSignal) -> Result<()> {
        self.disconnect();
        self.state = SessionState::Connecting;

        for attempt in 1..=max_attempts {
            if stop.is_stopped() {
                self.state = SessionState::Disconnected;
                return Err(LinkError::Stopped);
            }

            self.attempts += 1;
            let failure = match self.connector.connect() {
                Ok(stream) => match self.install(stream) {
                    Ok(()) => {
                        info!(endpoint = %self.endpoint(), attempt, "session connected");
                        return Ok(());
                    }
                    Err(err) => err,
                },
                Err(err) => err,
            };

            debug!(
                endpoint = %self.endpoint(),
                attempt,
                max_attempts,
                error = %failure,
                "connect attempt failed"
            );

            if attempt < max_attempts && !stop.sleep(self.policy.backoff()) {
                self.state = SessionState::Disconnected;
                return Err(LinkError::Stopped);
            }
        }

        self.state = SessionState::Disconnected;
        warn!(endpoint = %self.endpoint(), max_attempts, "connect budget exhausted");
        Err(LinkError::retries_exhausted(self.endpoint(), max_attempts))
    }

    fn install(&mut self, stream: C::Stream) -> Result<()> {
        let reader_stream = stream.try_clone_stream().map_err(map_io)?;
        let slot_stream = stream.try_clone_stream().map_err(map_io)?;
        self.slot.register(Box::new(slot_stream));
        self.connection = Some(Connection {
            reader: FrameReader::new(reader_stream),
            writer: FrameWriter::new(stream),
        });
        self.failures = 0;
        self.state = SessionState::Connected;
        Ok(())
    }

    /// One non-blocking receive.
    pub fn poll(&mut self) -> PollOutcome<M> {
        let Some(connection) = self.connection.as_mut() else {
            return PollOutcome::Idle;
        };
        match connection.reader.poll_frame() {
            Ok(Some(message)) => {
                self.failures = 0;
                PollOutcome::Message(message)
            }
            Ok(None) => PollOutcome::Idle,
            Err(err) => match err.kind() {
                ErrorKind::Transient => PollOutcome::Idle,
                ErrorKind::Malformed => {
                    trace!(error = %err, "discarding malformed message");
                    PollOutcome::Discarded
                }
                ErrorKind::ConnectionLost => {
                    self.failures += 1;
                    trace!(error = %err, failures = self.failures, "receive failed");
                    PollOutcome::Failed
                }
            },
        }
    }

    /// Connected, but the failure count has reached the threshold.
    pub fn needs_recovery(&self) -> bool {
        self.state == SessionState::Connected && self.failures >= self.policy.failure_threshold
    }

    /// Shut the stream down in both directions and drop it.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.state = SessionState::Draining;
            connection.writer.get_ref().shutdown_both();
            self.slot.clear();
            drop(connection);
            info!(endpoint = %self.endpoint(), "session disconnected");
        }
        self.failures = 0;
        self.state = SessionState::Disconnected;
    }

    /// Drain the failed stream and reconnect with the reconnect budget.
    pub fn recover(&mut self, stop: &StopSignal) -> Result<()> {
        warn!(
            endpoint = %self.endpoint(),
            failures = self.failures,
            "failure threshold reached, reconnecting"
        );
        self.disconnect();
        self.reconnects += 1;
        self.connect(self.policy.reconnect_attempts, stop)
    }

    /// Write one frame. A connection-level failure counts toward the threshold.
    pub fn send<F: WireFrame>(&mut self, frame: &F) -> Result<()> {
        let connection = self.connection.as_mut().ok_or(LinkError::NotConnected)?;
        connection.writer.send(frame).map_err(|err| {
            if err.kind() == ErrorKind::ConnectionLost {
                self.failures += 1;
            }
            LinkError::from(err)
        })
    }
}

fn map_io(err: std::io::Error) -> LinkError {
    LinkError::Transport(err.into())
}
