//! Fixed-rate datagram duplex.
//!
//! Each tick sends the protocol's current outbound frame to a fixed
//! destination, then makes one non-blocking receive attempt. Nothing a tick
//! observes ends the loop; only the stop signal does.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use roverlink_transport::{classify_datagram_io, DatagramTransport, ErrorKind, UdpEndpoint};
use serde::Serialize;
use tracing::{debug, trace};

use crate::stop::StopSignal;

const RECV_BUFFER_SIZE: usize = 1024;

/// What a periodic link sends and how it handles what comes back.
pub trait PeriodicProtocol: Send + 'static {
    type Inbound;

    /// Append this tick's outbound frame to `dst`.
    ///
    /// Return `false` to send nothing this tick.
    fn encode_outbound(&mut self, dst: &mut BytesMut) -> bool;

    fn decode_inbound(&mut self, datagram: &[u8]) -> roverlink_frame::Result<Self::Inbound>;

    fn publish(&mut self, inbound: Self::Inbound);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// The protocol had nothing to send.
    Skipped,
    /// The send failed and was swallowed.
    Dropped(ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// No datagram pending.
    Empty,
    Delivered,
    /// A datagram arrived but did not decode.
    Discarded(ErrorKind),
    /// The receive itself failed and was swallowed.
    Failed(ErrorKind),
}

/// Result of a single tick, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub send: SendOutcome,
    pub recv: RecvOutcome,
}

/// Generic driver for a [`PeriodicProtocol`] over a datagram transport.
pub struct PeriodicChannel<P, T = UdpEndpoint> {
    name: &'static str,
    protocol: P,
    transport: T,
    destination: SocketAddr,
    interval: Duration,
    state: ChannelState,
    send_buf: BytesMut,
    recv_buf: Box<[u8]>,
}

impl<P: PeriodicProtocol, T: DatagramTransport> PeriodicChannel<P, T> {
    pub fn new(
        name: &'static str,
        protocol: P,
        transport: T,
        destination: SocketAddr,
        interval: Duration,
    ) -> Self {
        Self {
            name,
            protocol,
            transport,
            destination,
            interval,
            state: ChannelState::Idle,
            send_buf: BytesMut::with_capacity(64),
            recv_buf: vec![0u8; RECV_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// One send attempt followed by one receive attempt.
    pub fn tick(&mut self) -> TickReport {
        TickReport {
            send: self.send_outbound(),
            recv: self.receive_inbound(),
        }
    }

    fn send_outbound(&mut self) -> SendOutcome {
        self.send_buf.clear();
        if !self.protocol.encode_outbound(&mut self.send_buf) {
            return SendOutcome::Skipped;
        }
        match self.transport.send_to(&self.send_buf, self.destination) {
            Ok(_) => SendOutcome::Sent,
            Err(err) => {
                let kind = classify_datagram_io(&err);
                trace!(channel = self.name, error = %err, ?kind, "send dropped");
                SendOutcome::Dropped(kind)
            }
        }
    }

    fn receive_inbound(&mut self) -> RecvOutcome {
        let len = match self.transport.try_recv_from(&mut self.recv_buf) {
            Ok((len, _from)) => len,
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => return RecvOutcome::Empty,
            Err(err) => {
                let kind = classify_datagram_io(&err);
                trace!(channel = self.name, error = %err, ?kind, "receive failed");
                return RecvOutcome::Failed(kind);
            }
        };
        match self.protocol.decode_inbound(&self.recv_buf[..len]) {
            Ok(inbound) => {
                self.protocol.publish(inbound);
                RecvOutcome::Delivered
            }
            Err(err) => {
                trace!(channel = self.name, error = %err, "discarding datagram");
                RecvOutcome::Discarded(err.kind())
            }
        }
    }

    /// Tick until `stop` fires.
    pub fn run(&mut self, stop: &StopSignal) {
        self.state = ChannelState::Running;
        debug!(channel = self.name, destination = %self.destination, "channel running");
        while !stop.is_stopped() {
            self.tick();
            if !stop.sleep(self.interval) {
                break;
            }
        }
        self.state = ChannelState::Stopped;
        debug!(channel = self.name, "channel stopped");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    use bytes::BufMut;
    use roverlink_frame::FrameError;

    use super::*;
    use crate::stop::stop_pair;

    /// In-memory datagram transport recording sends and replaying receives.
    #[derive(Clone, Default)]
    pub(crate) struct MockTransport {
        pub sent: Arc<Mutex<Vec<(Vec<u8>, SocketAddr)>>>,
        pub inbound: Arc<Mutex<VecDeque<io::Result<Vec<u8>>>>>,
        pub send_error: Option<io::ErrorKind>,
    }

    impl MockTransport {
        pub(crate) fn push_inbound(&self, datagram: io::Result<Vec<u8>>) {
            self.inbound.lock().unwrap().push_back(datagram);
        }

        pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(bytes, _)| bytes.clone())
                .collect()
        }
    }

    impl DatagramTransport for MockTransport {
        fn send_to(&self, payload: &[u8], dest: SocketAddr) -> io::Result<usize> {
            if let Some(kind) = self.send_error {
                return Err(io::Error::from(kind));
            }
            self.sent.lock().unwrap().push((payload.to_vec(), dest));
            Ok(payload.len())
        }

        fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            match self.inbound.lock().unwrap().pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok((bytes.len(), SocketAddr::from(([10, 0, 0, 1], 9))))
                }
                Some(Err(err)) => Err(err),
                None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
            }
        }
    }

    /// Sends a counter byte each tick and publishes any 1-byte datagram.
    struct Counter {
        next: u8,
        skip: bool,
        received: Arc<Mutex<Vec<u8>>>,
    }

    impl PeriodicProtocol for Counter {
        type Inbound = u8;

        fn encode_outbound(&mut self, dst: &mut BytesMut) -> bool {
            if self.skip {
                return false;
            }
            dst.put_u8(self.next);
            self.next += 1;
            true
        }

        fn decode_inbound(&mut self, datagram: &[u8]) -> roverlink_frame::Result<u8> {
            match datagram {
                [b] => Ok(*b),
                [] => Err(FrameError::Truncated {
                    needed: 1,
                    available: 0,
                }),
                [first, ..] => Err(FrameError::UnknownDiscriminator(*first)),
            }
        }

        fn publish(&mut self, inbound: u8) {
            self.received.lock().unwrap().push(inbound);
        }
    }

    fn counter(skip: bool) -> (Counter, Arc<Mutex<Vec<u8>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        (
            Counter {
                next: 0,
                skip,
                received: Arc::clone(&received),
            },
            received,
        )
    }

    fn dest() -> SocketAddr {
        SocketAddr::from(([192, 168, 0, 40], 8840))
    }

    #[test]
    fn tick_sends_then_receives() {
        let transport = MockTransport::default();
        transport.push_inbound(Ok(vec![42]));
        let (proto, received) = counter(false);
        let mut channel =
            PeriodicChannel::new("test", proto, transport.clone(), dest(), Duration::ZERO);

        let report = channel.tick();
        assert_eq!(report.send, SendOutcome::Sent);
        assert_eq!(report.recv, RecvOutcome::Delivered);
        assert_eq!(*received.lock().unwrap(), vec![42]);

        let report = channel.tick();
        assert_eq!(report.recv, RecvOutcome::Empty);
        assert_eq!(transport.sent(), vec![vec![0], vec![1]]);
        assert_eq!(transport.sent.lock().unwrap()[0].1, dest());
    }

    #[test]
    fn undecodable_datagram_is_discarded() {
        let transport = MockTransport::default();
        transport.push_inbound(Ok(vec![]));
        transport.push_inbound(Ok(vec![7, 7]));
        let (proto, received) = counter(false);
        let mut channel = PeriodicChannel::new("test", proto, transport, dest(), Duration::ZERO);

        assert_eq!(
            channel.tick().recv,
            RecvOutcome::Discarded(ErrorKind::Malformed)
        );
        assert_eq!(
            channel.tick().recv,
            RecvOutcome::Discarded(ErrorKind::Malformed)
        );
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn send_and_receive_errors_are_swallowed() {
        let transport = MockTransport {
            send_error: Some(io::ErrorKind::ConnectionRefused),
            ..MockTransport::default()
        };
        transport.push_inbound(Err(io::Error::from(io::ErrorKind::ConnectionReset)));
        let (proto, _) = counter(false);
        let mut channel = PeriodicChannel::new("test", proto, transport, dest(), Duration::ZERO);

        let report = channel.tick();
        assert_eq!(report.send, SendOutcome::Dropped(ErrorKind::Transient));
        assert_eq!(report.recv, RecvOutcome::Failed(ErrorKind::Transient));
        // The loop keeps going on the next tick.
        assert_eq!(channel.tick().recv, RecvOutcome::Empty);
    }

    #[test]
    fn skipped_outbound_sends_nothing() {
        let transport = MockTransport::default();
        let (proto, _) = counter(true);
        let mut channel =
            PeriodicChannel::new("test", proto, transport.clone(), dest(), Duration::ZERO);
        assert_eq!(channel.tick().send, SendOutcome::Skipped);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn run_stops_from_another_thread() {
        let transport = MockTransport::default();
        let (proto, _) = counter(false);
        let mut channel = PeriodicChannel::new(
            "test",
            proto,
            transport.clone(),
            dest(),
            Duration::from_millis(5),
        );
        assert_eq!(channel.state(), ChannelState::Idle);

        let (mut handle, signal) = stop_pair();
        let worker = std::thread::spawn(move || {
            channel.run(&signal);
            channel
        });

        std::thread::sleep(Duration::from_millis(60));
        handle.stop();
        let channel = worker.join().unwrap();

        assert_eq!(channel.state(), ChannelState::Stopped);
        assert!(transport.sent().len() >= 2);
    }

    #[test]
    fn runs_over_real_udp() {
        let peer = UdpEndpoint::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        let local = UdpEndpoint::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        let (proto, _) = counter(false);
        let mut channel =
            PeriodicChannel::new("udp", proto, local, peer.local_addr(), Duration::ZERO);

        channel.tick();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        let mut buf = [0u8; 8];
        loop {
            match peer.try_recv_from(&mut buf) {
                Ok((n, _)) => {
                    assert_eq!(&buf[..n], &[0]);
                    break;
                }
                Err(_) => {
                    assert!(std::time::Instant::now() < deadline);
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
        }
    }
}
