//! Arm link: joint targets out, nothing expected back.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use bytes::BytesMut;
use roverlink_frame::{ArmFrame, WireFrame};
use roverlink_transport::DatagramTransport;
use tracing::trace;

use crate::periodic::{PeriodicChannel, PeriodicProtocol};

/// Latest arm frame; `None` until the arm input is ready.
#[derive(Debug, Clone, Default)]
pub struct ArmControl {
    frame: Arc<ArcSwapOption<ArmFrame>>,
}

impl ArmControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, frame: ArmFrame) {
        self.frame.store(Some(Arc::new(frame)));
    }

    /// Stop sending until a new frame is set.
    pub fn clear(&self) {
        self.frame.store(None);
    }

    pub fn current(&self) -> Option<ArmFrame> {
        self.frame.load().as_deref().copied()
    }
}

pub struct ArmProtocol {
    control: ArmControl,
}

impl ArmProtocol {
    pub fn new(control: ArmControl) -> Self {
        Self { control }
    }

    pub fn into_channel<T: DatagramTransport>(
        self,
        transport: T,
        destination: SocketAddr,
        interval: Duration,
    ) -> PeriodicChannel<Self, T> {
        PeriodicChannel::new("arm", self, transport, destination, interval)
    }
}

impl PeriodicProtocol for ArmProtocol {
    type Inbound = ();

    fn encode_outbound(&mut self, dst: &mut BytesMut) -> bool {
        match self.control.current() {
            Some(frame) => {
                frame.encode(dst);
                true
            }
            None => false,
        }
    }

    fn decode_inbound(&mut self, datagram: &[u8]) -> roverlink_frame::Result<()> {
        trace!(len = datagram.len(), "ignoring arm datagram");
        Ok(())
    }

    fn publish(&mut self, _inbound: ()) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::periodic::tests::MockTransport;
    use crate::periodic::SendOutcome;

    fn arm_addr() -> SocketAddr {
        SocketAddr::from(([192, 168, 0, 80], 53204))
    }

    #[test]
    fn nothing_sent_until_frame_is_set() {
        let control = ArmControl::new();
        let transport = MockTransport::default();
        let mut channel = ArmProtocol::new(control.clone()).into_channel(
            transport.clone(),
            arm_addr(),
            Duration::ZERO,
        );

        assert_eq!(channel.tick().send, SendOutcome::Skipped);

        let frame = ArmFrame::from_joints([0.5, -0.5, 0.0, 1.0, -1.0, 0.25]);
        control.set(frame);
        assert_eq!(channel.tick().send, SendOutcome::Sent);

        control.clear();
        assert_eq!(channel.tick().send, SendOutcome::Skipped);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(ArmFrame::decode(&sent[0]).unwrap(), frame);
    }

    #[test]
    fn inbound_datagrams_are_ignored() {
        let transport = MockTransport::default();
        transport.push_inbound(Ok(vec![1, 2, 3]));
        let mut channel =
            ArmProtocol::new(ArmControl::new()).into_channel(transport, arm_addr(), Duration::ZERO);
        // Accepted and dropped; no events exist for the arm.
        channel.tick();
        assert_eq!(channel.tick().send, SendOutcome::Skipped);
    }
}
