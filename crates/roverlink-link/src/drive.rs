//! Drive link: control frames out, rover telemetry back.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use bytes::BytesMut;
use roverlink_frame::{DriveFrame, DriveInput, DriveShaping, TelemetryFrame, WireFrame};
use roverlink_transport::DatagramTransport;
use tracing::warn;

use crate::event::{telemetry_readings, EventSender, LinkEvent, LinkKind};
use crate::periodic::{PeriodicChannel, PeriodicProtocol};

/// Outbound drive state, replaced whole on every update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveState {
    pub input: DriveInput,
    pub autonomy: bool,
    /// Emergency-stop latch. Once set it is never cleared.
    pub stopped: bool,
}

impl DriveState {
    pub fn frame(&self, shaping: &DriveShaping) -> DriveFrame {
        if self.stopped {
            return DriveFrame::new(self.autonomy, 0, 0);
        }
        shaping.shape(self.input, self.autonomy)
    }
}

/// Shared handle for updating the drive state from any thread.
#[derive(Debug, Clone, Default)]
pub struct DriveControl {
    state: Arc<ArcSwap<DriveState>>,
}

impl DriveControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input(&self, input: DriveInput) {
        self.state.rcu(|state| DriveState { input, ..**state });
    }

    pub fn set_autonomy(&self, autonomy: bool) {
        self.state.rcu(|state| DriveState {
            autonomy,
            ..**state
        });
    }

    /// Latch the emergency stop: throttle and steering are zero from now on.
    pub fn emergency_stop(&self) {
        let previous = self.state.rcu(|state| DriveState {
            stopped: true,
            ..**state
        });
        if !previous.stopped {
            warn!("emergency stop latched");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state.load().stopped
    }

    pub fn snapshot(&self) -> DriveState {
        **self.state.load()
    }
}

/// [`PeriodicProtocol`] for the drive link.
pub struct DriveProtocol {
    control: DriveControl,
    shaping: DriveShaping,
    events: EventSender,
}

impl DriveProtocol {
    pub fn new(control: DriveControl, shaping: DriveShaping, events: EventSender) -> Self {
        Self {
            control,
            shaping,
            events,
        }
    }

    pub fn into_channel<T: DatagramTransport>(
        self,
        transport: T,
        destination: SocketAddr,
        interval: Duration,
    ) -> PeriodicChannel<Self, T> {
        PeriodicChannel::new("drive", self, transport, destination, interval)
    }
}

impl PeriodicProtocol for DriveProtocol {
    type Inbound = TelemetryFrame;

    fn encode_outbound(&mut self, dst: &mut BytesMut) -> bool {
        self.control.snapshot().frame(&self.shaping).encode(dst);
        true
    }

    fn decode_inbound(&mut self, datagram: &[u8]) -> roverlink_frame::Result<TelemetryFrame> {
        TelemetryFrame::decode(datagram)
    }

    fn publish(&mut self, frame: TelemetryFrame) {
        self.events.publish(LinkEvent::Sensors {
            link: LinkKind::Drive,
            readings: telemetry_readings(&frame),
        });
        self.events.publish(LinkEvent::Position {
            latitude: frame.latitude,
            longitude: frame.longitude,
        });
    }
}
