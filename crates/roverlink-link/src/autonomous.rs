//! One-shot waypoint upload to the rover.

use roverlink_frame::{FrameWriter, Waypoint};
use tracing::{info, warn};

use crate::error::Result;
use crate::event::{EventSender, LinkEvent, LinkKind};
use crate::session::{Connector, TcpConnector};
use crate::stop::{SessionStream, SocketSlot, StreamShutdown};

/// Supplies the route to upload, as `(latitude, longitude)` pairs.
pub trait RouteProvider: Send + Sync {
    fn route(&self) -> Vec<(f32, f32)>;
}

impl<F> RouteProvider for F
where
    F: Fn() -> Vec<(f32, f32)> + Send + Sync,
{
    fn route(&self) -> Vec<(f32, f32)> {
        self()
    }
}

/// Connects once, streams every waypoint, closes. Never retries.
pub struct AutonomousSession<C: Connector = TcpConnector> {
    connector: C,
    events: EventSender,
    slot: SocketSlot,
}

impl<C: Connector> AutonomousSession<C> {
    pub fn new(connector: C, events: EventSender) -> Self {
        Self::with_slot(connector, events, SocketSlot::new())
    }

    pub fn with_slot(connector: C, events: EventSender, slot: SocketSlot) -> Self {
        Self {
            connector,
            events,
            slot,
        }
    }

    /// Upload the provider's current route. Returns the number of waypoints
    /// written.
    pub fn run_once(&mut self, provider: &dyn RouteProvider) -> Result<usize> {
        let route = Waypoint::route(&provider.route());

        let stream = match self.connector.connect() {
            Ok(stream) => stream,
            Err(err) => {
                warn!(endpoint = %self.connector.endpoint(), error = %err, "route upload failed");
                self.report(false);
                return Err(err);
            }
        };
        if let Ok(handle) = stream.try_clone_stream() {
            self.slot.register(Box::new(handle));
        }
        self.report(true);

        let mut writer = FrameWriter::new(stream);
        let result = route.iter().try_for_each(|waypoint| writer.send(waypoint));

        writer.get_ref().shutdown_both();
        self.slot.clear();
        drop(writer);

        result?;
        info!(
            endpoint = %self.connector.endpoint(),
            waypoints = route.len(),
            "route uploaded"
        );
        Ok(route.len())
    }

    fn report(&self, connected: bool) {
        self.events.publish(LinkEvent::Connectivity {
            link: LinkKind::Autonomous,
            connected,
        });
    }
}
