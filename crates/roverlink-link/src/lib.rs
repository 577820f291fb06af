//! Link channels between the base station and the rover.
//!
//! Three conversation shapes run side by side, each on its own thread:
//! - [`PeriodicChannel`]: fixed-rate datagram duplex (drive, arm)
//! - [`ReconnectingSession`]: persistent stream with bounded reconnects
//!   (science)
//! - [`AutonomousSession`]: one-shot route upload
//!
//! [`LinkManager`] owns all of them. Collaborators push outbound state
//! through [`DriveControl`] and [`ArmControl`] and consume inbound data as
//! [`LinkEvent`]s from a bounded queue that never blocks a channel.

pub mod arm;
pub mod autonomous;
pub mod config;
pub mod drive;
pub mod error;
pub mod event;
pub mod manager;
pub mod periodic;
pub mod science;
pub mod session;
pub mod stop;

pub use arm::{ArmControl, ArmProtocol};
pub use autonomous::{AutonomousSession, RouteProvider};
pub use config::LinkConfig;
pub use drive::{DriveControl, DriveProtocol, DriveState};
pub use error::{LinkError, Result};
pub use event::{event_channel, EventSender, LinkEvent, LinkKind, SensorMap, SensorValue};
pub use manager::LinkManager;
pub use periodic::{
    ChannelState, PeriodicChannel, PeriodicProtocol, RecvOutcome, SendOutcome, TickReport,
};
pub use science::ScienceSession;
pub use session::{
    Connector, PollOutcome, ReconnectPolicy, ReconnectingSession, SessionState, TcpConnector,
};
pub use stop::{stop_pair, SessionStream, SocketSlot, StopHandle, StopSignal, StreamShutdown};
