//! Binary frame layouts for the rover link.
//!
//! Every conversation on the link exchanges fixed-layout frames with no
//! envelope or version field, so both endpoints must be built from these
//! definitions:
//! - Drive control, arm control, rover telemetry and waypoints are
//!   little-endian
//! - Science traffic is big-endian, with a 4-byte timestamp and a 1-byte
//!   discriminator ahead of the payload
//!
//! Decoding never reads past the buffer; a short buffer is
//! [`FrameError::Truncated`].

pub mod axis;
pub mod codec;
pub mod control;
pub mod error;
pub mod reader;
pub mod science;
pub mod telemetry;
pub mod waypoint;
pub mod writer;

pub use axis::{normalize_axis, AxisMapping, DriveInput, DriveShaping};
pub use codec::{decode_frame, encode_frame, WireFrame};
pub use control::{ArmFrame, DriveFrame};
pub use error::{FrameError, Result};
pub use reader::{CommandReader, FrameReader, ScienceReader, WaypointReader};
pub use science::{
    CommandBody, EnvironmentReading, MechanismReading, ScienceBody, ScienceCommand,
    ScienceMessage,
};
pub use telemetry::TelemetryFrame;
pub use waypoint::Waypoint;
pub use writer::FrameWriter;
