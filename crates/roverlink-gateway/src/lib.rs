//! Remote ends of the rover link.
//!
//! [`RoverGateway`] runs on the rover: it takes drive frames and routes from
//! the base station, hands them to a [`RoverSink`], and answers with
//! telemetry assembled from a [`SensorSource`]. [`ScienceStation`] runs on the
//! science package and serves the base station's science session.

pub mod config;
pub mod error;
pub mod rover;
pub mod station;

pub use config::{GatewayConfig, StationConfig};
pub use error::{GatewayError, Result};
pub use rover::{RoverGateway, RoverSink, SensorSample, SensorSource, ServiceReport};
pub use station::{ScienceStation, StationSink, TelemetrySource};
