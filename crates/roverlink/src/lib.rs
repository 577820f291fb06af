//! Ground-station link layer for a teleoperated rover.
//!
//! # Crate Structure
//!
//! - [`transport`]: endpoints, UDP/TCP plumbing and error classification
//! - [`frame`]: fixed-layout wire frames for drive, arm, telemetry, science and routes
//! - [`link`]: periodic channels, reconnecting sessions and the link manager
//! - [`gateway`]: rover and science-station endpoints (behind `gateway` feature)

/// Re-export transport types.
pub mod transport {
    pub use roverlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use roverlink_frame::*;
}

/// Re-export link types.
pub mod link {
    pub use roverlink_link::*;
}

/// Re-export gateway types (requires `gateway` feature).
#[cfg(feature = "gateway")]
pub mod gateway {
    pub use roverlink_gateway::*;
}
