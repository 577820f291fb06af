use std::path::PathBuf;

use roverlink_transport::ErrorKind;

/// Errors that can occur in the rover gateway and science station.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] roverlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] roverlink_frame::FrameError),

    /// Configuration file could not be read.
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Classify this error for the owning loop.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Transport(err) => err.kind(),
            GatewayError::Frame(err) => err.kind(),
            GatewayError::ConfigRead { .. } | GatewayError::Json(_) => ErrorKind::Malformed,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
