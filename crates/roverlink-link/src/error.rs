use std::path::PathBuf;

use roverlink_transport::{Endpoint, ErrorKind};

/// Errors that can occur in link channels and sessions.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] roverlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] roverlink_frame::FrameError),

    /// Every connect attempt in the budget failed.
    #[error("gave up connecting to {endpoint} after {attempts} attempts")]
    RetriesExhausted { endpoint: String, attempts: u32 },

    /// Operation requires a connected session.
    #[error("session is not connected")]
    NotConnected,

    /// The session was stopped while connecting.
    #[error("stopped")]
    Stopped,

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

    /// A link task thread could not be started.
    #[error("failed to spawn {name} task: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl LinkError {
    pub fn retries_exhausted(endpoint: &Endpoint, attempts: u32) -> Self {
        LinkError::RetriesExhausted {
            endpoint: endpoint.to_string(),
            attempts,
        }
    }

    /// Classify this error for the owning loop.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinkError::Transport(err) => err.kind(),
            LinkError::Frame(err) => err.kind(),
            LinkError::RetriesExhausted { .. } | LinkError::NotConnected | LinkError::Stopped => {
                ErrorKind::ConnectionLost
            }
            LinkError::ConfigRead { .. } | LinkError::Json(_) => ErrorKind::Malformed,
            LinkError::Spawn { source, .. } => roverlink_transport::classify_io(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
