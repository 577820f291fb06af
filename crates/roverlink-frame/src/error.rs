use roverlink_transport::{classify_io, ErrorKind};

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The buffer is shorter than the layout selected by its discriminator.
    #[error("truncated frame ({available} bytes, need {needed})")]
    Truncated { needed: usize, available: usize },

    /// The discriminator byte does not select a known layout.
    #[error("unknown discriminator 0x{0:02x}")]
    UnknownDiscriminator(u8),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// The peer stopped reading and the write deadline passed.
    #[error("write stalled after {written} of {len} bytes")]
    Stalled { written: usize, len: usize },
}

impl FrameError {
    /// Classify this error for the owning loop.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrameError::Truncated { .. } | FrameError::UnknownDiscriminator(_) => {
                ErrorKind::Malformed
            }
            FrameError::Io(err) => classify_io(err),
            FrameError::ConnectionClosed => ErrorKind::ConnectionLost,
            // A partial frame leaves the stream out of sync.
            FrameError::Stalled { written: 0, .. } => ErrorKind::Transient,
            FrameError::Stalled { .. } => ErrorKind::ConnectionLost,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
