use std::io::{ErrorKind, Read};
use std::marker::PhantomData;

use bytes::{Buf, BytesMut};

use crate::codec::WireFrame;
use crate::error::{FrameError, Result};
use crate::science::{ScienceCommand, ScienceMessage};
use crate::waypoint::Waypoint;

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 1024;

/// Reassembles complete frames from a byte stream.
///
/// Works over blocking and non-blocking streams alike: partial reads are
/// buffered, and on a non-blocking stream [`FrameReader::poll_frame`]
/// returns `Ok(None)` until a whole frame is available.
pub struct FrameReader<T, F> {
    inner: T,
    buf: BytesMut,
    _frame: PhantomData<fn() -> F>,
}

/// Science station reports arriving at the base station.
pub type ScienceReader<T> = FrameReader<T, ScienceMessage>;

/// Science commands arriving at the science station.
pub type CommandReader<T> = FrameReader<T, ScienceCommand>;

/// Waypoints arriving at the rover.
pub type WaypointReader<T> = FrameReader<T, Waypoint>;

impl<T: Read, F: WireFrame> FrameReader<T, F> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            _frame: PhantomData,
        }
    }

    /// Return the next complete frame, or `None` if the stream has no more
    /// data right now.
    ///
    /// An unknown discriminator drops everything buffered so the stream can
    /// resynchronize on the next write. EOF is `FrameError::ConnectionClosed`.
    pub fn poll_frame(&mut self) -> Result<Option<F>> {
        loop {
            if let Some(frame) = self.decode_buffered()? {
                return Ok(Some(frame));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    fn decode_buffered(&mut self) -> Result<Option<F>> {
        if self.buf.len() < F::MIN_SIZE {
            return Ok(None);
        }
        match F::decode(&self.buf) {
            Ok(frame) => {
                self.buf.advance(frame.wire_size());
                Ok(Some(frame))
            }
            Err(FrameError::Truncated { .. }) => Ok(None),
            Err(err) => {
                self.buf.clear();
                Err(err)
            }
        }
    }

    /// Bytes received but not yet decoded.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
