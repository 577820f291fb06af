use std::io::{ErrorKind, Write};
use std::time::{Duration, Instant};

use bytes::BytesMut;

use crate::codec::{encode_frame, WireFrame};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 64;

/// How long a write may wait on `WouldBlock` before giving up.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(1);

const STALL_POLL: Duration = Duration::from_millis(1);

/// Writes complete frames to any `Write` stream.
///
/// On a non-blocking stream `send` waits through `WouldBlock` in short
/// sleeps. If the peer accepts nothing for the stall timeout the write fails
/// with [`FrameError::Stalled`].
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    stall_timeout: Duration,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn stall_timeout(&self) -> Duration {
        self.stall_timeout
    }

    /// Encode and write one frame, then flush.
    pub fn send<F: WireFrame>(&mut self, frame: &F) -> Result<()> {
        self.buf.clear();
        encode_frame(frame, &mut self.buf);

        let len = self.buf.len();
        let mut offset = 0usize;
        let mut last_progress = Instant::now();
        while offset < len {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    offset += n;
                    last_progress = Instant::now();
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if last_progress.elapsed() >= self.stall_timeout {
                        return Err(FrameError::Stalled {
                            written: offset,
                            len,
                        });
                    }
                    std::thread::sleep(STALL_POLL);
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush_frame(len)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_frame(0)
    }

    fn flush_frame(&mut self, written: usize) -> Result<()> {
        let started = Instant::now();
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if started.elapsed() >= self.stall_timeout {
                        return Err(FrameError::Stalled {
                            written,
                            len: written,
                        });
                    }
                    std::thread::sleep(STALL_POLL);
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
