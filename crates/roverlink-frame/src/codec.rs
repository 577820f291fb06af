use bytes::{Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// A frame with a fixed binary layout.
///
/// Decoding reads from the front of the buffer and ignores trailing bytes;
/// [`WireFrame::wire_size`] tells stream readers how much was consumed.
pub trait WireFrame: Sized {
    /// Bytes required before the layout can be determined.
    const MIN_SIZE: usize;

    /// Exact encoded size of this frame.
    fn wire_size(&self) -> usize;

    /// Append the encoded frame to `dst`.
    fn encode(&self, dst: &mut BytesMut);

    /// Decode a frame from the front of `src`.
    fn decode(src: &[u8]) -> Result<Self>;

    /// Encode into a fresh buffer.
    fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        self.encode(&mut dst);
        dst.freeze()
    }
}

/// Encode a frame, reserving its full size up front.
pub fn encode_frame<F: WireFrame>(frame: &F, dst: &mut BytesMut) {
    dst.reserve(frame.wire_size());
    frame.encode(dst);
}

/// Decode a frame from the front of `src`.
pub fn decode_frame<F: WireFrame>(src: &[u8]) -> Result<F> {
    F::decode(src)
}

/// Fail with `Truncated` unless `src` holds at least `needed` bytes.
pub(crate) fn ensure_len(src: &[u8], needed: usize) -> Result<()> {
    if src.len() < needed {
        return Err(FrameError::Truncated {
            needed,
            available: src.len(),
        });
    }
    Ok(())
}
