use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::codec::{ensure_len, WireFrame};
use crate::error::Result;

/// One point of an autonomous route.
///
/// Wire format (little-endian, 9 bytes): `more_follow` (1B), latitude (f32),
/// longitude (f32). The final waypoint of a route has `more_follow = false`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Waypoint {
    pub more_follow: bool,
    pub latitude: f32,
    pub longitude: f32,
}

impl Waypoint {
    pub const SIZE: usize = 9;

    pub fn new(more_follow: bool, latitude: f32, longitude: f32) -> Self {
        Self {
            more_follow,
            latitude,
            longitude,
        }
    }

    /// Turn `(latitude, longitude)` pairs into waypoints, marking only the
    /// last one as terminal.
    pub fn route(points: &[(f32, f32)]) -> Vec<Waypoint> {
        let last = points.len().saturating_sub(1);
        points
            .iter()
            .enumerate()
            .map(|(i, &(lat, lng))| Waypoint::new(i != last, lat, lng))
            .collect()
    }
}

impl WireFrame for Waypoint {
    const MIN_SIZE: usize = Self::SIZE;

    fn wire_size(&self) -> usize {
        Self::SIZE
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(u8::from(self.more_follow));
        dst.put_f32_le(self.latitude);
        dst.put_f32_le(self.longitude);
    }

    fn decode(src: &[u8]) -> Result<Self> {
        ensure_len(src, Self::SIZE)?;
        let mut src = src;
        Ok(Self {
            more_follow: src.get_u8() != 0,
            latitude: src.get_f32_le(),
            longitude: src.get_f32_le(),
        })
    }
}
