use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::codec::{ensure_len, WireFrame};
use crate::error::Result;

/// Rover telemetry sent back on the drive channel.
///
/// Wire format: 8 × f32 little-endian (32 bytes): potentiometer,
/// magnetometer, drive encoders 1..4, latitude, longitude.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TelemetryFrame {
    pub potentiometer: f32,
    pub magnetometer: f32,
    pub encoders: [f32; 4],
    pub latitude: f32,
    pub longitude: f32,
}

impl TelemetryFrame {
    pub const SIZE: usize = 32;
}

impl WireFrame for TelemetryFrame {
    const MIN_SIZE: usize = Self::SIZE;

    fn wire_size(&self) -> usize {
        Self::SIZE
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_f32_le(self.potentiometer);
        dst.put_f32_le(self.magnetometer);
        for encoder in self.encoders {
            dst.put_f32_le(encoder);
        }
        dst.put_f32_le(self.latitude);
        dst.put_f32_le(self.longitude);
    }

    fn decode(src: &[u8]) -> Result<Self> {
        ensure_len(src, Self::SIZE)?;
        let mut src = src;
        let potentiometer = src.get_f32_le();
        let magnetometer = src.get_f32_le();
        let mut encoders = [0f32; 4];
        for encoder in &mut encoders {
            *encoder = src.get_f32_le();
        }
        Ok(Self {
            potentiometer,
            magnetometer,
            encoders,
            latitude: src.get_f32_le(),
            longitude: src.get_f32_le(),
        })
    }
}
