//! Control frames sent from the base station every tick.

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::axis::normalize_axis;
use crate::codec::{ensure_len, WireFrame};
use crate::error::Result;

/// Drive control frame: autonomy flag, throttle, steering.
///
/// Wire format (little-endian, 5 bytes):
/// ```text
/// ┌──────────────┬──────────────┬──────────────┐
/// │ Autonomy (1B)│ Throttle     │ Steering     │
/// │ 0 / 1        │ (i16 LE)     │ (i16 LE)     │
/// └──────────────┴──────────────┴──────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DriveFrame {
    pub autonomy: bool,
    pub throttle: i16,
    pub steering: i16,
}

impl DriveFrame {
    pub const SIZE: usize = 5;

    pub fn new(autonomy: bool, throttle: i16, steering: i16) -> Self {
        Self {
            autonomy,
            throttle,
            steering,
        }
    }
}

impl WireFrame for DriveFrame {
    const MIN_SIZE: usize = Self::SIZE;

    fn wire_size(&self) -> usize {
        Self::SIZE
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(u8::from(self.autonomy));
        dst.put_i16_le(self.throttle);
        dst.put_i16_le(self.steering);
    }

    fn decode(src: &[u8]) -> Result<Self> {
        ensure_len(src, Self::SIZE)?;
        let mut src = src;
        Ok(Self {
            autonomy: src.get_u8() != 0,
            throttle: src.get_i16_le(),
            steering: src.get_i16_le(),
        })
    }
}

/// Arm control frame: six joint targets, each normalized to [-1, 1].
///
/// Wire format: 6 × f32 little-endian (24 bytes) in field order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ArmFrame {
    pub base_rotation: f32,
    pub shoulder: f32,
    pub elbow: f32,
    pub wrist_lift: f32,
    pub wrist_rotation: f32,
    pub grip: f32,
}

impl ArmFrame {
    pub const SIZE: usize = 24;

    /// Build from joint values in wire order, clamping each to [-1, 1].
    pub fn from_joints(joints: [f32; 6]) -> Self {
        let [base_rotation, shoulder, elbow, wrist_lift, wrist_rotation, grip] =
            joints.map(|v| if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) });
        Self {
            base_rotation,
            shoulder,
            elbow,
            wrist_lift,
            wrist_rotation,
            grip,
        }
    }

    /// Build from raw joystick axes in wire order.
    pub fn from_raw_axes(raw: [i32; 6]) -> Self {
        Self::from_joints(raw.map(normalize_axis))
    }

    /// Joint values in wire order.
    pub fn joints(&self) -> [f32; 6] {
        [
            self.base_rotation,
            self.shoulder,
            self.elbow,
            self.wrist_lift,
            self.wrist_rotation,
            self.grip,
        ]
    }
}

impl WireFrame for ArmFrame {
    const MIN_SIZE: usize = Self::SIZE;

    fn wire_size(&self) -> usize {
        Self::SIZE
    }

    fn encode(&self, dst: &mut BytesMut) {
        for joint in self.joints() {
            dst.put_f32_le(joint);
        }
    }

    fn decode(src: &[u8]) -> Result<Self> {
        ensure_len(src, Self::SIZE)?;
        let mut src = src;
        let mut joints = [0f32; 6];
        for joint in &mut joints {
            *joint = src.get_f32_le();
        }
        let [base_rotation, shoulder, elbow, wrist_lift, wrist_rotation, grip] = joints;
        Ok(Self {
            base_rotation,
            shoulder,
            elbow,
            wrist_lift,
            wrist_rotation,
            grip,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameError;

    #[test]
    fn drive_frame_layout_is_little_endian() {
        let bytes = DriveFrame::new(true, 0x0102, -2).to_bytes();
        assert_eq!(bytes.as_ref(), &[0x01, 0x02, 0x01, 0xFE, 0xFF]);
    }

    #[test]
    fn drive_frame_boundaries_round_trip() {
        for frame in [
            DriveFrame::new(false, i16::MIN, i16::MAX),
            DriveFrame::new(true, i16::MAX, i16::MIN),
            DriveFrame::new(false, 0, 0),
        ] {
            assert_eq!(DriveFrame::decode(&frame.to_bytes()).unwrap(), frame);
        }
    }

    #[test]
    fn drive_scenario_round_trip() {
        let frame = DriveFrame::new(false, 150, -50);
        let decoded = DriveFrame::decode(&frame.to_bytes()).unwrap();
        assert_eq!(
            (decoded.autonomy, decoded.throttle, decoded.steering),
            (false, 150, -50)
        );
    }

    #[test]
    fn drive_nonzero_flag_byte_is_true() {
        let decoded = DriveFrame::decode(&[0x7F, 0, 0, 0, 0]).unwrap();
        assert!(decoded.autonomy);
    }

    #[test]
    fn drive_truncated() {
        let bytes = DriveFrame::new(true, 1, 1).to_bytes();
        for len in 0..DriveFrame::SIZE {
            let err = DriveFrame::decode(&bytes[..len]).unwrap_err();
            assert!(matches!(err, FrameError::Truncated { needed: 5, .. }));
        }
    }

    #[test]
    fn arm_frame_round_trip_with_negatives() {
        let frame = ArmFrame::from_joints([-1.0, 1.0, -0.5, 0.25, 0.0, -0.125]);
        assert_eq!(ArmFrame::decode(&frame.to_bytes()).unwrap(), frame);
    }

    #[test]
    fn arm_frame_clamps_out_of_range_joints() {
        let frame = ArmFrame::from_joints([3.0, -7.0, f32::NAN, 0.5, 1.0, -1.0]);
        assert_eq!(frame.joints(), [1.0, -1.0, 0.0, 0.5, 1.0, -1.0]);
    }

    #[test]
    fn arm_frame_from_raw_axes_applies_dead_zone() {
        let frame = ArmFrame::from_raw_axes([-32768, 32767, 3000, -16384, 0, 16384]);
        assert_eq!(frame.joints()[0], -1.0);
        assert!(frame.shoulder > 0.999);
        assert_eq!(frame.elbow, 0.0);
        assert_eq!(frame.wrist_lift, -0.5);
        assert_eq!(frame.wrist_rotation, 0.0);
        assert_eq!(frame.grip, 0.5);
    }

    #[test]
    fn arm_truncated() {
        let bytes = ArmFrame::default().to_bytes();
        let err = ArmFrame::decode(&bytes[..23]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                needed: 24,
                available: 23
            }
        ));
    }
}
