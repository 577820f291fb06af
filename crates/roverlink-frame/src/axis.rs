//! Input axis shaping.
//!
//! Raw joystick axes arrive in `-32768..=32767`. Drive axes are rescaled to
//! the rover's motor ranges and dead-zoned in output units; arm axes are
//! normalized to `[-1, 1]` and dead-zoned in normalized units.

use serde::{Deserialize, Serialize};

use crate::control::DriveFrame;

/// Full-scale magnitude of a raw joystick axis.
pub const AXIS_FULL_SCALE: f64 = 32768.0;

/// Dead-zone applied to normalized arm axes.
pub const ARM_DEAD_ZONE: f32 = 0.10;

/// Linearly map `value` from `[in_min, in_max]` onto `[out_min, out_max]`.
///
/// Inverted output ranges (`out_min > out_max`) flip the axis. A degenerate
/// input range maps everything to `out_min`.
pub fn translate(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    let in_span = in_max - in_min;
    if in_span == 0.0 {
        return out_min;
    }
    let scaled = (value - in_min) / in_span;
    out_min + scaled * (out_max - out_min)
}

/// Zero out `value` when its magnitude is below `threshold`.
pub fn dead_zone(value: f64, threshold: f64) -> f64 {
    if value.abs() < threshold {
        0.0
    } else {
        value
    }
}

/// Linear range mapping followed by a dead-zone in output units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisMapping {
    pub in_min: f64,
    pub in_max: f64,
    pub out_min: f64,
    pub out_max: f64,
    pub dead_zone: f64,
}

impl AxisMapping {
    pub fn new(in_min: f64, in_max: f64, out_min: f64, out_max: f64, dead_zone: f64) -> Self {
        Self {
            in_min,
            in_max,
            out_min,
            out_max,
            dead_zone,
        }
    }

    /// 1:1 mapping with the given dead-zone.
    pub fn identity(dead_zone: f64) -> Self {
        Self::new(0.0, 1.0, 0.0, 1.0, dead_zone)
    }

    /// Raw throttle axis to motor duty; pushing the stick forward (negative raw)
    /// drives forward.
    pub fn throttle() -> Self {
        Self::new(-AXIS_FULL_SCALE, AXIS_FULL_SCALE, 255.0, -255.0, 20.0)
    }

    pub fn steering() -> Self {
        Self::new(-AXIS_FULL_SCALE, AXIS_FULL_SCALE, -100.0, 100.0, 20.0)
    }

    pub fn apply(&self, value: f64) -> f64 {
        let mapped = translate(value, self.in_min, self.in_max, self.out_min, self.out_max);
        dead_zone(mapped, self.dead_zone)
    }
}

impl Default for AxisMapping {
    fn default() -> Self {
        Self::identity(0.0)
    }
}

/// Raw drive axes as read from the input device.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriveInput {
    pub throttle: f64,
    pub steering: f64,
}

impl DriveInput {
    pub fn new(throttle: f64, steering: f64) -> Self {
        Self { throttle, steering }
    }
}

/// Turns [`DriveInput`] into a [`DriveFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveShaping {
    pub throttle: AxisMapping,
    pub steering: AxisMapping,
}

impl DriveShaping {
    /// Pass values through unscaled, dead-zoned at `dead_zone`.
    pub fn identity(dead_zone: f64) -> Self {
        Self {
            throttle: AxisMapping::identity(dead_zone),
            steering: AxisMapping::identity(dead_zone),
        }
    }

    pub fn shape(&self, input: DriveInput, autonomy: bool) -> DriveFrame {
        DriveFrame::new(
            autonomy,
            to_i16(self.throttle.apply(input.throttle)),
            to_i16(self.steering.apply(input.steering)),
        )
    }
}

impl Default for DriveShaping {
    fn default() -> Self {
        Self {
            throttle: AxisMapping::throttle(),
            steering: AxisMapping::steering(),
        }
    }
}

/// Truncate toward zero and clamp into the i16 range. NaN becomes zero.
fn to_i16(value: f64) -> i16 {
    if value.is_nan() {
        return 0;
    }
    value.trunc().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// Normalize a raw arm axis to `[-1, 1]` with the arm dead-zone applied.
pub fn normalize_axis(raw: i32) -> f32 {
    let value = (raw as f32 / AXIS_FULL_SCALE as f32).clamp(-1.0, 1.0);
    if value.abs() < ARM_DEAD_ZONE {
        0.0
    } else {
        value
    }
}
