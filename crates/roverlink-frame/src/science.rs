//! Science station frames.
//!
//! Every science frame starts with the same big-endian header:
//! ```text
//! ┌────────────────────┬──────────────────┬──────────────────┐
//! │ Timestamp (4B)     │ Discriminator    │ Payload          │
//! │ i32 BE, unix secs  │ (1B)             │ (layout per disc)│
//! └────────────────────┴──────────────────┴──────────────────┘
//! ```
//! Inbound (station to base): environment `0x00`, mechanism `0x02`.
//! Outbound (base to station): picture request `0x80`, camera focus `0x81`.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::codec::{ensure_len, WireFrame};
use crate::error::{FrameError, Result};

pub const HEADER_SIZE: usize = 5;

pub const ENVIRONMENT: u8 = 0x00;
pub const MECHANISM: u8 = 0x02;
pub const PICTURE_REQUEST: u8 = 0x80;
pub const CAM_FOCUS: u8 = 0x81;

/// Sub-command byte carried by every camera focus command.
pub const CAM_FOCUS_SET_POSITION: u8 = 0x02;

/// ASCII tag the station expects in a picture request.
pub const PICTURE_TAG: &[u8; 18] = b"I can haz picture?";

const ENVIRONMENT_SIZE: usize = 12;
const MECHANISM_SIZE: usize = 7;
const PICTURE_REQUEST_SIZE: usize = PICTURE_TAG.len() + 1;
const CAM_FOCUS_SIZE: usize = 5;

/// Current unix time truncated to the 4-byte header field.
pub fn unix_timestamp() -> i32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i32)
        .unwrap_or_default()
}

fn split_header(src: &[u8]) -> Result<(i32, u8, &[u8])> {
    ensure_len(src, HEADER_SIZE)?;
    let mut header = &src[..HEADER_SIZE];
    let timestamp = header.get_i32();
    let discriminator = header.get_u8();
    Ok((timestamp, discriminator, &src[HEADER_SIZE..]))
}

/// Payload-length check that reports the full frame size on shortfall.
fn ensure_payload(payload: &[u8], needed: usize) -> Result<()> {
    if payload.len() < needed {
        return Err(FrameError::Truncated {
            needed: HEADER_SIZE + needed,
            available: HEADER_SIZE + payload.len(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EnvironmentReading {
    pub distance: i16,
    pub uv: i32,
    pub thermo_external: i16,
    pub thermo_internal: i16,
    pub humidity: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MechanismReading {
    pub encoders: [i16; 3],
    pub limit_switch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScienceBody {
    Environment(EnvironmentReading),
    Mechanism(MechanismReading),
}

impl ScienceBody {
    pub fn discriminator(&self) -> u8 {
        match self {
            ScienceBody::Environment(_) => ENVIRONMENT,
            ScienceBody::Mechanism(_) => MECHANISM,
        }
    }

    fn payload_size(&self) -> usize {
        match self {
            ScienceBody::Environment(_) => ENVIRONMENT_SIZE,
            ScienceBody::Mechanism(_) => MECHANISM_SIZE,
        }
    }
}

/// Sensor report from the science station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScienceMessage {
    pub timestamp: i32,
    pub body: ScienceBody,
}

impl ScienceMessage {
    pub fn new(timestamp: i32, body: ScienceBody) -> Self {
        Self { timestamp, body }
    }

    /// Stamp `body` with the current time.
    pub fn now(body: ScienceBody) -> Self {
        Self::new(unix_timestamp(), body)
    }
}

impl WireFrame for ScienceMessage {
    const MIN_SIZE: usize = HEADER_SIZE;

    fn wire_size(&self) -> usize {
        HEADER_SIZE + self.body.payload_size()
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i32(self.timestamp);
        dst.put_u8(self.body.discriminator());
        match &self.body {
            ScienceBody::Environment(env) => {
                dst.put_i16(env.distance);
                dst.put_i32(env.uv);
                dst.put_i16(env.thermo_external);
                dst.put_i16(env.thermo_internal);
                dst.put_i16(env.humidity);
            }
            ScienceBody::Mechanism(mech) => {
                for encoder in mech.encoders {
                    dst.put_i16(encoder);
                }
                dst.put_u8(u8::from(mech.limit_switch));
            }
        }
    }

    fn decode(src: &[u8]) -> Result<Self> {
        let (timestamp, discriminator, mut payload) = split_header(src)?;
        let body = match discriminator {
            ENVIRONMENT => {
                ensure_payload(payload, ENVIRONMENT_SIZE)?;
                ScienceBody::Environment(EnvironmentReading {
                    distance: payload.get_i16(),
                    uv: payload.get_i32(),
                    thermo_external: payload.get_i16(),
                    thermo_internal: payload.get_i16(),
                    humidity: payload.get_i16(),
                })
            }
            MECHANISM => {
                ensure_payload(payload, MECHANISM_SIZE)?;
                let mut encoders = [0i16; 3];
                for encoder in &mut encoders {
                    *encoder = payload.get_i16();
                }
                ScienceBody::Mechanism(MechanismReading {
                    encoders,
                    limit_switch: payload.get_u8() != 0,
                })
            }
            other => return Err(FrameError::UnknownDiscriminator(other)),
        };
        Ok(Self { timestamp, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandBody {
    /// Ask the station to capture an image.
    PictureRequest,
    /// Move the camera focus servo to an absolute position.
    CamFocus { position: i32 },
}

impl CommandBody {
    pub fn discriminator(&self) -> u8 {
        match self {
            CommandBody::PictureRequest => PICTURE_REQUEST,
            CommandBody::CamFocus { .. } => CAM_FOCUS,
        }
    }

    fn payload_size(&self) -> usize {
        match self {
            CommandBody::PictureRequest => PICTURE_REQUEST_SIZE,
            CommandBody::CamFocus { .. } => CAM_FOCUS_SIZE,
        }
    }
}

/// Request sent from the base station to the science station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScienceCommand {
    pub timestamp: i32,
    pub body: CommandBody,
}

impl ScienceCommand {
    pub fn new(timestamp: i32, body: CommandBody) -> Self {
        Self { timestamp, body }
    }

    pub fn picture_request() -> Self {
        Self::new(unix_timestamp(), CommandBody::PictureRequest)
    }

    pub fn cam_focus(position: i32) -> Self {
        Self::new(unix_timestamp(), CommandBody::CamFocus { position })
    }
}

impl WireFrame for ScienceCommand {
    const MIN_SIZE: usize = HEADER_SIZE;

    fn wire_size(&self) -> usize {
        HEADER_SIZE + self.body.payload_size()
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i32(self.timestamp);
        dst.put_u8(self.body.discriminator());
        match self.body {
            CommandBody::PictureRequest => {
                dst.put_slice(PICTURE_TAG);
                dst.put_u8(0);
            }
            CommandBody::CamFocus { position } => {
                dst.put_u8(CAM_FOCUS_SET_POSITION);
                dst.put_i32(position);
            }
        }
    }

    fn decode(src: &[u8]) -> Result<Self> {
        let (timestamp, discriminator, mut payload) = split_header(src)?;
        let body = match discriminator {
            PICTURE_REQUEST => {
                ensure_payload(payload, PICTURE_REQUEST_SIZE)?;
                CommandBody::PictureRequest
            }
            CAM_FOCUS => {
                ensure_payload(payload, CAM_FOCUS_SIZE)?;
                let sub = payload.get_u8();
                if sub != CAM_FOCUS_SET_POSITION {
                    return Err(FrameError::UnknownDiscriminator(sub));
                }
                CommandBody::CamFocus {
                    position: payload.get_i32(),
                }
            }
            other => return Err(FrameError::UnknownDiscriminator(other)),
        };
        Ok(Self { timestamp, body })
    }
}
