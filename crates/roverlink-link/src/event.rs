//! Inbound data delivered to collaborators.
//!
//! Channels publish through an [`EventSender`], which never blocks: when the
//! bounded queue is full the event is dropped and the channel moves on.

use std::collections::BTreeMap;
use std::fmt;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use roverlink_frame::{EnvironmentReading, MechanismReading, TelemetryFrame};
use serde::Serialize;
use tracing::trace;

/// Which link produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Drive,
    Arm,
    Science,
    Autonomous,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Drive => "drive",
            LinkKind::Arm => "arm",
            LinkKind::Science => "science",
            LinkKind::Autonomous => "autonomous",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Float(f32),
    Int(i64),
    Flag(bool),
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Float(v) => write!(f, "{v}"),
            SensorValue::Int(v) => write!(f, "{v}"),
            SensorValue::Flag(v) => write!(f, "{v}"),
        }
    }
}

/// Sensor readings keyed by display name.
pub type SensorMap = BTreeMap<&'static str, SensorValue>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LinkEvent {
    Sensors { link: LinkKind, readings: SensorMap },
    Position { latitude: f32, longitude: f32 },
    Connectivity { link: LinkKind, connected: bool },
}

const DRIVE_ENCODERS: [&str; 4] = [
    "Drive Encoder 1",
    "Drive Encoder 2",
    "Drive Encoder 3",
    "Drive Encoder 4",
];

const SCIENCE_ENCODERS: [&str; 3] = ["Science Encoder 1", "Science Encoder 2", "Science Encoder 3"];

pub fn telemetry_readings(frame: &TelemetryFrame) -> SensorMap {
    let mut readings = SensorMap::new();
    readings.insert("Potentiometer", SensorValue::Float(frame.potentiometer));
    readings.insert("Magnetometer", SensorValue::Float(frame.magnetometer));
    for (name, value) in DRIVE_ENCODERS.into_iter().zip(frame.encoders) {
        readings.insert(name, SensorValue::Float(value));
    }
    readings
}

pub fn environment_readings(env: &EnvironmentReading) -> SensorMap {
    SensorMap::from([
        ("Distance", SensorValue::Int(i64::from(env.distance))),
        ("UV", SensorValue::Int(i64::from(env.uv))),
        (
            "Thermo External",
            SensorValue::Int(i64::from(env.thermo_external)),
        ),
        (
            "Thermo Internal",
            SensorValue::Int(i64::from(env.thermo_internal)),
        ),
        ("Humidity", SensorValue::Int(i64::from(env.humidity))),
    ])
}

pub fn mechanism_readings(mech: &MechanismReading) -> SensorMap {
    let mut readings = SensorMap::new();
    for (name, value) in SCIENCE_ENCODERS.into_iter().zip(mech.encoders) {
        readings.insert(name, SensorValue::Int(i64::from(value)));
    }
    readings.insert("Limit Switch", SensorValue::Flag(mech.limit_switch));
    readings
}

/// Create the bounded event queue shared by all channels.
pub fn event_channel(capacity: usize) -> (EventSender, Receiver<LinkEvent>) {
    let (tx, rx) = bounded(capacity.max(1));
    (EventSender { tx }, rx)
}

/// Non-blocking publisher side of the event queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<LinkEvent>,
}

impl EventSender {
    /// Publish without blocking. Returns `false` if the event was dropped.
    pub fn publish(&self, event: LinkEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                trace!(?event, "event queue full, dropping");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_fan_out_names() {
        let frame = TelemetryFrame {
            potentiometer: 1.5,
            magnetometer: 2.0,
            encoders: [10.0, 11.0, 12.0, 13.0],
            latitude: 1.0,
            longitude: 2.0,
        };
        let readings = telemetry_readings(&frame);
        assert_eq!(readings.len(), 6);
        assert_eq!(readings["Potentiometer"], SensorValue::Float(1.5));
        assert_eq!(readings["Drive Encoder 4"], SensorValue::Float(13.0));
    }

    #[test]
    fn science_maps() {
        let env = environment_readings(&EnvironmentReading {
            distance: 5,
            uv: 70000,
            thermo_external: -3,
            thermo_internal: 20,
            humidity: 33,
        });
        assert_eq!(env["UV"], SensorValue::Int(70000));
        assert_eq!(env["Thermo External"], SensorValue::Int(-3));

        let mech = mechanism_readings(&MechanismReading {
            encoders: [1, 2, 3],
            limit_switch: true,
        });
        assert_eq!(mech.len(), 4);
        assert_eq!(mech["Limit Switch"], SensorValue::Flag(true));
        assert_eq!(mech["Science Encoder 2"], SensorValue::Int(2));
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (tx, rx) = event_channel(1);
        let first = LinkEvent::Position {
            latitude: 1.0,
            longitude: 2.0,
        };
        assert!(tx.publish(first.clone()));
        assert!(!tx.publish(LinkEvent::Connectivity {
            link: LinkKind::Science,
            connected: true,
        }));
        assert_eq!(rx.try_recv().unwrap(), first);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publish_after_receiver_dropped() {
        let (tx, rx) = event_channel(4);
        drop(rx);
        assert!(!tx.publish(LinkEvent::Position {
            latitude: 0.0,
            longitude: 0.0,
        }));
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(LinkEvent::Connectivity {
            link: LinkKind::Autonomous,
            connected: false,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "connectivity", "link": "autonomous", "connected": false})
        );
    }
}
