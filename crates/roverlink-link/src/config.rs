use std::path::Path;
use std::time::Duration;

use roverlink_frame::DriveShaping;
use roverlink_transport::Endpoint;
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::session::ReconnectPolicy;

pub const DEFAULT_ROVER_HOST: &str = "192.168.0.40";
pub const DEFAULT_DRIVE_PORT: u16 = 8840;
pub const DEFAULT_ROUTE_PORT: u16 = 8841;
pub const DEFAULT_ARM_HOST: &str = "192.168.0.80";
pub const DEFAULT_ARM_PORT: u16 = 53204;
pub const DEFAULT_SCIENCE_HOST: &str = "192.168.0.90";
pub const DEFAULT_SCIENCE_PORT: u16 = 5000;

/// Base-station link configuration.
///
/// Every field has a default, so a JSON file only needs the overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Rover drive channel (UDP).
    pub drive: Endpoint,
    /// Arm controller (UDP).
    pub arm: Endpoint,
    /// Science station (TCP).
    pub science: Endpoint,
    /// Rover route listener (TCP).
    pub autonomous: Endpoint,
    pub tick_interval_ms: u64,
    pub event_capacity: usize,
    /// Science commands held while the station is unreachable.
    pub command_capacity: usize,
    pub reconnect: ReconnectPolicy,
    pub shaping: DriveShaping,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            drive: Endpoint::new(DEFAULT_ROVER_HOST, DEFAULT_DRIVE_PORT),
            arm: Endpoint::new(DEFAULT_ARM_HOST, DEFAULT_ARM_PORT),
            science: Endpoint::new(DEFAULT_SCIENCE_HOST, DEFAULT_SCIENCE_PORT),
            autonomous: Endpoint::new(DEFAULT_ROVER_HOST, DEFAULT_ROUTE_PORT),
            tick_interval_ms: 10,
            event_capacity: 256,
            command_capacity: 32,
            reconnect: ReconnectPolicy::default(),
            shaping: DriveShaping::default(),
        }
    }
}

impl LinkConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| LinkError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Point every channel at one host, keeping the configured ports.
    pub fn with_rover_host(mut self, host: &str) -> Self {
        self.drive.host = host.to_string();
        self.autonomous.host = host.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = LinkConfig::default();
        assert_eq!(config.drive.to_string(), "192.168.0.40:8840");
        assert_eq!(config.autonomous.to_string(), "192.168.0.40:8841");
        assert_eq!(config.arm.to_string(), "192.168.0.80:53204");
        assert_eq!(config.science.to_string(), "192.168.0.90:5000");
        assert_eq!(config.tick_interval(), Duration::from_millis(10));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = LinkConfig::from_json_str(
            r#"{"science": {"host": "127.0.0.1", "port": 6000}, "reconnect": {"backoff_ms": 100}}"#,
        )
        .unwrap();
        assert_eq!(config.science, Endpoint::new("127.0.0.1", 6000));
        assert_eq!(config.reconnect.backoff_ms, 100);
        assert_eq!(config.reconnect.initial_attempts, 5);
        assert_eq!(config.drive, LinkConfig::default().drive);
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = LinkConfig::from_json_str("{").unwrap_err();
        assert_eq!(err.kind(), roverlink_transport::ErrorKind::Malformed);
    }

    #[test]
    fn missing_file_names_path() {
        let err = LinkConfig::from_json_file("/nonexistent/roverlink.json").unwrap_err();
        assert!(matches!(err, LinkError::ConfigRead { .. }));
        assert!(err.to_string().contains("/nonexistent/roverlink.json"));
    }

    #[test]
    fn rover_host_override() {
        let config = LinkConfig::default().with_rover_host("10.1.1.1");
        assert_eq!(config.drive.host, "10.1.1.1");
        assert_eq!(config.autonomous.host, "10.1.1.1");
        assert_eq!(config.arm, LinkConfig::default().arm);
    }
}
