use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use roverlink_transport::Endpoint;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Rover-side listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind_host: String,
    /// Drive control / telemetry (UDP).
    pub drive_port: u16,
    /// Route upload (TCP).
    pub route_port: u16,
    pub tick_interval_ms: u64,
    pub telemetry_interval_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            drive_port: 8840,
            route_port: 8841,
            tick_interval_ms: 10,
            telemetry_interval_ms: 10,
        }
    }
}

impl GatewayConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }

    pub fn drive_addr(&self) -> Result<SocketAddr> {
        Ok(Endpoint::new(self.bind_host.as_str(), self.drive_port).resolve()?)
    }

    pub fn route_addr(&self) -> Result<SocketAddr> {
        Ok(Endpoint::new(self.bind_host.as_str(), self.route_port).resolve()?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }
}

/// Science-station listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub bind_host: String,
    pub port: u16,
    pub tick_interval_ms: u64,
    /// How often sensor reports are pushed to the base station.
    pub publish_interval_ms: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 5000,
            tick_interval_ms: 10,
            publish_interval_ms: 250,
        }
    }
}

impl StationConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        Ok(Endpoint::new(self.bind_host.as_str(), self.port).resolve()?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path).map_err(|source| GatewayError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&json)?)
}
