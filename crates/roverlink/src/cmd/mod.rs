use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clap::{Args, Subcommand};
use roverlink_link::{stop_pair, LinkConfig, StopHandle, StopSignal};
use roverlink_transport::Endpoint;

use crate::exit::{link_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod base;
pub mod rover;
pub mod route;
pub mod station;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the base-station link manager and print inbound events.
    Base(BaseArgs),
    /// Run the rover-side gateway with simulated sensors.
    Rover(RoverArgs),
    /// Run the science-station endpoint with simulated readings.
    Station(StationArgs),
    /// Upload a route to the rover once.
    Route(RouteArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    match command {
        Command::Base(args) => base::run(args, format, config),
        Command::Rover(args) => rover::run(args, format, config),
        Command::Station(args) => station::run(args, format, config),
        Command::Route(args) => route::run(args, format, config),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct BaseArgs {
    /// Rover address for the drive and route channels (ports from config).
    #[arg(long, env = "ROVERLINK_ROVER_HOST")]
    pub rover_host: Option<String>,
    /// Arm controller endpoint (host:port).
    #[arg(long)]
    pub arm: Option<Endpoint>,
    /// Science station endpoint (host:port).
    #[arg(long)]
    pub science: Option<Endpoint>,
    /// Raw throttle axis value to hold (before shaping).
    #[arg(long, allow_hyphen_values = true)]
    pub throttle: Option<f64>,
    /// Raw steering axis value to hold (before shaping).
    #[arg(long, allow_hyphen_values = true)]
    pub steering: Option<f64>,
    /// Raw arm axes to hold, six comma-separated values in joint order.
    #[arg(long, value_name = "AXES", allow_hyphen_values = true)]
    pub arm_axes: Option<String>,
    /// Queue a picture request for the science station.
    #[arg(long)]
    pub picture: bool,
    /// Queue a camera focus command for the science station.
    #[arg(long, value_name = "POSITION", allow_hyphen_values = true)]
    pub focus: Option<i32>,
    /// Latch the emergency stop before the first drive frame.
    #[arg(long)]
    pub estop: bool,
    /// Enable autonomy and upload --route on start.
    #[arg(long, requires = "route")]
    pub autonomy: bool,
    /// Route as `lat,lng;lat,lng;...`.
    #[arg(long, allow_hyphen_values = true)]
    pub route: Option<String>,
    /// Stop after this long (e.g. 30s, 500ms).
    #[arg(long)]
    pub duration: Option<String>,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct RoverArgs {
    /// Address to bind both listeners on.
    #[arg(long)]
    pub bind_host: Option<String>,
    /// Drive/telemetry UDP port.
    #[arg(long)]
    pub drive_port: Option<u16>,
    /// Route TCP port.
    #[arg(long)]
    pub route_port: Option<u16>,
    /// Stop after this long (e.g. 30s, 500ms).
    #[arg(long)]
    pub duration: Option<String>,
}

#[derive(Args, Debug)]
pub struct StationArgs {
    /// Address to bind the science listener on.
    #[arg(long)]
    pub bind_host: Option<String>,
    /// Science TCP port.
    #[arg(long)]
    pub port: Option<u16>,
    /// Interval between published readings (e.g. 250ms).
    #[arg(long)]
    pub publish_interval: Option<String>,
    /// Stop after this long (e.g. 30s, 500ms).
    #[arg(long)]
    pub duration: Option<String>,
}

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Route as `lat,lng;lat,lng;...`.
    #[arg(long, allow_hyphen_values = true)]
    pub route: String,
    /// Rover route endpoint (host:port). Default: from config.
    #[arg(long)]
    pub rover: Option<Endpoint>,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Parse `lat,lng;lat,lng;...` into coordinate pairs.
pub(crate) fn parse_route(input: &str) -> CliResult<Vec<(f32, f32)>> {
    let mut route = Vec::new();
    for point in input.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (lat, lng) = point
            .split_once(',')
            .ok_or_else(|| CliError::usage(format!("waypoint {point:?} is not lat,lng")))?;
        let lat = parse_coordinate(lat, point)?;
        let lng = parse_coordinate(lng, point)?;
        route.push((lat, lng));
    }

    if route.is_empty() {
        return Err(CliError::usage("route must contain at least one waypoint"));
    }
    Ok(route)
}

/// Parse six comma-separated raw arm axis values.
pub(crate) fn parse_arm_axes(input: &str) -> CliResult<[i32; 6]> {
    let values = input
        .split(',')
        .map(|value| {
            value
                .trim()
                .parse::<i32>()
                .map_err(|_| CliError::usage(format!("invalid arm axis value {value:?}")))
        })
        .collect::<CliResult<Vec<i32>>>()?;
    let count = values.len();
    values
        .try_into()
        .map_err(|_| CliError::usage(format!("expected 6 arm axes, got {count}")))
}

fn parse_coordinate(text: &str, point: &str) -> CliResult<f32> {
    match text.trim().parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(CliError::new(
            USAGE,
            format!("invalid coordinate {text:?} in waypoint {point:?}"),
        )),
    }
}

pub(crate) fn parse_optional_duration(input: Option<&str>) -> CliResult<Option<Duration>> {
    input.map(parse_duration).transpose()
}

/// Stop signal fired by Ctrl-C, or after `limit` when given.
pub(crate) fn install_stop_handler(limit: Option<Duration>) -> CliResult<StopSignal> {
    let (handle, signal) = stop_pair();
    let handle = Arc::new(Mutex::new(handle));

    let on_signal = Arc::clone(&handle);
    ctrlc::set_handler(move || fire(&on_signal)).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })?;

    if let Some(limit) = limit {
        std::thread::Builder::new()
            .name("roverlink-timer".to_string())
            .spawn(move || {
                std::thread::sleep(limit);
                fire(&handle);
            })
            .map_err(|err| CliError::new(INTERNAL, format!("timer setup failed: {err}")))?;
    }

    Ok(signal)
}

fn fire(handle: &Mutex<StopHandle>) {
    handle.lock().unwrap_or_else(PoisonError::into_inner).stop();
}

pub(crate) fn load_link_config(path: Option<&Path>) -> CliResult<LinkConfig> {
    match path {
        Some(path) => LinkConfig::from_json_file(path).map_err(|err| link_error("config", err)),
        None => Ok(LinkConfig::default()),
    }
}
