use std::path::Path;

use roverlink_frame::{DriveFrame, Waypoint};
use roverlink_gateway::{GatewayConfig, RoverGateway, RoverSink, SensorSample, SensorSource};

use crate::cmd::{install_stop_handler, parse_optional_duration, RoverArgs};
use crate::exit::{gateway_error, CliResult, SUCCESS};
use crate::output::{print_drive, print_waypoint, OutputFormat};

const HOME: (f32, f32) = (38.4063, -110.7918);

pub fn run(args: RoverArgs, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    let mut config = match config {
        Some(path) => {
            GatewayConfig::from_json_file(path).map_err(|err| gateway_error("config", err))?
        }
        None => GatewayConfig::default(),
    };
    if let Some(host) = args.bind_host {
        config.bind_host = host;
    }
    if let Some(port) = args.drive_port {
        config.drive_port = port;
    }
    if let Some(port) = args.route_port {
        config.route_port = port;
    }

    let limit = parse_optional_duration(args.duration.as_deref())?;
    let stop = install_stop_handler(limit)?;

    let sink = PrintSink {
        format,
        last_drive: None,
    };
    let mut gateway = RoverGateway::bind(&config, sink, SimulatedSensors::default())
        .map_err(|err| gateway_error("bind failed", err))?;
    gateway.run(&stop);

    Ok(SUCCESS)
}

/// Prints drive frames when they change and every waypoint.
struct PrintSink {
    format: OutputFormat,
    last_drive: Option<DriveFrame>,
}

impl RoverSink for PrintSink {
    fn drive(&mut self, frame: DriveFrame) {
        if self.last_drive != Some(frame) {
            self.last_drive = Some(frame);
            print_drive(&frame, self.format);
        }
    }

    fn waypoint(&mut self, waypoint: Waypoint) {
        print_waypoint(&waypoint, self.format);
    }

    fn route_complete(&mut self) {
        tracing::info!("route received");
    }
}

/// Slowly varying readings around a fixed position.
#[derive(Default)]
struct SimulatedSensors {
    tick: u32,
}

impl SensorSource for SimulatedSensors {
    fn sample(&mut self) -> SensorSample {
        self.tick = self.tick.wrapping_add(1);
        let phase = (self.tick % 3600) as f32 / 10.0;
        let travel = self.tick as f32 * 0.01;
        SensorSample {
            potentiometer: phase.to_radians().sin(),
            magnetometer: phase,
            encoders: [travel, travel, travel * 0.98, travel * 0.98],
            position: Some(HOME),
        }
    }
}
