use std::path::Path;

use roverlink_frame::{
    EnvironmentReading, MechanismReading, ScienceBody, ScienceCommand, ScienceMessage,
};
use roverlink_gateway::{ScienceStation, StationConfig, StationSink, TelemetrySource};

use crate::cmd::{install_stop_handler, parse_duration, parse_optional_duration, StationArgs};
use crate::exit::{gateway_error, CliResult, SUCCESS};
use crate::output::{print_command, OutputFormat};

pub fn run(args: StationArgs, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    let mut config = match config {
        Some(path) => {
            StationConfig::from_json_file(path).map_err(|err| gateway_error("config", err))?
        }
        None => StationConfig::default(),
    };
    if let Some(host) = args.bind_host {
        config.bind_host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(interval) = args.publish_interval.as_deref() {
        config.publish_interval_ms = parse_duration(interval)?.as_millis() as u64;
    }

    let limit = parse_optional_duration(args.duration.as_deref())?;
    let stop = install_stop_handler(limit)?;

    let mut station = ScienceStation::bind(&config, PrintSink { format })
        .map_err(|err| gateway_error("bind failed", err))?;
    station.run(&mut SimulatedScience::default(), &stop);

    Ok(SUCCESS)
}

struct PrintSink {
    format: OutputFormat,
}

impl StationSink for PrintSink {
    fn command(&mut self, command: ScienceCommand) {
        print_command(&command, self.format);
    }
}

/// One environment and one mechanism report per sample.
#[derive(Default)]
struct SimulatedScience {
    tick: i16,
}

impl TelemetrySource for SimulatedScience {
    fn sample(&mut self) -> Vec<ScienceMessage> {
        self.tick = (self.tick + 1) % 100;
        let environment = EnvironmentReading {
            distance: 120 + self.tick,
            uv: 3,
            thermo_external: 18,
            thermo_internal: 31,
            humidity: 40 + self.tick / 10,
        };
        let mechanism = MechanismReading {
            encoders: [self.tick, -self.tick, 0],
            limit_switch: self.tick == 0,
        };
        vec![
            ScienceMessage::now(ScienceBody::Environment(environment)),
            ScienceMessage::now(ScienceBody::Mechanism(mechanism)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_has_both_report_kinds() {
        let mut source = SimulatedScience { tick: 98 };
        let first = source.sample();
        assert!(matches!(first[0].body, ScienceBody::Environment(_)));
        assert!(matches!(first[1].body, ScienceBody::Mechanism(_)));

        match source.sample()[1].body {
            ScienceBody::Mechanism(mech) => assert!(mech.limit_switch),
            other => panic!("unexpected body {other:?}"),
        }
    }
}
