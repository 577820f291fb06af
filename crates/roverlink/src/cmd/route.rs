use std::path::Path;

use roverlink_link::{event_channel, AutonomousSession, TcpConnector};

use crate::cmd::{load_link_config, parse_duration, parse_route, RouteArgs};
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_route_report, OutputFormat, RouteReport};

pub fn run(args: RouteArgs, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    let route = parse_route(&args.route)?;
    let timeout = parse_duration(&args.timeout)?;
    let endpoint = match args.rover {
        Some(endpoint) => endpoint,
        None => load_link_config(config)?.autonomous,
    };

    let (events, _rx) = event_channel(4);
    let mut session = AutonomousSession::new(TcpConnector::new(endpoint.clone(), timeout), events);
    let waypoints = session
        .run_once(&move || route.clone())
        .map_err(|err| link_error("route upload failed", err))?;

    print_route_report(
        &RouteReport {
            endpoint: endpoint.to_string(),
            waypoints,
        },
        format,
    );
    Ok(SUCCESS)
}
