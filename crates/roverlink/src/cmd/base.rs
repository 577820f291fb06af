use std::path::Path;
use std::time::Duration;

use roverlink_frame::{ArmFrame, DriveInput, ScienceCommand};
use roverlink_link::{LinkConfig, LinkManager};

use crate::cmd::{
    install_stop_handler, load_link_config, parse_arm_axes, parse_optional_duration, parse_route,
    BaseArgs,
};
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_event, OutputFormat};

const EVENT_POLL: Duration = Duration::from_millis(50);

pub fn run(args: BaseArgs, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    let config = apply_overrides(load_link_config(config)?, &args);
    let route = match args.route.as_deref() {
        Some(route) => parse_route(route)?,
        None => Vec::new(),
    };
    let arm_axes = args.arm_axes.as_deref().map(parse_arm_axes).transpose()?;
    let limit = parse_optional_duration(args.duration.as_deref())?;
    let stop = install_stop_handler(limit)?;

    let mut manager = LinkManager::new(config, move || route.clone());
    if args.estop {
        manager.emergency_stop();
    }
    if args.throttle.is_some() || args.steering.is_some() {
        manager.set_drive_input(DriveInput {
            throttle: args.throttle.unwrap_or(0.0),
            steering: args.steering.unwrap_or(0.0),
        });
    }
    if let Some(raw) = arm_axes {
        manager.set_arm_frame(ArmFrame::from_raw_axes(raw));
    }
    if args.picture {
        manager.send_science(ScienceCommand::picture_request());
    }
    if let Some(position) = args.focus {
        manager.send_science(ScienceCommand::cam_focus(position));
    }

    manager
        .start()
        .map_err(|err| link_error("link start failed", err))?;
    if args.autonomy {
        manager
            .enable_autonomy(true)
            .map_err(|err| link_error("autonomy failed", err))?;
    }

    let mut printed = 0usize;
    while !stop.is_stopped() {
        let Ok(event) = manager.events().recv_timeout(EVENT_POLL) else {
            continue;
        };
        print_event(&event, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    manager.shutdown();
    Ok(SUCCESS)
}

fn apply_overrides(mut config: LinkConfig, args: &BaseArgs) -> LinkConfig {
    if let Some(host) = args.rover_host.as_deref() {
        config = config.with_rover_host(host);
    }
    if let Some(arm) = &args.arm {
        config.arm = arm.clone();
    }
    if let Some(science) = &args.science {
        config.science = science.clone();
    }
    config
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cmd::Command;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        command: Command,
    }

    fn base_args(argv: &[&str]) -> BaseArgs {
        let mut full = vec!["roverlink", "base"];
        full.extend_from_slice(argv);
        match Harness::try_parse_from(full).unwrap().command {
            Command::Base(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn overrides_replace_configured_endpoints() {
        let args = base_args(&[
            "--rover-host",
            "10.0.0.2",
            "--science",
            "127.0.0.1:6000",
        ]);
        let config = apply_overrides(LinkConfig::default(), &args);
        assert_eq!(config.drive.to_string(), "10.0.0.2:8840");
        assert_eq!(config.autonomous.to_string(), "10.0.0.2:8841");
        assert_eq!(config.science.to_string(), "127.0.0.1:6000");
        assert_eq!(config.arm, LinkConfig::default().arm);
    }

    #[test]
    fn negative_axis_values_parse() {
        let args = base_args(&["--throttle", "-32768", "--steering", "-5"]);
        assert_eq!(args.throttle, Some(-32768.0));
        assert_eq!(args.steering, Some(-5.0));
    }

    #[test]
    fn arm_axes_accept_negative_values() {
        let args = base_args(&["--arm-axes", "-32768,0,0,0,0,16384"]);
        let raw = parse_arm_axes(args.arm_axes.as_deref().unwrap()).unwrap();
        let frame = ArmFrame::from_raw_axes(raw);
        assert_eq!(frame.base_rotation, -1.0);
        assert_eq!(frame.grip, 0.5);
    }

    #[test]
    fn autonomy_requires_route() {
        let mut full = vec!["roverlink", "base", "--autonomy"];
        assert!(Harness::try_parse_from(full.clone()).is_err());
        full.extend_from_slice(&["--route", "1,2"]);
        assert!(Harness::try_parse_from(full).is_ok());
    }
}
