use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use roverlink_frame::{CommandBody, DriveFrame, ScienceCommand, Waypoint};
use roverlink_link::LinkEvent;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct Record<'a, T: Serialize> {
    record: &'a str,
    timestamp: String,
    #[serde(flatten)]
    data: &'a T,
}

/// Result of a one-shot route upload.
#[derive(Debug, Clone, Serialize)]
pub struct RouteReport {
    pub endpoint: String,
    pub waypoints: usize,
}

fn emit<T: Serialize>(record: &str, data: &T, rows: Vec<(String, String)>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = Record {
                record,
                timestamp: now_unix_seconds(),
                data,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![record.to_uppercase(), "VALUE".to_string()]);
            for (field, value) in rows {
                table.add_row(vec![field, value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields: Vec<String> = rows
                .into_iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect();
            println!("{record} {}", fields.join(" "));
        }
    }
}

pub fn print_event(event: &LinkEvent, format: OutputFormat) {
    let rows = match event {
        LinkEvent::Sensors { link, readings } => {
            let mut rows = vec![("link".to_string(), link.to_string())];
            rows.extend(
                readings
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_string())),
            );
            rows
        }
        LinkEvent::Position {
            latitude,
            longitude,
        } => vec![
            ("latitude".to_string(), latitude.to_string()),
            ("longitude".to_string(), longitude.to_string()),
        ],
        LinkEvent::Connectivity { link, connected } => vec![
            ("link".to_string(), link.to_string()),
            ("connected".to_string(), connected.to_string()),
        ],
    };
    emit("event", event, rows, format);
}

pub fn print_drive(frame: &DriveFrame, format: OutputFormat) {
    let rows = vec![
        ("autonomy".to_string(), frame.autonomy.to_string()),
        ("throttle".to_string(), frame.throttle.to_string()),
        ("steering".to_string(), frame.steering.to_string()),
    ];
    emit("drive", frame, rows, format);
}

pub fn print_waypoint(waypoint: &Waypoint, format: OutputFormat) {
    let rows = vec![
        ("latitude".to_string(), waypoint.latitude.to_string()),
        ("longitude".to_string(), waypoint.longitude.to_string()),
        ("more_follow".to_string(), waypoint.more_follow.to_string()),
    ];
    emit("waypoint", waypoint, rows, format);
}

pub fn print_command(command: &ScienceCommand, format: OutputFormat) {
    let mut rows = vec![("timestamp".to_string(), command.timestamp.to_string())];
    match command.body {
        CommandBody::PictureRequest => {
            rows.push(("command".to_string(), "picture_request".to_string()));
        }
        CommandBody::CamFocus { position } => {
            rows.push(("command".to_string(), "cam_focus".to_string()));
            rows.push(("position".to_string(), position.to_string()));
        }
    }
    emit("command", command, rows, format);
}

pub fn print_route_report(report: &RouteReport, format: OutputFormat) {
    let rows = vec![
        ("endpoint".to_string(), report.endpoint.clone()),
        ("waypoints".to_string(), report.waypoints.to_string()),
    ];
    emit("route", report, rows, format);
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
