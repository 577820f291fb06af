#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use roverlink::frame::{DriveFrame, ScienceCommand, ScienceReader, TelemetryFrame, WireFrame};

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    listener.local_addr().expect("local addr").port()
}

fn free_udp_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind should succeed");
    socket.local_addr().expect("local addr").port()
}

fn roverlink() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_roverlink"));
    command.env_remove("ROVERLINK_CONFIG");
    command.arg("--log-level").arg("error").arg("--format").arg("json");
    command
}

fn wait_for_listener(addr: SocketAddr, timeout: Duration) -> TcpStream {
    let start = Instant::now();
    loop {
        if let Ok(stream) = TcpStream::connect(addr) {
            return stream;
        }
        if start.elapsed() >= timeout {
            panic!("connect timeout");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn finish(child: Child) -> String {
    let output = child.wait_with_output().expect("child should exit");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn rover_answers_drive_frames_and_accepts_routes() {
    let drive_port = free_udp_port();
    let route_port = free_port();
    let child = roverlink()
        .arg("rover")
        .arg("--bind-host")
        .arg("127.0.0.1")
        .arg("--drive-port")
        .arg(drive_port.to_string())
        .arg("--route-port")
        .arg(route_port.to_string())
        .arg("--duration")
        .arg("2s")
        .stdout(Stdio::piped())
        .spawn()
        .expect("rover should start");

    let route_addr: SocketAddr = format!("127.0.0.1:{route_port}").parse().expect("addr");
    drop(wait_for_listener(route_addr, Duration::from_secs(3)));

    let base = UdpSocket::bind("127.0.0.1:0").expect("bind should succeed");
    base.set_read_timeout(Some(Duration::from_secs(1)))
        .expect("timeout should set");
    base.send_to(
        &DriveFrame::new(false, 150, -50).to_bytes(),
        ("127.0.0.1", drive_port),
    )
    .expect("send should succeed");

    let mut buf = [0u8; 64];
    let (n, from) = base.recv_from(&mut buf).expect("telemetry should arrive");
    assert_eq!(from.port(), drive_port);
    let telemetry = TelemetryFrame::decode(&buf[..n]).expect("telemetry should decode");
    assert!(telemetry.latitude != 0.0);

    let upload = roverlink()
        .arg("route")
        .arg("--rover")
        .arg(route_addr.to_string())
        .arg("--route")
        .arg("1.5,2.5;3.5,4.5")
        .output()
        .expect("route should run");
    assert!(upload.status.success());

    let stdout = finish(child);
    assert!(stdout.contains("\"record\":\"drive\""));
    assert!(stdout.contains("\"throttle\":150"));
    assert_eq!(stdout.matches("\"record\":\"waypoint\"").count(), 2);
    assert!(stdout.contains("\"more_follow\":false"));
}

#[test]
fn station_publishes_reports_and_prints_commands() {
    let port = free_port();
    let child = roverlink()
        .arg("station")
        .arg("--bind-host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--publish-interval")
        .arg("50ms")
        .arg("--duration")
        .arg("1500ms")
        .stdout(Stdio::piped())
        .spawn()
        .expect("station should start");

    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().expect("addr");
    let mut stream = wait_for_listener(addr, Duration::from_secs(3));
    stream
        .write_all(&ScienceCommand::cam_focus(1200).to_bytes())
        .expect("write should succeed");
    stream
        .set_read_timeout(Some(Duration::from_millis(200)))
        .expect("timeout should set");

    let mut reader = ScienceReader::new(stream);
    let deadline = Instant::now() + Duration::from_secs(2);
    let report = loop {
        if let Some(report) = reader.poll_frame().expect("report should decode") {
            break report;
        }
        assert!(Instant::now() < deadline, "no report received");
    };
    assert!(report.timestamp > 0);

    let stdout = finish(child);
    assert!(stdout.contains("\"record\":\"command\""));
    assert!(stdout.contains("\"position\":1200"));
}
