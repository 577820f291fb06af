//! Rover-side gateway.
//!
//! Drive frames arrive over UDP; the sender of the most recent valid frame
//! becomes the base station that telemetry is sent back to. Routes arrive over
//! a TCP connection, one waypoint frame at a time, until a waypoint with no
//! successor closes the route.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use roverlink_frame::{DriveFrame, TelemetryFrame, Waypoint, WaypointReader, WireFrame};
use roverlink_link::StopSignal;
use roverlink_transport::{
    classify_datagram_io, shutdown_stream, DatagramTransport, ErrorKind, StreamListener,
    UdpEndpoint,
};
use tracing::{debug, info, trace, warn};

use crate::config::GatewayConfig;
use crate::error::Result;

const DATAGRAM_BUFFER: usize = 64;

/// Receives the commands the gateway decodes.
pub trait RoverSink: Send {
    /// Latest drive frame of a service tick.
    fn drive(&mut self, frame: DriveFrame);

    fn waypoint(&mut self, waypoint: Waypoint);

    /// Called after the final waypoint of a route.
    fn route_complete(&mut self) {}
}

/// One reading of the rover's sensors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSample {
    pub potentiometer: f32,
    pub magnetometer: f32,
    pub encoders: [f32; 4],
    /// `None` while the GPS has no fix.
    pub position: Option<(f32, f32)>,
}

/// Supplies sensor readings for outbound telemetry.
pub trait SensorSource: Send {
    fn sample(&mut self) -> SensorSample;
}

/// What one [`RoverGateway::service_tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceReport {
    /// Valid drive frames received; only the last is forwarded.
    pub drive_frames: usize,
    pub waypoints: usize,
    pub route_closed: bool,
}

struct RouteConnection {
    reader: WaypointReader<TcpStream>,
    peer: SocketAddr,
}

impl RouteConnection {
    fn close(self) {
        shutdown_stream(self.reader.get_ref());
    }
}

pub struct RoverGateway<K: RoverSink, S: SensorSource> {
    drive: UdpEndpoint,
    route: StreamListener,
    connection: Option<RouteConnection>,
    base_station: Arc<ArcSwapOption<SocketAddr>>,
    last_drive: Option<DriveFrame>,
    last_position: (f32, f32),
    sink: K,
    sensors: S,
    tick_interval: Duration,
    telemetry_interval: Duration,
    buf: [u8; DATAGRAM_BUFFER],
}

impl<K: RoverSink, S: SensorSource> RoverGateway<K, S> {
    /// Bind the drive socket and the route listener.
    pub fn bind(config: &GatewayConfig, sink: K, sensors: S) -> Result<Self> {
        let drive = UdpEndpoint::bind(config.drive_addr()?)?;
        let route = StreamListener::bind(config.route_addr()?)?;

        info!(
            drive = %drive.local_addr(),
            route = %route.local_addr(),
            "rover gateway ready"
        );

        Ok(Self {
            drive,
            route,
            connection: None,
            base_station: Arc::new(ArcSwapOption::empty()),
            last_drive: None,
            last_position: (0.0, 0.0),
            sink,
            sensors,
            tick_interval: config.tick_interval(),
            telemetry_interval: config.telemetry_interval(),
            buf: [0u8; DATAGRAM_BUFFER],
        })
    }

    pub fn drive_addr(&self) -> SocketAddr {
        self.drive.local_addr()
    }

    pub fn route_addr(&self) -> SocketAddr {
        self.route.local_addr()
    }

    /// Where telemetry is currently sent, if a base station has been heard.
    pub fn base_station(&self) -> Option<SocketAddr> {
        self.base_station.load_full().map(|addr| *addr)
    }

    /// Shared view of the base-station address for other threads.
    pub fn base_station_handle(&self) -> Arc<ArcSwapOption<SocketAddr>> {
        Arc::clone(&self.base_station)
    }

    pub fn last_drive(&self) -> Option<DriveFrame> {
        self.last_drive
    }

    pub fn has_route_connection(&self) -> bool {
        self.connection.is_some()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    /// Drain pending drive datagrams and route frames.
    pub fn service_tick(&mut self) -> ServiceReport {
        let mut report = ServiceReport::default();
        self.service_drive(&mut report);
        self.service_route(&mut report);
        report
    }

    fn service_drive(&mut self, report: &mut ServiceReport) {
        let mut latest: Option<(DriveFrame, SocketAddr)> = None;

        loop {
            match self.drive.try_recv_from(&mut self.buf) {
                Ok((n, from)) => match DriveFrame::decode(&self.buf[..n]) {
                    Ok(frame) => {
                        report.drive_frames += 1;
                        latest = Some((frame, from));
                    }
                    Err(err) => trace!(%from, len = n, error = %err, "dropping drive datagram"),
                },
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    match classify_datagram_io(&err) {
                        ErrorKind::Transient => trace!(error = %err, "drive receive"),
                        _ => debug!(error = %err, "drive receive failed"),
                    }
                    break;
                }
            }
        }

        if let Some((frame, from)) = latest {
            if self.base_station() != Some(from) {
                info!(base_station = %from, "base station address learned");
                self.base_station.store(Some(Arc::new(from)));
            }
            self.last_drive = Some(frame);
            self.sink.drive(frame);
        }
    }

    fn service_route(&mut self, report: &mut ServiceReport) {
        if self.connection.is_none() {
            match self.route.try_accept() {
                Ok(Some((stream, peer))) => {
                    info!(%peer, "route connection accepted");
                    self.connection = Some(RouteConnection {
                        reader: WaypointReader::new(stream),
                        peer,
                    });
                }
                Ok(None) => return,
                Err(err) => {
                    warn!(error = %err, "route accept failed");
                    return;
                }
            }
        }

        let Some(connection) = self.connection.as_mut() else {
            return;
        };

        loop {
            match connection.reader.poll_frame() {
                Ok(Some(waypoint)) => {
                    report.waypoints += 1;
                    self.sink.waypoint(waypoint);
                    if !waypoint.more_follow {
                        self.sink.route_complete();
                        report.route_closed = true;
                        break;
                    }
                }
                Ok(None) => return,
                Err(err) => match err.kind() {
                    ErrorKind::Malformed => {
                        debug!(peer = %connection.peer, error = %err, "discarding route data");
                    }
                    ErrorKind::Transient => return,
                    ErrorKind::ConnectionLost => {
                        info!(peer = %connection.peer, "route connection closed by peer");
                        break;
                    }
                },
            }
        }

        if let Some(connection) = self.connection.take() {
            debug!(peer = %connection.peer, waypoints = report.waypoints, "route connection done");
            connection.close();
        }
    }

    /// Send one telemetry frame to the base station. Returns `false` when no
    /// base station is known yet or the send failed.
    pub fn telemetry_tick(&mut self) -> bool {
        let Some(destination) = self.base_station() else {
            return false;
        };

        let sample = self.sensors.sample();
        if let Some(position) = sample.position {
            self.last_position = position;
        }
        let (latitude, longitude) = self.last_position;
        let frame = TelemetryFrame {
            potentiometer: sample.potentiometer,
            magnetometer: sample.magnetometer,
            encoders: sample.encoders,
            latitude,
            longitude,
        };

        match self.drive.send_to(&frame.to_bytes(), destination) {
            Ok(_) => true,
            Err(err) => {
                trace!(%destination, error = %err, "telemetry send failed");
                false
            }
        }
    }

    /// Service and publish until stopped.
    pub fn run(&mut self, stop: &StopSignal) {
        let mut next_telemetry = Instant::now();

        while !stop.is_stopped() {
            self.service_tick();

            let now = Instant::now();
            if now >= next_telemetry {
                self.telemetry_tick();
                next_telemetry += self.telemetry_interval;
                if next_telemetry < now {
                    next_telemetry = now + self.telemetry_interval;
                }
            }

            if !stop.sleep(self.tick_interval) {
                break;
            }
        }

        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        info!("rover gateway stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::UdpSocket;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        drives: Vec<DriveFrame>,
        waypoints: Vec<Waypoint>,
        routes: usize,
    }

    impl RoverSink for Recorder {
        fn drive(&mut self, frame: DriveFrame) {
            self.drives.push(frame);
        }

        fn waypoint(&mut self, waypoint: Waypoint) {
            self.waypoints.push(waypoint);
        }

        fn route_complete(&mut self) {
            self.routes += 1;
        }
    }

    struct Scripted(Vec<SensorSample>);

    impl SensorSource for Scripted {
        fn sample(&mut self) -> SensorSample {
            if self.0.len() > 1 {
                self.0.remove(0)
            } else {
                self.0.first().copied().unwrap_or_default()
            }
        }
    }

    fn loopback_config() -> GatewayConfig {
        GatewayConfig {
            bind_host: "127.0.0.1".to_string(),
            drive_port: 0,
            route_port: 0,
            ..GatewayConfig::default()
        }
    }

    fn gateway(samples: Vec<SensorSample>) -> RoverGateway<Recorder, Scripted> {
        RoverGateway::bind(&loopback_config(), Recorder::default(), Scripted(samples)).unwrap()
    }

    fn client() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        socket
    }

    fn service_until<K: RoverSink, S: SensorSource>(
        gateway: &mut RoverGateway<K, S>,
        mut done: impl FnMut(&ServiceReport, &RoverGateway<K, S>) -> bool,
    ) -> ServiceReport {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut total = ServiceReport::default();
        while Instant::now() < deadline {
            let report = gateway.service_tick();
            total.drive_frames += report.drive_frames;
            total.waypoints += report.waypoints;
            total.route_closed |= report.route_closed;
            if done(&total, gateway) {
                return total;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached: {total:?}");
    }

    #[test]
    fn drive_frame_teaches_base_station() {
        let mut gateway = gateway(vec![SensorSample::default()]);
        assert!(!gateway.telemetry_tick());

        let station = client();
        let frame = DriveFrame::new(false, 150, -50);
        station
            .send_to(&frame.to_bytes(), gateway.drive_addr())
            .unwrap();

        service_until(&mut gateway, |report, _| report.drive_frames == 1);
        assert_eq!(gateway.base_station(), Some(station.local_addr().unwrap()));
        assert_eq!(gateway.last_drive(), Some(frame));
        assert_eq!(gateway.sink().drives, vec![frame]);
    }

    #[test]
    fn undecodable_datagram_leaves_base_station_unchanged() {
        let mut gateway = gateway(vec![SensorSample::default()]);
        let station = client();
        station
            .send_to(&DriveFrame::new(false, 1, 1).to_bytes(), gateway.drive_addr())
            .unwrap();
        service_until(&mut gateway, |report, _| report.drive_frames == 1);

        let stranger = client();
        stranger.send_to(&[1, 2, 3], gateway.drive_addr()).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let report = gateway.service_tick();

        assert_eq!(report.drive_frames, 0);
        assert_eq!(gateway.base_station(), Some(station.local_addr().unwrap()));
        assert_eq!(gateway.sink().drives.len(), 1);
    }

    #[test]
    fn only_latest_drive_frame_is_forwarded() {
        let mut gateway = gateway(vec![SensorSample::default()]);
        let station = client();
        for throttle in [10, 20, 30] {
            station
                .send_to(
                    &DriveFrame::new(false, throttle, 0).to_bytes(),
                    gateway.drive_addr(),
                )
                .unwrap();
        }
        std::thread::sleep(Duration::from_millis(20));

        service_until(&mut gateway, |report, _| report.drive_frames == 3);
        assert_eq!(gateway.sink().drives, vec![DriveFrame::new(false, 30, 0)]);
    }

    #[test]
    fn telemetry_reaches_base_station_and_keeps_last_fix() {
        let fixed = SensorSample {
            potentiometer: 0.5,
            magnetometer: 90.0,
            encoders: [1.0, 2.0, 3.0, 4.0],
            position: Some((47.6, -122.3)),
        };
        let lost = SensorSample {
            position: None,
            ..fixed
        };
        let mut gateway = gateway(vec![fixed, lost]);

        let station = client();
        station
            .send_to(&DriveFrame::new(false, 0, 0).to_bytes(), gateway.drive_addr())
            .unwrap();
        service_until(&mut gateway, |report, _| report.drive_frames == 1);

        let mut buf = [0u8; 64];
        for _ in 0..2 {
            assert!(gateway.telemetry_tick());
            let (n, from) = station.recv_from(&mut buf).unwrap();
            assert_eq!(from, gateway.drive_addr());
            assert_eq!(n, TelemetryFrame::SIZE);
            let telemetry = TelemetryFrame::decode(&buf[..n]).unwrap();
            assert_eq!(telemetry.magnetometer, 90.0);
            assert_eq!((telemetry.latitude, telemetry.longitude), (47.6, -122.3));
        }
    }

    #[test]
    fn route_is_forwarded_then_connection_closed() {
        let mut gateway = gateway(vec![SensorSample::default()]);
        let mut uploader = TcpStream::connect(gateway.route_addr()).unwrap();
        for waypoint in Waypoint::route(&[(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)]) {
            uploader.write_all(&waypoint.to_bytes()).unwrap();
        }

        let report = service_until(&mut gateway, |report, _| report.route_closed);
        assert_eq!(report.waypoints, 3);
        assert_eq!(gateway.sink().routes, 1);
        assert_eq!(gateway.sink().waypoints[2], Waypoint::new(false, 5.0, 6.0));
        assert!(!gateway.has_route_connection());

        uploader
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut rest = Vec::new();
        assert_eq!(uploader.read_to_end(&mut rest).unwrap(), 0);
    }

    #[test]
    fn dropped_uploader_frees_listener_for_next_route() {
        let mut gateway = gateway(vec![SensorSample::default()]);
        {
            let mut partial = TcpStream::connect(gateway.route_addr()).unwrap();
            partial
                .write_all(&Waypoint::new(true, 1.0, 1.0).to_bytes())
                .unwrap();
        }
        service_until(&mut gateway, |report, gw| {
            report.waypoints == 1 && !gw.has_route_connection()
        });
        assert_eq!(gateway.sink().routes, 0);

        let mut second = TcpStream::connect(gateway.route_addr()).unwrap();
        second
            .write_all(&Waypoint::new(false, 9.0, 9.0).to_bytes())
            .unwrap();
        service_until(&mut gateway, |report, _| report.route_closed);
        assert_eq!(gateway.sink().routes, 1);
        assert_eq!(gateway.sink().waypoints.len(), 2);
    }

    #[test]
    fn run_stops_on_signal() {
        let mut gateway = gateway(vec![SensorSample::default()]);
        let (mut handle, signal) = roverlink_link::stop_pair();
        let worker = std::thread::spawn(move || {
            gateway.run(&signal);
            gateway
        });
        std::thread::sleep(Duration::from_millis(30));
        handle.stop();
        let gateway = worker.join().unwrap();
        assert!(!gateway.has_route_connection());
    }
}
