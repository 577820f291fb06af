//! Science-station endpoint.
//!
//! Serves one base-station connection at a time: commands read from it are
//! handed to a [`StationSink`], and sensor reports are written back at the
//! publish interval. When the connection drops the station goes back to
//! listening.

use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use roverlink_frame::{CommandReader, FrameWriter, ScienceCommand, ScienceMessage};
use roverlink_link::StopSignal;
use roverlink_transport::{shutdown_stream, ErrorKind, StreamListener};
use tracing::{debug, info, warn};

use crate::config::StationConfig;
use crate::error::Result;

/// Executes commands received from the base station.
pub trait StationSink: Send {
    fn command(&mut self, command: ScienceCommand);
}

/// Produces the sensor reports pushed on each publish interval.
pub trait TelemetrySource: Send {
    fn sample(&mut self) -> Vec<ScienceMessage>;
}

struct StationConnection {
    reader: CommandReader<TcpStream>,
    writer: FrameWriter<TcpStream>,
    peer: SocketAddr,
}

pub struct ScienceStation<K: StationSink> {
    listener: StreamListener,
    connection: Option<StationConnection>,
    sink: K,
    tick_interval: Duration,
    publish_interval: Duration,
}

impl<K: StationSink> ScienceStation<K> {
    pub fn bind(config: &StationConfig, sink: K) -> Result<Self> {
        let listener = StreamListener::bind(config.addr()?)?;
        info!(addr = %listener.local_addr(), "science station ready");
        Ok(Self {
            listener,
            connection: None,
            sink,
            tick_interval: config.tick_interval(),
            publish_interval: config.publish_interval(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.connection.as_ref().map(|c| c.peer)
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Accept a pending connection if idle, then drain inbound commands.
    /// Returns the number of commands handed to the sink.
    pub fn service_tick(&mut self) -> usize {
        if self.connection.is_none() && !self.accept() {
            return 0;
        }
        let Some(connection) = self.connection.as_mut() else {
            return 0;
        };

        let mut handled = 0;
        loop {
            match connection.reader.poll_frame() {
                Ok(Some(command)) => {
                    debug!(?command, "science command received");
                    self.sink.command(command);
                    handled += 1;
                }
                Ok(None) => break,
                Err(err) => match err.kind() {
                    ErrorKind::Malformed => {
                        warn!(peer = %connection.peer, error = %err, "discarding command data");
                    }
                    ErrorKind::Transient => break,
                    ErrorKind::ConnectionLost => {
                        info!(peer = %connection.peer, "base station disconnected");
                        self.close();
                        break;
                    }
                },
            }
        }
        handled
    }

    fn accept(&mut self) -> bool {
        let (stream, peer) = match self.listener.try_accept() {
            Ok(Some(accepted)) => accepted,
            Ok(None) => return false,
            Err(err) => {
                warn!(error = %err, "science accept failed");
                return false;
            }
        };
        let write_half = match stream.try_clone() {
            Ok(clone) => clone,
            Err(err) => {
                warn!(%peer, error = %err, "cannot split science connection");
                shutdown_stream(&stream);
                return false;
            }
        };

        info!(%peer, "base station connected");
        self.connection = Some(StationConnection {
            reader: CommandReader::new(stream),
            writer: FrameWriter::new(write_half),
            peer,
        });
        true
    }

    /// Write one report to the connected base station. Returns `false` when
    /// nobody is connected or the write failed.
    pub fn publish(&mut self, message: &ScienceMessage) -> bool {
        let Some(connection) = self.connection.as_mut() else {
            return false;
        };
        match connection.writer.send(message) {
            Ok(()) => true,
            Err(err) => {
                info!(peer = %connection.peer, error = %err, "report not delivered");
                self.close();
                false
            }
        }
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            shutdown_stream(connection.reader.get_ref());
        }
    }

    /// Serve until stopped, publishing `source` samples while connected.
    pub fn run(&mut self, source: &mut dyn TelemetrySource, stop: &StopSignal) {
        let mut next_publish = Instant::now();

        while !stop.is_stopped() {
            self.service_tick();

            let now = Instant::now();
            if now >= next_publish {
                if self.is_connected() {
                    for message in source.sample() {
                        if !self.publish(&message) {
                            break;
                        }
                    }
                }
                next_publish = now + self.publish_interval;
            }

            if !stop.sleep(self.tick_interval) {
                break;
            }
        }

        self.close();
        info!("science station stopped");
    }
}
