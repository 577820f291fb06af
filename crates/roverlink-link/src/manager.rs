//! Owner of every base-station link task.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use roverlink_frame::{ArmFrame, DriveInput, ScienceCommand};
use roverlink_transport::UdpEndpoint;
use tracing::{debug, info, warn};

use crate::arm::{ArmControl, ArmProtocol};
use crate::autonomous::{AutonomousSession, RouteProvider};
use crate::config::LinkConfig;
use crate::drive::{DriveControl, DriveProtocol};
use crate::error::{LinkError, Result};
use crate::event::{event_channel, EventSender, LinkEvent};
use crate::science::ScienceSession;
use crate::session::{ReconnectingSession, TcpConnector};
use crate::stop::{stop_pair, SocketSlot, StopHandle, StopSignal};

/// One link thread plus what is needed to stop it.
struct LinkTask {
    name: &'static str,
    stop: StopHandle,
    socket: SocketSlot,
    join: Option<JoinHandle<()>>,
}

impl LinkTask {
    fn spawn<F>(name: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce(StopSignal, SocketSlot) + Send + 'static,
    {
        let (stop, signal) = stop_pair();
        let socket = SocketSlot::new();
        let task_socket = socket.clone();
        let join = std::thread::Builder::new()
            .name(format!("roverlink-{name}"))
            .spawn(move || body(signal, task_socket))
            .map_err(|source| LinkError::Spawn { name, source })?;
        debug!(task = name, "task started");
        Ok(Self {
            name,
            stop,
            socket,
            join: Some(join),
        })
    }

    fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Close the task's stream, then stop and join it. Safe to repeat.
    fn shutdown(&mut self) {
        self.socket.shutdown();
        self.stop.stop();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!(task = self.name, "task panicked");
            } else {
                debug!(task = self.name, "task joined");
            }
        }
    }
}

/// Runs the drive, arm, science and autonomous links.
pub struct LinkManager {
    config: LinkConfig,
    route: Arc<dyn RouteProvider>,
    drive: DriveControl,
    arm: ArmControl,
    events: EventSender,
    events_rx: Receiver<LinkEvent>,
    commands: Sender<ScienceCommand>,
    commands_rx: Receiver<ScienceCommand>,
    tasks: Vec<LinkTask>,
    autonomous: Option<LinkTask>,
}

impl LinkManager {
    pub fn new(config: LinkConfig, route: impl RouteProvider + 'static) -> Self {
        let (events, events_rx) = event_channel(config.event_capacity);
        let (commands, commands_rx) = bounded(config.command_capacity.max(1));
        Self {
            config,
            route: Arc::new(route),
            drive: DriveControl::new(),
            arm: ArmControl::new(),
            events,
            events_rx,
            commands,
            commands_rx,
            tasks: Vec::new(),
            autonomous: None,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Launch the drive, arm and science tasks. No-op if already running.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let interval = self.config.tick_interval();

        let drive_dest = self.config.drive.resolve()?;
        let mut drive =
            DriveProtocol::new(self.drive.clone(), self.config.shaping, self.events.clone())
                .into_channel(UdpEndpoint::bind_ephemeral()?, drive_dest, interval);

        let arm_dest = self.config.arm.resolve()?;
        let mut arm = ArmProtocol::new(self.arm.clone()).into_channel(
            UdpEndpoint::bind_ephemeral()?,
            arm_dest,
            interval,
        );

        let policy = self.config.reconnect;
        let connector = TcpConnector::new(self.config.science.clone(), policy.connect_timeout());
        let commands = self.commands_rx.clone();
        let events = self.events.clone();

        self.tasks.push(LinkTask::spawn("drive", move |stop, _| drive.run(&stop))?);
        self.tasks.push(LinkTask::spawn("arm", move |stop, _| arm.run(&stop))?);
        self.tasks.push(LinkTask::spawn("science", move |stop, slot| {
            let session = ReconnectingSession::with_slot(connector, policy, slot);
            ScienceSession::new(session, commands, events, interval).run(&stop);
        })?);

        info!(
            drive = %self.config.drive,
            arm = %self.config.arm,
            science = %self.config.science,
            "link manager started"
        );
        Ok(())
    }

    /// Set the drive autonomy flag; when enabling, upload the route unless an
    /// upload is already in flight.
    ///
    /// Returns `true` if an upload was launched.
    pub fn enable_autonomy(&mut self, enabled: bool) -> Result<bool> {
        self.drive.set_autonomy(enabled);
        if !enabled {
            return Ok(false);
        }

        if let Some(task) = self.autonomous.as_mut() {
            if !task.is_finished() {
                debug!("route upload already running");
                return Ok(false);
            }
            task.shutdown();
        }

        let connector = TcpConnector::new(
            self.config.autonomous.clone(),
            self.config.reconnect.connect_timeout(),
        );
        let events = self.events.clone();
        let route = Arc::clone(&self.route);
        self.autonomous = Some(LinkTask::spawn("autonomous", move |_stop, slot| {
            let mut session = AutonomousSession::with_slot(connector, events, slot);
            // Failures are reported as connectivity events.
            let _ = session.run_once(route.as_ref());
        })?);
        Ok(true)
    }

    /// Close open streams, stop every task and join it. Idempotent.
    pub fn shutdown(&mut self) {
        if self.autonomous.is_none() && self.tasks.is_empty() {
            return;
        }
        if let Some(task) = self.autonomous.as_mut() {
            task.shutdown();
        }
        self.autonomous = None;
        for task in self.tasks.iter_mut().rev() {
            task.shutdown();
        }
        self.tasks.clear();
        info!("link manager stopped");
    }

    pub fn events(&self) -> &Receiver<LinkEvent> {
        &self.events_rx
    }

    pub fn drive(&self) -> &DriveControl {
        &self.drive
    }

    pub fn arm(&self) -> &ArmControl {
        &self.arm
    }

    pub fn set_drive_input(&self, input: DriveInput) {
        self.drive.set_input(input);
    }

    pub fn emergency_stop(&self) {
        self.drive.emergency_stop();
    }

    pub fn set_arm_frame(&self, frame: ArmFrame) {
        self.arm.set(frame);
    }

    /// Queue a command for the science station. Returns `false` if the queue
    /// is full.
    pub fn send_science(&self, command: ScienceCommand) -> bool {
        match self.commands.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) | Err(TrySendError::Disconnected(command)) => {
                warn!(?command, "science command queue full, dropping");
                false
            }
        }
    }
}

impl Drop for LinkManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
