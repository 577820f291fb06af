//! Science station session.
//!
//! Persistent stream to the science station. Inbound reports become sensor
//! events; queued [`ScienceCommand`]s are written while connected and held
//! otherwise.

use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};
use roverlink_frame::{ScienceBody, ScienceCommand, ScienceMessage};
use tracing::{debug, warn};

use crate::error::LinkError;
use crate::event::{environment_readings, mechanism_readings, EventSender, LinkEvent, LinkKind};
use crate::session::{Connector, PollOutcome, ReconnectingSession, TcpConnector};
use crate::stop::StopSignal;

pub struct ScienceSession<C: Connector = TcpConnector> {
    session: ReconnectingSession<C, ScienceMessage>,
    commands: Receiver<ScienceCommand>,
    events: EventSender,
    interval: Duration,
    reported: Option<bool>,
}

impl<C: Connector> ScienceSession<C> {
    pub fn new(
        session: ReconnectingSession<C, ScienceMessage>,
        commands: Receiver<ScienceCommand>,
        events: EventSender,
        interval: Duration,
    ) -> Self {
        Self {
            session,
            commands,
            events,
            interval,
            reported: None,
        }
    }

    pub fn session(&self) -> &ReconnectingSession<C, ScienceMessage> {
        &self.session
    }

    /// Initial connect using the initial budget.
    pub fn connect(&mut self, stop: &StopSignal) -> crate::Result<()> {
        let attempts = self.session.policy().initial_attempts;
        let result = self.session.connect(attempts, stop);
        self.report_connectivity();
        result
    }

    /// One receive cycle: flush queued commands, poll once, recover if the
    /// failure threshold was reached.
    pub fn tick(&mut self, stop: &StopSignal) {
        if self.session.is_connected() {
            self.flush_commands();
            match self.session.poll() {
                PollOutcome::Message(message) => self.dispatch(message),
                PollOutcome::Idle | PollOutcome::Discarded | PollOutcome::Failed => {}
            }
        }

        if self.session.needs_recovery() {
            if let Err(err) = self.session.recover(stop) {
                debug!(error = %err, "science reconnect failed");
            }
        }
        self.report_connectivity();
    }

    fn flush_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    if let Err(err) = self.session.send(&command) {
                        warn!(error = %err, ?command, "science command not delivered");
                        return;
                    }
                    debug!(?command, "science command sent");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
            }
        }
    }

    fn dispatch(&self, message: ScienceMessage) {
        let readings = match &message.body {
            ScienceBody::Environment(env) => environment_readings(env),
            ScienceBody::Mechanism(mech) => mechanism_readings(mech),
        };
        self.events.publish(LinkEvent::Sensors {
            link: LinkKind::Science,
            readings,
        });
    }

    fn report_connectivity(&mut self) {
        let connected = self.session.is_connected();
        if self.reported != Some(connected) {
            self.reported = Some(connected);
            self.events.publish(LinkEvent::Connectivity {
                link: LinkKind::Science,
                connected,
            });
        }
    }

    /// Connect, then tick until stopped, reconnecting whenever the session
    /// ends up disconnected.
    pub fn run(&mut self, stop: &StopSignal) {
        if let Err(LinkError::Stopped) = self.connect(stop) {
            self.finish();
            return;
        }

        while !stop.is_stopped() {
            if !self.session.is_connected() {
                if !stop.sleep(self.session.policy().backoff()) {
                    break;
                }
                let attempts = self.session.policy().reconnect_attempts;
                let result = self.session.connect(attempts, stop);
                self.report_connectivity();
                if let Err(LinkError::Stopped) = result {
                    break;
                }
                continue;
            }

            self.tick(stop);
            if !stop.sleep(self.interval) {
                break;
            }
        }
        self.finish();
    }

    fn finish(&mut self) {
        self.session.disconnect();
        self.report_connectivity();
    }
}
