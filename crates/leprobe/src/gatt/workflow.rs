//! Reading the Device Name of one peer
//!
//! [`GattReadWorkflow`] drives a single session from connect to close:
//!
//! ```text
//! Idle -> Connecting -> Connected -> ServicesDiscovered -> CharacteristicsDiscovered
//!      -> ReadRequested -> Closing -> Closed
//! ```
//!
//! Every exit, including a failed connect, ends in `Closed` and produces a
//! [`WorkflowReport`].

use crate::config::WorkflowConfig;
use crate::console::Console;
use crate::gap::{BdAddr, Peer};
use crate::gatt::disconnect::{Disconnect, DisconnectClass, DisconnectReason};
use crate::gatt::session::{GattError, GattSession, SessionEvent, SessionProvider};
use crate::gatt::types::{GattCharacteristic, GattService, DEVICE_NAME_UUID};
use crate::uuid::Uuid;
use log::{debug, error, info, warn};
use std::io::Write;
use std::time::{Duration, Instant};

/// How long to wait for the disconnect after a timed out session was closed
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Connecting,
    Connected,
    ServicesDiscovered,
    CharacteristicsDiscovered,
    ReadRequested,
    Closing,
    Closed,
}

/// What the workflow achieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// The Device Name was read
    Name(String),
    /// Discovery finished without a Device Name characteristic
    NoDeviceName,
    ConnectFailed(String),
    /// The read was rejected or could not be issued
    ReadFailed(String),
    /// The link went down before the workflow finished
    LinkLost,
    /// The session timeout expired
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowReport {
    pub address: BdAddr,
    pub outcome: WorkflowOutcome,
    /// How the session ended; `None` only if it never ended cleanly
    pub disconnect: Option<Disconnect>,
    pub state: WorkflowState,
}

impl WorkflowReport {
    pub fn disconnect_class(&self) -> Option<DisconnectClass> {
        self.disconnect.as_ref().map(Disconnect::classify)
    }

    pub fn name(&self) -> Option<&str> {
        match &self.outcome {
            WorkflowOutcome::Name(name) => Some(name),
            _ => None,
        }
    }
}

/// An item visited while searching the service tree
#[derive(Debug, Clone, Copy)]
pub enum Visit<'a> {
    Service(&'a GattService),
    Characteristic(&'a GattCharacteristic),
}

/// Find the first characteristic with `target` UUID, in discovery order
///
/// Each service and characteristic is passed to `visit` before it is
/// inspected; the search stops at the first match.
pub fn find_first<'a, F>(
    services: &'a [GattService],
    target: &Uuid,
    mut visit: F,
) -> Option<&'a GattCharacteristic>
where
    F: FnMut(Visit<'a>),
{
    for service in services {
        visit(Visit::Service(service));
        for characteristic in &service.characteristics {
            visit(Visit::Characteristic(characteristic));
            if characteristic.uuid == *target {
                return Some(characteristic);
            }
        }
    }
    None
}

pub struct GattReadWorkflow<'a> {
    config: &'a WorkflowConfig,
    state: WorkflowState,
    outcome: Option<WorkflowOutcome>,
    timed_out: bool,
}

impl<'a> GattReadWorkflow<'a> {
    pub fn new(config: &'a WorkflowConfig) -> Self {
        Self {
            config,
            state: WorkflowState::Idle,
            outcome: None,
            timed_out: false,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Connect to `peer`, read its Device Name and disconnect
    pub fn run<P, W>(
        mut self,
        peer: &Peer,
        provider: &mut P,
        console: &mut Console<W>,
    ) -> WorkflowReport
    where
        P: SessionProvider + ?Sized,
        W: Write,
    {
        self.state = WorkflowState::Connecting;
        let mut session =
            match provider.connect_blocking(peer, self.config.connect_timeout) {
                Ok(session) => session,
                Err(e) => {
                    error!("Failed to connect to {}: {}", peer, e);
                    let disconnect = match &e {
                        GattError::ConnectTimeout => Disconnect::new(DisconnectReason::Timeout),
                        GattError::Io(err) => Disconnect::from_io(DisconnectReason::ConnectionFailed, err),
                        other => Disconnect::with_detail(DisconnectReason::ConnectionFailed, other.to_string()),
                    };
                    self.state = WorkflowState::Closed;
                    return self.report(peer, WorkflowOutcome::ConnectFailed(e.to_string()), Some(disconnect));
                }
            };
        self.state = WorkflowState::Connected;

        if let Err(e) = session.start_standard_discovery() {
            warn!("Could not start discovery on {}: {}", peer, e);
            self.outcome = Some(WorkflowOutcome::LinkLost);
            self.close(&mut session);
        }

        let deadline = self.config.session_timeout.map(|t| Instant::now() + t);
        let disconnect = self.pump(&mut session, deadline, console);
        self.state = WorkflowState::Closed;

        let disconnect = if self.timed_out {
            Disconnect::new(DisconnectReason::Timeout)
        } else {
            disconnect
        };
        if let DisconnectClass::Error(message) = disconnect.classify() {
            error!("{}: {}", peer, message);
        }

        let outcome = if self.timed_out {
            WorkflowOutcome::TimedOut
        } else {
            self.outcome.take().unwrap_or(WorkflowOutcome::LinkLost)
        };
        self.report(peer, outcome, Some(disconnect))
    }

    fn report(
        &self,
        peer: &Peer,
        outcome: WorkflowOutcome,
        disconnect: Option<Disconnect>,
    ) -> WorkflowReport {
        WorkflowReport {
            address: peer.address,
            outcome,
            disconnect,
            state: self.state,
        }
    }

    fn close<S: GattSession + ?Sized>(&mut self, session: &mut S) {
        if self.state == WorkflowState::Closing {
            return;
        }
        self.state = WorkflowState::Closing;
        if let Err(e) = session.close() {
            debug!("Close request failed: {}", e);
        }
    }

    /// Drive the session until it reports its disconnect
    fn pump<S, W>(
        &mut self,
        session: &mut S,
        deadline: Option<Instant>,
        console: &mut Console<W>,
    ) -> Disconnect
    where
        S: GattSession + ?Sized,
        W: Write,
    {
        let mut grace: Option<Instant> = None;

        loop {
            let now = Instant::now();
            if let Some(limit) = grace {
                if now >= limit {
                    warn!("No disconnect after close, giving up on session");
                    return Disconnect::new(DisconnectReason::Timeout);
                }
            } else if deadline.is_some_and(|d| now >= d) {
                warn!("Session timed out in state {:?}", self.state);
                self.timed_out = true;
                self.close(session);
                grace = Some(now + CLOSE_GRACE);
            }

            let wait = grace.or(deadline).map(|limit| limit.saturating_duration_since(now));

            let event = match session.read_and_process_next(wait) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    return Disconnect::with_detail(DisconnectReason::UnexpectedError, e.to_string());
                }
            };

            match event {
                SessionEvent::Disconnected(disconnect) => return disconnect,
                _ if self.state == WorkflowState::Closing => {
                    debug!("Ignoring {:?} while closing", event);
                }
                SessionEvent::ServicesDiscovered => {
                    self.state = WorkflowState::ServicesDiscovered;
                }
                SessionEvent::CharacteristicsDiscovered => {
                    self.state = WorkflowState::CharacteristicsDiscovered;
                    self.on_discovered(session, console);
                }
                SessionEvent::ReadComplete { handle, value } => {
                    let name = String::from_utf8_lossy(&value).into_owned();
                    debug!("Read {} bytes from 0x{:04x}", value.len(), handle);
                    console.device_name(&name);
                    info!("Device name: {}", name);
                    self.outcome = Some(WorkflowOutcome::Name(name));
                    self.close(session);
                }
                SessionEvent::ReadFailed { handle, error } => {
                    warn!("Read of 0x{:04x} failed: {}", handle, error);
                    self.outcome = Some(WorkflowOutcome::ReadFailed(error));
                    self.close(session);
                }
            }
        }
    }

    fn on_discovered<S, W>(&mut self, session: &mut S, console: &mut Console<W>)
    where
        S: GattSession + ?Sized,
        W: Write,
    {
        let found = find_first(session.services(), &DEVICE_NAME_UUID, |visit| match visit {
            Visit::Service(service) => console.service(&service.uuid),
            Visit::Characteristic(characteristic) => console.characteristic(&characteristic.uuid),
        })
        .cloned();

        let Some(characteristic) = found else {
            console.no_device_name();
            self.outcome = Some(WorkflowOutcome::NoDeviceName);
            self.close(session);
            return;
        };

        match session.read_request(&characteristic) {
            Ok(()) => self.state = WorkflowState::ReadRequested,
            Err(e) => {
                warn!("Could not request read of 0x{:04x}: {}", characteristic.value_handle, e);
                self.outcome = Some(WorkflowOutcome::ReadFailed(e.to_string()));
                self.close(session);
            }
        }
    }
}
