//! The seam between the read workflow and a live GATT connection
//!
//! A session is driven by requests (`start_standard_discovery`, `read_request`,
//! `close`) whose completions come back as [`SessionEvent`]s from
//! [`GattSession::read_and_process_next`].

use crate::att::AttError;
use crate::gap::Peer;
use crate::gatt::disconnect::Disconnect;
use crate::gatt::types::{GattCharacteristic, GattService};
use std::time::Duration;
use thiserror::Error;

/// GATT error types
#[derive(Debug, Error)]
pub enum GattError {
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection attempt timed out")]
    ConnectTimeout,

    #[error("Not connected")]
    NotConnected,

    #[error("Another request is outstanding")]
    Busy,

    #[error(transparent)]
    Att(#[from] AttError),
}

/// Completion of a request, delivered by the session pump
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Primary services are known; characteristic discovery continues
    ServicesDiscovered,
    /// The full service tree is available through [`GattSession::services`]
    CharacteristicsDiscovered,
    ReadComplete { handle: u16, value: Vec<u8> },
    /// The peer answered a read with an ATT error
    ReadFailed { handle: u16, error: String },
    /// The session is over; no further events follow
    Disconnected(Disconnect),
}

/// One live GATT connection
pub trait GattSession {
    /// Discover primary services, then all characteristics
    fn start_standard_discovery(&mut self) -> Result<(), GattError>;

    /// Request the value of a characteristic
    fn read_request(&mut self, characteristic: &GattCharacteristic) -> Result<(), GattError>;

    /// Start an orderly teardown; completion arrives as a `Disconnected` event
    fn close(&mut self) -> Result<(), GattError>;

    /// Wait for and process the next inbound PDU
    ///
    /// `None` as timeout blocks indefinitely. Returns `Ok(None)` when the
    /// timeout expired or the PDU completed nothing.
    fn read_and_process_next(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<SessionEvent>, GattError>;

    /// Services discovered so far, in discovery order
    fn services(&self) -> &[GattService];
}

/// Opens sessions to peers
pub trait SessionProvider {
    type Session: GattSession;

    /// Connect and block until the link is up, failed, or `timeout` expired
    fn connect_blocking(
        &mut self,
        peer: &Peer,
        timeout: Option<Duration>,
    ) -> Result<Self::Session, GattError>;
}
