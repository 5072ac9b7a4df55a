//! Error types for the leprobe library
//!
//! This module defines the transport-level errors. Protocol errors live next to
//! the layer that produces them (`att::AttError`, `gatt::GattError`).

use thiserror::Error;

/// Errors that can occur when working with HCI sockets
#[derive(Error, Debug)]
pub enum HciError {
    #[error("Failed to open HCI socket: {0}")]
    SocketError(#[from] std::io::Error),

    #[error("Failed to bind to HCI device: {0}")]
    BindError(std::io::Error),

    #[error("Failed to set HCI socket option: {0}")]
    SockOptError(std::io::Error),

    #[error("Failed to send HCI command: {0}")]
    SendError(std::io::Error),

    #[error("Failed to receive HCI event: {0}")]
    ReceiveError(std::io::Error),

    #[error("Interrupted while waiting for HCI event")]
    Interrupted,

    #[error("Timed out waiting for HCI event")]
    Timeout,

    #[error("HCI command 0x{opcode:04x} failed with status 0x{status:02x}")]
    CommandFailed { opcode: u16, status: u8 },

    #[error("Invalid HCI packet format")]
    InvalidPacketFormat,
}

/// Errors surfaced by a scan source
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HCI error: {0}")]
    Hci(#[from] HciError),
}
