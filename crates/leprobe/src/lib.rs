//! leprobe - Bluetooth LE discovery and Device Name probing
//!
//! This library scans for advertising Bluetooth LE devices over a raw HCI
//! socket, prints what it sees, and for devices that advertise a chosen
//! service opens a GATT connection to read their Device Name.
//!
//! The scan loop and the read workflow are written against the
//! [`ScanSource`] and [`SessionProvider`] traits, so both can be driven by
//! in-memory doubles.

pub mod att;
pub mod config;
pub mod console;
pub mod error;
pub mod gap;
pub mod gatt;
pub mod hci;
pub mod probe;
pub mod scan;
pub mod trigger;
pub mod uuid;

// Re-export common types for convenience
pub use config::{
    FilterDuplicates, ProbeConfig, ScanConfig, ScanType, WorkflowConfig,
    NORDIC_UART_SERVICE,
};
pub use console::Console;
pub use error::{HciError, ScanError};
pub use gap::{AddressType, BdAddr, Peer};
pub use gatt::{
    Disconnect, DisconnectClass, DisconnectReason, GattCharacteristic, GattError,
    GattReadWorkflow, GattService, GattSession, L2capSessionProvider, SessionEvent,
    SessionProvider, WorkflowOutcome, WorkflowReport, WorkflowState,
};
pub use hci::{HciSocket, Readiness};
pub use probe::{DeviceProbe, ProbeStats};
pub use scan::{
    AdvertisingEventType, AdvertisingRecord, HciScanner, LoopSummary, RssiDescription,
    ScanEventLoop, ScanHandler, ScanSource,
};
pub use trigger::{Launcher, ServiceTrigger};
pub use uuid::Uuid;
