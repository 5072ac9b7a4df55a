//! GATT (Generic Attribute Profile) client
//!
//! This module provides the session abstraction used to talk to a peer's
//! GATT server, an implementation over L2CAP sockets, and the workflow that
//! reads a peer's Device Name.

pub mod client;
pub mod disconnect;
pub mod l2cap;
pub mod session;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use client::GattClient;
pub use disconnect::{classify, Disconnect, DisconnectClass, DisconnectReason};
pub use l2cap::{L2capGattSession, L2capSessionProvider};
pub use session::{GattError, GattSession, SessionEvent, SessionProvider};
pub use types::{CharacteristicProperties, GattCharacteristic, GattService, DEVICE_NAME_UUID};
pub use workflow::{
    find_first, GattReadWorkflow, Visit, WorkflowOutcome, WorkflowReport, WorkflowState,
};
