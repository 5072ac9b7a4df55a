//! Bluetooth HCI (Host Controller Interface) implementation
//!
//! Only the slice of HCI needed by an LE observer: the raw socket, LE scan
//! commands and the LE advertising report event.

pub mod constants;
pub mod packet;
pub mod socket;


pub use packet::{HciCommand, HciEvent, LeAdvertisingReport};
pub use socket::{HciSocket, Readiness};
