pub mod constants;
pub mod types;

pub use types::{AddressParseError, AddressType, BdAddr, Peer};
