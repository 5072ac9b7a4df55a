//! Attribute Protocol (ATT) client-side PDUs
//!
//! Only the requests a GATT client needs for discovery and reads are encoded
//! here; responses are parsed from whatever the server sends back.

pub mod constants;
pub mod error;
pub mod types;


pub use constants::*;
pub use error::{AttError, AttErrorCode, AttResult};
pub use types::{
    AttPacket, AttributeData, CharacteristicDeclaration, ErrorResponse, HandleValue,
    ReadByGroupTypeRequest, ReadByGroupTypeResponse, ReadByTypeRequest, ReadByTypeResponse,
    ReadRequest, ReadResponse,
};
