use crate::gap::constants::*;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    Public,
    Random,
    PublicIdentity,
    RandomIdentity,
}

impl AddressType {
    /// Whether the peer must be addressed as a random address on the link layer
    pub fn is_random(&self) -> bool {
        matches!(self, AddressType::Random | AddressType::RandomIdentity)
    }
}

impl From<u8> for AddressType {
    fn from(value: u8) -> Self {
        match value {
            PUBLIC_DEVICE_ADDRESS => AddressType::Public,
            RANDOM_DEVICE_ADDRESS => AddressType::Random,
            PUBLIC_IDENTITY_ADDRESS => AddressType::PublicIdentity,
            RANDOM_IDENTITY_ADDRESS => AddressType::RandomIdentity,
            _ => AddressType::Public,
        }
    }
}

/// A 48-bit Bluetooth device address, stored in little-endian (over the air) order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    /// The wildcard address used when binding local sockets
    pub const ANY: BdAddr = BdAddr { bytes: [0; 6] };

    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() >= 6 {
            let mut bytes = [0u8; 6];
            bytes.copy_from_slice(&slice[0..6]);
            Some(Self { bytes })
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

/// A remote device as needed to open a connection to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Peer {
    pub address: BdAddr,
    pub address_type: AddressType,
}

impl Peer {
    pub fn new(address: BdAddr, address_type: AddressType) -> Self {
        Self {
            address,
            address_type,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.address, f)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("expected 6 colon-separated octets, got {0}")]
    WrongLength(usize),

    #[error("invalid octet '{0}'")]
    InvalidOctet(String),
}

impl FromStr for BdAddr {
    type Err = AddressParseError;

    /// Parses the display form `AA:BB:CC:DD:EE:FF` (most significant octet first)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 6 {
            return Err(AddressParseError::WrongLength(parts.len()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(AddressParseError::InvalidOctet(part.to_string()));
            }
            bytes[5 - i] = u8::from_str_radix(part, 16)
                .map_err(|_| AddressParseError::InvalidOctet(part.to_string()))?;
        }

        Ok(BdAddr { bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_round_trips_through_display() {
        let addr: BdAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(addr.bytes, [0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_address_parse_errors() {
        assert_eq!(
            "AA:BB".parse::<BdAddr>(),
            Err(AddressParseError::WrongLength(2))
        );
        assert_eq!(
            "AA:BB:CC:DD:EE:GG".parse::<BdAddr>(),
            Err(AddressParseError::InvalidOctet("GG".into()))
        );
    }

    #[test]
    fn test_address_type_from_raw() {
        assert_eq!(AddressType::from(0x00), AddressType::Public);
        assert!(AddressType::from(0x01).is_random());
        assert!(!AddressType::from(0x02).is_random());
    }
}
