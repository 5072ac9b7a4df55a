//! Type definitions for the ATT protocol
use super::constants::*;
use super::error::{AttError, AttErrorCode, AttResult};
use crate::uuid::Uuid;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Common behavior of ATT PDUs
pub trait AttPacket: Sized {
    /// Opcode for this packet
    fn opcode() -> u8;

    /// Parse packet from bytes
    fn parse(data: &[u8]) -> AttResult<Self>;

    /// Serialize packet to bytes
    fn serialize(&self) -> Vec<u8>;
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> AttResult<u16> {
    cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| AttError::InvalidPdu)
}

/// Append a UUID in its shortest on-air form
fn write_uuid(packet: &mut Vec<u8>, uuid: &Uuid) {
    if let Some(uuid16) = uuid.as_u16() {
        packet.extend_from_slice(&uuid16.to_le_bytes());
    } else {
        packet.extend_from_slice(uuid.as_bytes_le());
    }
}

fn read_uuid(data: &[u8]) -> AttResult<Uuid> {
    match data.len() {
        2 | 16 => Uuid::try_from_slice_le(data).ok_or(AttError::InvalidPdu),
        _ => Err(AttError::InvalidPdu),
    }
}

/// Error response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Request opcode in error
    pub request_opcode: u8,
    /// Attribute handle in error
    pub handle: u16,
    /// Error code
    pub error_code: AttErrorCode,
}

impl AttPacket for ErrorResponse {
    fn opcode() -> u8 {
        ATT_ERROR_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 5 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let request_opcode = data[1];
        let mut cursor = Cursor::new(&data[2..]);
        let handle = read_u16(&mut cursor)?;
        let error_code = data[4].into();

        Ok(Self {
            request_opcode,
            handle,
            error_code,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(5);
        packet.push(Self::opcode());
        packet.push(self.request_opcode);
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.push(self.error_code.into());
        packet
    }
}

impl ErrorResponse {
    pub fn into_error(self) -> AttError {
        AttError::Protocol(self.error_code, self.handle)
    }
}

/// Read By Group Type Request packet, used for primary service discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByGroupTypeRequest {
    /// First requested handle
    pub start_handle: u16,
    /// Last requested handle
    pub end_handle: u16,
    /// Group type UUID
    pub group_type: Uuid,
}

impl AttPacket for ReadByGroupTypeRequest {
    fn opcode() -> u8 {
        ATT_READ_BY_GROUP_TYPE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 7 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let start_handle = read_u16(&mut cursor)?;
        let end_handle = read_u16(&mut cursor)?;
        let group_type = read_uuid(&data[5..])?;

        Ok(Self {
            start_handle,
            end_handle,
            group_type,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(21);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.start_handle.to_le_bytes());
        packet.extend_from_slice(&self.end_handle.to_le_bytes());
        write_uuid(&mut packet, &self.group_type);
        packet
    }
}

/// Attribute data in Read By Group Type Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeData {
    /// Attribute handle
    pub handle: u16,
    /// Group end handle
    pub end_group_handle: u16,
    /// Attribute value
    pub value: Vec<u8>,
}

/// Read By Group Type Response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByGroupTypeResponse {
    /// Length of each item
    pub length: u8,
    /// List of attribute data
    pub data: Vec<AttributeData>,
}

impl AttPacket for ReadByGroupTypeResponse {
    fn opcode() -> u8 {
        ATT_READ_BY_GROUP_TYPE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 2 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let length = data[1] as usize;
        if length < 6 {
            return Err(AttError::InvalidPdu);
        }

        let mut data_list = Vec::new();
        let mut offset = 2;

        while offset + length <= data.len() {
            let mut cursor = Cursor::new(&data[offset..]);
            let handle = read_u16(&mut cursor)?;
            let end_group_handle = read_u16(&mut cursor)?;
            let value = data[offset + 4..offset + length].to_vec();

            data_list.push(AttributeData {
                handle,
                end_group_handle,
                value,
            });

            offset += length;
        }

        Ok(Self {
            length: length as u8,
            data: data_list,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode(), self.length];
        for item in &self.data {
            packet.extend_from_slice(&item.handle.to_le_bytes());
            packet.extend_from_slice(&item.end_group_handle.to_le_bytes());
            packet.extend_from_slice(&item.value);
        }
        packet
    }
}

/// Read By Type Request packet, used for characteristic discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByTypeRequest {
    /// First requested handle
    pub start_handle: u16,
    /// Last requested handle
    pub end_handle: u16,
    /// Attribute type UUID
    pub attribute_type: Uuid,
}

impl AttPacket for ReadByTypeRequest {
    fn opcode() -> u8 {
        ATT_READ_BY_TYPE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 7 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let start_handle = read_u16(&mut cursor)?;
        let end_handle = read_u16(&mut cursor)?;
        let attribute_type = read_uuid(&data[5..])?;

        Ok(Self {
            start_handle,
            end_handle,
            attribute_type,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(21);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.start_handle.to_le_bytes());
        packet.extend_from_slice(&self.end_handle.to_le_bytes());
        write_uuid(&mut packet, &self.attribute_type);
        packet
    }
}

/// Handle and value in Read By Type Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleValue {
    /// Attribute handle
    pub handle: u16,
    /// Attribute value
    pub value: Vec<u8>,
}

/// Read By Type Response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByTypeResponse {
    /// Length of each item
    pub length: u8,
    /// List of handle-value pairs
    pub data: Vec<HandleValue>,
}

impl AttPacket for ReadByTypeResponse {
    fn opcode() -> u8 {
        ATT_READ_BY_TYPE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 2 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let length = data[1] as usize;
        if length < 2 {
            return Err(AttError::InvalidPdu);
        }

        let mut data_list = Vec::new();
        let mut offset = 2;

        while offset + length <= data.len() {
            let mut cursor = Cursor::new(&data[offset..]);
            let handle = read_u16(&mut cursor)?;
            let value = data[offset + 2..offset + length].to_vec();

            data_list.push(HandleValue { handle, value });
            offset += length;
        }

        Ok(Self {
            length: length as u8,
            data: data_list,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode(), self.length];
        for item in &self.data {
            packet.extend_from_slice(&item.handle.to_le_bytes());
            packet.extend_from_slice(&item.value);
        }
        packet
    }
}

/// A characteristic declaration attribute, as returned by Read By Type on `0x2803`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicDeclaration {
    pub declaration_handle: u16,
    pub properties: u8,
    pub value_handle: u16,
    pub uuid: Uuid,
}

impl CharacteristicDeclaration {
    /// Decode properties, value handle and UUID from a declaration value
    pub fn parse(item: &HandleValue) -> AttResult<Self> {
        if item.value.len() < 5 {
            return Err(AttError::InvalidPdu);
        }

        let properties = item.value[0];
        let mut cursor = Cursor::new(&item.value[1..]);
        let value_handle = read_u16(&mut cursor)?;
        let uuid = read_uuid(&item.value[3..])?;

        Ok(Self {
            declaration_handle: item.handle,
            properties,
            value_handle,
            uuid,
        })
    }
}

/// Read Request packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    /// Handle to read
    pub handle: u16,
}

impl AttPacket for ReadRequest {
    fn opcode() -> u8 {
        ATT_READ_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 3 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let handle = read_u16(&mut cursor)?;
        Ok(Self { handle })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet
    }
}

/// Read Response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    /// Attribute value
    pub value: Vec<u8>,
}

impl AttPacket for ReadResponse {
    fn opcode() -> u8 {
        ATT_READ_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.is_empty() || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        Ok(Self {
            value: data[1..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(1 + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.value);
        packet
    }
}
