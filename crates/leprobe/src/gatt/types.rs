//! Common types for GATT operations
//!
//! This module defines the discovered service tree a session owns.

use crate::uuid::Uuid;
use bitflags::bitflags;

/// Device Name characteristic of the GAP service
pub const DEVICE_NAME_UUID: Uuid = Uuid::from_u16(0x2A00);

bitflags! {
    /// Characteristic properties as defined in the Bluetooth specification
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CharacteristicProperties: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        const EXTENDED_PROPERTIES = 0x80;
    }
}

/// A GATT characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub declaration_handle: u16,
    pub value_handle: u16,
    pub properties: CharacteristicProperties,
}

impl GattCharacteristic {
    pub fn new(uuid: Uuid, declaration_handle: u16, value_handle: u16, properties: u8) -> Self {
        Self {
            uuid,
            declaration_handle,
            value_handle,
            properties: CharacteristicProperties::from_bits_truncate(properties),
        }
    }
}

/// A primary service and the characteristics declared inside its handle range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub start_handle: u16,
    pub end_handle: u16,
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    pub fn new(uuid: Uuid, start_handle: u16, end_handle: u16) -> Self {
        Self {
            uuid,
            start_handle,
            end_handle,
            characteristics: Vec::new(),
        }
    }

    pub fn with_characteristic(mut self, characteristic: GattCharacteristic) -> Self {
        self.characteristics.push(characteristic);
        self
    }

    /// Whether an attribute handle falls inside this service
    pub fn contains(&self, handle: u16) -> bool {
        handle >= self.start_handle && handle <= self.end_handle
    }
}
