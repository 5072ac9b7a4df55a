//! HCI packet structures and parsing
//!
//! This module contains structures and methods for handling HCI packets.

use crate::error::HciError;
use crate::hci::constants::*;

/// HCI commands issued by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HciCommand {
    // LE Commands (OGF: 0x08)
    LeSetScanParameters {
        scan_type: u8,
        scan_interval: u16,
        scan_window: u16,
        own_address_type: u8,
        filter_policy: u8,
    },
    LeSetScanEnable { enable: bool, filter_duplicates: bool },
}

/// Build a 16-bit opcode from its group and command fields
pub fn opcode(ogf: u8, ocf: u16) -> u16 {
    ((ogf as u16) << 10) | (ocf & 0x3ff)
}

impl HciCommand {
    /// Get the OGF and OCF for this command
    pub fn opcode_parts(&self) -> (u8, u16) {
        match self {
            Self::LeSetScanParameters { .. } => (OGF_LE, OCF_LE_SET_SCAN_PARAMETERS),
            Self::LeSetScanEnable { .. } => (OGF_LE, OCF_LE_SET_SCAN_ENABLE),
        }
    }

    pub fn opcode(&self) -> u16 {
        let (ogf, ocf) = self.opcode_parts();
        opcode(ogf, ocf)
    }

    /// Convert the command to its raw parameter bytes
    fn parameters(&self) -> Vec<u8> {
        match *self {
            Self::LeSetScanParameters {
                scan_type,
                scan_interval,
                scan_window,
                own_address_type,
                filter_policy,
            } => {
                let mut params = Vec::with_capacity(7);
                params.push(scan_type);
                params.extend_from_slice(&scan_interval.to_le_bytes());
                params.extend_from_slice(&scan_window.to_le_bytes());
                params.push(own_address_type);
                params.push(filter_policy);
                params
            }

            Self::LeSetScanEnable {
                enable,
                filter_duplicates,
            } => vec![enable as u8, filter_duplicates as u8],
        }
    }

    /// Convert the command to a raw HCI packet
    pub fn to_packet(&self) -> Vec<u8> {
        let params = self.parameters();

        let mut packet = vec![HCI_COMMAND_PKT];
        packet.extend_from_slice(&self.opcode().to_le_bytes());
        packet.push(params.len() as u8);
        packet.extend_from_slice(&params);
        packet
    }
}

/// HCI Event packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HciEvent {
    pub event_code: u8,
    pub parameter_total_length: u8,
    pub parameters: Vec<u8>,
}

impl HciEvent {
    /// Parse an HCI event from raw bytes (without the packet type indicator)
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 2 {
            return None;
        }

        let event_code = data[0];
        let parameter_total_length = data[1];

        if data.len() < (parameter_total_length as usize + 2) {
            return None;
        }

        let parameters = data[2..(parameter_total_length as usize + 2)].to_vec();

        Some(HciEvent {
            event_code,
            parameter_total_length,
            parameters,
        })
    }

    /// The opcode this event completes, for Command Complete and Command Status events
    pub fn command_opcode(&self) -> Option<u16> {
        let at = match self.event_code {
            EVT_CMD_COMPLETE => 1,
            EVT_CMD_STATUS => 2,
            _ => return None,
        };
        let bytes = self.parameters.get(at..at + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Whether this is the Command Complete event for the given command
    pub fn is_command_complete(&self, ogf: u8, ocf: u16) -> bool {
        self.event_code == EVT_CMD_COMPLETE && self.command_opcode() == Some(opcode(ogf, ocf))
    }

    /// Status byte of a Command Complete or Command Status event
    pub fn get_status(&self) -> u8 {
        match self.event_code {
            EVT_CMD_COMPLETE => self.parameters.get(3).copied().unwrap_or(0xFF),
            EVT_CMD_STATUS => self.parameters.first().copied().unwrap_or(0xFF),
            _ => 0xFF,
        }
    }

    pub fn is_advertising_report(&self) -> bool {
        self.event_code == EVT_LE_META_EVENT
            && self.parameters.first() == Some(&EVT_LE_ADVERTISING_REPORT)
    }
}

/// One report out of an LE Advertising Report event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeAdvertisingReport {
    pub event_type: u8,
    pub address_type: u8,
    pub address: [u8; 6],
    pub data: Vec<u8>,
    pub rssi: i8,
}

impl LeAdvertisingReport {
    /// Parse every report carried by an LE Advertising Report meta event.
    ///
    /// Reports are laid out back to back: event type, address type, address,
    /// data length, data, RSSI.
    pub fn parse_reports(event: &HciEvent) -> Result<Vec<Self>, HciError> {
        if !event.is_advertising_report() || event.parameters.len() < 2 {
            return Err(HciError::InvalidPacketFormat);
        }

        let num_reports = event.parameters[1] as usize;
        let mut reports = Vec::with_capacity(num_reports);
        let mut offset = 2;

        for _ in 0..num_reports {
            let header = event
                .parameters
                .get(offset..offset + 9)
                .ok_or(HciError::InvalidPacketFormat)?;

            let event_type = header[0];
            let address_type = header[1];
            let mut address = [0u8; 6];
            address.copy_from_slice(&header[2..8]);
            let data_length = header[8] as usize;
            offset += 9;

            let data = event
                .parameters
                .get(offset..offset + data_length)
                .ok_or(HciError::InvalidPacketFormat)?
                .to_vec();
            offset += data_length;

            let rssi = *event
                .parameters
                .get(offset)
                .ok_or(HciError::InvalidPacketFormat)? as i8;
            offset += 1;

            reports.push(LeAdvertisingReport {
                event_type,
                address_type,
                address,
                data,
                rssi,
            });
        }

        Ok(reports)
    }
}
