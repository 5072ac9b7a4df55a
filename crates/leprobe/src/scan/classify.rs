//! Human readable categories for advertisement records

use crate::hci::constants::RSSI_UNAVAILABLE;
use crate::scan::record::{AdvertisingEventType, AdvertisingRecord};
use std::fmt;

/// Largest RSSI value still rendered as a signed dBm reading
const RSSI_DBM_MAX: i8 = 20;

/// How an RSSI field should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RssiDescription {
    Unavailable,
    Dbm(i8),
    /// Out of range reading, kept as the raw byte
    Unknown(u8),
}

impl RssiDescription {
    pub fn from_raw(rssi: i8) -> Self {
        if rssi == RSSI_UNAVAILABLE {
            RssiDescription::Unavailable
        } else if rssi <= RSSI_DBM_MAX {
            RssiDescription::Dbm(rssi)
        } else {
            RssiDescription::Unknown(rssi as u8)
        }
    }
}

impl fmt::Display for RssiDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RssiDescription::Unavailable => write!(f, "RSSI: unavailable"),
            RssiDescription::Dbm(dbm) => write!(f, "RSSI = {} dBm", dbm),
            RssiDescription::Unknown(raw) => write!(f, "RSSI = 0x{:02x} unknown", raw),
        }
    }
}

impl AdvertisingEventType {
    /// Display label; unknown raw types fall back to the scan response label
    pub fn label(&self) -> &'static str {
        match self {
            AdvertisingEventType::ConnectableUndirected => "Connectable undirected",
            AdvertisingEventType::ConnectableDirected => "Connectable directed",
            AdvertisingEventType::ScannableUndirected => "Scannable",
            AdvertisingEventType::NonConnectable => "Non connectable",
            AdvertisingEventType::ScanResponse | AdvertisingEventType::Unknown(_) => {
                "Scan response"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub label: &'static str,
    pub rssi: RssiDescription,
}

pub fn classify(record: &AdvertisingRecord) -> Classification {
    Classification {
        label: record.event_type.label(),
        rssi: RssiDescription::from_raw(record.rssi),
    }
}
