use crate::gap::constants::*;
use crate::gap::{AddressType, BdAddr, Peer};
use crate::hci::constants::{ADV_DIRECT_IND, ADV_IND, ADV_NONCONN_IND, ADV_SCAN_IND, SCAN_RSP};
use crate::hci::LeAdvertisingReport;
use crate::scan::parse_advertising_data;
use crate::uuid::Uuid;

/// Kind of advertising PDU a report was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvertisingEventType {
    /// ADV_IND
    ConnectableUndirected,
    /// ADV_DIRECT_IND
    ConnectableDirected,
    /// ADV_SCAN_IND
    ScannableUndirected,
    /// ADV_NONCONN_IND
    NonConnectable,
    /// SCAN_RSP
    ScanResponse,
    Unknown(u8),
}

impl From<u8> for AdvertisingEventType {
    fn from(value: u8) -> Self {
        match value {
            ADV_IND => AdvertisingEventType::ConnectableUndirected,
            ADV_DIRECT_IND => AdvertisingEventType::ConnectableDirected,
            ADV_SCAN_IND => AdvertisingEventType::ScannableUndirected,
            ADV_NONCONN_IND => AdvertisingEventType::NonConnectable,
            SCAN_RSP => AdvertisingEventType::ScanResponse,
            other => AdvertisingEventType::Unknown(other),
        }
    }
}

/// One advertisement as delivered to the discovery loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingRecord {
    pub address: BdAddr,
    pub address_type: AddressType,
    pub event_type: AdvertisingEventType,
    /// dBm, or 127 when the controller has no value
    pub rssi: i8,
    pub local_name: Option<String>,
    /// Advertised service UUIDs in the order they appeared, without repeats
    pub service_uuids: Vec<Uuid>,
}

impl AdvertisingRecord {
    pub fn new(address: BdAddr, event_type: AdvertisingEventType, rssi: i8) -> Self {
        Self {
            address,
            address_type: AddressType::Public,
            event_type,
            rssi,
            local_name: None,
            service_uuids: Vec::new(),
        }
    }

    /// Build a record from a raw report, decoding the name and service lists
    pub fn from_report(report: &LeAdvertisingReport) -> Self {
        let mut record = Self::new(
            BdAddr::new(report.address),
            report.event_type.into(),
            report.rssi,
        );
        record.address_type = AddressType::from(report.address_type);

        let mut short_name = None;
        for (ad_type, data) in parse_advertising_data(&report.data) {
            match ad_type {
                ADV_TYPE_COMPLETE_LOCAL_NAME => {
                    record.local_name = Some(String::from_utf8_lossy(data).into_owned());
                }
                ADV_TYPE_SHORT_LOCAL_NAME => {
                    short_name = Some(String::from_utf8_lossy(data).into_owned());
                }
                ADV_TYPE_16BIT_SERVICE_UUID_PARTIAL | ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE => {
                    record.add_uuids(data, 2);
                }
                ADV_TYPE_32BIT_SERVICE_UUID_PARTIAL | ADV_TYPE_32BIT_SERVICE_UUID_COMPLETE => {
                    record.add_uuids(data, 4);
                }
                ADV_TYPE_128BIT_SERVICE_UUID_PARTIAL | ADV_TYPE_128BIT_SERVICE_UUID_COMPLETE => {
                    record.add_uuids(data, 16);
                }
                _ => {}
            }
        }

        if record.local_name.is_none() {
            record.local_name = short_name;
        }
        record
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    pub fn with_service(mut self, uuid: Uuid) -> Self {
        self.push_uuid(uuid);
        self
    }

    pub fn peer(&self) -> Peer {
        Peer::new(self.address, self.address_type)
    }

    fn add_uuids(&mut self, data: &[u8], width: usize) {
        for chunk in data.chunks_exact(width) {
            if let Some(uuid) = Uuid::try_from_slice_le(chunk) {
                self.push_uuid(uuid);
            }
        }
    }

    fn push_uuid(&mut self, uuid: Uuid) {
        if !self.service_uuids.contains(&uuid) {
            self.service_uuids.push(uuid);
        }
    }
}
