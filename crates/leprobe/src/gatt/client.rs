//! GATT client procedures
//!
//! Transport independent: the client turns requests into ATT PDUs and inbound
//! PDUs into [`SessionEvent`]s, leaving the byte pipe to the session that owns it.

use crate::att::{
    AttError, AttErrorCode, AttPacket, CharacteristicDeclaration, ErrorResponse,
    ReadByGroupTypeRequest, ReadByGroupTypeResponse, ReadByTypeRequest, ReadByTypeResponse,
    ReadRequest, ReadResponse, ATT_DEFAULT_MTU, ATT_ERROR_RSP, ATT_EXCHANGE_MTU_REQ,
    ATT_EXCHANGE_MTU_RSP, ATT_HANDLE_MAX, ATT_HANDLE_MIN, ATT_HANDLE_VALUE_CFM,
    ATT_HANDLE_VALUE_IND, ATT_HANDLE_VALUE_NTF, ATT_READ_BY_GROUP_TYPE_RSP, ATT_READ_BY_TYPE_RSP,
    ATT_READ_RSP, CHARACTERISTIC_UUID, PRIMARY_SERVICE_UUID,
};
use crate::gatt::disconnect::{Disconnect, DisconnectReason};
use crate::gatt::session::{GattError, SessionEvent};
use crate::gatt::types::{GattCharacteristic, GattService};
use crate::uuid::Uuid;
use log::{debug, trace, warn};

/// The request currently awaiting a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Idle,
    Services { from: u16 },
    Characteristics { from: u16 },
    Read { handle: u16 },
}

/// What the owner of the transport has to do after an inbound PDU
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Step {
    /// PDU to send back to the server
    pub send: Option<Vec<u8>>,
    pub event: Option<SessionEvent>,
}

impl Step {
    fn none() -> Self {
        Self::default()
    }

    fn send(pdu: Vec<u8>) -> Self {
        Self {
            send: Some(pdu),
            event: None,
        }
    }

    fn event(event: SessionEvent) -> Self {
        Self {
            send: None,
            event: Some(event),
        }
    }
}

/// Client side of one ATT bearer
#[derive(Debug)]
pub struct GattClient {
    services: Vec<GattService>,
    pending: Pending,
}

impl Default for GattClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GattClient {
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            pending: Pending::Idle,
        }
    }

    pub fn services(&self) -> &[GattService] {
        &self.services
    }

    pub fn is_idle(&self) -> bool {
        self.pending == Pending::Idle
    }

    /// First request of standard discovery
    pub fn start_discovery(&mut self) -> Result<Vec<u8>, GattError> {
        if !self.is_idle() {
            return Err(GattError::Busy);
        }
        self.services.clear();
        Ok(self.service_request(ATT_HANDLE_MIN))
    }

    pub fn start_read(&mut self, characteristic: &GattCharacteristic) -> Result<Vec<u8>, GattError> {
        if !self.is_idle() {
            return Err(GattError::Busy);
        }
        self.pending = Pending::Read {
            handle: characteristic.value_handle,
        };
        Ok(ReadRequest {
            handle: characteristic.value_handle,
        }
        .serialize())
    }

    fn service_request(&mut self, start_handle: u16) -> Vec<u8> {
        self.pending = Pending::Services { from: start_handle };
        ReadByGroupTypeRequest {
            start_handle,
            end_handle: ATT_HANDLE_MAX,
            group_type: Uuid::from_u16(PRIMARY_SERVICE_UUID),
        }
        .serialize()
    }

    fn characteristic_request(&mut self, start_handle: u16) -> Vec<u8> {
        self.pending = Pending::Characteristics { from: start_handle };
        ReadByTypeRequest {
            start_handle,
            end_handle: ATT_HANDLE_MAX,
            attribute_type: Uuid::from_u16(CHARACTERISTIC_UUID),
        }
        .serialize()
    }

    /// Process one PDU from the server
    pub fn handle_pdu(&mut self, pdu: &[u8]) -> Step {
        let Some(&opcode) = pdu.first() else {
            return Step::none();
        };

        match opcode {
            ATT_EXCHANGE_MTU_REQ => {
                let mut rsp = vec![ATT_EXCHANGE_MTU_RSP];
                rsp.extend_from_slice(&ATT_DEFAULT_MTU.to_le_bytes());
                return Step::send(rsp);
            }
            ATT_HANDLE_VALUE_NTF => {
                trace!("Ignoring notification");
                return Step::none();
            }
            ATT_HANDLE_VALUE_IND => {
                trace!("Confirming unsolicited indication");
                return Step::send(vec![ATT_HANDLE_VALUE_CFM]);
            }
            _ => {}
        }

        let result = match self.pending {
            Pending::Idle => {
                debug!("Unsolicited ATT PDU 0x{:02x}", opcode);
                return Step::none();
            }
            Pending::Services { from } => self.on_services(from, opcode, pdu),
            Pending::Characteristics { from } => self.on_characteristics(from, opcode, pdu),
            Pending::Read { handle } => self.on_read(handle, opcode, pdu),
        };

        result.unwrap_or_else(|e| {
            self.pending = Pending::Idle;
            Step::event(SessionEvent::Disconnected(Disconnect::with_detail(
                DisconnectReason::UnexpectedResponse,
                e.to_string(),
            )))
        })
    }

    fn on_services(&mut self, from: u16, opcode: u8, pdu: &[u8]) -> Result<Step, AttError> {
        match opcode {
            ATT_READ_BY_GROUP_TYPE_RSP => {
                let response = ReadByGroupTypeResponse::parse(pdu)?;
                if let Some(item) = response
                    .data
                    .iter()
                    .find(|item| item.handle < from || item.end_group_handle < item.handle)
                {
                    warn!(
                        "Service group 0x{:04x}-0x{:04x} out of order after request from 0x{:04x}",
                        item.handle, item.end_group_handle, from
                    );
                    return Ok(self.services_done());
                }

                let mut last_end = ATT_HANDLE_MAX;
                for item in &response.data {
                    last_end = item.end_group_handle;
                    match Uuid::try_from_slice_le(&item.value) {
                        Some(uuid) => self.services.push(GattService::new(
                            uuid,
                            item.handle,
                            item.end_group_handle,
                        )),
                        None => warn!("Skipping service with malformed UUID at 0x{:04x}", item.handle),
                    }
                }

                if response.data.is_empty() || last_end == ATT_HANDLE_MAX {
                    Ok(self.services_done())
                } else {
                    Ok(Step::send(self.service_request(last_end + 1)))
                }
            }
            ATT_ERROR_RSP => {
                Self::end_of_range(pdu)?;
                Ok(self.services_done())
            }
            other => Err(AttError::UnexpectedOpcode(other)),
        }
    }

    fn services_done(&mut self) -> Step {
        debug!("Discovered {} primary services", self.services.len());
        Step {
            send: Some(self.characteristic_request(ATT_HANDLE_MIN)),
            event: Some(SessionEvent::ServicesDiscovered),
        }
    }

    fn on_characteristics(&mut self, from: u16, opcode: u8, pdu: &[u8]) -> Result<Step, AttError> {
        match opcode {
            ATT_READ_BY_TYPE_RSP => {
                let response = ReadByTypeResponse::parse(pdu)?;
                let declarations = response
                    .data
                    .iter()
                    .map(CharacteristicDeclaration::parse)
                    .collect::<Result<Vec<_>, _>>()?;
                if let Some(declaration) = declarations
                    .iter()
                    .find(|declaration| declaration.declaration_handle < from)
                {
                    warn!(
                        "Characteristic at 0x{:04x} lies before requested start 0x{:04x}",
                        declaration.declaration_handle, from
                    );
                    return Ok(self.characteristics_done());
                }

                let mut last = ATT_HANDLE_MAX;
                for declaration in declarations {
                    last = declaration.declaration_handle;
                    self.assign(declaration);
                }

                if response.data.is_empty() || last == ATT_HANDLE_MAX {
                    Ok(self.characteristics_done())
                } else {
                    Ok(Step::send(self.characteristic_request(last + 1)))
                }
            }
            ATT_ERROR_RSP => {
                Self::end_of_range(pdu)?;
                Ok(self.characteristics_done())
            }
            other => Err(AttError::UnexpectedOpcode(other)),
        }
    }

    fn assign(&mut self, declaration: CharacteristicDeclaration) {
        let characteristic = GattCharacteristic::new(
            declaration.uuid,
            declaration.declaration_handle,
            declaration.value_handle,
            declaration.properties,
        );
        match self
            .services
            .iter_mut()
            .find(|service| service.contains(characteristic.declaration_handle))
        {
            Some(service) => service.characteristics.push(characteristic),
            None => debug!(
                "Characteristic at 0x{:04x} lies outside every service",
                characteristic.declaration_handle
            ),
        }
    }

    fn characteristics_done(&mut self) -> Step {
        self.pending = Pending::Idle;
        Step::event(SessionEvent::CharacteristicsDiscovered)
    }

    fn on_read(&mut self, handle: u16, opcode: u8, pdu: &[u8]) -> Result<Step, AttError> {
        let event = match opcode {
            ATT_READ_RSP => SessionEvent::ReadComplete {
                handle,
                value: ReadResponse::parse(pdu)?.value,
            },
            ATT_ERROR_RSP => SessionEvent::ReadFailed {
                handle,
                error: ErrorResponse::parse(pdu)?.into_error().to_string(),
            },
            other => return Err(AttError::UnexpectedOpcode(other)),
        };
        self.pending = Pending::Idle;
        Ok(Step::event(event))
    }

    /// An error response during discovery ends the current phase
    fn end_of_range(pdu: &[u8]) -> Result<(), AttError> {
        let error = ErrorResponse::parse(pdu)?;
        if error.error_code != AttErrorCode::AttributeNotFound {
            warn!(
                "Discovery stopped by {:?} at handle 0x{:04x}",
                error.error_code, error.handle
            );
        }
        Ok(())
    }
}
