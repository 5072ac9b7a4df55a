//! Unit tests for GATT client procedures and the read workflow

use super::*;
use crate::att::*;
use crate::config::WorkflowConfig;
use crate::console::Console;
use crate::gap::{AddressType, BdAddr, Peer};
use crate::uuid::Uuid;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

fn peer() -> Peer {
    Peer::new("AA:BB:CC:DD:EE:FF".parse().unwrap(), AddressType::Random)
}

fn output(console: Console<Vec<u8>>) -> String {
    String::from_utf8(console.into_inner()).unwrap()
}

/// Diagnostic sink that stays readable after the console takes ownership
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl std::io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct CallLog {
    connects: Vec<BdAddr>,
    discoveries: usize,
    reads: Vec<u16>,
    closes: usize,
}

/// Session that replays a script of events
struct MockSession {
    services: Vec<GattService>,
    script: VecDeque<SessionEvent>,
    read_value: Option<Vec<u8>>,
    closing: bool,
    log: Rc<RefCell<CallLog>>,
}

impl GattSession for MockSession {
    fn start_standard_discovery(&mut self) -> Result<(), GattError> {
        self.log.borrow_mut().discoveries += 1;
        Ok(())
    }

    fn read_request(&mut self, characteristic: &GattCharacteristic) -> Result<(), GattError> {
        self.log.borrow_mut().reads.push(characteristic.value_handle);
        if let Some(value) = self.read_value.clone() {
            self.script.push_back(SessionEvent::ReadComplete {
                handle: characteristic.value_handle,
                value,
            });
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), GattError> {
        self.log.borrow_mut().closes += 1;
        self.closing = true;
        Ok(())
    }

    fn read_and_process_next(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<SessionEvent>, GattError> {
        if self.closing {
            return Ok(Some(SessionEvent::Disconnected(Disconnect::new(
                DisconnectReason::ConnectionClosed,
            ))));
        }
        match self.script.pop_front() {
            Some(event) => Ok(Some(event)),
            None => {
                std::thread::sleep(timeout.unwrap_or_default().min(Duration::from_millis(5)));
                Ok(None)
            }
        }
    }

    fn services(&self) -> &[GattService] {
        &self.services
    }
}

struct MockProvider {
    services: Vec<GattService>,
    script: Vec<SessionEvent>,
    read_value: Option<Vec<u8>>,
    connect_error: Option<i32>,
    log: Rc<RefCell<CallLog>>,
}

impl MockProvider {
    fn new(services: Vec<GattService>) -> Self {
        Self {
            services,
            script: vec![
                SessionEvent::ServicesDiscovered,
                SessionEvent::CharacteristicsDiscovered,
            ],
            read_value: Some(b"Ruuvi 1234".to_vec()),
            connect_error: None,
            log: Rc::default(),
        }
    }
}

impl SessionProvider for MockProvider {
    type Session = MockSession;

    fn connect_blocking(
        &mut self,
        peer: &Peer,
        _timeout: Option<Duration>,
    ) -> Result<MockSession, GattError> {
        self.log.borrow_mut().connects.push(peer.address);
        if let Some(errno) = self.connect_error {
            return Err(std::io::Error::from_raw_os_error(errno).into());
        }
        Ok(MockSession {
            services: self.services.clone(),
            script: self.script.clone().into(),
            read_value: self.read_value.clone(),
            closing: false,
            log: self.log.clone(),
        })
    }
}

fn gap_and_battery(second_name_handle: bool) -> Vec<GattService> {
    let gap = GattService::new(Uuid::from_u16(0x1800), 0x0001, 0x0007)
        .with_characteristic(GattCharacteristic::new(Uuid::from_u16(0x2A01), 0x0002, 0x0003, 0x02))
        .with_characteristic(GattCharacteristic::new(Uuid::from_u16(0x2A00), 0x0004, 0x0005, 0x02));
    let mut battery = GattService::new(Uuid::from_u16(0x180F), 0x0008, 0x000B)
        .with_characteristic(GattCharacteristic::new(Uuid::from_u16(0x2A19), 0x0009, 0x000A, 0x12));
    if second_name_handle {
        battery = battery
            .with_characteristic(GattCharacteristic::new(Uuid::from_u16(0x2A00), 0x000B, 0x000C, 0x02));
    }
    vec![gap, battery]
}

#[test]
fn test_first_device_name_wins() {
    let mut provider = MockProvider::new(gap_and_battery(true));
    let mut console = Console::new(Vec::new());
    let config = WorkflowConfig::default();

    let report = GattReadWorkflow::new(&config).run(&peer(), &mut provider, &mut console);

    assert_eq!(report.outcome, WorkflowOutcome::Name("Ruuvi 1234".into()));
    assert_eq!(report.name(), Some("Ruuvi 1234"));
    assert_eq!(report.state, WorkflowState::Closed);
    assert_eq!(report.disconnect_class(), Some(DisconnectClass::Normal));
    assert_eq!(report.address.to_string(), "AA:BB:CC:DD:EE:FF");

    let log = provider.log.borrow();
    assert_eq!(log.connects, vec![peer().address]);
    assert_eq!(log.discoveries, 1);
    assert_eq!(log.reads, vec![0x0005]);
    assert_eq!(log.closes, 1);

    assert_eq!(
        output(console),
        "  Service: 00001800-0000-1000-8000-00805f9b34fb\n\
         \x20    Char: 00002a01-0000-1000-8000-00805f9b34fb\n\
         \x20    Char: 00002a00-0000-1000-8000-00805f9b34fb\n\
         Hello, my name is: Ruuvi 1234\n"
    );
}

#[test]
fn test_no_device_name_issues_no_read() {
    let mut provider = MockProvider::new(vec![gap_and_battery(false).remove(1)]);
    let diagnostics = SharedBuf::default();
    let mut console = Console::with_diagnostics(Vec::new(), diagnostics.clone());
    let config = WorkflowConfig::default();

    let report = GattReadWorkflow::new(&config).run(&peer(), &mut provider, &mut console);

    assert_eq!(report.outcome, WorkflowOutcome::NoDeviceName);
    assert_eq!(report.state, WorkflowState::Closed);
    assert!(provider.log.borrow().reads.is_empty());
    assert_eq!(provider.log.borrow().closes, 1);
    assert_eq!(diagnostics.text(), "No device name found.\n");
    assert!(!output(console).contains("No device name"));
}

#[test]
fn test_connect_failure_closes_without_session() {
    let mut provider = MockProvider::new(gap_and_battery(false));
    provider.connect_error = Some(libc::ECONNREFUSED);
    let mut console = Console::new(Vec::new());
    let config = WorkflowConfig::default();

    let report = GattReadWorkflow::new(&config).run(&peer(), &mut provider, &mut console);

    assert!(matches!(report.outcome, WorkflowOutcome::ConnectFailed(_)));
    assert_eq!(report.state, WorkflowState::Closed);
    let disconnect = report.disconnect.clone().unwrap();
    assert_eq!(disconnect.reason, DisconnectReason::ConnectionFailed);
    assert_eq!(
        report.disconnect_class(),
        Some(DisconnectClass::Error("Connection failed: Connection refused".into()))
    );
    assert_eq!(provider.log.borrow().discoveries, 0);
    assert!(output(console).is_empty());
}

#[test]
fn test_session_timeout_closes_and_reports_timeout() {
    let mut provider = MockProvider::new(gap_and_battery(false));
    provider.script = vec![SessionEvent::ServicesDiscovered];
    let mut console = Console::new(Vec::new());
    let config = WorkflowConfig {
        session_timeout: Some(Duration::from_millis(30)),
        ..WorkflowConfig::default()
    };

    let report = GattReadWorkflow::new(&config).run(&peer(), &mut provider, &mut console);

    assert_eq!(report.outcome, WorkflowOutcome::TimedOut);
    assert_eq!(
        report.disconnect,
        Some(Disconnect::new(DisconnectReason::Timeout))
    );
    assert_eq!(provider.log.borrow().closes, 1);
}

#[test]
fn test_link_loss_is_classified_as_error() {
    let mut provider = MockProvider::new(gap_and_battery(false));
    provider.script = vec![
        SessionEvent::ServicesDiscovered,
        SessionEvent::Disconnected(Disconnect::with_detail(
            DisconnectReason::ReadError,
            "Connection reset by peer",
        )),
    ];
    let mut console = Console::new(Vec::new());
    let config = WorkflowConfig::default();

    let report = GattReadWorkflow::new(&config).run(&peer(), &mut provider, &mut console);

    assert_eq!(report.outcome, WorkflowOutcome::LinkLost);
    assert_eq!(
        report.disconnect_class(),
        Some(DisconnectClass::Error("Read error: Connection reset by peer".into()))
    );
    assert_eq!(provider.log.borrow().closes, 0);
}

#[test]
fn test_disconnect_classification() {
    assert_eq!(
        classify(&Disconnect::new(DisconnectReason::ConnectionClosed)),
        DisconnectClass::Normal
    );
    for reason in [
        DisconnectReason::ConnectionFailed,
        DisconnectReason::UnexpectedError,
        DisconnectReason::UnexpectedResponse,
        DisconnectReason::WriteError,
        DisconnectReason::ReadError,
        DisconnectReason::Timeout,
    ] {
        assert!(classify(&Disconnect::new(reason)).is_error());
    }

    let err = std::io::Error::from_raw_os_error(libc::ECONNRESET);
    let disconnect = Disconnect::from_io(DisconnectReason::WriteError, &err);
    assert_eq!(disconnect.to_string(), "Write error: Connection reset by peer");
}

#[test]
fn test_find_first_stops_at_match() {
    let services = gap_and_battery(true);
    let mut visited = Vec::new();

    let found = find_first(&services, &DEVICE_NAME_UUID, |visit| {
        visited.push(match visit {
            Visit::Service(s) => s.uuid,
            Visit::Characteristic(c) => c.uuid,
        })
    });

    assert_eq!(found.map(|c| c.value_handle), Some(0x0005));
    assert_eq!(
        visited,
        vec![
            Uuid::from_u16(0x1800),
            Uuid::from_u16(0x2A01),
            Uuid::from_u16(0x2A00)
        ]
    );
    assert!(find_first(&services[1..1], &DEVICE_NAME_UUID, |_| {}).is_none());
}

#[test]
fn test_client_standard_discovery_exchange() {
    let mut client = GattClient::new();

    let request = client.start_discovery().unwrap();
    assert_eq!(request, vec![ATT_READ_BY_GROUP_TYPE_REQ, 0x01, 0x00, 0xFF, 0xFF, 0x00, 0x28]);
    assert!(matches!(client.start_discovery(), Err(GattError::Busy)));

    // Two services, then Attribute Not Found
    let step = client.handle_pdu(&[
        ATT_READ_BY_GROUP_TYPE_RSP, 6,
        0x01, 0x00, 0x05, 0x00, 0x00, 0x18,
        0x06, 0x00, 0x09, 0x00, 0x0F, 0x18,
    ]);
    assert_eq!(step.event, None);
    assert_eq!(
        step.send,
        Some(vec![ATT_READ_BY_GROUP_TYPE_REQ, 0x0A, 0x00, 0xFF, 0xFF, 0x00, 0x28])
    );

    let step = client.handle_pdu(&[ATT_ERROR_RSP, ATT_READ_BY_GROUP_TYPE_REQ, 0x0A, 0x00, 0x0A]);
    assert_eq!(step.event, Some(SessionEvent::ServicesDiscovered));
    assert_eq!(
        step.send,
        Some(vec![ATT_READ_BY_TYPE_REQ, 0x01, 0x00, 0xFF, 0xFF, 0x03, 0x28])
    );

    let step = client.handle_pdu(&[
        ATT_READ_BY_TYPE_RSP, 7,
        0x02, 0x00, 0x02, 0x03, 0x00, 0x00, 0x2A,
        0x07, 0x00, 0x12, 0x08, 0x00, 0x19, 0x2A,
    ]);
    assert_eq!(
        step.send,
        Some(vec![ATT_READ_BY_TYPE_REQ, 0x08, 0x00, 0xFF, 0xFF, 0x03, 0x28])
    );

    let step = client.handle_pdu(&[ATT_ERROR_RSP, ATT_READ_BY_TYPE_REQ, 0x08, 0x00, 0x0A]);
    assert_eq!(step.event, Some(SessionEvent::CharacteristicsDiscovered));
    assert_eq!(step.send, None);
    assert!(client.is_idle());

    let services = client.services();
    assert_eq!(services.len(), 2);
    assert_eq!(services[0].characteristics[0].uuid, DEVICE_NAME_UUID);
    assert_eq!(services[0].characteristics[0].value_handle, 0x0003);
    assert!(services[0].characteristics[0]
        .properties
        .contains(CharacteristicProperties::READ));
    assert_eq!(services[1].characteristics[0].uuid, Uuid::from_u16(0x2A19));
    assert!(services[1].characteristics[0]
        .properties
        .contains(CharacteristicProperties::NOTIFY));
}

#[test]
fn test_client_read_and_unexpected_response() {
    let mut client = GattClient::new();
    let name = GattCharacteristic::new(DEVICE_NAME_UUID, 0x0002, 0x0003, 0x02);

    assert_eq!(client.start_read(&name).unwrap(), vec![ATT_READ_REQ, 0x03, 0x00]);
    let step = client.handle_pdu(&[ATT_READ_RSP, b'R', b'u', b'u', b'v', b'i']);
    assert_eq!(
        step.event,
        Some(SessionEvent::ReadComplete {
            handle: 0x0003,
            value: b"Ruuvi".to_vec()
        })
    );

    client.start_read(&name).unwrap();
    let step = client.handle_pdu(&[ATT_ERROR_RSP, ATT_READ_REQ, 0x03, 0x00, 0x02]);
    assert!(matches!(step.event, Some(SessionEvent::ReadFailed { handle: 0x0003, .. })));

    client.start_read(&name).unwrap();
    let step = client.handle_pdu(&[ATT_READ_BY_TYPE_RSP, 7]);
    match step.event {
        Some(SessionEvent::Disconnected(d)) => {
            assert_eq!(d.reason, DisconnectReason::UnexpectedResponse)
        }
        other => panic!("unexpected {:?}", other),
    }

    // Server initiated MTU exchange is answered with the default MTU
    let step = client.handle_pdu(&[ATT_EXCHANGE_MTU_REQ, 0x00, 0x02]);
    assert_eq!(step.send, Some(vec![ATT_EXCHANGE_MTU_RSP, 23, 0x00]));
}

#[test]
fn test_client_discovery_ends_when_handles_stop_advancing() {
    let mut client = GattClient::new();
    client.start_discovery().unwrap();

    let generic_access = [
        ATT_READ_BY_GROUP_TYPE_RSP, 6,
        0x01, 0x00, 0x03, 0x00, 0x00, 0x18,
    ];
    let step = client.handle_pdu(&generic_access);
    assert_eq!(
        step.send,
        Some(vec![ATT_READ_BY_GROUP_TYPE_REQ, 0x04, 0x00, 0xFF, 0xFF, 0x00, 0x28])
    );

    // The server answers the follow-up with the same group again
    let step = client.handle_pdu(&generic_access);
    assert_eq!(step.event, Some(SessionEvent::ServicesDiscovered));
    assert_eq!(
        step.send,
        Some(vec![ATT_READ_BY_TYPE_REQ, 0x01, 0x00, 0xFF, 0xFF, 0x03, 0x28])
    );
    assert_eq!(client.services().len(), 1);

    let device_name = [
        ATT_READ_BY_TYPE_RSP, 7,
        0x02, 0x00, 0x02, 0x03, 0x00, 0x00, 0x2A,
    ];
    let step = client.handle_pdu(&device_name);
    assert_eq!(
        step.send,
        Some(vec![ATT_READ_BY_TYPE_REQ, 0x03, 0x00, 0xFF, 0xFF, 0x03, 0x28])
    );

    let step = client.handle_pdu(&device_name);
    assert_eq!(step.event, Some(SessionEvent::CharacteristicsDiscovered));
    assert_eq!(step.send, None);
    assert!(client.is_idle());
    assert_eq!(client.services()[0].characteristics.len(), 1);
}

#[test]
fn test_client_discovery_rejects_inverted_service_range() {
    let mut client = GattClient::new();
    client.start_discovery().unwrap();

    let step = client.handle_pdu(&[
        ATT_READ_BY_GROUP_TYPE_RSP, 6,
        0x05, 0x00, 0x02, 0x00, 0x00, 0x18,
    ]);
    assert_eq!(step.event, Some(SessionEvent::ServicesDiscovered));
    assert!(client.services().is_empty());
}
