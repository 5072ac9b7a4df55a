//! Unit tests for advertisement decoding, classification and the discovery loop

use super::*;
use crate::config::FilterDuplicates;
use crate::error::{HciError, ScanError};
use crate::gap::{AddressType, BdAddr};
use crate::hci::{HciEvent, LeAdvertisingReport, Readiness};
use crate::uuid::Uuid;
use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn addr(s: &str) -> BdAddr {
    s.parse().unwrap()
}

#[test]
fn test_parse_advertising_data_stops_at_truncation() {
    let data = [0x02, 0x01, 0x06, 0x03, 0x03, 0x0D, 0x18, 0x05, 0x09, b'a'];
    let parsed = parse_advertising_data(&data);
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0], (0x01, &[0x06][..]));
    assert_eq!(parsed[1], (0x03, &[0x0D, 0x18][..]));

    assert!(parse_advertising_data(&[0x00, 0x01, 0x06]).is_empty());
}

#[test]
fn test_record_from_report_decodes_names_and_services() {
    let nus = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);
    let mut data = vec![0x02, 0x01, 0x06];
    data.extend_from_slice(&[0x04, 0x08, b'R', b'u', b'u']);
    data.extend_from_slice(&[0x05, 0x03, 0x0F, 0x18, 0x0F, 0x18]);
    data.extend_from_slice(&[0x11, 0x07]);
    data.extend_from_slice(nus.as_bytes_le());

    let report = LeAdvertisingReport {
        event_type: 0x00,
        address_type: 0x01,
        address: [0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA],
        data,
        rssi: -60,
    };
    let record = AdvertisingRecord::from_report(&report);

    assert_eq!(record.address.to_string(), "AA:BB:CC:DD:EE:FF");
    assert_eq!(record.address_type, AddressType::Random);
    assert_eq!(record.event_type, AdvertisingEventType::ConnectableUndirected);
    assert_eq!(record.local_name.as_deref(), Some("Ruu"));
    // Battery service listed twice is kept once
    assert_eq!(record.service_uuids, vec![Uuid::from_u16(0x180F), nus]);
}

#[test]
fn test_complete_name_preferred_over_short_name() {
    let report = LeAdvertisingReport {
        event_type: 0x04,
        address_type: 0x00,
        address: [1, 2, 3, 4, 5, 6],
        data: vec![
            0x06, 0x09, b'R', b'u', b'u', b'v', b'i', 0x03, 0x08, b'R', b'u',
        ],
        rssi: 127,
    };
    let record = AdvertisingRecord::from_report(&report);
    assert_eq!(record.local_name.as_deref(), Some("Ruuvi"));
    assert_eq!(record.event_type, AdvertisingEventType::ScanResponse);
}

#[test]
fn test_rssi_boundaries() {
    assert_eq!(RssiDescription::from_raw(127), RssiDescription::Unavailable);
    assert_eq!(RssiDescription::from_raw(0), RssiDescription::Dbm(0));
    assert_eq!(RssiDescription::from_raw(20), RssiDescription::Dbm(20));
    assert_eq!(RssiDescription::from_raw(21), RssiDescription::Unknown(0x15));
    assert_eq!(RssiDescription::from_raw(126), RssiDescription::Unknown(0x7e));
    assert_eq!(RssiDescription::from_raw(-1), RssiDescription::Dbm(-1));
    assert_eq!(RssiDescription::from_raw(-128), RssiDescription::Dbm(-128));

    assert_eq!(RssiDescription::from_raw(127).to_string(), "RSSI: unavailable");
    assert_eq!(RssiDescription::from_raw(-60).to_string(), "RSSI = -60 dBm");
    assert_eq!(RssiDescription::from_raw(21).to_string(), "RSSI = 0x15 unknown");
}

#[test]
fn test_event_type_labels() {
    let labels: Vec<&str> = (0u8..=5)
        .map(|raw| AdvertisingEventType::from(raw).label())
        .collect();
    assert_eq!(
        labels,
        vec![
            "Connectable undirected",
            "Connectable directed",
            "Scannable",
            "Non connectable",
            "Scan response",
            "Scan response",
        ]
    );
    assert_eq!(AdvertisingEventType::from(0x42), AdvertisingEventType::Unknown(0x42));

    let record = AdvertisingRecord::new(addr("00:11:22:33:44:55"), 3.into(), -70);
    let classification = classify(&record);
    assert_eq!(classification.label, "Non connectable");
    assert_eq!(classification.rssi, RssiDescription::Dbm(-70));
}

#[test]
fn test_advertising_report_event_to_records() {
    let params = vec![
        0x02, // subevent
        0x01, // one report
        0x02, 0x00, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x03, 0x02, 0x01, 0x06, 0xC4,
    ];
    let mut raw = vec![0x3E, params.len() as u8];
    raw.extend_from_slice(&params);
    let event = HciEvent::parse(&raw).unwrap();
    let reports = LeAdvertisingReport::parse_reports(&event).unwrap();
    let record = AdvertisingRecord::from_report(&reports[0]);
    assert_eq!(record.address.to_string(), "01:02:03:04:05:06");
    assert_eq!(record.event_type, AdvertisingEventType::ScannableUndirected);
    assert_eq!(record.rssi, -60);
    assert!(record.local_name.is_none());
}

enum Step {
    Timeout,
    Ready(Vec<AdvertisingRecord>),
    Interrupt,
    Fail,
}

struct ScriptedSource {
    steps: VecDeque<Step>,
    pending: Vec<AdvertisingRecord>,
    timeouts: Vec<Duration>,
}

impl ScriptedSource {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            pending: Vec::new(),
            timeouts: Vec::new(),
        }
    }
}

impl ScanSource for ScriptedSource {
    fn wait(&mut self, timeout: Duration) -> Result<Readiness, ScanError> {
        self.timeouts.push(timeout);
        match self.steps.pop_front().unwrap_or(Step::Interrupt) {
            Step::Timeout => Ok(Readiness::TimedOut),
            Step::Ready(records) => {
                self.pending = records;
                Ok(Readiness::Ready)
            }
            Step::Interrupt => Ok(Readiness::Interrupted),
            Step::Fail => Err(ScanError::Hci(HciError::ReceiveError(
                std::io::Error::from_raw_os_error(libc::EBADF),
            ))),
        }
    }

    fn drain(&mut self) -> Result<Vec<AdvertisingRecord>, ScanError> {
        Ok(std::mem::take(&mut self.pending))
    }
}

#[derive(Default)]
struct Recorder {
    ticks: Vec<u64>,
    seen: Vec<String>,
}

impl ScanHandler for Recorder {
    fn on_idle(&mut self, tick: u64) {
        self.ticks.push(tick);
    }

    fn on_record(&mut self, record: &AdvertisingRecord) {
        self.seen.push(record.address.to_string());
    }
}

#[test]
fn test_event_loop_drains_all_records_in_order() {
    let a = AdvertisingRecord::new(addr("00:00:00:00:00:01"), 0.into(), -40);
    let b = AdvertisingRecord::new(addr("00:00:00:00:00:02"), 4.into(), -41);
    let c = AdvertisingRecord::new(addr("00:00:00:00:00:03"), 3.into(), 127);

    let mut source = ScriptedSource::new(vec![
        Step::Timeout,
        Step::Ready(vec![a, b]),
        Step::Timeout,
        Step::Ready(vec![c]),
        Step::Interrupt,
    ]);
    let mut handler = Recorder::default();

    let summary = ScanEventLoop::default().run(&mut source, &mut handler).unwrap();

    assert_eq!(
        handler.seen,
        vec!["00:00:00:00:00:01", "00:00:00:00:00:02", "00:00:00:00:00:03"]
    );
    assert_eq!(handler.ticks, vec![0, 1]);
    assert_eq!(summary, LoopSummary { idle_ticks: 2, records: 3 });
    assert!(source
        .timeouts
        .iter()
        .all(|t| *t == Duration::from_millis(300)));
}

#[test]
fn test_event_loop_wait_failure_is_fatal() {
    let mut source = ScriptedSource::new(vec![Step::Timeout, Step::Fail, Step::Timeout]);
    let mut handler = Recorder::default();

    let result = ScanEventLoop::new(Duration::from_millis(10)).run(&mut source, &mut handler);

    assert!(matches!(result, Err(ScanError::Hci(HciError::ReceiveError(_)))));
    assert_eq!(handler.ticks, vec![0]);
    assert_eq!(source.steps.len(), 1);
}

fn ruuvi_report(address_tail: u8, event_type: u8, payload: &[u8]) -> LeAdvertisingReport {
    LeAdvertisingReport {
        event_type,
        address_type: 0x01,
        address: [address_tail, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA],
        data: payload.to_vec(),
        rssi: -70,
    }
}

#[test]
fn test_software_filter_ignores_changing_payload() {
    for mode in [FilterDuplicates::Software, FilterDuplicates::Both] {
        let mut filter = DuplicateFilter::new(mode);

        // Sensor payloads change with every broadcast
        for counter in 0..50u8 {
            let report = ruuvi_report(0xFF, 0x00, &[0x02, 0x01, 0x06, 0x03, 0xFF, 0x99, counter]);
            assert_eq!(filter.is_duplicate(&report), counter > 0, "{:?}", mode);
        }

        // A scan response and a second advertiser are first sightings
        assert!(!filter.is_duplicate(&ruuvi_report(0xFF, 0x04, &[])));
        assert!(!filter.is_duplicate(&ruuvi_report(0x01, 0x00, &[])));
        assert!(filter.is_duplicate(&ruuvi_report(0x01, 0x00, &[0x01])));
        assert_eq!(filter.seen_count(), 3);
    }
}

#[test]
fn test_filter_passes_everything_without_software_mode() {
    for mode in [FilterDuplicates::Off, FilterDuplicates::Hardware] {
        let mut filter = DuplicateFilter::new(mode);
        let report = ruuvi_report(0xFF, 0x00, &[0x02, 0x01, 0x06]);

        for _ in 0..3 {
            assert!(!filter.is_duplicate(&report), "{:?}", mode);
        }
        assert_eq!(filter.seen_count(), 0);
        assert_eq!(filter.mode(), mode);
    }
}

#[test]
fn test_interrupt_flag_turns_wait_into_interrupted() {
    static RAISED_BEFORE: AtomicBool = AtomicBool::new(false);
    static RAISED_DURING: AtomicBool = AtomicBool::new(false);

    let calls = Cell::new(0);
    let wait = || -> Result<Readiness, ScanError> {
        calls.set(calls.get() + 1);
        Ok(Readiness::Ready)
    };

    let unset = InterruptFlag::default();
    assert_eq!(unset.guard(wait).unwrap(), Readiness::Ready);
    assert!(!unset.is_raised());

    let flag = InterruptFlag::new(&RAISED_BEFORE);
    assert_eq!(flag.guard(wait).unwrap(), Readiness::Ready);
    RAISED_BEFORE.store(true, Ordering::SeqCst);
    assert_eq!(flag.guard(wait).unwrap(), Readiness::Interrupted);
    assert_eq!(calls.get(), 2);

    // Raised by the signal handler while the wait was blocked
    let flag = InterruptFlag::new(&RAISED_DURING);
    let result = flag.guard(|| -> Result<Readiness, ScanError> {
        RAISED_DURING.store(true, Ordering::SeqCst);
        Ok(Readiness::TimedOut)
    });
    assert_eq!(result.unwrap(), Readiness::Interrupted);
}

#[test]
fn test_failed_scan_disable_is_retried() {
    let mut state = scanner::ScanState::default();
    let mut attempts = 0;

    assert!(!state.disable(|| -> Result<(), HciError> { unreachable!() }).unwrap());

    state.enabled();
    let result = state.disable(|| {
        attempts += 1;
        Err(HciError::CommandFailed { opcode: 0x200C, status: 0x0C })
    });
    assert!(result.is_err());
    assert!(state.is_enabled());

    let result = state.disable(|| -> Result<(), HciError> {
        attempts += 1;
        Ok(())
    });
    assert!(result.unwrap());
    assert!(!state.is_enabled());
    assert_eq!(attempts, 2);

    assert!(!state.disable(|| -> Result<(), HciError> { unreachable!() }).unwrap());
}
