//! LE scanning over a raw HCI socket

use crate::config::{FilterDuplicates, ScanConfig};
use crate::error::{HciError, ScanError};
use crate::hci::constants::*;
use crate::hci::{HciCommand, HciSocket, LeAdvertisingReport, Readiness};
use crate::scan::event_loop::ScanSource;
use crate::scan::record::AdvertisingRecord;
use log::{debug, info, trace, warn};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Host side duplicate suppression
///
/// Keyed on address and event type: an advertiser whose payload changes with
/// every broadcast is still reported once per event type, and the set stays
/// bounded by the number of advertisers in range.
#[derive(Debug, Default)]
pub struct DuplicateFilter {
    mode: FilterDuplicates,
    seen: HashSet<([u8; 6], u8)>,
}

impl DuplicateFilter {
    pub fn new(mode: FilterDuplicates) -> Self {
        Self {
            mode,
            seen: HashSet::new(),
        }
    }

    pub fn mode(&self) -> FilterDuplicates {
        self.mode
    }

    /// Number of advertisers remembered so far
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Whether `report` has to be dropped; a first sighting is remembered
    pub fn is_duplicate(&mut self, report: &LeAdvertisingReport) -> bool {
        if !self.mode.software() {
            return false;
        }
        !self.seen.insert((report.address, report.event_type))
    }
}

/// Shared flag that turns a pending wait into `Readiness::Interrupted`
#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptFlag(Option<&'static AtomicBool>);

impl InterruptFlag {
    pub fn new(flag: &'static AtomicBool) -> Self {
        Self(Some(flag))
    }

    pub fn is_raised(&self) -> bool {
        self.0.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Run `wait` unless the flag is already raised
    ///
    /// A flag raised while `wait` blocked also yields `Interrupted`, whatever
    /// `wait` returned.
    pub fn guard<E>(
        &self,
        wait: impl FnOnce() -> Result<Readiness, E>,
    ) -> Result<Readiness, E> {
        if self.is_raised() {
            return Ok(Readiness::Interrupted);
        }
        let readiness = wait()?;
        if self.is_raised() {
            return Ok(Readiness::Interrupted);
        }
        Ok(readiness)
    }
}

/// Whether the controller has been left scanning
#[derive(Debug, Default)]
pub(crate) struct ScanState {
    enabled: bool,
}

impl ScanState {
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn enabled(&mut self) {
        self.enabled = true;
    }

    /// Run `disable` if scanning is on and record the result
    ///
    /// The state only flips once `disable` succeeds, so a failed attempt is
    /// retried on the next call.
    pub(crate) fn disable<E>(&mut self, disable: impl FnOnce() -> Result<(), E>) -> Result<bool, E> {
        if !self.enabled {
            return Ok(false);
        }
        disable()?;
        self.enabled = false;
        Ok(true)
    }
}

/// Scan source backed by a local controller
pub struct HciScanner {
    socket: HciSocket,
    config: ScanConfig,
    duplicates: DuplicateFilter,
    interrupt: InterruptFlag,
    state: ScanState,
}

impl HciScanner {
    /// Open the controller and start scanning with the given configuration
    pub fn open(config: ScanConfig) -> Result<Self, HciError> {
        let socket = HciSocket::open(config.device_id)?;
        socket.set_event_filter(&[EVT_CMD_COMPLETE, EVT_CMD_STATUS, EVT_LE_META_EVENT])?;

        let mut scanner = Self {
            socket,
            duplicates: DuplicateFilter::new(config.filter),
            config,
            interrupt: InterruptFlag::default(),
            state: ScanState::default(),
        };
        scanner.start()?;
        Ok(scanner)
    }

    /// Make waits return `Interrupted` once `flag` is set
    pub fn with_interrupt_flag(mut self, flag: &'static AtomicBool) -> Self {
        self.interrupt = InterruptFlag::new(flag);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn is_scanning(&self) -> bool {
        self.state.is_enabled()
    }

    fn start(&mut self) -> Result<(), HciError> {
        // A scan left enabled by an earlier process makes the parameter command fail
        match self.set_scan_enable(false) {
            Ok(()) | Err(HciError::CommandFailed { .. }) => {}
            Err(e) => return Err(e),
        }

        let params = HciCommand::LeSetScanParameters {
            scan_type: self.config.scan_type.as_raw(),
            scan_interval: self.config.interval,
            scan_window: self.config.window,
            own_address_type: 0x00,
            filter_policy: 0x00,
        };
        self.socket
            .send_command_sync(&params, self.config.command_timeout)?;

        self.set_scan_enable(true)?;
        self.state.enabled();
        info!(
            "LE scan enabled on hci{} ({:?}, duplicates filtered: {:?})",
            self.config.device_id, self.config.scan_type, self.config.filter
        );
        Ok(())
    }

    fn set_scan_enable(&self, enable: bool) -> Result<(), HciError> {
        let command = HciCommand::LeSetScanEnable {
            enable,
            filter_duplicates: self.config.filter.hardware(),
        };
        self.socket
            .send_command_sync(&command, self.config.command_timeout)
            .map(|_| ())
    }

    /// Disable scanning; safe to call more than once
    ///
    /// A failed disable leaves the scanner marked as scanning so that a later
    /// call, or the drop, tries again.
    pub fn stop(&mut self) -> Result<(), HciError> {
        let Self {
            socket,
            config,
            state,
            ..
        } = self;
        let command = HciCommand::LeSetScanEnable {
            enable: false,
            filter_duplicates: config.filter.hardware(),
        };
        let disabled = state.disable(|| {
            socket
                .send_command_sync(&command, config.command_timeout)
                .map(|_| ())
        })?;
        if disabled {
            info!("LE scan disabled on hci{}", config.device_id);
        }
        Ok(())
    }
}

impl ScanSource for HciScanner {
    fn wait(&mut self, timeout: Duration) -> Result<Readiness, ScanError> {
        let socket = &self.socket;
        self.interrupt
            .guard(|| socket.wait_readable(timeout).map_err(ScanError::from))
    }

    fn drain(&mut self) -> Result<Vec<AdvertisingRecord>, ScanError> {
        let mut records = Vec::new();

        while self.socket.wait_readable(Duration::ZERO)? == Readiness::Ready {
            let event = match self.socket.read_event() {
                Ok(event) => event,
                Err(HciError::Interrupted) => break,
                Err(HciError::InvalidPacketFormat) => {
                    warn!("Dropping malformed HCI event");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if !event.is_advertising_report() {
                trace!("Ignoring HCI event 0x{:02x}", event.event_code);
                continue;
            }

            let reports = match LeAdvertisingReport::parse_reports(&event) {
                Ok(reports) => reports,
                Err(e) => {
                    warn!("Dropping advertising report event: {}", e);
                    continue;
                }
            };

            for report in reports {
                if self.duplicates.is_duplicate(&report) {
                    continue;
                }
                records.push(AdvertisingRecord::from_report(&report));
            }
        }

        Ok(records)
    }
}

impl Drop for HciScanner {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            debug!("Failed to disable scanning on drop: {}", e);
        }
    }
}
