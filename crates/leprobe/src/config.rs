//! Configuration for the scanner, the GATT workflow and the probe that ties them together

use crate::hci::constants::{LE_SCAN_ACTIVE, LE_SCAN_INTERVAL, LE_SCAN_PASSIVE, LE_SCAN_WINDOW};
use crate::uuid::Uuid;
use std::time::Duration;

/// Nordic UART service, advertised by RuuviTag sensors
pub const NORDIC_UART_SERVICE: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

/// How long the discovery loop waits for advertising data before an idle tick
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanType {
    Passive,
    #[default]
    Active,
}

impl ScanType {
    pub fn as_raw(&self) -> u8 {
        match self {
            ScanType::Passive => LE_SCAN_PASSIVE,
            ScanType::Active => LE_SCAN_ACTIVE,
        }
    }
}

/// Where duplicate advertisements are suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterDuplicates {
    /// Report every advertisement
    Off,
    /// Ask the controller to filter
    Hardware,
    /// Filter in the host
    #[default]
    Software,
    Both,
}

impl FilterDuplicates {
    pub fn hardware(&self) -> bool {
        matches!(self, FilterDuplicates::Hardware | FilterDuplicates::Both)
    }

    pub fn software(&self) -> bool {
        matches!(self, FilterDuplicates::Software | FilterDuplicates::Both)
    }
}

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// HCI device index (0 for `hci0`)
    pub device_id: u16,
    pub scan_type: ScanType,
    pub filter: FilterDuplicates,
    /// Scan interval in 0.625 ms units
    pub interval: u16,
    /// Scan window in 0.625 ms units
    pub window: u16,
    /// Wait bound for one turn of the discovery loop
    pub poll_timeout: Duration,
    /// Bound on each command/response exchange with the controller
    pub command_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            scan_type: ScanType::Active,
            filter: FilterDuplicates::Software,
            interval: LE_SCAN_INTERVAL,
            window: LE_SCAN_WINDOW,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            command_timeout: Duration::from_secs(2),
        }
    }
}

/// GATT read workflow configuration
#[derive(Debug, Clone, Default)]
pub struct WorkflowConfig {
    /// Bound on the blocking connect; `None` waits as long as the kernel does
    pub connect_timeout: Option<Duration>,
    /// Bound on discovery, read and teardown together; `None` is unbounded
    pub session_timeout: Option<Duration>,
    /// Hex-dump every ATT PDU at debug level
    pub trace_pdus: bool,
}

/// Configuration of the scan handler that classifies records and triggers reads
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Service UUID whose presence triggers a device name read
    pub target: Uuid,
    pub workflow: WorkflowConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target: NORDIC_UART_SERVICE,
            workflow: WorkflowConfig::default(),
        }
    }
}
