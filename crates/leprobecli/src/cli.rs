use clap::{ArgAction, Parser};
use leprobe::{
    FilterDuplicates, ProbeConfig, ScanConfig, ScanType, Uuid, WorkflowConfig,
    NORDIC_UART_SERVICE,
};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "leprobe")]
#[command(about = "Scan for Bluetooth LE devices and read the name of those advertising a service")]
pub struct Cli {
    /// Filter duplicate advertisements in software (default)
    #[arg(short = 's', long, overrides_with_all = ["hardware", "both", "no_filter"])]
    pub software: bool,

    /// Let the controller filter duplicate advertisements
    #[arg(short = 'H', long, overrides_with_all = ["software", "both", "no_filter"])]
    pub hardware: bool,

    /// Filter duplicates in both the controller and software
    #[arg(short = 'b', long, overrides_with_all = ["software", "hardware", "no_filter"])]
    pub both: bool,

    /// Report every advertisement
    #[arg(short = 'd', long = "no-filter", overrides_with_all = ["software", "hardware", "both"])]
    pub no_filter: bool,

    /// Passive scan: do not request scan responses
    #[arg(short = 'p', long)]
    pub passive: bool,

    /// HCI device index (0 for hci0)
    #[arg(short = 'i', long, default_value_t = 0)]
    pub device: u16,

    /// Service UUID that triggers a Device Name read
    #[arg(short = 't', long, default_value_t = NORDIC_UART_SERVICE)]
    pub target: Uuid,

    /// Give up connecting after this many seconds
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// Give up on discovery and read after this many seconds
    #[arg(long, value_name = "SECS")]
    pub session_timeout: Option<u64>,

    /// Hex-dump ATT PDUs at debug level
    #[arg(long)]
    pub trace_pdus: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn filter(&self) -> FilterDuplicates {
        if self.hardware {
            FilterDuplicates::Hardware
        } else if self.both {
            FilterDuplicates::Both
        } else if self.no_filter {
            FilterDuplicates::Off
        } else {
            FilterDuplicates::Software
        }
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            device_id: self.device,
            scan_type: if self.passive {
                ScanType::Passive
            } else {
                ScanType::Active
            },
            filter: self.filter(),
            ..ScanConfig::default()
        }
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            target: self.target,
            workflow: WorkflowConfig {
                connect_timeout: self.connect_timeout.map(Duration::from_secs),
                session_timeout: self.session_timeout.map(Duration::from_secs),
                trace_pdus: self.trace_pdus,
                ..WorkflowConfig::default()
            },
        }
    }
}
