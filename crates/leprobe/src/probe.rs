//! The scan handler that ties discovery to the read workflow

use crate::config::ProbeConfig;
use crate::console::Console;
use crate::gap::Peer;
use crate::gatt::{GattReadWorkflow, SessionProvider, WorkflowOutcome, WorkflowReport};
use crate::scan::{classify, AdvertisingRecord, ScanHandler};
use crate::trigger::{Launcher, ServiceTrigger};
use crate::uuid::Uuid;
use std::io::Write;

/// Counters kept across the lifetime of a probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeStats {
    pub records: u64,
    pub workflows: u64,
    pub names_read: u64,
    pub failures: u64,
}

/// Prints every advertisement and reads the Device Name of target advertisers
pub struct DeviceProbe<P: SessionProvider, W: Write> {
    config: ProbeConfig,
    trigger: ServiceTrigger,
    provider: P,
    console: Console<W>,
    stats: ProbeStats,
    last_report: Option<WorkflowReport>,
}

impl<P: SessionProvider, W: Write> DeviceProbe<P, W> {
    pub fn new(config: ProbeConfig, provider: P, console: Console<W>) -> Self {
        Self {
            trigger: ServiceTrigger::new(config.target),
            config,
            provider,
            console,
            stats: ProbeStats::default(),
            last_report: None,
        }
    }

    pub fn stats(&self) -> ProbeStats {
        self.stats
    }

    pub fn last_report(&self) -> Option<&WorkflowReport> {
        self.last_report.as_ref()
    }

    pub fn console_mut(&mut self) -> &mut Console<W> {
        &mut self.console
    }

    pub fn into_console(self) -> Console<W> {
        self.console
    }
}

impl<P: SessionProvider, W: Write> Launcher for DeviceProbe<P, W> {
    fn announce(&mut self, uuid: &Uuid) {
        self.console.service(uuid);
    }

    fn launch(&mut self, peer: &Peer) -> WorkflowReport {
        self.stats.workflows += 1;
        self.console.handling(&peer.address);
        let report = GattReadWorkflow::new(&self.config.workflow).run(
            peer,
            &mut self.provider,
            &mut self.console,
        );

        match report.outcome {
            WorkflowOutcome::Name(_) => self.stats.names_read += 1,
            WorkflowOutcome::NoDeviceName => {}
            _ => self.stats.failures += 1,
        }
        self.last_report = Some(report.clone());
        report
    }
}

impl<P: SessionProvider, W: Write> ScanHandler for DeviceProbe<P, W> {
    fn on_record(&mut self, record: &AdvertisingRecord) {
        self.stats.records += 1;

        let classification = classify(record);
        self.console.found_device(&record.address, &classification);
        if let Some(name) = &record.local_name {
            self.console.name(name);
        }
        self.console.rssi(&classification.rssi);

        let trigger = self.trigger;
        trigger.dispatch(record, self);
    }
}
