//! Deciding which advertisers get a GATT connection

use crate::gap::Peer;
use crate::gatt::WorkflowReport;
use crate::scan::AdvertisingRecord;
use crate::uuid::Uuid;
use log::debug;

/// Receives the service UUIDs of a record and runs workflows on demand
pub trait Launcher {
    /// Called for every advertised service UUID, in order
    fn announce(&mut self, uuid: &Uuid);

    /// Run the read workflow against `peer` and wait for it to finish
    fn launch(&mut self, peer: &Peer) -> WorkflowReport;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceTrigger {
    target: Uuid,
}

impl ServiceTrigger {
    pub fn new(target: Uuid) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Uuid {
        &self.target
    }

    pub fn matches(&self, record: &AdvertisingRecord) -> bool {
        record.service_uuids.contains(&self.target)
    }

    /// Announce each service of `record` and launch a workflow where the target appears
    ///
    /// The remaining UUIDs are still announced after a launch.
    pub fn dispatch<L>(&self, record: &AdvertisingRecord, launcher: &mut L) -> Vec<WorkflowReport>
    where
        L: Launcher + ?Sized,
    {
        let mut reports = Vec::new();
        for uuid in &record.service_uuids {
            launcher.announce(uuid);
            if *uuid == self.target {
                debug!("{} advertises {}, launching read", record.address, uuid);
                reports.push(launcher.launch(&record.peer()));
            }
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NORDIC_UART_SERVICE;
    use crate::gatt::{WorkflowOutcome, WorkflowState};
    use crate::scan::AdvertisingEventType;

    #[derive(Default)]
    struct Recorder {
        announced: Vec<Uuid>,
        launched: Vec<Peer>,
    }

    impl Launcher for Recorder {
        fn announce(&mut self, uuid: &Uuid) {
            self.announced.push(*uuid);
        }

        fn launch(&mut self, peer: &Peer) -> WorkflowReport {
            self.launched.push(*peer);
            WorkflowReport {
                address: peer.address,
                outcome: WorkflowOutcome::NoDeviceName,
                disconnect: None,
                state: WorkflowState::Closed,
            }
        }
    }

    fn record(services: &[Uuid]) -> AdvertisingRecord {
        services.iter().fold(
            AdvertisingRecord::new(
                "AA:BB:CC:DD:EE:FF".parse().unwrap(),
                AdvertisingEventType::ConnectableUndirected,
                -50,
            ),
            |record, uuid| record.with_service(*uuid),
        )
    }

    #[test]
    fn test_trigger_fires_once_wherever_target_appears() {
        let trigger = ServiceTrigger::new(NORDIC_UART_SERVICE);
        let battery = Uuid::from_u16(0x180F);
        let heart = Uuid::from_u16(0x180D);

        for services in [
            vec![NORDIC_UART_SERVICE, battery, heart],
            vec![battery, NORDIC_UART_SERVICE, heart],
            vec![battery, heart, NORDIC_UART_SERVICE],
            vec![NORDIC_UART_SERVICE, battery, NORDIC_UART_SERVICE],
        ] {
            let mut launcher = Recorder::default();
            let record = record(&services);
            assert!(trigger.matches(&record));

            let reports = trigger.dispatch(&record, &mut launcher);

            assert_eq!(reports.len(), 1);
            assert_eq!(launcher.launched, vec![record.peer()]);
            assert_eq!(launcher.announced, record.service_uuids);
        }
    }

    #[test]
    fn test_trigger_ignores_other_services() {
        let trigger = ServiceTrigger::new(NORDIC_UART_SERVICE);
        let mut launcher = Recorder::default();
        let record = record(&[Uuid::from_u16(0x180F)]);

        assert!(!trigger.matches(&record));
        assert!(trigger.dispatch(&record, &mut launcher).is_empty());
        assert!(launcher.launched.is_empty());
        assert_eq!(launcher.announced, vec![Uuid::from_u16(0x180F)]);

        assert!(trigger
            .dispatch(&self::record(&[]), &mut launcher)
            .is_empty());
    }
}
