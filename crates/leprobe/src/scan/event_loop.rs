//! The discovery loop
//!
//! Polls a [`ScanSource`] with a bounded wait. Every wake-up with data drains
//! the source completely and hands the records to a [`ScanHandler`] in
//! delivery order; a wait that times out produces one idle tick instead.

use crate::config::DEFAULT_POLL_TIMEOUT;
use crate::error::ScanError;
use crate::hci::Readiness;
use crate::scan::record::AdvertisingRecord;
use log::{debug, trace};
use std::time::Duration;

/// Something that produces advertisement records
pub trait ScanSource {
    /// Block until records are available, the timeout expires or the wait is interrupted
    fn wait(&mut self, timeout: Duration) -> Result<Readiness, ScanError>;

    /// Take every record that is currently available without blocking
    fn drain(&mut self) -> Result<Vec<AdvertisingRecord>, ScanError>;
}

/// Receives what the loop observes
pub trait ScanHandler {
    /// Called once per wait that expired without data; `tick` counts from zero
    fn on_idle(&mut self, _tick: u64) {}

    fn on_record(&mut self, record: &AdvertisingRecord);
}

/// What happened before the loop returned cleanly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub idle_ticks: u64,
    pub records: u64,
}

pub struct ScanEventLoop {
    poll_timeout: Duration,
}

impl Default for ScanEventLoop {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_TIMEOUT)
    }
}

impl ScanEventLoop {
    pub fn new(poll_timeout: Duration) -> Self {
        Self { poll_timeout }
    }

    /// Run until the wait is interrupted
    ///
    /// Returns `Ok` on interruption so the caller can stop scanning. Any other
    /// wait or drain failure ends the loop with that error.
    pub fn run<S, H>(&self, source: &mut S, handler: &mut H) -> Result<LoopSummary, ScanError>
    where
        S: ScanSource + ?Sized,
        H: ScanHandler + ?Sized,
    {
        let mut summary = LoopSummary::default();

        loop {
            match source.wait(self.poll_timeout)? {
                Readiness::Interrupted => {
                    debug!(
                        "Scan loop interrupted after {} records, {} idle ticks",
                        summary.records, summary.idle_ticks
                    );
                    return Ok(summary);
                }
                Readiness::TimedOut => {
                    handler.on_idle(summary.idle_ticks);
                    summary.idle_ticks += 1;
                }
                Readiness::Ready => {
                    let records = source.drain()?;
                    trace!("Drained {} records", records.len());
                    for record in &records {
                        handler.on_record(record);
                        summary.records += 1;
                    }
                }
            }
        }
    }
}
