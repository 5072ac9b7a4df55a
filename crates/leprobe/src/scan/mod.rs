//! Bluetooth LE scanning
//!
//! The discovery side of the probe: the HCI-backed scan source, the records it
//! produces, their classification for display, and the loop that polls the
//! source with a timeout.

pub mod classify;
pub mod event_loop;
pub mod record;
pub mod scanner;

#[cfg(test)]
mod tests;

pub use classify::{classify, Classification, RssiDescription};
pub use event_loop::{LoopSummary, ScanEventLoop, ScanHandler, ScanSource};
pub use record::{AdvertisingEventType, AdvertisingRecord};
pub use scanner::{DuplicateFilter, HciScanner, InterruptFlag};

/// Parse advertisement data into its AD structures
///
/// # Arguments
///
/// * `data` - The advertisement data
///
/// # Returns
///
/// A vector of (type, data) tuples. Parsing stops at the first zero-length or
/// truncated structure.
pub fn parse_advertising_data(data: &[u8]) -> Vec<(u8, &[u8])> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i] as usize;
        if length == 0 || i + length >= data.len() {
            break;
        }

        let ad_type = data[i + 1];
        let ad_data = &data[i + 2..i + 1 + length];

        result.push((ad_type, ad_data));

        i += 1 + length;
    }

    result
}
