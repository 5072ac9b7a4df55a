//! Terminal cosmetics: the idle throbber and cursor visibility

use leprobe::{AdvertisingRecord, DeviceProbe, ScanHandler, SessionProvider};
use std::io::Write;

const THROBBER: &[u8] = b"/|\\-";

const HIDE_CURSOR: &[u8] = b"\x1b[?25l";
const SHOW_CURSOR: &[u8] = b"\x1b[?25h";

/// Spins a character on every idle tick of the scan loop
pub struct Throbber<P: SessionProvider, W: Write> {
    probe: DeviceProbe<P, W>,
}

impl<P: SessionProvider, W: Write> Throbber<P, W> {
    pub fn new(probe: DeviceProbe<P, W>) -> Self {
        Self { probe }
    }

    pub fn probe(&self) -> &DeviceProbe<P, W> {
        &self.probe
    }
}

impl<P: SessionProvider, W: Write> ScanHandler for Throbber<P, W> {
    fn on_idle(&mut self, tick: u64) {
        let glyph = THROBBER[(tick % THROBBER.len() as u64) as usize];
        self.probe.console_mut().write_raw(&[glyph, b'\x08']);
    }

    fn on_record(&mut self, record: &AdvertisingRecord) {
        self.probe.on_record(record);
    }
}

/// Hides the terminal cursor until dropped
pub struct CursorGuard;

impl CursorGuard {
    pub fn hide() -> Self {
        let mut out = std::io::stdout();
        let _ = out.write_all(HIDE_CURSOR).and_then(|_| out.flush());
        CursorGuard
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        let mut out = std::io::stdout();
        let _ = out.write_all(SHOW_CURSOR).and_then(|_| out.flush());
    }
}
