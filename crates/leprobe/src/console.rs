//! Line oriented trace of what the probe sees and does

use crate::gap::BdAddr;
use crate::scan::{Classification, RssiDescription};
use crate::uuid::Uuid;
use log::debug;
use std::fmt::Arguments;
use std::io::{self, Write};

/// Writes human readable progress lines
///
/// Output is best effort: a failed write is logged and otherwise ignored so
/// that a closed stdout never stops a scan. Failure notices go to a separate
/// diagnostic stream, stderr unless replaced.
pub struct Console<W: Write> {
    out: W,
    diagnostics: Box<dyn Write>,
}

impl Console<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self::with_diagnostics(out, io::stderr())
    }

    pub fn with_diagnostics(out: W, diagnostics: impl Write + 'static) -> Self {
        Self {
            out,
            diagnostics: Box::new(diagnostics),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, args: Arguments<'_>) {
        write_line(&mut self.out, args);
    }

    fn diagnostic(&mut self, args: Arguments<'_>) {
        write_line(&mut self.diagnostics, args);
    }

    pub fn found_device(&mut self, address: &BdAddr, classification: &Classification) {
        self.line(format_args!("Found device: {} {}", address, classification.label));
    }

    pub fn name(&mut self, name: &str) {
        self.line(format_args!("  Name: {}", name));
    }

    pub fn rssi(&mut self, rssi: &RssiDescription) {
        self.line(format_args!("  {}", rssi));
    }

    pub fn service(&mut self, uuid: &Uuid) {
        self.line(format_args!("  Service: {}", uuid));
    }

    pub fn characteristic(&mut self, uuid: &Uuid) {
        self.line(format_args!("     Char: {}", uuid));
    }

    /// Announces a workflow against `address`
    pub fn handling(&mut self, address: &BdAddr) {
        self.line(format_args!("Handle Ruuvi Tag: {}", address));
    }

    pub fn no_device_name(&mut self) {
        self.diagnostic(format_args!("No device name found."));
    }

    pub fn device_name(&mut self, name: &str) {
        self.line(format_args!("Hello, my name is: {}", name));
    }

    /// Raw write without a line break, for cosmetic progress output
    pub fn write_raw(&mut self, bytes: &[u8]) {
        if let Err(e) = self.out.write_all(bytes).and_then(|_| self.out.flush()) {
            debug!("Console write failed: {}", e);
        }
    }
}

fn write_line<W: Write + ?Sized>(out: &mut W, args: Arguments<'_>) {
    let result = out
        .write_fmt(args)
        .and_then(|_| out.write_all(b"\n"))
        .and_then(|_| out.flush());
    if let Err(e) = result {
        debug!("Console write failed: {}", e);
    }
}
