mod cli;
mod signal;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use leprobe::{
    Console, DeviceProbe, HciScanner, L2capSessionProvider, ScanEventLoop,
};
use log::{info, LevelFilter};
use std::process::ExitCode;

use crate::cli::Cli;
use crate::ui::{CursorGuard, Throbber};

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // RUST_LOG, when set, overrides the verbosity flags
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let interrupted = signal::install().context("Failed to install SIGINT handler")?;

    let scan_config = cli.scan_config();
    let poll_timeout = scan_config.poll_timeout;
    let device_id = scan_config.device_id;
    let mut scanner = HciScanner::open(scan_config)
        .with_context(|| format!("Failed to start LE scan on hci{}", device_id))?
        .with_interrupt_flag(interrupted);

    let probe_config = cli.probe_config();
    let provider = L2capSessionProvider::new(&probe_config.workflow);
    let probe = DeviceProbe::new(probe_config, provider, Console::stdout());
    let mut handler = Throbber::new(probe);

    let result = {
        let _cursor = CursorGuard::hide();
        ScanEventLoop::new(poll_timeout).run(&mut scanner, &mut handler)
    };

    scanner.stop().context("Failed to disable LE scan")?;
    let summary = result.context("Scan loop failed")?;

    let stats = handler.probe().stats();
    info!(
        "Saw {} advertisements ({} idle ticks), ran {} reads, {} names, {} failures",
        summary.records, summary.idle_ticks, stats.workflows, stats.names_read, stats.failures
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
