//! Example: Read the Device Name of a known peer
//!
//! Skips scanning and runs the GATT read workflow against an address given on
//! the command line, e.g. `read_device_name AA:BB:CC:DD:EE:FF random`.

use leprobe::{
    AddressType, BdAddr, Console, GattReadWorkflow, L2capSessionProvider, Peer, WorkflowConfig,
};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let address: BdAddr = args
        .next()
        .ok_or("usage: read_device_name <address> [public|random]")?
        .parse()?;
    let address_type = match args.next().as_deref() {
        Some("random") => AddressType::Random,
        _ => AddressType::Public,
    };

    let config = WorkflowConfig {
        connect_timeout: Some(Duration::from_secs(10)),
        session_timeout: Some(Duration::from_secs(10)),
        trace_pdus: true,
        ..WorkflowConfig::default()
    };
    let mut provider = L2capSessionProvider::new(&config);
    let mut console = Console::stdout();

    let peer = Peer::new(address, address_type);
    println!("Reading Device Name of {}...", peer);
    let report = GattReadWorkflow::new(&config).run(&peer, &mut provider, &mut console);

    println!("Outcome: {:?}", report.outcome);
    if let Some(disconnect) = &report.disconnect {
        println!("Disconnect: {}", disconnect);
    }
    Ok(())
}
