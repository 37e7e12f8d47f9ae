//! Mode transitions and the boot-chain upload sequence.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::bundle::FirmwareBundle;
use crate::device::DeviceMode;
use crate::error::{Error, ErrorKind, Result};
use crate::event::EventMonitor;
use crate::options::RestoreOptions;
use crate::personalize::signed_component_by_name;
use crate::ticket::Ticket;
use crate::transport::{ManagementChannel, OperatorPrompt, RecoveryTransport, TransportProvider};

/// Boot-chain components, in the only order recovery mode accepts
/// them. The operator reattach gate sits before the final entry.
pub const BOOT_CHAIN: [&str; 5] = [
    "iBEC",
    "AppleLogo",
    "DeviceTree",
    "RestoreRamDisk",
    "KernelCache",
];

/// Settle time after handing control to the uploaded bootloader.
pub const IBEC_SETTLE: Duration = Duration::from_secs(1);

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Reboots a normal-mode device into recovery. Consumes the channel;
/// it is dead once the device acts on the request.
pub fn enter_recovery(mut channel: Box<dyn ManagementChannel>) -> Result<()> {
    info!("Entering recovery mode...");
    channel.enter_recovery()
}

/// Waits for the recovery transport to come up after the mode flip.
pub fn acquire_recovery(
    provider: &dyn TransportProvider,
    monitor: &EventMonitor,
    timeout: Duration,
) -> Result<Box<dyn RecoveryTransport>> {
    let start = Instant::now();

    loop {
        if monitor.quit() {
            return Err(Error::disconnected("device removed during the mode flip"));
        }

        match provider.open_recovery() {
            Ok(transport) => return Ok(transport),
            Err(err) => debug!("recovery transport not up yet: {err}"),
        }

        if start.elapsed() >= timeout {
            return Err(Error::new(
                ErrorKind::DeviceNotFound,
                "device did not reappear in recovery mode",
            ));
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Uploads the boot chain in the fixed order, pausing for the operator
/// reattach gate before the kernel cache.
pub fn upload_boot_chain(
    bundle: &mut FirmwareBundle,
    ticket: &Ticket,
    transport: &mut dyn RecoveryTransport,
    operator: &mut dyn OperatorPrompt,
    options: &RestoreOptions,
) -> Result<()> {
    let last = BOOT_CHAIN.len() - 1;

    for (step, &component) in BOOT_CHAIN.iter().enumerate() {
        if step == last {
            // iBoot wants a USB reset after the ramdisk before it will
            // accept the kernel cache.
            operator.acknowledge_reattach()?;
        }

        let data = signed_component_by_name(bundle, ticket, component, options)?;
        info!("Sending {component} ({} bytes)", data.len());
        transport.upload(component, &data)?;

        if component == "iBEC" {
            thread::sleep(IBEC_SETTLE);
        }
    }

    Ok(())
}

/// Blocks until the attach observer reports the restore stub, the quit
/// flag is raised, or the timeout lapses.
pub fn await_restore_mode(monitor: &EventMonitor, timeout: Duration) -> Result<()> {
    let start = Instant::now();

    loop {
        if monitor.mode() == DeviceMode::Restore {
            return Ok(());
        }

        if monitor.quit() {
            return Err(Error::disconnected(
                "device removed while waiting for restore mode",
            ));
        }

        if start.elapsed() >= timeout {
            return Err(Error::transport(
                "timed out waiting for the device to enter restore mode",
            ));
        }

        thread::sleep(POLL_INTERVAL);
    }
}
