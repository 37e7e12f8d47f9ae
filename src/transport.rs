//! Trait seams for the device-facing collaborators.
//!
//! The engine drives three mode-scoped channels plus an on-device image
//! streamer. Hardware backends (usbmuxd, USB/HID recovery) live behind
//! these traits; the test suite scripts them.

use std::io::{self, BufRead, Write};
use std::path::Path;

use plist::Value;

use crate::error::Result;
use crate::event::EventMonitor;

/// Normal-mode management channel.
pub trait ManagementChannel {
    /// Queries a named device property.
    fn lookup(&mut self, key: &str) -> Result<Value>;

    /// Instructs the device to reboot into recovery mode.
    ///
    /// The channel is dead afterwards; callers drop it.
    fn enter_recovery(&mut self) -> Result<()>;
}

/// Recovery-mode transport.
pub trait RecoveryTransport {
    /// Queries the unique chip identifier.
    fn ecid(&mut self) -> Result<u64>;

    /// Sends one raw signed-image payload to the device.
    fn upload(&mut self, component: &str, data: &[u8]) -> Result<()>;
}

/// Restore-mode message stream.
pub trait RestoreSession {
    /// Queries the service type and advisory protocol version.
    fn query_type(&mut self) -> Result<(String, u64)>;

    /// Kicks off the restore on the device side.
    fn start_restore(&mut self) -> Result<()>;

    /// Receives the next device message. Blocks.
    fn receive(&mut self) -> Result<Value>;

    /// Sends one message to the device.
    fn send(&mut self, message: Value) -> Result<()>;
}

/// Streams the filesystem image file to the on-device receiver.
pub trait ImageStreamer {
    fn send_system_image(&mut self, image: &Path) -> Result<()>;
}

/// Factory for the mode-scoped channels.
///
/// `open_management` and `open_recovery` double as the mode probes:
/// they fail when no device answers enumeration on that channel.
pub trait TransportProvider {
    fn open_management(&self, uuid: Option<&str>) -> Result<Box<dyn ManagementChannel>>;

    fn open_recovery(&self) -> Result<Box<dyn RecoveryTransport>>;

    fn open_restore(&self, uuid: Option<&str>) -> Result<Box<dyn RestoreSession>>;

    fn image_streamer(&self) -> Result<Box<dyn ImageStreamer>>;

    /// Registers the observer for attach/detach events.
    fn subscribe(&self, monitor: EventMonitor) -> Result<()>;
}

/// Operator acknowledgement points in the restore flow.
///
/// The bootloader stalls without a USB reset between the ramdisk and
/// the kernel cache, so the flow pauses until a human (or a script)
/// confirms the device was reattached.
pub trait OperatorPrompt {
    fn acknowledge_reattach(&mut self) -> Result<()>;
}

/// Console-backed [OperatorPrompt]: prints the instruction and waits
/// for a line on stdin.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsolePrompt;

impl OperatorPrompt for ConsolePrompt {
    fn acknowledge_reattach(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        writeln!(stdout, "Please unplug your device, then plug it back in")?;
        write!(stdout, "Hit enter to continue...")?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;

        Ok(())
    }
}
