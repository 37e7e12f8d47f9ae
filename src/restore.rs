//! Restore-mode session loop.
//!
//! Once the restore stub is up, the device runs the conversation: it
//! streams progress, asks the host for payloads, and finally reports a
//! terminal status. The host side here answers one message at a time;
//! there is no parallelism inside the session.

mod message;

pub use message::*;

use std::path::Path;

use log::{info, warn};
use plist::{Dictionary, Value};

use crate::bundle::FirmwareBundle;
use crate::dict::{dict_signed, dict_unsigned};
use crate::error::{Error, ErrorKind, Result};
use crate::event::EventMonitor;
use crate::options::RestoreOptions;
use crate::personalize::{signed_component_by_name, signed_component_by_path};
use crate::report::{ReportMessage, ReportSink};
use crate::ticket::Ticket;
use crate::transport::{ImageStreamer, RestoreSession};

/// Service type the restore daemon answers with.
pub const RESTORE_SERVICE_TYPE: &str = "com.apple.mobile.restored";

/// Archive directory holding the NOR flash images.
pub const NOR_FIRMWARE_DIR: &str = "Firmware/all_flash/";

/// Logical name of the NOR low-level bootloader.
pub const NOR_LLB: &str = "LLB";

/// Everything the data-request handlers need to produce payloads.
pub struct RestoreContext<'a> {
    pub bundle: &'a mut FirmwareBundle,
    pub ticket: &'a Ticket,
    /// Extracted filesystem image on local disk
    pub filesystem: &'a Path,
    pub options: &'a RestoreOptions,
}

/// Drives a restore session to completion.
///
/// Per-message handler failures outside the fatal subset are logged and
/// the loop keeps reading; see [ErrorKind::is_fatal].
pub fn run_restore(
    session: &mut dyn RestoreSession,
    streamer: &mut dyn ImageStreamer,
    ctx: &mut RestoreContext<'_>,
    monitor: &EventMonitor,
    sink: &mut dyn ReportSink,
) -> Result<()> {
    let (service, version) = session.query_type()?;
    if service != RESTORE_SERVICE_TYPE {
        return Err(Error::transport(format!(
            "device is not in restore mode, service type is `{service}`"
        )));
    }
    info!("Restore protocol version is {version}");

    session.start_restore()?;

    loop {
        if monitor.quit() {
            return Err(Error::disconnected("device removed during restore"));
        }

        let message = session.receive()?;
        let message = match message.as_dictionary() {
            Some(dict) => dict,
            None => {
                warn!("received a non-dictionary restore message");
                continue;
            }
        };

        let msgtype = match message.get("MsgType").and_then(Value::as_string) {
            Some(s) => s,
            None => {
                warn!("received a restore message without a MsgType");
                continue;
            }
        };

        match MsgType::from(msgtype) {
            MsgType::Progress => handle_progress(message, sink),
            MsgType::Status => return handle_status(message, sink),
            MsgType::DataRequest => {
                if let Err(err) = handle_data_request(session, streamer, ctx, message) {
                    if err.is_fatal() {
                        return Err(err);
                    }
                    warn!("data request failed, continuing: {err}");
                }
            }
            MsgType::Unknown => {
                info!("Received unknown message type: {msgtype}");
                sink.report(&ReportMessage::unclassified());
            }
        }
    }
}

/// Forwards a progress message to the report sink.
fn handle_progress(message: &Dictionary, sink: &mut dyn ReportSink) {
    let operation = dict_unsigned(message, "Operation", ErrorKind::TransportIo).unwrap_or(0);
    let progress = dict_signed(message, "Progress", ErrorKind::TransportIo).unwrap_or(-1);

    sink.report(&ReportMessage::progress(operation, progress));
}

/// Forwards a status message and translates it into the loop's exit.
fn handle_status(message: &Dictionary, sink: &mut dyn ReportSink) -> Result<()> {
    let status = dict_signed(message, "Status", ErrorKind::TransportIo).unwrap_or(-1);
    sink.report(&ReportMessage::status(status));

    if status == 0 {
        info!("Restore completed successfully");
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::RestoreTerminalStatus(status),
            format!("device ended the restore with status {status}"),
        ))
    }
}

/// Dispatches one `DataRequestMsg` to the matching producer.
fn handle_data_request(
    session: &mut dyn RestoreSession,
    streamer: &mut dyn ImageStreamer,
    ctx: &mut RestoreContext<'_>,
    message: &Dictionary,
) -> Result<()> {
    let datatype = match message.get("DataType").and_then(Value::as_string) {
        Some(s) => s,
        None => {
            // tolerated, like any other shapeless message
            warn!("received a data request without a DataType");
            return Ok(());
        }
    };

    match DataType::from(datatype) {
        DataType::SystemImageData => {
            info!("Streaming the filesystem image");
            streamer.send_system_image(ctx.filesystem)
        }
        DataType::KernelCache => {
            let data =
                signed_component_by_name(ctx.bundle, ctx.ticket, "KernelCache", ctx.options)?;
            info!("Sending the kernel cache ({} bytes)", data.len());

            let mut reply = Dictionary::new();
            reply.insert("KernelCacheFile".into(), Value::Data(data));
            session.send(Value::Dictionary(reply))
        }
        DataType::NorData => {
            let payload = nor_payload(ctx)?;
            info!("Sending the NOR flash payload");
            session.send(payload)
        }
        DataType::Unknown => Err(Error::new(
            ErrorKind::RestoreUnknownDataType,
            datatype.to_string(),
        )),
    }
}

/// Builds the composite NOR payload: the low-level bootloader plus
/// every other flash image named by the ticket.
fn nor_payload(ctx: &mut RestoreContext<'_>) -> Result<Value> {
    let llb = signed_component_by_name(ctx.bundle, ctx.ticket, NOR_LLB, ctx.options)?;

    let flash_paths: Vec<String> = ctx
        .ticket
        .entries()
        .filter(|(name, path)| *name != NOR_LLB && path.starts_with(NOR_FIRMWARE_DIR))
        .map(|(_name, path)| path.to_string())
        .collect();

    let mut images = Vec::with_capacity(flash_paths.len());
    for path in flash_paths {
        let data = signed_component_by_path(ctx.bundle, ctx.ticket, &path, ctx.options)?;
        images.push(Value::Data(data));
    }

    let mut payload = Dictionary::new();
    payload.insert("LlbImageData".into(), Value::Data(llb));
    payload.insert("NorImageData".into(), Value::Array(images));

    Ok(Value::Dictionary(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::img3::test_img3::container;
    use crate::img3::Img3;
    use crate::ticket::test_ticket::ticket_with_entries;

    use std::fs::File;
    use std::io::Write;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Scripted session: hands out queued messages, records sends.
    struct ScriptedSession {
        incoming: Vec<Value>,
        sent: Vec<Value>,
    }

    impl RestoreSession for ScriptedSession {
        fn query_type(&mut self) -> Result<(String, u64)> {
            Ok((RESTORE_SERVICE_TYPE.into(), 14))
        }

        fn start_restore(&mut self) -> Result<()> {
            Ok(())
        }

        fn receive(&mut self) -> Result<Value> {
            if self.incoming.is_empty() {
                return Err(Error::transport("message queue exhausted"));
            }
            Ok(self.incoming.remove(0))
        }

        fn send(&mut self, message: Value) -> Result<()> {
            self.sent.push(message);
            Ok(())
        }
    }

    struct NullStreamer;

    impl ImageStreamer for NullStreamer {
        fn send_system_image(&mut self, _image: &Path) -> Result<()> {
            Ok(())
        }
    }

    struct NullSink;

    impl ReportSink for NullSink {
        fn report(&mut self, _message: &ReportMessage) {}
    }

    fn data_request(datatype: &str) -> Value {
        let mut dict = Dictionary::new();
        dict.insert("MsgType".into(), Value::String("DataRequestMsg".into()));
        dict.insert("DataType".into(), Value::String(datatype.into()));
        Value::Dictionary(dict)
    }

    fn status_msg(status: i64) -> Value {
        let mut dict = Dictionary::new();
        dict.insert("MsgType".into(), Value::String("StatusMsg".into()));
        dict.insert("Status".into(), Value::from(status));
        Value::Dictionary(dict)
    }

    fn bundle_with(entries: &[(&str, &[u8])]) -> (tempfile::TempDir, FirmwareBundle) {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("bundle.ipsw");
        let mut writer = ZipWriter::new(File::create(&path).expect("create"));
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start file");
            writer.write_all(data).expect("write entry");
        }
        writer.finish().expect("finish");

        let bundle = FirmwareBundle::open(&path).expect("open bundle");
        (dir, bundle)
    }

    #[test]
    fn test_nor_payload_composition() -> Result<()> {
        let llb = container(0x696c_6c62, &[0x01; 16], Some(&[0xee; 4]));
        let logo = container(0x6c6f_676f, &[0x02; 16], Some(&[0xee; 4]));
        let chime = container(0x6368_6d65, &[0x03; 16], Some(&[0xee; 4]));
        let kernel = container(0x6b72_6e6c, &[0x04; 16], Some(&[0xee; 4]));

        let (_dir, mut bundle) = bundle_with(&[
            ("Firmware/all_flash/LLB.img3", &llb),
            ("Firmware/all_flash/applelogo.img3", &logo),
            ("Firmware/all_flash/recoverymode.img3", &chime),
            ("kernelcache.release", &kernel),
        ]);
        let ticket = ticket_with_entries(&[
            ("LLB", "Firmware/all_flash/LLB.img3", b"llb-blob"),
            ("AppleLogo", "Firmware/all_flash/applelogo.img3", b"logo-blob"),
            ("RecoveryMode", "Firmware/all_flash/recoverymode.img3", b"chime-blob"),
            // outside the flash directory, must not be swept up
            ("KernelCache", "kernelcache.release", b"kc-blob"),
        ]);
        let options = RestoreOptions::new();
        let fs_path = std::path::PathBuf::from("unused.dmg");
        let mut ctx = RestoreContext {
            bundle: &mut bundle,
            ticket: &ticket,
            filesystem: &fs_path,
            options: &options,
        };

        let payload = nor_payload(&mut ctx)?;
        let payload = payload.as_dictionary().expect("dictionary payload");

        let llb_data = payload
            .get("LlbImageData")
            .and_then(Value::as_data)
            .expect("LLB data");
        assert_eq!(
            Img3::parse(llb_data)?.signature(),
            Some(b"llb-blob".as_ref())
        );

        let images = payload
            .get("NorImageData")
            .and_then(Value::as_array)
            .expect("NOR image array");
        assert_eq!(images.len(), 2);

        for image in images {
            let data = image.as_data().expect("image data");
            let img3 = Img3::parse(data)?;
            let signature = img3.signature().expect("signature");
            assert!(signature == b"logo-blob" || signature == b"chime-blob");
        }

        Ok(())
    }

    /// A per-message failure outside the fatal subset is reported and
    /// the loop keeps servicing the session.
    #[test]
    fn test_transient_handler_error_continues() -> Result<()> {
        // the ticket names a kernel cache the bundle does not carry
        let (_dir, mut bundle) = bundle_with(&[("BuildManifest.plist", b"x")]);
        let ticket = ticket_with_entries(&[("KernelCache", "kernelcache.release", b"kc-blob")]);
        let options = RestoreOptions::new();
        let fs_path = std::path::PathBuf::from("unused.dmg");
        let mut ctx = RestoreContext {
            bundle: &mut bundle,
            ticket: &ticket,
            filesystem: &fs_path,
            options: &options,
        };

        let mut session = ScriptedSession {
            incoming: vec![data_request("KernelCache"), status_msg(0)],
            sent: Vec::new(),
        };
        let monitor = EventMonitor::new();

        run_restore(
            &mut session,
            &mut NullStreamer,
            &mut ctx,
            &monitor,
            &mut NullSink,
        )?;

        // the failed request produced no reply, and the loop reached
        // the terminal status
        assert!(session.sent.is_empty());
        assert!(session.incoming.is_empty());

        Ok(())
    }

    /// A quit raised by the detach observer ends the loop before the
    /// next receive.
    #[test]
    fn test_quit_checked_every_iteration() {
        let (_dir, mut bundle) = bundle_with(&[("BuildManifest.plist", b"x")]);
        let ticket = ticket_with_entries(&[]);
        let options = RestoreOptions::new();
        let fs_path = std::path::PathBuf::from("unused.dmg");
        let mut ctx = RestoreContext {
            bundle: &mut bundle,
            ticket: &ticket,
            filesystem: &fs_path,
            options: &options,
        };

        let mut session = ScriptedSession {
            incoming: vec![status_msg(0)],
            sent: Vec::new(),
        };
        let monitor = EventMonitor::new();
        monitor.set_quit();

        let err = run_restore(
            &mut session,
            &mut NullStreamer,
            &mut ctx,
            &monitor,
            &mut NullSink,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Disconnected);
        // nothing was read after the quit
        assert_eq!(session.incoming.len(), 1);
    }
}
