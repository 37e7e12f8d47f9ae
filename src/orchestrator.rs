//! End-to-end restore composition.

use std::path::Path;
use std::time::Duration;

use log::{error, info};
use tempfile::TempDir;

use crate::bundle::FirmwareBundle;
use crate::device::{self, DeviceMode, ProbedDevice};
use crate::error::{Error, ErrorKind, Phase, Result};
use crate::event::EventMonitor;
use crate::logging::init_logging;
use crate::manifest::Manifest;
use crate::options::RestoreOptions;
use crate::recovery;
use crate::report::{LogSink, ReportMessage, ReportSink};
use crate::restore::{self, RestoreContext};
use crate::transport::{ConsolePrompt, OperatorPrompt, TransportProvider};
use crate::tss::{SigningAuthority, SigningRequest};
use crate::BUILD_MANIFEST_ENTRY;

/// How long the recovery transport gets to come up after the mode flip.
pub const RECOVERY_FLIP_TIMEOUT: Duration = Duration::from_secs(60);
/// How long the restore stub gets to boot after the kernel cache upload.
pub const RESTORE_MODE_TIMEOUT: Duration = Duration::from_secs(180);

/// Drives one complete restore: probe, personalize, transition, serve.
///
/// The restorer exclusively owns the bundle handle, the ticket, and the
/// current device channel; channels live only for the duration of their
/// mode, and the staged filesystem image is removed on every exit path.
pub struct Restorer<'a> {
    provider: &'a dyn TransportProvider,
    signer: &'a dyn SigningAuthority,
    operator: Box<dyn OperatorPrompt + 'a>,
    sink: Box<dyn ReportSink + 'a>,
    options: RestoreOptions,
    monitor: EventMonitor,
}

impl<'a> Restorer<'a> {
    /// Creates a restorer with the console operator prompt, the logging
    /// report sink, and default options.
    pub fn new(provider: &'a dyn TransportProvider, signer: &'a dyn SigningAuthority) -> Self {
        Self {
            provider,
            signer,
            operator: Box::new(ConsolePrompt),
            sink: Box::new(LogSink),
            options: RestoreOptions::default(),
            monitor: EventMonitor::new(),
        }
    }

    pub fn with_options(mut self, options: RestoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the operator prompt, making the reattach gate
    /// scriptable.
    pub fn with_operator(mut self, operator: Box<dyn OperatorPrompt + 'a>) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn ReportSink + 'a>) -> Self {
        self.sink = sink;
        self
    }

    /// Gets the shared mode/quit cell, e.g. to wire a signal handler.
    pub fn monitor(&self) -> &EventMonitor {
        &self.monitor
    }

    /// Runs the restore end to end.
    ///
    /// On failure the returned error names the phase that failed; all
    /// owned resources are released regardless.
    pub fn run<P: AsRef<Path>>(&mut self, bundle_path: P) -> Result<()> {
        init_logging(self.options.verbosity());

        self.run_inner(bundle_path.as_ref()).map_err(|err| {
            error!("{err}");
            err
        })
    }

    fn run_inner(&mut self, bundle_path: &Path) -> Result<()> {
        self.provider
            .subscribe(self.monitor.clone())
            .map_err(|e| e.in_phase(Phase::Probe))?;

        let mut probed = device::probe(self.provider, self.options.uuid())
            .map_err(|e| e.in_phase(Phase::Probe))?;
        let starting_mode = probed.mode();
        info!("Found device in {starting_mode} mode");
        self.monitor.set_mode(starting_mode);
        self.sink.report(&ReportMessage::mode(starting_mode));

        let ecid = device::ecid(&mut probed).map_err(|e| e.in_phase(Phase::Identity))?;
        info!("Found ECID {ecid}");

        let mut bundle =
            FirmwareBundle::open(bundle_path).map_err(|e| e.in_phase(Phase::Bundle))?;
        info!("Extracting {BUILD_MANIFEST_ENTRY} from the firmware bundle");
        let manifest_bytes = bundle
            .extract_to_memory(BUILD_MANIFEST_ENTRY)
            .map_err(|e| e.in_phase(Phase::Bundle))?;
        let manifest =
            Manifest::parse(&manifest_bytes).map_err(|e| e.in_phase(Phase::Manifest))?;
        if let Some(version) = manifest.product_version() {
            info!("Firmware version {version}");
        }

        info!("Creating signing request");
        let request = SigningRequest::from_manifest(&manifest, ecid)
            .map_err(|e| e.in_phase(Phase::Signing))?;
        let ticket = self
            .signer
            .submit(&request)
            .map_err(|e| e.in_phase(Phase::Signing))?;
        info!("Received a signing ticket");

        let filesystem = request
            .filesystem_path()
            .map_err(|e| e.in_phase(Phase::Manifest))?;
        let staging = TempDir::new().map_err(|err| {
            Error::new(
                ErrorKind::BundleCorrupt,
                format!("unable to stage the filesystem image: {err}"),
            )
            .in_phase(Phase::Bundle)
        })?;
        let filesystem_dest = staging.path().join(basename(filesystem));
        info!("Extracting {filesystem} from the firmware bundle");
        bundle
            .extract_to_file(filesystem, &filesystem_dest)
            .map_err(|e| e.in_phase(Phase::Bundle))?;

        match probed {
            ProbedDevice::Normal(channel) => {
                recovery::enter_recovery(channel).map_err(|e| e.in_phase(Phase::EnterRecovery))?;
            }
            // the probe transport is stale once uploads start
            ProbedDevice::Recovery(transport) => drop(transport),
        }

        let mut recovery_transport =
            recovery::acquire_recovery(self.provider, &self.monitor, RECOVERY_FLIP_TIMEOUT)
                .map_err(|e| e.in_phase(Phase::EnterRecovery))?;
        self.monitor.set_mode(DeviceMode::Recovery);
        self.sink.report(&ReportMessage::mode(DeviceMode::Recovery));

        self.monitor.set_awaiting_restore(true);
        recovery::upload_boot_chain(
            &mut bundle,
            &ticket,
            recovery_transport.as_mut(),
            self.operator.as_mut(),
            &self.options,
        )
        .map_err(|e| e.in_phase(Phase::BootChain))?;
        drop(recovery_transport);

        info!("Waiting for the device to enter restore mode");
        recovery::await_restore_mode(&self.monitor, RESTORE_MODE_TIMEOUT)
            .map_err(|e| e.in_phase(Phase::AwaitRestore))?;
        self.monitor.set_awaiting_restore(false);
        info!("Device has entered restore mode");
        self.sink.report(&ReportMessage::mode(DeviceMode::Restore));

        let mut session = self
            .provider
            .open_restore(self.options.uuid())
            .map_err(|e| e.in_phase(Phase::Restore))?;
        let mut streamer = self
            .provider
            .image_streamer()
            .map_err(|e| e.in_phase(Phase::Restore))?;

        let mut ctx = RestoreContext {
            bundle: &mut bundle,
            ticket: &ticket,
            filesystem: &filesystem_dest,
            options: &self.options,
        };
        restore::run_restore(
            session.as_mut(),
            streamer.as_mut(),
            &mut ctx,
            &self.monitor,
            self.sink.as_mut(),
        )
        .map_err(|e| e.in_phase(Phase::Restore))?;

        // `staging` drops here, removing the extracted image; the same
        // drop runs on every failure path above.
        Ok(())
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
