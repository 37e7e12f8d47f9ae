use std::{fmt, io, result};

pub type Result<T> = result::Result<T, Error>;

/// Orchestration phase in which a failure occurred.
///
/// Every [Error] carries a phase tag so the final diagnostic names the
/// stage of the restore that failed.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Phase {
    /// Device discovery and mode classification
    Probe,
    /// Reading the unique chip identifier
    Identity,
    /// Firmware bundle access
    Bundle,
    /// Build manifest parsing
    Manifest,
    /// Signing request construction and submission
    Signing,
    /// Ticket entry resolution
    Ticket,
    /// Image container parsing and re-serialization
    Image,
    /// Rebooting the device out of normal mode
    EnterRecovery,
    /// Boot-chain component uploads
    BootChain,
    /// Waiting for the device to reappear in restore mode
    AwaitRestore,
    /// The restore-mode message loop
    Restore,
    /// Resource teardown
    Cleanup,
}

impl From<Phase> for &'static str {
    fn from(p: Phase) -> Self {
        match p {
            Phase::Probe => "probe",
            Phase::Identity => "identity",
            Phase::Bundle => "bundle",
            Phase::Manifest => "manifest",
            Phase::Signing => "signing",
            Phase::Ticket => "ticket",
            Phase::Image => "image",
            Phase::EnterRecovery => "enter-recovery",
            Phase::BootChain => "boot-chain",
            Phase::AwaitRestore => "await-restore",
            Phase::Restore => "restore",
            Phase::Cleanup => "cleanup",
        }
    }
}

impl From<&Phase> for &'static str {
    fn from(p: &Phase) -> Self {
        (*p).into()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", <&'static str>::from(self))
    }
}

/// Failure classes for the restore engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ErrorKind {
    /// No attached device answered normal- or recovery-mode enumeration
    DeviceNotFound,
    /// The unique chip identifier could not be read
    DeviceIdentityUnavailable,
    /// A named entry is absent from the firmware bundle
    BundleEntryMissing,
    /// The firmware bundle could not be read
    BundleCorrupt,
    /// The build manifest has an unexpected shape
    ManifestMalformed,
    /// The signing authority could not be reached
    SigningUnavailable,
    /// The signing authority refused the request
    SigningRejected,
    /// A component entry is absent from the signing ticket
    TicketEntryMissing,
    /// A ticket entry has an unexpected shape
    TicketMalformed,
    /// An image container violates the container format
    ImageMalformed,
    /// A device transport failed
    TransportIo,
    /// The device disappeared mid-flow
    Disconnected,
    /// The device requested a data type this engine cannot produce
    RestoreUnknownDataType,
    /// The device reported a terminal restore status
    RestoreTerminalStatus(i64),
}

impl ErrorKind {
    /// Default phase tag for errors raised below the orchestrator.
    ///
    /// The orchestrator overrides this per stage with [Error::in_phase];
    /// the mapping here keeps deep layers honest when it does not.
    pub const fn phase(&self) -> Phase {
        match self {
            Self::DeviceNotFound => Phase::Probe,
            Self::DeviceIdentityUnavailable => Phase::Identity,
            Self::BundleEntryMissing | Self::BundleCorrupt => Phase::Bundle,
            Self::ManifestMalformed => Phase::Manifest,
            Self::SigningUnavailable | Self::SigningRejected => Phase::Signing,
            Self::TicketEntryMissing | Self::TicketMalformed => Phase::Ticket,
            Self::ImageMalformed => Phase::Image,
            Self::TransportIo
            | Self::Disconnected
            | Self::RestoreUnknownDataType
            | Self::RestoreTerminalStatus(_) => Phase::Restore,
        }
    }

    /// Gets whether this kind ends the restore loop.
    ///
    /// Everything outside this subset is reported as a warning and the
    /// loop reads the next device message.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TransportIo
                | Self::Disconnected
                | Self::RestoreUnknownDataType
                | Self::RestoreTerminalStatus(_)
        )
    }
}

impl From<ErrorKind> for &'static str {
    fn from(k: ErrorKind) -> Self {
        match k {
            ErrorKind::DeviceNotFound => "device not found",
            ErrorKind::DeviceIdentityUnavailable => "device identity unavailable",
            ErrorKind::BundleEntryMissing => "bundle entry missing",
            ErrorKind::BundleCorrupt => "bundle corrupt",
            ErrorKind::ManifestMalformed => "manifest malformed",
            ErrorKind::SigningUnavailable => "signing unavailable",
            ErrorKind::SigningRejected => "signing rejected",
            ErrorKind::TicketEntryMissing => "ticket entry missing",
            ErrorKind::TicketMalformed => "ticket malformed",
            ErrorKind::ImageMalformed => "image malformed",
            ErrorKind::TransportIo => "transport I/O",
            ErrorKind::Disconnected => "device disconnected",
            ErrorKind::RestoreUnknownDataType => "unknown restore data type",
            ErrorKind::RestoreTerminalStatus(_) => "terminal restore status",
        }
    }
}

impl From<&ErrorKind> for &'static str {
    fn from(k: &ErrorKind) -> Self {
        (*k).into()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RestoreTerminalStatus(code) => write!(f, "terminal restore status {code}"),
            kind => write!(f, "{}", <&'static str>::from(kind)),
        }
    }
}

/// Basic error type for the restore engine.
#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    phase: Phase,
    message: String,
}

impl Error {
    /// Create an Error with the kind's default phase tag.
    pub fn new<S>(kind: ErrorKind, message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            kind,
            phase: kind.phase(),
            message: message.into(),
        }
    }

    /// Create a transport failure Error.
    pub fn transport<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self::new(ErrorKind::TransportIo, message)
    }

    /// Create a device-disconnected Error.
    pub fn disconnected<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self::new(ErrorKind::Disconnected, message)
    }

    /// Re-tag the error with the orchestration phase it surfaced in.
    pub fn in_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the phase tag
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Gets whether the error ends the restore loop, see [ErrorKind::is_fatal].
    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}: {}", self.phase, self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::transport(format!("I/O error: {err}"))
    }
}

impl From<plist::Error> for Error {
    fn from(err: plist::Error) -> Self {
        Self::new(
            ErrorKind::ManifestMalformed,
            format!("property list error: {err}"),
        )
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        Self::new(
            ErrorKind::SigningUnavailable,
            format!("signing endpoint unreachable: {err}"),
        )
    }
}
