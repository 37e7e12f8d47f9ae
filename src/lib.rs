//! # Firmware restore orchestration
//!
//! This crate implements the restore orchestration engine for signed
//! firmware bundles: personalizing each component against a per-device
//! signing ticket, walking an attached device through its mode
//! transitions, and servicing the restore-mode request/reply protocol.
//!
//! The flow, end to end:
//!
//! 1. [probe](device::probe) the attached device and read its
//!    [ECID](device::ecid),
//! 2. extract the build manifest from the [bundle](bundle::FirmwareBundle)
//!    and [submit](tss::SigningAuthority) a signing request,
//! 3. upload the [boot chain](recovery::BOOT_CHAIN) over the recovery
//!    transport, each component rewritten by the
//!    [personalization pipeline](personalize::signed_component),
//! 4. [serve the restore session](restore::run_restore) until the
//!    device reports a terminal status.
//!
//! Device links are trait seams (see [transport]); hardware backends
//! plug in behind them, and the test suite scripts them. The
//! [orchestrator](orchestrator::Restorer) owns every resource for
//! exactly the span its mode requires.
//!
//! If adding a new device message or data-request producer, follow the
//! existing pattern: classify the wire string in `restore/message.rs`,
//! and dispatch it from the session loop in `restore.rs`.

/// Firmware bundle archive access
pub mod bundle;
/// Device discovery, modes, and identity
pub mod device;
/// Typed accessors over property-list dictionaries
pub mod dict;
/// Library error types
pub mod error;
/// Shared attach/detach event state
pub mod event;
/// Signed image container codec
pub mod img3;
/// Logging convenience helpers
pub mod logging;
/// Build manifest model
pub mod manifest;
/// Operating mode flags
pub mod options;
/// End-to-end restore composition
pub mod orchestrator;
/// Component personalization pipeline
pub mod personalize;
/// Mode transitions and boot-chain uploads
pub mod recovery;
/// Host-facing structured event reports
pub mod report;
/// Restore-mode session loop and message types
pub mod restore;
/// Signing ticket model
pub mod ticket;
/// Transport trait seams
pub mod transport;
/// Signing authority request/client
pub mod tss;

pub use bundle::*;
pub use device::*;
pub use dict::*;
pub use error::*;
pub use event::*;
pub use img3::{Img3, Img3Tag, IMG3_MAGIC};
pub use logging::*;
pub use manifest::*;
pub use options::*;
pub use orchestrator::*;
pub use personalize::*;
pub use recovery::*;
pub use report::*;
pub use restore::*;
pub use ticket::*;
pub use transport::*;
pub use tss::*;

pub use crate::error::{Error, ErrorKind, Phase, Result};

/// Manifest entry every firmware bundle must carry.
pub const BUILD_MANIFEST_ENTRY: &str = "BuildManifest.plist";

/// Label this engine identifies itself with on management channels.
pub const TOOL_LABEL: &str = "fwrestore";
