//! Host-facing structured event stream.
//!
//! Controlling processes (kiosk frontends, scripted restores) want
//! machine-readable progress, not log scraping. Every noteworthy event
//! is framed as a [ReportMessage] and handed to the configured
//! [ReportSink]; the default sink emits one JSON line per event.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::DeviceMode;

pub const REPORT_VERSION: &str = "1.0";

/// Progress of a long-running device-side operation.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ProgressReport {
    /// Device-side operation code
    pub operation: u64,
    /// Percent complete; the device reports -1 while indeterminate
    pub progress: i64,
}

/// Terminal status reported by the device.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct StatusReport {
    pub status: i64,
}

/// An observed device mode transition.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ModeReport {
    pub mode: String,
}

/// Event payload variants.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ReportPayload {
    Empty(()),
    Progress(ProgressReport),
    Status(StatusReport),
    Mode(ModeReport),
}

impl Default for ReportPayload {
    fn default() -> Self {
        Self::Empty(())
    }
}

impl fmt::Display for ReportPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty(()) => write!(f, "()"),
            Self::Progress(inner) => {
                write!(f, "operation {} at {}%", inner.operation, inner.progress)
            }
            Self::Status(inner) => write!(f, "status {}", inner.status),
            Self::Mode(inner) => write!(f, "mode {}", inner.mode),
        }
    }
}

/// Event classes carried by a [ReportMessage].
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportEvent {
    Progress,
    Status,
    Mode,
    Unknown,
}

impl From<ReportEvent> for &'static str {
    fn from(e: ReportEvent) -> Self {
        match e {
            ReportEvent::Progress => "PROGRESS",
            ReportEvent::Status => "STATUS",
            ReportEvent::Mode => "MODE",
            ReportEvent::Unknown => "UNKNOWN",
        }
    }
}

impl From<&ReportEvent> for &'static str {
    fn from(e: &ReportEvent) -> Self {
        (*e).into()
    }
}

impl fmt::Display for ReportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", <&'static str>::from(self))
    }
}

/// One framed event for the controlling process.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ReportMessage {
    /// Report framing version (always [REPORT_VERSION])
    version: String,
    /// Event class
    event: ReportEvent,
    /// Event payload
    data: ReportPayload,
}

impl ReportMessage {
    pub fn new(event: ReportEvent, data: ReportPayload) -> Self {
        Self {
            version: REPORT_VERSION.into(),
            event,
            data,
        }
    }

    /// Frames a device progress report.
    pub fn progress(operation: u64, progress: i64) -> Self {
        Self::new(
            ReportEvent::Progress,
            ReportPayload::Progress(ProgressReport {
                operation,
                progress,
            }),
        )
    }

    /// Frames a terminal status report.
    pub fn status(status: i64) -> Self {
        Self::new(
            ReportEvent::Status,
            ReportPayload::Status(StatusReport { status }),
        )
    }

    /// Frames a device message this engine does not classify.
    ///
    /// Carries no structured payload; the controlling process only
    /// learns that the device said something unexpected.
    pub fn unclassified() -> Self {
        Self::new(ReportEvent::Unknown, ReportPayload::default())
    }

    /// Frames a device mode transition.
    pub fn mode(mode: DeviceMode) -> Self {
        Self::new(
            ReportEvent::Mode,
            ReportPayload::Mode(ModeReport {
                mode: mode.to_string(),
            }),
        )
    }

    pub fn version(&self) -> &str {
        self.version.as_str()
    }

    pub fn event(&self) -> ReportEvent {
        self.event
    }

    pub fn data(&self) -> &ReportPayload {
        &self.data
    }
}

impl fmt::Display for ReportMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.event, self.data)
    }
}

/// Destination for framed events.
pub trait ReportSink {
    fn report(&mut self, message: &ReportMessage);
}

/// Default sink: one JSON line per event through the log facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn report(&mut self, message: &ReportMessage) {
        match serde_json::to_string(message) {
            Ok(line) => log::info!("{line}"),
            Err(err) => log::warn!("unserializable report {message}: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Result;

    #[test]
    fn test_report_event_serde() -> Result<()> {
        assert_eq!(serde_json::to_string(&ReportEvent::Progress)?, "\"PROGRESS\"");
        assert_eq!(serde_json::to_string(&ReportEvent::Status)?, "\"STATUS\"");
        assert_eq!(serde_json::to_string(&ReportEvent::Mode)?, "\"MODE\"");

        assert_eq!(
            serde_json::from_str::<ReportEvent>("\"PROGRESS\"")?,
            ReportEvent::Progress
        );
        assert_eq!(
            serde_json::from_str::<ReportEvent>("\"STATUS\"")?,
            ReportEvent::Status
        );

        Ok(())
    }

    #[test]
    fn test_report_message_serde() -> Result<()> {
        let msg = ReportMessage::progress(14, 37);
        let expected =
            "{\"version\":\"1.0\",\"event\":\"PROGRESS\",\"data\":{\"operation\":14,\"progress\":37}}";

        assert_eq!(serde_json::to_string(&msg)?, expected);
        assert_eq!(serde_json::from_str::<ReportMessage>(expected)?, msg);

        let msg = ReportMessage::status(0);
        let expected = "{\"version\":\"1.0\",\"event\":\"STATUS\",\"data\":{\"status\":0}}";

        assert_eq!(serde_json::to_string(&msg)?, expected);
        assert_eq!(serde_json::from_str::<ReportMessage>(expected)?, msg);

        let msg = ReportMessage::mode(DeviceMode::Restore);
        let expected = "{\"version\":\"1.0\",\"event\":\"MODE\",\"data\":{\"mode\":\"restore\"}}";

        assert_eq!(serde_json::to_string(&msg)?, expected);

        let msg = ReportMessage::unclassified();
        let expected = "{\"version\":\"1.0\",\"event\":\"UNKNOWN\",\"data\":null}";

        assert_eq!(msg.event(), ReportEvent::Unknown);
        assert_eq!(msg.data(), &ReportPayload::Empty(()));
        assert_eq!(serde_json::to_string(&msg)?, expected);
        assert_eq!(serde_json::from_str::<ReportMessage>(expected)?, msg);

        Ok(())
    }
}
