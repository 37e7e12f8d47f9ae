use std::fmt;

/// Message classes of the restore-mode protocol.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MsgType {
    /// Progress report for a long-running device-side operation
    Progress,
    /// The device is requesting data from the host
    DataRequest,
    /// Terminal status report
    Status,
    /// Anything this engine does not handle; logged and skipped
    Unknown,
}

impl From<&str> for MsgType {
    fn from(s: &str) -> Self {
        match s {
            "ProgressMsg" => Self::Progress,
            "DataRequestMsg" => Self::DataRequest,
            "StatusMsg" => Self::Status,
            _ => Self::Unknown,
        }
    }
}

impl From<MsgType> for &'static str {
    fn from(m: MsgType) -> Self {
        match m {
            MsgType::Progress => "ProgressMsg",
            MsgType::DataRequest => "DataRequestMsg",
            MsgType::Status => "StatusMsg",
            MsgType::Unknown => "Unknown",
        }
    }
}

impl From<&MsgType> for &'static str {
    fn from(m: &MsgType) -> Self {
        (*m).into()
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", <&'static str>::from(self))
    }
}

/// Payload classes a `DataRequestMsg` can ask for.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DataType {
    /// Stream the filesystem image through the on-device receiver
    SystemImageData,
    /// Personalized kernel cache
    KernelCache,
    /// Composite NOR flash payload
    NorData,
    /// Anything this engine cannot produce; fatal
    Unknown,
}

impl From<&str> for DataType {
    fn from(s: &str) -> Self {
        match s {
            "SystemImageData" => Self::SystemImageData,
            "KernelCache" => Self::KernelCache,
            "NORData" => Self::NorData,
            _ => Self::Unknown,
        }
    }
}

impl From<DataType> for &'static str {
    fn from(d: DataType) -> Self {
        match d {
            DataType::SystemImageData => "SystemImageData",
            DataType::KernelCache => "KernelCache",
            DataType::NorData => "NORData",
            DataType::Unknown => "Unknown",
        }
    }
}

impl From<&DataType> for &'static str {
    fn from(d: &DataType) -> Self {
        (*d).into()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", <&'static str>::from(self))
    }
}
