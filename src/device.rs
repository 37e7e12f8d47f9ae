//! Device discovery, mode classification, and identity.

use std::fmt;

use log::{debug, info};

use crate::error::{Error, ErrorKind, Result};
use crate::transport::{ManagementChannel, RecoveryTransport, TransportProvider};

/// Operating mode of an attached device.
///
/// Transitions are one-way along `Normal → Recovery → Restore`. DFU is
/// recognized during discovery but never entered by this engine.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeviceMode {
    Unknown = 0,
    Dfu = 1,
    Normal = 2,
    Recovery = 3,
    Restore = 4,
}

impl From<u8> for DeviceMode {
    fn from(b: u8) -> Self {
        match b {
            1 => Self::Dfu,
            2 => Self::Normal,
            3 => Self::Recovery,
            4 => Self::Restore,
            _ => Self::Unknown,
        }
    }
}

impl From<DeviceMode> for &'static str {
    fn from(m: DeviceMode) -> Self {
        match m {
            DeviceMode::Unknown => "unknown",
            DeviceMode::Dfu => "DFU",
            DeviceMode::Normal => "normal",
            DeviceMode::Recovery => "recovery",
            DeviceMode::Restore => "restore",
        }
    }
}

impl From<&DeviceMode> for &'static str {
    fn from(m: &DeviceMode) -> Self {
        (*m).into()
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", <&'static str>::from(self))
    }
}

/// A discovered device, holding the channel its mode admits.
pub enum ProbedDevice {
    Normal(Box<dyn ManagementChannel>),
    Recovery(Box<dyn RecoveryTransport>),
}

impl ProbedDevice {
    pub fn mode(&self) -> DeviceMode {
        match self {
            Self::Normal(_) => DeviceMode::Normal,
            Self::Recovery(_) => DeviceMode::Recovery,
        }
    }
}

/// Discovers an attached device.
///
/// Normal-mode enumeration is tried first, then recovery-mode; only
/// when both fail is the device reported missing.
pub fn probe(provider: &dyn TransportProvider, uuid: Option<&str>) -> Result<ProbedDevice> {
    info!("Checking for a device in normal mode...");
    match provider.open_management(uuid) {
        Ok(channel) => return Ok(ProbedDevice::Normal(channel)),
        Err(err) => debug!("normal-mode enumeration failed: {err}"),
    }

    info!("Checking for a device in recovery mode...");
    match provider.open_recovery() {
        Ok(transport) => Ok(ProbedDevice::Recovery(transport)),
        Err(err) => {
            debug!("recovery-mode enumeration failed: {err}");
            Err(Error::new(
                ErrorKind::DeviceNotFound,
                "unable to find a device, is it plugged in?",
            ))
        }
    }
}

/// Reads the unique chip identifier over whichever channel the probe
/// produced.
pub fn ecid(device: &mut ProbedDevice) -> Result<u64> {
    let ecid = match device {
        ProbedDevice::Normal(channel) => {
            let value = channel.lookup("UniqueChipID").map_err(|err| {
                Error::new(
                    ErrorKind::DeviceIdentityUnavailable,
                    format!("unable to query UniqueChipID: {}", err.message()),
                )
            })?;

            value.as_unsigned_integer().ok_or_else(|| {
                Error::new(
                    ErrorKind::DeviceIdentityUnavailable,
                    "UniqueChipID is not an unsigned integer",
                )
            })?
        }
        ProbedDevice::Recovery(transport) => transport.ecid().map_err(|err| {
            Error::new(
                ErrorKind::DeviceIdentityUnavailable,
                format!("unable to query the recovery transport: {}", err.message()),
            )
        })?,
    };

    if ecid == 0 {
        return Err(Error::new(
            ErrorKind::DeviceIdentityUnavailable,
            "device reported a zero chip identifier",
        ));
    }

    Ok(ecid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_mode_from_u8() {
        assert_eq!(DeviceMode::from(0u8), DeviceMode::Unknown);
        assert_eq!(DeviceMode::from(1u8), DeviceMode::Dfu);
        assert_eq!(DeviceMode::from(2u8), DeviceMode::Normal);
        assert_eq!(DeviceMode::from(3u8), DeviceMode::Recovery);
        assert_eq!(DeviceMode::from(4u8), DeviceMode::Restore);
        assert_eq!(DeviceMode::from(0x7fu8), DeviceMode::Unknown);
    }

    #[test]
    fn test_device_mode_display() {
        assert_eq!(format!("{}", DeviceMode::Normal), "normal");
        assert_eq!(format!("{}", DeviceMode::Recovery), "recovery");
        assert_eq!(format!("{}", DeviceMode::Restore), "restore");
        assert_eq!(format!("{}", DeviceMode::Dfu), "DFU");
    }
}
