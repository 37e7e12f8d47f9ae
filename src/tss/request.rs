use plist::{Dictionary, Value};

use crate::dict::{dict_dict, dict_string};
use crate::error::{ErrorKind, Result};
use crate::manifest::Manifest;

/// Protocol version string sent with every request.
pub const TSS_REQUEST_VERSION: &str = "libauthinstall-1.0";
/// Host platform tag sent with every request.
pub const TSS_HOST_PLATFORM: &str = "mac";

/// A personalization request for the signing authority.
///
/// Carries the device's unique chip identifier plus one descriptor per
/// manifest component, so the authority can bind each component's
/// authorization blob to this device.
pub struct SigningRequest {
    dict: Dictionary,
}

impl SigningRequest {
    /// Builds a request from the manifest's active build identity and a
    /// device identifier.
    ///
    /// Component descriptors are copied verbatim (including their
    /// `Info`), which keeps the request's component key set equal to
    /// the manifest's.
    pub fn from_manifest(manifest: &Manifest, ecid: u64) -> Result<Self> {
        let mut dict = Dictionary::new();
        dict.insert("@APTicket".into(), Value::Boolean(true));
        dict.insert(
            "@HostPlatformInfo".into(),
            Value::String(TSS_HOST_PLATFORM.into()),
        );
        dict.insert(
            "@VersionInfo".into(),
            Value::String(TSS_REQUEST_VERSION.into()),
        );
        dict.insert("ApECID".into(), Value::Integer(ecid.into()));

        for (name, entry) in manifest.build_identity()?.components()? {
            if entry.as_dictionary().is_some() {
                dict.insert(name.clone(), entry.clone());
            }
        }

        Ok(Self { dict })
    }

    /// Gets the device identifier encoded in the request.
    pub fn ecid(&self) -> Option<u64> {
        self.dict.get("ApECID").and_then(Value::as_unsigned_integer)
    }

    /// Gets the logical names of the component descriptors.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.dict.iter().filter_map(|(name, entry)| {
            entry.as_dictionary().map(|_| name.as_str())
        })
    }

    /// Gets the archive path of the filesystem image payload, read from
    /// the `OS` descriptor's `Info.Path`.
    pub fn filesystem_path(&self) -> Result<&str> {
        let os = dict_dict(&self.dict, "OS", ErrorKind::ManifestMalformed)?;
        let info = dict_dict(os, "Info", ErrorKind::ManifestMalformed)?;

        dict_string(info, "Path", ErrorKind::ManifestMalformed)
    }

    /// Serializes the request as an XML property list.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        plist::to_writer_xml(&mut out, &self.dict)?;

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::test_manifest::manifest_with_components;

    const ECID: u64 = 0x000f_4b29_dd52;

    /// Law: the request's component key set equals the manifest's, and
    /// the identifier field round-trips.
    #[test]
    fn test_request_mirrors_manifest() -> Result<()> {
        let manifest = manifest_with_components(&[
            ("iBEC", "Firmware/dfu/iBEC.m68ap.RELEASE.dfu"),
            ("AppleLogo", "Firmware/all_flash/applelogo.img3"),
            ("KernelCache", "kernelcache.release.s5l8920x"),
            ("OS", "018-6303-385.dmg"),
        ]);
        let request = SigningRequest::from_manifest(&manifest, ECID)?;

        let mut names: Vec<&str> = request.component_names().collect();
        names.sort_unstable();
        assert_eq!(names, ["AppleLogo", "KernelCache", "OS", "iBEC"]);

        assert_eq!(request.ecid(), Some(ECID));
        assert_eq!(request.filesystem_path()?, "018-6303-385.dmg");

        Ok(())
    }

    #[test]
    fn test_request_without_filesystem() -> Result<()> {
        let manifest = manifest_with_components(&[("KernelCache", "kernelcache.release")]);
        let request = SigningRequest::from_manifest(&manifest, ECID)?;

        let err = request.filesystem_path().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ManifestMalformed);

        Ok(())
    }

    #[test]
    fn test_request_serializes_to_xml() -> Result<()> {
        let manifest = manifest_with_components(&[("OS", "018-6303-385.dmg")]);
        let request = SigningRequest::from_manifest(&manifest, ECID)?;

        let xml = request.to_xml()?;
        let text = std::str::from_utf8(&xml).expect("utf-8 plist");

        assert!(text.contains("ApECID"));
        assert!(text.contains("018-6303-385.dmg"));

        Ok(())
    }
}
