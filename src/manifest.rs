//! Typed view over the firmware build manifest.

use plist::{Dictionary, Value};

use crate::dict::{dict_array, dict_dict, dict_string};
use crate::error::{Error, ErrorKind, Result};

/// The parsed `BuildManifest.plist` of a firmware bundle.
#[derive(Debug)]
pub struct Manifest {
    dict: Dictionary,
}

impl Manifest {
    /// Parses a build manifest from raw property-list bytes (XML or
    /// binary).
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let dict: Dictionary = plist::from_bytes(bytes).map_err(|err| {
            Error::new(
                ErrorKind::ManifestMalformed,
                format!("unable to parse the build manifest: {err}"),
            )
        })?;

        Ok(Self { dict })
    }

    /// Gets the marketing OS version carried by the manifest, when
    /// present.
    pub fn product_version(&self) -> Option<&str> {
        self.dict.get("ProductVersion").and_then(Value::as_string)
    }

    /// Selects the active build identity.
    ///
    /// The restore flow always personalizes against the first identity;
    /// erase/update variants beyond that are chosen upstream of this
    /// engine.
    pub fn build_identity(&self) -> Result<BuildIdentity<'_>> {
        let identities = dict_array(&self.dict, "BuildIdentities", ErrorKind::ManifestMalformed)?;
        let dict = identities
            .first()
            .and_then(Value::as_dictionary)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::ManifestMalformed,
                    "no usable build identity in the manifest",
                )
            })?;

        Ok(BuildIdentity { dict })
    }
}

/// One build identity inside a [Manifest]: the per-component signing
/// descriptors for a single device configuration.
#[derive(Debug)]
pub struct BuildIdentity<'a> {
    dict: &'a Dictionary,
}

impl<'a> BuildIdentity<'a> {
    /// Gets the component table (`Manifest` dictionary): logical name to
    /// descriptor, each descriptor carrying `Info.Path` and signing
    /// metadata.
    pub fn components(&self) -> Result<&'a Dictionary> {
        dict_dict(self.dict, "Manifest", ErrorKind::ManifestMalformed)
    }

    /// Gets the archive path of a component's payload.
    pub fn component_path(&self, name: &str) -> Result<&'a str> {
        let entry = dict_dict(self.components()?, name, ErrorKind::ManifestMalformed)?;
        let info = dict_dict(entry, "Info", ErrorKind::ManifestMalformed)?;

        dict_string(info, "Path", ErrorKind::ManifestMalformed)
    }
}

#[cfg(test)]
pub(crate) mod test_manifest {
    use super::*;

    /// Builds an in-memory manifest with the given `(name, path)`
    /// component set.
    pub fn manifest_with_components(components: &[(&str, &str)]) -> Manifest {
        let mut table = Dictionary::new();
        for (name, path) in components {
            let mut info = Dictionary::new();
            info.insert("Path".into(), Value::String((*path).into()));

            let mut entry = Dictionary::new();
            entry.insert("Info".into(), Value::Dictionary(info));
            entry.insert("Digest".into(), Value::Data(vec![0x11; 20]));

            table.insert((*name).into(), Value::Dictionary(entry));
        }

        let mut identity = Dictionary::new();
        identity.insert("Manifest".into(), Value::Dictionary(table));

        let mut dict = Dictionary::new();
        dict.insert(
            "BuildIdentities".into(),
            Value::Array(vec![Value::Dictionary(identity)]),
        );
        dict.insert("ProductVersion".into(), Value::String("3.1.2".into()));

        Manifest { dict }
    }

    /// Serializes an in-memory manifest as an XML property list, for
    /// embedding in bundle fixtures.
    pub fn manifest_xml(components: &[(&str, &str)]) -> Vec<u8> {
        let manifest = manifest_with_components(components);
        let mut out = Vec::new();
        plist::to_writer_xml(&mut out, &manifest.dict).expect("serialize manifest");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_manifest::manifest_with_components;
    use super::*;

    #[test]
    fn test_manifest_round_trip() -> Result<()> {
        let manifest = manifest_with_components(&[
            ("KernelCache", "kernelcache.release.s5l8920x"),
            ("OS", "018-6303-385.dmg"),
        ]);

        let mut buf = Vec::new();
        plist::to_writer_xml(&mut buf, &manifest.dict).expect("serialize");
        let parsed = Manifest::parse(&buf)?;

        assert_eq!(parsed.product_version(), Some("3.1.2"));
        assert_eq!(
            parsed.build_identity()?.component_path("KernelCache")?,
            "kernelcache.release.s5l8920x"
        );

        Ok(())
    }

    #[test]
    fn test_manifest_malformed() {
        let err = Manifest::parse(b"not a property list").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ManifestMalformed);

        let manifest = Manifest {
            dict: Dictionary::new(),
        };
        let err = manifest.build_identity().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ManifestMalformed);
    }
}
