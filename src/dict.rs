//! Typed accessors over property-list dictionaries.
//!
//! Manifests, tickets, and restore messages all arrive as dynamic
//! property-list values. The helpers here are the only place those
//! dynamic values are shape-checked; callers pick the [ErrorKind] a
//! mismatch maps to, so a bad ticket reads `TicketMalformed` and a bad
//! manifest reads `ManifestMalformed` without duplicating the checks.

use plist::{Dictionary, Value};

use crate::error::{Error, ErrorKind, Result};

/// Look up a required key.
pub fn dict_entry<'a>(dict: &'a Dictionary, key: &str, kind: ErrorKind) -> Result<&'a Value> {
    dict.get(key)
        .ok_or_else(|| Error::new(kind, format!("missing `{key}` entry")))
}

/// Look up a required sub-dictionary.
pub fn dict_dict<'a>(dict: &'a Dictionary, key: &str, kind: ErrorKind) -> Result<&'a Dictionary> {
    dict_entry(dict, key, kind)?
        .as_dictionary()
        .ok_or_else(|| Error::new(kind, format!("`{key}` entry is not a dictionary")))
}

/// Look up a required string.
pub fn dict_string<'a>(dict: &'a Dictionary, key: &str, kind: ErrorKind) -> Result<&'a str> {
    dict_entry(dict, key, kind)?
        .as_string()
        .ok_or_else(|| Error::new(kind, format!("`{key}` entry is not a string")))
}

/// Look up a required data blob.
pub fn dict_data<'a>(dict: &'a Dictionary, key: &str, kind: ErrorKind) -> Result<&'a [u8]> {
    dict_entry(dict, key, kind)?
        .as_data()
        .ok_or_else(|| Error::new(kind, format!("`{key}` entry is not a data blob")))
}

/// Look up a required array.
pub fn dict_array<'a>(dict: &'a Dictionary, key: &str, kind: ErrorKind) -> Result<&'a [Value]> {
    dict_entry(dict, key, kind)?
        .as_array()
        .map(|a| a.as_slice())
        .ok_or_else(|| Error::new(kind, format!("`{key}` entry is not an array")))
}

/// Look up a required unsigned integer.
pub fn dict_unsigned(dict: &Dictionary, key: &str, kind: ErrorKind) -> Result<u64> {
    dict_entry(dict, key, kind)?
        .as_unsigned_integer()
        .ok_or_else(|| Error::new(kind, format!("`{key}` entry is not an unsigned integer")))
}

/// Look up a required signed integer.
pub fn dict_signed(dict: &Dictionary, key: &str, kind: ErrorKind) -> Result<i64> {
    dict_entry(dict, key, kind)?
        .as_signed_integer()
        .ok_or_else(|| Error::new(kind, format!("`{key}` entry is not an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Dictionary {
        let mut inner = Dictionary::new();
        inner.insert("Path".into(), Value::String("Firmware/dfu/iBEC.img3".into()));
        inner.insert("Blob".into(), Value::Data(vec![0xde, 0xad]));

        let mut dict = Dictionary::new();
        dict.insert("iBEC".into(), Value::Dictionary(inner));
        dict.insert("ApECID".into(), Value::Integer(0x5af3107a4000u64.into()));
        dict
    }

    #[test]
    fn test_dict_accessors() -> Result<()> {
        let dict = fixture();
        let entry = dict_dict(&dict, "iBEC", ErrorKind::TicketEntryMissing)?;

        assert_eq!(
            dict_string(entry, "Path", ErrorKind::TicketMalformed)?,
            "Firmware/dfu/iBEC.img3"
        );
        assert_eq!(
            dict_data(entry, "Blob", ErrorKind::TicketMalformed)?,
            [0xde, 0xad]
        );
        assert_eq!(
            dict_unsigned(&dict, "ApECID", ErrorKind::ManifestMalformed)?,
            0x5af3107a4000
        );

        Ok(())
    }

    #[test]
    fn test_dict_accessors_report_caller_kind() {
        let dict = fixture();

        let err = dict_dict(&dict, "KernelCache", ErrorKind::TicketEntryMissing).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TicketEntryMissing);

        // present, but the wrong shape
        let err = dict_string(&dict, "ApECID", ErrorKind::ManifestMalformed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ManifestMalformed);

        let err = dict_data(&dict, "iBEC", ErrorKind::TicketMalformed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TicketMalformed);
    }
}
