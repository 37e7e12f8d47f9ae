//! Typed view over the signing-ticket response.

use plist::{Dictionary, Value};

use crate::dict::{dict_data, dict_string};
use crate::error::{Error, ErrorKind, Result};

/// A per-device signing ticket returned by the signing authority.
///
/// Immutable once received. Each component entry is a dictionary
/// carrying the component's archive `Path` and its authorization
/// `Blob`; entries can be resolved by logical name or by archive path
/// ([Ticket::entry] / [Ticket::entry_by_path]), duals over the same
/// entry set.
#[derive(Debug)]
pub struct Ticket {
    dict: Dictionary,
}

/// One resolved ticket entry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TicketEntry<'a> {
    /// Archive path of the component payload inside the bundle
    pub path: &'a str,
    /// Signed authorization blob bound to the device identity
    pub blob: &'a [u8],
}

impl Ticket {
    /// Wraps a ticket dictionary.
    pub fn from_dictionary(dict: Dictionary) -> Self {
        Self { dict }
    }

    /// Parses a ticket from raw property-list bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let dict: Dictionary = plist::from_bytes(bytes).map_err(|err| {
            Error::new(
                ErrorKind::TicketMalformed,
                format!("unable to parse the ticket response: {err}"),
            )
        })?;

        Ok(Self::from_dictionary(dict))
    }

    /// Resolves an entry by logical component name.
    pub fn entry(&self, name: &str) -> Result<TicketEntry<'_>> {
        let entry = self
            .dict
            .get(name)
            .and_then(Value::as_dictionary)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::TicketEntryMissing,
                    format!("no `{name}` entry in the ticket"),
                )
            })?;

        Ok(TicketEntry {
            path: dict_string(entry, "Path", ErrorKind::TicketMalformed)?,
            blob: dict_data(entry, "Blob", ErrorKind::TicketMalformed)?,
        })
    }

    /// Resolves an entry by archive path.
    ///
    /// Linear scan over all dictionary-valued entries; the first entry
    /// whose `Path` matches wins. Returns the logical name alongside the
    /// blob.
    pub fn entry_by_path(&self, path: &str) -> Result<(&str, &[u8])> {
        for (name, value) in self.dict.iter() {
            let entry = match value.as_dictionary() {
                Some(entry) => entry,
                None => continue,
            };

            if entry.get("Path").and_then(Value::as_string) == Some(path) {
                let blob = dict_data(entry, "Blob", ErrorKind::TicketMalformed)?;
                return Ok((name.as_str(), blob));
            }
        }

        Err(Error::new(
            ErrorKind::TicketEntryMissing,
            format!("no ticket entry with path `{path}`"),
        ))
    }

    /// Iterates the `(name, path)` pairs of all well-formed entries.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dict.iter().filter_map(|(name, value)| {
            let path = value
                .as_dictionary()
                .and_then(|entry| entry.get("Path"))
                .and_then(Value::as_string)?;

            Some((name.as_str(), path))
        })
    }
}
