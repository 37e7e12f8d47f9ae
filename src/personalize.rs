//! Component personalization pipeline.
//!
//! Turns a bundle payload into bytes the device will accept: resolve
//! the ticket entry, extract the container, swap in the device-bound
//! signature, and re-serialize.

use std::fs;

use log::{info, warn};

use crate::bundle::FirmwareBundle;
use crate::error::Result;
use crate::img3::Img3;
use crate::options::RestoreOptions;
use crate::ticket::Ticket;

/// How a component is addressed in the ticket.
///
/// Boot-chain steps know the logical name; data requests coming from
/// the device often carry only the archive path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ComponentKey<'a> {
    Name(&'a str),
    Path(&'a str),
}

/// Produces a personalized component addressed by logical name.
pub fn signed_component_by_name(
    bundle: &mut FirmwareBundle,
    ticket: &Ticket,
    name: &str,
    options: &RestoreOptions,
) -> Result<Vec<u8>> {
    signed_component(bundle, ticket, ComponentKey::Name(name), options)
}

/// Produces a personalized component addressed by archive path.
pub fn signed_component_by_path(
    bundle: &mut FirmwareBundle,
    ticket: &Ticket,
    path: &str,
    options: &RestoreOptions,
) -> Result<Vec<u8>> {
    signed_component(bundle, ticket, ComponentKey::Path(path), options)
}

/// Runs the pipeline for either addressing scheme.
///
/// In custom mode the signature found in the bundle is kept; every
/// other step is unchanged, because the unsigned boot path still needs
/// the ticket's `Path` resolution.
pub fn signed_component(
    bundle: &mut FirmwareBundle,
    ticket: &Ticket,
    key: ComponentKey<'_>,
    options: &RestoreOptions,
) -> Result<Vec<u8>> {
    let (path, blob) = match key {
        ComponentKey::Name(name) => {
            info!("Resolving {name} in the ticket");
            let entry = ticket.entry(name)?;
            (entry.path, entry.blob)
        }
        ComponentKey::Path(path) => {
            info!("Resolving {path} in the ticket");
            let (_name, blob) = ticket.entry_by_path(path)?;
            (path, blob)
        }
    };

    let data = bundle.extract_to_memory(path)?;
    let mut image = Img3::parse(&data)?;

    if !options.custom() {
        image.replace_signature(blob);
    }

    let personalized = image.to_bytes();

    if options.debug() {
        persist(path, &personalized);
    }

    Ok(personalized)
}

/// Writes a personalized component under its basename in the working
/// directory. Failures are reported, not fatal.
fn persist(path: &str, data: &[u8]) {
    let basename = path.rsplit('/').next().unwrap_or(path);

    info!("Writing {} bytes to {basename}", data.len());
    if let Err(err) = fs::write(basename, data) {
        warn!("unable to persist {basename}: {err}");
    }
}
