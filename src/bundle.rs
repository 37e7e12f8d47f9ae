//! Random access to a firmware bundle archive.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use log::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{Error, ErrorKind, Result};

/// An opened firmware bundle (IPSW-style ZIP archive).
///
/// Entries are addressed by their archive-internal path. No extraction
/// result is cached; callers may request the same entry repeatedly.
#[derive(Debug)]
pub struct FirmwareBundle {
    archive: ZipArchive<File>,
    path: PathBuf,
}

impl FirmwareBundle {
    /// Opens a firmware bundle for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|err| {
            Error::new(
                ErrorKind::BundleCorrupt,
                format!("unable to open {}: {err}", path.display()),
            )
        })?;
        let archive = ZipArchive::new(file).map_err(|err| {
            Error::new(
                ErrorKind::BundleCorrupt,
                format!("{} is not a readable archive: {err}", path.display()),
            )
        })?;

        Ok(Self { archive, path })
    }

    /// Gets the on-disk path of the bundle.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Extracts a named entry into memory.
    pub fn extract_to_memory(&mut self, name: &str) -> Result<Vec<u8>> {
        debug!("extracting {name} from {}", self.path.display());

        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|err| entry_error(name, err))?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|err| read_error(name, err))?;

        Ok(data)
    }

    /// Extracts a named entry to a file on disk.
    ///
    /// Returns the number of bytes written.
    pub fn extract_to_file(&mut self, name: &str, dest: &Path) -> Result<u64> {
        debug!(
            "extracting {name} from {} to {}",
            self.path.display(),
            dest.display()
        );

        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|err| entry_error(name, err))?;
        let mut out = File::create(dest).map_err(|err| {
            Error::new(
                ErrorKind::BundleCorrupt,
                format!("unable to create {}: {err}", dest.display()),
            )
        })?;

        io::copy(&mut entry, &mut out).map_err(|err| read_error(name, err))
    }
}

fn entry_error(name: &str, err: ZipError) -> Error {
    match err {
        ZipError::FileNotFound => Error::new(
            ErrorKind::BundleEntryMissing,
            format!("no `{name}` entry in the firmware bundle"),
        ),
        err => Error::new(
            ErrorKind::BundleCorrupt,
            format!("unable to read `{name}`: {err}"),
        ),
    }
}

fn read_error(name: &str, err: io::Error) -> Error {
    Error::new(
        ErrorKind::BundleCorrupt,
        format!("short read on `{name}`: {err}"),
    )
}
