//! Companion-file [`SidecarStore`].

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::info::ComicInfo;
use crate::source::Source;

use super::{SidecarStore, StoreError};

/// Suffix appended to the container's stem.
pub const SIDECAR_SUFFIX: &str = "comicinfo.json";

/// Reads `<stem>.comicinfo.json` next to the container.
#[derive(Debug, Clone, Default)]
pub struct JsonSidecar;

impl JsonSidecar {
    /// Sidecar path for `source`: `books/Saga 01.cbx` → `books/Saga 01.comicinfo.json`.
    pub fn path_for(source: &Source) -> PathBuf {
        sidecar_path(source.path())
    }

    /// Write a sidecar.  The resolver never writes sidecars; this is for
    /// tooling that exports metadata.
    pub fn store(&self, source: &Source, info: &ComicInfo) -> Result<(), StoreError> {
        let path = Self::path_for(source);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(info.to_pretty_string()?.as_bytes())?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl SidecarStore for JsonSidecar {
    fn load(&self, source: &Source) -> Result<Option<ComicInfo>, StoreError> {
        match fs::read(Self::path_for(source)) {
            Ok(bytes) => Ok(Some(ComicInfo::from_bytes(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn sidecar_path(path: &Path) -> PathBuf {
    path.with_extension(SIDECAR_SUFFIX)
}
