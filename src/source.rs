//! Container identity: a path plus the format the caller declares for it.

use std::fmt;
use std::path::{Path, PathBuf};

/// Container formats known to this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// Block archive (`.cbx`) with an embedded `ComicInfo.json` member.
    Cbx,
    /// A plain directory of page images.
    Folder,
}

impl ContainerFormat {
    pub const ALL: [ContainerFormat; 2] = [ContainerFormat::Cbx, ContainerFormat::Folder];

    /// Human-readable name (diagnostics and CLI).
    pub fn name(self) -> &'static str {
        match self {
            ContainerFormat::Cbx    => "cbx",
            ContainerFormat::Folder => "folder",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cbx"             => Some(ContainerFormat::Cbx),
            "folder" | "dir"  => Some(ContainerFormat::Folder),
            _                 => None,
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A container file and its declared format.  Owned by the caller; the
/// resolver only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    path:   PathBuf,
    format: ContainerFormat,
}

impl Source {
    pub fn new<P: Into<PathBuf>>(path: P, format: ContainerFormat) -> Self {
        Self { path: path.into(), format }
    }

    /// Guess the format from the path: directories are folders, everything
    /// else is treated as a CBX archive.
    pub fn detect<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let format = if path.is_dir() { ContainerFormat::Folder } else { ContainerFormat::Cbx };
        Self { path, format }
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn format(&self) -> ContainerFormat { self.format }

    /// Lower-cased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.format)
    }
}
