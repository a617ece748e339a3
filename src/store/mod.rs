//! Metadata kept outside the container payload.
//!
//! Two fallback backends sit in front of the container reader:
//!
//! - [`AttachedStore`]: metadata attached to the file itself through an OS
//!   side channel.  [`XattrStore`] uses extended attributes.
//! - [`SidecarStore`]: a companion file next to the container.
//!   [`JsonSidecar`] reads `<stem>.comicinfo.json`.
//!
//! `Ok(None)` means "nothing stored here" and is not an error.

use std::io;

use thiserror::Error;

use crate::info::ComicInfo;
use crate::source::Source;

pub mod attached;
pub mod sidecar;

pub use attached::XattrStore;
pub use sidecar::JsonSidecar;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed metadata: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Extended attribute error: {0}")]
    Xattr(#[from] rustix::io::Errno),
    #[error("Attached metadata is not supported on this platform")]
    Unsupported,
}

/// Metadata attached to the source file outside its payload.
pub trait AttachedStore: Send + Sync {
    fn load(&self, source: &Source) -> Result<Option<ComicInfo>, StoreError>;
    fn store(&self, source: &Source, info: &ComicInfo) -> Result<(), StoreError>;
}

/// Metadata in a companion file.
pub trait SidecarStore: Send + Sync {
    fn load(&self, source: &Source) -> Result<Option<ComicInfo>, StoreError>;
}
