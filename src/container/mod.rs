//! Per-format container strategies.
//!
//! A [`ContainerHandler`] knows how to read and embed metadata inside one
//! container format and how to list its members.  The resolver never looks
//! at payloads itself; it picks the handler registered for the source's
//! declared [`ContainerFormat`] in a [`ContainerRegistry`].

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::info::ComicInfo;
use crate::source::{ContainerFormat, Source};

pub mod cbx;
pub mod folder;

pub use cbx::CbxHandler;
pub use folder::FolderHandler;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed embedded metadata: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Archive error: {0}")]
    Archive(String),
    #[error("Container format {0} does not support rewriting")]
    ReadOnly(ContainerFormat),
    #[error("No handler registered for container format {0}")]
    NoHandler(ContainerFormat),
}

/// Format-specific access to a container.
pub trait ContainerHandler: Send + Sync {
    /// Embedded metadata, `Ok(None)` when the container carries none.
    fn read_info(&self, source: &Source) -> Result<Option<ComicInfo>, ContainerError>;

    /// Embed `info`, replacing any previous record.
    fn write_info(&self, source: &Source, info: &ComicInfo) -> Result<(), ContainerError>;

    /// Member names in container order, metadata members excluded.
    fn entries(&self, source: &Source) -> Result<Vec<String>, ContainerError>;
}

/// Handlers keyed by container format.
#[derive(Clone, Default)]
pub struct ContainerRegistry {
    handlers: HashMap<ContainerFormat, Arc<dyn ContainerHandler>>,
}

impl ContainerRegistry {
    /// An empty registry; every lookup fails with `NoHandler`.
    pub fn new() -> Self {
        Self::default()
    }

    /// CBX and folder handlers.
    pub fn builtin() -> Self {
        Self::new()
            .with(ContainerFormat::Cbx, CbxHandler::default())
            .with(ContainerFormat::Folder, FolderHandler)
    }

    pub fn with<H: ContainerHandler + 'static>(mut self, format: ContainerFormat, handler: H) -> Self {
        self.register(format, Arc::new(handler));
        self
    }

    /// Register or replace the handler for `format`.
    pub fn register(&mut self, format: ContainerFormat, handler: Arc<dyn ContainerHandler>) {
        self.handlers.insert(format, handler);
    }

    pub fn get(&self, format: ContainerFormat) -> Result<&dyn ContainerHandler, ContainerError> {
        self.handlers
            .get(&format)
            .map(|h| &**h)
            .ok_or(ContainerError::NoHandler(format))
    }
}

impl std::fmt::Debug for ContainerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
