//! Layered ComicInfo resolution.
//!
//! # Load precedence
//! 1. attached metadata (unless disabled)
//! 2. sidecar file (unless disabled), only when (1) found nothing
//! 3. the container's embedded record
//!
//! A [`LoadingMethod::Fast`] load stops at the first fallback hit.  A
//! [`LoadingMethod::Full`] load always consults the container, and an
//! embedded record found there wins.
//!
//! # Store
//! When the descriptor table enables updates for the source, the embedded
//! record is rewritten first.  If that rewrite fails the store ends there:
//! no attached write, result `false`.  Otherwise the attached store is
//! written (unless disabled) and the result is true if either write landed.
//!
//! Backend failures never cross this boundary; they are logged and treated
//! as absence (loads) or as a failed write (stores).  Only lock acquisition
//! errors are returned.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::container::{ContainerError, ContainerRegistry};
use crate::format::CapabilityResolver;
use crate::info::ComicInfo;
use crate::lock::{LockError, SourceLocks};
use crate::member::is_supported_image;
use crate::source::Source;
use crate::store::{AttachedStore, JsonSidecar, SidecarStore, XattrStore};

/// How hard `load_info` looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadingMethod {
    /// Accept the first attached/sidecar hit without opening the container.
    #[default]
    Fast,
    /// Always read the container; its record overrides the fallbacks.
    Full,
}

/// Per-instance switches.
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    /// Skip the attached store for loads and stores.
    pub disable_attached: bool,
    /// Skip the sidecar store for loads.
    pub disable_sidecar:  bool,
    /// Give up on a source lock after this long.  `None` waits forever.
    pub lock_timeout:     Option<Duration>,
}

pub struct MetadataResolver {
    options:      ResolverOptions,
    attached:     Arc<dyn AttachedStore>,
    sidecar:      Arc<dyn SidecarStore>,
    containers:   ContainerRegistry,
    capabilities: CapabilityResolver,
    locks:        SourceLocks,
}

impl Default for MetadataResolver {
    fn default() -> Self {
        Self::new(ResolverOptions::default())
    }
}

impl MetadataResolver {
    /// Resolver over the built-in backends: extended attributes, JSON
    /// sidecars, and the CBX/folder container handlers.
    pub fn new(options: ResolverOptions) -> Self {
        Self::with_backends(
            options,
            Arc::new(XattrStore::default()),
            Arc::new(JsonSidecar),
            ContainerRegistry::builtin(),
        )
    }

    pub fn with_backends(
        options:    ResolverOptions,
        attached:   Arc<dyn AttachedStore>,
        sidecar:    Arc<dyn SidecarStore>,
        containers: ContainerRegistry,
    ) -> Self {
        let locks = SourceLocks::with_timeout(options.lock_timeout);
        Self {
            options,
            attached,
            sidecar,
            containers,
            capabilities: CapabilityResolver::default(),
            locks,
        }
    }

    /// Replace the format descriptor table.
    pub fn with_capabilities(mut self, capabilities: CapabilityResolver) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn options(&self) -> &ResolverOptions { &self.options }

    /// Whether embedded metadata may be rewritten for `source`.
    pub fn update_enabled(&self, source: &Source) -> bool {
        self.capabilities.update_enabled(source)
    }

    // ── Load ──────────────────────────────────────────────────────────────────

    pub fn load_info(&self, source: &Source, method: LoadingMethod) -> Result<Option<ComicInfo>, LockError> {
        let _scope = self.locks.shared(source.path())?;

        let mut fallback = if self.options.disable_attached {
            None
        } else {
            self.load_attached(source)
        };
        if fallback.is_none() && !self.options.disable_sidecar {
            fallback = self.load_sidecar(source);
        }

        if fallback.is_some() && method == LoadingMethod::Fast {
            debug!(%source, "fast load satisfied by fallback metadata");
            return Ok(fallback);
        }

        match self.load_embedded(source) {
            Some(info) => {
                debug!(%source, overrides = fallback.is_some(), "using embedded metadata");
                Ok(Some(info))
            }
            None => Ok(fallback),
        }
    }

    fn load_attached(&self, source: &Source) -> Option<ComicInfo> {
        self.attached.load(source).unwrap_or_else(|e| {
            warn!(%source, error = %e, "attached metadata unavailable");
            None
        })
    }

    fn load_sidecar(&self, source: &Source) -> Option<ComicInfo> {
        self.sidecar.load(source).unwrap_or_else(|e| {
            warn!(%source, error = %e, "sidecar metadata unavailable");
            None
        })
    }

    fn load_embedded(&self, source: &Source) -> Option<ComicInfo> {
        let read = self.containers.get(source.format()).and_then(|h| h.read_info(source));
        read.unwrap_or_else(|e| {
            warn!(%source, error = %e, "embedded metadata unavailable");
            None
        })
    }

    // ── Store ─────────────────────────────────────────────────────────────────

    pub fn store_info(&self, source: &Source, info: &ComicInfo) -> Result<bool, LockError> {
        let _scope = self.locks.exclusive(source.path())?;
        let mut stored = false;

        if self.update_enabled(source) {
            if let Err(e) = self.store_embedded(source, info) {
                warn!(%source, error = %e, "embedded metadata write failed; store aborted");
                return Ok(false);
            }
            stored = true;
        }

        if !self.options.disable_attached {
            match self.attached.store(source, info) {
                Ok(()) => stored = true,
                Err(e) => warn!(%source, error = %e, "attached metadata write failed"),
            }
        }

        debug!(%source, stored, "store finished");
        Ok(stored)
    }

    fn store_embedded(&self, source: &Source, info: &ComicInfo) -> Result<(), ContainerError> {
        self.containers.get(source.format())?.write_info(source, info)
    }

    // ── Pages ─────────────────────────────────────────────────────────────────

    /// Displayable image members of the container, in container order.
    pub fn images(&self, source: &Source) -> Result<Vec<String>, LockError> {
        let _scope = self.locks.shared(source.path())?;
        let entries = self
            .containers
            .get(source.format())
            .and_then(|h| h.entries(source))
            .unwrap_or_else(|e| {
                warn!(%source, error = %e, "container listing failed");
                Vec::new()
            });
        Ok(entries.into_iter().filter(|n| is_supported_image(n)).collect())
    }
}
