//! Extended-attribute backed [`AttachedStore`].
//!
//! The record is stored as JSON in the `user.comicinfo` attribute of the
//! container file.  Only Linux is wired up; elsewhere every call reports
//! [`StoreError::Unsupported`] and the resolver falls through to the next
//! backend.

use crate::info::ComicInfo;
use crate::source::Source;

use super::{AttachedStore, StoreError};

/// Attribute name used by [`XattrStore::default`].
pub const DEFAULT_ATTRIBUTE: &str = "user.comicinfo";

#[derive(Debug, Clone)]
pub struct XattrStore {
    attribute: String,
}

impl Default for XattrStore {
    fn default() -> Self {
        Self { attribute: DEFAULT_ATTRIBUTE.to_owned() }
    }
}

impl XattrStore {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self { attribute: attribute.into() }
    }

    pub fn attribute(&self) -> &str { &self.attribute }
}

#[cfg(target_os = "linux")]
impl AttachedStore for XattrStore {
    fn load(&self, source: &Source) -> Result<Option<ComicInfo>, StoreError> {
        use rustix::fs::getxattr;
        use rustix::io::Errno;

        // Ask for the size first; the value can change between calls, so
        // retry once on ERANGE.
        for _ in 0..2 {
            let len = match getxattr(source.path(), self.attribute.as_str(), &mut []) {
                Ok(len) => len,
                Err(Errno::NODATA) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            if len == 0 {
                return Ok(None);
            }
            let mut buf = vec![0u8; len];
            match getxattr(source.path(), self.attribute.as_str(), &mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Some(ComicInfo::from_bytes(&buf)?));
                }
                Err(Errno::RANGE) => continue,
                Err(Errno::NODATA) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
        Err(Errno::RANGE.into())
    }

    fn store(&self, source: &Source, info: &ComicInfo) -> Result<(), StoreError> {
        use rustix::fs::{setxattr, XattrFlags};

        let bytes = info.to_bytes()?;
        setxattr(source.path(), self.attribute.as_str(), &bytes, XattrFlags::empty())?;
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl AttachedStore for XattrStore {
    fn load(&self, _source: &Source) -> Result<Option<ComicInfo>, StoreError> {
        Err(StoreError::Unsupported)
    }

    fn store(&self, _source: &Source, _info: &ComicInfo) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }
}
