use std::io;

use crate::archive::{rewrite_info, Book};
use crate::info::{ComicInfo, COMIC_INFO_MEMBER};
use crate::io_stream::DEFAULT_COMPRESSION_LEVEL;
use crate::source::Source;

use super::{ContainerError, ContainerHandler};

/// CBX books: metadata lives in the `ComicInfo.json` member.
#[derive(Debug, Clone)]
pub struct CbxHandler {
    /// Zstd level for the rewritten metadata member and index.
    pub level: i32,
}

impl Default for CbxHandler {
    fn default() -> Self {
        Self { level: DEFAULT_COMPRESSION_LEVEL }
    }
}

impl ContainerHandler for CbxHandler {
    fn read_info(&self, source: &Source) -> Result<Option<ComicInfo>, ContainerError> {
        let mut book = Book::open(source.path()).map_err(archive_error)?;
        if !book.members().iter().any(|m| m.name == COMIC_INFO_MEMBER) {
            return Ok(None);
        }
        let bytes = book.read_member(COMIC_INFO_MEMBER).map_err(archive_error)?;
        Ok(Some(ComicInfo::from_bytes(&bytes)?))
    }

    fn write_info(&self, source: &Source, info: &ComicInfo) -> Result<(), ContainerError> {
        rewrite_info(source.path(), info, self.level).map_err(archive_error)
    }

    fn entries(&self, source: &Source) -> Result<Vec<String>, ContainerError> {
        Ok(Book::open(source.path()).map_err(archive_error)?.entry_names())
    }
}

/// Structural damage (bad magic, checksum, index) becomes `Archive`;
/// plain file-system failures stay `Io`.
fn archive_error(e: io::Error) -> ContainerError {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => ContainerError::Archive(e.to_string()),
        _ => ContainerError::Io(e),
    }
}
