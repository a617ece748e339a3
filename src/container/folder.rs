use std::fs;
use std::io;

use crate::info::{ComicInfo, COMIC_INFO_MEMBER};
use crate::source::{ContainerFormat, Source};

use super::{ContainerError, ContainerHandler};

/// A directory of page files.  Read-only: metadata is picked up from a
/// `ComicInfo.json` inside the directory but never written there.
#[derive(Debug, Clone, Copy, Default)]
pub struct FolderHandler;

impl ContainerHandler for FolderHandler {
    fn read_info(&self, source: &Source) -> Result<Option<ComicInfo>, ContainerError> {
        match fs::read(source.path().join(COMIC_INFO_MEMBER)) {
            Ok(bytes) => Ok(Some(ComicInfo::from_bytes(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_info(&self, _source: &Source, _info: &ComicInfo) -> Result<(), ContainerError> {
        Err(ContainerError::ReadOnly(ContainerFormat::Folder))
    }

    fn entries(&self, source: &Source) -> Result<Vec<String>, ContainerError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(source.path())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name != COMIC_INFO_MEMBER {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
