//! High-level [`Book`] API for CBX containers.
//!
//! ```no_run
//! use comicinfo::archive::{Book, PackOptions};
//! use comicinfo::ComicInfo;
//!
//! // Write
//! let mut book = Book::create("saga-01.cbx", PackOptions::default())?;
//! book.add_page("p001.jpg", &std::fs::read("p001.jpg")?)?;
//! book.set_info(&ComicInfo::titled("Saga #1"))?;
//! book.finalize()?;
//!
//! // Read
//! let mut book = Book::open("saga-01.cbx")?;
//! assert_eq!(book.info()?.and_then(|i| i.title).as_deref(), Some("Saga #1"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::CodecId;
use crate::index::MemberRecord;
use crate::info::{ComicInfo, COMIC_INFO_MEMBER};
use crate::io_stream::{CbxReader, CbxWriter, DEFAULT_COMPRESSION_LEVEL};

// ── PackOptions ───────────────────────────────────────────────────────────────

/// Configuration for [`Book::create`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Codec for page members.  Pages are usually pre-compressed images.
    pub page_codec: CodecId,
    pub level:      i32,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            page_codec: CodecId::None,
            level:      DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

// ── Book ──────────────────────────────────────────────────────────────────────

enum BookMode {
    Read(CbxReader<BufReader<File>>),
    Write(CbxWriter<BufWriter<File>>, CodecId),
}

pub struct Book {
    path: PathBuf,
    mode: BookMode,
}

impl Book {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_owned();
        let reader = CbxReader::new(BufReader::new(File::open(&path)?))?;
        Ok(Self { path, mode: BookMode::Read(reader) })
    }

    pub fn create<P: AsRef<Path>>(path: P, opts: PackOptions) -> io::Result<Self> {
        let path = path.as_ref().to_owned();
        let writer = CbxWriter::with_level(BufWriter::new(File::create(&path)?), opts.level)?;
        Ok(Self { path, mode: BookMode::Write(writer, opts.page_codec) })
    }

    // ── Write ─────────────────────────────────────────────────────────────────

    pub fn add_page(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        match &mut self.mode {
            BookMode::Write(w, codec) => w.add_member(name, data, *codec),
            BookMode::Read(_)         => Err(read_only()),
        }
    }

    /// Embed `info` as the `ComicInfo.json` member.
    pub fn set_info(&mut self, info: &ComicInfo) -> io::Result<()> {
        let bytes = info.to_bytes().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        match &mut self.mode {
            BookMode::Write(w, _) => w.add_member(COMIC_INFO_MEMBER, &bytes, CodecId::Zstd),
            BookMode::Read(_)     => Err(read_only()),
        }
    }

    /// Flush the INDEX block and patch the superblock.  Must be called once.
    pub fn finalize(&mut self) -> io::Result<()> {
        match &mut self.mode {
            BookMode::Write(w, _) => w.finalize(),
            BookMode::Read(_)     => Err(read_only()),
        }
    }

    // ── Read ──────────────────────────────────────────────────────────────────

    /// Every member, including `ComicInfo.json`, in book order.
    pub fn members(&self) -> Vec<MemberRecord> {
        match &self.mode {
            BookMode::Read(r)     => r.members().to_vec(),
            BookMode::Write(w, _) => w.index.members.clone(),
        }
    }

    /// Member names other than the embedded metadata.
    pub fn entry_names(&self) -> Vec<String> {
        self.members()
            .into_iter()
            .map(|m| m.name)
            .filter(|n| n != COMIC_INFO_MEMBER)
            .collect()
    }

    pub fn read_member(&mut self, name: &str) -> io::Result<Vec<u8>> {
        match &mut self.mode {
            BookMode::Read(r) => r.read_member(name)?.ok_or_else(|| io::Error::new(
                io::ErrorKind::NotFound, format!("member not found: {name}"))),
            BookMode::Write(..) => Err(write_only()),
        }
    }

    /// The embedded record, if the book carries one.
    pub fn info(&mut self) -> io::Result<Option<ComicInfo>> {
        let bytes = match &mut self.mode {
            BookMode::Read(r) => r.read_member(COMIC_INFO_MEMBER)?,
            BookMode::Write(..) => return Err(write_only()),
        };
        bytes
            .map(|b| ComicInfo::from_bytes(&b))
            .transpose()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn uuid(&self) -> uuid::Uuid {
        match &self.mode {
            BookMode::Read(r)     => r.superblock.archive_uuid,
            BookMode::Write(w, _) => w.superblock.archive_uuid,
        }
    }

    pub fn created(&self) -> i64 {
        match &self.mode {
            BookMode::Read(r)     => r.superblock.created,
            BookMode::Write(w, _) => w.superblock.created,
        }
    }
}

/// Replace the embedded `ComicInfo.json` of the book at `path`.
///
/// The new book is streamed into a temp file in the same directory (every
/// other member copied verbatim) and renamed over the original, so readers
/// never observe a half-written book.  The original's permission bits are
/// carried over; other extended attributes are not.
pub fn rewrite_info(path: &Path, info: &ComicInfo, level: i32) -> io::Result<()> {
    let bytes = info.to_bytes().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));

    let mut reader = CbxReader::new(BufReader::new(File::open(path)?))?;
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    let mut writer = CbxWriter::with_level(BufWriter::new(tmp.reopen()?), level)?;
    writer.superblock.archive_uuid = reader.superblock.archive_uuid;

    let records = reader.members().to_vec();
    for record in records.iter().filter(|r| r.name != COMIC_INFO_MEMBER) {
        writer.copy_member(&mut reader, record)?;
    }
    writer.add_member(COMIC_INFO_MEMBER, &bytes, CodecId::Zstd)?;
    writer.finalize()?;
    writer
        .into_inner()
        .into_inner()
        .map_err(|e| e.into_error())?
        .sync_all()?;
    drop(reader);

    // The temp file is created 0600; the book keeps its own mode.
    tmp.as_file().set_permissions(std::fs::metadata(path)?.permissions())?;
    tmp.persist(path).map_err(|e| e.error)?;
    debug!(path = %path.display(), members = records.len(), "rewrote embedded ComicInfo");
    Ok(())
}

fn read_only()  -> io::Error { io::Error::new(io::ErrorKind::PermissionDenied, "book is read-only") }
fn write_only() -> io::Error { io::Error::new(io::ErrorKind::PermissionDenied, "book is write-only") }
