//! Streaming CBX engine — writer and reader.
//!
//! # Layout
//! ```text
//! [superblock 64 B][DATA block]*[INDEX block]
//! ```
//! Every block is a [`BlockHeader`] followed by its payload.  The INDEX block
//! holds the JSON [`MemberIndex`] (Zstd-compressed) and is located through
//! the superblock, which is patched in place on `finalize()`.
//!
//! # Rewrites
//! Books are never modified in place.  A rewrite streams a new book with
//! [`CbxWriter::copy_member`], which moves blocks verbatim (no decompression)
//! from an open [`CbxReader`], then adds the changed members.

use std::collections::HashSet;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::block::{decode_block, encode_block, BlockHeader, BlockType, BLOCK_HEADER_SIZE};
use crate::codec::CodecId;
use crate::index::{MemberIndex, MemberRecord};
use crate::superblock::{Superblock, SUPERBLOCK_SIZE};

/// Default Zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

fn invalid_data<E>(e: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, e)
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct CbxWriter<W: Write + Seek> {
    writer:                W,
    pub superblock:        Superblock,
    pub index:             MemberIndex,
    names:                 HashSet<String>,
    pub compression_level: i32,
    finalized:             bool,
}

impl<W: Write + Seek> CbxWriter<W> {
    pub fn new(writer: W) -> io::Result<Self> {
        Self::with_level(writer, DEFAULT_COMPRESSION_LEVEL)
    }

    pub fn with_level(mut writer: W, compression_level: i32) -> io::Result<Self> {
        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&[0u8; SUPERBLOCK_SIZE])?; // reserved; overwritten on finalize
        Ok(Self {
            writer,
            superblock: Superblock::new(),
            index: MemberIndex::default(),
            names: HashSet::new(),
            compression_level,
            finalized: false,
        })
    }

    fn claim_name(&mut self, name: &str) -> io::Result<()> {
        if self.finalized {
            return Err(io::Error::new(io::ErrorKind::Other, "book already finalized"));
        }
        if !self.names.insert(name.to_owned()) {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists,
                format!("duplicate member: {name}")));
        }
        Ok(())
    }

    fn write_block(&mut self, header: &BlockHeader, payload: &[u8]) -> io::Result<u64> {
        let offset = self.writer.stream_position()?;
        header.write(&mut self.writer)?;
        self.writer.write_all(payload)?;
        Ok(offset)
    }

    /// Compress `data` with `codec` and append it as a member.
    pub fn add_member(&mut self, name: &str, data: &[u8], codec: CodecId) -> io::Result<()> {
        self.claim_name(name)?;
        let (header, payload) = encode_block(BlockType::Data, data, codec, self.compression_level)
            .map_err(invalid_data)?;
        let offset = self.write_block(&header, &payload)?;
        self.index.members.push(MemberRecord {
            name:            name.to_owned(),
            offset,
            original_size:   data.len() as u64,
            compressed_size: payload.len() as u64,
            content_hash:    header.content_hash,
        });
        Ok(())
    }

    /// Copy one member's block from another book without re-encoding it.
    pub fn copy_member<R: Read + Seek>(&mut self, from: &mut CbxReader<R>, record: &MemberRecord) -> io::Result<()> {
        self.claim_name(&record.name)?;
        let (header, payload) = from.read_raw(record)?;
        let offset = self.write_block(&header, &payload)?;
        self.index.members.push(MemberRecord { offset, ..record.clone() });
        Ok(())
    }

    /// Write the INDEX block and patch the superblock.  Must be called once.
    pub fn finalize(&mut self) -> io::Result<()> {
        if self.finalized {
            return Ok(());
        }
        let index_payload = self.index.to_bytes().map_err(invalid_data)?;
        let (idx_header, idx_on_disk) = encode_block(
            BlockType::Index,
            &index_payload,
            CodecId::Zstd,
            self.compression_level,
        ).map_err(invalid_data)?;

        let index_offset = self.write_block(&idx_header, &idx_on_disk)?;
        self.superblock.index_offset = index_offset;
        self.superblock.index_size   = (BLOCK_HEADER_SIZE + idx_on_disk.len()) as u64;

        self.writer.seek(SeekFrom::Start(0))?;
        self.superblock.write(&mut self.writer)?;
        self.writer.flush()?;
        self.finalized = true;
        Ok(())
    }

    /// Hand back the underlying writer.  Call `finalize()` first.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct CbxReader<R: Read + Seek> {
    reader:         R,
    len:            u64,
    pub superblock: Superblock,
    pub index:      MemberIndex,
}

impl<R: Read + Seek> CbxReader<R> {
    /// Read the superblock, then load and verify the INDEX block.
    pub fn new(mut reader: R) -> io::Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let superblock = Superblock::read(&mut reader).map_err(invalid_data)?;

        reader.seek(SeekFrom::Start(superblock.index_offset))?;
        let idx_header = BlockHeader::read(&mut reader)?;
        if idx_header.block_type != BlockType::Index {
            return Err(invalid_data("superblock does not point at an INDEX block"));
        }
        let idx_payload = read_payload(&mut reader, len, &idx_header)?;
        let idx_raw = decode_block(&idx_header, &idx_payload).map_err(invalid_data)?;
        let index = MemberIndex::from_bytes(&idx_raw).map_err(invalid_data)?;

        Ok(Self { reader, len, superblock, index })
    }

    pub fn members(&self) -> &[MemberRecord] {
        &self.index.members
    }

    /// Header and stored payload of a member, as written.
    pub fn read_raw(&mut self, record: &MemberRecord) -> io::Result<(BlockHeader, Vec<u8>)> {
        self.reader.seek(SeekFrom::Start(record.offset))?;
        let header = BlockHeader::read(&mut self.reader)?;
        if header.block_type != BlockType::Data {
            return Err(invalid_data(format!("member {} is not a DATA block", record.name)));
        }
        let payload = read_payload(&mut self.reader, self.len, &header)?;
        Ok((header, payload))
    }

    /// Decoded contents of a member.
    pub fn read_record(&mut self, record: &MemberRecord) -> io::Result<Vec<u8>> {
        let (header, payload) = self.read_raw(record)?;
        decode_block(&header, &payload).map_err(invalid_data)
    }

    /// Decoded contents of the member called `name`, or `None`.
    pub fn read_member(&mut self, name: &str) -> io::Result<Option<Vec<u8>>> {
        match self.index.find(name).cloned() {
            Some(record) => self.read_record(&record).map(Some),
            None => Ok(None),
        }
    }
}

/// Read the payload following `header`, refusing sizes that run past the
/// end of the stream before allocating for them.
fn read_payload<R: Read + Seek>(reader: &mut R, len: u64, header: &BlockHeader) -> io::Result<Vec<u8>> {
    let pos = reader.stream_position()?;
    let remaining = len.saturating_sub(pos);
    if u64::from(header.comp_size) > remaining {
        return Err(invalid_data(format!(
            "block payload of {} bytes overruns the stream ({remaining} bytes left)",
            header.comp_size
        )));
    }
    let mut payload = vec![0u8; header.comp_size as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}
