use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use uuid::Uuid;
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"CBX\0";
pub const VERSION: u32 = 1;
/// Fixed on-disk size; the unused tail is zero padding.
pub const SUPERBLOCK_SIZE: usize = 64;

#[derive(Error, Debug)]
pub enum SuperblockError {
    #[error("Invalid magic number")]
    InvalidMagic,
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u32),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct Superblock {
    pub version: u32,
    pub archive_uuid: Uuid,
    pub index_offset: u64,
    pub index_size: u64,
    /// Unix seconds at creation (or last rewrite).
    pub created: i64,
}

impl Default for Superblock {
    fn default() -> Self {
        Self::new()
    }
}

impl Superblock {
    pub fn new() -> Self {
        Self {
            version: VERSION,
            archive_uuid: Uuid::new_v4(),
            index_offset: 0,
            index_size: 0,
            created: chrono::Utc::now().timestamp(),
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_all(self.archive_uuid.as_bytes())?;
        writer.write_u64::<LittleEndian>(self.index_offset)?;
        writer.write_u64::<LittleEndian>(self.index_size)?;
        writer.write_i64::<LittleEndian>(self.created)?;
        // 4 + 4 + 16 + 8 + 8 + 8 = 48
        writer.write_all(&[0u8; SUPERBLOCK_SIZE - 48])?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, SuperblockError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(SuperblockError::InvalidMagic);
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != VERSION {
            return Err(SuperblockError::UnsupportedVersion(version));
        }
        let mut uuid_bytes = [0u8; 16];
        reader.read_exact(&mut uuid_bytes)?;
        let index_offset = reader.read_u64::<LittleEndian>()?;
        let index_size = reader.read_u64::<LittleEndian>()?;
        let created = reader.read_i64::<LittleEndian>()?;
        let mut pad = [0u8; SUPERBLOCK_SIZE - 48];
        reader.read_exact(&mut pad)?;
        Ok(Self {
            version,
            archive_uuid: Uuid::from_bytes(uuid_bytes),
            index_offset,
            index_size,
            created,
        })
    }
}
