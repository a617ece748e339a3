use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use crate::codec::{CodecId, CodecError};
use crc32fast::Hasher;

pub const BLOCK_MAGIC: u32 = 0x4B434C42; // "BLCK" little-endian
pub const BLOCK_HEADER_SIZE: usize = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockType {
    /// One archive member.
    Data = 0,
    /// The JSON member index; always last.
    Index = 1,
}

impl BlockType {
    fn from_byte(b: u8) -> io::Result<Self> {
        match b {
            0 => Ok(BlockType::Data),
            1 => Ok(BlockType::Index),
            _ => Err(io::Error::new(io::ErrorKind::InvalidData, format!("unknown block type {b}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub block_type: BlockType,
    pub codec: CodecId,
    pub flags: u16,
    pub orig_size: u32,
    pub comp_size: u32,
    /// CRC32 of the payload as stored.
    pub checksum: u32,
    /// BLAKE3 of the uncompressed content.
    pub content_hash: [u8; 32],
}

impl BlockHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(BLOCK_MAGIC)?;
        writer.write_u8(self.block_type as u8)?;
        writer.write_u8(self.codec as u8)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u32::<LittleEndian>(self.orig_size)?;
        writer.write_u32::<LittleEndian>(self.comp_size)?;
        writer.write_u32::<LittleEndian>(self.checksum)?;
        writer.write_all(&self.content_hash)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != BLOCK_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData,
                format!("bad block magic {magic:#010x}")));
        }
        let block_type = BlockType::from_byte(reader.read_u8()?)?;
        let codec_byte = reader.read_u8()?;
        let codec = CodecId::from_byte(codec_byte).ok_or_else(|| io::Error::new(
            io::ErrorKind::InvalidData, CodecError::UnknownCodec(codec_byte)))?;
        let flags = reader.read_u16::<LittleEndian>()?;
        let orig_size = reader.read_u32::<LittleEndian>()?;
        let comp_size = reader.read_u32::<LittleEndian>()?;
        let checksum = reader.read_u32::<LittleEndian>()?;
        let mut content_hash = [0u8; 32];
        reader.read_exact(&mut content_hash)?;
        Ok(Self { block_type, codec, flags, orig_size, comp_size, checksum, content_hash })
    }
}

pub fn encode_block(block_type: BlockType, data: &[u8], codec: CodecId, level: i32) -> Result<(BlockHeader, Vec<u8>), CodecError> {
    let payload = codec.compress(data, level)?;
    let mut hasher = Hasher::new();
    hasher.update(&payload);
    let header = BlockHeader {
        block_type,
        codec,
        flags: 0,
        orig_size: data.len() as u32,
        comp_size: payload.len() as u32,
        checksum: hasher.finalize(),
        content_hash: blake3::hash(data).into(),
    };
    Ok((header, payload))
}

pub fn decode_block(header: &BlockHeader, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    let actual = hasher.finalize();
    if actual != header.checksum {
        return Err(CodecError::Checksum { expected: header.checksum, actual });
    }
    header.codec.decompress(payload)
}
