//! Member codecs for CBX books.
//!
//! Page images are already compressed, so members default to `None`;
//! `Zstd` is used for the index and for text members such as
//! `ComicInfo.json`.  The codec byte is written into every block header.

use std::io;
use thiserror::Error;

/// Runtime codec discriminant.  The numeric value is the on-disk byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CodecId {
    None = 0,
    Zstd = 1,
}

impl CodecId {
    /// Resolve the on-disk byte.  `None` (the Option) for unknown values.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(CodecId::None),
            1 => Some(CodecId::Zstd),
            _ => None,
        }
    }

    /// Human-readable name (for diagnostics only — never parsed from disk).
    pub fn name(self) -> &'static str {
        match self {
            CodecId::None => "none",
            CodecId::Zstd => "zstd",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(CodecId::None),
            "zstd" => Some(CodecId::Zstd),
            _      => None,
        }
    }

    pub fn compress(self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        match self {
            CodecId::None => Ok(data.to_vec()),
            CodecId::Zstd => zstd::encode_all(data, level)
                .map_err(|e| CodecError::Compression(e.to_string())),
        }
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            CodecId::None => Ok(data.to_vec()),
            CodecId::Zstd => zstd::decode_all(data)
                .map_err(|e| CodecError::Decompression(e.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Unknown codec byte {0:#04x}")]
    UnknownCodec(u8),
    #[error("Checksum mismatch (expected {expected:#010x}, got {actual:#010x})")]
    Checksum { expected: u32, actual: u32 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
