use serde::{Serialize, Deserialize};

/// One member of a CBX book.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub name: String,
    /// Absolute offset of the member's block header.
    pub offset: u64,
    pub original_size: u64,
    pub compressed_size: u64,
    pub content_hash: [u8; 32],
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct MemberIndex {
    pub members: Vec<MemberRecord>,
}

impl MemberIndex {
    pub fn find(&self, name: &str) -> Option<&MemberRecord> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
