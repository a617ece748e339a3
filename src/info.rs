//! The [`ComicInfo`] record.
//!
//! The resolver treats the record as an opaque value: it is loaded, compared
//! and replaced whole.  Every backend (extended attribute, sidecar file,
//! embedded container member) stores the same JSON encoding.

use serde::{Deserialize, Serialize};

/// Name of the embedded metadata member inside a container.
pub const COMIC_INFO_MEMBER: &str = "ComicInfo.json";

/// Per-book metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComicInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title:        Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series:       Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number:       Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume:       Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count:        Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary:      Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year:         Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month:        Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day:          Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer:       Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penciller:    Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher:    Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre:        Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web:          Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count:   Option<u32>,
    #[serde(rename = "LanguageISO", default, skip_serializing_if = "Option::is_none")]
    pub language_iso: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manga:        Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags:         Vec<String>,
}

impl ComicInfo {
    /// A record with only a title set.  Handy for tools and tests.
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Self::default() }
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn to_pretty_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
