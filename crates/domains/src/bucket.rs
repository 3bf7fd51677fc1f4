//! # Buckets and blob references
//!
//! A bucket is one partition of the document store: the global bucket holds
//! communities, per-user buckets hold posts, upvotes and profiles keyed by
//! normalized display name.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix marking a reference as a local file rather than a remote content id.
pub const LOCAL_PREFIX: &str = "local:";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bucket {
    Global,
    /// Normalized (trimmed, lowercased) display name
    User(String),
}

impl Bucket {
    /// Resolves the bucket for a display name. Blank or missing names map to `Global`.
    pub fn for_display_name(display_name: Option<&str>) -> Self {
        match display_name.map(|n| n.trim().to_lowercase()) {
            Some(name) if !name.is_empty() => Bucket::User(name),
            _ => Bucket::Global,
        }
    }

    /// Stable key used as a file stem and as the remote metadata tag.
    ///
    /// Lowercase ASCII letters and digits pass through; every other byte of
    /// the name is written as `_xx`, so distinct names never share a key.
    pub fn key(&self) -> String {
        match self {
            Bucket::Global => "global".to_string(),
            Bucket::User(name) => {
                let mut key = String::with_capacity(5 + name.len());
                key.push_str("user-");
                for byte in name.bytes() {
                    if byte.is_ascii_lowercase() || byte.is_ascii_digit() {
                        key.push(char::from(byte));
                    } else {
                        key.push_str(&format!("_{byte:02x}"));
                    }
                }
                key
            }
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Identifier of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlobRef {
    /// Local file, by key
    Local(String),
    /// Remote content identifier
    Remote(String),
}

impl BlobRef {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(LOCAL_PREFIX) {
            Some(key) => BlobRef::Local(key.to_string()),
            None => BlobRef::Remote(raw.to_string()),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, BlobRef::Local(_))
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobRef::Local(key) => write!(f, "{LOCAL_PREFIX}{key}"),
            BlobRef::Remote(cid) => f.write_str(cid),
        }
    }
}

impl From<String> for BlobRef {
    fn from(raw: String) -> Self {
        BlobRef::parse(&raw)
    }
}

impl From<BlobRef> for String {
    fn from(r: BlobRef) -> Self {
        r.to_string()
    }
}

/// Listing entry for a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedBlob {
    pub reference: BlobRef,
    pub name: Option<String>,
    /// Bucket key the blob was tagged with, if any
    pub bucket: Option<String>,
    pub sequence: u64,
    pub size: Option<u64>,
    pub pinned_at: Option<DateTime<Utc>>,
}
