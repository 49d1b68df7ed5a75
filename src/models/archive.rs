//! Archive metadata and the JSON shapes exchanged between frontend and reporter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for one stored archive blob.
///
/// The payload itself lives on disk; this row only describes it.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Archive {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Foreign key linking to the owning bucket.
    pub bucket_id: Uuid,

    /// Server-assigned key, currently decimal UNIX seconds.
    pub key: String,

    /// Content type sent by the writer, if any.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 checksum of the payload.
    pub etag: String,

    /// Timestamp of the last write under this key.
    pub last_modified: DateTime<Utc>,
}

/// One listing entry. `name` and `url` both carry the archive key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ArchiveUrl {
    pub name: String,
    pub url: String,
}

impl ArchiveUrl {
    pub fn from_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            url: key,
        }
    }
}

/// Reporter response to `POST /api/archive`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredArchive {
    pub key: String,
}

/// Frontend response to `POST /api/archives`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ArchiveCreated {
    pub url: String,
}
