//! Metadata row for an object held by the local disk-backed store.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A single stored blob as recorded in the `objects` table.
///
/// Only metadata lives here; the payload sits on disk beneath the store's
/// base directory.
#[derive(Clone, FromRow, Debug)]
pub struct StoredObject {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Object key (path-like identifier, e.g. `uploads/1700000000000-42-a.jpg`).
    pub key: String,

    /// Last path segment of the key.
    pub filename: String,

    /// Content type (MIME type).
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 of the payload, hex encoded.
    pub etag: Option<String>,

    /// Timestamp when the object was last written.
    pub last_modified: DateTime<Utc>,
}
