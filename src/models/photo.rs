//! Photo metadata and the shapes produced by gallery operations.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Raw listing entry as reported by an object store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// An image stored in the gallery bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhotoObject {
    /// Store-relative path, e.g. `uploads/1700000000000-42-cake.jpg`.
    pub key: String,
    pub display_name: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
}

impl PhotoObject {
    /// Builds a photo from a listing entry; the display name is the last
    /// segment of the key.
    pub fn from_summary(summary: ObjectSummary) -> Self {
        let display_name = summary
            .key
            .rsplit('/')
            .next()
            .unwrap_or(&summary.key)
            .to_string();
        Self {
            key: summary.key,
            display_name,
            last_modified: summary.last_modified,
            content_type: None,
        }
    }
}

/// A photo together with a freshly issued, time-limited read URL.
#[derive(Clone, Debug)]
pub struct SignedPhoto {
    pub photo: PhotoObject,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// One page of the chronological listing.
#[derive(Debug)]
pub struct PageResult {
    pub items: Vec<SignedPhoto>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// A file received from the client, not yet validated.
#[derive(Clone, Debug)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: String,
    /// Payload bytes. Readers stop buffering one byte past the size limit,
    /// so an oversized file is still detectable here.
    pub data: Bytes,
}

/// A file that could not be stored, with the reason shown to the client.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadFailure {
    pub file_name: String,
    pub error: String,
}

/// Result of a batch upload.
///
/// `succeeded` and `failed` together cover every attempted file;
/// `rejected` holds files that never reached the store.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub succeeded: Vec<SignedPhoto>,
    pub failed: Vec<UploadFailure>,
    pub rejected: Vec<UploadFailure>,
}

impl UploadOutcome {
    /// Failures to report back to the client: rejected files first, then
    /// store failures.
    pub fn all_failures(&self) -> Vec<UploadFailure> {
        self.rejected
            .iter()
            .chain(self.failed.iter())
            .cloned()
            .collect()
    }
}
