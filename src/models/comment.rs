//! Guestbook entries.

use serde::{Deserialize, Serialize};

/// One immutable guestbook message.
///
/// Serialized as `{id, comment, timestamp}`, the shape stored in the log
/// and returned to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntry {
    pub id: String,
    #[serde(rename = "comment")]
    pub text: String,
    /// Creation time in milliseconds since the Unix epoch.
    #[serde(rename = "timestamp")]
    pub created_at_millis: i64,
}
