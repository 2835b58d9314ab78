//! Guestbook: bounded-length messages appended to a durable log.

use crate::{errors::AppError, models::comment::CommentEntry, storage::CommentLog};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::info;

/// Limit counted in Unicode scalar values of the trimmed text.
pub const MAX_COMMENT_CHARS: usize = 140;

const ID_TOKEN_LEN: usize = 9;
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Clone)]
pub struct CommentService {
    log: Arc<dyn CommentLog>,
}

impl CommentService {
    pub fn new(log: Arc<dyn CommentLog>) -> Self {
        Self { log }
    }

    /// Validate, stamp and durably append one message.
    pub async fn append(&self, text: &str) -> Result<CommentEntry, AppError> {
        let text = validate_comment(text)?;
        let created_at_millis = Utc::now().timestamp_millis();
        let entry = CommentEntry {
            id: generate_id(created_at_millis),
            text: text.to_string(),
            created_at_millis,
        };

        self.log.put_item(&entry).await?;
        info!(id = %entry.id, "comment posted");
        Ok(entry)
    }

    /// The whole log, newest first. Entries sharing a millisecond are
    /// ordered latest arrival first.
    pub async fn list(&self) -> Result<Vec<CommentEntry>, AppError> {
        let mut entries = self.log.scan_all().await?;
        entries.reverse();
        entries.sort_by(|a, b| b.created_at_millis.cmp(&a.created_at_millis));
        Ok(entries)
    }
}

/// Returns the trimmed text when it is non-empty and within the limit.
pub fn validate_comment(text: &str) -> Result<&str, AppError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("comment is empty"));
    }
    if trimmed.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::validation(format!(
            "comments are limited to {MAX_COMMENT_CHARS} characters"
        )));
    }
    Ok(trimmed)
}

/// `comment-{millis}-{9 base36 chars}`.
fn generate_id(created_at_millis: i64) -> String {
    let mut rng = rand::thread_rng();
    let token: String = (0..ID_TOKEN_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("comment-{created_at_millis}-{token}")
}
