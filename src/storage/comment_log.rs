//! Append-only log interface backing the guestbook.

use crate::models::comment::CommentEntry;
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("comment log {op} failed: {message}")]
    Backend { op: &'static str, message: String },
    #[error("comment `{0}` already exists")]
    DuplicateId(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl LogError {
    pub fn backend(op: &'static str, message: impl Into<String>) -> Self {
        LogError::Backend {
            op,
            message: message.into(),
        }
    }
}

pub type LogResult<T> = Result<T, LogError>;

/// A durable store where entries are written once and never changed.
#[async_trait]
pub trait CommentLog: Send + Sync {
    /// Every entry in the log, oldest arrival first as far as the backend
    /// can tell.
    async fn scan_all(&self) -> LogResult<Vec<CommentEntry>>;

    /// Durably write one new entry. Fails rather than overwriting an
    /// existing id.
    async fn put_item(&self, entry: &CommentEntry) -> LogResult<()>;
}

/// Bounds every call on the wrapped log with a fixed timeout.
pub struct TimeoutCommentLog {
    inner: Arc<dyn CommentLog>,
    limit: Duration,
}

impl TimeoutCommentLog {
    pub fn new(inner: Arc<dyn CommentLog>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    fn elapsed(&self, op: &'static str) -> LogError {
        LogError::backend(
            op,
            format!("no response within {}s", self.limit.as_secs_f32()),
        )
    }
}

#[async_trait]
impl CommentLog for TimeoutCommentLog {
    async fn scan_all(&self) -> LogResult<Vec<CommentEntry>> {
        tokio::time::timeout(self.limit, self.inner.scan_all())
            .await
            .map_err(|_| self.elapsed("scan"))?
    }

    async fn put_item(&self, entry: &CommentEntry) -> LogResult<()> {
        tokio::time::timeout(self.limit, self.inner.put_item(entry))
            .await
            .map_err(|_| self.elapsed("put"))?
    }
}
