//! Narrow interfaces onto the two durable backends the gallery depends on.
//!
//! - [`ObjectStore`] is the blob side: list a prefix, sign a read link,
//!   write one object.
//! - [`CommentLog`] is the append-only guestbook log.
//!
//! Concrete backends live in the submodules. Errors are reported as typed
//! [`StoreError`] / [`LogError`] values and never retried here.

pub mod comment_log;
pub mod dynamo_log;
pub mod local;
pub mod s3;
pub mod sqlite_log;

#[cfg(test)]
pub mod memory;

pub use comment_log::{CommentLog, LogError, TimeoutCommentLog};

use crate::models::photo::ObjectSummary;
use async_trait::async_trait;
use bytes::Bytes;
use std::{sync::Arc, time::Duration};
use thiserror::Error;

/// Broad failure classes reported by object store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreErrorKind {
    #[error("network failure")]
    Network,
    #[error("access denied")]
    Auth,
    #[error("object not found")]
    NotFound,
    #[error("request throttled")]
    Throttled,
    #[error("timed out")]
    Timeout,
    #[error("backend error")]
    Backend,
}

/// Failure of a single object store call, tagged with the operation and,
/// where one applies, the object key.
#[derive(Debug, Error)]
#[error("{op} {kind}: {message}")]
pub struct StoreError {
    pub op: &'static str,
    pub key: Option<String>,
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(op: &'static str, kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            op,
            key: None,
            kind,
            message: message.into(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A key-indexed blob store holding the gallery's images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every object under `prefix`. Backends that page internally must
    /// drain all pages before returning.
    async fn list_all(&self, prefix: &str) -> StoreResult<Vec<ObjectSummary>>;

    /// A URL granting read access to `key` for `ttl` from now.
    async fn issue_read_url(&self, key: &str, ttl: Duration) -> StoreResult<String>;

    /// Write `bytes` at `key`. The object is either fully readable afterwards
    /// or not visible at all.
    async fn put_object(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<()>;
}

/// Bounds every call on the wrapped store with a fixed timeout.
pub struct TimeoutObjectStore {
    inner: Arc<dyn ObjectStore>,
    limit: Duration,
}

impl TimeoutObjectStore {
    pub fn new(inner: Arc<dyn ObjectStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    fn elapsed(&self, op: &'static str) -> StoreError {
        StoreError::new(
            op,
            StoreErrorKind::Timeout,
            format!("no response within {}s", self.limit.as_secs_f32()),
        )
    }
}

#[async_trait]
impl ObjectStore for TimeoutObjectStore {
    async fn list_all(&self, prefix: &str) -> StoreResult<Vec<ObjectSummary>> {
        tokio::time::timeout(self.limit, self.inner.list_all(prefix))
            .await
            .map_err(|_| self.elapsed("list"))?
    }

    async fn issue_read_url(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        tokio::time::timeout(self.limit, self.inner.issue_read_url(key, ttl))
            .await
            .map_err(|_| self.elapsed("sign").with_key(key))?
    }

    async fn put_object(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<()> {
        tokio::time::timeout(self.limit, self.inner.put_object(key, bytes, content_type))
            .await
            .map_err(|_| self.elapsed("put").with_key(key))?
    }
}
