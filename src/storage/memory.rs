//! In-memory backends for service and router tests.

use super::{
    ObjectStore, StoreError, StoreErrorKind, StoreResult,
    comment_log::{CommentLog, LogError, LogResult},
};
use crate::models::{comment::CommentEntry, photo::ObjectSummary};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

#[derive(Clone, Debug)]
pub struct MemoryObject {
    pub bytes: Bytes,
    pub content_type: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Keys containing any of `fail_puts_containing` fail on write; keys in
/// `fail_signing` fail on signing.
#[derive(Default)]
pub struct MemoryObjectStore {
    pub objects: Mutex<BTreeMap<String, MemoryObject>>,
    pub fail_puts_containing: Vec<String>,
    pub fail_signing: HashSet<String>,
    pub signed: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn with_objects<'a>(
        entries: impl IntoIterator<Item = (&'a str, Option<DateTime<Utc>>)>,
    ) -> Self {
        let store = Self::default();
        {
            let mut objects = store.objects.lock().unwrap();
            for (key, last_modified) in entries {
                objects.insert(
                    key.to_string(),
                    MemoryObject {
                        bytes: Bytes::new(),
                        content_type: "image/jpeg".into(),
                        last_modified,
                    },
                );
            }
        }
        store
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_all(&self, prefix: &str) -> StoreResult<Vec<ObjectSummary>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, obj)| ObjectSummary {
                key: key.clone(),
                last_modified: obj.last_modified,
            })
            .collect())
    }

    async fn issue_read_url(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        if self.fail_signing.contains(key) {
            return Err(StoreError::new("sign", StoreErrorKind::Auth, "denied").with_key(key));
        }
        if !self.objects.lock().unwrap().contains_key(key) {
            return Err(StoreError::new("sign", StoreErrorKind::NotFound, "missing").with_key(key));
        }
        let n = self.signed.fetch_add(1, Ordering::SeqCst);
        Ok(format!("memory://{key}?ttl={}&n={n}", ttl.as_secs()))
    }

    async fn put_object(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<()> {
        if self
            .fail_puts_containing
            .iter()
            .any(|needle| key.contains(needle.as_str()))
        {
            return Err(
                StoreError::new("put", StoreErrorKind::Network, "connection reset").with_key(key),
            );
        }
        self.objects.lock().unwrap().insert(
            key.to_string(),
            MemoryObject {
                bytes,
                content_type: content_type.to_string(),
                last_modified: Some(Utc::now()),
            },
        );
        Ok(())
    }
}

/// Append-only vector; scan order is insertion order.
#[derive(Default)]
pub struct MemoryCommentLog {
    pub entries: Mutex<Vec<CommentEntry>>,
    pub unavailable: bool,
}

#[async_trait]
impl CommentLog for MemoryCommentLog {
    async fn scan_all(&self) -> LogResult<Vec<CommentEntry>> {
        if self.unavailable {
            return Err(LogError::backend("scan", "table unavailable"));
        }
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn put_item(&self, entry: &CommentEntry) -> LogResult<()> {
        if self.unavailable {
            return Err(LogError::backend("put", "table unavailable"));
        }
        let mut entries = self.entries.lock().unwrap();
        if entries.iter().any(|e| e.id == entry.id) {
            return Err(LogError::DuplicateId(entry.id.clone()));
        }
        entries.push(entry.clone());
        Ok(())
    }
}
