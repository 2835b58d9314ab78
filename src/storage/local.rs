//! Local object store: SQLite for metadata, disk for payloads.
//!
//! Payloads are sharded beneath `base_path/{shard}/{shard}/{key}`. Read
//! links point at this service's own `/files/{*key}` route and carry an
//! HMAC-SHA256 signature over the key and expiry, so they work without a
//! session token and stop working once expired or altered.

use super::{ObjectStore, StoreError, StoreErrorKind, StoreResult};
use crate::models::{object::StoredObject, photo::ObjectSummary};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Clone)]
pub struct LocalObjectStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: SqlitePool,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    /// Externally reachable origin of this service, e.g. `http://localhost:3002`.
    public_base_url: String,

    link_secret: Vec<u8>,
}

impl LocalObjectStore {
    pub fn new(
        db: SqlitePool,
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
        link_secret: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            link_secret: link_secret.into(),
        }
    }

    /// Keys must be relative, free of `..`, and limited to characters that
    /// can appear in a URL path unescaped.
    fn ensure_key_safe(op: &'static str, key: &str) -> StoreResult<()> {
        let invalid = || {
            StoreError::new(op, StoreErrorKind::Backend, "invalid object key").with_key(key)
        };
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(invalid());
        }
        if key.starts_with('/') || key.contains("..") || key.contains("//") {
            return Err(invalid());
        }
        if !key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-' | b'/'))
        {
            return Err(invalid());
        }
        Ok(())
    }

    /// Two-level shard identifiers from MD5(key), as lowercase hex.
    fn object_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn fetch_object(&self, op: &'static str, key: &str) -> StoreResult<StoredObject> {
        sqlx::query_as::<_, StoredObject>(
            "SELECT id, key, filename, content_type, size_bytes, etag, last_modified
             FROM objects WHERE key = ?",
        )
        .bind(key)
        .fetch_one(&self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => {
                StoreError::new(op, StoreErrorKind::NotFound, "no such object").with_key(key)
            }
            other => db_error(op, other).with_key(key),
        })
    }

    fn link_signature(&self, key: &str, expires: i64) -> StoreResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.link_secret)
            .map_err(|err| StoreError::new("sign", StoreErrorKind::Auth, err.to_string()))?;
        mac.update(format!("{key}\n{expires}").as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a read link produced by [`ObjectStore::issue_read_url`].
    ///
    /// Fails with `Auth` when the signature does not match or the link has
    /// expired.
    pub fn verify_read_link(&self, key: &str, expires: i64, signature: &str) -> StoreResult<()> {
        let denied = |msg: &str| StoreError::new("read", StoreErrorKind::Auth, msg).with_key(key);

        if expires < Utc::now().timestamp() {
            return Err(denied("link expired"));
        }
        let provided = hex::decode(signature).map_err(|_| denied("malformed signature"))?;
        let mut mac = HmacSha256::new_from_slice(&self.link_secret)
            .map_err(|err| StoreError::new("read", StoreErrorKind::Auth, err.to_string()))?;
        mac.update(format!("{key}\n{expires}").as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| denied("signature mismatch"))
    }

    /// Open an object for streaming out.
    ///
    /// Returns `NotFound` if metadata exists but the payload file is missing.
    pub async fn open_object(&self, key: &str) -> StoreResult<(StoredObject, File)> {
        Self::ensure_key_safe("read", key)?;
        let object = self.fetch_object("read", key).await?;

        let file = File::open(self.object_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::new("read", StoreErrorKind::NotFound, "payload missing").with_key(key)
            } else {
                io_error("read", err).with_key(key)
            }
        })?;

        Ok((object, file))
    }

    /// Write bytes to a temp file beside the target, fsync, then rename into
    /// place so readers never observe a partial payload.
    async fn write_payload(&self, key: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let file_path = self.object_path(key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let result = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &file_path).await
        }
        .await;

        if let Err(err) = result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
        Ok(file_path)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list_all(&self, prefix: &str) -> StoreResult<Vec<ObjectSummary>> {
        let rows: Vec<StoredObject> = sqlx::query_as(
            "SELECT id, key, filename, content_type, size_bytes, etag, last_modified
             FROM objects
             WHERE substr(key, 1, length(?1)) = ?1
             ORDER BY key ASC",
        )
        .bind(prefix)
        .fetch_all(&self.db)
        .await
        .map_err(|err| db_error("list", err))?;

        Ok(rows
            .into_iter()
            .map(|row| ObjectSummary {
                key: row.key,
                last_modified: Some(row.last_modified),
            })
            .collect())
    }

    async fn issue_read_url(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        Self::ensure_key_safe("sign", key)?;
        self.fetch_object("sign", key).await?;

        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let signature = self.link_signature(key, expires)?;
        Ok(format!(
            "{}/files/{}?expires={}&signature={}",
            self.public_base_url, key, expires, signature
        ))
    }

    async fn put_object(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<()> {
        Self::ensure_key_safe("put", key)?;

        let file_path = self
            .write_payload(key, &bytes)
            .await
            .map_err(|err| io_error("put", err).with_key(key))?;

        let filename = key.rsplit('/').next().unwrap_or(key).to_string();
        let etag = format!("{:x}", md5::compute(&bytes));

        let upsert = sqlx::query(
            r#"
            INSERT INTO objects (id, key, filename, content_type, size_bytes, etag, last_modified)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                filename = excluded.filename,
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(key)
        .bind(&filename)
        .bind(content_type)
        .bind(bytes.len() as i64)
        .bind(&etag)
        .bind(Utc::now())
        .execute(&self.db)
        .await;

        if let Err(err) = upsert {
            let _ = fs::remove_file(&file_path).await;
            return Err(db_error("put", err).with_key(key));
        }

        debug!(key, size = bytes.len(), "stored object on disk");
        Ok(())
    }
}

fn db_error(op: &'static str, err: sqlx::Error) -> StoreError {
    StoreError::new(op, StoreErrorKind::Backend, err.to_string())
}

fn io_error(op: &'static str, err: io::Error) -> StoreError {
    StoreError::new(op, StoreErrorKind::Backend, err.to_string())
}
