//! Object store backed by an S3 (or S3-compatible) bucket.

use super::{ObjectStore, StoreError, StoreErrorKind, StoreResult};
use crate::models::photo::ObjectSummary;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::{
    Client as S3Client,
    config::Builder as S3ConfigBuilder,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    presigning::PresigningConfig,
    primitives::ByteStream,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a store from a shared AWS config, optionally pointing at a
    /// custom endpoint (MinIO, LocalStack).
    pub fn new(
        sdk_config: &SdkConfig,
        bucket: impl Into<String>,
        endpoint_url: Option<&str>,
        force_path_style: bool,
    ) -> Self {
        let mut builder = S3ConfigBuilder::from(sdk_config);
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        if force_path_style {
            builder = builder.force_path_style(true);
        }
        let bucket = bucket.into();
        info!(bucket = %bucket, endpoint = ?endpoint_url, "S3 object store initialized");

        Self::from_client(S3Client::from_conf(builder.build()), bucket)
    }

    pub fn from_client(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_all(&self, prefix: &str) -> StoreResult<Vec<ObjectSummary>> {
        let mut summaries = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|err| sdk_error("list", err))?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let last_modified = object
                    .last_modified()
                    .and_then(|ts| ts.to_millis().ok())
                    .and_then(DateTime::<Utc>::from_timestamp_millis);
                summaries.push(ObjectSummary {
                    key: key.to_string(),
                    last_modified,
                });
            }

            match (page.is_truncated(), page.next_continuation_token()) {
                (Some(true), Some(token)) => continuation = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(prefix, count = summaries.len(), "listed bucket prefix");
        Ok(summaries)
    }

    async fn issue_read_url(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(|err| {
            StoreError::new("sign", StoreErrorKind::Backend, err.to_string()).with_key(key)
        })?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|err| sdk_error("sign", err).with_key(key))?;

        Ok(presigned.uri().to_string())
    }

    async fn put_object(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<()> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| sdk_error("put", err).with_key(key))?;

        debug!(key, size, "object written");
        Ok(())
    }
}

/// Map an SDK failure onto the store's error classes.
fn sdk_error<E, R>(op: &'static str, err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let kind = match &err {
        SdkError::TimeoutError(_) => StoreErrorKind::Timeout,
        SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => StoreErrorKind::Network,
        SdkError::ServiceError(ctx) => classify_code(ctx.err().code()),
        _ => StoreErrorKind::Backend,
    };
    StoreError::new(op, kind, DisplayErrorContext(&err).to_string())
}

fn classify_code(code: Option<&str>) -> StoreErrorKind {
    match code {
        Some("NoSuchKey" | "NotFound" | "NoSuchBucket") => StoreErrorKind::NotFound,
        Some(
            "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken"
            | "InvalidToken",
        ) => StoreErrorKind::Auth,
        Some("SlowDown" | "Throttling" | "ThrottlingException" | "RequestLimitExceeded") => {
            StoreErrorKind::Throttled
        }
        _ => StoreErrorKind::Backend,
    }
}
