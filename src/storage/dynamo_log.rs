//! Guestbook log stored in a DynamoDB table keyed by `id`.

use super::comment_log::{CommentLog, LogError, LogResult};
use crate::models::comment::CommentEntry;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::{
    Client as DynamoClient,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    types::AttributeValue,
};
use std::collections::HashMap;
use tracing::debug;

pub struct DynamoCommentLog {
    client: DynamoClient,
    table_name: String,
}

impl DynamoCommentLog {
    pub fn new(sdk_config: &SdkConfig, table_name: impl Into<String>) -> Self {
        Self {
            client: DynamoClient::new(sdk_config),
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl CommentLog for DynamoCommentLog {
    /// Scan returns items in hash order, so entries are ordered by
    /// `(timestamp, id)` before handing them back.
    async fn scan_all(&self) -> LogResult<Vec<CommentEntry>> {
        let mut entries = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let page = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|err| sdk_error("scan", err))?;

            entries.extend(page.items().iter().filter_map(entry_from_item));

            match page.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        entries.sort_by(|a, b| {
            a.created_at_millis
                .cmp(&b.created_at_millis)
                .then_with(|| a.id.cmp(&b.id))
        });
        debug!(count = entries.len(), table = %self.table_name, "scanned comment table");
        Ok(entries)
    }

    async fn put_item(&self, entry: &CommentEntry) -> LogResult<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .item("id", AttributeValue::S(entry.id.clone()))
            .item("comment", AttributeValue::S(entry.text.clone()))
            .item(
                "timestamp",
                AttributeValue::N(entry.created_at_millis.to_string()),
            )
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await
            .map_err(|err| match err.code() {
                Some("ConditionalCheckFailedException") => LogError::DuplicateId(entry.id.clone()),
                _ => sdk_error("put", err),
            })?;
        Ok(())
    }
}

/// Items missing `id` or `comment` are skipped; a missing timestamp reads
/// as epoch zero.
fn entry_from_item(item: &HashMap<String, AttributeValue>) -> Option<CommentEntry> {
    let id = item.get("id").and_then(|v| v.as_s().ok())?.to_string();
    let text = item.get("comment").and_then(|v| v.as_s().ok())?.to_string();
    let created_at_millis = item
        .get("timestamp")
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<i64>().ok())
        .unwrap_or(0);
    Some(CommentEntry {
        id,
        text,
        created_at_millis,
    })
}

fn sdk_error<E, R>(op: &'static str, err: SdkError<E, R>) -> LogError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    LogError::backend(op, DisplayErrorContext(&err).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pairs: &[(&str, AttributeValue)]) -> HashMap<String, AttributeValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn converts_complete_items() {
        let entry = entry_from_item(&item(&[
            ("id", AttributeValue::S("comment-1-abc".into())),
            ("comment", AttributeValue::S("congrats".into())),
            ("timestamp", AttributeValue::N("1700000000000".into())),
        ]))
        .expect("entry");

        assert_eq!(entry.id, "comment-1-abc");
        assert_eq!(entry.text, "congrats");
        assert_eq!(entry.created_at_millis, 1_700_000_000_000);
    }

    #[test]
    fn missing_timestamp_reads_as_epoch() {
        let entry = entry_from_item(&item(&[
            ("id", AttributeValue::S("c".into())),
            ("comment", AttributeValue::S("hi".into())),
        ]))
        .expect("entry");
        assert_eq!(entry.created_at_millis, 0);
    }

    #[test]
    fn items_without_text_are_skipped() {
        assert!(entry_from_item(&item(&[("id", AttributeValue::S("c".into()))])).is_none());
    }
}
