//! Guestbook log kept in the local SQLite database.

use super::comment_log::{CommentLog, LogError, LogResult};
use crate::{db::is_unique_violation, models::comment::CommentEntry};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Entries live in the `comments` table; the autoincrement `seq` column
/// records arrival order.
#[derive(Clone)]
pub struct SqliteCommentLog {
    db: SqlitePool,
}

impl SqliteCommentLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CommentLog for SqliteCommentLog {
    async fn scan_all(&self) -> LogResult<Vec<CommentEntry>> {
        let rows: Vec<(String, String, i64)> =
            sqlx::query_as("SELECT id, comment, created_at FROM comments ORDER BY seq ASC")
                .fetch_all(&self.db)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(id, text, created_at_millis)| CommentEntry {
                id,
                text,
                created_at_millis,
            })
            .collect())
    }

    async fn put_item(&self, entry: &CommentEntry) -> LogResult<()> {
        match sqlx::query("INSERT INTO comments (id, comment, created_at) VALUES (?, ?, ?)")
            .bind(&entry.id)
            .bind(&entry.text)
            .bind(entry.created_at_millis)
            .execute(&self.db)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(LogError::DuplicateId(entry.id.clone())),
            Err(err) => Err(LogError::Sqlx(err)),
        }
    }
}
