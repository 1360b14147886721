//! SQLite conversation-summary repository implementation.

use keepsake_core::memory::repository::SummaryRepository;
use keepsake_types::error::RepositoryError;
use keepsake_types::summary::ConversationSummary;
use sqlx::Row;
use uuid::Uuid;

use super::map_sqlx_err;
use super::memory::{format_datetime, parse_datetime};
use super::pool::DatabasePool;
use crate::retry::with_backoff;

/// SQLite-backed implementation of `SummaryRepository`.
pub struct SqliteSummaryRepository {
    pool: DatabasePool,
}

impl SqliteSummaryRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain ConversationSummary.
struct SummaryRow {
    id: String,
    conversation_id: String,
    summary: String,
    key_topics: String,
    memory_ids: String,
    url: Option<String>,
    created_at: String,
    conversation_ended_at: String,
    message_count: i64,
}

impl SummaryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            summary: row.try_get("summary")?,
            key_topics: row.try_get("key_topics")?,
            memory_ids: row.try_get("memory_ids")?,
            url: row.try_get("url")?,
            created_at: row.try_get("created_at")?,
            conversation_ended_at: row.try_get("conversation_ended_at")?,
            message_count: row.try_get("message_count")?,
        })
    }

    fn into_summary(self) -> Result<ConversationSummary, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid summary id: {e}")))?;
        let conversation_id = Uuid::parse_str(&self.conversation_id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation_id: {e}")))?;
        let key_topics: Vec<String> = serde_json::from_str(&self.key_topics)
            .map_err(|e| RepositoryError::Query(format!("invalid key_topics: {e}")))?;
        let memory_ids: Vec<Uuid> = serde_json::from_str(&self.memory_ids)
            .map_err(|e| RepositoryError::Query(format!("invalid memory_ids: {e}")))?;

        Ok(ConversationSummary {
            id,
            conversation_id,
            summary: self.summary,
            key_topics,
            memory_ids,
            url: self.url,
            created_at: parse_datetime(&self.created_at)?,
            conversation_ended_at: parse_datetime(&self.conversation_ended_at)?,
            message_count: self.message_count as u32,
        })
    }
}

impl SqliteSummaryRepository {
    async fn get_inner(&self, id: &Uuid) -> Result<Option<ConversationSummary>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversation_summaries WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_sqlx_err)?;

        row.map(|row| {
            SummaryRow::from_row(&row)
                .map_err(map_sqlx_err)
                .and_then(SummaryRow::into_summary)
        })
        .transpose()
    }

    async fn fetch_many(
        &self,
        sql: &str,
        conversation_id: Option<&Uuid>,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let mut query = sqlx::query(sql);
        if let Some(conversation_id) = conversation_id {
            query = query.bind(conversation_id.to_string());
        }
        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_err)?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let summary_row = SummaryRow::from_row(row).map_err(map_sqlx_err)?;
            summaries.push(summary_row.into_summary()?);
        }
        Ok(summaries)
    }

    async fn put_inner(&self, summary: &ConversationSummary) -> Result<(), RepositoryError> {
        let key_topics = serde_json::to_string(&summary.key_topics)
            .map_err(|e| RepositoryError::Query(format!("unencodable key_topics: {e}")))?;
        let memory_ids = serde_json::to_string(&summary.memory_ids)
            .map_err(|e| RepositoryError::Query(format!("unencodable memory_ids: {e}")))?;

        sqlx::query(
            r#"INSERT INTO conversation_summaries
               (id, conversation_id, summary, key_topics, memory_ids, url,
                created_at, conversation_ended_at, message_count)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   summary = excluded.summary,
                   key_topics = excluded.key_topics,
                   memory_ids = excluded.memory_ids,
                   url = excluded.url,
                   conversation_ended_at = excluded.conversation_ended_at,
                   message_count = excluded.message_count"#,
        )
        .bind(summary.id.to_string())
        .bind(summary.conversation_id.to_string())
        .bind(&summary.summary)
        .bind(key_topics)
        .bind(memory_ids)
        .bind(&summary.url)
        .bind(format_datetime(&summary.created_at))
        .bind(format_datetime(&summary.conversation_ended_at))
        .bind(summary.message_count as i64)
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_err)?;

        Ok(())
    }
}

impl SummaryRepository for SqliteSummaryRepository {
    async fn get(&self, id: &Uuid) -> Result<Option<ConversationSummary>, RepositoryError> {
        with_backoff("summaries.get", || self.get_inner(id)).await
    }

    async fn get_all(&self) -> Result<Vec<ConversationSummary>, RepositoryError> {
        with_backoff("summaries.get_all", || {
            self.fetch_many(
                "SELECT * FROM conversation_summaries ORDER BY created_at",
                None,
            )
        })
        .await
    }

    async fn get_by_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        with_backoff("summaries.get_by_conversation", || {
            self.fetch_many(
                "SELECT * FROM conversation_summaries WHERE conversation_id = ? ORDER BY created_at",
                Some(conversation_id),
            )
        })
        .await
    }

    async fn put(&self, summary: &ConversationSummary) -> Result<(), RepositoryError> {
        with_backoff("summaries.put", || self.put_inner(summary)).await
    }

    async fn delete(&self, id: &Uuid) -> Result<(), RepositoryError> {
        with_backoff("summaries.delete", || async move {
            sqlx::query("DELETE FROM conversation_summaries WHERE id = ?")
                .bind(id.to_string())
                .execute(&self.pool.writer)
                .await
                .map_err(map_sqlx_err)?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        with_backoff("summaries.clear", || async move {
            sqlx::query("DELETE FROM conversation_summaries")
                .execute(&self.pool.writer)
                .await
                .map_err(map_sqlx_err)?;
            Ok(())
        })
        .await
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        with_backoff("summaries.count", || async move {
            let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversation_summaries")
                .fetch_one(&self.pool.reader)
                .await
                .map_err(map_sqlx_err)?;
            Ok(row.0 as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn make_summary(conversation_id: Uuid) -> ConversationSummary {
        let now = Utc::now();
        ConversationSummary {
            id: Uuid::now_v7(),
            conversation_id,
            summary: "Talked about piano practice and a spring recital".to_string(),
            key_topics: vec!["piano".to_string(), "recital".to_string()],
            memory_ids: vec![Uuid::now_v7()],
            url: Some("https://example.com/sheet-music".to_string()),
            created_at: now,
            conversation_ended_at: now,
            message_count: 24,
        }
    }

    #[tokio::test]
    async fn test_put_and_get_roundtrip() {
        let repo = SqliteSummaryRepository::new(test_pool().await);

        let summary = make_summary(Uuid::now_v7());
        repo.put(&summary).await.unwrap();

        let found = repo.get(&summary.id).await.unwrap().unwrap();
        assert_eq!(found.summary, summary.summary);
        assert_eq!(found.key_topics, summary.key_topics);
        assert_eq!(found.memory_ids, summary.memory_ids);
        assert_eq!(found.message_count, 24);
    }

    #[tokio::test]
    async fn test_get_by_conversation_filters() {
        let repo = SqliteSummaryRepository::new(test_pool().await);

        let conversation = Uuid::now_v7();
        repo.put(&make_summary(conversation)).await.unwrap();
        repo.put(&make_summary(conversation)).await.unwrap();
        repo.put(&make_summary(Uuid::now_v7())).await.unwrap();

        let found = repo.get_by_conversation(&conversation).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|s| s.conversation_id == conversation));
    }

    #[tokio::test]
    async fn test_delete_and_count() {
        let repo = SqliteSummaryRepository::new(test_pool().await);

        let summary = make_summary(Uuid::now_v7());
        repo.put(&summary).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);

        repo.delete(&summary.id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(repo.get(&summary.id).await.unwrap().is_none());
    }
}
