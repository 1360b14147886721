//! SQLite memory repository implementation.
//!
//! Implements `MemoryRepository` from `keepsake-core` using sqlx with the
//! split read/write pool: raw queries, private Row structs, RFC3339 text
//! timestamps. Transient connection errors are retried with bounded
//! backoff before surfacing.

use chrono::{DateTime, Utc};
use keepsake_core::memory::repository::MemoryRepository;
use keepsake_types::error::RepositoryError;
use keepsake_types::memory::{Memory, MemoryKind, MemorySource};
use sqlx::Row;
use uuid::Uuid;

use super::map_sqlx_err;
use super::pool::DatabasePool;
use crate::retry::with_backoff;

/// SQLite-backed implementation of `MemoryRepository`.
pub struct SqliteMemoryRepository {
    pool: DatabasePool,
}

impl SqliteMemoryRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain Memory.
struct MemoryRow {
    id: String,
    kind: String,
    content: String,
    context: Option<String>,
    importance: f64,
    confidence: f64,
    created_at: String,
    last_accessed: String,
    access_count: i64,
    usage_count: i64,
    last_used_at: Option<String>,
    feedback_score: f64,
    user_verified: i64,
    positive_interactions: i64,
    negative_interactions: i64,
    adaptive_decay_rate: f64,
    embedding: Option<String>,
    expires_at: Option<String>,
    source_url: Option<String>,
    source_origin: Option<String>,
}

impl MemoryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            content: row.try_get("content")?,
            context: row.try_get("context")?,
            importance: row.try_get("importance")?,
            confidence: row.try_get("confidence")?,
            created_at: row.try_get("created_at")?,
            last_accessed: row.try_get("last_accessed")?,
            access_count: row.try_get("access_count")?,
            usage_count: row.try_get("usage_count")?,
            last_used_at: row.try_get("last_used_at")?,
            feedback_score: row.try_get("feedback_score")?,
            user_verified: row.try_get("user_verified")?,
            positive_interactions: row.try_get("positive_interactions")?,
            negative_interactions: row.try_get("negative_interactions")?,
            adaptive_decay_rate: row.try_get("adaptive_decay_rate")?,
            embedding: row.try_get("embedding")?,
            expires_at: row.try_get("expires_at")?,
            source_url: row.try_get("source_url")?,
            source_origin: row.try_get("source_origin")?,
        })
    }

    fn into_memory(self) -> Result<Memory, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid memory id: {e}")))?;
        let kind: MemoryKind = self
            .kind
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let embedding = self
            .embedding
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid embedding: {e}")))?;

        Ok(Memory {
            id,
            kind,
            content: self.content,
            context: self.context,
            importance: self.importance,
            confidence: self.confidence,
            created_at: parse_datetime(&self.created_at)?,
            last_accessed: parse_datetime(&self.last_accessed)?,
            access_count: self.access_count as u32,
            usage_count: self.usage_count as u32,
            last_used_at: self
                .last_used_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            feedback_score: self.feedback_score,
            user_verified: self.user_verified != 0,
            positive_interactions: self.positive_interactions as u32,
            negative_interactions: self.negative_interactions as u32,
            adaptive_decay_rate: self.adaptive_decay_rate,
            embedding,
            expires_at: self
                .expires_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            source: MemorySource {
                url: self.source_url,
                origin: self.source_origin,
            },
        })
    }
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

const UPSERT_SQL: &str = r#"INSERT INTO memories
    (id, kind, content, context, importance, confidence, created_at, last_accessed,
     access_count, usage_count, last_used_at, feedback_score, user_verified,
     positive_interactions, negative_interactions, adaptive_decay_rate, embedding,
     expires_at, source_url, source_origin)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        kind = excluded.kind,
        content = excluded.content,
        context = excluded.context,
        importance = excluded.importance,
        confidence = excluded.confidence,
        last_accessed = excluded.last_accessed,
        access_count = excluded.access_count,
        usage_count = excluded.usage_count,
        last_used_at = excluded.last_used_at,
        feedback_score = excluded.feedback_score,
        user_verified = excluded.user_verified,
        positive_interactions = excluded.positive_interactions,
        negative_interactions = excluded.negative_interactions,
        adaptive_decay_rate = excluded.adaptive_decay_rate,
        embedding = excluded.embedding,
        expires_at = excluded.expires_at,
        source_url = excluded.source_url,
        source_origin = excluded.source_origin"#;

fn bind_memory<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    memory: &'q Memory,
) -> Result<
    sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    RepositoryError,
> {
    let embedding = memory
        .embedding
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| RepositoryError::Query(format!("unencodable embedding: {e}")))?;

    Ok(query
        .bind(memory.id.to_string())
        .bind(memory.kind.to_string())
        .bind(&memory.content)
        .bind(&memory.context)
        .bind(memory.importance)
        .bind(memory.confidence)
        .bind(format_datetime(&memory.created_at))
        .bind(format_datetime(&memory.last_accessed))
        .bind(memory.access_count as i64)
        .bind(memory.usage_count as i64)
        .bind(memory.last_used_at.as_ref().map(format_datetime))
        .bind(memory.feedback_score)
        .bind(if memory.user_verified { 1i64 } else { 0i64 })
        .bind(memory.positive_interactions as i64)
        .bind(memory.negative_interactions as i64)
        .bind(memory.adaptive_decay_rate)
        .bind(embedding)
        .bind(memory.expires_at.as_ref().map(format_datetime))
        .bind(&memory.source.url)
        .bind(&memory.source.origin))
}

impl SqliteMemoryRepository {
    async fn get_inner(&self, id: &Uuid) -> Result<Option<Memory>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM memories WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_sqlx_err)?;

        row.map(|row| {
            MemoryRow::from_row(&row)
                .map_err(map_sqlx_err)
                .and_then(MemoryRow::into_memory)
        })
        .transpose()
    }

    async fn fetch_many(&self, sql: &str, kind: Option<MemoryKind>) -> Result<Vec<Memory>, RepositoryError> {
        let mut query = sqlx::query(sql);
        if let Some(kind) = kind {
            query = query.bind(kind.to_string());
        }
        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_err)?;

        let mut memories = Vec::with_capacity(rows.len());
        for row in &rows {
            let memory_row = MemoryRow::from_row(row).map_err(map_sqlx_err)?;
            memories.push(memory_row.into_memory()?);
        }
        Ok(memories)
    }

    async fn put_inner(&self, memory: &Memory) -> Result<(), RepositoryError> {
        bind_memory(sqlx::query(UPSERT_SQL), memory)?
            .execute(&self.pool.writer)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn put_batch_inner(&self, memories: &[Memory]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(map_sqlx_err)?;
        for memory in memories {
            bind_memory(sqlx::query(UPSERT_SQL), memory)?
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
        }
        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(())
    }
}

impl MemoryRepository for SqliteMemoryRepository {
    async fn get(&self, id: &Uuid) -> Result<Option<Memory>, RepositoryError> {
        with_backoff("memories.get", || self.get_inner(id)).await
    }

    async fn get_all(&self) -> Result<Vec<Memory>, RepositoryError> {
        with_backoff("memories.get_all", || {
            self.fetch_many("SELECT * FROM memories ORDER BY created_at", None)
        })
        .await
    }

    async fn get_by_kind(&self, kind: MemoryKind) -> Result<Vec<Memory>, RepositoryError> {
        with_backoff("memories.get_by_kind", || {
            self.fetch_many(
                "SELECT * FROM memories WHERE kind = ? ORDER BY created_at",
                Some(kind),
            )
        })
        .await
    }

    async fn put(&self, memory: &Memory) -> Result<(), RepositoryError> {
        with_backoff("memories.put", || self.put_inner(memory)).await
    }

    async fn put_batch(&self, memories: &[Memory]) -> Result<(), RepositoryError> {
        with_backoff("memories.put_batch", || self.put_batch_inner(memories)).await
    }

    async fn delete(&self, id: &Uuid) -> Result<(), RepositoryError> {
        with_backoff("memories.delete", || async move {
            sqlx::query("DELETE FROM memories WHERE id = ?")
                .bind(id.to_string())
                .execute(&self.pool.writer)
                .await
                .map_err(map_sqlx_err)?;
            Ok(())
        })
        .await
    }

    async fn delete_by_kind(&self, kind: MemoryKind) -> Result<u64, RepositoryError> {
        with_backoff("memories.delete_by_kind", || async move {
            let result = sqlx::query("DELETE FROM memories WHERE kind = ?")
                .bind(kind.to_string())
                .execute(&self.pool.writer)
                .await
                .map_err(map_sqlx_err)?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        with_backoff("memories.clear", || async move {
            sqlx::query("DELETE FROM memories")
                .execute(&self.pool.writer)
                .await
                .map_err(map_sqlx_err)?;
            Ok(())
        })
        .await
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        with_backoff("memories.count", || async move {
            let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM memories")
                .fetch_one(&self.pool.reader)
                .await
                .map_err(map_sqlx_err)?;
            Ok(row.0 as u64)
        })
        .await
    }
}
