//! SQLite entity-link repository implementation.
//!
//! Member memory ids are stored as a JSON array in a single text column;
//! links are small and always read whole.

use keepsake_core::memory::repository::EntityLinkRepository;
use keepsake_types::entity::{EntityKind, EntityLink};
use keepsake_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::map_sqlx_err;
use super::memory::{format_datetime, parse_datetime};
use super::pool::DatabasePool;
use crate::retry::with_backoff;

/// SQLite-backed implementation of `EntityLinkRepository`.
pub struct SqliteEntityLinkRepository {
    pool: DatabasePool,
}

impl SqliteEntityLinkRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain EntityLink.
struct EntityLinkRow {
    entity_id: String,
    kind: String,
    name: String,
    display_name: String,
    memory_ids: String,
    created_at: String,
    updated_at: String,
}

impl EntityLinkRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            entity_id: row.try_get("entity_id")?,
            kind: row.try_get("kind")?,
            name: row.try_get("name")?,
            display_name: row.try_get("display_name")?,
            memory_ids: row.try_get("memory_ids")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_link(self) -> Result<EntityLink, RepositoryError> {
        let kind: EntityKind = self
            .kind
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let memory_ids: Vec<Uuid> = serde_json::from_str(&self.memory_ids)
            .map_err(|e| RepositoryError::Query(format!("invalid memory_ids: {e}")))?;

        Ok(EntityLink {
            entity_id: self.entity_id,
            kind,
            name: self.name,
            display_name: self.display_name,
            memory_ids,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

impl SqliteEntityLinkRepository {
    async fn get_inner(&self, entity_id: &str) -> Result<Option<EntityLink>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM entity_links WHERE entity_id = ?")
            .bind(entity_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_sqlx_err)?;

        row.map(|row| {
            EntityLinkRow::from_row(&row)
                .map_err(map_sqlx_err)
                .and_then(EntityLinkRow::into_link)
        })
        .transpose()
    }

    async fn get_all_inner(&self) -> Result<Vec<EntityLink>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM entity_links ORDER BY created_at")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_err)?;

        let mut links = Vec::with_capacity(rows.len());
        for row in &rows {
            let link_row = EntityLinkRow::from_row(row).map_err(map_sqlx_err)?;
            links.push(link_row.into_link()?);
        }
        Ok(links)
    }

    async fn put_inner(&self, link: &EntityLink) -> Result<(), RepositoryError> {
        let memory_ids = serde_json::to_string(&link.memory_ids)
            .map_err(|e| RepositoryError::Query(format!("unencodable memory_ids: {e}")))?;

        sqlx::query(
            r#"INSERT INTO entity_links
               (entity_id, kind, name, display_name, memory_ids, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(entity_id) DO UPDATE SET
                   display_name = excluded.display_name,
                   memory_ids = excluded.memory_ids,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&link.entity_id)
        .bind(link.kind.to_string())
        .bind(&link.name)
        .bind(&link.display_name)
        .bind(memory_ids)
        .bind(format_datetime(&link.created_at))
        .bind(format_datetime(&link.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_err)?;

        Ok(())
    }
}

impl EntityLinkRepository for SqliteEntityLinkRepository {
    async fn get(&self, entity_id: &str) -> Result<Option<EntityLink>, RepositoryError> {
        with_backoff("entity_links.get", || self.get_inner(entity_id)).await
    }

    async fn get_all(&self) -> Result<Vec<EntityLink>, RepositoryError> {
        with_backoff("entity_links.get_all", || self.get_all_inner()).await
    }

    async fn put(&self, link: &EntityLink) -> Result<(), RepositoryError> {
        with_backoff("entity_links.put", || self.put_inner(link)).await
    }

    async fn delete(&self, entity_id: &str) -> Result<(), RepositoryError> {
        with_backoff("entity_links.delete", || async move {
            sqlx::query("DELETE FROM entity_links WHERE entity_id = ?")
                .bind(entity_id)
                .execute(&self.pool.writer)
                .await
                .map_err(map_sqlx_err)?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        with_backoff("entity_links.clear", || async move {
            sqlx::query("DELETE FROM entity_links")
                .execute(&self.pool.writer)
                .await
                .map_err(map_sqlx_err)?;
            Ok(())
        })
        .await
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        with_backoff("entity_links.count", || async move {
            let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entity_links")
                .fetch_one(&self.pool.reader)
                .await
                .map_err(map_sqlx_err)?;
            Ok(row.0 as u64)
        })
        .await
    }
}
