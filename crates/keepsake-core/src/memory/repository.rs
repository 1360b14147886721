//! Repository trait definitions: the persistent-store contract.
//!
//! Three logical collections: memories, entity links, and conversation
//! summaries. Each supports get / get_all / indexed lookups / put / delete /
//! clear / count. Implementations live in keepsake-infra (e.g.
//! `SqliteMemoryRepository`) and are expected to retry transient failures
//! with bounded backoff before surfacing an error. Uses native async fn in
//! traits (RPITIT, Rust 2024 edition).

use keepsake_types::entity::EntityLink;
use keepsake_types::error::RepositoryError;
use keepsake_types::memory::{Memory, MemoryKind};
use keepsake_types::summary::ConversationSummary;
use uuid::Uuid;

/// Persistence for the memories collection.
///
/// `put` is an upsert: callers persist both freshly created and merged
/// records through the same call.
pub trait MemoryRepository: Send + Sync {
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Memory>, RepositoryError>> + Send;

    fn get_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Memory>, RepositoryError>> + Send;

    /// Indexed lookup by memory kind.
    fn get_by_kind(
        &self,
        kind: MemoryKind,
    ) -> impl std::future::Future<Output = Result<Vec<Memory>, RepositoryError>> + Send;

    fn put(
        &self,
        memory: &Memory,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Persist a batch as one unit: success is reported only once every
    /// item has been acknowledged.
    fn put_batch(
        &self,
        memories: &[Memory],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn delete(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete every memory of one kind. Returns the number removed.
    fn delete_by_kind(
        &self,
        kind: MemoryKind,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    fn clear(&self) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Persistence for the entity-links collection.
pub trait EntityLinkRepository: Send + Sync {
    fn get(
        &self,
        entity_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<EntityLink>, RepositoryError>> + Send;

    fn get_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<EntityLink>, RepositoryError>> + Send;

    /// Upsert a link. Implementations may reject empty links; callers
    /// delete instead of persisting a link with zero members.
    fn put(
        &self,
        link: &EntityLink,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn delete(
        &self,
        entity_id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn clear(&self) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Persistence for the conversation-summaries collection.
pub trait SummaryRepository: Send + Sync {
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ConversationSummary>, RepositoryError>> + Send;

    fn get_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationSummary>, RepositoryError>> + Send;

    /// Indexed lookup by the conversation a summary belongs to.
    fn get_by_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationSummary>, RepositoryError>> + Send;

    fn put(
        &self,
        summary: &ConversationSummary,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn delete(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn clear(&self) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
