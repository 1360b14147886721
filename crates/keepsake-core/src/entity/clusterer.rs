//! Entity clustering: link memories through the entities they mention.
//!
//! The clusterer keeps the link table cached in memory and writes through
//! to the repository on every change, so related-memory lookups never hit
//! the database.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use keepsake_types::entity::{EntityKind, EntityLink, EntityMention, RelatedMemory};
use keepsake_types::error::RepositoryError;
use keepsake_types::memory::Memory;

use crate::entity::extractor::EntityExtractor;
use crate::memory::repository::EntityLinkRepository;

/// Relation weight per entity kind: a shared person ties two memories
/// together more strongly than a shared technology.
fn kind_weight(kind: EntityKind) -> f64 {
    match kind {
        EntityKind::Person => 1.0,
        EntityKind::Project => 0.8,
        EntityKind::Skill => 0.6,
        EntityKind::Technology => 0.4,
    }
}

/// Stable identifier for an entity: hex SHA-256 of `kind:name`.
pub fn entity_id(kind: EntityKind, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(name.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Maintains the entity-link table and answers related-memory queries.
pub struct EntityClusterer<R> {
    repo: R,
    extractor: Box<dyn EntityExtractor>,
    links: HashMap<String, EntityLink>,
}

impl<R: EntityLinkRepository> EntityClusterer<R> {
    pub fn new(repo: R, extractor: Box<dyn EntityExtractor>) -> Self {
        Self {
            repo,
            extractor,
            links: HashMap::new(),
        }
    }

    /// Warm the in-memory cache from the repository.
    pub async fn load(&mut self) -> Result<(), RepositoryError> {
        let links = self.repo.get_all().await?;
        self.links = links
            .into_iter()
            .map(|link| (link.entity_id.clone(), link))
            .collect();
        debug!(links = self.links.len(), "entity link cache loaded");
        Ok(())
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Extract entities from a memory and attach it to their links,
    /// creating links for entities seen for the first time.
    pub async fn link_memory(
        &mut self,
        memory: &Memory,
        now: DateTime<Utc>,
    ) -> Result<Vec<EntityMention>, RepositoryError> {
        let mentions = self.extractor.extract(memory);
        for mention in &mentions {
            let id = entity_id(mention.kind, &mention.name);
            let link = self.links.entry(id.clone()).or_insert_with(|| EntityLink {
                entity_id: id,
                kind: mention.kind,
                name: mention.name.clone(),
                display_name: mention.display_name.clone(),
                memory_ids: Vec::new(),
                created_at: now,
                updated_at: now,
            });
            if link.attach(memory.id, now) {
                self.repo.put(link).await?;
            }
        }
        Ok(mentions)
    }

    /// Memories related to the given one through shared entities.
    ///
    /// Scores accumulate the per-kind weight of every shared entity; ties
    /// break on memory id so results are deterministic.
    pub fn find_related(&self, memory_id: &Uuid, limit: usize) -> Vec<RelatedMemory> {
        let mut scores: HashMap<Uuid, (f64, Vec<String>)> = HashMap::new();
        for link in self.links.values() {
            if !link.memory_ids.contains(memory_id) {
                continue;
            }
            for other in &link.memory_ids {
                if other == memory_id {
                    continue;
                }
                let entry = scores.entry(*other).or_insert_with(|| (0.0, Vec::new()));
                entry.0 += kind_weight(link.kind);
                entry.1.push(link.display_name.clone());
            }
        }

        let mut related: Vec<RelatedMemory> = scores
            .into_iter()
            .map(|(memory_id, (score, mut shared_entities))| {
                shared_entities.sort();
                RelatedMemory {
                    memory_id,
                    score,
                    shared_entities,
                }
            })
            .collect();
        related.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.memory_id.cmp(&b.memory_id))
        });
        related.truncate(limit);
        related
    }

    /// Remove a deleted memory from every link it appears in; links left
    /// with no members are deleted rather than persisted empty.
    pub async fn unlink_memory(
        &mut self,
        memory_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut emptied = Vec::new();
        for link in self.links.values_mut() {
            if !link.detach(*memory_id, now) {
                continue;
            }
            if link.is_empty() {
                emptied.push(link.entity_id.clone());
            } else {
                self.repo.put(link).await?;
            }
        }
        for id in emptied {
            self.repo.delete(&id).await?;
            self.links.remove(&id);
        }
        Ok(())
    }

    /// Drop every link, cache and store both.
    pub async fn clear(&mut self) -> Result<(), RepositoryError> {
        self.repo.clear().await?;
        self.links.clear();
        Ok(())
    }
}
