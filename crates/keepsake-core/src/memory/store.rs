//! The memory store: deduplicated writes, capacity pruning, and a
//! write-through cache over the repository.
//!
//! Every mutation lands in the repository before the call returns; reads
//! are served from the cache, which `load` warms at startup.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use keepsake_types::config::MemoryConfig;
use keepsake_types::error::RepositoryError;
use keepsake_types::memory::{Memory, MemoryDraft, MemoryKind};

use crate::index::jaccard;
use crate::memory::repository::MemoryRepository;
use crate::relevance::DecayModel;

/// How a draft was absorbed: as a fresh memory or folded into a duplicate.
#[derive(Debug, Clone)]
pub enum AddOutcome {
    Created(Memory),
    Merged(Memory),
}

impl AddOutcome {
    pub fn memory(&self) -> &Memory {
        match self {
            AddOutcome::Created(memory) | AddOutcome::Merged(memory) => memory,
        }
    }

    pub fn is_merge(&self) -> bool {
        matches!(self, AddOutcome::Merged(_))
    }
}

/// Deduplicating store over one [`MemoryRepository`].
pub struct MemoryStore<R> {
    repo: R,
    config: MemoryConfig,
    memories: HashMap<Uuid, Memory>,
}

impl<R: MemoryRepository> MemoryStore<R> {
    pub fn new(repo: R, config: MemoryConfig) -> Self {
        Self {
            repo,
            config,
            memories: HashMap::new(),
        }
    }

    /// Warm the cache from the repository.
    pub async fn load(&mut self) -> Result<(), RepositoryError> {
        let memories = self.repo.get_all().await?;
        self.memories = memories.into_iter().map(|m| (m.id, m)).collect();
        debug!(memories = self.memories.len(), "memory cache loaded");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<&Memory> {
        self.memories.get(id)
    }

    pub fn all(&self) -> Vec<Memory> {
        self.memories.values().cloned().collect()
    }

    pub fn by_kind(&self, kind: MemoryKind) -> Vec<Memory> {
        self.memories
            .values()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect()
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Absorb one draft: merge into a same-kind duplicate when one exists,
    /// otherwise create a new memory. The result is persisted before
    /// returning.
    #[instrument(skip(self, draft), fields(kind = %draft.kind))]
    pub async fn add_memory(
        &mut self,
        draft: MemoryDraft,
        now: DateTime<Utc>,
    ) -> Result<AddOutcome, RepositoryError> {
        let outcome = self.absorb(draft, now);
        self.repo.put(outcome.memory()).await?;
        Ok(outcome)
    }

    /// Absorb a batch of drafts, deduplicating both against the store and
    /// within the batch itself. All touched memories are persisted as one
    /// batch write.
    #[instrument(skip(self, drafts), fields(drafts = drafts.len()))]
    pub async fn add_memories(
        &mut self,
        drafts: Vec<MemoryDraft>,
        now: DateTime<Utc>,
    ) -> Result<Vec<AddOutcome>, RepositoryError> {
        let mut outcomes = Vec::with_capacity(drafts.len());
        for draft in drafts {
            outcomes.push(self.absorb(draft, now));
        }

        let touched: Vec<Memory> = {
            let mut ids = BTreeSet::new();
            outcomes
                .iter()
                .filter(|o| ids.insert(o.memory().id))
                .map(|o| {
                    // absorb keeps the cache current, so re-read merged rows
                    self.memories[&o.memory().id].clone()
                })
                .collect()
        };
        if !touched.is_empty() {
            self.repo.put_batch(&touched).await?;
        }
        Ok(outcomes)
    }

    fn absorb(&mut self, draft: MemoryDraft, now: DateTime<Utc>) -> AddOutcome {
        if let Some(existing_id) = self.find_duplicate(&draft) {
            let memory = self
                .memories
                .get_mut(&existing_id)
                .map(|memory| {
                    memory.merge_draft(&draft, now);
                    memory.clone()
                });
            if let Some(memory) = memory {
                debug!(memory_id = %memory.id, "merged duplicate draft");
                return AddOutcome::Merged(memory);
            }
        }
        let memory = Memory::from_draft(draft, now);
        self.memories.insert(memory.id, memory.clone());
        AddOutcome::Created(memory)
    }

    /// Find a same-kind memory the draft duplicates: exact content match
    /// (case-insensitive), one content containing the other, or token
    /// Jaccard similarity at or above the configured threshold.
    fn find_duplicate(&self, draft: &MemoryDraft) -> Option<Uuid> {
        let candidate = draft.content.to_lowercase();
        let candidate_tokens = tokenize(&candidate);

        let mut best: Option<(Uuid, f64)> = None;
        for memory in self.memories.values() {
            if memory.kind != draft.kind {
                continue;
            }
            let existing = memory.content.to_lowercase();
            if existing == candidate
                || existing.contains(&candidate)
                || candidate.contains(&existing)
            {
                return Some(memory.id);
            }
            let similarity = jaccard(&candidate_tokens, &tokenize(&existing));
            if similarity >= self.config.similarity_threshold
                && best.is_none_or(|(_, score)| similarity > score)
            {
                best = Some((memory.id, similarity));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Re-persist a memory mutated by the caller (feedback, verification).
    pub async fn update(&mut self, memory: Memory) -> Result<(), RepositoryError> {
        self.repo.put(&memory).await?;
        self.memories.insert(memory.id, memory);
        Ok(())
    }

    /// Mark a memory as accessed and persist the new counters.
    pub async fn touch(
        &mut self,
        id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Memory>, RepositoryError> {
        let Some(memory) = self.memories.get_mut(id) else {
            return Ok(None);
        };
        memory.record_access(now);
        let snapshot = memory.clone();
        self.repo.put(&snapshot).await?;
        Ok(Some(snapshot))
    }

    /// Delete one memory. Unknown ids are a logged no-op.
    pub async fn remove(&mut self, id: &Uuid) -> Result<bool, RepositoryError> {
        if !self.memories.contains_key(id) {
            debug!(memory_id = %id, "remove requested for unknown memory");
            return Ok(false);
        }
        self.repo.delete(id).await?;
        self.memories.remove(id);
        Ok(true)
    }

    /// Delete every memory of one kind. Returns the ids removed so the
    /// caller can cascade entity unlinking.
    pub async fn remove_by_kind(
        &mut self,
        kind: MemoryKind,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        self.repo.delete_by_kind(kind).await?;
        let removed: Vec<Uuid> = self
            .memories
            .values()
            .filter(|m| m.kind == kind)
            .map(|m| m.id)
            .collect();
        for id in &removed {
            self.memories.remove(id);
        }
        Ok(removed)
    }

    pub async fn clear_all(&mut self) -> Result<(), RepositoryError> {
        self.repo.clear().await?;
        self.memories.clear();
        Ok(())
    }

    /// Prune lowest-value memories once the store crosses its capacity
    /// threshold, down to the target fill. Returns the pruned memories.
    #[instrument(skip(self, decay))]
    pub async fn prune_if_needed(
        &mut self,
        decay: &DecayModel,
        now: DateTime<Utc>,
    ) -> Result<Vec<Memory>, RepositoryError> {
        let threshold =
            (self.config.capacity as f64 * self.config.prune_threshold).ceil() as usize;
        if self.memories.len() < threshold.max(1) {
            return Ok(Vec::new());
        }
        let target = (self.config.capacity as f64 * self.config.prune_target).floor() as usize;
        let excess = self.memories.len().saturating_sub(target);
        if excess == 0 {
            return Ok(Vec::new());
        }

        let mut ranked: Vec<(Uuid, f64)> = self
            .memories
            .values()
            .map(|m| (m.id, decay.adaptive_importance(m, now)))
            .collect();
        ranked.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut pruned = Vec::with_capacity(excess);
        for (id, _) in ranked.into_iter().take(excess) {
            self.repo.delete(&id).await?;
            if let Some(memory) = self.memories.remove(&id) {
                pruned.push(memory);
            }
        }
        info!(
            removed = pruned.len(),
            remaining = self.memories.len(),
            "pruned low-value memories"
        );
        Ok(pruned)
    }
}

fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
