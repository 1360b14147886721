//! Entity types for the memory relationship graph.
//!
//! An [`EntityLink`] aggregates one named entity (a person, project, skill,
//! or technology) with every memory that mentions it. Links are how the
//! clusterer answers "what else do I know that touches this?".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Kind of a named entity tracked by the clusterer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Person,
    Project,
    Skill,
    Technology,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Person => write!(f, "person"),
            EntityKind::Project => write!(f, "project"),
            EntityKind::Skill => write!(f, "skill"),
            EntityKind::Technology => write!(f, "technology"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "person" => Ok(EntityKind::Person),
            "project" => Ok(EntityKind::Project),
            "skill" => Ok(EntityKind::Skill),
            "technology" => Ok(EntityKind::Technology),
            other => Err(format!("invalid entity kind: '{other}'")),
        }
    }
}

/// A single entity mention extracted from one memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMention {
    pub kind: EntityKind,
    /// Lower-cased, whitespace-normalized name used for identity.
    pub name: String,
    /// Original casing, for display.
    pub display_name: String,
}

impl EntityMention {
    pub fn new(kind: EntityKind, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let name = display_name.trim().to_lowercase();
        Self {
            kind,
            name,
            display_name,
        }
    }
}

/// An aggregated record of one entity and the memories mentioning it.
///
/// Invariants: `memory_ids` never holds a duplicate, and a link with zero
/// members must be deleted rather than persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityLink {
    /// Stable hash of `kind:name` (hex SHA-256), the persistence key.
    pub entity_id: String,
    pub kind: EntityKind,
    pub name: String,
    pub display_name: String,
    pub memory_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityLink {
    /// Append a memory id, preserving the no-duplicates invariant.
    ///
    /// Returns true if the id was newly added.
    pub fn attach(&mut self, memory_id: Uuid, now: DateTime<Utc>) -> bool {
        if self.memory_ids.contains(&memory_id) {
            return false;
        }
        self.memory_ids.push(memory_id);
        self.updated_at = now;
        true
    }

    /// Remove a memory id. Returns true if the id was present.
    pub fn detach(&mut self, memory_id: Uuid, now: DateTime<Utc>) -> bool {
        let before = self.memory_ids.len();
        self.memory_ids.retain(|id| *id != memory_id);
        if self.memory_ids.len() != before {
            self.updated_at = now;
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.memory_ids.is_empty()
    }
}

/// A related memory found through shared entity links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedMemory {
    pub memory_id: Uuid,
    /// Accumulated per-kind link weight (higher is more related).
    pub score: f64,
    /// Display names of the entities this relation is based on.
    pub shared_entities: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_roundtrip() {
        for kind in [
            EntityKind::Person,
            EntityKind::Project,
            EntityKind::Skill,
            EntityKind::Technology,
        ] {
            let parsed: EntityKind = kind.to_string().parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_mention_normalizes_name() {
        let mention = EntityMention::new(EntityKind::Technology, "  PostgreSQL ");
        assert_eq!(mention.name, "postgresql");
        assert_eq!(mention.display_name, "  PostgreSQL ");
    }

    fn sample_link() -> EntityLink {
        let now = Utc::now();
        EntityLink {
            entity_id: "abc123".to_string(),
            kind: EntityKind::Person,
            name: "maria".to_string(),
            display_name: "Maria".to_string(),
            memory_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_attach_rejects_duplicates() {
        let mut link = sample_link();
        let id = Uuid::now_v7();
        assert!(link.attach(id, Utc::now()));
        assert!(!link.attach(id, Utc::now()));
        assert_eq!(link.memory_ids.len(), 1);
    }

    #[test]
    fn test_detach_and_empty() {
        let mut link = sample_link();
        let id = Uuid::now_v7();
        link.attach(id, Utc::now());
        assert!(!link.is_empty());
        assert!(link.detach(id, Utc::now()));
        assert!(!link.detach(id, Utc::now()));
        assert!(link.is_empty());
    }
}
