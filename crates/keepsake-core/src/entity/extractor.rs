//! Kind-directed entity extraction from memory text.
//!
//! `EntityExtractor` is a strategy seam: the default implementation is a
//! battery of vocabulary scans and capitalization patterns, and a stronger
//! NLP approach can be swapped in without touching the clusterer.

use regex::Regex;
use std::collections::HashSet;

use keepsake_types::entity::{EntityKind, EntityMention};
use keepsake_types::memory::{Memory, MemoryKind};

/// At most this many entities are kept per memory.
const MAX_ENTITIES_PER_MEMORY: usize = 5;

/// Technologies recognized across every memory kind.
const TECH_VOCAB: &[&str] = &[
    "angular", "aws", "azure", "django", "docker", "figma", "flutter", "gcp", "git", "graphql",
    "java", "javascript", "kotlin", "kubernetes", "linux", "mysql", "node", "postgres",
    "postgresql", "python", "rails", "react", "redis", "rust", "sqlite", "swift", "terraform",
    "typescript", "vue",
];

/// Non-technical skills recognized in skill memories.
const SKILL_VOCAB: &[&str] = &[
    "baking", "chess", "climbing", "cooking", "drawing", "french", "gardening", "guitar",
    "japanese", "knitting", "painting", "photography", "piano", "running", "spanish", "swimming",
    "woodworking", "writing", "yoga",
];

/// Capitalized words that look like names but never are.
const COMMON_NON_NAMES: &[&str] = &[
    "The", "This", "That", "They", "There", "Then", "When", "Where", "What", "Who", "How", "User",
    "Yesterday", "Today", "Tomorrow", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday",
    "Saturday", "Sunday", "January", "February", "March", "April", "June", "July", "August",
    "September", "October", "November", "December",
];

/// Strategy seam for extracting named entities from one memory.
pub trait EntityExtractor: Send + Sync {
    /// Entities mentioned by the memory, deduplicated by (kind, name) and
    /// capped at a small maximum.
    fn extract(&self, memory: &Memory) -> Vec<EntityMention>;
}

/// Default extractor: vocabulary scans plus naming-phrase patterns,
/// directed by the memory's kind.
pub struct PatternEntityExtractor {
    word: Regex,
    project_phrase: Regex,
    relationship_name: Regex,
    subject_name: Regex,
}

impl PatternEntityExtractor {
    pub fn new() -> Self {
        Self {
            word: Regex::new(r"[A-Za-z][A-Za-z+#]*").expect("word pattern"),
            // "working on Atlas", "a project called Hearthstone"
            project_phrase: Regex::new(
                r"(?:working on|building|launched|called|named)\s+([A-Z][A-Za-z0-9_-]*(?:\s+[A-Z][A-Za-z0-9_-]*)?)",
            )
            .expect("project-phrase pattern"),
            // "her colleague Maria", "friend named Tom"
            relationship_name: Regex::new(
                r"(?i)\b(?:friend|colleague|coworker|brother|sister|mom|dad|mother|father|partner|wife|husband|boss|manager|neighbor|cousin|roommate)\b(?:\s+named)?\s+([A-Z][a-z]+)",
            )
            .expect("relationship-name pattern"),
            // "Maria is ...", "Tom works ..."
            subject_name: Regex::new(
                r"\b([A-Z][a-z]+)\s+(?:is|was|works|said|told|likes|lives|mentioned)\b",
            )
            .expect("subject-name pattern"),
        }
    }

    fn scan_vocab(&self, text: &str, vocab: &[&str], kind: EntityKind, out: &mut Vec<EntityMention>) {
        for token in self.word.find_iter(text) {
            if vocab.contains(&token.as_str().to_lowercase().as_str()) {
                out.push(EntityMention::new(kind, token.as_str()));
            }
        }
    }

    fn scan_projects(&self, text: &str, out: &mut Vec<EntityMention>) {
        for capture in self.project_phrase.captures_iter(text) {
            if let Some(name) = capture.get(1) {
                out.push(EntityMention::new(EntityKind::Project, name.as_str()));
            }
        }
    }

    fn scan_people(&self, text: &str, out: &mut Vec<EntityMention>) {
        for capture in self.relationship_name.captures_iter(text) {
            if let Some(name) = capture.get(1) {
                if !COMMON_NON_NAMES.contains(&name.as_str()) {
                    out.push(EntityMention::new(EntityKind::Person, name.as_str()));
                }
            }
        }
        for capture in self.subject_name.captures_iter(text) {
            if let Some(name) = capture.get(1) {
                if !COMMON_NON_NAMES.contains(&name.as_str()) {
                    out.push(EntityMention::new(EntityKind::Person, name.as_str()));
                }
            }
        }
    }
}

impl Default for PatternEntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor for PatternEntityExtractor {
    fn extract(&self, memory: &Memory) -> Vec<EntityMention> {
        let text = memory.indexed_text();
        let mut mentions = Vec::new();

        match memory.kind {
            MemoryKind::Skill | MemoryKind::Project => {
                self.scan_vocab(&text, SKILL_VOCAB, EntityKind::Skill, &mut mentions);
                self.scan_projects(&text, &mut mentions);
            }
            MemoryKind::Person => {
                self.scan_people(&text, &mut mentions);
            }
            _ => {}
        }

        // Technology mentions are a cross-cutting signal for every kind.
        self.scan_vocab(&text, TECH_VOCAB, EntityKind::Technology, &mut mentions);

        // Dedup by (kind, normalized name), keep first occurrence, cap.
        let mut seen: HashSet<(EntityKind, String)> = HashSet::new();
        mentions.retain(|m| seen.insert((m.kind, m.name.clone())));
        mentions.truncate(MAX_ENTITIES_PER_MEMORY);
        mentions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keepsake_types::memory::MemoryDraft;

    fn extract(kind: MemoryKind, content: &str) -> Vec<EntityMention> {
        let memory = Memory::from_draft(MemoryDraft::new(kind, content), Utc::now());
        PatternEntityExtractor::new().extract(&memory)
    }

    #[test]
    fn skill_memory_finds_skill_and_tech_vocab() {
        let mentions = extract(MemoryKind::Skill, "User plays piano and writes Rust");
        assert!(mentions
            .iter()
            .any(|m| m.kind == EntityKind::Skill && m.name == "piano"));
        assert!(mentions
            .iter()
            .any(|m| m.kind == EntityKind::Technology && m.name == "rust"));
    }

    #[test]
    fn project_memory_finds_naming_phrases() {
        let mentions = extract(MemoryKind::Project, "User is working on Atlas this quarter");
        assert!(mentions
            .iter()
            .any(|m| m.kind == EntityKind::Project && m.name == "atlas"));

        let mentions = extract(MemoryKind::Project, "A side project called Hearthstone Tracker");
        assert!(mentions
            .iter()
            .any(|m| m.kind == EntityKind::Project && m.name == "hearthstone tracker"));
    }

    #[test]
    fn person_memory_finds_relationship_prefixed_names() {
        let mentions = extract(MemoryKind::Person, "Her colleague Maria moved to Berlin");
        assert!(mentions
            .iter()
            .any(|m| m.kind == EntityKind::Person && m.name == "maria"));
    }

    #[test]
    fn person_memory_finds_subject_names() {
        let mentions = extract(MemoryKind::Person, "Tom works at a bakery downtown");
        assert!(mentions
            .iter()
            .any(|m| m.kind == EntityKind::Person && m.name == "tom"));
    }

    #[test]
    fn person_patterns_exclude_common_words() {
        let mentions = extract(MemoryKind::Person, "This is a sentence. Yesterday was long.");
        assert!(mentions.iter().all(|m| m.kind != EntityKind::Person));
    }

    #[test]
    fn tech_mentions_are_cross_cutting() {
        let mentions = extract(MemoryKind::Preference, "Prefers Postgres over MySQL");
        assert!(mentions
            .iter()
            .any(|m| m.kind == EntityKind::Technology && m.name == "postgres"));
        assert!(mentions
            .iter()
            .any(|m| m.kind == EntityKind::Technology && m.name == "mysql"));
    }

    #[test]
    fn mentions_are_deduplicated() {
        let mentions = extract(MemoryKind::Skill, "rust rust piano piano guitar");
        assert_eq!(mentions.iter().filter(|m| m.name == "rust").count(), 1);
        assert_eq!(mentions.iter().filter(|m| m.name == "piano").count(), 1);
    }

    #[test]
    fn mentions_are_capped() {
        let mentions = extract(
            MemoryKind::Skill,
            "piano guitar chess cooking drawing painting writing yoga",
        );
        assert_eq!(mentions.len(), MAX_ENTITIES_PER_MEMORY);
    }
}
