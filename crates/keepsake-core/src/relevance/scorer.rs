//! Multi-factor relevance scoring, budgeted selection, and context rendering.
//!
//! A memory's relevance to a query combines six factors with fixed weights
//! summing to 1.0: adaptive decayed importance (25%), raw confidence (10%),
//! access recency (10%), IDF-weighted keyword overlap (35%), entity overlap
//! (10%), and a per-kind prior (10%).

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use keepsake_types::config::MemoryConfig;
use keepsake_types::memory::{Memory, MemoryKind};

use crate::index::keywords::is_domain_term;
use crate::index::{KeywordIndex, TermExtractor, jaccard};
use crate::relevance::decay::DecayModel;

const WEIGHT_IMPORTANCE: f64 = 0.25;
const WEIGHT_CONFIDENCE: f64 = 0.10;
const WEIGHT_RECENCY: f64 = 0.10;
const WEIGHT_KEYWORDS: f64 = 0.35;
const WEIGHT_ENTITIES: f64 = 0.10;
const WEIGHT_KIND_PRIOR: f64 = 0.10;

/// Recency half-scale: `exp(-hours_since_access / 48)`.
const RECENCY_HOURS_SCALE: f64 = 48.0;

/// Extra entity credit when a matched entity is a curated domain term.
const DOMAIN_ENTITY_BONUS: f64 = 0.2;

/// Rough bytes-per-token ratio for budget estimation.
const APPROX_BYTES_PER_TOKEN: usize = 4;

/// Fixed retrieval prior per memory kind: identity facts are almost always
/// worth surfacing, opinions and one-off events rarely are.
fn kind_prior(kind: MemoryKind) -> f64 {
    match kind {
        MemoryKind::Identity => 1.0,
        MemoryKind::Preference => 0.8,
        MemoryKind::Skill | MemoryKind::Project => 0.7,
        MemoryKind::Person => 0.6,
        MemoryKind::Event | MemoryKind::Opinion => 0.4,
    }
}

/// The query side of a retrieval: raw text plus extracted terms.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub text: String,
    pub keywords: BTreeSet<String>,
    /// Lower-cased entity names found in the query text.
    pub entities: BTreeSet<String>,
}

impl QueryContext {
    pub fn from_text(text: impl Into<String>, extractor: &dyn TermExtractor) -> Self {
        let text = text.into();
        let keywords = extractor.keywords(&text);
        let entities = extractor
            .entities(&text)
            .into_iter()
            .map(|e| e.to_lowercase())
            .collect();
        Self {
            text,
            keywords,
            entities,
        }
    }
}

/// Filters applied before scoring. `None` fields fall back to the
/// configured defaults.
#[derive(Debug, Clone, Default)]
pub struct RetrievalOptions {
    /// Restrict to these kinds; `None` allows all.
    pub kinds: Option<Vec<MemoryKind>>,
    pub min_confidence: Option<f64>,
    pub min_decayed_importance: Option<f64>,
    pub limit: Option<usize>,
}

/// A memory with its computed relevance score.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub score: f64,
}

/// Scores and ranks memories against a query context.
///
/// Borrows its collaborators for the duration of one retrieval; the
/// session context constructs it with the current index snapshot.
pub struct RelevanceScorer<'a> {
    extractor: &'a dyn TermExtractor,
    index: &'a KeywordIndex,
    decay: &'a DecayModel,
    config: &'a MemoryConfig,
}

impl<'a> RelevanceScorer<'a> {
    pub fn new(
        extractor: &'a dyn TermExtractor,
        index: &'a KeywordIndex,
        decay: &'a DecayModel,
        config: &'a MemoryConfig,
    ) -> Self {
        Self {
            extractor,
            index,
            decay,
            config,
        }
    }

    /// Relevance of one memory to the query, in [0,1].
    pub fn score(&self, memory: &Memory, query: &QueryContext, now: DateTime<Utc>) -> f64 {
        let text = memory.indexed_text();
        let memory_keywords = self.extractor.keywords(&text);
        let memory_entities: BTreeSet<String> = self
            .extractor
            .entities(&text)
            .into_iter()
            .map(|e| e.to_lowercase())
            .collect();

        let importance = self.decay.adaptive_importance(memory, now);
        let recency = recency_factor(memory.last_accessed, now);
        let keyword_overlap = self.index.weighted_score(&query.keywords, &memory_keywords);
        let entity_overlap = entity_score(&query.entities, &memory_entities);

        let score = WEIGHT_IMPORTANCE * importance
            + WEIGHT_CONFIDENCE * memory.confidence
            + WEIGHT_RECENCY * recency
            + WEIGHT_KEYWORDS * keyword_overlap
            + WEIGHT_ENTITIES * entity_overlap
            + WEIGHT_KIND_PRIOR * kind_prior(memory.kind);

        score.clamp(0.0, 1.0)
    }

    /// Filter, score, and rank the corpus for a query.
    ///
    /// The sort is stable and the scoring is pure, so repeated calls on an
    /// unchanged corpus return an identical ordering.
    pub fn retrieve(
        &self,
        memories: &[Memory],
        query: &QueryContext,
        options: &RetrievalOptions,
        now: DateTime<Utc>,
    ) -> Vec<ScoredMemory> {
        let min_confidence = options.min_confidence.unwrap_or(self.config.min_confidence);
        let min_importance = options
            .min_decayed_importance
            .unwrap_or(self.config.min_decayed_importance);
        let limit = options.limit.unwrap_or(self.config.retrieval_limit);

        let mut scored: Vec<ScoredMemory> = memories
            .iter()
            .filter(|m| match &options.kinds {
                Some(kinds) => kinds.contains(&m.kind),
                None => true,
            })
            .filter(|m| m.confidence >= min_confidence)
            .filter(|m| self.decay.decayed_importance(m, now) >= min_importance)
            .map(|m| ScoredMemory {
                memory: m.clone(),
                score: self.score(m, query, now),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

fn recency_factor(last_accessed: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = ((now - last_accessed).num_seconds().max(0) as f64) / 3600.0;
    (-hours / RECENCY_HOURS_SCALE).exp()
}

/// Entity-overlap Jaccard plus a bonus when a matched entity is an
/// allowlisted domain term, clamped to [0,1].
fn entity_score(query: &BTreeSet<String>, memory: &BTreeSet<String>) -> f64 {
    let base = jaccard(query, memory);
    let has_domain_match = query
        .intersection(memory)
        .any(|name| is_domain_term(name.as_str()));
    let bonus = if has_domain_match { DOMAIN_ENTITY_BONUS } else { 0.0 };
    (base + bonus).clamp(0.0, 1.0)
}

fn estimated_tokens(text: &str) -> usize {
    text.len() / APPROX_BYTES_PER_TOKEN
}

/// Greedily select ranked memories while the running token estimate stays
/// under budget.
///
/// Stops at the first item that would overflow; no backtracking or
/// reordering to pack the budget tighter.
pub fn select_for_budget(ranked: &[ScoredMemory], token_budget: usize) -> Vec<ScoredMemory> {
    let mut selected = Vec::new();
    let mut used = 0usize;
    for item in ranked {
        let cost = estimated_tokens(&item.memory.indexed_text());
        if used + cost > token_budget {
            break;
        }
        used += cost;
        selected.push(item.clone());
    }
    selected
}

fn kind_heading(kind: MemoryKind) -> &'static str {
    match kind {
        MemoryKind::Identity => "Identity",
        MemoryKind::Skill => "Skills",
        MemoryKind::Project => "Projects",
        MemoryKind::Preference => "Preferences",
        MemoryKind::Person => "People",
        MemoryKind::Event => "Events",
        MemoryKind::Opinion => "Opinions",
    }
}

/// Render the selected memories as labeled bullet sections, grouped by
/// kind in the fixed presentation order. Empty selection renders as an
/// empty string.
pub fn build_memory_context(selected: &[ScoredMemory]) -> String {
    if selected.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    for kind in MemoryKind::PRESENTATION_ORDER {
        let in_kind: Vec<&ScoredMemory> =
            selected.iter().filter(|s| s.memory.kind == kind).collect();
        if in_kind.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(kind_heading(kind));
        out.push_str(":\n");
        for item in in_kind {
            match &item.memory.context {
                Some(ctx) => out.push_str(&format!("- {} ({})\n", item.memory.content, ctx)),
                None => out.push_str(&format!("- {}\n", item.memory.content)),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use keepsake_types::config::DecayConfig;
    use keepsake_types::memory::MemoryDraft;

    use crate::index::HeuristicTermExtractor;

    struct Fixture {
        extractor: HeuristicTermExtractor,
        decay: DecayModel,
        config: MemoryConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                extractor: HeuristicTermExtractor::new(),
                decay: DecayModel::new(DecayConfig::default()),
                config: MemoryConfig::default(),
            }
        }

        fn scorer<'a>(&'a self, index: &'a KeywordIndex) -> RelevanceScorer<'a> {
            RelevanceScorer::new(&self.extractor, index, &self.decay, &self.config)
        }
    }

    fn memory(kind: MemoryKind, content: &str, importance: f64, confidence: f64) -> Memory {
        Memory::from_draft(
            MemoryDraft::new(kind, content)
                .with_importance(importance)
                .with_confidence(confidence),
            Utc::now(),
        )
    }

    #[test]
    fn keyword_match_dominates_ranking() {
        let fixture = Fixture::new();
        let memories = vec![
            memory(MemoryKind::Skill, "User plays piano", 0.5, 0.8),
            memory(MemoryKind::Skill, "User knows woodworking", 0.5, 0.8),
        ];
        let index = KeywordIndex::build(&memories, &fixture.extractor);
        let scorer = fixture.scorer(&index);
        let query = QueryContext::from_text("looking for piano sheet music", &fixture.extractor);

        let ranked = scorer.retrieve(&memories, &query, &RetrievalOptions::default(), Utc::now());
        assert_eq!(ranked[0].memory.content, "User plays piano");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let fixture = Fixture::new();
        let m = memory(MemoryKind::Identity, "User's name is Alex", 1.0, 1.0);
        let index = KeywordIndex::build(std::slice::from_ref(&m), &fixture.extractor);
        let scorer = fixture.scorer(&index);
        let query = QueryContext::from_text("Alex name user", &fixture.extractor);
        let score = scorer.score(&m, &query, Utc::now());
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn retrieval_filters_low_confidence() {
        let fixture = Fixture::new();
        let memories = vec![
            memory(MemoryKind::Skill, "Confident fact", 0.8, 0.9),
            memory(MemoryKind::Skill, "Speculative fact", 0.8, 0.3),
        ];
        let index = KeywordIndex::build(&memories, &fixture.extractor);
        let scorer = fixture.scorer(&index);
        let query = QueryContext::from_text("fact", &fixture.extractor);

        let ranked = scorer.retrieve(&memories, &query, &RetrievalOptions::default(), Utc::now());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].memory.content, "Confident fact");
    }

    #[test]
    fn retrieval_filters_decayed_importance() {
        let fixture = Fixture::new();
        let now = Utc::now();
        let mut stale = memory(MemoryKind::Event, "Old concert", 0.4, 0.9);
        stale.last_accessed = now - Duration::days(60);
        let fresh = memory(MemoryKind::Event, "Recent concert", 0.8, 0.9);
        let memories = vec![stale, fresh];
        let index = KeywordIndex::build(&memories, &fixture.extractor);
        let scorer = fixture.scorer(&index);
        let query = QueryContext::from_text("concert", &fixture.extractor);

        let ranked = scorer.retrieve(&memories, &query, &RetrievalOptions::default(), now);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].memory.content, "Recent concert");
    }

    #[test]
    fn retrieval_respects_kind_allowlist_and_limit() {
        let fixture = Fixture::new();
        let memories = vec![
            memory(MemoryKind::Skill, "Knows Rust", 0.8, 0.9),
            memory(MemoryKind::Person, "Maria is a friend", 0.8, 0.9),
        ];
        let index = KeywordIndex::build(&memories, &fixture.extractor);
        let scorer = fixture.scorer(&index);
        let query = QueryContext::from_text("Rust Maria", &fixture.extractor);

        let options = RetrievalOptions {
            kinds: Some(vec![MemoryKind::Skill]),
            limit: Some(1),
            ..Default::default()
        };
        let ranked = scorer.retrieve(&memories, &query, &options, Utc::now());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].memory.kind, MemoryKind::Skill);
    }

    #[test]
    fn retrieval_is_deterministic() {
        let fixture = Fixture::new();
        let memories: Vec<Memory> = (0..10)
            .map(|i| memory(MemoryKind::Skill, &format!("skill number {i}"), 0.7, 0.9))
            .collect();
        let index = KeywordIndex::build(&memories, &fixture.extractor);
        let scorer = fixture.scorer(&index);
        let query = QueryContext::from_text("skill number", &fixture.extractor);
        let now = Utc::now();

        let first = scorer.retrieve(&memories, &query, &RetrievalOptions::default(), now);
        let second = scorer.retrieve(&memories, &query, &RetrievalOptions::default(), now);
        let ids_first: Vec<_> = first.iter().map(|s| s.memory.id).collect();
        let ids_second: Vec<_> = second.iter().map(|s| s.memory.id).collect();
        assert_eq!(ids_first, ids_second);
    }

    #[test]
    fn budget_selection_stops_at_first_overflow() {
        let small = ScoredMemory {
            memory: memory(MemoryKind::Skill, &"a".repeat(40), 0.8, 0.9), // ~10 tokens
            score: 0.9,
        };
        let large = ScoredMemory {
            memory: memory(MemoryKind::Skill, &"b".repeat(400), 0.8, 0.9), // ~100 tokens
            score: 0.8,
        };
        let tail = ScoredMemory {
            memory: memory(MemoryKind::Skill, &"c".repeat(8), 0.8, 0.9), // ~2 tokens
            score: 0.7,
        };

        let selected = select_for_budget(&[small.clone(), large, tail], 50);
        // The large item overflows; selection stops there even though the
        // tail would have fit.
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].memory.content, small.memory.content);
    }

    #[test]
    fn context_groups_by_kind_in_fixed_order() {
        let selected = vec![
            ScoredMemory {
                memory: memory(MemoryKind::Preference, "Prefers dark mode", 0.8, 0.9),
                score: 0.9,
            },
            ScoredMemory {
                memory: memory(MemoryKind::Identity, "Name is Alex", 0.9, 0.9),
                score: 0.8,
            },
            ScoredMemory {
                memory: memory(MemoryKind::Skill, "Knows Rust", 0.7, 0.9),
                score: 0.7,
            },
        ];
        let rendered = build_memory_context(&selected);
        let identity_pos = rendered.find("Identity:").unwrap();
        let skills_pos = rendered.find("Skills:").unwrap();
        let preferences_pos = rendered.find("Preferences:").unwrap();
        assert!(identity_pos < skills_pos);
        assert!(skills_pos < preferences_pos);
        assert!(rendered.contains("- Name is Alex"));
    }

    #[test]
    fn context_empty_selection_is_empty_string() {
        assert_eq!(build_memory_context(&[]), "");
    }

    #[test]
    fn context_includes_memory_context_parenthetical() {
        let selected = vec![ScoredMemory {
            memory: Memory::from_draft(
                MemoryDraft::new(MemoryKind::Person, "Sam is a colleague")
                    .with_context("platform team")
                    .with_confidence(0.9),
                Utc::now(),
            ),
            score: 0.9,
        }];
        let rendered = build_memory_context(&selected);
        assert!(rendered.contains("- Sam is a colleague (platform team)"));
    }
}
