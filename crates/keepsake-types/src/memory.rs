//! Memory types for Keepsake.
//!
//! These types model the companion's long-term memory about its user:
//! durable facts extracted from conversations, with the importance,
//! confidence, access, and feedback bookkeeping that the decay and
//! relevance models operate on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Kind of a memory entry.
///
/// Drives retrieval priors, decay half-lives, and entity extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Identity,
    Preference,
    Skill,
    Project,
    Person,
    Event,
    Opinion,
}

impl MemoryKind {
    /// All kinds, in the fixed presentation order used when rendering
    /// a memory context block.
    pub const PRESENTATION_ORDER: [MemoryKind; 7] = [
        MemoryKind::Identity,
        MemoryKind::Skill,
        MemoryKind::Project,
        MemoryKind::Preference,
        MemoryKind::Person,
        MemoryKind::Event,
        MemoryKind::Opinion,
    ];
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::Identity => write!(f, "identity"),
            MemoryKind::Preference => write!(f, "preference"),
            MemoryKind::Skill => write!(f, "skill"),
            MemoryKind::Project => write!(f, "project"),
            MemoryKind::Person => write!(f, "person"),
            MemoryKind::Event => write!(f, "event"),
            MemoryKind::Opinion => write!(f, "opinion"),
        }
    }
}

impl FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "identity" => Ok(MemoryKind::Identity),
            "preference" => Ok(MemoryKind::Preference),
            "skill" => Ok(MemoryKind::Skill),
            "project" => Ok(MemoryKind::Project),
            "person" => Ok(MemoryKind::Person),
            "event" => Ok(MemoryKind::Event),
            "opinion" => Ok(MemoryKind::Opinion),
            other => Err(format!("invalid memory kind: '{other}'")),
        }
    }
}

/// Origin metadata for a memory (where the fact was learned).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySource {
    /// URL of the page or conversation the memory came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Free-form origin label (e.g. "extraction", "manual").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// A durable fact about the user.
///
/// Importance and confidence are clamped to [0,1] after every mutation;
/// `feedback_score` is clamped to [-1,1]. Identity memories are exempt
/// from time decay but carry the same bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub kind: MemoryKind,
    /// The fact itself, one self-contained sentence.
    pub content: String,
    /// Optional qualifying context for the fact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// How much this fact matters, in [0,1].
    pub importance: f64,
    /// How sure the extractor was, in [0,1].
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Times this memory was touched by retrieval.
    pub access_count: u32,
    /// Times this memory was actually used in a response or trigger.
    pub usage_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Accumulated engagement signal in [-1,1]; decays toward 0.
    pub feedback_score: f64,
    /// Whether the user explicitly confirmed this fact.
    pub user_verified: bool,
    pub positive_interactions: u32,
    pub negative_interactions: u32,
    /// Per-memory multiplier applied to the adaptive importance (default 1.0).
    pub adaptive_decay_rate: f64,
    /// Optional embedding vector, opaque to this subsystem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: MemorySource,
}

impl Memory {
    /// Build a fresh memory from an extraction draft.
    ///
    /// Fresh memories start with `access_count` 0 and
    /// `created_at == last_accessed == now`.
    pub fn from_draft(draft: MemoryDraft, now: DateTime<Utc>) -> Self {
        let mut memory = Self {
            id: Uuid::now_v7(),
            kind: draft.kind,
            content: draft.content,
            context: draft.context,
            importance: draft.importance,
            confidence: draft.confidence,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            usage_count: 0,
            last_used_at: None,
            feedback_score: 0.0,
            user_verified: false,
            positive_interactions: 0,
            negative_interactions: 0,
            adaptive_decay_rate: 1.0,
            embedding: None,
            expires_at: None,
            source: draft.source,
        };
        memory.clamp_scores();
        memory
    }

    /// Re-establish the score invariants after any mutation.
    ///
    /// importance/confidence in [0,1], feedback_score in [-1,1],
    /// adaptive_decay_rate non-negative.
    pub fn clamp_scores(&mut self) {
        self.importance = self.importance.clamp(0.0, 1.0);
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self.feedback_score = self.feedback_score.clamp(-1.0, 1.0);
        self.adaptive_decay_rate = self.adaptive_decay_rate.max(0.0);
    }

    /// Record a retrieval touch.
    pub fn record_access(&mut self, now: DateTime<Utc>) {
        self.last_accessed = now;
        self.access_count = self.access_count.saturating_add(1);
        self.clamp_scores();
    }

    /// Record actual usage in a response or proactive trigger.
    pub fn record_usage(&mut self, now: DateTime<Utc>) {
        self.usage_count = self.usage_count.saturating_add(1);
        self.last_used_at = Some(now);
        self.clamp_scores();
    }

    /// Merge a duplicate draft into this memory.
    ///
    /// Keeps the max of importance and confidence, counts the merge as an
    /// access, and fills in missing context from the draft.
    pub fn merge_draft(&mut self, draft: &MemoryDraft, now: DateTime<Utc>) {
        self.importance = self.importance.max(draft.importance);
        self.confidence = self.confidence.max(draft.confidence);
        if self.context.is_none() {
            self.context = draft.context.clone();
        }
        self.record_access(now);
    }

    /// Content plus context, the text the keyword index scans.
    pub fn indexed_text(&self) -> String {
        match &self.context {
            Some(ctx) => format!("{} {}", self.content, ctx),
            None => self.content.clone(),
        }
    }
}

/// A validated candidate memory produced by the extraction pipeline.
///
/// Becomes a [`Memory`] (or merges into an existing one) inside the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDraft {
    pub kind: MemoryKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub importance: f64,
    pub confidence: f64,
    #[serde(default)]
    pub source: MemorySource,
}

impl MemoryDraft {
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            context: None,
            importance: 0.5,
            confidence: 0.5,
            source: MemorySource::default(),
        }
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}
