//! Configuration types for the memory subsystem.
//!
//! The empirically-chosen constants (dedup similarity threshold, per-kind
//! half-lives, pruning ratios) are deliberately configuration rather than
//! hard-coded values. All fields have sensible defaults and load from TOML.

use serde::{Deserialize, Serialize};

use crate::memory::MemoryKind;

/// Store-level tuning: capacity, pruning, dedup, and retrieval floors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of memories kept before pruning kicks in.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Pruning starts when count reaches `capacity * prune_threshold`.
    #[serde(default = "default_prune_threshold")]
    pub prune_threshold: f64,

    /// Pruning stops once count is back to `capacity * prune_target`.
    #[serde(default = "default_prune_target")]
    pub prune_target: f64,

    /// Token-Jaccard similarity at or above which two same-kind memories
    /// are considered duplicates.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Retrieval drops memories below this confidence.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Retrieval drops memories whose decayed importance falls below this.
    #[serde(default = "default_min_decayed_importance")]
    pub min_decayed_importance: f64,

    /// Maximum memories returned by one retrieval.
    #[serde(default = "default_retrieval_limit")]
    pub retrieval_limit: usize,

    /// Estimated-token budget for the rendered memory context block.
    #[serde(default = "default_context_token_budget")]
    pub context_token_budget: usize,
}

fn default_capacity() -> usize {
    200
}
fn default_prune_threshold() -> f64 {
    0.9
}
fn default_prune_target() -> f64 {
    0.7
}
fn default_similarity_threshold() -> f64 {
    0.6
}
fn default_min_confidence() -> f64 {
    0.5
}
fn default_min_decayed_importance() -> f64 {
    0.3
}
fn default_retrieval_limit() -> usize {
    15
}
fn default_context_token_budget() -> usize {
    500
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            prune_threshold: default_prune_threshold(),
            prune_target: default_prune_target(),
            similarity_threshold: default_similarity_threshold(),
            min_confidence: default_min_confidence(),
            min_decayed_importance: default_min_decayed_importance(),
            retrieval_limit: default_retrieval_limit(),
            context_token_budget: default_context_token_budget(),
        }
    }
}

/// Decay tuning: per-kind half-lives and feedback dynamics.
///
/// A half-life of `None` means the kind never decays; identity memories
/// default to that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Identity memories default to no decay at all.
    #[serde(default)]
    pub identity_half_life_days: Option<f64>,

    #[serde(default = "default_preference_half_life")]
    pub preference_half_life_days: f64,

    #[serde(default = "default_skill_half_life")]
    pub skill_half_life_days: f64,

    #[serde(default = "default_project_half_life")]
    pub project_half_life_days: f64,

    #[serde(default = "default_person_half_life")]
    pub person_half_life_days: f64,

    #[serde(default = "default_event_half_life")]
    pub event_half_life_days: f64,

    #[serde(default = "default_opinion_half_life")]
    pub opinion_half_life_days: f64,

    /// Half-life of the feedback score itself, measured from last use.
    #[serde(default = "default_feedback_half_life")]
    pub feedback_half_life_days: f64,

    /// Multiplier applied to user-verified memories (> 1).
    #[serde(default = "default_verified_boost")]
    pub verified_boost: f64,

    /// Feedback added when the user engages with a surfaced memory.
    #[serde(default = "default_engage_increment")]
    pub engage_increment: f64,

    /// Feedback subtracted when the user dismisses a surfaced memory.
    #[serde(default = "default_dismiss_decrement")]
    pub dismiss_decrement: f64,
}

fn default_preference_half_life() -> f64 {
    90.0
}
fn default_skill_half_life() -> f64 {
    120.0
}
fn default_project_half_life() -> f64 {
    30.0
}
fn default_person_half_life() -> f64 {
    60.0
}
fn default_event_half_life() -> f64 {
    7.0
}
fn default_opinion_half_life() -> f64 {
    21.0
}
fn default_feedback_half_life() -> f64 {
    14.0
}
fn default_verified_boost() -> f64 {
    1.2
}
fn default_engage_increment() -> f64 {
    0.10
}
fn default_dismiss_decrement() -> f64 {
    0.15
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            identity_half_life_days: None,
            preference_half_life_days: default_preference_half_life(),
            skill_half_life_days: default_skill_half_life(),
            project_half_life_days: default_project_half_life(),
            person_half_life_days: default_person_half_life(),
            event_half_life_days: default_event_half_life(),
            opinion_half_life_days: default_opinion_half_life(),
            feedback_half_life_days: default_feedback_half_life(),
            verified_boost: default_verified_boost(),
            engage_increment: default_engage_increment(),
            dismiss_decrement: default_dismiss_decrement(),
        }
    }
}

impl DecayConfig {
    /// Half-life in days for a memory kind; `None` means no decay.
    pub fn half_life_days(&self, kind: MemoryKind) -> Option<f64> {
        match kind {
            MemoryKind::Identity => self.identity_half_life_days,
            MemoryKind::Preference => Some(self.preference_half_life_days),
            MemoryKind::Skill => Some(self.skill_half_life_days),
            MemoryKind::Project => Some(self.project_half_life_days),
            MemoryKind::Person => Some(self.person_half_life_days),
            MemoryKind::Event => Some(self.event_half_life_days),
            MemoryKind::Opinion => Some(self.opinion_half_life_days),
        }
    }
}

/// Read-only proactive-trigger settings from the settings collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProactiveSettings {
    /// Global kill switch for all proactive behavior.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub welcome_back_enabled: bool,

    #[serde(default = "default_true")]
    pub follow_up_enabled: bool,

    #[serde(default = "default_true")]
    pub context_match_enabled: bool,

    #[serde(default = "default_true")]
    pub random_recall_enabled: bool,

    /// Minimum minutes between proactive actions; also the evaluator period.
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,

    /// Maximum proactive actions per hosting session.
    #[serde(default = "default_max_per_session")]
    pub max_per_session: u32,
}

fn default_true() -> bool {
    true
}
fn default_cooldown_minutes() -> u64 {
    30
}
fn default_max_per_session() -> u32 {
    3
}

impl Default for ProactiveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            welcome_back_enabled: true,
            follow_up_enabled: true,
            context_match_enabled: true,
            random_recall_enabled: true,
            cooldown_minutes: default_cooldown_minutes(),
            max_per_session: default_max_per_session(),
        }
    }
}
