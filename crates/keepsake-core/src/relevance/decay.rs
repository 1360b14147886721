//! Time- and feedback-adjusted effective importance.
//!
//! Each memory kind maps to a half-life; identity memories have none and
//! never decay. The adaptive variant folds in engagement feedback, usage,
//! and the user-verified boost on top of pure time decay.

use chrono::{DateTime, Utc};

use keepsake_types::config::DecayConfig;
use keepsake_types::memory::{Memory, MemoryKind};

/// Cap on the re-access bonus: frequent access can lift a memory by at
/// most 0.3 above its decayed base.
const ACCESS_BONUS_PER_HIT: f64 = 0.05;
const ACCESS_BONUS_CAP: f64 = 0.3;

/// Feedback contributes at most ±0.3 before resistance dampening.
const FEEDBACK_WEIGHT: f64 = 0.3;

/// Usage bonus: 0.02 per use, capped at 0.2.
const USAGE_BONUS_PER_USE: f64 = 0.02;
const USAGE_BONUS_CAP: f64 = 0.2;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Computes decayed and adaptive effective importance for memories.
#[derive(Debug, Clone, Default)]
pub struct DecayModel {
    config: DecayConfig,
}

impl DecayModel {
    pub fn new(config: DecayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecayConfig {
        &self.config
    }

    /// How strongly a kind resists feedback-driven importance swings.
    ///
    /// Identity facts barely move on feedback; projects, opinions, and
    /// events swing the most.
    pub fn feedback_resistance(kind: MemoryKind) -> f64 {
        match kind {
            MemoryKind::Identity => 0.9,
            MemoryKind::Preference => 0.6,
            MemoryKind::Skill => 0.5,
            MemoryKind::Person => 0.4,
            MemoryKind::Project | MemoryKind::Opinion | MemoryKind::Event => 0.2,
        }
    }

    /// Importance after pure time decay plus the re-access bonus.
    ///
    /// `importance × 0.5^(days_since_access / half_life) +
    /// min(access_count × 0.05, 0.3)`, clamped to [0,1]. Kinds without a
    /// half-life (identity) skip the decay factor entirely and return raw
    /// importance.
    pub fn decayed_importance(&self, memory: &Memory, now: DateTime<Utc>) -> f64 {
        let Some(half_life) = self.config.half_life_days(memory.kind) else {
            return memory.importance.clamp(0.0, 1.0);
        };

        let days = days_between(memory.last_accessed, now);
        let decay_factor = 0.5_f64.powf(days / half_life);
        let access_bonus = (memory.access_count as f64 * ACCESS_BONUS_PER_HIT).min(ACCESS_BONUS_CAP);

        (memory.importance * decay_factor + access_bonus).clamp(0.0, 1.0)
    }

    /// Adaptive effective importance: time decay plus feedback, usage, and
    /// the verified boost, dampened by per-kind feedback resistance.
    pub fn adaptive_importance(&self, memory: &Memory, now: DateTime<Utc>) -> f64 {
        let base = self.decayed_importance(memory, now);

        let resistance = Self::feedback_resistance(memory.kind);
        let feedback_term =
            self.effective_feedback(memory, now) * FEEDBACK_WEIGHT * (1.0 - resistance);
        let usage_bonus = (memory.usage_count as f64 * USAGE_BONUS_PER_USE).min(USAGE_BONUS_CAP);

        let mut score = base + feedback_term + usage_bonus;
        if memory.user_verified {
            score *= self.config.verified_boost;
        }
        score *= memory.adaptive_decay_rate;

        score.clamp(0.0, 1.0)
    }

    /// The feedback score after its own half-life decay toward zero,
    /// measured from the last time the memory was used.
    pub fn effective_feedback(&self, memory: &Memory, now: DateTime<Utc>) -> f64 {
        let Some(last_used) = memory.last_used_at else {
            return memory.feedback_score;
        };
        let days = days_between(last_used, now);
        memory.feedback_score * 0.5_f64.powf(days / self.config.feedback_half_life_days)
    }

    /// Apply an engagement or dismissal signal to a memory.
    ///
    /// Adds the configured increment (engage) or decrement (dismiss),
    /// clamps feedback to [-1,1], bumps the interaction counters, and
    /// marks the memory as used now (restarting the feedback decay clock).
    pub fn adjust_feedback(&self, memory: &mut Memory, engaged: bool, now: DateTime<Utc>) {
        if engaged {
            memory.feedback_score += self.config.engage_increment;
            memory.positive_interactions = memory.positive_interactions.saturating_add(1);
        } else {
            memory.feedback_score -= self.config.dismiss_decrement;
            memory.negative_interactions = memory.negative_interactions.saturating_add(1);
        }
        memory.feedback_score = memory.feedback_score.clamp(-1.0, 1.0);
        memory.record_usage(now);
    }
}

fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    ((later - earlier).num_seconds().max(0) as f64) / SECONDS_PER_DAY
}
