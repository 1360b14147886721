//! The proactive-trigger state machine.
//!
//! The controller decides when the companion speaks first. Every gate has
//! to open before anything fires: the global switch, the per-session cap,
//! the cooldown window, and a pending trigger blocking re-evaluation until
//! the user engages or dismisses it.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;
use uuid::Uuid;

use keepsake_types::config::ProactiveSettings;
use keepsake_types::event::{SurfaceDirective, TriggerKind};
use keepsake_types::memory::{Memory, MemoryKind};
use keepsake_types::page::{PageContext, PageKind};

use crate::index::{KeywordIndex, TermExtractor};
use crate::relevance::DecayModel;

/// Away gap that makes a returning user eligible for a welcome-back, and
/// the adaptive importance the recalled memory must still carry.
const WELCOME_BACK_MIN_AWAY_HOURS: i64 = 12;
const WELCOME_BACK_MIN_IMPORTANCE: f64 = 0.5;

/// Follow-up candidates: projects and events at or above this adaptive
/// importance, untouched for at least this many days.
const FOLLOW_UP_MIN_IMPORTANCE: f64 = 0.5;
const FOLLOW_UP_MIN_IDLE_DAYS: i64 = 3;

/// Minimum weighted keyword overlap for a context match.
const CONTEXT_MATCH_THRESHOLD: f64 = 0.3;

/// Random recall only resurfaces memories idle at least this long.
const RANDOM_RECALL_MIN_IDLE_DAYS: i64 = 7;

const NOTIFY_ANCHOR: &str = "companion";
const NOTIFY_FADE_MS: u64 = 4000;

/// A proactive decision ready to be surfaced and published.
#[derive(Debug, Clone)]
pub struct ProactiveAction {
    pub memory_id: Uuid,
    pub trigger: TriggerKind,
    pub message: String,
    pub directive: SurfaceDirective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControllerState {
    Idle,
    /// A trigger fired and has not been engaged or dismissed yet.
    Triggered {
        memory_id: Uuid,
        trigger: TriggerKind,
    },
}

/// Decides when and what to proactively surface.
pub struct ProactiveController {
    settings: ProactiveSettings,
    decay: DecayModel,
    state: ControllerState,
    fired_this_session: u32,
    welcome_back_fired: bool,
    last_trigger_at: Option<DateTime<Utc>>,
    away_since: Option<DateTime<Utc>>,
    rng: StdRng,
}

impl ProactiveController {
    pub fn new(settings: ProactiveSettings, decay: DecayModel) -> Self {
        Self::with_rng(settings, decay, StdRng::from_entropy())
    }

    /// Deterministic construction for tests and replayable sessions.
    pub fn with_rng(settings: ProactiveSettings, decay: DecayModel, rng: StdRng) -> Self {
        Self {
            settings,
            decay,
            state: ControllerState::Idle,
            fired_this_session: 0,
            welcome_back_fired: false,
            last_trigger_at: None,
            away_since: None,
            rng,
        }
    }

    /// Reset per-session gates. `last_seen` is the end of the previous
    /// session, used to judge welcome-back eligibility.
    pub fn begin_session(&mut self, last_seen: Option<DateTime<Utc>>) {
        self.state = ControllerState::Idle;
        self.fired_this_session = 0;
        self.welcome_back_fired = false;
        self.last_trigger_at = None;
        self.away_since = last_seen;
    }

    pub fn settings(&self) -> &ProactiveSettings {
        &self.settings
    }

    /// Whether a fired trigger is still awaiting resolution.
    pub fn pending(&self) -> Option<(Uuid, TriggerKind)> {
        match self.state {
            ControllerState::Triggered { memory_id, trigger } => Some((memory_id, trigger)),
            ControllerState::Idle => None,
        }
    }

    /// Run one evaluation pass. Returns the highest-priority trigger whose
    /// conditions hold, or `None` when every gate or condition fails.
    pub fn evaluate(
        &mut self,
        memories: &[Memory],
        page: Option<&PageContext>,
        index: &KeywordIndex,
        extractor: &dyn TermExtractor,
        now: DateTime<Utc>,
    ) -> Option<ProactiveAction> {
        if !self.settings.enabled {
            return None;
        }
        if matches!(self.state, ControllerState::Triggered { .. }) {
            debug!("evaluation skipped, trigger pending resolution");
            return None;
        }
        if self.fired_this_session >= self.settings.max_per_session {
            return None;
        }
        if let Some(last) = self.last_trigger_at {
            let cooldown = Duration::minutes(self.settings.cooldown_minutes as i64);
            if now - last < cooldown {
                return None;
            }
        }

        let action = self
            .welcome_back(memories, now)
            .or_else(|| self.follow_up(memories, now))
            .or_else(|| self.context_match(memories, page, index, extractor))
            .or_else(|| self.random_recall(memories, now))?;

        self.state = ControllerState::Triggered {
            memory_id: action.memory_id,
            trigger: action.trigger,
        };
        self.fired_this_session += 1;
        self.last_trigger_at = Some(now);
        if action.trigger == TriggerKind::WelcomeBack {
            self.welcome_back_fired = true;
        }
        debug!(trigger = ?action.trigger, memory_id = %action.memory_id, "proactive trigger fired");
        Some(action)
    }

    /// Clear the pending trigger. Returns what was pending so the caller
    /// can apply feedback and publish the resolution.
    pub fn resolve(&mut self) -> Option<(Uuid, TriggerKind)> {
        let pending = self.pending()?;
        self.state = ControllerState::Idle;
        Some(pending)
    }

    fn welcome_back(&mut self, memories: &[Memory], now: DateTime<Utc>) -> Option<ProactiveAction> {
        if !self.settings.welcome_back_enabled || self.welcome_back_fired {
            return None;
        }
        let away_since = self.away_since?;
        if now - away_since < Duration::hours(WELCOME_BACK_MIN_AWAY_HOURS) {
            return None;
        }
        let memory = self.best_by_adaptive_importance(memories, now, |_| true)?;
        if self.decay.adaptive_importance(memory, now) < WELCOME_BACK_MIN_IMPORTANCE {
            return None;
        }
        Some(ProactiveAction {
            memory_id: memory.id,
            trigger: TriggerKind::WelcomeBack,
            message: format!(
                "Welcome back! Last time, this stuck with me: {}",
                memory.content
            ),
            directive: SurfaceDirective::AppendToConversation,
        })
    }

    fn follow_up(&mut self, memories: &[Memory], now: DateTime<Utc>) -> Option<ProactiveAction> {
        if !self.settings.follow_up_enabled {
            return None;
        }
        let idle_cutoff = now - Duration::days(FOLLOW_UP_MIN_IDLE_DAYS);
        let memory = self.best_by_adaptive_importance(memories, now, |m| {
            matches!(m.kind, MemoryKind::Project | MemoryKind::Event)
                && m.last_accessed <= idle_cutoff
        })?;
        if self.decay.adaptive_importance(memory, now) < FOLLOW_UP_MIN_IMPORTANCE {
            return None;
        }
        Some(ProactiveAction {
            memory_id: memory.id,
            trigger: TriggerKind::FollowUp,
            message: format!("Earlier you mentioned: {}. How is that going?", memory.content),
            directive: SurfaceDirective::AppendToConversation,
        })
    }

    fn context_match(
        &mut self,
        memories: &[Memory],
        page: Option<&PageContext>,
        index: &KeywordIndex,
        extractor: &dyn TermExtractor,
    ) -> Option<ProactiveAction> {
        if !self.settings.context_match_enabled {
            return None;
        }
        let page = page?;
        let query_keywords = extractor.keywords(&page.title);
        if query_keywords.is_empty() {
            return None;
        }
        let mut best: Option<(&Memory, f64)> = None;
        for memory in memories {
            let keywords = extractor.keywords(&memory.indexed_text());
            let score = index.weighted_score(&query_keywords, &keywords)
                * page_affinity(page.kind, memory.kind);
            if score >= CONTEXT_MATCH_THRESHOLD
                && best.is_none_or(|(_, existing)| score > existing)
            {
                best = Some((memory, score));
            }
        }
        let (memory, _) = best?;
        Some(ProactiveAction {
            memory_id: memory.id,
            trigger: TriggerKind::ContextMatch,
            message: format!("This reminded me of something you told me: {}", memory.content),
            directive: SurfaceDirective::Notify {
                anchor: NOTIFY_ANCHOR.to_string(),
                fade_ms: NOTIFY_FADE_MS,
            },
        })
    }

    fn random_recall(&mut self, memories: &[Memory], now: DateTime<Utc>) -> Option<ProactiveAction> {
        if !self.settings.random_recall_enabled {
            return None;
        }
        let idle_cutoff = now - Duration::days(RANDOM_RECALL_MIN_IDLE_DAYS);
        let eligible: Vec<&Memory> = memories
            .iter()
            .filter(|m| m.last_accessed <= idle_cutoff)
            .collect();
        if eligible.is_empty() {
            return None;
        }
        let memory = eligible[self.rng.gen_range(0..eligible.len())];
        Some(ProactiveAction {
            memory_id: memory.id,
            trigger: TriggerKind::RandomRecall,
            message: format!("A while back you shared this: {}", memory.content),
            directive: SurfaceDirective::Notify {
                anchor: NOTIFY_ANCHOR.to_string(),
                fade_ms: NOTIFY_FADE_MS,
            },
        })
    }

    fn best_by_adaptive_importance<'a, F>(
        &self,
        memories: &'a [Memory],
        now: DateTime<Utc>,
        filter: F,
    ) -> Option<&'a Memory>
    where
        F: Fn(&Memory) -> bool,
    {
        memories
            .iter()
            .filter(|m| filter(m))
            .map(|m| (m, self.decay.adaptive_importance(m, now)))
            .max_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.0.id.cmp(&a.0.id))
            })
            .map(|(m, _)| m)
    }
}

/// How strongly a page kind suggests a memory kind is on-topic. Uncorrelated
/// pairs on opinionated page kinds are dampened, not excluded; generic pages
/// stay neutral.
fn page_affinity(page: PageKind, memory: MemoryKind) -> f64 {
    match (page, memory) {
        (PageKind::Code | PageKind::Documentation, MemoryKind::Skill | MemoryKind::Project) => 1.0,
        (PageKind::Shopping, MemoryKind::Preference) => 1.0,
        (PageKind::Social, MemoryKind::Person | MemoryKind::Event) => 1.0,
        (PageKind::Article | PageKind::Video | PageKind::Other, _) => 1.0,
        _ => 0.8,
    }
}
