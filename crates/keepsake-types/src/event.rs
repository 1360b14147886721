//! Event types for the Keepsake memory event bus.
//!
//! `MemoryEvent` is the unified event type broadcast to subscribers
//! (presentation layer, logging). All variants are Clone + Send + Sync
//! for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a proactive action fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// First evaluation of a session, greeting with a notable memory.
    WelcomeBack,
    /// An unresolved project or event worth asking about.
    FollowUp,
    /// The current page correlates with a stored memory.
    ContextMatch,
    /// Occasional resurfacing of a long-unseen memory.
    RandomRecall,
}

/// How the presentation collaborator should surface a proactive message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SurfaceDirective {
    /// Append the message to the open conversation thread.
    AppendToConversation,
    /// Show a transient notification that fades after `fade_ms`.
    Notify { anchor: String, fade_ms: u64 },
}

/// Events emitted by the memory subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryEvent {
    /// A new memory was created from a draft.
    MemoryCreated { memory_id: Uuid, content: String },

    /// A draft was merged into an existing duplicate memory.
    MemoryMerged { memory_id: Uuid, content: String },

    /// Capacity pruning removed low-value memories.
    MemoriesPruned { removed: usize, remaining: usize },

    /// The controller decided to surface a memory unprompted.
    ProactiveTriggered {
        memory_id: Uuid,
        trigger: TriggerKind,
        message: String,
        directive: SurfaceDirective,
    },

    /// The user engaged with or dismissed a proactive action.
    ProactiveResolved { memory_id: Uuid, engaged: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagged_serialization() {
        let event = MemoryEvent::ProactiveTriggered {
            memory_id: Uuid::now_v7(),
            trigger: TriggerKind::WelcomeBack,
            message: "Welcome back! Still working on the garden redesign?".to_string(),
            directive: SurfaceDirective::AppendToConversation,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"proactive_triggered\""));
        assert!(json.contains("\"trigger\":\"welcome_back\""));
        assert!(json.contains("\"mode\":\"append_to_conversation\""));
    }

    #[test]
    fn test_notify_directive_roundtrip() {
        let directive = SurfaceDirective::Notify {
            anchor: "toolbar".to_string(),
            fade_ms: 4000,
        };
        let json = serde_json::to_string(&directive).unwrap();
        let parsed: SurfaceDirective = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, directive);
    }

    #[test]
    fn test_pruned_event_roundtrip() {
        let event = MemoryEvent::MemoriesPruned {
            removed: 25,
            remaining: 70,
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: MemoryEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed,
            MemoryEvent::MemoriesPruned {
                removed: 25,
                remaining: 70
            }
        ));
    }
}
