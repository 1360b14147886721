//! Conversation summary records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A condensed record of one finished conversation.
///
/// Stored alongside memories so later sessions can reference what was
/// discussed without replaying the full transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub summary: String,
    /// Main topics in the order they came up.
    pub key_topics: Vec<String>,
    /// Memories extracted from this conversation.
    pub memory_ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub conversation_ended_at: DateTime<Utc>,
    pub message_count: u32,
}
