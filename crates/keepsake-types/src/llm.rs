//! Text-completion collaborator types.
//!
//! The memory subsystem treats the model backend as a black box: a request
//! carries a system prompt, a user prompt, and a request id; the response
//! is raw text. Parsing and validation happen on this side of the boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Role of a message in a conversation transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptRole::System => write!(f, "system"),
            TranscriptRole::User => write!(f, "user"),
            TranscriptRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for TranscriptRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(TranscriptRole::System),
            "user" => Ok(TranscriptRole::User),
            "assistant" => Ok(TranscriptRole::Assistant),
            other => Err(format!("invalid transcript role: '{other}'")),
        }
    }
}

/// One message of a conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: TranscriptRole,
    pub content: String,
}

impl TranscriptMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TranscriptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TranscriptRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: TranscriptRole::System,
            content: content.into(),
        }
    }
}

/// Request to the text-completion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Correlates request and response in logs.
    pub request_id: Uuid,
}

/// Successful response from the text-completion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Raw model output; may or may not contain parseable structure.
    pub raw: String,
}

/// Errors from the text-completion collaborator.
///
/// These are transport-level failures. Malformed model output is not an
/// error; callers degrade to empty results instead.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("completion timed out after {0}s")]
    Timeout(u64),

    #[error("backend rejected the request: {0}")]
    Rejected(String),
}
