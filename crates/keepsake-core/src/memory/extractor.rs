//! LLM-backed memory extraction from conversation transcripts.
//!
//! The extractor is stateless: it renders a prompt, asks the
//! text-completion backend for a JSON array of candidate facts, and
//! validates whatever comes back. Malformed output degrades to an empty
//! batch with a warning; only transport failures surface as errors.

use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use keepsake_types::llm::{CompletionError, CompletionRequest, TranscriptMessage, TranscriptRole};
use keepsake_types::memory::{Memory, MemoryDraft, MemoryKind};

use crate::llm::TextCompletion;

const EXTRACTION_TIMEOUT_SECS: u64 = 30;

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract durable personal facts about the user from a conversation transcript.

Respond with a JSON array only. Each element:
{
  "kind": "identity|preference|skill|project|person|event|opinion",
  "content": "one self-contained sentence stating the fact",
  "context": "optional: where in the conversation this came from",
  "importance": 0.0-1.0,
  "confidence": 0.0-1.0
}

Rules:
- Extract only facts about the user or people in their life, not about the assistant.
- Skip anything already covered by the known facts.
- Skip pleasantries, hypotheticals, and one-off trivia.
- Never extract credentials, passwords, or financial details.
- Respond with [] when there is nothing worth keeping."#;

/// One candidate fact as the model emits it, before validation.
#[derive(Debug, Deserialize)]
struct RawExtractedFact {
    kind: String,
    content: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    importance: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Turns transcripts into validated [`MemoryDraft`] batches.
pub struct MemoryExtractor {
    min_confidence: f64,
    sensitive: Regex,
    card_number: Regex,
}

impl MemoryExtractor {
    pub fn new(min_confidence: f64) -> Self {
        Self {
            min_confidence,
            sensitive: Regex::new(
                r"(?i)\b(password|passphrase|api[ _-]?key|secret|access[ _-]?token|private[ _-]?key|ssn|social security|credit card|bank account|routing number)\b",
            )
            .expect("sensitive pattern"),
            card_number: Regex::new(r"\b(?:\d[ -]?){13,16}\b").expect("card-number pattern"),
        }
    }

    /// Extract memory drafts from one conversation transcript.
    ///
    /// Transcripts without a user message yield an empty batch without
    /// calling the backend. Known facts are included in the prompt so the
    /// model can skip what the store already holds.
    #[instrument(skip_all, fields(messages = transcript.len()))]
    pub async fn extract<L: TextCompletion>(
        &self,
        llm: &L,
        transcript: &[TranscriptMessage],
        known_facts: &[Memory],
    ) -> Result<Vec<MemoryDraft>, CompletionError> {
        if !transcript
            .iter()
            .any(|m| m.role == TranscriptRole::User && !m.content.trim().is_empty())
        {
            debug!("transcript has no user messages, skipping extraction");
            return Ok(Vec::new());
        }

        let request = CompletionRequest {
            system_prompt: EXTRACTION_SYSTEM_PROMPT.to_string(),
            user_prompt: render_prompt(transcript, known_facts),
            request_id: Uuid::now_v7(),
        };

        let response = match tokio::time::timeout(
            Duration::from_secs(EXTRACTION_TIMEOUT_SECS),
            llm.complete(&request),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(CompletionError::Timeout(EXTRACTION_TIMEOUT_SECS)),
        };

        Ok(self.parse_response(&response.raw))
    }

    /// Parse and validate the model's raw output.
    ///
    /// Tolerates prose around the array by slicing from the first `[` to
    /// the last `]`. Anything that still fails to parse degrades to an
    /// empty batch.
    fn parse_response(&self, raw: &str) -> Vec<MemoryDraft> {
        let Some(json) = extract_json_array(raw) else {
            warn!("extraction response contained no JSON array");
            return Vec::new();
        };
        let facts: Vec<RawExtractedFact> = match serde_json::from_str(json) {
            Ok(facts) => facts,
            Err(error) => {
                warn!(%error, "extraction response was not a valid fact array");
                return Vec::new();
            }
        };

        let mut drafts = Vec::with_capacity(facts.len());
        for fact in facts {
            let Ok(kind) = fact.kind.parse::<MemoryKind>() else {
                debug!(kind = %fact.kind, "skipping fact with unknown kind");
                continue;
            };
            let content = fact.content.trim();
            if content.is_empty() {
                continue;
            }
            let context = fact
                .context
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty());
            if self.is_sensitive(content) || context.is_some_and(|c| self.is_sensitive(c)) {
                debug!("dropping sensitive fact");
                continue;
            }

            let confidence = fact.confidence.unwrap_or(0.5);
            if confidence < self.min_confidence {
                debug!(confidence, "dropping low-confidence fact");
                continue;
            }

            let mut draft = MemoryDraft::new(kind, content)
                .with_importance(fact.importance.unwrap_or(0.5))
                .with_confidence(confidence);
            if let Some(context) = context {
                draft = draft.with_context(context);
            }
            drafts.push(draft);
        }
        drafts
    }

    fn is_sensitive(&self, content: &str) -> bool {
        self.sensitive.is_match(content) || self.card_number.is_match(content)
    }
}

fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    (end >= start).then(|| &raw[start..=end])
}

fn render_prompt(transcript: &[TranscriptMessage], known_facts: &[Memory]) -> String {
    let mut prompt = String::new();
    if known_facts.is_empty() {
        prompt.push_str("Known facts: none yet.\n");
    } else {
        prompt.push_str("Known facts:\n");
        for fact in known_facts {
            prompt.push_str(&format!("- [{}] {}\n", fact.kind, fact.content));
        }
    }
    prompt.push_str("\nTranscript:\n");
    for message in transcript {
        prompt.push_str(&format!("{}: {}\n", message.role, message.content));
    }
    prompt
}
