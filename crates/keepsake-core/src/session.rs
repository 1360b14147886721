//! The session context: one owner for the whole memory subsystem.
//!
//! A `MemorySession` wires the store, clusterer, extractor, relevance
//! scoring, and proactive controller together behind one facade. Hosting
//! code creates one per conversation surface and drives every operation
//! through it; nothing in the subsystem is process-global.

use chrono::{DateTime, Utc};
use tracing::{instrument, warn};
use uuid::Uuid;

use keepsake_types::config::{DecayConfig, MemoryConfig, ProactiveSettings};
use keepsake_types::entity::RelatedMemory;
use keepsake_types::error::RepositoryError;
use keepsake_types::event::MemoryEvent;
use keepsake_types::llm::{CompletionError, TranscriptMessage};
use keepsake_types::memory::{Memory, MemoryKind};
use keepsake_types::page::PageContext;
use keepsake_types::summary::ConversationSummary;

use crate::entity::{EntityClusterer, PatternEntityExtractor};
use crate::event::EventBus;
use crate::index::{HeuristicTermExtractor, KeywordIndex};
use crate::llm::TextCompletion;
use crate::memory::repository::{EntityLinkRepository, MemoryRepository, SummaryRepository};
use crate::memory::{AddOutcome, MemoryExtractor, MemoryStore};
use crate::proactive::{ProactiveAction, ProactiveController};
use crate::relevance::{
    DecayModel, QueryContext, RelevanceScorer, RetrievalOptions, ScoredMemory,
    build_memory_context, select_for_budget,
};

/// Errors crossing the session boundary.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Bundled tuning for one session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub memory: MemoryConfig,
    pub decay: DecayConfig,
    pub proactive: ProactiveSettings,
}

/// Facade over the memory subsystem, owned by the hosting conversation.
pub struct MemorySession<M, E, S> {
    store: MemoryStore<M>,
    clusterer: EntityClusterer<E>,
    summaries: S,
    extractor: MemoryExtractor,
    terms: HeuristicTermExtractor,
    index: KeywordIndex,
    index_stale: bool,
    decay: DecayModel,
    controller: ProactiveController,
    bus: EventBus,
}

impl<M, E, S> MemorySession<M, E, S>
where
    M: MemoryRepository,
    E: EntityLinkRepository,
    S: SummaryRepository,
{
    pub fn new(
        memory_repo: M,
        entity_repo: E,
        summary_repo: S,
        options: SessionOptions,
        bus: EventBus,
    ) -> Self {
        let decay = DecayModel::new(options.decay);
        let extractor = MemoryExtractor::new(options.memory.min_confidence);
        Self {
            store: MemoryStore::new(memory_repo, options.memory),
            clusterer: EntityClusterer::new(entity_repo, Box::new(PatternEntityExtractor::new())),
            summaries: summary_repo,
            extractor,
            terms: HeuristicTermExtractor::new(),
            index: KeywordIndex::default(),
            index_stale: true,
            decay: decay.clone(),
            controller: ProactiveController::new(options.proactive, decay),
            bus,
        }
    }

    /// Warm the caches and open the proactive session window. `last_seen`
    /// is when the user was last active, if known.
    #[instrument(skip(self))]
    pub async fn init(&mut self, last_seen: Option<DateTime<Utc>>) -> Result<(), SessionError> {
        self.store.load().await?;
        self.clusterer.load().await?;
        self.index_stale = true;
        self.controller.begin_session(last_seen);
        Ok(())
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn memory_count(&self) -> usize {
        self.store.len()
    }

    pub fn proactive_settings(&self) -> &ProactiveSettings {
        self.controller.settings()
    }

    pub fn query_context(&self, text: &str) -> QueryContext {
        QueryContext::from_text(text, &self.terms)
    }

    /// Extract memories from a transcript and absorb them: dedup against
    /// the store, link entities, publish lifecycle events, and prune if
    /// the store crossed its capacity threshold.
    #[instrument(skip_all, fields(messages = transcript.len()))]
    pub async fn ingest_transcript<L: TextCompletion>(
        &mut self,
        llm: &L,
        transcript: &[TranscriptMessage],
    ) -> Result<Vec<AddOutcome>, SessionError> {
        let known = self.store.all();
        let drafts = self.extractor.extract(llm, transcript, &known).await?;
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let outcomes = self.store.add_memories(drafts, now).await?;
        for outcome in &outcomes {
            let memory = outcome.memory();
            self.clusterer.link_memory(memory, now).await?;
            self.bus.publish(match outcome {
                AddOutcome::Created(_) => MemoryEvent::MemoryCreated {
                    memory_id: memory.id,
                    content: memory.content.clone(),
                },
                AddOutcome::Merged(_) => MemoryEvent::MemoryMerged {
                    memory_id: memory.id,
                    content: memory.content.clone(),
                },
            });
        }
        self.index_stale = true;

        self.prune(now).await;
        Ok(outcomes)
    }

    /// Capacity pruning; failures are logged, never propagated, so a full
    /// store can't break ingestion.
    async fn prune(&mut self, now: DateTime<Utc>) {
        match self.store.prune_if_needed(&self.decay, now).await {
            Ok(pruned) if pruned.is_empty() => {}
            Ok(pruned) => {
                for memory in &pruned {
                    if let Err(error) = self.clusterer.unlink_memory(&memory.id, now).await {
                        warn!(%error, memory_id = %memory.id, "failed to unlink pruned memory");
                    }
                }
                self.index_stale = true;
                self.bus.publish(MemoryEvent::MemoriesPruned {
                    removed: pruned.len(),
                    remaining: self.store.len(),
                });
            }
            Err(error) => warn!(%error, "capacity pruning failed"),
        }
    }

    fn ensure_index(&mut self) {
        if self.index_stale {
            self.index = KeywordIndex::build(&self.store.all(), &self.terms);
            self.index_stale = false;
        }
    }

    /// Rank the corpus against a query and mark the returned memories as
    /// accessed.
    #[instrument(skip(self, options))]
    pub async fn retrieve(
        &mut self,
        query_text: &str,
        options: &RetrievalOptions,
    ) -> Result<Vec<ScoredMemory>, SessionError> {
        self.ensure_index();
        let now = Utc::now();
        let query = QueryContext::from_text(query_text, &self.terms);
        let scored = {
            let scorer =
                RelevanceScorer::new(&self.terms, &self.index, &self.decay, self.store.config());
            scorer.retrieve(&self.store.all(), &query, options, now)
        };

        let mut touched = Vec::with_capacity(scored.len());
        for item in scored {
            match self.store.touch(&item.memory.id, now).await? {
                Some(memory) => touched.push(ScoredMemory {
                    memory,
                    score: item.score,
                }),
                None => touched.push(item),
            }
        }
        Ok(touched)
    }

    /// Retrieve, fit to the token budget, and render the grouped context
    /// block for prompt injection.
    pub async fn memory_context(&mut self, query_text: &str) -> Result<String, SessionError> {
        let ranked = self.retrieve(query_text, &RetrievalOptions::default()).await?;
        let budget = self.store.config().context_token_budget;
        let selected = select_for_budget(&ranked, budget);
        Ok(build_memory_context(&selected))
    }

    pub fn get_memory(&self, id: &Uuid) -> Option<&Memory> {
        self.store.get(id)
    }

    pub fn memories_by_kind(&self, kind: MemoryKind) -> Vec<Memory> {
        self.store.by_kind(kind)
    }

    /// Memories related to the given one through shared entities.
    pub fn find_related(&self, memory_id: &Uuid, limit: usize) -> Vec<RelatedMemory> {
        self.clusterer.find_related(memory_id, limit)
    }

    /// Mark a memory as confirmed by the user.
    pub async fn verify_memory(&mut self, id: &Uuid) -> Result<bool, SessionError> {
        let Some(memory) = self.store.get(id) else {
            return Ok(false);
        };
        let mut memory = memory.clone();
        memory.user_verified = true;
        self.store.update(memory).await?;
        Ok(true)
    }

    /// Delete one memory and cascade its entity links.
    #[instrument(skip(self))]
    pub async fn remove_memory(&mut self, id: &Uuid) -> Result<bool, SessionError> {
        let removed = self.store.remove(id).await?;
        if removed {
            self.clusterer.unlink_memory(id, Utc::now()).await?;
            self.index_stale = true;
        }
        Ok(removed)
    }

    /// Delete every memory of one kind, cascading entity links.
    pub async fn remove_memories_of_kind(
        &mut self,
        kind: MemoryKind,
    ) -> Result<usize, SessionError> {
        let removed = self.store.remove_by_kind(kind).await?;
        let now = Utc::now();
        for id in &removed {
            self.clusterer.unlink_memory(id, now).await?;
        }
        if !removed.is_empty() {
            self.index_stale = true;
        }
        Ok(removed.len())
    }

    /// Forget everything: memories and entity links. Summaries are kept.
    pub async fn clear_memories(&mut self) -> Result<(), SessionError> {
        self.store.clear_all().await?;
        self.clusterer.clear().await?;
        self.index_stale = true;
        Ok(())
    }

    /// Persist an end-of-conversation summary.
    pub async fn record_summary(
        &mut self,
        summary: ConversationSummary,
    ) -> Result<(), SessionError> {
        self.summaries.put(&summary).await?;
        Ok(())
    }

    pub async fn summaries_for(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<ConversationSummary>, SessionError> {
        Ok(self.summaries.get_by_conversation(conversation_id).await?)
    }

    /// Run one proactive evaluation pass and publish a trigger event when
    /// one fires.
    pub fn evaluate_proactive(
        &mut self,
        page: Option<&PageContext>,
        now: DateTime<Utc>,
    ) -> Option<ProactiveAction> {
        self.ensure_index();
        let memories = self.store.all();
        let action = self
            .controller
            .evaluate(&memories, page, &self.index, &self.terms, now)?;
        self.bus.publish(MemoryEvent::ProactiveTriggered {
            memory_id: action.memory_id,
            trigger: action.trigger,
            message: action.message.clone(),
            directive: action.directive.clone(),
        });
        Some(action)
    }

    /// Resolve the pending proactive trigger with the user's reaction,
    /// folding it into the memory's feedback.
    pub async fn resolve_proactive(
        &mut self,
        engaged: bool,
    ) -> Result<Option<Uuid>, SessionError> {
        let Some((memory_id, _)) = self.controller.resolve() else {
            return Ok(None);
        };
        let now = Utc::now();
        if let Some(memory) = self.store.get(&memory_id) {
            let mut memory = memory.clone();
            self.decay.adjust_feedback(&mut memory, engaged, now);
            self.store.update(memory).await?;
        }
        self.bus.publish(MemoryEvent::ProactiveResolved { memory_id, engaged });
        Ok(Some(memory_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_types::entity::EntityLink;
    use keepsake_types::llm::{CompletionRequest, CompletionResponse};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemRepo {
        rows: Mutex<HashMap<Uuid, Memory>>,
    }

    impl MemoryRepository for MemRepo {
        async fn get(&self, id: &Uuid) -> Result<Option<Memory>, RepositoryError> {
            Ok(self.rows.lock().unwrap().get(id).cloned())
        }
        async fn get_all(&self) -> Result<Vec<Memory>, RepositoryError> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }
        async fn get_by_kind(&self, kind: MemoryKind) -> Result<Vec<Memory>, RepositoryError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|m| m.kind == kind)
                .cloned()
                .collect())
        }
        async fn put(&self, memory: &Memory) -> Result<(), RepositoryError> {
            self.rows.lock().unwrap().insert(memory.id, memory.clone());
            Ok(())
        }
        async fn put_batch(&self, memories: &[Memory]) -> Result<(), RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            for memory in memories {
                rows.insert(memory.id, memory.clone());
            }
            Ok(())
        }
        async fn delete(&self, id: &Uuid) -> Result<(), RepositoryError> {
            self.rows.lock().unwrap().remove(id);
            Ok(())
        }
        async fn delete_by_kind(&self, kind: MemoryKind) -> Result<u64, RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|_, m| m.kind != kind);
            Ok((before - rows.len()) as u64)
        }
        async fn clear(&self) -> Result<(), RepositoryError> {
            self.rows.lock().unwrap().clear();
            Ok(())
        }
        async fn count(&self) -> Result<u64, RepositoryError> {
            Ok(self.rows.lock().unwrap().len() as u64)
        }
    }

    #[derive(Default)]
    struct LinkRepo {
        rows: Mutex<HashMap<String, EntityLink>>,
    }

    impl EntityLinkRepository for LinkRepo {
        async fn get(&self, entity_id: &str) -> Result<Option<EntityLink>, RepositoryError> {
            Ok(self.rows.lock().unwrap().get(entity_id).cloned())
        }
        async fn get_all(&self) -> Result<Vec<EntityLink>, RepositoryError> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }
        async fn put(&self, link: &EntityLink) -> Result<(), RepositoryError> {
            self.rows
                .lock()
                .unwrap()
                .insert(link.entity_id.clone(), link.clone());
            Ok(())
        }
        async fn delete(&self, entity_id: &str) -> Result<(), RepositoryError> {
            self.rows.lock().unwrap().remove(entity_id);
            Ok(())
        }
        async fn clear(&self) -> Result<(), RepositoryError> {
            self.rows.lock().unwrap().clear();
            Ok(())
        }
        async fn count(&self) -> Result<u64, RepositoryError> {
            Ok(self.rows.lock().unwrap().len() as u64)
        }
    }

    #[derive(Default)]
    struct SummaryRepo {
        rows: Mutex<HashMap<Uuid, ConversationSummary>>,
    }

    impl SummaryRepository for SummaryRepo {
        async fn get(&self, id: &Uuid) -> Result<Option<ConversationSummary>, RepositoryError> {
            Ok(self.rows.lock().unwrap().get(id).cloned())
        }
        async fn get_all(&self) -> Result<Vec<ConversationSummary>, RepositoryError> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }
        async fn get_by_conversation(
            &self,
            conversation_id: &Uuid,
        ) -> Result<Vec<ConversationSummary>, RepositoryError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.conversation_id == *conversation_id)
                .cloned()
                .collect())
        }
        async fn put(&self, summary: &ConversationSummary) -> Result<(), RepositoryError> {
            self.rows
                .lock()
                .unwrap()
                .insert(summary.id, summary.clone());
            Ok(())
        }
        async fn delete(&self, id: &Uuid) -> Result<(), RepositoryError> {
            self.rows.lock().unwrap().remove(id);
            Ok(())
        }
        async fn clear(&self) -> Result<(), RepositoryError> {
            self.rows.lock().unwrap().clear();
            Ok(())
        }
        async fn count(&self) -> Result<u64, RepositoryError> {
            Ok(self.rows.lock().unwrap().len() as u64)
        }
    }

    struct ScriptedLlm {
        raw: String,
    }

    impl TextCompletion for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            Ok(CompletionResponse {
                raw: self.raw.clone(),
            })
        }
    }

    fn session() -> MemorySession<MemRepo, LinkRepo, SummaryRepo> {
        MemorySession::new(
            MemRepo::default(),
            LinkRepo::default(),
            SummaryRepo::default(),
            SessionOptions::default(),
            EventBus::default(),
        )
    }

    fn transcript(user: &str) -> Vec<TranscriptMessage> {
        vec![
            TranscriptMessage::user(user),
            TranscriptMessage::assistant("Noted!"),
        ]
    }

    #[tokio::test]
    async fn ingest_creates_memories_and_publishes_events() {
        let mut session = session();
        session.init(None).await.unwrap();
        let mut events = session.bus().subscribe();

        let llm = ScriptedLlm {
            raw: r#"[{"kind": "skill", "content": "User plays piano", "confidence": 0.9}]"#
                .to_string(),
        };
        let outcomes = session
            .ingest_transcript(&llm, &transcript("I play piano"))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_merge());
        assert_eq!(session.memory_count(), 1);
        assert!(matches!(
            events.recv().await.unwrap(),
            MemoryEvent::MemoryCreated { .. }
        ));
    }

    #[tokio::test]
    async fn ingest_merges_duplicates_across_conversations() {
        let mut session = session();
        session.init(None).await.unwrap();
        let llm = ScriptedLlm {
            raw: r#"[{"kind": "skill", "content": "User plays piano", "confidence": 0.9}]"#
                .to_string(),
        };

        session
            .ingest_transcript(&llm, &transcript("I play piano"))
            .await
            .unwrap();
        let second = session
            .ingest_transcript(&llm, &transcript("piano again"))
            .await
            .unwrap();

        assert!(second[0].is_merge());
        assert_eq!(session.memory_count(), 1);
    }

    #[tokio::test]
    async fn retrieve_ranks_and_marks_access() {
        let mut session = session();
        session.init(None).await.unwrap();
        let llm = ScriptedLlm {
            raw: r#"[
                {"kind": "skill", "content": "User plays piano at recitals", "confidence": 0.9},
                {"kind": "preference", "content": "Prefers tea over coffee", "confidence": 0.9}
            ]"#
            .to_string(),
        };
        session
            .ingest_transcript(&llm, &transcript("piano and tea"))
            .await
            .unwrap();

        let results = session
            .retrieve("piano recitals", &RetrievalOptions::default())
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(results[0].memory.content.contains("piano"));
        assert_eq!(results[0].memory.access_count, 1);
    }

    #[tokio::test]
    async fn memory_context_renders_grouped_sections() {
        let mut session = session();
        session.init(None).await.unwrap();
        let llm = ScriptedLlm {
            raw: r#"[
                {"kind": "identity", "content": "Name is Sam", "importance": 0.9, "confidence": 0.9},
                {"kind": "skill", "content": "Plays piano", "importance": 0.7, "confidence": 0.9}
            ]"#
            .to_string(),
        };
        session
            .ingest_transcript(&llm, &transcript("I'm Sam and I play piano"))
            .await
            .unwrap();

        let context = session.memory_context("piano").await.unwrap();
        assert!(context.contains("Identity"));
        assert!(context.contains("- Name is Sam"));
        assert!(context.contains("Skills"));
        let identity_pos = context.find("Identity").unwrap();
        let skills_pos = context.find("Skills").unwrap();
        assert!(identity_pos < skills_pos);
    }

    #[tokio::test]
    async fn remove_memory_cascades_entity_links() {
        let mut session = session();
        session.init(None).await.unwrap();
        let llm = ScriptedLlm {
            raw: r#"[{"kind": "skill", "content": "User is learning Rust", "confidence": 0.9}]"#
                .to_string(),
        };
        let outcomes = session
            .ingest_transcript(&llm, &transcript("learning Rust"))
            .await
            .unwrap();
        let id = outcomes[0].memory().id;
        assert!(session.find_related(&id, 5).is_empty());

        assert!(session.remove_memory(&id).await.unwrap());
        assert_eq!(session.memory_count(), 0);
        assert_eq!(session.clusterer.link_count(), 0);
    }

    #[tokio::test]
    async fn related_memories_flow_through_shared_entities() {
        let mut session = session();
        session.init(None).await.unwrap();
        let llm = ScriptedLlm {
            raw: r#"[
                {"kind": "skill", "content": "User is learning Rust", "confidence": 0.9},
                {"kind": "project", "content": "Porting a game to Rust", "confidence": 0.9}
            ]"#
            .to_string(),
        };
        let outcomes = session
            .ingest_transcript(&llm, &transcript("rust things"))
            .await
            .unwrap();

        let related = session.find_related(&outcomes[0].memory().id, 5);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].memory_id, outcomes[1].memory().id);
    }

    #[tokio::test]
    async fn proactive_welcome_back_round_trip() {
        let mut session = session();
        let last_seen = Utc::now() - chrono::Duration::days(3);
        session.init(Some(last_seen)).await.unwrap();
        let llm = ScriptedLlm {
            raw: r#"[{"kind": "project", "content": "Training for a marathon", "importance": 0.9, "confidence": 0.9}]"#
                .to_string(),
        };
        session
            .ingest_transcript(&llm, &transcript("I'm training for a marathon"))
            .await
            .unwrap();
        let mut events = session.bus().subscribe();

        let action = session.evaluate_proactive(None, Utc::now()).unwrap();
        assert_eq!(action.trigger, keepsake_types::event::TriggerKind::WelcomeBack);
        assert!(matches!(
            events.recv().await.unwrap(),
            MemoryEvent::ProactiveTriggered { .. }
        ));

        // pending trigger blocks re-evaluation
        assert!(session.evaluate_proactive(None, Utc::now()).is_none());

        let resolved = session.resolve_proactive(true).await.unwrap().unwrap();
        assert_eq!(resolved, action.memory_id);
        let memory = session.get_memory(&action.memory_id).unwrap();
        assert!(memory.feedback_score > 0.0);
        assert_eq!(memory.positive_interactions, 1);
        assert!(matches!(
            events.recv().await.unwrap(),
            MemoryEvent::ProactiveResolved { engaged: true, .. }
        ));
    }

    #[tokio::test]
    async fn resolve_without_pending_is_a_no_op() {
        let mut session = session();
        session.init(None).await.unwrap();
        assert!(session.resolve_proactive(true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn verify_marks_memory_verified() {
        let mut session = session();
        session.init(None).await.unwrap();
        let llm = ScriptedLlm {
            raw: r#"[{"kind": "identity", "content": "Name is Sam", "confidence": 0.9}]"#
                .to_string(),
        };
        let outcomes = session
            .ingest_transcript(&llm, &transcript("I'm Sam"))
            .await
            .unwrap();
        let id = outcomes[0].memory().id;

        assert!(session.verify_memory(&id).await.unwrap());
        assert!(session.get_memory(&id).unwrap().user_verified);
        assert!(!session.verify_memory(&Uuid::now_v7()).await.unwrap());
    }

    #[tokio::test]
    async fn summaries_round_trip() {
        let mut session = session();
        session.init(None).await.unwrap();
        let conversation_id = Uuid::now_v7();
        let now = Utc::now();
        let summary = ConversationSummary {
            id: Uuid::now_v7(),
            conversation_id,
            summary: "Talked about piano practice".to_string(),
            key_topics: vec!["piano".to_string()],
            memory_ids: Vec::new(),
            url: None,
            created_at: now,
            conversation_ended_at: now,
            message_count: 12,
        };

        session.record_summary(summary).await.unwrap();
        let found = session.summaries_for(&conversation_id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message_count, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn background_evaluator_publishes_triggers() {
        use crate::proactive::spawn_evaluator;
        use std::sync::Arc;
        use tokio_util::sync::CancellationToken;

        let mut session = session();
        session
            .init(Some(Utc::now() - chrono::Duration::days(3)))
            .await
            .unwrap();
        let llm = ScriptedLlm {
            raw: r#"[{"kind": "project", "content": "Writing a novel", "importance": 0.9, "confidence": 0.9}]"#
                .to_string(),
        };
        session
            .ingest_transcript(&llm, &transcript("I'm writing a novel"))
            .await
            .unwrap();
        let mut events = session.bus().subscribe();

        let shared = Arc::new(tokio::sync::Mutex::new(session));
        let shutdown = CancellationToken::new();
        let handle = spawn_evaluator(shared.clone(), || None, shutdown.clone());

        // paused time auto-advances to the first cooldown tick
        let event = events.recv().await.unwrap();
        assert!(matches!(event, MemoryEvent::ProactiveTriggered { .. }));

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn background_evaluator_feeds_page_context() {
        use crate::proactive::spawn_evaluator;
        use keepsake_types::event::TriggerKind;
        use keepsake_types::page::PageKind;
        use std::sync::Arc;
        use tokio_util::sync::CancellationToken;

        let mut session = session();
        // no prior absence, so only the page can trigger anything
        session.init(None).await.unwrap();
        let llm = ScriptedLlm {
            raw: r#"[{"kind": "skill", "content": "User plays piano at recitals", "confidence": 0.9}]"#
                .to_string(),
        };
        session
            .ingest_transcript(&llm, &transcript("I play piano"))
            .await
            .unwrap();
        let mut events = session.bus().subscribe();

        let shared = Arc::new(tokio::sync::Mutex::new(session));
        let shutdown = CancellationToken::new();
        let handle = spawn_evaluator(
            shared.clone(),
            || {
                Some(PageContext {
                    url: "https://example.com/recitals".to_string(),
                    origin: "example.com".to_string(),
                    title: "piano recitals tonight".to_string(),
                    kind: PageKind::Article,
                })
            },
            shutdown.clone(),
        );

        match events.recv().await.unwrap() {
            MemoryEvent::ProactiveTriggered { trigger, .. } => {
                assert_eq!(trigger, TriggerKind::ContextMatch)
            }
            other => panic!("expected a proactive trigger, got {other:?}"),
        }

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn ingest_accepts_type_erased_backend() {
        use crate::llm::BoxTextCompletion;

        let mut session = session();
        session.init(None).await.unwrap();
        let llm = BoxTextCompletion::new(ScriptedLlm {
            raw: r#"[{"kind": "skill", "content": "User plays piano", "confidence": 0.9}]"#
                .to_string(),
        });
        let outcomes = session
            .ingest_transcript(&llm, &transcript("I play piano"))
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_merge());
    }

    #[tokio::test]
    async fn clear_memories_empties_store_and_links() {
        let mut session = session();
        session.init(None).await.unwrap();
        let llm = ScriptedLlm {
            raw: r#"[{"kind": "skill", "content": "User is learning Rust", "confidence": 0.9}]"#
                .to_string(),
        };
        session
            .ingest_transcript(&llm, &transcript("learning Rust"))
            .await
            .unwrap();

        session.clear_memories().await.unwrap();
        assert_eq!(session.memory_count(), 0);
        assert_eq!(session.clusterer.link_count(), 0);
    }
}
