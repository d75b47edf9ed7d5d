//! The chat engine: one completed turn end to end, feedback capture, and
//! the background training schedule.
//!
//! Collaborator failures are isolated per stage: a dead search API or
//! LLM degrades that stage and the turn still completes. Feedback-loop
//! failures never affect the ability to serve the next turn.

use crate::explain::Explanation;
use crate::fact_check::{fact_check, FactCheckVerdict};
use crate::llm::build_prompt;
use crate::preprocess::preprocess_query;
use peira_core::{
    ActionLabel, ChatTurn, Embedder, FeedbackEvent, KnowledgeBase, LanguageModel, PeiraConfig,
    PeiraError, SearchApi,
};
use peira_memory::{ChatMemoryStore, FeedbackRecorder, SessionRegistry, SqliteStore};
use peira_policy::{LengthFeature, PolicyAgent, RewardShaper, TrainReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

/// Appended when the policy judges the response as likely sub-par.
const IMPROVEMENT_NOTE: &str = " (Note: This response may need improvement.)";

const GENERATION_FALLBACK: &str = "I could not generate a response this time.";

/// Everything a completed turn hands back to the transport layer.
#[derive(Debug, Clone)]
pub struct ChatTurnOutcome {
    pub session_id: Uuid,
    pub response: String,
    pub explanation: Explanation,
    /// History as it stood before this turn, for client display.
    pub chat_history: Vec<ChatTurn>,
}

pub struct ChatEngine {
    config: PeiraConfig,
    chat_log: ChatMemoryStore,
    sessions: SessionRegistry,
    store: Arc<SqliteStore>,
    recorder: FeedbackRecorder,
    agent: Arc<PolicyAgent>,
    llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    knowledge: Arc<dyn KnowledgeBase>,
    search: Arc<dyn SearchApi>,
}

impl ChatEngine {
    pub async fn new(
        config: PeiraConfig,
        store: Arc<SqliteStore>,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        knowledge: Arc<dyn KnowledgeBase>,
        search: Arc<dyn SearchApi>,
    ) -> Self {
        let shaper = RewardShaper::new(
            store.clone(),
            Arc::new(LengthFeature),
            config.training.decay_per_day,
            config.training.min_weight,
        );
        let agent = Arc::new(PolicyAgent::new(store.clone(), shaper, &config.training).await);

        Self {
            chat_log: ChatMemoryStore::new(config.memory.chat_capacity),
            sessions: SessionRegistry::new(),
            recorder: FeedbackRecorder::new(store.clone()),
            agent,
            store,
            llm,
            embedder,
            knowledge,
            search,
            config,
        }
    }

    /// Run one chat turn. Always completes: every collaborator stage
    /// degrades instead of aborting.
    pub async fn open_chat_turn(&self, user_id: &str, message: &str) -> ChatTurnOutcome {
        tracing::info!(user_id, "Received chat turn");

        // 1. History for continuity (as it stood before this turn).
        let history = self
            .chat_log
            .recent(user_id, self.config.memory.history_limit)
            .await;

        // 2. Normalize the query.
        let processed = preprocess_query(message);
        tracing::debug!(query = %processed, "Preprocessed query");

        // 3. Retrieve knowledge; embedding or search failure → empty list.
        let knowledge = match self.retrieve_knowledge(&processed).await {
            Ok(passages) => passages,
            Err(e) => {
                tracing::warn!("Knowledge retrieval degraded to empty: {}", e);
                Vec::new()
            }
        };

        // 4. Generate.
        let prompt = build_prompt(&knowledge, &history, &processed);
        let raw_response = match self.llm.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Generation failed, serving fallback: {}", e);
                GENERATION_FALLBACK.to_string()
            }
        };

        // 5. Fact-check (skipped when search is disabled).
        let (mut response, verdict) = if self.config.search.enabled {
            fact_check(&raw_response, self.search.as_ref()).await
        } else {
            (raw_response, FactCheckVerdict::Skipped)
        };

        // 6. Policy bias on delivery.
        let action = self.agent.best_action(&processed);
        if action == ActionLabel::Negative {
            response.push_str(IMPROVEMENT_NOTE);
        }

        // 7. Explanation.
        let explanation = Explanation::new(knowledge, verdict, action.as_str());
        tracing::debug!("{}", explanation.summary());

        // 8. Remember the turn; the archive write is best-effort.
        self.chat_log.append(user_id, message, &response).await;
        let turn = ChatTurn {
            user_id: user_id.to_string(),
            message: message.to_string(),
            response: response.clone(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        if let Err(e) = self.store.archive_turn(&turn).await {
            tracing::warn!("Failed to archive chat turn: {}", e);
        }

        // 9. Open the feedback session.
        let session_id = self.sessions.open(user_id, message, &response).await;

        ChatTurnOutcome {
            session_id,
            response,
            explanation,
            chat_history: history,
        }
    }

    async fn retrieve_knowledge(&self, processed_query: &str) -> anyhow::Result<Vec<String>> {
        let embedding = self.embedder.embed(processed_query).await?;
        self.knowledge
            .search(&embedding, self.config.search.top_k)
            .await
    }

    /// Record feedback for a previously delivered response.
    ///
    /// The session is consumed first so an id resolves exactly once; if
    /// the durable write then fails, the session is restored so the
    /// caller may retry instead of losing the event.
    pub async fn submit_feedback(
        &self,
        session_id: Uuid,
        feedback_text: &str,
    ) -> Result<FeedbackEvent, PeiraError> {
        let session = self.sessions.consume(session_id).await?;

        match self
            .recorder
            .record(
                &session.user_id,
                &session.user_input,
                &session.response,
                feedback_text,
            )
            .await
        {
            Ok(event) => Ok(event),
            Err(e) => {
                self.sessions.restore(session).await;
                Err(e)
            }
        }
    }

    /// Drop all memory for a user, both hot log and archive. Idempotent.
    pub async fn clear_memory(&self, user_id: &str) -> Result<(), PeiraError> {
        self.chat_log.clear(user_id).await;
        self.store
            .delete_user_history(user_id)
            .await
            .map_err(|e| PeiraError::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Periodic upkeep: sweep feedback sessions past their TTL.
    pub async fn maintenance_tick(&self) {
        self.sessions
            .sweep_expired(self.config.session.ttl_secs)
            .await;
    }

    /// One training pass, on demand.
    pub async fn train_now(&self) -> Result<TrainReport, PeiraError> {
        self.agent.train(self.config.training.total_steps).await
    }

    /// Start the background loop: training on its interval, session
    /// sweeps on theirs. Runs off the serving path; the stop signal ends
    /// the loop and interrupts a pass between episodes.
    pub fn spawn_background(self: Arc<Self>, mut stop: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let stop_for_training = stop.clone();
        tokio::spawn(async move {
            let train_secs = self.config.training.interval_secs;
            let mut train_tick =
                tokio::time::interval(Duration::from_secs(train_secs.max(1)));
            let mut sweep_tick = tokio::time::interval(Duration::from_secs(
                self.config.session.sweep_interval_secs.max(1),
            ));
            // Both intervals fire immediately once; swallow those.
            train_tick.tick().await;
            sweep_tick.tick().await;

            loop {
                tokio::select! {
                    _ = train_tick.tick(), if train_secs > 0 => {
                        match self
                            .agent
                            .train_until(self.config.training.total_steps, &stop_for_training)
                            .await
                        {
                            Ok(report) => tracing::info!(
                                steps = report.steps,
                                samples = report.samples,
                                "Background training pass finished"
                            ),
                            Err(e) => tracing::error!(
                                "Training pass failed, previous policy stays live: {}",
                                e
                            ),
                        }
                    }
                    _ = sweep_tick.tick() => {
                        self.maintenance_tick().await;
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            tracing::info!("Background loop stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}
