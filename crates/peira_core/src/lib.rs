pub mod config;
pub mod error;

pub use config::PeiraConfig;
pub use error::PeiraError;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed exchange in a user's conversation.
///
/// Immutable once appended to the chat log; eviction is the only way out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user_id: String,
    pub message: String,
    pub response: String,
    pub timestamp: i64, // Unix timestamp
}

/// A delivered response waiting for the user's verdict.
///
/// Owned by the session registry; the triple never changes between `open`
/// and `consume`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSession {
    pub session_id: Uuid,
    pub user_id: String,
    pub user_input: String,
    pub response: String,
    pub opened_at: i64,
}

/// An append-only feedback record with its derived reward.
///
/// `reward` is -1, 0 or +1, computed from `feedback_text` at write time
/// and never revised afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub id: i64,
    pub user_id: String,
    pub user_input: String,
    pub response: String,
    pub feedback_text: String,
    pub reward: i64,
    pub timestamp: i64,
}

/// The two response-quality decisions the policy can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionLabel {
    /// Deliver the response as-is.
    Positive,
    /// Flag the response as possibly needing improvement.
    Negative,
}

impl ActionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionLabel::Positive => "positive",
            ActionLabel::Negative => "negative",
        }
    }
}

impl std::fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One web search hit, as much of it as the fact-checker needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub title: String,
    pub url: String,
}

// ============================================================================
// Collaborator contracts
// ============================================================================
//
// These are the seams to the services Peira does not own. The engine talks
// to trait objects only; concrete clients live in peira_engine and tests
// substitute their own.

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Return up to `top_k` passages ranked by relevance to the embedding.
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> anyhow::Result<Vec<String>>;
}

#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<SearchSnippet>>;
}
