//! Collaborator traits.
//!
//! The datastore and the language model are opaque to the pipeline; they are
//! reached only through these async traits. `memoriva-providers` implements
//! `LlmProvider`, `store::InMemoryStore` implements `SessionStore`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{CardWithMetadata, SessionCard, SessionStatus, SessionSummary, StudySession};

// ---------------------------------------------------------------------------
// Language model
// ---------------------------------------------------------------------------

/// Trait for text-completion backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g. "deepseek").
    fn name(&self) -> &str;

    /// Single request/response completion. No streaming.
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<CompletionResponse>;
}

/// Request for a text completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier (e.g. "deepseek-chat").
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

/// Response from a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The raw response text.
    pub content: String,
    /// Model that actually produced the response.
    pub model: String,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

// ---------------------------------------------------------------------------
// Datastore
// ---------------------------------------------------------------------------

/// Persistence operations the session pipeline needs.
///
/// Implementations are shared by all workers without extra locking, so every
/// method must be safe to call concurrently.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session. Missing sessions yield `Error::NotFound`.
    async fn get_session(&self, session_id: &str) -> Result<StudySession, Error>;

    async fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<(), Error>;

    /// Cards of a deck in retrieval order, left-joined with the user's review
    /// metadata.
    async fn get_cards_with_metadata(
        &self,
        deck_id: &str,
        user_id: &str,
    ) -> Result<Vec<CardWithMetadata>, Error>;

    /// Replace the session's card list with `card_ids`, in order. Any previous
    /// list for the session is discarded in the same operation.
    async fn replace_session_cards(&self, session_id: &str, card_ids: &[String])
        -> Result<(), Error>;

    /// Mark the session `Ready` and stamp its completion time.
    async fn complete_session(&self, session_id: &str) -> Result<(), Error>;

    /// The persisted card list, ordered by position.
    async fn get_session_cards(&self, session_id: &str) -> Result<Vec<SessionCard>, Error>;

    /// Status view of a session.
    async fn session_summary(&self, session_id: &str) -> Result<SessionSummary, Error> {
        let session = self.get_session(session_id).await?;
        let cards = self.get_session_cards(session_id).await?;
        Ok(SessionSummary {
            id: session.id,
            status: session.status,
            card_count: cards.len(),
            completed_at: session.completed_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Job handler
// ---------------------------------------------------------------------------

/// Work the queue's workers run for each dequeued session.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    async fn process(&self, session_id: &str) -> Result<(), Error>;
}
