//! Error taxonomy for session processing.
//!
//! `Error` is what callers of the queue and the processor see.
//! `SelectionError` describes why the model-assisted selection path failed; it
//! is always absorbed by the processor, which falls back to the deterministic
//! heuristic instead.

use thiserror::Error;

/// Errors surfaced by the queue, the processor, and datastore collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// A session or a required record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The job buffer is at capacity; retry later.
    #[error("queue is full")]
    QueueFull,

    /// The queue is shutting down and no longer accepts work.
    #[error("queue is shutting down")]
    Cancelled,

    /// The session's deck has no cards to select from.
    #[error("no cards found in deck {deck_id} for session {session_id}")]
    EmptyDeck { session_id: String, deck_id: String },

    /// A datastore read or write failed.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Another run of the same session is in flight.
    #[error("session {0} is already being processed")]
    AlreadyProcessing(String),
}

impl Error {
    /// Returns `true` if the caller may resubmit the same job later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::QueueFull | Error::AlreadyProcessing(_))
    }
}

/// Reasons the model-assisted selection path gave up.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// No language model is configured.
    #[error("no language model available")]
    ModelUnavailable,

    /// The provider call itself failed.
    #[error("language model request failed: {0:#}")]
    Provider(anyhow::Error),

    /// The response had no decodable `[...]` list of identifiers.
    #[error("could not parse card ids from model response: {0}")]
    ModelParseFailure(String),

    /// Every identifier in the response was unknown.
    #[error("model response contained no known card ids")]
    NoValidIds,
}
