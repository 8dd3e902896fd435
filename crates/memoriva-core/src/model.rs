//! Core data model types for memoriva.
//!
//! These types describe study sessions, flashcards, and the per-user review
//! history the selection strategy consumes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a study session.
///
/// Sessions only advance `Pending -> Processing -> {Ready, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl SessionStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Ready | SessionStatus::Failed)
    }

    /// Whether moving from `self` to `next` follows the session state machine.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Pending, SessionStatus::Processing)
                | (SessionStatus::Processing, SessionStatus::Ready)
                | (SessionStatus::Processing, SessionStatus::Failed)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "PENDING"),
            SessionStatus::Processing => write!(f, "PROCESSING"),
            SessionStatus::Ready => write!(f, "READY"),
            SessionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(SessionStatus::Pending),
            "PROCESSING" => Ok(SessionStatus::Processing),
            "READY" => Ok(SessionStatus::Ready),
            "FAILED" => Ok(SessionStatus::Failed),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// One request to assemble a study sequence from a deck.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySession {
    pub id: String,
    pub user_id: String,
    pub deck_id: String,
    /// Free-text description of what the learner wants to study.
    pub prompt: String,
    /// Upper bound on the number of cards in the session.
    pub max_cards: usize,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StudySession {
    /// Create a new session in the `Pending` state.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        deck_id: impl Into<String>,
        prompt: impl Into<String>,
        max_cards: usize,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            deck_id: deck_id.into(),
            prompt: prompt.into(),
            max_cards,
            status: SessionStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// A flashcard. Belongs to exactly one deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub deck_id: String,
    pub front: String,
    pub back: String,
}

/// Spaced-repetition history of one user for one card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewMetadata {
    pub easy_count: u32,
    pub hard_count: u32,
    pub again_count: u32,
    /// Current interval in days.
    #[serde(default = "default_interval")]
    pub interval: i64,
    #[serde(default = "default_ease_factor")]
    pub ease_factor: f64,
    #[serde(default)]
    pub last_reviewed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_review: Option<DateTime<Utc>>,
}

fn default_interval() -> i64 {
    1
}

fn default_ease_factor() -> f64 {
    1.3
}

impl ReviewMetadata {
    /// Metadata with the given outcome counters and default scheduling fields.
    pub fn with_counts(easy_count: u32, hard_count: u32, again_count: u32) -> Self {
        Self {
            easy_count,
            hard_count,
            again_count,
            ..Default::default()
        }
    }

    /// Total number of recorded reviews.
    ///
    /// Widened to `u64` so saturated counters cannot overflow the sum.
    pub fn total(&self) -> u64 {
        u64::from(self.easy_count) + u64::from(self.hard_count) + u64::from(self.again_count)
    }
}

impl Default for ReviewMetadata {
    fn default() -> Self {
        Self {
            easy_count: 0,
            hard_count: 0,
            again_count: 0,
            interval: default_interval(),
            ease_factor: default_ease_factor(),
            last_reviewed: None,
            next_review: None,
        }
    }
}

/// A card paired with one user's review history, if any.
///
/// `metadata == None` means the card has never been reviewed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardWithMetadata {
    pub card: Card,
    #[serde(default)]
    pub metadata: Option<ReviewMetadata>,
}

impl CardWithMetadata {
    pub fn id(&self) -> &str {
        &self.card.id
    }
}

/// Unit of work flowing through the job queue.
#[derive(Debug, Clone)]
pub struct SessionJob {
    pub session_id: String,
    pub enqueued_at: DateTime<Utc>,
}

impl SessionJob {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            enqueued_at: Utc::now(),
        }
    }
}

/// One entry of a session's persisted card list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCard {
    pub id: Uuid,
    pub session_id: String,
    pub card_id: String,
    /// 1-based study order.
    pub position: usize,
}

/// Read-back view of a session's processing result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub status: SessionStatus,
    pub card_count: usize,
    pub completed_at: Option<DateTime<Utc>>,
}
