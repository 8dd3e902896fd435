//! TOML fixture loader.
//!
//! A fixture describes decks, review history, and pending study sessions. It
//! seeds an [`InMemoryStore`] for the CLI and for integration tests.
//!
//! ```toml
//! [[decks]]
//! id = "spanish"
//! name = "Spanish verbs"
//!
//! [[decks.cards]]
//! id = "ser"
//! front = "ser"
//! back = "to be (permanent)"
//!
//! [[reviews]]
//! user_id = "alice"
//! card_id = "ser"
//! easy = 0
//! hard = 1
//! again = 3
//!
//! [[sessions]]
//! id = "s1"
//! user_id = "alice"
//! deck_id = "spanish"
//! prompt = "irregular verbs"
//! max_cards = 10
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Card, ReviewMetadata, StudySession};
use crate::store::InMemoryStore;

/// Parsed fixture file.
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub decks: Vec<FixtureDeck>,
    #[serde(default)]
    pub reviews: Vec<FixtureReview>,
    #[serde(default)]
    pub sessions: Vec<FixtureSession>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureDeck {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cards: Vec<FixtureCard>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureCard {
    pub id: String,
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureReview {
    pub user_id: String,
    pub card_id: String,
    #[serde(default)]
    pub easy: u32,
    #[serde(default)]
    pub hard: u32,
    #[serde(default)]
    pub again: u32,
    #[serde(default)]
    pub interval: Option<i64>,
    #[serde(default)]
    pub ease_factor: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureSession {
    pub id: String,
    pub user_id: String,
    pub deck_id: String,
    #[serde(default)]
    pub prompt: String,
    pub max_cards: usize,
}

/// A non-fatal problem found by [`validate_fixture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureWarning {
    /// Session, deck, or card the warning is about.
    pub subject: Option<String>,
    pub message: String,
}

/// Read and parse a fixture file.
pub fn load_fixture(path: &Path) -> Result<Fixture> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read fixture: {}", path.display()))?;
    parse_fixture_str(&content, path)
}

/// Parse fixture TOML (useful for testing).
pub fn parse_fixture_str(content: &str, source_path: &Path) -> Result<Fixture> {
    toml::from_str(content)
        .with_context(|| format!("failed to parse fixture: {}", source_path.display()))
}

/// Check a fixture for references and values the pipeline would trip over.
pub fn validate_fixture(fixture: &Fixture) -> Vec<FixtureWarning> {
    let mut warnings = Vec::new();
    let mut warn = |subject: &str, message: String| {
        warnings.push(FixtureWarning {
            subject: Some(subject.to_string()),
            message,
        });
    };

    let mut deck_ids = HashSet::new();
    let mut card_ids = HashSet::new();
    for deck in &fixture.decks {
        if !deck_ids.insert(deck.id.as_str()) {
            warn(&deck.id, "duplicate deck id".into());
        }
        if deck.cards.is_empty() {
            warn(&deck.id, "deck has no cards".into());
        }
        for card in &deck.cards {
            if !card_ids.insert(card.id.as_str()) {
                warn(&card.id, "duplicate card id".into());
            }
        }
    }

    for review in &fixture.reviews {
        if !card_ids.contains(review.card_id.as_str()) {
            warn(&review.card_id, "review references unknown card".into());
        }
    }

    let mut session_ids = HashSet::new();
    for session in &fixture.sessions {
        if !session_ids.insert(session.id.as_str()) {
            warn(&session.id, "duplicate session id".into());
        }
        if !deck_ids.contains(session.deck_id.as_str()) {
            warn(
                &session.id,
                format!("session references unknown deck '{}'", session.deck_id),
            );
        }
        if session.max_cards == 0 {
            warn(&session.id, "max_cards is 0".into());
        }
    }

    warnings
}

impl Fixture {
    /// Build an in-memory store holding every deck, review, and session.
    pub fn into_store(self) -> Result<InMemoryStore> {
        let store = InMemoryStore::new();
        for deck in self.decks {
            for card in deck.cards {
                store.insert_card(Card {
                    id: card.id,
                    deck_id: deck.id.clone(),
                    front: card.front,
                    back: card.back,
                })?;
            }
        }
        for review in self.reviews {
            let mut meta = ReviewMetadata::with_counts(review.easy, review.hard, review.again);
            if let Some(interval) = review.interval {
                meta.interval = interval;
            }
            if let Some(ease) = review.ease_factor {
                meta.ease_factor = ease;
            }
            store.upsert_review(&review.user_id, &review.card_id, meta)?;
        }
        for s in self.sessions {
            store.insert_session(StudySession::new(
                s.id,
                s.user_id,
                s.deck_id,
                s.prompt,
                s.max_cards,
            ))?;
        }
        Ok(store)
    }
}
