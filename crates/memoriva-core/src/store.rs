//! In-memory datastore.
//!
//! Reference `SessionStore` used by the CLI and by tests. All state sits behind
//! one `std::sync::Mutex`; no lock is held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::Error;
use crate::model::{
    Card, CardWithMetadata, ReviewMetadata, SessionCard, SessionStatus, StudySession,
};
use crate::traits::SessionStore;

#[derive(Default)]
struct StoreState {
    sessions: HashMap<String, StudySession>,
    /// Deck id -> cards in insertion order.
    decks: HashMap<String, Vec<Card>>,
    /// (user id, card id) -> review history.
    reviews: HashMap<(String, String), ReviewMetadata>,
    session_cards: HashMap<String, Vec<SessionCard>>,
}

/// Thread-safe in-memory implementation of [`SessionStore`].
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, Error> {
        self.state
            .lock()
            .map_err(|_| Error::Persistence("store lock poisoned".into()))
    }

    /// Insert or replace a session.
    pub fn insert_session(&self, session: StudySession) -> Result<(), Error> {
        self.lock()?.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    /// Append a card to its deck. Retrieval order is insertion order.
    pub fn insert_card(&self, card: Card) -> Result<(), Error> {
        self.lock()?
            .decks
            .entry(card.deck_id.clone())
            .or_default()
            .push(card);
        Ok(())
    }

    /// Record a user's review history for a card.
    pub fn upsert_review(
        &self,
        user_id: &str,
        card_id: &str,
        metadata: ReviewMetadata,
    ) -> Result<(), Error> {
        self.lock()?
            .reviews
            .insert((user_id.to_string(), card_id.to_string()), metadata);
        Ok(())
    }

    /// IDs of all sessions, sorted.
    pub fn session_ids(&self) -> Result<Vec<String>, Error> {
        let mut ids: Vec<String> = self.lock()?.sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn get_session(&self, session_id: &str) -> Result<StudySession, Error> {
        self.lock()?
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))
    }

    async fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<(), Error> {
        let mut state = self.lock()?;
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
        if !session.status.can_transition_to(status) {
            tracing::warn!(
                session_id,
                from = %session.status,
                to = %status,
                "non-forward session status transition"
            );
        }
        session.status = status;
        Ok(())
    }

    async fn get_cards_with_metadata(
        &self,
        deck_id: &str,
        user_id: &str,
    ) -> Result<Vec<CardWithMetadata>, Error> {
        let state = self.lock()?;
        let Some(cards) = state.decks.get(deck_id) else {
            return Ok(Vec::new());
        };
        Ok(cards
            .iter()
            .map(|card| CardWithMetadata {
                card: card.clone(),
                metadata: state
                    .reviews
                    .get(&(user_id.to_string(), card.id.clone()))
                    .cloned(),
            })
            .collect())
    }

    async fn replace_session_cards(
        &self,
        session_id: &str,
        card_ids: &[String],
    ) -> Result<(), Error> {
        let rows = card_ids
            .iter()
            .enumerate()
            .map(|(i, card_id)| SessionCard {
                id: Uuid::new_v4(),
                session_id: session_id.to_string(),
                card_id: card_id.clone(),
                position: i + 1,
            })
            .collect();
        self.lock()?.session_cards.insert(session_id.to_string(), rows);
        Ok(())
    }

    async fn complete_session(&self, session_id: &str) -> Result<(), Error> {
        let mut state = self.lock()?;
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
        session.status = SessionStatus::Ready;
        session.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn get_session_cards(&self, session_id: &str) -> Result<Vec<SessionCard>, Error> {
        Ok(self
            .lock()?
            .session_cards
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, deck: &str) -> Card {
        Card {
            id: id.into(),
            deck_id: deck.into(),
            front: format!("front {id}"),
            back: format!("back {id}"),
        }
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get_session("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = store
            .set_status("nope", SessionStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn cards_are_left_joined_in_insertion_order() {
        let store = InMemoryStore::new();
        store.insert_card(card("b", "deck")).unwrap();
        store.insert_card(card("a", "deck")).unwrap();
        store.insert_card(card("z", "other")).unwrap();
        store
            .upsert_review("u1", "a", ReviewMetadata::with_counts(1, 2, 3))
            .unwrap();
        store
            .upsert_review("u2", "b", ReviewMetadata::with_counts(9, 0, 0))
            .unwrap();

        let cards = store.get_cards_with_metadata("deck", "u1").await.unwrap();
        let ids: Vec<&str> = cards.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(cards[0].metadata.is_none(), "other user's review must not leak");
        assert_eq!(cards[1].metadata.as_ref().unwrap().again_count, 3);

        assert!(store
            .get_cards_with_metadata("missing", "u1")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn replace_session_cards_discards_previous_list() {
        let store = InMemoryStore::new();
        store
            .replace_session_cards("s1", &["a".into(), "b".into(), "a".into()])
            .await
            .unwrap();
        store
            .replace_session_cards("s1", &["c".into()])
            .await
            .unwrap();

        let rows = store.get_session_cards("s1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].card_id, "c");
        assert_eq!(rows[0].position, 1);
    }

    #[tokio::test]
    async fn positions_are_one_based() {
        let store = InMemoryStore::new();
        store
            .replace_session_cards("s1", &["a".into(), "b".into(), "a".into()])
            .await
            .unwrap();
        let positions: Vec<usize> = store
            .get_session_cards("s1")
            .await
            .unwrap()
            .iter()
            .map(|r| r.position)
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn complete_session_stamps_time_and_summary_counts_cards() {
        let store = InMemoryStore::new();
        store
            .insert_session(StudySession::new("s1", "u1", "deck", "verbs", 5))
            .unwrap();
        store
            .set_status("s1", SessionStatus::Processing)
            .await
            .unwrap();
        store
            .replace_session_cards("s1", &["a".into(), "b".into()])
            .await
            .unwrap();
        store.complete_session("s1").await.unwrap();

        let summary = store.session_summary("s1").await.unwrap();
        assert_eq!(summary.status, SessionStatus::Ready);
        assert_eq!(summary.card_count, 2);
        assert!(summary.completed_at.is_some());
    }
}
