//! Session processor.
//!
//! Drives one study session through its lifecycle:
//!
//! 1. load the session (missing ⇒ error, no status change)
//! 2. mark it `Processing`
//! 3. load the deck's cards with the user's review metadata
//! 4. empty deck ⇒ `Failed`
//! 5. select cards (model path, falling back to the heuristic)
//! 6. persist the ordered list, replacing any previous one (failure ⇒ `Failed`)
//! 7. mark it `Ready`
//!
//! A failure in step 7 is returned to the caller without rolling the status
//! back, so the session may be left in `Processing`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use tracing::instrument;

use crate::error::Error;
use crate::model::SessionStatus;
use crate::selection::CardSelector;
use crate::traits::{SessionHandler, SessionStore};

/// Runs the session pipeline against a datastore and a card selector.
pub struct SessionProcessor {
    store: Arc<dyn SessionStore>,
    selector: CardSelector,
    in_flight: Option<Arc<Mutex<HashSet<String>>>>,
}

impl SessionProcessor {
    pub fn new(store: Arc<dyn SessionStore>, selector: CardSelector) -> Self {
        Self {
            store,
            selector,
            in_flight: None,
        }
    }

    /// Reject a run while another run of the same session is in flight.
    ///
    /// Off by default: the queue itself does not deduplicate sessions.
    pub fn with_session_guard(mut self) -> Self {
        self.in_flight = Some(Arc::new(Mutex::new(HashSet::new())));
        self
    }

    /// Process one session synchronously.
    #[instrument(skip(self))]
    pub async fn process(&self, session_id: &str) -> Result<(), Error> {
        let _guard = match &self.in_flight {
            Some(in_flight) => Some(SessionGuard::acquire(in_flight, session_id)?),
            None => None,
        };

        let start = Instant::now();
        let session = self.store.get_session(session_id).await?;

        self.store
            .set_status(session_id, SessionStatus::Processing)
            .await?;

        let cards = match self
            .store
            .get_cards_with_metadata(&session.deck_id, &session.user_id)
            .await
        {
            Ok(cards) => cards,
            Err(e) => {
                self.mark_failed(session_id).await;
                return Err(e);
            }
        };

        if cards.is_empty() {
            self.mark_failed(session_id).await;
            return Err(Error::EmptyDeck {
                session_id: session_id.to_string(),
                deck_id: session.deck_id,
            });
        }

        let (card_ids, source) = self
            .selector
            .select(&cards, &session.prompt, session.max_cards)
            .await;

        if let Err(e) = self.store.replace_session_cards(session_id, &card_ids).await {
            self.mark_failed(session_id).await;
            return Err(e);
        }

        self.store.complete_session(session_id).await?;

        tracing::info!(
            card_count = card_ids.len(),
            deck_size = cards.len(),
            %source,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "study session ready"
        );
        Ok(())
    }

    async fn mark_failed(&self, session_id: &str) {
        if let Err(e) = self.store.set_status(session_id, SessionStatus::Failed).await {
            tracing::error!("could not mark session {session_id} failed: {e}");
        }
    }
}

#[async_trait]
impl SessionHandler for SessionProcessor {
    async fn process(&self, session_id: &str) -> Result<(), Error> {
        SessionProcessor::process(self, session_id).await
    }
}

/// Holds a session ID in the in-flight set until dropped.
struct SessionGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    session_id: String,
}

impl SessionGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<String>>>, session_id: &str) -> Result<Self, Error> {
        let mut set = in_flight
            .lock()
            .map_err(|_| Error::Persistence("session guard poisoned".into()))?;
        if !set.insert(session_id.to_string()) {
            return Err(Error::AlreadyProcessing(session_id.to_string()));
        }
        Ok(Self {
            in_flight: Arc::clone(in_flight),
            session_id: session_id.to_string(),
        })
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.session_id);
        }
    }
}
