//! Card selection strategy.
//!
//! Two paths pick and order the cards of a session:
//!
//! - **Model-assisted**: the deck (capped at `prompt_card_limit` cards) is
//!   rendered into a prompt with weakness scores and raw review counters, and
//!   the language model answers with a JSON list of card IDs.
//! - **Fallback**: a deterministic heuristic that front-loads weak cards. It is
//!   the recovery path whenever the model is missing, errors, or answers with
//!   nothing usable.

use std::collections::HashSet;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::SelectionError;
use crate::model::CardWithMetadata;
use crate::scoring::{again_ratio, struggle_ratio, weakness_score};
use crate::traits::{CompletionRequest, LlmProvider};

/// Decks this small are returned whole, in retrieval order.
pub const SMALL_DECK_THRESHOLD: usize = 3;

/// A card is weak when more than this share of its reviews were hard or again.
pub const WEAK_THRESHOLD: f64 = 0.3;

/// A weak card is shown twice when more than this share of its reviews were again.
pub const REPEAT_THRESHOLD: f64 = 0.5;

/// Instructions sent as the system prompt on the model-assisted path.
pub const SYSTEM_PROMPT: &str = "You are a flashcard study assistant. You receive a deck of flashcards \
with their front and back text, spaced-repetition review counts (easy, hard, again), a weakness \
score, the learner's study request, and a maximum number of cards.

Select the cards that are relevant to the learner's request and order them for study:
- Relevance comes first. If the request names a specific topic, only pick cards about that topic.
- The maximum is a budget, not a quota. Two highly relevant cards are better than twenty loosely related ones; never pad with unrelated cards.
- Cards with many hard or again reviews are weak. Weak cards may appear more than once.

Respond with a JSON array of flashcard IDs in study order and nothing else.";

/// Tuning for the model-assisted path.
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    /// Model identifier passed to the provider.
    pub model: String,
    /// Maximum number of cards rendered into the prompt.
    pub prompt_card_limit: usize,
    /// Max tokens for the completion.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-chat".to_string(),
            prompt_card_limit: 50,
            max_tokens: 1000,
            temperature: 0.3,
        }
    }
}

/// Which path produced a card list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    Model,
    Fallback,
}

impl fmt::Display for SelectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionSource::Model => write!(f, "model"),
            SelectionSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// Picks and orders cards for a study session.
pub struct CardSelector {
    provider: Option<Arc<dyn LlmProvider>>,
    config: SelectionConfig,
}

impl CardSelector {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, config: SelectionConfig) -> Self {
        Self { provider, config }
    }

    /// A selector that always uses the fallback heuristic.
    pub fn without_model() -> Self {
        Self::new(None, SelectionConfig::default())
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn has_model(&self) -> bool {
        self.provider.is_some()
    }

    /// Ask the language model for an ordered list of card IDs.
    ///
    /// Unknown IDs are dropped and the result is capped at `max_cards`. An
    /// empty result after filtering is reported as `NoValidIds`.
    pub async fn select_with_model(
        &self,
        cards: &[CardWithMetadata],
        prompt: &str,
        max_cards: usize,
    ) -> Result<Vec<String>, SelectionError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(SelectionError::ModelUnavailable)?;

        let request = CompletionRequest {
            model: self.config.model.clone(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: build_user_prompt(cards, prompt, max_cards, self.config.prompt_card_limit),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = provider
            .complete(&request)
            .await
            .map_err(SelectionError::Provider)?;
        tracing::debug!(
            provider = provider.name(),
            latency_ms = response.latency_ms,
            content = %response.content,
            "model response"
        );

        let ids = parse_card_ids(&response.content)?;
        let mut valid = retain_known_ids(ids, cards);
        if valid.is_empty() {
            return Err(SelectionError::NoValidIds);
        }
        valid.truncate(max_cards);
        Ok(valid)
    }

    /// Model-assisted selection, falling back to the heuristic on any failure.
    pub async fn select(
        &self,
        cards: &[CardWithMetadata],
        prompt: &str,
        max_cards: usize,
    ) -> (Vec<String>, SelectionSource) {
        match self.select_with_model(cards, prompt, max_cards).await {
            Ok(ids) => (ids, SelectionSource::Model),
            Err(SelectionError::ModelUnavailable) => {
                (fallback_selection(cards, max_cards), SelectionSource::Fallback)
            }
            Err(e) => {
                tracing::warn!("model selection failed, using fallback: {e}");
                (fallback_selection(cards, max_cards), SelectionSource::Fallback)
            }
        }
    }
}

/// Render the user prompt for the model-assisted path.
///
/// Only the first `card_limit` cards are included.
pub fn build_user_prompt(
    cards: &[CardWithMetadata],
    prompt: &str,
    max_cards: usize,
    card_limit: usize,
) -> String {
    let mut out = format!(
        "User wants to study: \"{prompt}\"\nMaximum cards: {max_cards}\n\nAvailable flashcards:\n"
    );

    for entry in cards.iter().take(card_limit) {
        let meta = entry.metadata.as_ref();
        let (easy, hard, again) = meta
            .map(|m| (m.easy_count, m.hard_count, m.again_count))
            .unwrap_or_default();
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            "\nID: {}\nFront: {}\nBack: {}\nWeakness Score: {:.2} (0=strong, 1=very weak)\nReviews: Easy={easy}, Hard={hard}, Again={again}\n",
            entry.card.id,
            entry.card.front,
            entry.card.back,
            weakness_score(meta),
        );
    }

    out.push_str("\nReturn a JSON array of selected flashcard IDs:");
    out
}

/// Extract the JSON list of IDs from a model response.
///
/// The span runs from the first `[` to the last `]`, so surrounding prose and
/// markdown fences are ignored.
pub fn parse_card_ids(response: &str) -> Result<Vec<String>, SelectionError> {
    let (Some(start), Some(end)) = (response.find('['), response.rfind(']')) else {
        return Err(SelectionError::ModelParseFailure(
            "no JSON array found in response".into(),
        ));
    };
    if start >= end {
        return Err(SelectionError::ModelParseFailure(
            "no JSON array found in response".into(),
        ));
    }

    serde_json::from_str::<Vec<String>>(&response[start..=end])
        .map_err(|e| SelectionError::ModelParseFailure(e.to_string()))
}

/// Drop IDs that are not in `cards`, keeping order and repeats.
pub fn retain_known_ids(ids: Vec<String>, cards: &[CardWithMetadata]) -> Vec<String> {
    let known: HashSet<&str> = cards.iter().map(|c| c.id()).collect();
    ids.into_iter()
        .filter(|id| known.contains(id.as_str()))
        .collect()
}

/// Deterministic selection used when the model path fails.
///
/// - Decks of at most [`SMALL_DECK_THRESHOLD`] cards are returned whole.
/// - Otherwise weak cards come first (up to half the target), very weak ones
///   twice, and the remaining slots are filled from the other cards in
///   retrieval order.
/// - With only a few weak cards the target shrinks to
///   `weak + min(rest, max_cards / 2)` rather than padding the session.
pub fn fallback_selection(cards: &[CardWithMetadata], max_cards: usize) -> Vec<String> {
    if cards.len() <= SMALL_DECK_THRESHOLD {
        return cards.iter().map(|c| c.id().to_string()).collect();
    }

    let (weak, rest): (Vec<&CardWithMetadata>, Vec<&CardWithMetadata>) = cards
        .iter()
        .partition(|c| struggle_ratio(c.metadata.as_ref()) > WEAK_THRESHOLD);

    let half = max_cards / 2;
    let target = if !weak.is_empty() && weak.len() < half {
        weak.len() + rest.len().min(half)
    } else {
        max_cards
    };
    let weak_quota = target / 2;

    let mut selected = Vec::with_capacity(target);
    let mut weak_slots = 0;
    for card in weak {
        if selected.len() >= target {
            break;
        }
        selected.push(card.id().to_string());
        weak_slots += 1;

        if again_ratio(card.metadata.as_ref()) > REPEAT_THRESHOLD && selected.len() < target {
            selected.push(card.id().to_string());
            weak_slots += 1;
        }

        if weak_slots >= weak_quota {
            break;
        }
    }

    for card in rest {
        if selected.len() >= target {
            break;
        }
        selected.push(card.id().to_string());
    }

    selected
}
