//! The `memoriva process` command.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use memoriva_core::fixture::{load_fixture, validate_fixture};
use memoriva_core::traits::SessionStore;
use memoriva_core::SessionProcessor;
use memoriva_providers::load_config_from;

use super::{build_selector, report_warnings};

pub async fn execute(
    fixture_path: PathBuf,
    session_id: String,
    config_path: Option<PathBuf>,
    offline: bool,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let selector = build_selector(&config, offline)?;

    let fixture = load_fixture(&fixture_path)?;
    report_warnings(&mut std::io::stderr(), &validate_fixture(&fixture))?;
    let store = Arc::new(fixture.into_store()?);

    let processor = SessionProcessor::new(store.clone(), selector);
    processor
        .process(&session_id)
        .await
        .with_context(|| format!("failed to process session '{session_id}'"))?;

    let session = store.get_session(&session_id).await?;
    let fronts: HashMap<String, String> = store
        .get_cards_with_metadata(&session.deck_id, &session.user_id)
        .await?
        .into_iter()
        .map(|c| (c.card.id, c.card.front))
        .collect();
    let session_cards = store.get_session_cards(&session_id).await?;

    println!(
        "Session {} is {} with {} card(s):",
        session.id,
        session.status,
        session_cards.len()
    );
    for sc in &session_cards {
        let front = fronts.get(&sc.card_id).map(String::as_str).unwrap_or("");
        println!("  {}. {}  {}", sc.position, sc.card_id, front);
    }

    Ok(())
}
