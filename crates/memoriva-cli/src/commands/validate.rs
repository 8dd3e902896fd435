//! The `memoriva validate` command.

use std::path::PathBuf;

use anyhow::Result;

use memoriva_core::fixture::{load_fixture, validate_fixture};

use super::report_warnings;

pub fn execute(fixture_path: PathBuf) -> Result<()> {
    let fixture = load_fixture(&fixture_path)?;

    let card_count: usize = fixture.decks.iter().map(|d| d.cards.len()).sum();
    println!(
        "Fixture: {} ({} decks, {} cards, {} reviews, {} sessions)",
        fixture_path.display(),
        fixture.decks.len(),
        card_count,
        fixture.reviews.len(),
        fixture.sessions.len()
    );

    let warnings = validate_fixture(&fixture);
    report_warnings(&mut std::io::stdout(), &warnings)?;

    if warnings.is_empty() {
        println!("Fixture valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
