pub mod init;
pub mod process;
pub mod run;
pub mod validate;

use std::io::Write;

use anyhow::Result;

use memoriva_core::fixture::FixtureWarning;
use memoriva_core::CardSelector;
use memoriva_providers::{resolve_provider, MemorivaConfig};

/// Build the card selector for a command run.
///
/// Offline runs, and runs with no usable provider, select heuristically.
pub(crate) fn build_selector(config: &MemorivaConfig, offline: bool) -> Result<CardSelector> {
    if offline {
        return Ok(CardSelector::without_model());
    }
    match resolve_provider(config)? {
        Some((provider, model)) => Ok(CardSelector::new(
            Some(provider),
            config.selection_config(&model),
        )),
        None => {
            eprintln!("No language model configured; using heuristic card selection.");
            Ok(CardSelector::without_model())
        }
    }
}

/// Write one line per fixture warning, prefixed with its subject.
pub(crate) fn report_warnings(
    out: &mut impl Write,
    warnings: &[FixtureWarning],
) -> std::io::Result<()> {
    for w in warnings {
        let prefix = w
            .subject
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        writeln!(out, "{prefix} WARNING: {}", w.message)?;
    }
    Ok(())
}
