//! The `memoriva run` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use memoriva_core::fixture::{load_fixture, validate_fixture};
use memoriva_core::model::{SessionStatus, SessionSummary};
use memoriva_core::traits::SessionStore;
use memoriva_core::{JobQueue, SessionProcessor};
use memoriva_providers::load_config_from;

use super::{build_selector, report_warnings};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub async fn execute(
    fixture_path: PathBuf,
    workers: Option<usize>,
    capacity: Option<usize>,
    config_path: Option<PathBuf>,
    offline: bool,
    timeout_secs: u64,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let mut queue_config = config.queue_config();
    if let Some(w) = workers {
        queue_config.workers = w;
    }
    if let Some(c) = capacity {
        queue_config.capacity = c;
    }
    anyhow::ensure!(queue_config.workers >= 1, "workers must be at least 1");
    anyhow::ensure!(queue_config.capacity >= 1, "capacity must be at least 1");

    let selector = build_selector(&config, offline)?;

    let fixture = load_fixture(&fixture_path)?;
    report_warnings(&mut std::io::stderr(), &validate_fixture(&fixture))?;
    let store = Arc::new(fixture.into_store()?);

    let mut pending = Vec::new();
    for id in store.session_ids()? {
        if store.get_session(&id).await?.status == SessionStatus::Pending {
            pending.push(id);
        }
    }

    let selection = if selector.has_model() {
        format!("model {}", selector.config().model)
    } else {
        "heuristic selection".to_string()
    };

    let processor = SessionProcessor::new(store.clone(), selector);
    let queue = JobQueue::new(Arc::new(processor), queue_config);

    eprintln!(
        "memoriva v{} - processing {} session(s) with {} worker(s), {selection}",
        env!("CARGO_PKG_VERSION"),
        pending.len(),
        queue.config().workers
    );
    queue.start();

    let mut submitted = Vec::new();
    let mut rejected = Vec::new();
    for id in pending {
        match queue.submit(&id) {
            Ok(()) => submitted.push(id),
            Err(e) => {
                let hint = if e.is_retryable() { " (retry later)" } else { "" };
                eprintln!("  Not queued: {id}: {e}{hint}");
                rejected.push(id);
            }
        }
    }

    let start = Instant::now();
    let deadline = Duration::from_secs(timeout_secs);
    loop {
        let mut all_terminal = true;
        for id in &submitted {
            if !store.get_session(id).await?.status.is_terminal() {
                all_terminal = false;
                break;
            }
        }
        if all_terminal {
            break;
        }
        if start.elapsed() >= deadline {
            eprintln!("Timed out after {timeout_secs}s waiting for sessions to finish.");
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    queue.stop().await;

    let mut summaries = Vec::new();
    for id in submitted.iter().chain(rejected.iter()) {
        summaries.push(store.session_summary(id).await?);
    }
    summaries.sort_by(|a, b| a.id.cmp(&b.id));
    print_summary(&summaries);

    let ready = summaries
        .iter()
        .filter(|s| s.status == SessionStatus::Ready)
        .count();
    let failed = summaries
        .iter()
        .filter(|s| s.status == SessionStatus::Failed)
        .count();
    eprintln!(
        "\nComplete: {ready}/{} ready, {failed} failed, {} not queued ({:.1}s)",
        summaries.len(),
        rejected.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

fn print_summary(summaries: &[SessionSummary]) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Session", "Status", "Cards", "Completed"]);

    for s in summaries {
        let completed = s
            .completed_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&s.id),
            Cell::new(s.status.to_string()),
            Cell::new(s.card_count),
            Cell::new(completed),
        ]);
    }

    println!("{table}");
}
