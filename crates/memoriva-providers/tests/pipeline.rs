//! End-to-end pipeline tests: queue, processor and selector driven by the mock provider.

use std::sync::Arc;
use std::time::Duration;

use memoriva_core::model::{Card, ReviewMetadata, SessionStatus, StudySession};
use memoriva_core::traits::SessionStore;
use memoriva_core::{
    CardSelector, InMemoryStore, JobQueue, QueueConfig, SelectionConfig, SessionProcessor,
};
use memoriva_providers::mock::MockProvider;

fn seeded_store(sessions: &[&str]) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    for i in 1..=5 {
        store
            .insert_card(Card {
                id: format!("C{i}"),
                deck_id: "verbs".into(),
                front: format!("verb {i}"),
                back: format!("meaning {i}"),
            })
            .unwrap();
    }
    store
        .upsert_review("alice", "C3", ReviewMetadata::with_counts(0, 1, 3))
        .unwrap();
    for id in sessions {
        store
            .insert_session(StudySession::new(*id, "alice", "verbs", "irregular verbs", 3))
            .unwrap();
    }
    store
}

async fn session_card_ids(store: &InMemoryStore, id: &str) -> Vec<String> {
    store
        .get_session_cards(id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.card_id)
        .collect()
}

async fn wait_for_terminal(store: &InMemoryStore, ids: &[&str]) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let mut done = true;
            for id in ids {
                if !store.get_session(id).await.unwrap().status.is_terminal() {
                    done = false;
                }
            }
            if done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("sessions did not finish in time");
}

#[tokio::test]
async fn model_answer_drives_the_session() {
    let store = seeded_store(&["s1"]);
    let mock = Arc::new(MockProvider::with_fixed_response(
        "```json\n[\"C5\", \"C2\", \"nope\"]\n```",
    ));
    let config = SelectionConfig {
        model: "deepseek-chat".into(),
        ..SelectionConfig::default()
    };
    let processor = SessionProcessor::new(
        store.clone(),
        CardSelector::new(Some(mock.clone()), config),
    );

    processor.process("s1").await.unwrap();

    assert_eq!(mock.call_count(), 1);
    let request = mock.last_request().unwrap();
    assert_eq!(request.model, "deepseek-chat");
    assert!(request.user_prompt.contains("irregular verbs"));
    assert!(request.user_prompt.contains("ID: C3"));
    assert!(request.user_prompt.contains("Weakness Score: 0.8"));

    let session = store.get_session("s1").await.unwrap();
    assert_eq!(session.status, SessionStatus::Ready);
    assert_eq!(session_card_ids(&store, "s1").await, vec!["C5", "C2"]);
}

#[tokio::test]
async fn failing_model_falls_back_to_heuristic() {
    let store = seeded_store(&["s1"]);
    let mock = Arc::new(MockProvider::failing());
    let processor = SessionProcessor::new(
        store.clone(),
        CardSelector::new(Some(mock.clone()), SelectionConfig::default()),
    );

    processor.process("s1").await.unwrap();

    assert_eq!(mock.call_count(), 1);
    let summary = store.session_summary("s1").await.unwrap();
    assert_eq!(summary.status, SessionStatus::Ready);
    assert_eq!(summary.card_count, 3);
    assert!(summary.completed_at.is_some());
    assert_eq!(session_card_ids(&store, "s1").await, vec!["C3", "C3", "C1"]);
}

#[tokio::test]
async fn queue_processes_every_submitted_session() {
    let ids = ["s1", "s2", "s3", "s4"];
    let store = seeded_store(&ids);
    let mock = Arc::new(MockProvider::with_fixed_response("[\"C1\", \"C3\"]"));
    let processor = SessionProcessor::new(
        store.clone(),
        CardSelector::new(Some(mock.clone()), SelectionConfig::default()),
    );
    let queue = JobQueue::new(
        Arc::new(processor),
        QueueConfig {
            workers: 2,
            capacity: 10,
        },
    );

    queue.start();
    for id in ids {
        queue.submit(id).unwrap();
    }
    wait_for_terminal(&store, &ids).await;
    queue.stop().await;

    assert_eq!(mock.call_count(), 4);
    for id in ids {
        assert_eq!(
            store.get_session(id).await.unwrap().status,
            SessionStatus::Ready
        );
        assert_eq!(session_card_ids(&store, id).await, vec!["C1", "C3"]);
    }
}
