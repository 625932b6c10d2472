//! PostgreSQL repository tests.
//!
//! Require a migrated database at DATABASE_URL; run with `cargo test -- --ignored`.

use scribe_db::test_fixtures::{
    connect_test_database, sample_batch, sample_transcript, sample_webhook,
};
use scribe_db::{
    BatchStatus, ContentStatus, DeliveryStatus, ExtractionMethod, Summary, SummaryStyle,
    WebhookDelivery,
};
use serde_json::json;

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_transcript_lifecycle_persists() {
    let db = connect_test_database().await.unwrap();
    let repos = db.repositories();

    let mut t = sample_transcript(None);
    repos.transcripts.insert(&t).await.unwrap();

    t.state.begin_processing().unwrap();
    repos.transcripts.update(&t).await.unwrap();

    t.title = Some("A talk".into());
    t.content = Some("hello world".into());
    t.word_count = Some(2);
    t.method = Some(ExtractionMethod::AutoCaptions);
    t.state.complete().unwrap();
    repos.transcripts.update(&t).await.unwrap();

    let loaded = repos.transcripts.get(t.id).await.unwrap().unwrap();
    assert_eq!(loaded.state.status, ContentStatus::Completed);
    assert_eq!(loaded.method, Some(ExtractionMethod::AutoCaptions));
    assert_eq!(loaded.word_count, Some(2));
    assert!(loaded.state.completed_at.is_some());

    assert!(repos.transcripts.delete(t.id).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_summary_key_points_round_trip() {
    let db = connect_test_database().await.unwrap();
    let repos = db.repositories();

    let t = sample_transcript(None);
    repos.transcripts.insert(&t).await.unwrap();

    let mut s = Summary::new(t.id, SummaryStyle::Bullets, 3);
    repos.summaries.insert(&s).await.unwrap();
    s.state.begin_processing().unwrap();
    s.key_points = vec!["one".into(), "two".into()];
    s.content = Some("short".into());
    s.state.complete().unwrap();
    repos.summaries.update(&s).await.unwrap();

    let loaded = repos.summaries.get(s.id).await.unwrap().unwrap();
    assert_eq!(loaded.style, SummaryStyle::Bullets);
    assert_eq!(loaded.key_points, vec!["one", "two"]);

    repos.transcripts.delete(t.id).await.unwrap();
    assert!(repos.summaries.get(s.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_concurrent_recounts_report_terminal_once() {
    let db = connect_test_database().await.unwrap();
    let repos = db.repositories();

    let batch = sample_batch(3);
    repos.batches.insert(&batch).await.unwrap();

    let mut members = Vec::new();
    for i in 0..3 {
        let mut t = sample_transcript(Some(batch.id));
        repos.transcripts.insert(&t).await.unwrap();
        t.state.begin_processing().unwrap();
        if i == 2 {
            t.state.fail("no captions").unwrap();
        } else {
            t.state.complete().unwrap();
        }
        repos.transcripts.update(&t).await.unwrap();
        members.push(t);
    }

    let mut handles = Vec::new();
    for _ in 0..3 {
        let batches = repos.batches.clone();
        let id = batch.id;
        handles.push(tokio::spawn(async move { batches.recount(id).await }));
    }

    let mut terminal = 0;
    for h in handles {
        let r = h.await.unwrap().unwrap();
        assert_eq!(r.batch.completed_count, 2);
        assert_eq!(r.batch.failed_count, 1);
        assert_eq!(r.batch.status, BatchStatus::Completed);
        if r.became_terminal {
            terminal += 1;
        }
    }
    assert_eq!(terminal, 1);

    let listed = repos.batches.members(batch.id).await.unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].id, members[0].id);

    for t in members {
        repos.transcripts.delete(t.id).await.unwrap();
    }
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_webhook_event_matching_and_deliveries() {
    let db = connect_test_database().await.unwrap();
    let repos = db.repositories();

    let all = sample_webhook(vec![], Some("secret"));
    let pdf_only = sample_webhook(vec!["pdf.completed".into()], None);
    repos.webhooks.insert(&all).await.unwrap();
    repos.webhooks.insert(&pdf_only).await.unwrap();

    let ids: Vec<_> = repos
        .webhooks
        .list_for_event("transcript.completed")
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.id)
        .collect();
    assert!(ids.contains(&all.id));
    assert!(!ids.contains(&pdf_only.id));

    let mut d = WebhookDelivery::new(all.id, "transcript.completed", json!({"x": 1}));
    repos.webhooks.insert_delivery(&d).await.unwrap();
    d.record_failure("HTTP 500", Some(500), false);
    d.record_success(200);
    repos.webhooks.update_delivery(&d).await.unwrap();

    let loaded = repos.webhooks.get_delivery(d.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, DeliveryStatus::Success);
    assert_eq!(loaded.attempts, 2);
    assert!(loaded.delivered_at.is_some());

    let history = repos.webhooks.list_deliveries(all.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);

    repos.webhooks.delete(all.id).await.unwrap();
    repos.webhooks.delete(pdf_only.id).await.unwrap();
    assert!(repos.webhooks.get_delivery(d.id).await.unwrap().is_none());
}
