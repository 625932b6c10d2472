//! Webhook delivery against a mock HTTP subscriber.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scribe_db::MemoryStore;
use scribe_jobs::webhooks::{DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER};
use scribe_jobs::*;

fn fast_config() -> DeliveryConfig {
    DeliveryConfig::default().with_retry_delays(vec![
        Duration::ZERO,
        Duration::from_millis(10),
        Duration::from_millis(10),
        Duration::from_millis(10),
    ])
}

async fn setup(config: DeliveryConfig) -> (MemoryStore, WebhookNotifier) {
    let store = MemoryStore::new();
    let notifier = WebhookNotifier::new(
        store.repositories().webhooks,
        config,
        CancellationToken::new(),
    );
    (store, notifier)
}

async fn register(store: &MemoryStore, url: String, events: &[&str], secret: Option<&str>) -> Webhook {
    let webhook = Webhook::new(
        url,
        events.iter().map(|e| e.to_string()).collect(),
        secret.map(str::to_string),
    );
    store.repositories().webhooks.insert(&webhook).await.unwrap();
    webhook
}

async fn only_delivery(store: &MemoryStore, webhook: &Webhook) -> WebhookDelivery {
    let rows = store
        .repositories()
        .webhooks
        .list_deliveries(webhook.id, 10)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    rows.into_iter().next().unwrap()
}

#[tokio::test]
async fn test_delivery_succeeds_on_first_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("content-type", "application/json"))
        .and(header(EVENT_HEADER, "transcript.completed"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (store, notifier) = setup(fast_config()).await;
    let webhook = register(&store, format!("{}/hook", server.uri()), &[], None).await;

    notifier.notify(WebhookEvent::TranscriptCompleted, json!({ "id": "t-1" }));
    notifier.flush().await;

    let delivery = only_delivery(&store, &webhook).await;
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.attempts, 1);
    assert_eq!(delivery.response_code, Some(200));
    assert!(delivery.delivered_at.is_some());
    assert!(delivery.last_error.is_none());
    assert_eq!(delivery.payload["event"], "transcript.completed");
    assert_eq!(delivery.payload["data"]["id"], "t-1");
    assert!(delivery.payload["timestamp"].is_string());
}

#[tokio::test]
async fn test_delivery_retries_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let (store, notifier) = setup(fast_config()).await;
    let webhook = register(&store, server.uri(), &["batch.completed"], None).await;

    notifier.notify(WebhookEvent::BatchCompleted, json!({ "id": "b-1" }));
    notifier.flush().await;

    let delivery = only_delivery(&store, &webhook).await;
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.attempts, 4);
    assert_eq!(delivery.response_code, Some(202));
    assert!(delivery.delivered_at.is_some());
}

#[tokio::test]
async fn test_delivery_fails_after_four_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let (store, notifier) = setup(fast_config()).await;
    let webhook = register(&store, server.uri(), &[], None).await;

    notifier.notify(WebhookEvent::PdfFailed, json!({}));
    notifier.flush().await;

    let delivery = only_delivery(&store, &webhook).await;
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert_eq!(delivery.attempts, 4);
    assert_eq!(delivery.last_error.as_deref(), Some("HTTP 500"));
    assert_eq!(delivery.response_code, Some(500));
    assert!(delivery.delivered_at.is_none());
}

#[tokio::test]
async fn test_unreachable_subscriber_records_transport_error() {
    let (store, notifier) = setup(fast_config()).await;
    // Nothing listens on the discard port.
    let webhook = register(&store, "http://127.0.0.1:9/hook".to_string(), &[], None).await;

    notifier.notify(WebhookEvent::SummaryCompleted, json!({}));
    notifier.flush().await;

    let delivery = only_delivery(&store, &webhook).await;
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert_eq!(delivery.attempts, 4);
    assert!(delivery.response_code.is_none());
    assert!(delivery.last_error.is_some());
}

#[tokio::test]
async fn test_slow_subscriber_hits_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let config = fast_config().with_request_timeout(Duration::from_millis(50));
    let (store, notifier) = setup(config).await;
    let webhook = register(&store, server.uri(), &[], None).await;

    notifier.notify(WebhookEvent::TranscriptCompleted, json!({}));
    tokio::time::timeout(Duration::from_secs(5), notifier.flush())
        .await
        .expect("request timeout should bound every attempt");

    let delivery = only_delivery(&store, &webhook).await;
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert_eq!(delivery.attempts, 4);
    assert!(delivery.response_code.is_none());
}

#[tokio::test]
async fn test_shutdown_aborts_pending_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = DeliveryConfig::default().with_retry_delays(vec![
        Duration::ZERO,
        Duration::from_millis(10),
        Duration::from_secs(30),
        Duration::from_secs(30),
    ]);
    let (store, notifier) = setup(config).await;
    let webhook = register(&store, server.uri(), &[], None).await;
    let delivery_id = notifier.deliver_test(webhook.clone());

    let repo = store.repositories().webhooks;
    let mut attempts = 0;
    for _ in 0..200 {
        if let Some(d) = repo.get_delivery(delivery_id).await.unwrap() {
            attempts = d.attempts;
            if attempts == 2 {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(attempts, 2);

    tokio::time::timeout(Duration::from_secs(5), notifier.shutdown())
        .await
        .expect("shutdown should not wait for the 30s retry delay");

    let delivery = repo.get_delivery(delivery_id).await.unwrap().unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert_eq!(delivery.attempts, 2);
    assert_eq!(delivery.last_error.as_deref(), Some("shutdown"));
}

#[tokio::test]
async fn test_first_attempt_goes_out_after_shutdown_began() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let store = MemoryStore::new();
    let notifier =
        WebhookNotifier::new(store.repositories().webhooks, fast_config(), cancel.clone());
    let webhook = register(&store, server.uri(), &[], None).await;

    // Failure events raised while workers drain arrive after cancellation.
    cancel.cancel();
    notifier.notify(WebhookEvent::TranscriptFailed, json!({ "error": "shutdown" }));
    notifier.shutdown().await;

    let delivery = only_delivery(&store, &webhook).await;
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.attempts, 1);
    assert_eq!(delivery.response_code, Some(200));
}

#[tokio::test]
async fn test_retry_after_shutdown_began_is_aborted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let store = MemoryStore::new();
    let notifier =
        WebhookNotifier::new(store.repositories().webhooks, fast_config(), cancel.clone());
    let webhook = register(&store, server.uri(), &[], None).await;

    cancel.cancel();
    notifier.notify(WebhookEvent::PdfFailed, json!({}));
    notifier.shutdown().await;

    let delivery = only_delivery(&store, &webhook).await;
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert_eq!(delivery.attempts, 1);
    assert_eq!(delivery.response_code, Some(503));
    assert_eq!(delivery.last_error.as_deref(), Some("shutdown"));
}

#[tokio::test]
async fn test_overall_timeout_aborts_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = DeliveryConfig::default()
        .with_retry_delays(vec![
            Duration::ZERO,
            Duration::from_millis(500),
            Duration::from_millis(500),
            Duration::from_millis(500),
        ])
        .with_overall_timeout(Duration::from_millis(200));
    let (store, notifier) = setup(config).await;
    let webhook = register(&store, server.uri(), &[], None).await;

    notifier.notify(WebhookEvent::TranscriptFailed, json!({}));
    notifier.flush().await;

    let delivery = only_delivery(&store, &webhook).await;
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert_eq!(delivery.attempts, 1);
    assert_eq!(delivery.last_error.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn test_signed_delivery_carries_verifiable_signature() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (store, notifier) = setup(fast_config()).await;
    let webhook = register(&store, server.uri(), &[], Some("s3cret")).await;

    notifier.notify(WebhookEvent::TranscriptionCompleted, json!({ "id": 7 }));
    notifier.flush().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let signature = request
        .headers
        .get(SIGNATURE_HEADER)
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(signature, sign_payload("s3cret", &request.body));

    let delivery = only_delivery(&store, &webhook).await;
    let delivery_header = request.headers.get(DELIVERY_HEADER).unwrap().to_str().unwrap();
    assert_eq!(delivery_header, delivery.id.to_string());

    let body: JsonValue = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body, delivery.payload);
}

#[tokio::test]
async fn test_unsigned_delivery_has_no_signature_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (store, notifier) = setup(fast_config()).await;
    register(&store, server.uri(), &[], Some("")).await;

    notifier.notify(WebhookEvent::PdfCompleted, json!({}));
    notifier.flush().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get(SIGNATURE_HEADER).is_none());
}

#[tokio::test]
async fn test_only_active_subscribers_receive_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let (store, notifier) = setup(fast_config()).await;
    let all = register(&store, server.uri(), &[], None).await;
    let matching = register(&store, server.uri(), &["summary.completed"], None).await;
    let other = register(&store, server.uri(), &["pdf.completed"], None).await;
    let mut inactive = register(&store, server.uri(), &[], None).await;
    inactive.active = false;
    store.repositories().webhooks.update(&inactive).await.unwrap();

    notifier.notify(WebhookEvent::SummaryCompleted, json!({}));
    notifier.flush().await;

    let repo = store.repositories().webhooks;
    assert_eq!(repo.list_deliveries(all.id, 10).await.unwrap().len(), 1);
    assert_eq!(repo.list_deliveries(matching.id, 10).await.unwrap().len(), 1);
    assert!(repo.list_deliveries(other.id, 10).await.unwrap().is_empty());
    assert!(repo.list_deliveries(inactive.id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deliver_test_sends_test_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header(EVENT_HEADER, "webhook.test"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (store, notifier) = setup(fast_config()).await;
    // Test deliveries ignore the subscription filter.
    let webhook = register(&store, server.uri(), &["pdf.completed"], None).await;

    let delivery_id = notifier.deliver_test(webhook.clone());
    notifier.flush().await;

    let delivery = store
        .repositories()
        .webhooks
        .get_delivery(delivery_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.event, "webhook.test");
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.response_code, Some(204));
    assert_eq!(delivery.payload["data"]["webhook_id"], json!(webhook.id));
}

#[tokio::test]
async fn test_no_subscribers_creates_no_rows() {
    let (store, notifier) = setup(fast_config()).await;
    notifier.notify(WebhookEvent::BatchCompleted, json!({ "id": Uuid::new_v4() }));
    notifier.flush().await;

    assert_eq!(store.delivery_count().await, 0);
    assert_eq!(notifier.in_flight(), 0);
}

#[tokio::test]
async fn test_notifier_is_shareable_as_event_sink() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (store, notifier) = setup(fast_config()).await;
    register(&store, server.uri(), &[], None).await;

    let sink: Arc<dyn EventSink> = Arc::new(notifier.clone());
    sink.notify(WebhookEvent::TranscriptCompleted, json!({}));
    notifier.flush().await;

    assert_eq!(store.delivery_count().await, 1);
}
