//! Webhook delivery engine.
//!
//! [`WebhookNotifier::notify`] turns one event into one independent delivery
//! task per subscribed webhook. Each task owns its audit row and performs up
//! to four signed attempts, racing every inter-attempt delay against the
//! process shutdown token and an overall per-delivery deadline.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde_json::{json, Value as JsonValue};
use sha2::Sha256;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use scribe_core::{defaults, Webhook, WebhookDelivery, WebhookEvent, WebhookRepository};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the event name.
pub const EVENT_HEADER: &str = "X-Scribe-Event";
/// Header carrying the delivery id.
pub const DELIVERY_HEADER: &str = "X-Scribe-Delivery";
/// Header carrying `sha256=<hex hmac>` for signed webhooks.
pub const SIGNATURE_HEADER: &str = "X-Scribe-Signature";

/// Receiver of internal events raised by job handlers.
pub trait EventSink: Send + Sync {
    /// Fire-and-forget: must not block the caller on delivery.
    fn notify(&self, event: WebhookEvent, data: JsonValue);
}

/// Compute the signature header value for `body`.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Envelope sent to subscribers.
pub fn event_payload(event: WebhookEvent, data: JsonValue) -> JsonValue {
    json!({
        "event": event.as_str(),
        "data": data,
        "timestamp": Utc::now(),
    })
}

/// Retry and timeout policy for deliveries.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Delay before each attempt; its length is the attempt budget.
    pub retry_delays: Vec<Duration>,
    /// Budget for the whole delivery, measured from its first attempt.
    pub overall_timeout: Duration,
    /// Timeout for one HTTP request.
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retry_delays: defaults::webhook_retry_delays(),
            overall_timeout: Duration::from_secs(defaults::WEBHOOK_DELIVERY_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(defaults::WEBHOOK_REQUEST_TIMEOUT_SECS),
            user_agent: format!("scribe-webhooks/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DeliveryConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WEBHOOK_TIMEOUT_SECS` | `10` | Per-request timeout |
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = std::env::var("WEBHOOK_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        if !delays.is_empty() {
            self.retry_delays = delays;
        }
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

struct NotifierInner {
    repo: Arc<dyn WebhookRepository>,
    client: reqwest::Client,
    config: DeliveryConfig,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// Fans events out to webhook subscribers.
///
/// Every spawned task is tracked: [`shutdown`](Self::shutdown) cancels and
/// waits for all of them, [`flush`](Self::flush) only waits.
#[derive(Clone)]
pub struct WebhookNotifier {
    inner: Arc<NotifierInner>,
}

impl WebhookNotifier {
    pub fn new(
        repo: Arc<dyn WebhookRepository>,
        config: DeliveryConfig,
        cancel: CancellationToken,
    ) -> Self {
        let client = match reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!(
                    subsystem = "webhooks",
                    component = "notifier",
                    error = %e,
                    "Failed to build webhook HTTP client, falling back to default client"
                );
                reqwest::Client::default()
            }
        };

        Self {
            inner: Arc::new(NotifierInner {
                repo,
                client,
                config,
                cancel,
                tracker: TaskTracker::new(),
            }),
        }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.inner.config
    }

    /// Number of tasks (fan-outs and deliveries) still running.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Send `webhook.test` to one webhook through the normal retrying path.
    ///
    /// Returns the id of the delivery row the task will create.
    pub fn deliver_test(&self, webhook: Webhook) -> Uuid {
        let payload = event_payload(
            WebhookEvent::WebhookTest,
            json!({ "webhook_id": webhook.id, "message": "test delivery" }),
        );
        let delivery = WebhookDelivery::new(webhook.id, WebhookEvent::WebhookTest.as_str(), payload);
        let id = delivery.id;
        let inner = self.inner.clone();
        self.inner
            .tracker
            .spawn(async move { inner.deliver(webhook, delivery).await });
        id
    }

    /// Wait for in-flight deliveries without cancelling them.
    pub async fn flush(&self) {
        let tracker = &self.inner.tracker;
        tracker.close();
        tracker.wait().await;
        if !self.inner.cancel.is_cancelled() {
            tracker.reopen();
        }
    }

    /// Abort pending retries and wait for every delivery task to finish.
    pub async fn shutdown(&self) {
        info!(
            subsystem = "webhooks",
            component = "notifier",
            in_flight = self.in_flight(),
            "Shutting down webhook notifier"
        );
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }
}

impl EventSink for WebhookNotifier {
    fn notify(&self, event: WebhookEvent, data: JsonValue) {
        let inner = self.inner.clone();
        self.inner
            .tracker
            .spawn(async move { inner.fan_out(event, data).await });
    }
}

/// Outcome of one HTTP attempt.
enum Attempt {
    Delivered(u16),
    Failed { error: String, code: Option<u16> },
}

impl NotifierInner {
    async fn fan_out(self: Arc<Self>, event: WebhookEvent, data: JsonValue) {
        let webhooks = match self.repo.list_for_event(event.as_str()).await {
            Ok(w) => w,
            Err(e) => {
                warn!(
                    subsystem = "webhooks",
                    component = "notifier",
                    event = event.as_str(),
                    error = %e,
                    "Failed to list webhooks"
                );
                return;
            }
        };
        if webhooks.is_empty() {
            debug!(subsystem = "webhooks", event = event.as_str(), "No subscribers");
            return;
        }

        let payload = event_payload(event, data);
        for webhook in webhooks {
            let delivery = WebhookDelivery::new(webhook.id, event.as_str(), payload.clone());
            let inner = self.clone();
            self.tracker
                .spawn(async move { inner.deliver(webhook, delivery).await });
        }
    }

    async fn persist(&self, delivery: &WebhookDelivery) {
        if let Err(e) = self.repo.update_delivery(delivery).await {
            error!(
                subsystem = "webhooks",
                delivery_id = %delivery.id,
                error = %e,
                "Failed to update delivery record"
            );
        }
    }

    async fn deliver(&self, webhook: Webhook, mut delivery: WebhookDelivery) {
        if let Err(e) = self.repo.insert_delivery(&delivery).await {
            error!(
                subsystem = "webhooks",
                webhook_id = %webhook.id,
                error = %e,
                "Failed to create delivery record, skipping delivery"
            );
            return;
        }

        let body = match serde_json::to_vec(&delivery.payload) {
            Ok(body) => body,
            Err(e) => {
                delivery.abort(format!("payload serialization failed: {}", e));
                self.persist(&delivery).await;
                return;
            }
        };
        let signature = webhook.signing_secret().map(|s| sign_payload(s, &body));
        let deadline = Instant::now() + self.config.overall_timeout;
        let budget = self.config.retry_delays.len();

        for (index, delay) in self.config.retry_delays.iter().enumerate() {
            let attempt = index + 1;
            // A zero delay is not a checkpoint, so the first attempt goes out
            // even when shutdown has already begun.
            let abort_reason = if delay.is_zero() {
                None
            } else {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Some("shutdown"),
                    _ = tokio::time::sleep_until(deadline) => Some("timeout"),
                    _ = tokio::time::sleep(*delay) => None,
                }
            };
            if let Some(reason) = abort_reason {
                delivery.abort(reason);
                self.persist(&delivery).await;
                warn!(
                    subsystem = "webhooks",
                    webhook_id = %webhook.id,
                    delivery_id = %delivery.id,
                    event = %delivery.event,
                    attempt = delivery.attempts,
                    reason,
                    "Delivery aborted"
                );
                return;
            }

            match self
                .send(&webhook, &delivery, body.clone(), signature.as_deref())
                .await
            {
                Attempt::Delivered(code) => {
                    delivery.record_success(code);
                    self.persist(&delivery).await;
                    info!(
                        subsystem = "webhooks",
                        webhook_id = %webhook.id,
                        delivery_id = %delivery.id,
                        event = %delivery.event,
                        attempt,
                        status_code = code,
                        "Webhook delivered"
                    );
                    return;
                }
                Attempt::Failed { error, code } => {
                    let exhausted = attempt == budget;
                    delivery.record_failure(error.clone(), code, exhausted);
                    self.persist(&delivery).await;
                    if exhausted {
                        warn!(
                            subsystem = "webhooks",
                            webhook_id = %webhook.id,
                            delivery_id = %delivery.id,
                            event = %delivery.event,
                            attempt,
                            error = %error,
                            "Webhook delivery failed permanently"
                        );
                    } else {
                        debug!(
                            subsystem = "webhooks",
                            webhook_id = %webhook.id,
                            delivery_id = %delivery.id,
                            attempt,
                            error = %error,
                            "Webhook attempt failed, will retry"
                        );
                    }
                }
            }
        }
    }

    async fn send(
        &self,
        webhook: &Webhook,
        delivery: &WebhookDelivery,
        body: Vec<u8>,
        signature: Option<&str>,
    ) -> Attempt {
        let mut request = self
            .client
            .post(&webhook.url)
            .timeout(self.config.request_timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, &self.config.user_agent)
            .header(EVENT_HEADER, &delivery.event)
            .header(DELIVERY_HEADER, delivery.id.to_string());
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        match request.body(body).send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                if response.status().is_success() {
                    Attempt::Delivered(code)
                } else {
                    Attempt::Failed {
                        error: format!("HTTP {}", code),
                        code: Some(code),
                    }
                }
            }
            Err(e) => Attempt::Failed {
                error: e.to_string(),
                code: None,
            },
        }
    }
}
