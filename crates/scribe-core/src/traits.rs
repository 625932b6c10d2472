//! Repository traits for scribe's system of record.
//!
//! The worker pool and the HTTP layer only see these traits; PostgreSQL and
//! in-memory implementations live in `scribe-db`.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

/// Load/update-by-id storage for one content record kind.
#[async_trait]
pub trait ContentRepository<T: ContentRecord>: Send + Sync {
    /// Insert a new record (normally in `pending`).
    async fn insert(&self, record: &T) -> Result<()>;

    /// Fetch a record by id.
    async fn get(&self, id: Uuid) -> Result<Option<T>>;

    /// Persist every mutable field of an existing record.
    async fn update(&self, record: &T) -> Result<()>;

    /// Delete a record. Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

pub type TranscriptRepository = dyn ContentRepository<Transcript>;
pub type SummaryRepository = dyn ContentRepository<Summary>;
pub type AudioRepository = dyn ContentRepository<AudioTranscription>;
pub type PdfRepository = dyn ContentRepository<PdfExtraction>;

/// Storage for batch aggregates.
#[async_trait]
pub trait BatchRepository: Send + Sync {
    async fn insert(&self, batch: &Batch) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Batch>>;

    /// Member transcripts of a batch, oldest first.
    async fn members(&self, id: Uuid) -> Result<Vec<Transcript>>;

    /// Recompute the aggregate by rescanning every member record.
    ///
    /// Implementations serialise concurrent recounts of the same batch so
    /// that `became_terminal` is reported by exactly one caller.
    async fn recount(&self, id: Uuid) -> Result<BatchRecount>;
}

/// Webhook registrations and their delivery audit trail.
#[async_trait]
pub trait WebhookRepository: Send + Sync {
    async fn insert(&self, webhook: &Webhook) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Webhook>>;

    async fn list(&self) -> Result<Vec<Webhook>>;

    async fn update(&self, webhook: &Webhook) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Active webhooks subscribed to `event` (an empty subscription matches all).
    async fn list_for_event(&self, event: &str) -> Result<Vec<Webhook>>;

    async fn insert_delivery(&self, delivery: &WebhookDelivery) -> Result<()>;

    async fn update_delivery(&self, delivery: &WebhookDelivery) -> Result<()>;

    async fn get_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>>;

    /// Most recent deliveries for a webhook, newest first.
    async fn list_deliveries(&self, webhook_id: Uuid, limit: i64)
        -> Result<Vec<WebhookDelivery>>;
}

/// Bundle of every repository, shared by the API, handlers and notifier.
#[derive(Clone)]
pub struct Repositories {
    pub transcripts: Arc<TranscriptRepository>,
    pub summaries: Arc<SummaryRepository>,
    pub audio: Arc<AudioRepository>,
    pub pdfs: Arc<PdfRepository>,
    pub batches: Arc<dyn BatchRepository>,
    pub webhooks: Arc<dyn WebhookRepository>,
}
