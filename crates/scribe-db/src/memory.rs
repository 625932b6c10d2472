//! In-memory storage implementing every repository trait.
//!
//! Used by tests and by `STORAGE=memory` runs. Data is lost on restart.
//! One lock guards every table so a batch recount sees a consistent view of
//! all member records.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use scribe_core::{
    AudioTranscription, Batch, BatchCounts, BatchRecount, BatchRepository, ContentRecord,
    ContentRepository, Error, PdfExtraction, Repositories, Result, Summary, Transcript, Webhook,
    WebhookDelivery, WebhookRepository,
};

#[derive(Default)]
struct Tables {
    transcripts: HashMap<Uuid, Transcript>,
    summaries: HashMap<Uuid, Summary>,
    audio: HashMap<Uuid, AudioTranscription>,
    pdfs: HashMap<Uuid, PdfExtraction>,
    batches: HashMap<Uuid, Batch>,
    webhooks: HashMap<Uuid, Webhook>,
    deliveries: HashMap<Uuid, WebhookDelivery>,
}

impl Tables {
    fn batch_counts(&self, batch_id: Uuid) -> BatchCounts {
        let mut counts = BatchCounts::default();
        for t in self.transcripts.values() {
            if t.batch_id == Some(batch_id) {
                counts.add(t.status(), 1);
            }
        }
        counts
    }
}

/// Maps a record type to its table.
trait Table: ContentRecord {
    fn table(tables: &mut Tables) -> &mut HashMap<Uuid, Self>;
}

impl Table for Transcript {
    fn table(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
        &mut tables.transcripts
    }
}

impl Table for Summary {
    fn table(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
        &mut tables.summaries
    }
}

impl Table for AudioTranscription {
    fn table(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
        &mut tables.audio
    }
}

impl Table for PdfExtraction {
    fn table(tables: &mut Tables) -> &mut HashMap<Uuid, Self> {
        &mut tables.pdfs
    }
}

/// Shared in-memory store. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository bundle backed by this store.
    pub fn repositories(&self) -> Repositories {
        Repositories {
            transcripts: Arc::new(self.clone()),
            summaries: Arc::new(self.clone()),
            audio: Arc::new(self.clone()),
            pdfs: Arc::new(self.clone()),
            batches: Arc::new(self.clone()),
            webhooks: Arc::new(self.clone()),
        }
    }

    /// Number of delivery rows stored across all webhooks.
    pub async fn delivery_count(&self) -> usize {
        self.tables.lock().await.deliveries.len()
    }

    /// Number of content records of every kind.
    pub async fn record_count(&self) -> usize {
        let tables = self.tables.lock().await;
        tables.transcripts.len() + tables.summaries.len() + tables.audio.len() + tables.pdfs.len()
    }
}

#[async_trait]
impl<T: Table> ContentRepository<T> for MemoryStore {
    async fn insert(&self, record: &T) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let table = T::table(&mut tables);
        if table.contains_key(&record.id()) {
            return Err(Error::InvalidInput(format!(
                "{} {} already exists",
                T::KIND,
                record.id()
            )));
        }
        table.insert(record.id(), record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<T>> {
        let mut tables = self.tables.lock().await;
        Ok(T::table(&mut tables).get(&id).cloned())
    }

    async fn update(&self, record: &T) -> Result<()> {
        let mut tables = self.tables.lock().await;
        match T::table(&mut tables).get_mut(&record.id()) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!("{} {}", T::KIND, record.id()))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        Ok(T::table(&mut tables).remove(&id).is_some())
    }
}

#[async_trait]
impl BatchRepository for MemoryStore {
    async fn insert(&self, batch: &Batch) -> Result<()> {
        self.tables
            .lock()
            .await
            .batches
            .insert(batch.id, batch.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Batch>> {
        Ok(self.tables.lock().await.batches.get(&id).cloned())
    }

    async fn members(&self, id: Uuid) -> Result<Vec<Transcript>> {
        let tables = self.tables.lock().await;
        let mut members: Vec<Transcript> = tables
            .transcripts
            .values()
            .filter(|t| t.batch_id == Some(id))
            .cloned()
            .collect();
        members.sort_by_key(|t| (t.state.created_at, t.id));
        Ok(members)
    }

    async fn recount(&self, id: Uuid) -> Result<BatchRecount> {
        let mut tables = self.tables.lock().await;
        let counts = tables.batch_counts(id);
        let batch = tables
            .batches
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("batch {id}")))?;
        let became_terminal = batch.apply_counts(&counts);
        Ok(BatchRecount {
            batch: batch.clone(),
            became_terminal,
        })
    }
}

#[async_trait]
impl WebhookRepository for MemoryStore {
    async fn insert(&self, webhook: &Webhook) -> Result<()> {
        self.tables
            .lock()
            .await
            .webhooks
            .insert(webhook.id, webhook.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Webhook>> {
        Ok(self.tables.lock().await.webhooks.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Webhook>> {
        let tables = self.tables.lock().await;
        let mut hooks: Vec<Webhook> = tables.webhooks.values().cloned().collect();
        hooks.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(hooks)
    }

    async fn update(&self, webhook: &Webhook) -> Result<()> {
        let mut tables = self.tables.lock().await;
        match tables.webhooks.get_mut(&webhook.id) {
            Some(existing) => {
                *existing = webhook.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!("webhook {}", webhook.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let removed = tables.webhooks.remove(&id).is_some();
        if removed {
            tables.deliveries.retain(|_, d| d.webhook_id != id);
        }
        Ok(removed)
    }

    async fn list_for_event(&self, event: &str) -> Result<Vec<Webhook>> {
        let tables = self.tables.lock().await;
        let mut hooks: Vec<Webhook> = tables
            .webhooks
            .values()
            .filter(|w| w.active && w.subscribes_to(event))
            .cloned()
            .collect();
        hooks.sort_by_key(|w| (w.created_at, w.id));
        Ok(hooks)
    }

    async fn insert_delivery(&self, delivery: &WebhookDelivery) -> Result<()> {
        self.tables
            .lock()
            .await
            .deliveries
            .insert(delivery.id, delivery.clone());
        Ok(())
    }

    async fn update_delivery(&self, delivery: &WebhookDelivery) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.deliveries.get_mut(&delivery.id) {
            *existing = delivery.clone();
        }
        Ok(())
    }

    async fn get_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>> {
        Ok(self.tables.lock().await.deliveries.get(&id).cloned())
    }

    async fn list_deliveries(&self, webhook_id: Uuid, limit: i64) -> Result<Vec<WebhookDelivery>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<WebhookDelivery> = tables
            .deliveries
            .values()
            .filter(|d| d.webhook_id == webhook_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}
