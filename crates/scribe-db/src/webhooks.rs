//! Webhook registrations and delivery audit rows.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use scribe_core::{Error, Result, Webhook, WebhookDelivery, WebhookRepository};

/// PostgreSQL webhook repository.
pub struct PgWebhookRepository {
    pool: Pool<Postgres>,
}

const WEBHOOK_COLUMNS: &str = "id, url, events, secret, active, created_at, updated_at";

const DELIVERY_COLUMNS: &str = "id, webhook_id, event, payload, status, attempts, last_error,
                                response_code, created_at, updated_at, delivered_at";

impl PgWebhookRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Result<Webhook> {
        Ok(Webhook {
            id: r.try_get("id")?,
            url: r.try_get("url")?,
            events: r.try_get("events")?,
            secret: r.try_get("secret")?,
            active: r.try_get("active")?,
            created_at: r.try_get("created_at")?,
            updated_at: r.try_get("updated_at")?,
        })
    }

    fn parse_delivery(r: &sqlx::postgres::PgRow) -> Result<WebhookDelivery> {
        let status: String = r.try_get("status")?;
        Ok(WebhookDelivery {
            id: r.try_get("id")?,
            webhook_id: r.try_get("webhook_id")?,
            event: r.try_get("event")?,
            payload: r.try_get("payload")?,
            status: status.parse()?,
            attempts: r.try_get("attempts")?,
            last_error: r.try_get("last_error")?,
            response_code: r.try_get("response_code")?,
            created_at: r.try_get("created_at")?,
            updated_at: r.try_get("updated_at")?,
            delivered_at: r.try_get("delivered_at")?,
        })
    }
}

#[async_trait]
impl WebhookRepository for PgWebhookRepository {
    async fn insert(&self, w: &Webhook) -> Result<()> {
        sqlx::query(
            "INSERT INTO webhook (id, url, events, secret, active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(w.id)
        .bind(&w.url)
        .bind(&w.events)
        .bind(&w.secret)
        .bind(w.active)
        .bind(w.created_at)
        .bind(w.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Webhook>> {
        let row = sqlx::query(&format!("SELECT {WEBHOOK_COLUMNS} FROM webhook WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Webhook>> {
        let rows = sqlx::query(&format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhook ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn update(&self, w: &Webhook) -> Result<()> {
        let result = sqlx::query(
            "UPDATE webhook SET url = $2, events = $3, secret = $4, active = $5, updated_at = $6
             WHERE id = $1",
        )
        .bind(w.id)
        .bind(&w.url)
        .bind(&w.events)
        .bind(&w.secret)
        .bind(w.active)
        .bind(w.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("webhook {}", w.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM webhook WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_for_event(&self, event: &str) -> Result<Vec<Webhook>> {
        let rows = sqlx::query(&format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhook
             WHERE active = true AND ($1 = ANY(events) OR events = '{{}}')
             ORDER BY created_at ASC"
        ))
        .bind(event)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn insert_delivery(&self, d: &WebhookDelivery) -> Result<()> {
        sqlx::query(
            "INSERT INTO webhook_delivery (id, webhook_id, event, payload, status, attempts,
                                           last_error, response_code, created_at, updated_at,
                                           delivered_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(d.id)
        .bind(d.webhook_id)
        .bind(&d.event)
        .bind(&d.payload)
        .bind(d.status.as_str())
        .bind(d.attempts)
        .bind(&d.last_error)
        .bind(d.response_code)
        .bind(d.created_at)
        .bind(d.updated_at)
        .bind(d.delivered_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn update_delivery(&self, d: &WebhookDelivery) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_delivery SET status = $2, attempts = $3, last_error = $4,
                                         response_code = $5, updated_at = $6, delivered_at = $7
             WHERE id = $1",
        )
        .bind(d.id)
        .bind(d.status.as_str())
        .bind(d.attempts)
        .bind(&d.last_error)
        .bind(d.response_code)
        .bind(d.updated_at)
        .bind(d.delivered_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>> {
        let row = sqlx::query(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_delivery WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_delivery).transpose()
    }

    async fn list_deliveries(&self, webhook_id: Uuid, limit: i64) -> Result<Vec<WebhookDelivery>> {
        let rows = sqlx::query(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_delivery
             WHERE webhook_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2"
        ))
        .bind(webhook_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_delivery).collect()
    }
}
