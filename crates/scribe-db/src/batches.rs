//! Batch repository.
//!
//! Aggregates are never patched incrementally. `recount` locks the batch row,
//! rescans its member transcripts and rewrites the counts, so concurrent member
//! completions cannot lose updates and only one of them sees the batch turn
//! terminal.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use scribe_core::{
    Batch, BatchCounts, BatchRecount, BatchRepository, ContentStatus, Error, Result, Transcript,
};

use crate::transcripts::PgTranscriptRepository;

/// PostgreSQL batch repository.
pub struct PgBatchRepository {
    pool: Pool<Postgres>,
}

const SELECT_BATCH: &str = "SELECT id, total_count, completed_count, failed_count, status,
                                   created_at, updated_at, completed_at
                            FROM batch WHERE id = $1";

const COUNT_MEMBERS: &str = "SELECT status, COUNT(*)::INT AS n
                             FROM transcript WHERE batch_id = $1
                             GROUP BY status";

impl PgBatchRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Result<Batch> {
        let status: String = r.try_get("status")?;
        Ok(Batch {
            id: r.try_get("id")?,
            total_count: r.try_get("total_count")?,
            completed_count: r.try_get("completed_count")?,
            failed_count: r.try_get("failed_count")?,
            status: status.parse()?,
            created_at: r.try_get("created_at")?,
            updated_at: r.try_get("updated_at")?,
            completed_at: r.try_get("completed_at")?,
        })
    }
}

#[async_trait]
impl BatchRepository for PgBatchRepository {
    async fn insert(&self, b: &Batch) -> Result<()> {
        sqlx::query(
            "INSERT INTO batch (id, total_count, completed_count, failed_count, status,
                                created_at, updated_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(b.id)
        .bind(b.total_count)
        .bind(b.completed_count)
        .bind(b.failed_count)
        .bind(b.status.as_str())
        .bind(b.created_at)
        .bind(b.updated_at)
        .bind(b.completed_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Batch>> {
        let row = sqlx::query(SELECT_BATCH)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn members(&self, id: Uuid) -> Result<Vec<Transcript>> {
        let rows = sqlx::query(&PgTranscriptRepository::select_sql(
            "WHERE batch_id = $1 ORDER BY created_at ASC, id ASC",
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(PgTranscriptRepository::parse_row).collect()
    }

    async fn recount(&self, id: Uuid) -> Result<BatchRecount> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(&format!("{SELECT_BATCH} FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("batch {id}")))?;
        let mut batch = Self::parse_row(&row)?;

        let rows = sqlx::query(COUNT_MEMBERS)
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let mut counts = BatchCounts::default();
        for r in &rows {
            let status: String = r.try_get("status")?;
            let n: i32 = r.try_get("n")?;
            counts.add(status.parse::<ContentStatus>()?, n);
        }

        let became_terminal = batch.apply_counts(&counts);

        sqlx::query(
            "UPDATE batch SET total_count = $2, completed_count = $3, failed_count = $4,
                              status = $5, updated_at = $6, completed_at = $7
             WHERE id = $1",
        )
        .bind(batch.id)
        .bind(batch.total_count)
        .bind(batch.completed_count)
        .bind(batch.failed_count)
        .bind(batch.status.as_str())
        .bind(batch.updated_at)
        .bind(batch.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "batches",
            op = "recount",
            batch_id = %id,
            completed = batch.completed_count,
            failed = batch.failed_count,
            total = batch.total_count,
            became_terminal,
            "Batch recounted"
        );

        Ok(BatchRecount {
            batch,
            became_terminal,
        })
    }
}
