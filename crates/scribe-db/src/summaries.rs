//! Summary repository.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use scribe_core::{ContentRepository, Error, Result, Summary};

use crate::records::{parse_state, STATE_COLUMNS};

/// PostgreSQL summary repository.
pub struct PgSummaryRepository {
    pool: Pool<Postgres>,
}

impl PgSummaryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn select_sql(filter: &str) -> String {
        format!(
            "SELECT id, transcript_id, style, max_key_points, content, key_points, model,
                    {STATE_COLUMNS}
             FROM summary {filter}"
        )
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Result<Summary> {
        let style: String = r.try_get("style")?;
        Ok(Summary {
            id: r.try_get("id")?,
            transcript_id: r.try_get("transcript_id")?,
            style: style.parse()?,
            max_key_points: r.try_get("max_key_points")?,
            content: r.try_get("content")?,
            key_points: r.try_get("key_points")?,
            model: r.try_get("model")?,
            state: parse_state(r)?,
        })
    }
}

#[async_trait]
impl ContentRepository<Summary> for PgSummaryRepository {
    async fn insert(&self, s: &Summary) -> Result<()> {
        sqlx::query(
            "INSERT INTO summary (id, transcript_id, style, max_key_points, content, key_points,
                                  model, status, error_message, created_at, updated_at,
                                  completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(s.id)
        .bind(s.transcript_id)
        .bind(s.style.as_str())
        .bind(s.max_key_points)
        .bind(&s.content)
        .bind(&s.key_points)
        .bind(&s.model)
        .bind(s.state.status.as_str())
        .bind(&s.state.error_message)
        .bind(s.state.created_at)
        .bind(s.state.updated_at)
        .bind(s.state.completed_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Summary>> {
        let row = sqlx::query(&Self::select_sql("WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn update(&self, s: &Summary) -> Result<()> {
        let result = sqlx::query(
            "UPDATE summary SET
                content = $2, key_points = $3, model = $4,
                status = $5, error_message = $6, updated_at = $7, completed_at = $8
             WHERE id = $1",
        )
        .bind(s.id)
        .bind(&s.content)
        .bind(&s.key_points)
        .bind(&s.model)
        .bind(s.state.status.as_str())
        .bind(&s.state.error_message)
        .bind(s.state.updated_at)
        .bind(s.state.completed_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("summary {}", s.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM summary WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
