//! Transcript repository.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use scribe_core::{ContentRepository, Error, Result, Transcript};

use crate::records::{parse_opt, parse_state, STATE_COLUMNS};

/// PostgreSQL transcript repository.
pub struct PgTranscriptRepository {
    pool: Pool<Postgres>,
}

impl PgTranscriptRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub(crate) fn select_sql(filter: &str) -> String {
        format!(
            "SELECT id, source_url, video_id, title, channel, duration_secs, language,
                    content, word_count, method, batch_id, {STATE_COLUMNS}
             FROM transcript {filter}"
        )
    }

    pub(crate) fn parse_row(r: &sqlx::postgres::PgRow) -> Result<Transcript> {
        Ok(Transcript {
            id: r.try_get("id")?,
            source_url: r.try_get("source_url")?,
            video_id: r.try_get("video_id")?,
            title: r.try_get("title")?,
            channel: r.try_get("channel")?,
            duration_secs: r.try_get("duration_secs")?,
            language: r.try_get("language")?,
            content: r.try_get("content")?,
            word_count: r.try_get("word_count")?,
            method: parse_opt(r, "method")?,
            batch_id: r.try_get("batch_id")?,
            state: parse_state(r)?,
        })
    }
}

#[async_trait]
impl ContentRepository<Transcript> for PgTranscriptRepository {
    async fn insert(&self, t: &Transcript) -> Result<()> {
        sqlx::query(
            "INSERT INTO transcript (id, source_url, video_id, title, channel, duration_secs,
                                     language, content, word_count, method, batch_id,
                                     status, error_message, created_at, updated_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(t.id)
        .bind(&t.source_url)
        .bind(&t.video_id)
        .bind(&t.title)
        .bind(&t.channel)
        .bind(t.duration_secs)
        .bind(&t.language)
        .bind(&t.content)
        .bind(t.word_count)
        .bind(t.method.map(|m| m.as_str()))
        .bind(t.batch_id)
        .bind(t.state.status.as_str())
        .bind(&t.state.error_message)
        .bind(t.state.created_at)
        .bind(t.state.updated_at)
        .bind(t.state.completed_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Transcript>> {
        let row = sqlx::query(&Self::select_sql("WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn update(&self, t: &Transcript) -> Result<()> {
        let result = sqlx::query(
            "UPDATE transcript SET
                video_id = $2, title = $3, channel = $4, duration_secs = $5, language = $6,
                content = $7, word_count = $8, method = $9,
                status = $10, error_message = $11, updated_at = $12, completed_at = $13
             WHERE id = $1",
        )
        .bind(t.id)
        .bind(&t.video_id)
        .bind(&t.title)
        .bind(&t.channel)
        .bind(t.duration_secs)
        .bind(&t.language)
        .bind(&t.content)
        .bind(t.word_count)
        .bind(t.method.map(|m| m.as_str()))
        .bind(t.state.status.as_str())
        .bind(&t.state.error_message)
        .bind(t.state.updated_at)
        .bind(t.state.completed_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("transcript {}", t.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transcript WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
