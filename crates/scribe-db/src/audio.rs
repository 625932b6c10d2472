//! Audio transcription repository.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use scribe_core::{AudioTranscription, ContentRepository, Error, Result};

use crate::records::{parse_state, STATE_COLUMNS};

/// PostgreSQL audio transcription repository.
pub struct PgAudioRepository {
    pool: Pool<Postgres>,
}

impl PgAudioRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn select_sql(filter: &str) -> String {
        format!(
            "SELECT id, filename, mime_type, file_path, size_bytes, language_hint, content,
                    language, duration_secs, word_count, model, {STATE_COLUMNS}
             FROM audio_transcription {filter}"
        )
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Result<AudioTranscription> {
        Ok(AudioTranscription {
            id: r.try_get("id")?,
            filename: r.try_get("filename")?,
            mime_type: r.try_get("mime_type")?,
            file_path: r.try_get("file_path")?,
            size_bytes: r.try_get("size_bytes")?,
            language_hint: r.try_get("language_hint")?,
            content: r.try_get("content")?,
            language: r.try_get("language")?,
            duration_secs: r.try_get("duration_secs")?,
            word_count: r.try_get("word_count")?,
            model: r.try_get("model")?,
            state: parse_state(r)?,
        })
    }
}

#[async_trait]
impl ContentRepository<AudioTranscription> for PgAudioRepository {
    async fn insert(&self, a: &AudioTranscription) -> Result<()> {
        sqlx::query(
            "INSERT INTO audio_transcription (id, filename, mime_type, file_path, size_bytes,
                                              language_hint, content, language, duration_secs,
                                              word_count, model, status, error_message,
                                              created_at, updated_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(a.id)
        .bind(&a.filename)
        .bind(&a.mime_type)
        .bind(&a.file_path)
        .bind(a.size_bytes)
        .bind(&a.language_hint)
        .bind(&a.content)
        .bind(&a.language)
        .bind(a.duration_secs)
        .bind(a.word_count)
        .bind(&a.model)
        .bind(a.state.status.as_str())
        .bind(&a.state.error_message)
        .bind(a.state.created_at)
        .bind(a.state.updated_at)
        .bind(a.state.completed_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<AudioTranscription>> {
        let row = sqlx::query(&Self::select_sql("WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn update(&self, a: &AudioTranscription) -> Result<()> {
        let result = sqlx::query(
            "UPDATE audio_transcription SET
                content = $2, language = $3, duration_secs = $4, word_count = $5, model = $6,
                status = $7, error_message = $8, updated_at = $9, completed_at = $10
             WHERE id = $1",
        )
        .bind(a.id)
        .bind(&a.content)
        .bind(&a.language)
        .bind(a.duration_secs)
        .bind(a.word_count)
        .bind(&a.model)
        .bind(a.state.status.as_str())
        .bind(&a.state.error_message)
        .bind(a.state.updated_at)
        .bind(a.state.completed_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("audio transcription {}", a.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM audio_transcription WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
