//! PDF extraction repository.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use scribe_core::{ContentRepository, Error, PdfExtraction, Result};

use crate::records::{parse_state, STATE_COLUMNS};

/// PostgreSQL PDF extraction repository.
pub struct PgPdfRepository {
    pool: Pool<Postgres>,
}

impl PgPdfRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn select_sql(filter: &str) -> String {
        format!(
            "SELECT id, filename, file_path, size_bytes, page_count, title, content,
                    word_count, {STATE_COLUMNS}
             FROM pdf_extraction {filter}"
        )
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Result<PdfExtraction> {
        Ok(PdfExtraction {
            id: r.try_get("id")?,
            filename: r.try_get("filename")?,
            file_path: r.try_get("file_path")?,
            size_bytes: r.try_get("size_bytes")?,
            page_count: r.try_get("page_count")?,
            title: r.try_get("title")?,
            content: r.try_get("content")?,
            word_count: r.try_get("word_count")?,
            state: parse_state(r)?,
        })
    }
}

#[async_trait]
impl ContentRepository<PdfExtraction> for PgPdfRepository {
    async fn insert(&self, p: &PdfExtraction) -> Result<()> {
        sqlx::query(
            "INSERT INTO pdf_extraction (id, filename, file_path, size_bytes, page_count, title,
                                         content, word_count, status, error_message,
                                         created_at, updated_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(p.id)
        .bind(&p.filename)
        .bind(&p.file_path)
        .bind(p.size_bytes)
        .bind(p.page_count)
        .bind(&p.title)
        .bind(&p.content)
        .bind(p.word_count)
        .bind(p.state.status.as_str())
        .bind(&p.state.error_message)
        .bind(p.state.created_at)
        .bind(p.state.updated_at)
        .bind(p.state.completed_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<PdfExtraction>> {
        let row = sqlx::query(&Self::select_sql("WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn update(&self, p: &PdfExtraction) -> Result<()> {
        let result = sqlx::query(
            "UPDATE pdf_extraction SET
                page_count = $2, title = $3, content = $4, word_count = $5,
                status = $6, error_message = $7, updated_at = $8, completed_at = $9
             WHERE id = $1",
        )
        .bind(p.id)
        .bind(p.page_count)
        .bind(&p.title)
        .bind(&p.content)
        .bind(p.word_count)
        .bind(p.state.status.as_str())
        .bind(&p.state.error_message)
        .bind(p.state.updated_at)
        .bind(p.state.completed_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("pdf extraction {}", p.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pdf_extraction WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
