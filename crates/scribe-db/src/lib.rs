//! # scribe-db
//!
//! Storage layer for scribe.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL repositories for content records, batches and webhooks
//! - Race-free batch recounts under a row lock
//! - An in-memory store implementing the same traits
//!
//! ## Example
//!
//! ```rust,ignore
//! use scribe_db::Database;
//!
//! let db = Database::connect("postgres://localhost/scribe").await?;
//! let repos = db.repositories();
//! let transcript = repos.transcripts.get(id).await?;
//! ```

pub mod audio;
pub mod batches;
pub mod memory;
pub mod pdfs;
pub mod pool;
mod records;
pub mod summaries;
pub mod transcripts;
pub mod webhooks;

// Note: always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use scribe_core::*;

pub use audio::PgAudioRepository;
pub use batches::PgBatchRepository;
pub use memory::MemoryStore;
pub use pdfs::PgPdfRepository;
pub use pool::{log_pool_metrics, PoolConfig};
pub use summaries::PgSummaryRepository;
pub use transcripts::PgTranscriptRepository;
pub use webhooks::PgWebhookRepository;

use pool::create_pool;
use std::sync::Arc;

/// Combined database context.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self { pool }
    }

    /// Connect with a pool sized for the default worker count.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, &PoolConfig::default()).await
    }

    /// Connect with explicit pool sizing.
    pub async fn connect_with_config(url: &str, config: &PoolConfig) -> Result<Self> {
        let pool = create_pool(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// PostgreSQL-backed repository bundle sharing this pool.
    pub fn repositories(&self) -> Repositories {
        Repositories {
            transcripts: Arc::new(PgTranscriptRepository::new(self.pool.clone())),
            summaries: Arc::new(PgSummaryRepository::new(self.pool.clone())),
            audio: Arc::new(PgAudioRepository::new(self.pool.clone())),
            pdfs: Arc::new(PgPdfRepository::new(self.pool.clone())),
            batches: Arc::new(PgBatchRepository::new(self.pool.clone())),
            webhooks: Arc::new(PgWebhookRepository::new(self.pool.clone())),
        }
    }
}
