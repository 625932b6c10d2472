//! Test fixtures for database integration tests.
//!
//! The test database URL comes from `DATABASE_URL`, falling back to
//! [`DEFAULT_TEST_DATABASE_URL`]. Tests using these helpers expect the
//! schema in `migrations/` to be applied already.

use uuid::Uuid;

use scribe_core::{Batch, Result, Transcript, Webhook};

use crate::{Database, PoolConfig};

/// Default test database URL when DATABASE_URL is not set.
///
/// Uses port 15432 to avoid conflicts with a developer's main database.
pub const DEFAULT_TEST_DATABASE_URL: &str = scribe_core::defaults::TEST_DATABASE_URL;

/// Resolve the test database URL.
pub fn test_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_TEST_DATABASE_URL.to_string())
}

/// Connect a small pool to the test database.
pub async fn connect_test_database() -> Result<Database> {
    Database::connect_with_config(
        &test_database_url(),
        &PoolConfig::for_workers(1).with_max_connections(5),
    )
    .await
}

/// A pending transcript with a unique URL.
pub fn sample_transcript(batch_id: Option<Uuid>) -> Transcript {
    Transcript::new(
        format!("https://www.youtube.com/watch?v=test-{}", Uuid::new_v4()),
        batch_id,
    )
}

/// A batch sized for `members` transcripts.
pub fn sample_batch(members: i32) -> Batch {
    Batch::new(members)
}

/// An active webhook pointing at a unique example URL.
pub fn sample_webhook(events: Vec<String>, secret: Option<&str>) -> Webhook {
    Webhook::new(
        format!("https://hook-{}.example.com/scribe", Uuid::new_v4()),
        events,
        secret.map(str::to_string),
    )
}
