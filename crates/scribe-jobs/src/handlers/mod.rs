//! Job handlers, one per job kind.
//!
//! Every handler follows the same shape: load the owning record, move it to
//! `processing`, call a collaborator, then persist the terminal state, raise
//! the matching webhook event and recount the record's batch.

mod extraction;
mod summarization;
mod transcription;

pub use extraction::ExtractionHandler;
pub use summarization::SummarizationHandler;
pub use transcription::TranscriptionHandler;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use scribe_core::{
    ContentRecord, ContentRepository, Error, Repositories, Result, WebhookEvent,
};

use crate::handler::JobResult;
use crate::webhooks::EventSink;

/// Reason recorded on records whose job was picked up after shutdown began.
pub const SHUTDOWN_REASON: &str = "cancelled: server is shutting down";

/// Shared dependencies of every handler.
#[derive(Clone)]
pub struct HandlerEnv {
    pub repos: Repositories,
    pub events: Arc<dyn EventSink>,
}

impl HandlerEnv {
    pub fn new(repos: Repositories, events: Arc<dyn EventSink>) -> Self {
        Self { repos, events }
    }

    /// Fail a pending record whose job never ran, e.g. one rejected by a full
    /// queue. Raises the failed event and recounts the batch like a worker would.
    pub async fn fail_unstarted<T: ContentRecord>(
        &self,
        repo: &dyn ContentRepository<T>,
        mut record: T,
        reason: impl Into<String>,
    ) -> Result<()> {
        record.state_mut().begin_processing()?;
        repo.update(&record).await?;
        settle(self, repo, record, Err(reason.into())).await;
        Ok(())
    }

    /// Recount a batch and raise `batch.completed` if this recount finished it.
    async fn recount_batch(&self, batch_id: Uuid) {
        match self.repos.batches.recount(batch_id).await {
            Ok(recount) => {
                if recount.became_terminal {
                    info!(
                        subsystem = "jobs",
                        component = "handler",
                        %batch_id,
                        completed = recount.batch.completed_count,
                        failed = recount.batch.failed_count,
                        "Batch finished"
                    );
                    self.events
                        .notify(WebhookEvent::BatchCompleted, recount.batch.event_data());
                }
            }
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "handler",
                    %batch_id,
                    error = %e,
                    "Batch recount failed"
                );
            }
        }
    }
}

/// Load a record by id.
async fn load<T: ContentRecord>(repo: &dyn ContentRepository<T>, id: Uuid) -> Result<T> {
    repo.get(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", T::KIND, id)))
}

/// Move a loaded record to `processing` and persist it.
async fn mark_processing<T: ContentRecord>(
    repo: &dyn ContentRepository<T>,
    record: &mut T,
) -> Result<()> {
    record.state_mut().begin_processing()?;
    repo.update(record).await
}

/// Persist the terminal state, raise the event and recount the batch.
///
/// `outcome` is `Ok` when the caller has already filled in result fields.
async fn settle<T: ContentRecord>(
    env: &HandlerEnv,
    repo: &dyn ContentRepository<T>,
    mut record: T,
    outcome: std::result::Result<(), String>,
) -> JobResult {
    let id = record.id();
    let (transition, event, result) = match outcome {
        Ok(()) => (
            record.state_mut().complete(),
            T::KIND.completed_event(),
            JobResult::Success(Some(json!({ "id": id }))),
        ),
        Err(message) => (
            record.state_mut().fail(message.clone()),
            T::KIND.failed_event(),
            JobResult::Failed(message),
        ),
    };

    if let Err(e) = transition {
        error!(subsystem = "jobs", component = "handler", %id, error = %e, "Invalid record transition");
        return JobResult::Failed(e.to_string());
    }
    if let Err(e) = repo.update(&record).await {
        error!(
            subsystem = "jobs",
            component = "handler",
            %id,
            kind = %T::KIND,
            error = %e,
            "Failed to persist record outcome"
        );
        return JobResult::Failed(format!("failed to persist outcome: {}", e));
    }

    env.events.notify(event, record.event_data());
    if let Some(batch_id) = record.batch_id() {
        env.recount_batch(batch_id).await;
    }
    result
}

/// Log and report a job whose record could not be started.
fn not_started(kind: &str, id: Uuid, e: Error) -> JobResult {
    warn!(subsystem = "jobs", component = "handler", %id, kind, error = %e, "Could not start job");
    JobResult::Failed(e.to_string())
}

fn clamp_count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// A staged upload removed when the guard drops.
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                subsystem = "jobs",
                component = "handler",
                path = %self.path.display(),
                error = %e,
                "Failed to remove staged upload"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, b"data").unwrap();
        {
            let staged = StagedFile::new(&path);
            assert!(staged.path().exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_staged_file_missing_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        drop(StagedFile::new(dir.path().join("never-written")));
    }

    #[test]
    fn test_clamp_count() {
        assert_eq!(clamp_count(12), 12);
        assert_eq!(clamp_count(usize::MAX), i32::MAX);
    }
}
