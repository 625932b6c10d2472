//! Job handler contract.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use scribe_core::{Job, JobKind};

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
    cancel: CancellationToken,
}

impl JobContext {
    pub fn new(job: Job, cancel: CancellationToken) -> Self {
        Self { job, cancel }
    }

    /// Id of the content record this job advances.
    pub fn record_id(&self) -> Uuid {
        self.job.id
    }

    pub fn payload(&self) -> &JsonValue {
        &self.job.payload
    }

    /// True once pool shutdown has begun.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Result of job execution.
///
/// Handlers absorb their own failures: by the time a result is returned the
/// owning record has already been persisted in its terminal state.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed with an error message.
    Failed(String),
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Success(_))
    }
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job kind this handler processes.
    fn job_kind(&self) -> JobKind;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;

    /// Check if this handler can process the given job kind.
    fn can_handle(&self, kind: JobKind) -> bool {
        self.job_kind() == kind
    }
}
