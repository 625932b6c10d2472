//! HTTP handlers.
//!
//! Submission endpoints create a pending record, then enqueue its job. If the
//! queue refuses the job the record is deleted again and the caller gets 503.

pub mod batches;
pub mod health;
pub mod summaries;
pub mod transcripts;
pub mod uploads;
pub mod webhooks;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use scribe_core::{ContentRecord, ContentRepository, ContentStatus, Job};

use crate::{ApiError, AppState};

/// Body of every 202 response.
#[derive(Debug, Serialize)]
pub struct Accepted {
    pub id: Uuid,
    pub status: ContentStatus,
}

impl Accepted {
    pub fn pending(id: Uuid) -> Self {
        Self {
            id,
            status: ContentStatus::Pending,
        }
    }
}

/// Reject anything that is not an absolute http(s) URL.
pub(crate) fn require_http_url(url: &str) -> Result<(), ApiError> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !url.contains(char::is_whitespace) => Ok(()),
        _ => Err(ApiError::BadRequest(format!(
            "invalid URL '{}': expected http(s)://...",
            url
        ))),
    }
}

/// Submit `job`, deleting the record it belongs to when the queue refuses it.
pub(crate) async fn enqueue<T: ContentRecord>(
    state: &AppState,
    repo: &dyn ContentRepository<T>,
    job: Job,
) -> Result<(), ApiError> {
    let record_id = job.id;
    if let Err(e) = state.queue.submit(job) {
        warn!(
            subsystem = "api",
            component = "submit",
            %record_id,
            kind = %T::KIND,
            error = %e,
            "Job rejected, removing pending record"
        );
        if let Err(del) = repo.delete(record_id).await {
            warn!(subsystem = "api", %record_id, error = %del, "Failed to remove orphaned record");
        }
        return Err(e.into());
    }
    Ok(())
}

pub(crate) fn not_found(what: &str, id: Uuid) -> ApiError {
    ApiError::NotFound(format!("{} {} not found", what, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_http_url() {
        assert!(require_http_url("https://www.youtube.com/watch?v=abc").is_ok());
        assert!(require_http_url("http://example.com/a.mp4").is_ok());
        assert!(require_http_url("ftp://example.com").is_err());
        assert!(require_http_url("https://").is_err());
        assert!(require_http_url("https://exa mple.com").is_err());
        assert!(require_http_url("").is_err());
    }
}
