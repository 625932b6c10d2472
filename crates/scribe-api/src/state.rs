use std::path::PathBuf;

use scribe_core::Repositories;
use scribe_jobs::{JobQueue, WebhookNotifier};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub queue: JobQueue,
    /// Webhook fan-out for events raised by the HTTP layer itself.
    pub notifier: WebhookNotifier,
    pub uploads: UploadSettings,
    pub worker_count: usize,
    /// `false` when no summarizer backend is configured.
    pub summaries_enabled: bool,
}

/// Where uploads are staged and how large they may be.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub dir: PathBuf,
    pub max_bytes: usize,
}
