//! Worker pool draining the job queue.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_channel::Receiver;
use futures::FutureExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use scribe_core::{defaults, Job, JobKind};

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::queue::JobQueue;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent workers.
    pub worker_count: usize,
    /// Capacity of the job queue.
    pub queue_capacity: usize,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: defaults::WORKER_COUNT,
            queue_capacity: defaults::JOB_QUEUE_CAPACITY,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `WORKER_COUNT` | `4` | Number of concurrent workers |
    /// | `JOB_QUEUE_CAPACITY` | `100` | Jobs buffered before submissions are rejected |
    pub fn from_env() -> Self {
        let enabled = std::env::var("WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let worker_count = std::env::var("WORKER_COUNT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::WORKER_COUNT)
            .max(1);

        let queue_capacity = std::env::var("JOB_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::JOB_QUEUE_CAPACITY)
            .max(1);

        Self {
            worker_count,
            queue_capacity,
            enabled,
        }
    }

    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the worker pool.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A worker loop started.
    WorkerStarted { worker_id: usize },
    /// A worker loop exited.
    WorkerStopped { worker_id: usize },
    /// A job was picked up.
    JobStarted {
        job_id: Uuid,
        job_kind: JobKind,
        worker_id: usize,
    },
    /// A job completed successfully.
    JobCompleted {
        job_id: Uuid,
        job_kind: JobKind,
        duration_ms: u64,
    },
    /// A job failed (including handler panics).
    JobFailed {
        job_id: Uuid,
        job_kind: JobKind,
        error: String,
    },
    /// No handler was registered for the job's kind.
    JobDropped { job_id: Uuid, job_kind: JobKind },
}

type HandlerMap = HashMap<JobKind, Arc<dyn JobHandler>>;

/// Fixed-size set of workers consuming one [`JobQueue`].
///
/// Each worker runs one job at a time to completion. Shutdown is two-phase:
/// [`stop`](Self::stop) cancels the shared token, closes the queue to new
/// submissions, then waits for every worker to drain the buffer and exit.
pub struct WorkerPool {
    config: WorkerConfig,
    queue: JobQueue,
    handlers: Arc<HandlerMap>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    event_tx: broadcast::Sender<WorkerEvent>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl WorkerPool {
    /// Queue handle for submitters.
    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Shutdown token shared with running handlers.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.stopped.load(Ordering::SeqCst)
    }

    /// Launch every worker. Calling it again is a no-op.
    pub fn start(&self) {
        if !self.config.enabled {
            info!(subsystem = "jobs", component = "pool", "Worker pool is disabled, not starting");
            return;
        }
        if self.stopped.load(Ordering::SeqCst) || self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        for worker_id in 0..self.config.worker_count {
            let worker = Worker {
                id: worker_id,
                rx: self.queue.receiver(),
                handlers: self.handlers.clone(),
                cancel: self.cancel.clone(),
                event_tx: self.event_tx.clone(),
            };
            self.tracker.spawn(worker.run());
        }

        info!(
            subsystem = "jobs",
            component = "pool",
            worker_count = self.config.worker_count,
            queue_capacity = self.queue.capacity(),
            "Worker pool started"
        );
    }

    /// Two-phase graceful shutdown. Calling it again is a no-op.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(
            subsystem = "jobs",
            component = "pool",
            queue_depth = self.queue.size(),
            "Stopping worker pool"
        );

        self.cancel.cancel();
        self.queue.close();
        self.tracker.close();
        self.tracker.wait().await;

        info!(subsystem = "jobs", component = "pool", "Worker pool stopped");
    }
}

struct Worker {
    id: usize,
    rx: Receiver<Job>,
    handlers: Arc<HandlerMap>,
    cancel: CancellationToken,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl Worker {
    async fn run(self) {
        debug!(subsystem = "jobs", component = "worker", worker_id = self.id, "Worker started");
        let _ = self
            .event_tx
            .send(WorkerEvent::WorkerStarted { worker_id: self.id });

        // recv fails only once the queue is closed and empty
        while let Ok(job) = self.rx.recv().await {
            self.process(job).await;
        }

        let _ = self
            .event_tx
            .send(WorkerEvent::WorkerStopped { worker_id: self.id });
        debug!(subsystem = "jobs", component = "worker", worker_id = self.id, "Worker exited");
    }

    async fn process(&self, job: Job) {
        let start = Instant::now();
        let job_id = job.id;
        let job_kind = job.kind;

        let Some(handler) = self.handlers.get(&job_kind).cloned() else {
            warn!(
                subsystem = "jobs",
                component = "worker",
                worker_id = self.id,
                %job_id,
                %job_kind,
                "No handler registered for job kind, dropping job"
            );
            let _ = self
                .event_tx
                .send(WorkerEvent::JobDropped { job_id, job_kind });
            return;
        };

        info!(
            subsystem = "jobs",
            component = "worker",
            worker_id = self.id,
            %job_id,
            %job_kind,
            "Processing job"
        );
        let _ = self.event_tx.send(WorkerEvent::JobStarted {
            job_id,
            job_kind,
            worker_id: self.id,
        });

        let ctx = JobContext::new(job, self.cancel.clone());
        let result = match AssertUnwindSafe(handler.execute(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    subsystem = "jobs",
                    component = "worker",
                    worker_id = self.id,
                    %job_id,
                    %job_kind,
                    "Job handler panicked"
                );
                JobResult::Failed("job handler panicked".to_string())
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            JobResult::Success(_) => {
                info!(
                    subsystem = "jobs",
                    component = "worker",
                    worker_id = self.id,
                    %job_id,
                    %job_kind,
                    duration_ms,
                    "Job completed successfully"
                );
                let _ = self.event_tx.send(WorkerEvent::JobCompleted {
                    job_id,
                    job_kind,
                    duration_ms,
                });
            }
            JobResult::Failed(error) => {
                warn!(
                    subsystem = "jobs",
                    component = "worker",
                    worker_id = self.id,
                    %job_id,
                    %job_kind,
                    %error,
                    duration_ms,
                    "Job failed"
                );
                let _ = self.event_tx.send(WorkerEvent::JobFailed {
                    job_id,
                    job_kind,
                    error,
                });
            }
        }
    }
}

/// Builder for creating a worker pool with handlers.
pub struct WorkerBuilder {
    config: WorkerConfig,
    handlers: Vec<Arc<dyn JobHandler>>,
    queue: Option<JobQueue>,
    cancel: Option<CancellationToken>,
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerBuilder {
    pub fn new() -> Self {
        Self {
            config: WorkerConfig::default(),
            handlers: Vec::new(),
            queue: None,
            cancel: None,
        }
    }

    /// Set the worker configuration.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a handler. A later handler for the same kind replaces an earlier one.
    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Use an existing queue instead of creating one from the config.
    pub fn with_queue(mut self, queue: JobQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Share a shutdown token (e.g. with the webhook notifier).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Build the pool. Workers do not run until [`WorkerPool::start`].
    pub fn build(self) -> WorkerPool {
        let mut handlers: HandlerMap = HashMap::new();
        for handler in self.handlers {
            handlers.insert(handler.job_kind(), handler);
        }
        let (event_tx, _) = broadcast::channel(defaults::WORKER_EVENT_CAPACITY);
        let queue = self
            .queue
            .unwrap_or_else(|| JobQueue::new(self.config.queue_capacity));

        WorkerPool {
            config: self.config,
            queue,
            handlers: Arc::new(handlers),
            cancel: self.cancel.unwrap_or_default(),
            tracker: TaskTracker::new(),
            event_tx,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }
}
