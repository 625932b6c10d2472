//! Structured logging field names for scribe.
//!
//! All crates use these names for `tracing` fields so log aggregation can
//! query the same keys across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, fallback applied or job failed |
//! | INFO  | Lifecycle events (startup, shutdown), job and delivery outcomes |
//! | DEBUG | Decision points, pipeline stage results, config choices |
//! | TRACE | Per-item iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID for an HTTP request. UUIDv7.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "jobs", "webhooks"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "worker", "pipeline", "notifier"
pub const COMPONENT: &str = "component";

/// Logical operation name.
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Job id (equals the id of the record it advances).
pub const JOB_ID: &str = "job_id";

/// Job kind.
pub const JOB_KIND: &str = "job_kind";

/// Index of the worker loop handling a job.
pub const WORKER_ID: &str = "worker_id";

/// Batch id.
pub const BATCH_ID: &str = "batch_id";

/// Webhook id.
pub const WEBHOOK_ID: &str = "webhook_id";

/// Delivery audit row id.
pub const DELIVERY_ID: &str = "delivery_id";

/// Event name being delivered.
pub const EVENT: &str = "event";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Attempt number (1-based) for a retried operation.
pub const ATTEMPT: &str = "attempt";

/// Current queue depth.
pub const QUEUE_DEPTH: &str = "queue_depth";

/// Word count of extracted text.
pub const WORD_COUNT: &str = "word_count";

/// HTTP response status code.
pub const STATUS_CODE: &str = "status_code";

// ─── Pipeline fields ───────────────────────────────────────────────────────

/// Extraction stage ("metadata", "manual_captions", "auto_captions", "audio").
pub const STAGE: &str = "stage";

/// Extraction method that produced the final text.
pub const METHOD: &str = "method";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
