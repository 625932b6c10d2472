//! # scribe-jobs
//!
//! Background job execution for scribe.
//!
//! This crate provides:
//! - A bounded, non-blocking FIFO [`JobQueue`]
//! - A fixed-size [`WorkerPool`] with two-phase graceful shutdown
//! - Job handlers for extraction, summarization and audio transcription
//! - The fallback extraction pipeline (captions first, audio transcription last)
//! - The webhook delivery engine with signed, retried deliveries
//!
//! ## Example
//!
//! ```ignore
//! use scribe_jobs::{WorkerBuilder, WorkerConfig, ExtractionHandler, HandlerEnv};
//!
//! let pool = WorkerBuilder::new()
//!     .with_config(WorkerConfig::from_env())
//!     .with_cancellation(shutdown.clone())
//!     .with_handler(ExtractionHandler::new(env.clone(), pipeline, pdf))
//!     .build();
//!
//! pool.start();
//! pool.queue().submit(Job::extract_video(transcript.id))?;
//!
//! // Graceful shutdown
//! pool.stop().await;
//! notifier.shutdown().await;
//! ```

pub mod extraction;
pub mod handler;
pub mod handlers;
pub mod queue;
pub mod webhooks;
pub mod worker;

// Re-export core types
pub use scribe_core::*;

pub use extraction::{
    ExtractedText, ExtractionError, ExtractionPipeline, MediaMetadata, MediaSource, PdfText,
    PdfTextExtractor, PipelineConfig, PopplerPdfExtractor, YtDlpSource,
};
pub use handler::{JobContext, JobHandler, JobResult};
pub use handlers::{
    ExtractionHandler, HandlerEnv, StagedFile, SummarizationHandler, TranscriptionHandler,
};
pub use queue::{JobQueue, SubmitError};
pub use webhooks::{sign_payload, DeliveryConfig, EventSink, WebhookNotifier};
pub use worker::{WorkerBuilder, WorkerConfig, WorkerEvent, WorkerPool};
