//! # scribe-inference
//!
//! Collaborator backends used by job handlers:
//! - [`Transcriber`]: audio to text (Whisper-compatible HTTP API)
//! - [`Summarizer`]: transcript summaries (OpenAI-compatible chat API)
//!
//! Enable the `mock` feature for deterministic test doubles.

pub mod summarization;
pub mod transcription;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use summarization::{ChatSummarizer, Summarizer, SummaryOptions, SummaryResult};
pub use transcription::{mime_for_path, Transcriber, TranscriptionResult, WhisperBackend};
