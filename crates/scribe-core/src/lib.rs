//! # scribe-core
//!
//! Core types, traits, and abstractions for scribe.
//!
//! This crate holds the domain model shared by every other scribe crate:
//! jobs, content records and their lifecycle, batches, webhooks, the
//! repository traits, and the common error type.

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uploads;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{validate_event_names, WebhookEvent};
pub use models::*;
pub use traits::*;
pub use uploads::{sanitize_filename, validate_audio_upload, validate_pdf_upload};
