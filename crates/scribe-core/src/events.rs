//! Event names delivered to webhook subscribers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Named event raised by job handlers (and the test-delivery endpoint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEvent {
    #[serde(rename = "transcript.completed")]
    TranscriptCompleted,
    #[serde(rename = "transcript.failed")]
    TranscriptFailed,
    #[serde(rename = "summary.completed")]
    SummaryCompleted,
    #[serde(rename = "summary.failed")]
    SummaryFailed,
    #[serde(rename = "transcription.completed")]
    TranscriptionCompleted,
    #[serde(rename = "transcription.failed")]
    TranscriptionFailed,
    #[serde(rename = "pdf.completed")]
    PdfCompleted,
    #[serde(rename = "pdf.failed")]
    PdfFailed,
    #[serde(rename = "batch.completed")]
    BatchCompleted,
    #[serde(rename = "webhook.test")]
    WebhookTest,
}

impl WebhookEvent {
    pub const ALL: [WebhookEvent; 10] = [
        WebhookEvent::TranscriptCompleted,
        WebhookEvent::TranscriptFailed,
        WebhookEvent::SummaryCompleted,
        WebhookEvent::SummaryFailed,
        WebhookEvent::TranscriptionCompleted,
        WebhookEvent::TranscriptionFailed,
        WebhookEvent::PdfCompleted,
        WebhookEvent::PdfFailed,
        WebhookEvent::BatchCompleted,
        WebhookEvent::WebhookTest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::TranscriptCompleted => "transcript.completed",
            WebhookEvent::TranscriptFailed => "transcript.failed",
            WebhookEvent::SummaryCompleted => "summary.completed",
            WebhookEvent::SummaryFailed => "summary.failed",
            WebhookEvent::TranscriptionCompleted => "transcription.completed",
            WebhookEvent::TranscriptionFailed => "transcription.failed",
            WebhookEvent::PdfCompleted => "pdf.completed",
            WebhookEvent::PdfFailed => "pdf.failed",
            WebhookEvent::BatchCompleted => "batch.completed",
            WebhookEvent::WebhookTest => "webhook.test",
        }
    }
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        WebhookEvent::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown event: {s}")))
    }
}

/// Validate a list of subscribed event names.
pub fn validate_event_names(events: &[String]) -> Result<()> {
    for name in events {
        name.parse::<WebhookEvent>()?;
    }
    Ok(())
}
