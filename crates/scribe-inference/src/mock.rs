//! Deterministic in-process backends for tests.
//!
//! ```rust,ignore
//! use scribe_inference::mock::MockTranscriber;
//!
//! let transcriber = MockTranscriber::new("hello world").with_language("en");
//! let result = transcriber.transcribe(vec![1, 2, 3], "audio/mpeg", None).await?;
//! assert_eq!(result.text, "hello world");
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use scribe_core::{Error, Result};

use crate::summarization::{SummaryOptions, SummaryResult, Summarizer};
use crate::transcription::{TranscriptionResult, Transcriber};

/// Mock transcriber returning a fixed result or a fixed failure.
#[derive(Clone)]
pub struct MockTranscriber {
    text: String,
    language: Option<String>,
    duration_secs: Option<f64>,
    failure: Option<String>,
    available: Arc<AtomicBool>,
    latency: Duration,
    calls: Arc<AtomicUsize>,
}

impl MockTranscriber {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: Some("en".to_string()),
            duration_secs: Some(60.0),
            failure: None,
            available: Arc::new(AtomicBool::new(true)),
            latency: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A transcriber whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        let mut mock = Self::new("");
        mock.failure = Some(message.into());
        mock
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make `health_check` report the backend as down.
    pub fn unavailable(self) -> Self {
        self.available.store(false, Ordering::SeqCst);
        self
    }

    /// Number of `transcribe` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(
        &self,
        _audio_data: Vec<u8>,
        _mime_type: &str,
        language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(ref message) = self.failure {
            return Err(Error::Inference(message.clone()));
        }
        Ok(TranscriptionResult {
            text: self.text.clone(),
            language: language.map(str::to_string).or_else(|| self.language.clone()),
            duration_secs: self.duration_secs,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    fn model_name(&self) -> &str {
        "mock-whisper"
    }
}

/// Mock summarizer returning the first words of its input.
#[derive(Clone)]
pub struct MockSummarizer {
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self {
            failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, text: &str, options: &SummaryOptions) -> Result<SummaryResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref message) = self.failure {
            return Err(Error::Inference(message.clone()));
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        let summary = words.iter().take(8).copied().collect::<Vec<_>>().join(" ");
        let key_points = words
            .iter()
            .take(options.max_key_points)
            .map(|w| w.to_string())
            .collect();

        Ok(SummaryResult {
            summary,
            key_points,
            model: "mock-summarizer".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "mock-summarizer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transcriber_counts_calls() {
        let mock = MockTranscriber::new("hello world");
        let result = mock.transcribe(vec![0], "audio/mpeg", Some("de")).await.unwrap();
        assert_eq!(result.text, "hello world");
        assert_eq!(result.language.as_deref(), Some("de"));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_transcriber_failure_and_health() {
        let mock = MockTranscriber::failing("model offline").unavailable();
        assert!(!mock.health_check().await.unwrap());
        assert!(mock.transcribe(vec![], "audio/wav", None).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_summarizer_limits_key_points() {
        let mock = MockSummarizer::new();
        let options = SummaryOptions {
            max_key_points: 2,
            ..Default::default()
        };
        let result = mock.summarize("one two three four", &options).await.unwrap();
        assert_eq!(result.key_points, vec!["one", "two"]);
        assert_eq!(result.summary, "one two three four");
    }
}
