//! Audio-to-text transcription backends.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use scribe_core::{defaults, Error, Result};

/// Result of audio transcription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptionResult {
    /// Full transcribed text.
    pub text: String,
    /// Detected language (ISO 639-1 code).
    pub language: Option<String>,
    /// Total audio duration in seconds.
    pub duration_secs: Option<f64>,
}

/// Capability to turn audio into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe audio data.
    async fn transcribe(
        &self,
        audio_data: Vec<u8>,
        mime_type: &str,
        language: Option<&str>,
    ) -> Result<TranscriptionResult>;

    /// Check if the backend is reachable.
    async fn health_check(&self) -> Result<bool>;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

/// Guess an audio MIME type from a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" | "mpga" | "mpeg" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "m4a" | "mp4" => "audio/mp4",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        "audio/opus" => "opus",
        "audio/flac" => "flac",
        "audio/aac" => "aac",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        "audio/webm" => "webm",
        _ => "wav",
    }
}

/// OpenAI-compatible Whisper backend (works with Speaches/faster-whisper-server).
pub struct WhisperBackend {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl WhisperBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(defaults::WHISPER_TIMEOUT_SECS),
        }
    }

    /// Create from environment variables.
    /// Returns None if WHISPER_BASE_URL is not set.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("WHISPER_BASE_URL").ok()?;
        if base_url.is_empty() {
            return None;
        }
        let model = std::env::var("WHISPER_MODEL")
            .unwrap_or_else(|_| defaults::WHISPER_MODEL.to_string());
        let mut backend = Self::new(base_url, model);
        if let Some(secs) = std::env::var("WHISPER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            backend.timeout = Duration::from_secs(secs);
        }
        Some(backend)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Whisper API `verbose_json` response.
#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

#[async_trait]
impl Transcriber for WhisperBackend {
    async fn transcribe(
        &self,
        audio_data: Vec<u8>,
        mime_type: &str,
        language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        let url = format!("{}/v1/audio/transcriptions", self.base_url);
        let size = audio_data.len();

        let file_part = reqwest::multipart::Part::bytes(audio_data)
            .file_name(format!("audio.{}", extension_for_mime(mime_type)))
            .mime_str(mime_type)
            .map_err(|e| Error::Inference(format!("Failed to create multipart: {}", e)))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }

        debug!(
            subsystem = "inference",
            component = "whisper",
            op = "transcribe",
            model = %self.model,
            bytes = size,
            "Sending audio for transcription"
        );

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Transcription request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Whisper API returned {}: {}",
                status, body
            )));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse whisper response: {}", e)))?;

        Ok(TranscriptionResult {
            text: result.text.trim().to_string(),
            language: result.language,
            duration_secs: result.duration,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                warn!(
                    subsystem = "inference",
                    component = "whisper",
                    error = %e,
                    "Whisper health check failed"
                );
                Ok(false)
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_backend_new_trims_slash() {
        let backend = WhisperBackend::new("http://localhost:8000/", "whisper-1");
        assert_eq!(backend.base_url, "http://localhost:8000");
        assert_eq!(backend.model_name(), "whisper-1");
        assert_eq!(
            backend.timeout,
            Duration::from_secs(defaults::WHISPER_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_whisper_response_deserialization_minimal() {
        let response: WhisperResponse = serde_json::from_str(r#"{"text": "Hello"}"#).unwrap();
        assert_eq!(response.text, "Hello");
        assert!(response.language.is_none());
        assert!(response.duration.is_none());
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("/tmp/a.MP3")), "audio/mpeg");
        assert_eq!(mime_for_path(Path::new("a.m4a")), "audio/mp4");
        assert_eq!(mime_for_path(Path::new("a.opus")), "audio/opus");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_extension_for_mime_defaults_to_wav() {
        assert_eq!(extension_for_mime("audio/mpeg"), "mp3");
        assert_eq!(extension_for_mime("audio/unknown"), "wav");
    }
}
