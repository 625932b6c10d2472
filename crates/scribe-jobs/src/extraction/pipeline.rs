//! The ordered metadata → captions → audio strategy.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scribe_core::ExtractionMethod;
use scribe_inference::{mime_for_path, Transcriber};

use super::captions::{clean_transcript, parse_captions, word_count};
use super::{
    video_id_from_url, CaptionKind, ExtractionError, MediaMetadata, MediaSource, PipelineConfig,
};

/// Successful pipeline output.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    /// Cleaned text.
    pub text: String,
    pub word_count: usize,
    pub method: ExtractionMethod,
    /// Metadata with best-effort defaults filled in (title falls back to the locator).
    pub metadata: MediaMetadata,
    pub language: Option<String>,
}

/// Resolves a locator into text through a [`MediaSource`] and an optional
/// [`Transcriber`] fallback.
pub struct ExtractionPipeline {
    source: Arc<dyn MediaSource>,
    transcriber: Option<Arc<dyn Transcriber>>,
    config: PipelineConfig,
}

impl ExtractionPipeline {
    pub fn new(source: Arc<dyn MediaSource>, config: PipelineConfig) -> Self {
        Self {
            source,
            transcriber: None,
            config,
        }
    }

    /// Enable the audio transcription fallback.
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn has_transcriber(&self) -> bool {
        self.transcriber.is_some()
    }

    pub async fn extract(
        &self,
        locator: &str,
        cancel: &CancellationToken,
    ) -> Result<ExtractedText, ExtractionError> {
        let locator = locator.trim();
        if !(locator.starts_with("http://") || locator.starts_with("https://")) {
            return Err(ExtractionError::InvalidLocator(locator.to_string()));
        }
        let start = Instant::now();

        let (metadata, metadata_error) = match self.source.metadata(locator).await {
            Ok(meta) => {
                debug!(
                    subsystem = "jobs",
                    component = "pipeline",
                    stage = "metadata",
                    manual = meta.has_manual_captions,
                    auto = meta.has_auto_captions,
                    "Fetched metadata"
                );
                (Some(meta), None)
            }
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "pipeline",
                    stage = "metadata",
                    error = %e,
                    "Metadata unavailable, continuing"
                );
                (None, Some(e.to_string()))
            }
        };

        for kind in [CaptionKind::Manual, CaptionKind::Auto] {
            if cancel.is_cancelled() {
                return Err(ExtractionError::Cancelled);
            }
            if let Some(ref meta) = metadata {
                let listed = match kind {
                    CaptionKind::Manual => meta.has_manual_captions,
                    CaptionKind::Auto => meta.has_auto_captions,
                };
                if !listed {
                    debug!(
                        subsystem = "jobs",
                        component = "pipeline",
                        stage = kind.as_str(),
                        "Source lists no such track, skipping"
                    );
                    continue;
                }
            }

            if let Some(text) = self.try_captions(locator, kind).await {
                return Ok(self.finish(
                    locator,
                    text,
                    kind.method(),
                    metadata,
                    None,
                    start,
                ));
            }
        }

        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        let no_fallback = || match metadata_error {
            Some(ref e) => ExtractionError::MetadataUnavailable(e.clone()),
            None => ExtractionError::NoCaptions,
        };

        let Some(ref transcriber) = self.transcriber else {
            return Err(no_fallback());
        };
        match transcriber.health_check().await {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                warn!(
                    subsystem = "jobs",
                    component = "pipeline",
                    stage = "audio",
                    "Transcription backend unavailable"
                );
                return Err(no_fallback());
            }
        }

        let scratch = self.config.scratch().map_err(|e| {
            ExtractionError::TranscriptionFailed(format!("scratch directory: {}", e))
        })?;
        let download = tokio::time::timeout(
            self.config.audio_timeout,
            self.source.download_audio(locator, scratch.path()),
        )
        .await;
        let audio_path = match download {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => {
                return Err(match metadata_error {
                    Some(_) => ExtractionError::MetadataUnavailable(e.to_string()),
                    None => ExtractionError::TranscriptionFailed(format!(
                        "audio download failed: {}",
                        e
                    )),
                })
            }
            Err(_) => {
                return Err(ExtractionError::TranscriptionFailed(format!(
                    "audio download timed out after {}s",
                    self.config.audio_timeout.as_secs()
                )))
            }
        };

        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        let audio = tokio::fs::read(&audio_path)
            .await
            .map_err(|e| ExtractionError::TranscriptionFailed(e.to_string()))?;
        let language_hint = metadata.as_ref().and_then(|m| m.language.clone());
        let result = transcriber
            .transcribe(audio, mime_for_path(&audio_path), language_hint.as_deref())
            .await
            .map_err(|e| ExtractionError::TranscriptionFailed(e.to_string()))?;
        drop(scratch);

        let text = clean_transcript(&result.text);
        if text.is_empty() {
            return Err(ExtractionError::TranscriptionFailed(
                "transcription returned no text".to_string(),
            ));
        }

        Ok(self.finish(
            locator,
            text,
            ExtractionMethod::AudioTranscription,
            metadata,
            result.language,
            start,
        ))
    }

    /// One caption attempt in its own scratch directory. Failures are logged.
    async fn try_captions(&self, locator: &str, kind: CaptionKind) -> Option<String> {
        let scratch = match self.config.scratch() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "pipeline",
                    stage = kind.as_str(),
                    error = %e,
                    "Could not create scratch directory"
                );
                return None;
            }
        };

        let attempt = tokio::time::timeout(
            self.config.caption_timeout,
            self.source.captions(locator, kind, scratch.path()),
        )
        .await;

        let raw = match attempt {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => {
                debug!(
                    subsystem = "jobs",
                    component = "pipeline",
                    stage = kind.as_str(),
                    "No captions"
                );
                return None;
            }
            Ok(Err(e)) => {
                warn!(
                    subsystem = "jobs",
                    component = "pipeline",
                    stage = kind.as_str(),
                    error = %e,
                    "Caption extraction failed"
                );
                return None;
            }
            Err(_) => {
                warn!(
                    subsystem = "jobs",
                    component = "pipeline",
                    stage = kind.as_str(),
                    timeout_secs = self.config.caption_timeout.as_secs(),
                    "Caption extraction timed out"
                );
                return None;
            }
        };

        let text = clean_transcript(&parse_captions(&raw));
        (!text.is_empty()).then_some(text)
    }

    fn finish(
        &self,
        locator: &str,
        text: String,
        method: ExtractionMethod,
        metadata: Option<MediaMetadata>,
        detected_language: Option<String>,
        start: Instant,
    ) -> ExtractedText {
        let mut metadata = metadata.unwrap_or_default();
        if metadata.title.is_none() {
            metadata.title = Some(locator.to_string());
        }
        if metadata.video_id.is_none() {
            metadata.video_id = video_id_from_url(locator);
        }
        let language = detected_language.or_else(|| metadata.language.clone());
        let words = word_count(&text);

        info!(
            subsystem = "jobs",
            component = "pipeline",
            method = method.as_str(),
            word_count = words,
            duration_ms = start.elapsed().as_millis() as u64,
            "Extraction succeeded"
        );

        ExtractedText {
            text,
            word_count: words,
            method,
            metadata,
            language,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scribe_core::{Error, Result};
    use scribe_inference::mock::MockTranscriber;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    const URL: &str = "https://www.youtube.com/watch?v=abc123";

    #[derive(Default)]
    struct FakeSource {
        metadata: Option<MediaMetadata>,
        manual: Option<String>,
        auto: Option<String>,
        audio_fails: bool,
        calls: Mutex<Vec<String>>,
        dirs: Mutex<Vec<PathBuf>>,
    }

    impl FakeSource {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaSource for FakeSource {
        async fn metadata(&self, _locator: &str) -> Result<MediaMetadata> {
            self.calls.lock().unwrap().push("metadata".into());
            self.metadata
                .clone()
                .ok_or_else(|| Error::Extraction("video unavailable".into()))
        }

        async fn captions(
            &self,
            _locator: &str,
            kind: CaptionKind,
            dir: &Path,
        ) -> Result<Option<String>> {
            self.calls.lock().unwrap().push(kind.as_str().into());
            self.dirs.lock().unwrap().push(dir.to_path_buf());
            Ok(match kind {
                CaptionKind::Manual => self.manual.clone(),
                CaptionKind::Auto => self.auto.clone(),
            })
        }

        async fn download_audio(&self, _locator: &str, dir: &Path) -> Result<PathBuf> {
            self.calls.lock().unwrap().push("audio".into());
            self.dirs.lock().unwrap().push(dir.to_path_buf());
            if self.audio_fails {
                return Err(Error::Extraction("download blocked".into()));
            }
            let path = dir.join("audio.mp3");
            std::fs::write(&path, b"ID3fake").unwrap();
            Ok(path)
        }
    }

    fn meta(manual: bool, auto: bool) -> MediaMetadata {
        MediaMetadata {
            video_id: Some("abc123".into()),
            title: Some("A Talk".into()),
            channel: Some("Chan".into()),
            duration_secs: Some(60),
            language: Some("en".into()),
            has_manual_captions: manual,
            has_auto_captions: auto,
        }
    }

    fn vtt(text: &str) -> String {
        format!("WEBVTT\n\n00:00:00.000 --> 00:00:01.000\n{}\n", text)
    }

    fn pipeline(source: Arc<FakeSource>) -> ExtractionPipeline {
        ExtractionPipeline::new(source, PipelineConfig::default())
    }

    #[tokio::test]
    async fn test_manual_captions_win() {
        let source = Arc::new(FakeSource {
            metadata: Some(meta(true, true)),
            manual: Some(vtt("manual words [Music] here")),
            auto: Some(vtt("auto words")),
            ..Default::default()
        });
        let result = pipeline(source.clone())
            .extract(URL, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.text, "manual words here");
        assert_eq!(result.word_count, 3);
        assert_eq!(result.method, ExtractionMethod::ManualCaptions);
        assert_eq!(result.metadata.title.as_deref(), Some("A Talk"));
        assert_eq!(source.calls(), vec!["metadata", "manual"]);
    }

    #[tokio::test]
    async fn test_unlisted_manual_track_is_skipped() {
        let source = Arc::new(FakeSource {
            metadata: Some(meta(false, true)),
            manual: Some(vtt("should not be used")),
            auto: Some(vtt("auto words")),
            ..Default::default()
        });
        let result = pipeline(source.clone())
            .extract(URL, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.method, ExtractionMethod::AutoCaptions);
        assert_eq!(source.calls(), vec!["metadata", "auto"]);
    }

    #[tokio::test]
    async fn test_metadata_failure_is_not_fatal() {
        let source = Arc::new(FakeSource {
            metadata: None,
            manual: None,
            auto: Some(vtt("still works")),
            ..Default::default()
        });
        let result = pipeline(source.clone())
            .extract(URL, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.text, "still works");
        assert_eq!(result.metadata.title.as_deref(), Some(URL));
        assert_eq!(result.metadata.video_id.as_deref(), Some("abc123"));
        assert_eq!(source.calls(), vec!["metadata", "manual", "auto"]);
    }

    #[tokio::test]
    async fn test_no_captions_without_transcriber() {
        let source = Arc::new(FakeSource {
            metadata: Some(meta(true, true)),
            ..Default::default()
        });
        let err = pipeline(source)
            .extract(URL, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NoCaptions));
    }

    #[tokio::test]
    async fn test_no_metadata_and_no_captions() {
        let source = Arc::new(FakeSource::default());
        let err = pipeline(source)
            .extract(URL, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::MetadataUnavailable(msg) if msg.contains("unavailable")));
    }

    #[tokio::test]
    async fn test_audio_transcription_fallback() {
        let source = Arc::new(FakeSource {
            metadata: Some(meta(false, false)),
            ..Default::default()
        });
        let transcriber = Arc::new(MockTranscriber::new("spoken   words [Applause] here").with_language("de"));
        let result = pipeline(source.clone())
            .with_transcriber(transcriber.clone())
            .extract(URL, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.method, ExtractionMethod::AudioTranscription);
        assert_eq!(result.text, "spoken words here");
        assert_eq!(result.word_count, 3);
        // the metadata language is passed as the hint and echoed back by the mock
        assert_eq!(result.language.as_deref(), Some("en"));
        assert_eq!(transcriber.call_count(), 1);
        assert_eq!(source.calls(), vec!["metadata", "audio"]);
    }

    #[tokio::test]
    async fn test_unavailable_transcriber_is_no_fallback() {
        let source = Arc::new(FakeSource {
            metadata: Some(meta(false, false)),
            ..Default::default()
        });
        let transcriber = Arc::new(MockTranscriber::new("x").unavailable());
        let err = pipeline(source.clone())
            .with_transcriber(transcriber.clone())
            .extract(URL, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractionError::NoCaptions));
        assert_eq!(transcriber.call_count(), 0);
        assert!(!source.calls().contains(&"audio".to_string()));
    }

    #[tokio::test]
    async fn test_failing_transcriber() {
        let source = Arc::new(FakeSource {
            metadata: Some(meta(false, false)),
            ..Default::default()
        });
        let err = pipeline(source)
            .with_transcriber(Arc::new(MockTranscriber::failing("model offline")))
            .extract(URL, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::TranscriptionFailed(msg) if msg.contains("model offline")));
    }

    #[tokio::test]
    async fn test_scratch_dirs_are_removed() {
        let source = Arc::new(FakeSource {
            metadata: None,
            manual: None,
            auto: None,
            ..Default::default()
        });
        let _ = pipeline(source.clone())
            .with_transcriber(Arc::new(MockTranscriber::new("words")))
            .extract(URL, &CancellationToken::new())
            .await
            .unwrap();

        let dirs = source.dirs.lock().unwrap().clone();
        assert_eq!(dirs.len(), 3);
        assert!(dirs.iter().all(|d| !d.exists()));
    }

    #[tokio::test]
    async fn test_invalid_locator() {
        let source = Arc::new(FakeSource::default());
        let err = pipeline(source.clone())
            .extract("not a url", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidLocator(_)));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_captions() {
        let source = Arc::new(FakeSource {
            metadata: Some(meta(true, true)),
            manual: Some(vtt("words")),
            ..Default::default()
        });
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pipeline(source).extract(URL, &cancel).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Cancelled));
    }
}
