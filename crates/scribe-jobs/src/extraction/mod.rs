//! Fallback extraction pipeline.
//!
//! Resolves a content locator into cleaned text, trying strategies in
//! decreasing order of quality and increasing cost:
//!
//! 1. Metadata (title, channel, duration, caption tracks), non-fatal
//! 2. Manual captions, then auto-generated captions
//! 3. Audio download handed to a [`Transcriber`](scribe_inference::Transcriber)
//!
//! The first strategy that produces text wins. PDF uploads go through the
//! separate [`PdfTextExtractor`] capability.

pub mod captions;
pub mod pdf;
pub mod pipeline;
pub mod ytdlp;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

use scribe_core::{defaults, Error, ExtractionMethod, Result};

pub use captions::{clean_transcript, parse_captions, word_count};
pub use pdf::{PdfText, PdfTextExtractor, PopplerPdfExtractor};
pub use pipeline::{ExtractedText, ExtractionPipeline};
pub use ytdlp::YtDlpSource;

/// Which caption track to ask a source for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionKind {
    Manual,
    Auto,
}

impl CaptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionKind::Manual => "manual",
            CaptionKind::Auto => "auto",
        }
    }

    pub fn method(&self) -> ExtractionMethod {
        match self {
            CaptionKind::Manual => ExtractionMethod::ManualCaptions,
            CaptionKind::Auto => ExtractionMethod::AutoCaptions,
        }
    }
}

/// Best-effort structural metadata about a media source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub channel: Option<String>,
    pub duration_secs: Option<i32>,
    pub language: Option<String>,
    pub has_manual_captions: bool,
    pub has_auto_captions: bool,
}

/// Failure of the whole pipeline.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Metadata could not be fetched and no later stage succeeded either.
    #[error("Could not read the source: {0}")]
    MetadataUnavailable(String),

    #[error("No captions available and audio transcription is not configured")]
    NoCaptions,

    #[error("No captions available and audio transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("Invalid content locator: {0}")]
    InvalidLocator(String),
}

impl From<ExtractionError> for Error {
    fn from(e: ExtractionError) -> Self {
        Error::Extraction(e.to_string())
    }
}

/// Where media comes from. [`YtDlpSource`] is the production implementation.
///
/// Every method that writes files receives a scratch directory owned (and
/// removed) by the caller.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn metadata(&self, locator: &str) -> Result<MediaMetadata>;

    /// Raw caption payload (WebVTT) for the track, or `None` when there is none.
    async fn captions(&self, locator: &str, kind: CaptionKind, dir: &Path)
        -> Result<Option<String>>;

    /// Download the audio track into `dir` and return its path.
    async fn download_audio(&self, locator: &str, dir: &Path) -> Result<PathBuf>;
}

/// Configuration for extraction tools.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub ytdlp_path: String,
    pub caption_langs: String,
    pub metadata_timeout: Duration,
    pub caption_timeout: Duration,
    pub audio_timeout: Duration,
    /// Parent of per-attempt scratch directories. `None` means the system temp dir.
    pub scratch_dir: Option<PathBuf>,
    pub pdftotext_path: String,
    pub pdfinfo_path: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: defaults::YTDLP_PATH.to_string(),
            caption_langs: defaults::CAPTION_LANGS.to_string(),
            metadata_timeout: Duration::from_secs(defaults::METADATA_TIMEOUT_SECS),
            caption_timeout: Duration::from_secs(defaults::CAPTION_TIMEOUT_SECS),
            audio_timeout: Duration::from_secs(defaults::AUDIO_TIMEOUT_SECS),
            scratch_dir: None,
            pdftotext_path: defaults::PDFTOTEXT_PATH.to_string(),
            pdfinfo_path: defaults::PDFINFO_PATH.to_string(),
        }
    }
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `YTDLP_PATH` | `yt-dlp` |
    /// | `CAPTION_LANGS` | `en.*,en` |
    /// | `METADATA_TIMEOUT_SECS` | `30` |
    /// | `CAPTION_TIMEOUT_SECS` | `90` |
    /// | `AUDIO_TIMEOUT_SECS` | `300` |
    /// | `SCRATCH_DIR` | system temp dir |
    /// | `PDFTOTEXT_PATH` | `pdftotext` |
    /// | `PDFINFO_PATH` | `pdfinfo` |
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            ytdlp_path: var("YTDLP_PATH", defaults::YTDLP_PATH),
            caption_langs: var("CAPTION_LANGS", defaults::CAPTION_LANGS),
            metadata_timeout: env_secs("METADATA_TIMEOUT_SECS", defaults::METADATA_TIMEOUT_SECS),
            caption_timeout: env_secs("CAPTION_TIMEOUT_SECS", defaults::CAPTION_TIMEOUT_SECS),
            audio_timeout: env_secs("AUDIO_TIMEOUT_SECS", defaults::AUDIO_TIMEOUT_SECS),
            scratch_dir: std::env::var("SCRATCH_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            pdftotext_path: var("PDFTOTEXT_PATH", defaults::PDFTOTEXT_PATH),
            pdfinfo_path: var("PDFINFO_PATH", defaults::PDFINFO_PATH),
        }
    }

    pub fn with_ytdlp_path(mut self, path: impl Into<String>) -> Self {
        self.ytdlp_path = path.into();
        self
    }

    pub fn with_caption_timeout(mut self, timeout: Duration) -> Self {
        self.caption_timeout = timeout;
        self
    }

    pub fn with_audio_timeout(mut self, timeout: Duration) -> Self {
        self.audio_timeout = timeout;
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Fresh scratch directory, removed when the returned guard drops.
    pub fn scratch(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("scribe-");
        let dir = match self.scratch_dir {
            Some(ref parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        };
        dir.map_err(Error::Io)
    }
}

/// Run a command with a timeout, returning stdout as a string.
///
/// The child is killed if the timeout fires.
pub(crate) async fn run_cmd_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<String> {
    cmd.kill_on_drop(true);
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| {
            Error::Extraction(format!(
                "External command timed out after {}s",
                timeout.as_secs()
            ))
        })?
        .map_err(|e| Error::Extraction(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extraction(format!(
            "Command failed ({}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Best-effort video id from common YouTube URL shapes.
pub fn video_id_from_url(url: &str) -> Option<String> {
    let rest = url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.")
        .trim_start_matches("m.");

    let candidate = if let Some(id) = rest.strip_prefix("youtu.be/") {
        id
    } else if let Some(query) = rest
        .strip_prefix("youtube.com/watch?")
        .or_else(|| rest.strip_prefix("music.youtube.com/watch?"))
    {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("v="))?
    } else if let Some(id) = rest
        .strip_prefix("youtube.com/shorts/")
        .or_else(|| rest.strip_prefix("youtube.com/embed/"))
        .or_else(|| rest.strip_prefix("youtube.com/live/"))
    {
        id
    } else {
        return None;
    };

    let id: String = candidate
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    (!id.is_empty()).then_some(id)
}
