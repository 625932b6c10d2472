//! [`MediaSource`] backed by the `yt-dlp` command-line tool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::process::Command;
use tracing::debug;

use scribe_core::{Error, Result};

use super::{run_cmd_with_timeout, CaptionKind, MediaMetadata, MediaSource, PipelineConfig};

/// Subset of `yt-dlp --dump-json` output we care about.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    language: Option<String>,
    #[serde(default)]
    subtitles: Option<JsonValue>,
    #[serde(default)]
    automatic_captions: Option<JsonValue>,
}

fn has_tracks(tracks: &Option<JsonValue>) -> bool {
    tracks
        .as_ref()
        .and_then(|t| t.as_object())
        .map(|t| !t.is_empty())
        .unwrap_or(false)
}

/// Parse the JSON document printed by `yt-dlp --dump-json`.
pub fn parse_metadata(json: &str) -> Result<MediaMetadata> {
    let info: YtDlpInfo = serde_json::from_str(json)?;
    Ok(MediaMetadata {
        video_id: info.id,
        title: info.title,
        channel: info.channel.or(info.uploader),
        duration_secs: info.duration.map(|d| d.round() as i32),
        language: info.language,
        has_manual_captions: has_tracks(&info.subtitles),
        has_auto_captions: has_tracks(&info.automatic_captions),
    })
}

/// First file in `dir` whose extension is one of `extensions`.
async fn find_file(dir: &Path, extensions: &[&str]) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false);
        if matches {
            found.push(path);
        }
    }
    found.sort();
    Ok(found.into_iter().next())
}

/// Runs `yt-dlp` for metadata, caption tracks and audio.
pub struct YtDlpSource {
    config: PipelineConfig,
}

impl YtDlpSource {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.ytdlp_path);
        cmd.arg("--no-warnings").arg("--no-playlist");
        cmd
    }
}

#[async_trait]
impl MediaSource for YtDlpSource {
    async fn metadata(&self, locator: &str) -> Result<MediaMetadata> {
        let mut cmd = self.command();
        cmd.arg("--dump-json").arg("--skip-download").arg(locator);
        let output = run_cmd_with_timeout(&mut cmd, self.config.metadata_timeout).await?;
        parse_metadata(&output)
    }

    async fn captions(
        &self,
        locator: &str,
        kind: CaptionKind,
        dir: &Path,
    ) -> Result<Option<String>> {
        let mut cmd = self.command();
        cmd.arg("--skip-download")
            .arg(match kind {
                CaptionKind::Manual => "--write-subs",
                CaptionKind::Auto => "--write-auto-subs",
            })
            .arg("--sub-langs")
            .arg(&self.config.caption_langs)
            .arg("--sub-format")
            .arg("vtt/srt/best")
            .arg("-o")
            .arg(dir.join("captions.%(ext)s"))
            .arg(locator);
        run_cmd_with_timeout(&mut cmd, self.config.caption_timeout).await?;

        let Some(path) = find_file(dir, &["vtt", "srt"]).await? else {
            debug!(
                subsystem = "jobs",
                component = "ytdlp",
                kind = kind.as_str(),
                "No caption file written"
            );
            return Ok(None);
        };
        let raw = tokio::fs::read_to_string(&path).await?;
        Ok(Some(raw))
    }

    async fn download_audio(&self, locator: &str, dir: &Path) -> Result<PathBuf> {
        let mut cmd = self.command();
        cmd.arg("-f")
            .arg("bestaudio")
            .arg("-x")
            .arg("--audio-format")
            .arg("mp3")
            .arg("-o")
            .arg(dir.join("audio.%(ext)s"))
            .arg(locator);
        run_cmd_with_timeout(&mut cmd, self.config.audio_timeout).await?;

        find_file(dir, &["mp3", "m4a", "opus", "webm", "ogg", "wav"])
            .await?
            .ok_or_else(|| Error::Extraction("yt-dlp produced no audio file".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata_full() {
        let json = r#"{
            "id": "abc123",
            "title": "Rust in Production",
            "uploader": "Ferris",
            "duration": 612.6,
            "language": "en",
            "subtitles": {"en": [{"ext": "vtt"}]},
            "automatic_captions": {}
        }"#;
        let meta = parse_metadata(json).unwrap();
        assert_eq!(meta.video_id.as_deref(), Some("abc123"));
        assert_eq!(meta.channel.as_deref(), Some("Ferris"));
        assert_eq!(meta.duration_secs, Some(613));
        assert!(meta.has_manual_captions);
        assert!(!meta.has_auto_captions);
    }

    #[test]
    fn test_parse_metadata_prefers_channel_over_uploader() {
        let json = r#"{"channel": "Main", "uploader": "alt", "automatic_captions": {"en": []}}"#;
        let meta = parse_metadata(json).unwrap();
        assert_eq!(meta.channel.as_deref(), Some("Main"));
        assert!(!meta.has_manual_captions);
        assert!(meta.has_auto_captions);
    }

    #[test]
    fn test_parse_metadata_rejects_garbage() {
        assert!(parse_metadata("ERROR: not json").is_err());
    }

    #[tokio::test]
    async fn test_find_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("captions.en.vtt"), "WEBVTT").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let found = find_file(dir.path(), &["vtt", "srt"]).await.unwrap();
        assert_eq!(found, Some(dir.path().join("captions.en.vtt")));
        assert!(find_file(dir.path(), &["mp3"]).await.unwrap().is_none());
    }
}
