use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use scribe_core::JobKind;
use scribe_inference::{mime_for_path, Transcriber};

use super::{
    clamp_count, load, mark_processing, not_started, settle, HandlerEnv, StagedFile,
    SHUTDOWN_REASON,
};
use crate::extraction::{clean_transcript, word_count};
use crate::handler::{JobContext, JobHandler, JobResult};

/// Transcribes uploaded audio files.
///
/// The staged upload is removed on every exit path once the record is loaded.
pub struct TranscriptionHandler {
    env: HandlerEnv,
    transcriber: Option<Arc<dyn Transcriber>>,
}

impl TranscriptionHandler {
    /// `transcriber` is `None` when no backend is configured; jobs then fail.
    pub fn new(env: HandlerEnv, transcriber: Option<Arc<dyn Transcriber>>) -> Self {
        Self { env, transcriber }
    }
}

#[async_trait]
impl JobHandler for TranscriptionHandler {
    fn job_kind(&self) -> JobKind {
        JobKind::Transcription
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let repo = &*self.env.repos.audio;
        let mut audio = match load(repo, ctx.record_id()).await {
            Ok(a) => a,
            Err(e) => return not_started("audio_transcription", ctx.record_id(), e),
        };
        let staged = StagedFile::new(&audio.file_path);

        if let Err(e) = mark_processing(repo, &mut audio).await {
            return not_started("audio_transcription", audio.id, e);
        }
        if ctx.is_cancelled() {
            return settle(&self.env, repo, audio, Err(SHUTDOWN_REASON.to_string())).await;
        }
        let Some(ref transcriber) = self.transcriber else {
            let reason = "audio transcription is not configured".to_string();
            return settle(&self.env, repo, audio, Err(reason)).await;
        };

        let data = match tokio::fs::read(staged.path()).await {
            Ok(data) => data,
            Err(e) => {
                let reason = format!("could not read staged upload: {}", e);
                return settle(&self.env, repo, audio, Err(reason)).await;
            }
        };
        let mime = audio
            .mime_type
            .clone()
            .unwrap_or_else(|| mime_for_path(Path::new(&audio.filename)).to_string());

        let outcome = match transcriber
            .transcribe(data, &mime, audio.language_hint.as_deref())
            .await
        {
            Ok(result) => {
                let text = clean_transcript(&result.text);
                audio.word_count = Some(clamp_count(word_count(&text)));
                audio.content = Some(text);
                audio.language = result.language;
                audio.duration_secs = result.duration_secs;
                audio.model = Some(transcriber.model_name().to_string());
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        };
        drop(staged);

        settle(&self.env, repo, audio, outcome).await
    }
}
