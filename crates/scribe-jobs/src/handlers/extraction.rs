use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use scribe_core::{ExtractionTarget, JobKind, PdfExtraction, Transcript};

use super::{
    clamp_count, load, mark_processing, not_started, settle, HandlerEnv, StagedFile,
    SHUTDOWN_REASON,
};
use crate::extraction::{ExtractionPipeline, PdfTextExtractor};
use crate::handler::{JobContext, JobHandler, JobResult};

/// Resolves video transcripts through the fallback pipeline and PDF uploads
/// through a [`PdfTextExtractor`].
pub struct ExtractionHandler {
    env: HandlerEnv,
    pipeline: Arc<ExtractionPipeline>,
    pdf: Arc<dyn PdfTextExtractor>,
}

impl ExtractionHandler {
    pub fn new(
        env: HandlerEnv,
        pipeline: Arc<ExtractionPipeline>,
        pdf: Arc<dyn PdfTextExtractor>,
    ) -> Self {
        Self { env, pipeline, pdf }
    }

    async fn extract_video(&self, ctx: &JobContext) -> JobResult {
        let repo = &*self.env.repos.transcripts;
        let mut transcript: Transcript = match load(repo, ctx.record_id()).await {
            Ok(t) => t,
            Err(e) => return not_started("transcript", ctx.record_id(), e),
        };
        if let Err(e) = mark_processing(repo, &mut transcript).await {
            return not_started("transcript", transcript.id, e);
        }
        if ctx.is_cancelled() {
            return settle(&self.env, repo, transcript, Err(SHUTDOWN_REASON.to_string())).await;
        }

        let outcome = match self
            .pipeline
            .extract(&transcript.source_url, ctx.cancellation())
            .await
        {
            Ok(extracted) => {
                let meta = extracted.metadata;
                transcript.video_id = meta.video_id;
                transcript.title = meta.title;
                transcript.channel = meta.channel;
                transcript.duration_secs = meta.duration_secs;
                transcript.language = extracted.language;
                transcript.word_count = Some(clamp_count(extracted.word_count));
                transcript.method = Some(extracted.method);
                transcript.content = Some(extracted.text);
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        };

        settle(&self.env, repo, transcript, outcome).await
    }

    async fn extract_pdf(&self, ctx: &JobContext) -> JobResult {
        let repo = &*self.env.repos.pdfs;
        let mut pdf: PdfExtraction = match load(repo, ctx.record_id()).await {
            Ok(p) => p,
            Err(e) => return not_started("pdf", ctx.record_id(), e),
        };
        let staged = StagedFile::new(&pdf.file_path);

        if let Err(e) = mark_processing(repo, &mut pdf).await {
            return not_started("pdf", pdf.id, e);
        }
        if ctx.is_cancelled() {
            return settle(&self.env, repo, pdf, Err(SHUTDOWN_REASON.to_string())).await;
        }

        let outcome = match self.pdf.extract(staged.path()).await {
            Ok(text) => {
                pdf.page_count = text.page_count;
                pdf.title = text.title;
                pdf.word_count = Some(clamp_count(crate::extraction::word_count(&text.text)));
                pdf.content = Some(text.text);
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        };
        drop(staged);

        settle(&self.env, repo, pdf, outcome).await
    }
}

#[async_trait]
impl JobHandler for ExtractionHandler {
    fn job_kind(&self) -> JobKind {
        JobKind::Extraction
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        match ctx.job.extraction_payload() {
            Ok(payload) => match payload.target {
                ExtractionTarget::Video => self.extract_video(&ctx).await,
                ExtractionTarget::Pdf => self.extract_pdf(&ctx).await,
            },
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "handler",
                    id = %ctx.record_id(),
                    error = %e,
                    "Unreadable extraction payload"
                );
                JobResult::Failed(e.to_string())
            }
        }
    }
}
