use std::sync::Arc;

use async_trait::async_trait;

use scribe_core::{ContentStatus, Error, JobKind, Summary};
use scribe_inference::{Summarizer, SummaryOptions};

use super::{load, mark_processing, not_started, settle, HandlerEnv, SHUTDOWN_REASON};
use crate::handler::{JobContext, JobHandler, JobResult};

/// Summarizes completed transcripts.
pub struct SummarizationHandler {
    env: HandlerEnv,
    summarizer: Arc<dyn Summarizer>,
}

impl SummarizationHandler {
    pub fn new(env: HandlerEnv, summarizer: Arc<dyn Summarizer>) -> Self {
        Self { env, summarizer }
    }

    /// Source text of the transcript, or why it cannot be summarized yet.
    async fn source_text(&self, summary: &Summary) -> Result<String, Error> {
        let transcript = self
            .env
            .repos
            .transcripts
            .get(summary.transcript_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("transcript {}", summary.transcript_id)))?;

        if transcript.state.status != ContentStatus::Completed {
            return Err(Error::NotReady(format!(
                "transcript {} is {}",
                transcript.id, transcript.state.status
            )));
        }
        transcript
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::NotReady(format!("transcript {} has no text", transcript.id)))
    }
}

#[async_trait]
impl JobHandler for SummarizationHandler {
    fn job_kind(&self) -> JobKind {
        JobKind::Summarization
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let repo = &*self.env.repos.summaries;
        let mut summary = match load(repo, ctx.record_id()).await {
            Ok(s) => s,
            Err(e) => return not_started("summary", ctx.record_id(), e),
        };
        if let Err(e) = mark_processing(repo, &mut summary).await {
            return not_started("summary", summary.id, e);
        }
        if ctx.is_cancelled() {
            return settle(&self.env, repo, summary, Err(SHUTDOWN_REASON.to_string())).await;
        }

        let text = match self.source_text(&summary).await {
            Ok(text) => text,
            Err(e) => return settle(&self.env, repo, summary, Err(e.to_string())).await,
        };

        let options = SummaryOptions {
            style: summary.style,
            max_key_points: usize::try_from(summary.max_key_points).unwrap_or(0),
        };
        let outcome = match self.summarizer.summarize(&text, &options).await {
            Ok(result) => {
                summary.content = Some(result.summary);
                summary.key_points = result.key_points;
                summary.model = Some(result.model);
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        };

        settle(&self.env, repo, summary, outcome).await
    }
}
