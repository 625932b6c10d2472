use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use scribe_core::{defaults, Batch, ContentStatus, CreateBatchRequest, Job, Transcript};
use scribe_jobs::HandlerEnv;

use super::{not_found, require_http_url};
use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct BatchMember {
    pub id: Uuid,
    pub source_url: String,
    pub status: ContentStatus,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    #[serde(flatten)]
    pub batch: Batch,
    pub transcripts: Vec<BatchMember>,
}

impl BatchResponse {
    fn new(batch: Batch, members: &[Transcript]) -> Self {
        Self {
            batch,
            transcripts: members
                .iter()
                .map(|t| BatchMember {
                    id: t.id,
                    source_url: t.source_url.clone(),
                    status: t.state.status,
                })
                .collect(),
        }
    }
}

/// Queue transcript extraction for several URLs as one batch.
///
/// Members the queue refuses are failed immediately rather than dropped, so
/// the batch still reaches a terminal status.
pub async fn create_batch(
    State(state): State<AppState>,
    Json(body): Json<CreateBatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.urls.is_empty() {
        return Err(ApiError::BadRequest("urls must not be empty".to_string()));
    }
    if body.urls.len() > defaults::BATCH_MAX_URLS {
        return Err(ApiError::BadRequest(format!(
            "at most {} urls per batch",
            defaults::BATCH_MAX_URLS
        )));
    }
    for url in &body.urls {
        require_http_url(url)?;
    }

    let batch = Batch::new(body.urls.len() as i32);
    state.repos.batches.insert(&batch).await?;

    let repo = &*state.repos.transcripts;
    let mut members = Vec::with_capacity(body.urls.len());
    for url in &body.urls {
        let transcript = Transcript::new(url.trim(), Some(batch.id));
        repo.insert(&transcript).await?;
        members.push(transcript);
    }

    let env = HandlerEnv::new(state.repos.clone(), Arc::new(state.notifier.clone()));
    let mut rejected = 0;
    for member in &mut members {
        if let Err(e) = state.queue.submit(Job::extract_video(member.id)) {
            rejected += 1;
            warn!(subsystem = "api", component = "batch", batch_id = %batch.id, id = %member.id, error = %e, "Batch member rejected");
            env.fail_unstarted(repo, member.clone(), e.to_string()).await?;
            member.state.status = ContentStatus::Failed;
        }
    }

    info!(
        subsystem = "api",
        component = "batch",
        batch_id = %batch.id,
        total = members.len(),
        rejected,
        "Batch submitted"
    );

    let batch = state
        .repos
        .batches
        .get(batch.id)
        .await?
        .ok_or_else(|| not_found("Batch", batch.id))?;
    Ok((StatusCode::ACCEPTED, Json(BatchResponse::new(batch, &members))))
}

pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let batch = state
        .repos
        .batches
        .get(id)
        .await?
        .ok_or_else(|| not_found("Batch", id))?;
    let members = state.repos.batches.members(id).await?;
    Ok(Json(BatchResponse::new(batch, &members)))
}
