use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use scribe_core::{CreateTranscriptRequest, Job, Transcript};

use super::{enqueue, not_found, require_http_url, Accepted};
use crate::{ApiError, AppState};

/// Queue transcript extraction for one video URL.
///
/// # Returns
/// - 202 Accepted with `{id, status}`
/// - 400 if the URL is not http(s)
/// - 503 if the job queue is full
pub async fn create_transcript(
    State(state): State<AppState>,
    Json(body): Json<CreateTranscriptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_http_url(&body.url)?;

    let transcript = Transcript::new(body.url.trim(), None);
    let repo = &*state.repos.transcripts;
    repo.insert(&transcript).await?;
    enqueue(&state, repo, Job::extract_video(transcript.id)).await?;

    Ok((StatusCode::ACCEPTED, Json(Accepted::pending(transcript.id))))
}

pub async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let transcript = state
        .repos
        .transcripts
        .get(id)
        .await?
        .ok_or_else(|| not_found("Transcript", id))?;
    Ok(Json(transcript))
}
