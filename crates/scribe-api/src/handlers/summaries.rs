use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use scribe_core::{defaults, ContentStatus, CreateSummaryRequest, Error, Job, Summary};

use super::{enqueue, not_found, Accepted};
use crate::{ApiError, AppState};

/// Queue a summary of a completed transcript.
///
/// # Returns
/// - 202 Accepted with `{id, status}`
/// - 400 if `max_key_points` is out of range
/// - 404 if the transcript does not exist
/// - 409 if the transcript has not completed yet
/// - 503 if the queue is full or no summarizer is configured
pub async fn create_summary(
    State(state): State<AppState>,
    Path(transcript_id): Path<Uuid>,
    body: Option<Json<CreateSummaryRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.summaries_enabled {
        return Err(ApiError::ServiceUnavailable(
            "Summarization backend not configured. Set OPENAI_API_KEY or OPENAI_BASE_URL."
                .to_string(),
        ));
    }
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let max_key_points = body
        .max_key_points
        .unwrap_or(defaults::SUMMARY_MAX_KEY_POINTS);
    if !(1..=defaults::SUMMARY_MAX_KEY_POINTS_LIMIT).contains(&max_key_points) {
        return Err(ApiError::BadRequest(format!(
            "max_key_points must be between 1 and {}",
            defaults::SUMMARY_MAX_KEY_POINTS_LIMIT
        )));
    }

    let transcript = state
        .repos
        .transcripts
        .get(transcript_id)
        .await?
        .ok_or_else(|| not_found("Transcript", transcript_id))?;
    if transcript.state.status != ContentStatus::Completed {
        return Err(Error::NotReady(format!(
            "transcript {} is {}",
            transcript.id, transcript.state.status
        ))
        .into());
    }

    let summary = Summary::new(transcript.id, body.style, max_key_points);
    let repo = &*state.repos.summaries;
    repo.insert(&summary).await?;
    enqueue(&state, repo, Job::summarize(summary.id)).await?;

    Ok((StatusCode::ACCEPTED, Json(Accepted::pending(summary.id))))
}

pub async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .repos
        .summaries
        .get(id)
        .await?
        .ok_or_else(|| not_found("Summary", id))?;
    Ok(Json(summary))
}
