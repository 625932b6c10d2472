//! Audio and PDF uploads.
//!
//! The file is staged under the upload directory before the job is queued;
//! the job handler removes it once the job finishes.

use std::path::PathBuf;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{debug, warn};
use uuid::Uuid;

use scribe_core::{
    sanitize_filename, validate_audio_upload, validate_pdf_upload, AudioTranscription, Job,
    PdfExtraction,
};

use super::{enqueue, not_found, Accepted};
use crate::{ApiError, AppState};

/// Fields read from an upload form.
#[derive(Default)]
struct UploadForm {
    filename: Option<String>,
    content_type: Option<String>,
    data: Option<Vec<u8>>,
    language: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("file") => {
                form.filename = field.file_name().map(|f| f.to_string());
                form.content_type = field.content_type().map(|c| c.to_string());
                form.data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?
                        .to_vec(),
                );
            }
            Some("language") => {
                let val = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?;
                if !val.trim().is_empty() {
                    form.language = Some(val.trim().to_string());
                }
            }
            _ => {} // ignore unknown fields
        }
    }
    Ok(form)
}

/// Write the upload to `<upload_dir>/<uuid>-<name>`.
async fn stage(state: &AppState, filename: &str, data: &[u8]) -> Result<PathBuf, ApiError> {
    tokio::fs::create_dir_all(&state.uploads.dir)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot create upload dir: {}", e)))?;
    let path = state
        .uploads
        .dir
        .join(format!("{}-{}", Uuid::now_v7(), filename));
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot stage upload: {}", e)))?;
    debug!(subsystem = "api", component = "upload", path = %path.display(), bytes = data.len(), "Upload staged");
    Ok(path)
}

async fn unstage(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(subsystem = "api", path = %path.display(), error = %e, "Failed to remove staged upload");
    }
}

/// Queue transcription of an uploaded audio file.
///
/// # Multipart Fields
/// - `file`: Audio file (required)
/// - `language`: ISO 639-1 language hint (optional)
pub async fn upload_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_form(multipart).await?;
    let data = form
        .data
        .ok_or_else(|| ApiError::BadRequest("Missing file in multipart form".to_string()))?;
    let filename = sanitize_filename(form.filename.as_deref().unwrap_or("audio"));
    validate_audio_upload(
        &filename,
        form.content_type.as_deref(),
        &data,
        state.uploads.max_bytes,
    )?;

    let path = stage(&state, &filename, &data).await?;
    let audio = AudioTranscription::new(
        filename,
        form.content_type,
        path.to_string_lossy(),
        data.len() as i64,
        form.language,
    );
    let repo = &*state.repos.audio;
    if let Err(e) = repo.insert(&audio).await {
        unstage(&path).await;
        return Err(e.into());
    }
    if let Err(e) = enqueue(&state, repo, Job::transcribe(audio.id)).await {
        unstage(&path).await;
        return Err(e);
    }

    Ok((StatusCode::ACCEPTED, Json(Accepted::pending(audio.id))))
}

pub async fn get_audio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let audio = state
        .repos
        .audio
        .get(id)
        .await?
        .ok_or_else(|| not_found("Audio transcription", id))?;
    Ok(Json(audio))
}

/// Queue text extraction of an uploaded PDF.
///
/// # Multipart Fields
/// - `file`: PDF document (required)
pub async fn upload_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_form(multipart).await?;
    let data = form
        .data
        .ok_or_else(|| ApiError::BadRequest("Missing file in multipart form".to_string()))?;
    let filename = sanitize_filename(form.filename.as_deref().unwrap_or("document.pdf"));
    validate_pdf_upload(&data, state.uploads.max_bytes)?;

    let path = stage(&state, &filename, &data).await?;
    let pdf = PdfExtraction::new(filename, path.to_string_lossy(), data.len() as i64);
    let repo = &*state.repos.pdfs;
    if let Err(e) = repo.insert(&pdf).await {
        unstage(&path).await;
        return Err(e.into());
    }
    if let Err(e) = enqueue(&state, repo, Job::extract_pdf(pdf.id)).await {
        unstage(&path).await;
        return Err(e);
    }

    Ok((StatusCode::ACCEPTED, Json(Accepted::pending(pdf.id))))
}

pub async fn get_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let pdf = state
        .repos
        .pdfs
        .get(id)
        .await?
        .ok_or_else(|| not_found("PDF extraction", id))?;
    Ok(Json(pdf))
}
