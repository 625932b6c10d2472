//! scribe-api - HTTP API server for scribe
//!
//! A thin collaborator in front of the job engine: it creates pending
//! records, submits their jobs, and serves status reads, batch submission and
//! webhook management.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

pub use config::{ServerConfig, StorageBackend};
pub use error::ApiError;
pub use state::{AppState, UploadSettings};

use handlers::{batches, health, summaries, transcripts, uploads, webhooks};

/// Multipart framing overhead allowed on top of the file size limit.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.uploads.max_bytes.saturating_add(BODY_LIMIT_SLACK);

    Router::new()
        .route("/health", get(health::health_check))
        // Transcripts
        .route("/api/v1/transcripts", post(transcripts::create_transcript))
        .route("/api/v1/transcripts/:id", get(transcripts::get_transcript))
        .route(
            "/api/v1/transcripts/:id/summaries",
            post(summaries::create_summary),
        )
        // Batches
        .route("/api/v1/batches/transcripts", post(batches::create_batch))
        .route("/api/v1/batches/:id", get(batches::get_batch))
        // Summaries
        .route("/api/v1/summaries/:id", get(summaries::get_summary))
        // Uploads
        .route("/api/v1/audio", post(uploads::upload_audio))
        .route("/api/v1/audio/:id", get(uploads::get_audio))
        .route("/api/v1/pdfs", post(uploads::upload_pdf))
        .route("/api/v1/pdfs/:id", get(uploads::get_pdf))
        // Webhooks
        .route(
            "/api/v1/webhooks",
            post(webhooks::create_webhook).get(webhooks::list_webhooks),
        )
        .route(
            "/api/v1/webhooks/:id",
            get(webhooks::get_webhook)
                .patch(webhooks::update_webhook)
                .delete(webhooks::delete_webhook),
        )
        .route(
            "/api/v1/webhooks/:id/deliveries",
            get(webhooks::list_webhook_deliveries),
        )
        .route("/api/v1/webhooks/:id/test", post(webhooks::test_webhook))
        // Middleware
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .with_state(state)
}
