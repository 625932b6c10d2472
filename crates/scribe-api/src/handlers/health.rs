use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::AppState;

/// Liveness plus queue pressure.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "queue_depth": state.queue.size(),
        "queue_capacity": state.queue.capacity(),
        "worker_count": state.worker_count,
    }))
}
