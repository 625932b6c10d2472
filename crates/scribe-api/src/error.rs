use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::error;

use scribe_jobs::SubmitError;

/// Error returned by every HTTP handler, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// A precondition record is not ready yet.
    Conflict(String),
    /// Queue full, shutting down, or a backend is not configured.
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<scribe_core::Error> for ApiError {
    fn from(err: scribe_core::Error) -> Self {
        use scribe_core::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::NotReady(msg) => ApiError::Conflict(msg),
            Error::QueueFull(_) => ApiError::ServiceUnavailable(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        ApiError::ServiceUnavailable(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Internal(msg) => {
                error!(subsystem = "api", error = %msg, "Request failed");
                msg
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::Error;

    #[test]
    fn test_core_errors_map_to_status_codes() {
        let cases = [
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (Error::NotReady("x".into()), StatusCode::CONFLICT),
            (Error::QueueFull(10), StatusCode::SERVICE_UNAVAILABLE),
            (Error::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Extraction("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_queue_full_message_names_capacity() {
        match ApiError::from(SubmitError::QueueFull(5)) {
            ApiError::ServiceUnavailable(msg) => assert!(msg.contains('5')),
            other => panic!("unexpected {:?}", other),
        }
    }
}
