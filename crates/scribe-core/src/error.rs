//! Error types for scribe.

use thiserror::Error;

/// Result type alias using scribe's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for scribe operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A content record was asked to move to a state its lifecycle forbids
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// A precondition record has not reached the state required for this work
    #[error("Not ready: {0}")]
    NotReady(String),

    /// The job queue rejected a submission because it is at capacity
    #[error("Job queue is full (capacity {0})")]
    QueueFull(usize),

    /// Job queue or worker error
    #[error("Job error: {0}")]
    Job(String),

    /// Content extraction failed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("transcript 42".to_string());
        assert_eq!(err.to_string(), "Not found: transcript 42");
    }

    #[test]
    fn test_error_display_invalid_transition() {
        let err = Error::InvalidTransition {
            from: "completed".to_string(),
            to: "processing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition: completed -> processing"
        );
    }

    #[test]
    fn test_error_display_not_ready() {
        let err = Error::NotReady("transcript is still processing".to_string());
        assert_eq!(err.to_string(), "Not ready: transcript is still processing");
    }

    #[test]
    fn test_error_display_queue_full() {
        let err = Error::QueueFull(100);
        assert_eq!(err.to_string(), "Job queue is full (capacity 100)");
    }

    #[test]
    fn test_error_display_extraction() {
        let err = Error::Extraction("no captions".to_string());
        assert_eq!(err.to_string(), "Extraction error: no captions");
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
