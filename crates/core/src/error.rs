//! Error types for the Murmur domain.
//!
//! One `thiserror` enum per bounded context, wrapped by a top-level
//! [`Error`] that the gateway maps onto HTTP statuses.

use thiserror::Error;

/// The top-level error type for all Murmur operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Ingestion errors ---
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    // --- Backend errors ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to the completion backend.
///
/// `Unavailable` and `Timeout` mean the backend could not be reached at all;
/// both are retryable from the caller's point of view and never leave a
/// partial reply behind. `Api` means the backend answered with a failure
/// status.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Backend unreachable: {0}")]
    Unavailable(String),

    #[error("Backend request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Backend returned {status_code}: {message}")]
    Api { status_code: u16, message: String },

    #[error("Backend returned no completion")]
    EmptyCompletion,
}

impl BackendError {
    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_displays_correctly() {
        let err = Error::Backend(BackendError::Api {
            status_code: 502,
            message: "upstream failed".into(),
        });
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("upstream failed"));
    }

    #[test]
    fn unavailable_and_timeout_are_retryable() {
        assert!(BackendError::Unavailable("connection refused".into()).is_retryable());
        assert!(BackendError::Timeout { timeout_secs: 30 }.is_retryable());
        assert!(
            !BackendError::Api {
                status_code: 500,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!BackendError::EmptyCompletion.is_retryable());
    }

    #[test]
    fn store_error_wraps_into_top_level() {
        let err: Error = StoreError::Storage("disk full".into()).into();
        assert!(err.to_string().contains("disk full"));
    }
}
