use thiserror::Error;

/// Fatal configuration or startup errors. Anything here exits the sidecar
/// with a non-zero status (the startup retry loop excepted, which retries
/// these for a bounded cold-start window).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid sidecar configuration: {0}")]
    Invalid(String),

    #[error("drand chain info mismatch: {0}")]
    InfoMismatch(String),

    #[error("drand binary check failed: {0}")]
    BinaryCheck(String),

    #[error("shutdown requested")]
    Shutdown,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from a beacon fetch. Retryable by the caller; the fetcher itself
/// never retries. `Clone` so a single upstream failure can be broadcast to
/// every deduplicated waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// drand returned 404: the round is not available yet.
    #[error("sidecar: round not available")]
    RoundNotAvailable,

    /// Transport error, decode error, or failed response validation.
    #[error("sidecar: service unavailable: {0}")]
    Unavailable(String),
}

impl From<FetchError> for tonic::Status {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::RoundNotAvailable => tonic::Status::not_found(err.to_string()),
            FetchError::Unavailable(_) => tonic::Status::unavailable(err.to_string()),
        }
    }
}
