use std::time::Duration;

use thiserror::Error;

/// Failure of a single embedding or chat call against the remote backend.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Backend signalled throttling (HTTP 429 or an equivalent error code).
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("client not configured: {0}")]
    NotConfigured(String),

    #[error("transient backend failure: {0}")]
    Transient(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("embedding has dimension {got}, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<EmbeddingError> },
}

impl EmbeddingError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, EmbeddingError::RateLimited(_))
    }

    /// Permanent failures are never retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Auth(_)
                | EmbeddingError::InvalidInput(_)
                | EmbeddingError::NotConfigured(_)
                | EmbeddingError::DimensionMismatch { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Connection or backend failure of the chunk store. Never recovered locally.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("Chat failed: {0}")]
    Chat(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(EmbeddingError::RateLimited("429".into()).is_throttled());
        assert!(!EmbeddingError::RateLimited("429".into()).is_permanent());
        assert!(EmbeddingError::Auth("401".into()).is_permanent());
        assert!(!EmbeddingError::Transient("reset".into()).is_permanent());
        assert!(!EmbeddingError::Timeout(Duration::from_secs(1)).is_throttled());
    }
}
