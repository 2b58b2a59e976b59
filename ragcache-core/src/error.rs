/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the semantic cache
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Embedding provider unavailable: {0}")]
    EmbedUnavailable(String),

    #[error("Embedding input rejected: {0}")]
    EmbedInputRejected(String),

    #[error("Embedding call timed out after {0:?}")]
    EmbedTimeout(std::time::Duration),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector index inconsistent with store: {0}")]
    IndexInconsistent(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage backend unavailable")]
    StoreUnavailable,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Source version provider error: {0}")]
    SourceVersion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error is recoverable (can retry with backoff)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::EmbedUnavailable(_) | Error::EmbedTimeout(_) => true,
            Error::Storage(_) | Error::SourceVersion(_) | Error::Io(_) => true,
            Error::EmbedInputRejected(_)
            | Error::DimensionMismatch { .. }
            | Error::IndexInconsistent(_)
            | Error::StoreUnavailable
            | Error::Serialization(_)
            | Error::InvalidInput(_)
            | Error::InvalidConfig(_) => false,
        }
    }
}
