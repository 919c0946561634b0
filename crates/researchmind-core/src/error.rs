use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Web search failed: {0}")]
    WebSearch(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Wraps a poisoned lock into an `Operation` error.
    pub fn poisoned<T>(what: &str, _err: std::sync::PoisonError<T>) -> Self {
        Self::Operation(format!("{what} lock poisoned"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
