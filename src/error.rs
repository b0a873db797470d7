//! Error types for fieldlog.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("invalid assistant request: {0}")]
    AssistantRequest(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("records out of order: {0}")]
    Ordering(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Failures raised by the record store rather than by the caller's input.
    pub fn is_store(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::Database(_) | Error::Migration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
