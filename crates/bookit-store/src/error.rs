//! Error types for the bookit-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the record stores and the local cache.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An invalid argument was provided to a store operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),

    /// The HTTP request to the remote document store could not be sent.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote document store answered with a non-success status.
    #[error("remote store returned {status}: {message}")]
    Remote { status: u16, message: String },

    /// A remote document did not have the expected shape.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// A URL could not be built from the configured endpoint.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
