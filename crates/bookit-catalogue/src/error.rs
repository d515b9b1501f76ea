//! Error types for the book catalogue.

use std::path::PathBuf;

use thiserror::Error;

pub type CatalogueResult<T> = Result<T, CatalogueError>;

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("failed to read catalogue {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalogue is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The list parsed but breaks a catalogue rule, e.g. a repeated name.
    #[error("invalid catalogue: {0}")]
    Invalid(String),
}
