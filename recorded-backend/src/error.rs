//! FILENAME: recorded-backend/src/error.rs

use backend_spi::BackendError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Not a recording directory: {0}")]
    NotARecording(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}
