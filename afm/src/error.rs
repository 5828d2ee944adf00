//! FILENAME: afm/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AfmError {
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
