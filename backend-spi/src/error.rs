//! FILENAME: backend-spi/src/error.rs

use model::ModelError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum BackendError {
    /// The definition or request is not valid; raised before any I/O.
    #[error("Validation error: {0}")]
    Validation(#[from] ModelError),

    /// Nothing is available for the requested result or window.
    #[error("No data: {0}")]
    NoData(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Backend or protocol failure; carries the original cause when there is one.
    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Execution cancelled")]
    Cancelled,
}

impl BackendError {
    pub fn execution(message: impl Into<String>) -> Self {
        BackendError::Execution {
            message: message.into(),
            source: None,
        }
    }

    pub fn execution_caused_by(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BackendError::Execution {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, BackendError::NoData(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, BackendError::Validation(_))
    }
}
