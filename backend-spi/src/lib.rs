//! FILENAME: backend-spi/src/lib.rs
//! Backend-agnostic execution contract.
//!
//! Layers:
//! - `prepared`: PreparedExecution, the chainable unit of work
//! - `backend`: traits backends implement (ExecutionBackend, ExecutionResult)
//! - `data_view`: windowed DataView and its identity
//! - `results`: dimension descriptors, header items and data values
//! - `factory`: assembles prepared executions with default dimensions

pub mod backend;
pub mod capabilities;
pub mod data_view;
mod error;
pub mod factory;
pub mod prepared;
pub mod results;

pub use backend::{cancellable, ExecutionBackend, ExecutionRequest, ExecutionResult, TransformOrigin};
pub use capabilities::BackendCapabilities;
pub use data_view::{DataView, DataViewPayload, ResultWindow};
pub use error::BackendError;
pub use factory::ExecutionFactory;
pub use prepared::PreparedExecution;
pub use results::*;
