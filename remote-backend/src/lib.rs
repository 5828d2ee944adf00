//! FILENAME: remote-backend/src/lib.rs
//! Live HTTP backend speaking either AFM dialect.
//!
//! Layers:
//! - `transport`: the HTTP seam (reqwest in production, scripted in tests)
//! - `protocol`: endpoints and response bodies per dialect
//! - `pages`: stitching full reads from server-capped windows
//! - `backend`: ExecutionBackend / ExecutionResult implementations

pub mod backend;
pub mod config;
mod pages;
pub mod protocol;
pub mod transport;

pub use backend::{RemoteBackend, RemoteResult};
pub use config::RemoteBackendConfig;
pub use transport::{AfmTransport, HttpTransport, TransportResponse};
