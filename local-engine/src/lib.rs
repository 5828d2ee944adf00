//! FILENAME: local-engine/src/lib.rs
//! Local engine - an in-process live backend.
//!
//! Computes execution results over an in-memory [`Dataset`]:
//! - `dataset`: columnar data with interned label values
//! - `filter`: record filtering by attribute elements and absolute dates
//! - `cube`: per-tuple aggregation, derived measures, measure value filters
//!   and native roll-ups
//! - `layout`: dimensions, sorting, grand totals and window slicing
//! - `engine`: the [`backend_spi::ExecutionBackend`] implementation
//!
//! The cube only depends on the data part of a definition, so a transformed
//! execution with the same data reuses it instead of aggregating again.

pub mod config;
pub mod cube;
pub mod dataset;
pub mod engine;
mod error;
mod filter;
pub mod layout;

pub use config::LocalEngineConfig;
pub use cube::{Cube, GroupKey};
pub use dataset::{ColumnSource, Dataset, DatasetBuilder, DatasetSource, ValueId, VALUE_ID_EMPTY};
pub use engine::{EngineStats, LocalEngine, LocalResult};
pub use error::DatasetError;
pub use layout::Layout;
