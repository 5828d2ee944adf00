//! FILENAME: model/src/lib.rs
//! Declarative analytical execution model.
//!
//! This crate holds the immutable value types describing WHAT to compute,
//! independent of any backend.
//!
//! Layers:
//! - `objref`, `attribute`, `measure`, `filter`, `sort`, `dimension`: model values
//! - `bucket`, `insight`: authoring-time inputs
//! - `definition`: the assembled ExecutionDefinition
//! - `fingerprint`: canonical content identity of a definition
//! - `validation`: executability check before submission

pub mod attribute;
pub mod bucket;
pub mod definition;
pub mod dimension;
mod error;
pub mod filter;
pub mod fingerprint;
pub mod insight;
pub mod measure;
pub mod objref;
pub mod sort;
pub mod validation;

pub use attribute::*;
pub use bucket::*;
pub use definition::ExecutionDefinition;
pub use dimension::*;
pub use error::ModelError;
pub use filter::*;
pub use fingerprint::{Fingerprint, FingerprintBuilder};
pub use insight::InsightDefinition;
pub use measure::*;
pub use objref::*;
pub use sort::*;
pub use validation::check_executable;
