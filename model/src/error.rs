//! FILENAME: model/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Duplicate local identifier: {0}")]
    DuplicateLocalId(String),

    #[error("Reserved local identifier: {0}")]
    ReservedLocalId(String),

    #[error("measureGroup is placed in more than one dimension")]
    MeasureGroupInMultipleDimensions,

    #[error("Definition has measures but no dimension contains measureGroup")]
    MissingMeasureGroup,

    #[error("Definition has no dimensions")]
    NoDimensions,

    #[error("Unknown {kind}: {id}")]
    UnknownLocalId { kind: &'static str, id: String },

    #[error("Attribute placed in more than one dimension: {0}")]
    AttributeInMultipleDimensions(String),

    #[error("Attribute is not placed in any dimension: {0}")]
    AttributeNotInDimension(String),

    #[error("Total of {measure} references attribute {attribute} outside its dimension")]
    TotalOutsideDimension { measure: String, attribute: String },

    #[error("Measure references itself: {0}")]
    SelfReference(String),

    #[error("Circular measure reference: {0}")]
    CircularMeasureReference(String),

    #[error("Invalid definition: {0}")]
    Invalid(String),
}
