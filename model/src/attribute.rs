//! FILENAME: model/src/attribute.rs
//! Attributes - the slicing side of an execution.

use serde::{Deserialize, Serialize};
use crate::objref::{Identifier, ObjRef};

/// An attribute placed into an execution, referenced through one of its display forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// Identifier of this attribute within the execution.
    pub local_identifier: Identifier,

    /// Display form whose values are used as attribute elements.
    pub display_form: ObjRef,

    /// Optional alias overriding the display form title in result headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Attribute {
    /// Creates a new attribute with a local identifier derived from the display form.
    pub fn new(display_form: ObjRef) -> Self {
        let local_identifier = format!("a_{}", display_form.local_id_fragment());
        Attribute {
            local_identifier,
            display_form,
            alias: None,
        }
    }

    pub fn with_local_id(mut self, local_id: impl Into<String>) -> Self {
        self.local_identifier = local_id.into();
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn local_id(&self) -> &str {
        &self.local_identifier
    }
}

/// Finds an attribute by local identifier.
pub fn attributes_find<'a>(attributes: &'a [Attribute], local_id: &str) -> Option<&'a Attribute> {
    attributes.iter().find(|a| a.local_identifier == local_id)
}
