//! FILENAME: model/src/objref.rs
//! Object references - how the model points at catalog objects.
//!
//! A reference is either a URI or an identifier. Identifier references may
//! carry the object type; backends that need a type (Tiger) fall back to a
//! type implied by the place where the reference is used.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Local identifier of an attribute or measure within one execution definition.
pub type Identifier = String;

/// Types of catalog objects an identifier reference can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectType {
    Attribute,
    DisplayForm,
    Measure,
    Fact,
    DataSet,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Attribute => "attribute",
            ObjectType::DisplayForm => "displayForm",
            ObjectType::Measure => "measure",
            ObjectType::Fact => "fact",
            ObjectType::DataSet => "dataSet",
        }
    }
}

/// Reference to a catalog object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjRef {
    Uri {
        uri: String,
    },
    Identifier {
        identifier: String,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        obj_type: Option<ObjectType>,
    },
}

impl ObjRef {
    pub fn uri(uri: impl Into<String>) -> Self {
        ObjRef::Uri { uri: uri.into() }
    }

    pub fn identifier(identifier: impl Into<String>) -> Self {
        ObjRef::Identifier {
            identifier: identifier.into(),
            obj_type: None,
        }
    }

    pub fn typed(identifier: impl Into<String>, obj_type: ObjectType) -> Self {
        ObjRef::Identifier {
            identifier: identifier.into(),
            obj_type: Some(obj_type),
        }
    }

    /// The identifier or URI, whichever this reference holds.
    pub fn id_or_uri(&self) -> &str {
        match self {
            ObjRef::Uri { uri } => uri,
            ObjRef::Identifier { identifier, .. } => identifier,
        }
    }

    pub fn obj_type(&self) -> Option<ObjectType> {
        match self {
            ObjRef::Uri { .. } => None,
            ObjRef::Identifier { obj_type, .. } => *obj_type,
        }
    }

    pub fn is_uri(&self) -> bool {
        matches!(self, ObjRef::Uri { .. })
    }

    /// Turns the reference into a fragment usable inside a generated local identifier.
    pub(crate) fn local_id_fragment(&self) -> String {
        self.id_or_uri()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjRef::Uri { uri } => write!(f, "uri:{}", uri),
            ObjRef::Identifier { identifier, obj_type: Some(t) } => {
                write!(f, "{}:{}", t.as_str(), identifier)
            }
            ObjRef::Identifier { identifier, obj_type: None } => write!(f, "id:{}", identifier),
        }
    }
}

/// Reference that may also point at an object defined inside the execution
/// (a measure by its local identifier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjRefInScope {
    LocalId {
        #[serde(rename = "localIdentifier")]
        local_identifier: Identifier,
    },
    Ref(ObjRef),
}

impl ObjRefInScope {
    pub fn local_id(id: impl Into<String>) -> Self {
        ObjRefInScope::LocalId {
            local_identifier: id.into(),
        }
    }
}

impl From<ObjRef> for ObjRefInScope {
    fn from(value: ObjRef) -> Self {
        ObjRefInScope::Ref(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_ref_json_shape() {
        let json = serde_json::to_string(&ObjRef::identifier("label.region")).unwrap();
        assert_eq!(json, r#"{"identifier":"label.region"}"#);

        let typed = serde_json::to_string(&ObjRef::typed("fact.amount", ObjectType::Fact)).unwrap();
        assert_eq!(typed, r#"{"identifier":"fact.amount","type":"fact"}"#);
    }

    #[test]
    fn test_in_scope_local_id_is_distinguished() {
        let parsed: ObjRefInScope = serde_json::from_str(r#"{"localIdentifier":"m1"}"#).unwrap();
        assert_eq!(parsed, ObjRefInScope::local_id("m1"));

        let parsed: ObjRefInScope = serde_json::from_str(r#"{"uri":"/gdc/md/1"}"#).unwrap();
        assert_eq!(parsed, ObjRefInScope::Ref(ObjRef::uri("/gdc/md/1")));
    }

    #[test]
    fn test_local_id_fragment() {
        assert_eq!(ObjRef::identifier("label.region.name").local_id_fragment(), "label_region_name");
        assert_eq!(ObjRef::uri("/gdc/md/obj/1").local_id_fragment(), "_gdc_md_obj_1");
    }
}
