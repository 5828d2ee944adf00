//! FILENAME: backend-spi/src/results.rs
//! Result shape metadata, header items and data values.
//!
//! These types follow the JSON shapes backends return and recordings store,
//! so they serialize directly into fixture files.

use serde::{Deserialize, Serialize};
use model::Identifier;

// ============================================================================
// DIMENSION DESCRIPTORS
// ============================================================================

/// Display form and attribute a header belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeFormOf {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalDescriptor {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalDescriptorItem {
    pub total_header_item: TotalDescriptor,
}

/// Header describing one attribute laid out in a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDescriptor {
    pub local_identifier: Identifier,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub form_of: AttributeFormOf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub total_items: Vec<TotalDescriptorItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureDescriptor {
    pub local_identifier: Identifier,
    pub name: String,
    #[serde(default)]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureDescriptorItem {
    pub measure_header_item: MeasureDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureGroupDescriptor {
    pub items: Vec<MeasureDescriptorItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimensionHeader {
    #[serde(rename = "attributeHeader")]
    Attribute(AttributeDescriptor),
    #[serde(rename = "measureGroupHeader")]
    MeasureGroup(MeasureGroupDescriptor),
}

/// Shape metadata of one result dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionDescriptor {
    pub headers: Vec<DimensionHeader>,
}

impl DimensionDescriptor {
    pub fn attribute_descriptors(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.headers.iter().filter_map(|h| match h {
            DimensionHeader::Attribute(a) => Some(a),
            DimensionHeader::MeasureGroup(_) => None,
        })
    }

    pub fn measure_group(&self) -> Option<&MeasureGroupDescriptor> {
        self.headers.iter().find_map(|h| match h {
            DimensionHeader::MeasureGroup(m) => Some(m),
            DimensionHeader::Attribute(_) => None,
        })
    }
}

// ============================================================================
// HEADER ITEMS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeHeaderItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureHeaderItem {
    pub name: String,
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalHeaderItem {
    pub name: String,
    #[serde(rename = "type")]
    pub total_type: String,
}

/// One entry of `headerItems[dimension][header]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultHeader {
    #[serde(rename = "attributeHeaderItem")]
    Attribute(AttributeHeaderItem),
    #[serde(rename = "measureHeaderItem")]
    Measure(MeasureHeaderItem),
    #[serde(rename = "totalHeaderItem")]
    Total(TotalHeaderItem),
}

impl ResultHeader {
    pub fn attribute(name: Option<String>, uri: Option<String>) -> Self {
        ResultHeader::Attribute(AttributeHeaderItem { uri, name })
    }

    pub fn measure(name: impl Into<String>, order: usize) -> Self {
        ResultHeader::Measure(MeasureHeaderItem {
            name: name.into(),
            order,
        })
    }

    pub fn total(name: impl Into<String>, total_type: impl Into<String>) -> Self {
        ResultHeader::Total(TotalHeaderItem {
            name: name.into(),
            total_type: total_type.into(),
        })
    }

    /// Display name of the header, `None` for an attribute element without a value.
    pub fn name(&self) -> Option<&str> {
        match self {
            ResultHeader::Attribute(a) => a.name.as_deref(),
            ResultHeader::Measure(m) => Some(&m.name),
            ResultHeader::Total(t) => Some(&t.name),
        }
    }
}

// ============================================================================
// DATA
// ============================================================================

/// A single computed value. Backends may send numbers as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Null,
    Number(f64),
    Text(String),
}

impl DataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Null => None,
            DataValue::Number(n) => Some(*n),
            DataValue::Text(s) => s.parse().ok(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }
}

impl From<Option<f64>> for DataValue {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => DataValue::Number(v),
            None => DataValue::Null,
        }
    }
}

/// Result data: one row per element of the first dimension, or a flat
/// vector when the result has a single dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataMatrix {
    TwoDim(Vec<Vec<DataValue>>),
    OneDim(Vec<DataValue>),
}

impl Default for DataMatrix {
    fn default() -> Self {
        DataMatrix::TwoDim(Vec::new())
    }
}

impl DataMatrix {
    /// Value at `(row, col)`; a one-dimensional matrix only has row 0.
    pub fn get(&self, row: usize, col: usize) -> Option<&DataValue> {
        match self {
            DataMatrix::TwoDim(rows) => rows.get(row).and_then(|r| r.get(col)),
            DataMatrix::OneDim(values) if row == 0 => values.get(col),
            DataMatrix::OneDim(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            DataMatrix::TwoDim(rows) => rows.is_empty(),
            DataMatrix::OneDim(values) => values.is_empty(),
        }
    }
}
