//! FILENAME: model/src/sort.rs
//! Sort items of an execution.

use serde::{Deserialize, Serialize};
use crate::objref::Identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Asc
    }
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Attribute sorts may order elements by the sum of their measure values instead of by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortAggregation {
    Sum,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSortItem {
    pub direction: SortDirection,
    pub attribute_identifier: Identifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<SortAggregation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeLocator {
    pub attribute_identifier: Identifier,
    /// Element (URI or value) the locator pins.
    pub element: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureLocator {
    pub measure_identifier: Identifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocatorItem {
    #[serde(rename = "attributeLocatorItem")]
    Attribute(AttributeLocator),
    #[serde(rename = "measureLocatorItem")]
    Measure(MeasureLocator),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureSortItem {
    pub direction: SortDirection,
    pub locators: Vec<LocatorItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortItem {
    #[serde(rename = "attributeSortItem")]
    Attribute(AttributeSortItem),
    #[serde(rename = "measureSortItem")]
    Measure(MeasureSortItem),
}

/// Local ids referenced by a sort item, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortEntityIds {
    pub attribute_identifiers: Vec<Identifier>,
    pub measure_identifiers: Vec<Identifier>,
}

impl SortItem {
    pub fn direction(&self) -> SortDirection {
        match self {
            SortItem::Attribute(a) => a.direction,
            SortItem::Measure(m) => m.direction,
        }
    }

    pub fn entity_ids(&self) -> SortEntityIds {
        let mut ids = SortEntityIds::default();
        match self {
            SortItem::Attribute(a) => ids.attribute_identifiers.push(a.attribute_identifier.clone()),
            SortItem::Measure(m) => {
                for locator in &m.locators {
                    match locator {
                        LocatorItem::Attribute(l) => {
                            ids.attribute_identifiers.push(l.attribute_identifier.clone())
                        }
                        LocatorItem::Measure(l) => {
                            ids.measure_identifiers.push(l.measure_identifier.clone())
                        }
                    }
                }
            }
        }
        ids
    }
}

pub fn new_attribute_sort(
    attribute_id: impl Into<String>,
    direction: SortDirection,
    aggregated: bool,
) -> SortItem {
    SortItem::Attribute(AttributeSortItem {
        direction,
        attribute_identifier: attribute_id.into(),
        aggregation: if aggregated { Some(SortAggregation::Sum) } else { None },
    })
}

pub fn new_attribute_locator(attribute_id: impl Into<String>, element: impl Into<String>) -> LocatorItem {
    LocatorItem::Attribute(AttributeLocator {
        attribute_identifier: attribute_id.into(),
        element: element.into(),
    })
}

/// Measure sort; attribute locators come first, the measure locator last.
pub fn new_measure_sort(
    measure_id: impl Into<String>,
    direction: SortDirection,
    attribute_locators: Vec<LocatorItem>,
) -> SortItem {
    let mut locators = attribute_locators;
    locators.push(LocatorItem::Measure(MeasureLocator {
        measure_identifier: measure_id.into(),
    }));
    SortItem::Measure(MeasureSortItem { direction, locators })
}
