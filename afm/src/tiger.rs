//! FILENAME: afm/src/tiger.rs
//! Tiger AFM payload and its compiler.
//!
//! Shape: `{"project", "execution": {...}, "resultSpec": {...}}`. Object
//! references are `{"identifier": {"id", "type"}}`, local ids are
//! `{"localIdentifier"}` objects, aggregations are uppercase. Tiger cannot
//! address objects by URI and has neither totals nor measure value filters.

use serde::{Deserialize, Serialize};
use model::{
    ArithmeticOperator, AttributeElements, DateGranularity, ExecutionDefinition, Filter, Identifier,
    LocatorItem, MeasureAggregation, MeasureDefinition, ObjRef, ObjectType, SortDirection, SortItem,
};

use crate::error::AfmError;

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub project: String,
    pub execution: Afm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_spec: Option<ResultSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Afm {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<MeasureItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedIdentifier {
    pub id: String,
    #[serde(rename = "type")]
    pub obj_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjQualifier {
    pub identifier: TypedIdentifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalIdQualifier {
    pub local_identifier: Identifier,
}

impl LocalIdQualifier {
    fn new(id: &str) -> Self {
        LocalIdQualifier {
            local_identifier: id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeItem {
    pub local_identifier: Identifier,
    pub display_form: ObjQualifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureItem {
    pub local_identifier: Identifier,
    pub definition: MeasureDefinitionItem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleMeasureItem {
    pub item: ObjQualifier,
    /// Uppercase aggregation name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_ratio: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArithmeticMeasureItem {
    pub measure_identifiers: Vec<LocalIdQualifier>,
    pub operator: ArithmeticOperator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopMeasureItem {
    pub measure_identifier: LocalIdQualifier,
    pub pop_attribute: ObjQualifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateDataSetItem {
    pub data_set: ObjQualifier,
    pub periods_ago: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousPeriodMeasureItem {
    pub measure_identifier: LocalIdQualifier,
    pub date_data_sets: Vec<DateDataSetItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasureDefinitionItem {
    #[serde(rename = "measure")]
    Simple(SimpleMeasureItem),
    #[serde(rename = "arithmeticMeasure")]
    Arithmetic(ArithmeticMeasureItem),
    #[serde(rename = "popMeasure")]
    PoP(PopMeasureItem),
    #[serde(rename = "previousPeriodMeasure")]
    PreviousPeriod(PreviousPeriodMeasureItem),
}

/// Tiger sends URI element lists as plain arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementsItem {
    Uris(Vec<String>),
    Values { values: Vec<String> },
}

impl From<&AttributeElements> for ElementsItem {
    fn from(value: &AttributeElements) -> Self {
        match value {
            AttributeElements::ByUri { uris } => ElementsItem::Uris(uris.clone()),
            AttributeElements::ByValue { values } => ElementsItem::Values {
                values: values.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositiveAttributeFilterItem {
    pub display_form: ObjQualifier,
    #[serde(rename = "in")]
    pub in_elements: ElementsItem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegativeAttributeFilterItem {
    pub display_form: ObjQualifier,
    pub not_in: ElementsItem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsoluteDateFilterItem {
    pub data_set: ObjQualifier,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelativeDateFilterItem {
    pub data_set: ObjQualifier,
    pub granularity: DateGranularity,
    pub from: i32,
    pub to: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterItem {
    #[serde(rename = "positiveAttributeFilter")]
    PositiveAttribute(PositiveAttributeFilterItem),
    #[serde(rename = "negativeAttributeFilter")]
    NegativeAttribute(NegativeAttributeFilterItem),
    #[serde(rename = "absoluteDateFilter")]
    AbsoluteDate(AbsoluteDateFilterItem),
    #[serde(rename = "relativeDateFilter")]
    RelativeDate(RelativeDateFilterItem),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<DimensionItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sorts: Vec<SortItemWire>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionItem {
    pub item_identifiers: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSortItemWire {
    pub direction: SortDirection,
    pub attribute_identifier: LocalIdQualifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeLocatorWire {
    pub attribute_identifier: LocalIdQualifier,
    pub element: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureLocatorWire {
    pub measure_identifier: LocalIdQualifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocatorWire {
    #[serde(rename = "attributeLocatorItem")]
    Attribute(AttributeLocatorWire),
    #[serde(rename = "measureLocatorItem")]
    Measure(MeasureLocatorWire),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureSortItemWire {
    pub direction: SortDirection,
    pub locators: Vec<LocatorWire>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortItemWire {
    #[serde(rename = "attributeSortItem")]
    Attribute(AttributeSortItemWire),
    #[serde(rename = "measureSortItem")]
    Measure(MeasureSortItemWire),
}

// ============================================================================
// COMPILER
// ============================================================================

pub fn to_afm_execution(definition: &ExecutionDefinition) -> Result<Execution, AfmError> {
    let attributes = definition
        .attributes()
        .iter()
        .map(|a| {
            Ok(AttributeItem {
                local_identifier: a.local_identifier.clone(),
                display_form: convert_ref(&a.display_form, "label")?,
                alias: a.alias.clone(),
            })
        })
        .collect::<Result<Vec<_>, AfmError>>()?;

    let measures = definition
        .measures()
        .iter()
        .map(|m| {
            Ok(MeasureItem {
                local_identifier: m.local_identifier.clone(),
                definition: convert_measure_definition(&m.definition)?,
                alias: m.alias.clone(),
                format: m.format.clone(),
            })
        })
        .collect::<Result<Vec<_>, AfmError>>()?;

    let mut filters = Vec::new();
    for filter in definition.filters() {
        if let Some(item) = convert_filter(filter)? {
            filters.push(item);
        }
    }

    if definition.dimensions().iter().any(|d| !d.totals.is_empty()) {
        return Err(AfmError::NotSupported("Tiger does not support totals".to_string()));
    }

    let result_spec = ResultSpec {
        dimensions: definition
            .dimensions()
            .iter()
            .map(|d| DimensionItem {
                item_identifiers: d.item_identifiers.clone(),
            })
            .collect(),
        sorts: definition.sort_by().iter().map(convert_sort).collect(),
    };

    Ok(Execution {
        project: definition.workspace().to_string(),
        execution: Afm {
            attributes,
            measures,
            filters,
        },
        result_spec: Some(result_spec),
    })
}

fn tiger_type(obj_type: ObjectType) -> &'static str {
    match obj_type {
        ObjectType::Attribute => "attribute",
        ObjectType::DisplayForm => "label",
        ObjectType::Measure => "metric",
        ObjectType::Fact => "fact",
        ObjectType::DataSet => "dataset",
    }
}

/// Untyped identifiers take the type implied by where they are used.
fn convert_ref(r: &ObjRef, implied_type: &str) -> Result<ObjQualifier, AfmError> {
    match r {
        ObjRef::Uri { uri } => Err(AfmError::NotSupported(format!(
            "Tiger does not support URI references: {}",
            uri
        ))),
        ObjRef::Identifier { identifier, obj_type } => Ok(ObjQualifier {
            identifier: TypedIdentifier {
                id: identifier.clone(),
                obj_type: obj_type.map(tiger_type).unwrap_or(implied_type).to_string(),
            },
        }),
    }
}

fn aggregation_name(aggregation: MeasureAggregation) -> String {
    aggregation.as_str().to_uppercase()
}

fn convert_measure_definition(definition: &MeasureDefinition) -> Result<MeasureDefinitionItem, AfmError> {
    let item = match definition {
        MeasureDefinition::Simple(s) => {
            // An aggregated item is a fact; a bare item is a metric.
            let implied = if s.aggregation.is_some() { "fact" } else { "metric" };
            let mut filters = Vec::new();
            for f in s.filters.iter().filter(|f| !f.is_empty()) {
                if let Some(item) = convert_filter(&Filter::from(f.clone()))? {
                    filters.push(item);
                }
            }
            MeasureDefinitionItem::Simple(SimpleMeasureItem {
                item: convert_ref(&s.item, implied)?,
                aggregation: s.aggregation.map(aggregation_name),
                filters,
                compute_ratio: if s.compute_ratio { Some(true) } else { None },
            })
        }
        MeasureDefinition::Arithmetic(a) => MeasureDefinitionItem::Arithmetic(ArithmeticMeasureItem {
            measure_identifiers: a.measure_identifiers.iter().map(|id| LocalIdQualifier::new(id)).collect(),
            operator: a.operator,
        }),
        MeasureDefinition::PoP(p) => MeasureDefinitionItem::PoP(PopMeasureItem {
            measure_identifier: LocalIdQualifier::new(&p.measure_identifier),
            pop_attribute: convert_ref(&p.pop_attribute, "attribute")?,
        }),
        MeasureDefinition::PreviousPeriod(p) => {
            let date_data_sets = p
                .date_data_sets
                .iter()
                .map(|ds| {
                    Ok(DateDataSetItem {
                        data_set: convert_ref(&ds.data_set, "dataset")?,
                        periods_ago: ds.periods_ago,
                    })
                })
                .collect::<Result<Vec<_>, AfmError>>()?;
            MeasureDefinitionItem::PreviousPeriod(PreviousPeriodMeasureItem {
                measure_identifier: LocalIdQualifier::new(&p.measure_identifier),
                date_data_sets,
            })
        }
    };
    Ok(item)
}

fn convert_filter(filter: &Filter) -> Result<Option<FilterItem>, AfmError> {
    if filter.is_empty() {
        return Ok(None);
    }
    let item = match filter {
        Filter::PositiveAttribute(f) => FilterItem::PositiveAttribute(PositiveAttributeFilterItem {
            display_form: convert_ref(&f.display_form, "label")?,
            in_elements: ElementsItem::from(&f.in_elements),
        }),
        Filter::NegativeAttribute(f) => FilterItem::NegativeAttribute(NegativeAttributeFilterItem {
            display_form: convert_ref(&f.display_form, "label")?,
            not_in: ElementsItem::from(&f.not_in),
        }),
        Filter::AbsoluteDate(f) => FilterItem::AbsoluteDate(AbsoluteDateFilterItem {
            data_set: convert_ref(&f.data_set, "dataset")?,
            from: f.from.clone(),
            to: f.to.clone(),
        }),
        Filter::RelativeDate(f) => FilterItem::RelativeDate(RelativeDateFilterItem {
            data_set: convert_ref(&f.data_set, "dataset")?,
            granularity: f.granularity,
            from: f.from,
            to: f.to,
        }),
        Filter::MeasureValue(_) => {
            return Err(AfmError::NotSupported(
                "Tiger does not support measure value filters".to_string(),
            ))
        }
    };
    Ok(Some(item))
}

fn convert_sort(sort: &SortItem) -> SortItemWire {
    match sort {
        SortItem::Attribute(a) => SortItemWire::Attribute(AttributeSortItemWire {
            direction: a.direction,
            attribute_identifier: LocalIdQualifier::new(&a.attribute_identifier),
            aggregation: a.aggregation.map(|_| "sum".to_string()),
        }),
        SortItem::Measure(m) => SortItemWire::Measure(MeasureSortItemWire {
            direction: m.direction,
            locators: m
                .locators
                .iter()
                .map(|l| match l {
                    LocatorItem::Attribute(a) => LocatorWire::Attribute(AttributeLocatorWire {
                        attribute_identifier: LocalIdQualifier::new(&a.attribute_identifier),
                        element: a.element.clone(),
                    }),
                    LocatorItem::Measure(m) => LocatorWire::Measure(MeasureLocatorWire {
                        measure_identifier: LocalIdQualifier::new(&m.measure_identifier),
                    }),
                })
                .collect(),
        }),
    }
}
