//! FILENAME: afm/src/bear.rs
//! Bear AFM payload and its compiler.
//!
//! Shape: `{"execution": {"afm": {...}, "resultSpec": {...}}}`. Object
//! references are `{"uri"}` or `{"identifier"}`, local ids are plain strings,
//! aggregations are lowercase. Native totals are repeated in
//! `afm.nativeTotals` with the attributes preceding the total's attribute.

use serde::{Deserialize, Serialize};
use model::{
    ArithmeticOperator, AttributeElements, DateGranularity, ExecutionDefinition, Filter, Identifier,
    LocatorItem, MeasureAggregation, MeasureDefinition, MeasureFilter, MeasureValueCondition, ObjRef,
    ObjRefInScope, SortDirection, SortItem, TotalType,
};

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub execution: AfmExecution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AfmExecution {
    pub afm: Afm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_spec: Option<ResultSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Afm {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<MeasureItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub native_totals: Vec<NativeTotalItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjQualifier {
    Uri { uri: String },
    Identifier { identifier: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasureQualifier {
    LocalId {
        #[serde(rename = "localIdentifier")]
        local_identifier: Identifier,
    },
    Obj(ObjQualifier),
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<MeasureAggregation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_ratio: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArithmeticMeasureItem {
    pub measure_identifiers: Vec<Identifier>,
    pub operator: ArithmeticOperator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopMeasureItem {
    pub measure_identifier: Identifier,
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
    pub measure_identifier: Identifier,
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositiveAttributeFilterItem {
    pub display_form: ObjQualifier,
    #[serde(rename = "in")]
    pub in_elements: AttributeElements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegativeAttributeFilterItem {
    pub display_form: ObjQualifier,
    pub not_in: AttributeElements,
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
pub struct MeasureValueFilterItem {
    pub measure: MeasureQualifier,
    pub condition: MeasureValueCondition,
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
    #[serde(rename = "measureValueFilter")]
    MeasureValue(MeasureValueFilterItem),
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
pub struct TotalItem {
    pub measure_identifier: Identifier,
    #[serde(rename = "type")]
    pub total_type: TotalType,
    pub attribute_identifier: Identifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTotalItem {
    pub measure_identifier: Identifier,
    pub attribute_identifiers: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionItem {
    pub item_identifiers: Vec<Identifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub totals: Vec<TotalItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSortItemWire {
    pub direction: SortDirection,
    pub attribute_identifier: Identifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeLocatorWire {
    pub attribute_identifier: Identifier,
    pub element: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureLocatorWire {
    pub measure_identifier: Identifier,
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

/// Compiles a definition into a Bear execution. Every definition compiles.
pub fn to_afm_execution(definition: &ExecutionDefinition) -> Execution {
    let afm = Afm {
        attributes: definition
            .attributes()
            .iter()
            .map(|a| AttributeItem {
                local_identifier: a.local_identifier.clone(),
                display_form: convert_ref(&a.display_form),
                alias: a.alias.clone(),
            })
            .collect(),
        measures: definition
            .measures()
            .iter()
            .map(|m| MeasureItem {
                local_identifier: m.local_identifier.clone(),
                definition: convert_measure_definition(&m.definition),
                alias: m.alias.clone(),
                format: m.format.clone(),
            })
            .collect(),
        filters: definition.filters().iter().filter_map(convert_filter).collect(),
        native_totals: convert_native_totals(definition),
    };

    let result_spec = ResultSpec {
        dimensions: definition
            .dimensions()
            .iter()
            .map(|d| DimensionItem {
                item_identifiers: d.item_identifiers.clone(),
                totals: d
                    .totals
                    .iter()
                    .map(|t| TotalItem {
                        measure_identifier: t.measure_identifier.clone(),
                        total_type: t.total_type,
                        attribute_identifier: t.attribute_identifier.clone(),
                    })
                    .collect(),
            })
            .collect(),
        sorts: definition.sort_by().iter().map(convert_sort).collect(),
    };

    Execution {
        execution: AfmExecution {
            afm,
            result_spec: Some(result_spec),
        },
    }
}

fn convert_ref(r: &ObjRef) -> ObjQualifier {
    match r {
        ObjRef::Uri { uri } => ObjQualifier::Uri { uri: uri.clone() },
        ObjRef::Identifier { identifier, .. } => ObjQualifier::Identifier {
            identifier: identifier.clone(),
        },
    }
}

fn convert_measure_definition(definition: &MeasureDefinition) -> MeasureDefinitionItem {
    match definition {
        MeasureDefinition::Simple(s) => MeasureDefinitionItem::Simple(SimpleMeasureItem {
            item: convert_ref(&s.item),
            aggregation: s.aggregation,
            filters: s
                .filters
                .iter()
                .filter(|f| !f.is_empty())
                .filter_map(|f: &MeasureFilter| convert_filter(&Filter::from(f.clone())))
                .collect(),
            compute_ratio: if s.compute_ratio { Some(true) } else { None },
        }),
        MeasureDefinition::Arithmetic(a) => MeasureDefinitionItem::Arithmetic(ArithmeticMeasureItem {
            measure_identifiers: a.measure_identifiers.clone(),
            operator: a.operator,
        }),
        MeasureDefinition::PoP(p) => MeasureDefinitionItem::PoP(PopMeasureItem {
            measure_identifier: p.measure_identifier.clone(),
            pop_attribute: convert_ref(&p.pop_attribute),
        }),
        MeasureDefinition::PreviousPeriod(p) => {
            MeasureDefinitionItem::PreviousPeriod(PreviousPeriodMeasureItem {
                measure_identifier: p.measure_identifier.clone(),
                date_data_sets: p
                    .date_data_sets
                    .iter()
                    .map(|ds| DateDataSetItem {
                        data_set: convert_ref(&ds.data_set),
                        periods_ago: ds.periods_ago,
                    })
                    .collect(),
            })
        }
    }
}

/// Empty attribute filters and measure value filters without a condition
/// do not restrict anything and are omitted.
fn convert_filter(filter: &Filter) -> Option<FilterItem> {
    if filter.is_empty() {
        return None;
    }
    match filter {
        Filter::PositiveAttribute(f) => Some(FilterItem::PositiveAttribute(PositiveAttributeFilterItem {
            display_form: convert_ref(&f.display_form),
            in_elements: f.in_elements.clone(),
        })),
        Filter::NegativeAttribute(f) => Some(FilterItem::NegativeAttribute(NegativeAttributeFilterItem {
            display_form: convert_ref(&f.display_form),
            not_in: f.not_in.clone(),
        })),
        Filter::AbsoluteDate(f) => Some(FilterItem::AbsoluteDate(AbsoluteDateFilterItem {
            data_set: convert_ref(&f.data_set),
            from: f.from.clone(),
            to: f.to.clone(),
        })),
        Filter::RelativeDate(f) => Some(FilterItem::RelativeDate(RelativeDateFilterItem {
            data_set: convert_ref(&f.data_set),
            granularity: f.granularity,
            from: f.from,
            to: f.to,
        })),
        Filter::MeasureValue(f) => {
            let condition = f.condition.clone()?;
            let measure = match &f.measure {
                ObjRefInScope::LocalId { local_identifier } => MeasureQualifier::LocalId {
                    local_identifier: local_identifier.clone(),
                },
                ObjRefInScope::Ref(r) => MeasureQualifier::Obj(convert_ref(r)),
            };
            Some(FilterItem::MeasureValue(MeasureValueFilterItem { measure, condition }))
        }
    }
}

fn convert_sort(sort: &SortItem) -> SortItemWire {
    match sort {
        SortItem::Attribute(a) => SortItemWire::Attribute(AttributeSortItemWire {
            direction: a.direction,
            attribute_identifier: a.attribute_identifier.clone(),
            aggregation: a.aggregation.map(|_| "sum".to_string()),
        }),
        SortItem::Measure(m) => SortItemWire::Measure(MeasureSortItemWire {
            direction: m.direction,
            locators: m
                .locators
                .iter()
                .map(|l| match l {
                    LocatorItem::Attribute(a) => LocatorWire::Attribute(AttributeLocatorWire {
                        attribute_identifier: a.attribute_identifier.clone(),
                        element: a.element.clone(),
                    }),
                    LocatorItem::Measure(m) => LocatorWire::Measure(MeasureLocatorWire {
                        measure_identifier: m.measure_identifier.clone(),
                    }),
                })
                .collect(),
        }),
    }
}

/// Native totals grouped by the attributes preceding the total's attribute in its dimension.
fn convert_native_totals(definition: &ExecutionDefinition) -> Vec<NativeTotalItem> {
    let mut result = Vec::new();
    for dim in definition.dimensions() {
        for total in dim.totals.iter().filter(|t| t.total_type == TotalType::Nat) {
            let attribute_identifiers: Vec<Identifier> = dim
                .attribute_identifiers()
                .take_while(|id| *id != total.attribute_identifier)
                .map(|id| id.to_string())
                .collect();
            result.push(NativeTotalItem {
                measure_identifier: total.measure_identifier.clone(),
                attribute_identifiers,
            });
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        new_dimension, Attribute, ComparisonOperator, DimensionSpec, Measure, Total, MEASURE_GROUP,
    };
    use serde_json::json;

    fn sales_definition() -> ExecutionDefinition {
        ExecutionDefinition::new(
            "test",
            vec![Attribute::new(ObjRef::identifier("df1")).with_local_id("region")],
            vec![Measure::simple(ObjRef::identifier("m1"))
                .aggregation(MeasureAggregation::Sum)
                .local_id("sales")
                .build()],
            vec![],
        )
        .unwrap()
        .with_dimensions(&[
            DimensionSpec::from(new_dimension(["region"], vec![])),
            DimensionSpec::from(new_dimension([MEASURE_GROUP], vec![])),
        ])
        .unwrap()
    }

    #[test]
    fn test_sales_by_region_payload() {
        let payload = serde_json::to_value(to_afm_execution(&sales_definition())).unwrap();
        assert_eq!(
            payload,
            json!({
                "execution": {
                    "afm": {
                        "attributes": [
                            { "localIdentifier": "region", "displayForm": { "identifier": "df1" } }
                        ],
                        "measures": [
                            {
                                "localIdentifier": "sales",
                                "definition": {
                                    "measure": {
                                        "item": { "identifier": "m1" },
                                        "aggregation": "sum"
                                    }
                                }
                            }
                        ]
                    },
                    "resultSpec": {
                        "dimensions": [
                            { "itemIdentifiers": ["region"] },
                            { "itemIdentifiers": ["measureGroup"] }
                        ]
                    }
                }
            })
        );
    }

    #[test]
    fn test_empty_attribute_filters_are_omitted() {
        let def = sales_definition().with_filters(vec![Filter::positive_values(ObjRef::identifier("df1"), vec![])]);
        let payload = serde_json::to_value(to_afm_execution(&def)).unwrap();
        assert!(payload["execution"]["afm"].get("filters").is_none());
        assert_eq!(to_afm_execution(&def), to_afm_execution(&sales_definition()));
    }

    #[test]
    fn test_empty_measure_filter_is_omitted() {
        let def = ExecutionDefinition::new(
            "test",
            vec![],
            vec![Measure::simple(ObjRef::uri("/gdc/md/m1"))
                .filter(MeasureFilter::try_from(Filter::negative_values(ObjRef::identifier("df1"), vec![])).unwrap())
                .compute_ratio(true)
                .local_id("m")
                .build()],
            vec![],
        )
        .unwrap();
        let payload = serde_json::to_value(to_afm_execution(&def)).unwrap();
        let simple = &payload["execution"]["afm"]["measures"][0]["definition"]["measure"];
        assert_eq!(simple["item"], json!({ "uri": "/gdc/md/m1" }));
        assert!(simple.get("filters").is_none());
        assert_eq!(simple["computeRatio"], json!(true));
    }

    #[test]
    fn test_measure_value_filter_and_sorts() {
        let def = sales_definition()
            .with_filters(vec![
                Filter::comparison(ObjRefInScope::local_id("sales"), ComparisonOperator::GreaterThan, 10.0, None),
                Filter::measure_value(ObjRefInScope::local_id("sales"), None),
            ])
            .with_sorting(vec![model::new_measure_sort(
                "sales",
                SortDirection::Desc,
                vec![model::new_attribute_locator("region", "East")],
            )]);
        let payload = serde_json::to_value(to_afm_execution(&def)).unwrap();

        let filters = payload["execution"]["afm"]["filters"].as_array().unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(
            filters[0],
            json!({
                "measureValueFilter": {
                    "measure": { "localIdentifier": "sales" },
                    "condition": { "comparison": { "operator": "GREATER_THAN", "value": 10.0 } }
                }
            })
        );
        let locators = &payload["execution"]["resultSpec"]["sorts"][0]["measureSortItem"]["locators"];
        assert_eq!(locators[0]["attributeLocatorItem"]["attributeIdentifier"], "region");
        assert_eq!(locators[1]["measureLocatorItem"]["measureIdentifier"], "sales");
    }

    #[test]
    fn test_native_totals() {
        let def = ExecutionDefinition::new(
            "test",
            vec![
                Attribute::new(ObjRef::identifier("df1")).with_local_id("a1"),
                Attribute::new(ObjRef::identifier("df2")).with_local_id("a2"),
            ],
            vec![Measure::simple(ObjRef::identifier("m1")).local_id("m").build()],
            vec![],
        )
        .unwrap()
        .with_dimensions(&[
            DimensionSpec::from(new_dimension(
                ["a1", "a2"],
                vec![Total::new(TotalType::Nat, "m", "a2"), Total::new(TotalType::Sum, "m", "a1")],
            )),
            DimensionSpec::from(new_dimension([MEASURE_GROUP], vec![])),
        ])
        .unwrap();

        let exec = to_afm_execution(&def);
        assert_eq!(
            exec.execution.afm.native_totals,
            vec![NativeTotalItem {
                measure_identifier: "m".into(),
                attribute_identifiers: vec!["a1".into()],
            }]
        );
        let payload = serde_json::to_value(&exec).unwrap();
        assert_eq!(payload["execution"]["resultSpec"]["dimensions"][0]["totals"][0]["type"], "nat");
    }
}
