//! FILENAME: model/src/validation.rs
//! Executability check run before a definition is submitted.
//!
//! Everything is checked locally: a definition that passes can be compiled by
//! any dialect translator without dangling references.

use std::collections::{HashMap, HashSet};

use crate::definition::ExecutionDefinition;
use crate::dimension::MEASURE_GROUP;
use crate::error::ModelError;
use crate::filter::Filter;
use crate::objref::ObjRefInScope;

/// Checks that every local id the definition references exists and that the
/// dimension layout is consistent.
pub fn check_executable(definition: &ExecutionDefinition) -> Result<(), ModelError> {
    check_dimensions(definition)?;
    check_totals(definition)?;
    check_sorts(definition)?;
    check_measure_references(definition)?;
    check_filters(definition)?;
    Ok(())
}

fn check_dimensions(definition: &ExecutionDefinition) -> Result<(), ModelError> {
    let dimensions = definition.dimensions();
    if dimensions.is_empty() {
        return Err(ModelError::NoDimensions);
    }

    let mut placed = HashSet::new();
    let mut measure_groups = 0;
    for dim in dimensions {
        for item in &dim.item_identifiers {
            if item == MEASURE_GROUP {
                measure_groups += 1;
                continue;
            }
            if definition.attribute(item).is_none() {
                return Err(ModelError::UnknownLocalId {
                    kind: "attribute",
                    id: item.clone(),
                });
            }
            if !placed.insert(item.as_str()) {
                return Err(ModelError::AttributeInMultipleDimensions(item.clone()));
            }
        }
    }

    if measure_groups > 1 {
        return Err(ModelError::MeasureGroupInMultipleDimensions);
    }
    if measure_groups == 0 && !definition.measures().is_empty() {
        return Err(ModelError::MissingMeasureGroup);
    }
    // Each attribute must be laid out; nothing aggregates an unplaced one away.
    if let Some(unplaced) = definition
        .attributes()
        .iter()
        .find(|a| !placed.contains(a.local_identifier.as_str()))
    {
        return Err(ModelError::AttributeNotInDimension(unplaced.local_identifier.clone()));
    }
    Ok(())
}

fn check_totals(definition: &ExecutionDefinition) -> Result<(), ModelError> {
    for dim in definition.dimensions() {
        for total in &dim.totals {
            if definition.measure(&total.measure_identifier).is_none() {
                return Err(ModelError::UnknownLocalId {
                    kind: "measure",
                    id: total.measure_identifier.clone(),
                });
            }
            if !dim.item_identifiers.contains(&total.attribute_identifier) {
                return Err(ModelError::TotalOutsideDimension {
                    measure: total.measure_identifier.clone(),
                    attribute: total.attribute_identifier.clone(),
                });
            }
        }
    }
    Ok(())
}

fn check_sorts(definition: &ExecutionDefinition) -> Result<(), ModelError> {
    for sort in definition.sort_by() {
        let ids = sort.entity_ids();
        for id in ids.attribute_identifiers {
            if definition.attribute(&id).is_none() {
                return Err(ModelError::UnknownLocalId { kind: "attribute", id });
            }
        }
        for id in ids.measure_identifiers {
            if definition.measure(&id).is_none() {
                return Err(ModelError::UnknownLocalId { kind: "measure", id });
            }
        }
    }
    Ok(())
}

fn check_measure_references(definition: &ExecutionDefinition) -> Result<(), ModelError> {
    for measure in definition.measures() {
        for dep in measure.dependencies() {
            if dep == measure.local_identifier {
                return Err(ModelError::SelfReference(dep.to_string()));
            }
            if definition.measure(dep).is_none() {
                return Err(ModelError::UnknownLocalId {
                    kind: "measure",
                    id: dep.to_string(),
                });
            }
        }
    }

    let mut visits = HashMap::new();
    for measure in definition.measures() {
        visit_measure(definition, &measure.local_identifier, &mut visits)?;
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Depth-first walk over derived-measure references.
fn visit_measure<'a>(
    definition: &'a ExecutionDefinition,
    local_id: &'a str,
    visits: &mut HashMap<&'a str, Visit>,
) -> Result<(), ModelError> {
    match visits.get(local_id) {
        Some(Visit::Done) => return Ok(()),
        Some(Visit::InProgress) => return Err(ModelError::CircularMeasureReference(local_id.to_string())),
        None => {}
    }
    visits.insert(local_id, Visit::InProgress);
    if let Some(measure) = definition.measure(local_id) {
        for dep in measure.dependencies() {
            visit_measure(definition, dep, visits)?;
        }
    }
    visits.insert(local_id, Visit::Done);
    Ok(())
}

fn check_filters(definition: &ExecutionDefinition) -> Result<(), ModelError> {
    for filter in definition.filters() {
        if let Filter::MeasureValue(mvf) = filter {
            if let ObjRefInScope::LocalId { local_identifier } = &mvf.measure {
                if definition.measure(local_identifier).is_none() {
                    return Err(ModelError::UnknownLocalId {
                        kind: "measure",
                        id: local_identifier.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Attribute;
    use crate::dimension::{new_dimension, DimensionSpec, Total, TotalType};
    use crate::filter::ComparisonOperator;
    use crate::measure::{ArithmeticOperator, Measure};
    use crate::objref::ObjRef;
    use crate::sort::{new_measure_sort, SortDirection};

    fn base() -> ExecutionDefinition {
        ExecutionDefinition::new(
            "ws",
            vec![Attribute::new(ObjRef::identifier("df1")).with_local_id("region")],
            vec![Measure::simple(ObjRef::identifier("m1")).local_id("sales").build()],
            vec![],
        )
        .unwrap()
    }

    fn layout(def: &ExecutionDefinition, dims: Vec<crate::dimension::Dimension>) -> ExecutionDefinition {
        let specs: Vec<DimensionSpec> = dims.into_iter().map(Into::into).collect();
        def.with_dimensions(&specs).unwrap()
    }

    #[test]
    fn test_valid_definition_passes() {
        let def = layout(
            &base(),
            vec![
                new_dimension(["region"], vec![Total::new(TotalType::Sum, "sales", "region")]),
                new_dimension([MEASURE_GROUP], vec![]),
            ],
        );
        assert!(check_executable(&def).is_ok());
    }

    #[test]
    fn test_no_dimensions() {
        assert_eq!(check_executable(&base()), Err(ModelError::NoDimensions));
    }

    #[test]
    fn test_unknown_dimension_item() {
        let def = layout(&base(), vec![new_dimension(["city", MEASURE_GROUP], vec![])]);
        assert!(matches!(
            check_executable(&def),
            Err(ModelError::UnknownLocalId { kind: "attribute", .. })
        ));
    }

    #[test]
    fn test_missing_measure_group() {
        let def = layout(&base(), vec![new_dimension(["region"], vec![])]);
        assert_eq!(check_executable(&def), Err(ModelError::MissingMeasureGroup));
    }

    #[test]
    fn test_total_outside_dimension() {
        let def = layout(
            &base(),
            vec![
                new_dimension(["region"], vec![]),
                new_dimension([MEASURE_GROUP], vec![Total::new(TotalType::Sum, "sales", "region")]),
            ],
        );
        assert!(matches!(check_executable(&def), Err(ModelError::TotalOutsideDimension { .. })));
    }

    #[test]
    fn test_dangling_sort_and_derived_measure() {
        let dims = vec![new_dimension(["region"], vec![]), new_dimension([MEASURE_GROUP], vec![])];

        let def = layout(&base(), dims.clone())
            .with_sorting(vec![new_measure_sort("profit", SortDirection::Asc, vec![])]);
        assert!(matches!(check_executable(&def), Err(ModelError::UnknownLocalId { kind: "measure", .. })));

        let derived = ExecutionDefinition::new(
            "ws",
            base().attributes().to_vec(),
            vec![
                Measure::simple(ObjRef::identifier("m1")).local_id("sales").build(),
                Measure::arithmetic(ArithmeticOperator::Ratio, &["sales", "ratio"]).local_id("ratio").build(),
            ],
            vec![],
        )
        .unwrap();
        let derived = layout(&derived, dims);
        assert_eq!(check_executable(&derived), Err(ModelError::SelfReference("ratio".to_string())));
    }

    #[test]
    fn test_unplaced_attribute() {
        let def = ExecutionDefinition::new(
            "ws",
            vec![
                Attribute::new(ObjRef::identifier("df1")).with_local_id("region"),
                Attribute::new(ObjRef::identifier("df2")).with_local_id("product"),
            ],
            vec![Measure::simple(ObjRef::identifier("m1")).local_id("sales").build()],
            vec![],
        )
        .unwrap();
        let def = layout(&def, vec![new_dimension(["region"], vec![]), new_dimension([MEASURE_GROUP], vec![])]);
        assert_eq!(
            check_executable(&def),
            Err(ModelError::AttributeNotInDimension("product".to_string()))
        );
    }

    #[test]
    fn test_circular_derived_measures() {
        let def = ExecutionDefinition::new(
            "ws",
            base().attributes().to_vec(),
            vec![
                Measure::simple(ObjRef::identifier("m1")).local_id("sales").build(),
                Measure::arithmetic(ArithmeticOperator::Sum, &["b", "sales"]).local_id("a").build(),
                Measure::arithmetic(ArithmeticOperator::Sum, &["a", "sales"]).local_id("b").build(),
            ],
            vec![],
        )
        .unwrap();
        let def = layout(&def, vec![new_dimension(["region"], vec![]), new_dimension([MEASURE_GROUP], vec![])]);
        assert!(matches!(check_executable(&def), Err(ModelError::CircularMeasureReference(_))));

        // A diamond shares a dependency without forming a cycle.
        let diamond = ExecutionDefinition::new(
            "ws",
            base().attributes().to_vec(),
            vec![
                Measure::simple(ObjRef::identifier("m1")).local_id("sales").build(),
                Measure::arithmetic(ArithmeticOperator::Sum, &["sales", "sales"]).local_id("a").build(),
                Measure::arithmetic(ArithmeticOperator::Difference, &["a", "sales"]).local_id("b").build(),
            ],
            vec![],
        )
        .unwrap();
        let diamond = layout(&diamond, vec![new_dimension(["region"], vec![]), new_dimension([MEASURE_GROUP], vec![])]);
        assert!(check_executable(&diamond).is_ok());
    }

    #[test]
    fn test_measure_value_filter_reference() {
        let def = layout(
            &base(),
            vec![new_dimension(["region"], vec![]), new_dimension([MEASURE_GROUP], vec![])],
        )
        .with_filters(vec![Filter::comparison(
            ObjRefInScope::local_id("nope"),
            ComparisonOperator::GreaterThan,
            1.0,
            None,
        )]);
        assert!(check_executable(&def).is_err());
    }
}
