//! FILENAME: model/src/dimension.rs
//! Result dimensions and totals.
//!
//! A dimension lists the attribute local ids laid out along one axis of the
//! result, plus optionally the `measureGroup` placeholder that stands for all
//! measures. Dimension layout is either given explicitly or produced by a
//! generator evaluated against the assembled definition.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use crate::definition::ExecutionDefinition;
use crate::error::ModelError;
use crate::objref::Identifier;

/// Reserved dimension item standing for all measures of the execution.
pub const MEASURE_GROUP: &str = "measureGroup";

// ============================================================================
// TOTALS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalType {
    Sum,
    Avg,
    Max,
    Min,
    /// Native roll-up computed by the backend from raw data.
    Nat,
    Med,
}

impl TotalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TotalType::Sum => "sum",
            TotalType::Avg => "avg",
            TotalType::Max => "max",
            TotalType::Min => "min",
            TotalType::Nat => "nat",
            TotalType::Med => "med",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Total {
    #[serde(rename = "type")]
    pub total_type: TotalType,
    pub measure_identifier: Identifier,
    pub attribute_identifier: Identifier,
}

impl Total {
    pub fn new(
        total_type: TotalType,
        measure_id: impl Into<String>,
        attribute_id: impl Into<String>,
    ) -> Self {
        Total {
            total_type,
            measure_identifier: measure_id.into(),
            attribute_identifier: attribute_id.into(),
        }
    }

    pub fn is_native(&self) -> bool {
        self.total_type == TotalType::Nat
    }
}

// ============================================================================
// DIMENSION
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub item_identifiers: Vec<Identifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub totals: Vec<Total>,
}

impl Dimension {
    pub fn contains_measure_group(&self) -> bool {
        self.item_identifiers.iter().any(|i| i == MEASURE_GROUP)
    }

    /// Attribute local ids of this dimension, in order.
    pub fn attribute_identifiers(&self) -> impl Iterator<Item = &str> {
        self.item_identifiers
            .iter()
            .map(|s| s.as_str())
            .filter(|s| *s != MEASURE_GROUP)
    }
}

pub fn new_dimension<I, S>(items: I, totals: Vec<Total>) -> Dimension
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Dimension {
        item_identifiers: items.into_iter().map(Into::into).collect(),
        totals,
    }
}

/// Two-dimensional layout; `measureGroup` may be placed in at most one of them.
pub fn new_two_dimensional<I1, I2, S1, S2>(dim1: I1, dim2: I2) -> Result<Vec<Dimension>, ModelError>
where
    I1: IntoIterator<Item = S1>,
    I2: IntoIterator<Item = S2>,
    S1: Into<String>,
    S2: Into<String>,
{
    let first = new_dimension(dim1, Vec::new());
    let second = new_dimension(dim2, Vec::new());
    if first.contains_measure_group() && second.contains_measure_group() {
        return Err(ModelError::MeasureGroupInMultipleDimensions);
    }
    Ok(vec![first, second])
}

pub fn dimension_totals(dimension: &Dimension) -> &[Total] {
    &dimension.totals
}

/// Returns a copy of the dimension with its totals replaced.
pub fn dimension_set_totals(dimension: &Dimension, totals: Vec<Total>) -> Dimension {
    Dimension {
        item_identifiers: dimension.item_identifiers.clone(),
        totals,
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Function producing a dimension layout for a definition.
pub type DimensionGenerator = Arc<dyn Fn(&ExecutionDefinition) -> Vec<Dimension> + Send + Sync>;

/// Either a fixed dimension or a generator evaluated against the definition.
#[derive(Clone)]
pub enum DimensionSpec {
    Dimension(Dimension),
    Generator(DimensionGenerator),
}

impl fmt::Debug for DimensionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionSpec::Dimension(d) => f.debug_tuple("Dimension").field(d).finish(),
            DimensionSpec::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

impl From<Dimension> for DimensionSpec {
    fn from(value: Dimension) -> Self {
        DimensionSpec::Dimension(value)
    }
}

impl From<DimensionGenerator> for DimensionSpec {
    fn from(value: DimensionGenerator) -> Self {
        DimensionSpec::Generator(value)
    }
}

/// Resolves a mix of dimensions and generators into a flat dimension list.
pub fn resolve_dimensions(definition: &ExecutionDefinition, specs: &[DimensionSpec]) -> Vec<Dimension> {
    let mut result = Vec::new();
    for spec in specs {
        match spec {
            DimensionSpec::Dimension(d) => result.push(d.clone()),
            DimensionSpec::Generator(g) => result.extend(g(definition)),
        }
    }
    result
}

/// Default layout: `[measureGroup]` and `[all attributes]`, or a single
/// attribute dimension when there are no measures.
pub fn default_dimensions(definition: &ExecutionDefinition) -> Vec<Dimension> {
    default_dimensions_with_totals(definition, Vec::new())
}

/// Default layout with totals attached to the attribute dimension.
pub fn default_dimensions_with_totals(definition: &ExecutionDefinition, totals: Vec<Total>) -> Vec<Dimension> {
    let attribute_ids: Vec<Identifier> = definition
        .attributes()
        .iter()
        .map(|a| a.local_identifier.clone())
        .collect();

    if definition.measures().is_empty() {
        return vec![new_dimension(attribute_ids, totals)];
    }

    vec![
        new_dimension([MEASURE_GROUP], Vec::new()),
        new_dimension(attribute_ids, totals),
    ]
}

pub fn default_dimension_generator() -> DimensionGenerator {
    Arc::new(default_dimensions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_dimensional_rejects_double_measure_group() {
        let result = new_two_dimensional([MEASURE_GROUP], [MEASURE_GROUP]);
        assert!(matches!(result, Err(ModelError::MeasureGroupInMultipleDimensions)));

        let dims = new_two_dimensional(["region"], [MEASURE_GROUP]).unwrap();
        assert_eq!(dims.len(), 2);
        assert!(dims[1].contains_measure_group());
    }

    #[test]
    fn test_dimension_json_omits_empty_totals() {
        let dim = new_dimension(["region"], Vec::new());
        let json = serde_json::to_string(&dim).unwrap();
        assert_eq!(json, r#"{"itemIdentifiers":["region"]}"#);

        let with_totals = dimension_set_totals(&dim, vec![Total::new(TotalType::Sum, "m1", "region")]);
        let json = serde_json::to_value(&with_totals).unwrap();
        assert_eq!(json["totals"][0]["type"], "sum");
        assert!(dimension_totals(&dim).is_empty());
    }

    #[test]
    fn test_attribute_identifiers_skip_measure_group() {
        let dim = new_dimension(["a1", MEASURE_GROUP, "a2"], Vec::new());
        let ids: Vec<&str> = dim.attribute_identifiers().collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }
}
