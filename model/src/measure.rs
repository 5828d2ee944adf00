//! FILENAME: model/src/measure.rs
//! Measures - the computed side of an execution.
//!
//! A measure is either simple (aggregation over a catalog item) or derived
//! from other measures of the same execution (arithmetic, period over period,
//! previous period). Derived measures reference their masters by local id.

use serde::{Deserialize, Serialize};
use crate::filter::MeasureFilter;
use crate::objref::{Identifier, ObjRef};

// ============================================================================
// VOCABULARIES
// ============================================================================

/// Aggregation applied by a simple measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureAggregation {
    Sum,
    Count,
    Avg,
    Min,
    Max,
    Median,
    Runsum,
}

impl MeasureAggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureAggregation::Sum => "sum",
            MeasureAggregation::Count => "count",
            MeasureAggregation::Avg => "avg",
            MeasureAggregation::Min => "min",
            MeasureAggregation::Max => "max",
            MeasureAggregation::Median => "median",
            MeasureAggregation::Runsum => "runsum",
        }
    }
}

/// Operator of an arithmetic measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticOperator {
    Sum,
    Difference,
    Multiplication,
    Ratio,
    Change,
}

impl ArithmeticOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithmeticOperator::Sum => "sum",
            ArithmeticOperator::Difference => "difference",
            ArithmeticOperator::Multiplication => "multiplication",
            ArithmeticOperator::Ratio => "ratio",
            ArithmeticOperator::Change => "change",
        }
    }
}

// ============================================================================
// DEFINITIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleMeasure {
    pub item: ObjRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<MeasureAggregation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<MeasureFilter>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub compute_ratio: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArithmeticMeasure {
    pub measure_identifiers: Vec<Identifier>,
    pub operator: ArithmeticOperator,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopMeasure {
    pub measure_identifier: Identifier,
    pub pop_attribute: ObjRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousPeriodDateDataSet {
    pub data_set: ObjRef,
    pub periods_ago: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousPeriodMeasure {
    pub measure_identifier: Identifier,
    pub date_data_sets: Vec<PreviousPeriodDateDataSet>,
}

/// What a measure computes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasureDefinition {
    #[serde(rename = "measureDefinition")]
    Simple(SimpleMeasure),
    #[serde(rename = "arithmeticMeasure")]
    Arithmetic(ArithmeticMeasure),
    #[serde(rename = "popMeasureDefinition")]
    PoP(PopMeasure),
    #[serde(rename = "previousPeriodMeasure")]
    PreviousPeriod(PreviousPeriodMeasure),
}

impl MeasureDefinition {
    /// Local ids of the measures this definition is derived from, in order.
    pub fn dependencies(&self) -> Vec<&str> {
        match self {
            MeasureDefinition::Simple(_) => Vec::new(),
            MeasureDefinition::Arithmetic(a) => {
                a.measure_identifiers.iter().map(|s| s.as_str()).collect()
            }
            MeasureDefinition::PoP(p) => vec![p.measure_identifier.as_str()],
            MeasureDefinition::PreviousPeriod(p) => vec![p.measure_identifier.as_str()],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            MeasureDefinition::Simple(_) => "simple",
            MeasureDefinition::Arithmetic(_) => "arithmetic",
            MeasureDefinition::PoP(_) => "pop",
            MeasureDefinition::PreviousPeriod(_) => "previousPeriod",
        }
    }
}

// ============================================================================
// MEASURE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub local_identifier: Identifier,
    pub definition: MeasureDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Measure {
    /// Simple measure over a catalog item (fact, metric or attribute).
    pub fn simple(item: ObjRef) -> MeasureBuilder {
        MeasureBuilder::new(MeasureDefinition::Simple(SimpleMeasure {
            item,
            aggregation: None,
            filters: Vec::new(),
            compute_ratio: false,
        }))
    }

    pub fn arithmetic(operator: ArithmeticOperator, measure_ids: &[&str]) -> MeasureBuilder {
        MeasureBuilder::new(MeasureDefinition::Arithmetic(ArithmeticMeasure {
            measure_identifiers: measure_ids.iter().map(|s| s.to_string()).collect(),
            operator,
        }))
    }

    pub fn pop(master_id: impl Into<String>, pop_attribute: ObjRef) -> MeasureBuilder {
        MeasureBuilder::new(MeasureDefinition::PoP(PopMeasure {
            measure_identifier: master_id.into(),
            pop_attribute,
        }))
    }

    pub fn previous_period(
        master_id: impl Into<String>,
        date_data_sets: Vec<PreviousPeriodDateDataSet>,
    ) -> MeasureBuilder {
        MeasureBuilder::new(MeasureDefinition::PreviousPeriod(PreviousPeriodMeasure {
            measure_identifier: master_id.into(),
            date_data_sets,
        }))
    }

    pub fn local_id(&self) -> &str {
        &self.local_identifier
    }

    pub fn simple_definition(&self) -> Option<&SimpleMeasure> {
        match &self.definition {
            MeasureDefinition::Simple(s) => Some(s),
            _ => None,
        }
    }

    pub fn dependencies(&self) -> Vec<&str> {
        self.definition.dependencies()
    }
}

/// Finds a measure by local identifier.
pub fn measures_find<'a>(measures: &'a [Measure], local_id: &str) -> Option<&'a Measure> {
    measures.iter().find(|m| m.local_identifier == local_id)
}

// ============================================================================
// BUILDER
// ============================================================================

/// Consuming builder producing one immutable [`Measure`].
#[derive(Debug, Clone)]
pub struct MeasureBuilder {
    definition: MeasureDefinition,
    local_identifier: Option<Identifier>,
    alias: Option<String>,
    format: Option<String>,
    title: Option<String>,
}

impl MeasureBuilder {
    fn new(definition: MeasureDefinition) -> Self {
        MeasureBuilder {
            definition,
            local_identifier: None,
            alias: None,
            format: None,
            title: None,
        }
    }

    pub fn local_id(mut self, id: impl Into<String>) -> Self {
        self.local_identifier = Some(id.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the aggregation. Ignored for derived measures.
    pub fn aggregation(mut self, aggregation: MeasureAggregation) -> Self {
        if let MeasureDefinition::Simple(s) = &mut self.definition {
            s.aggregation = Some(aggregation);
        }
        self
    }

    /// Adds a filter applied to this measure only. Ignored for derived measures.
    pub fn filter(mut self, filter: MeasureFilter) -> Self {
        if let MeasureDefinition::Simple(s) = &mut self.definition {
            s.filters.push(filter);
        }
        self
    }

    pub fn compute_ratio(mut self, compute_ratio: bool) -> Self {
        if let MeasureDefinition::Simple(s) = &mut self.definition {
            s.compute_ratio = compute_ratio;
        }
        self
    }

    pub fn build(self) -> Measure {
        let local_identifier = match self.local_identifier {
            Some(id) => id,
            None => default_local_id(&self.definition),
        };
        Measure {
            local_identifier,
            definition: self.definition,
            alias: self.alias,
            format: self.format,
            title: self.title,
        }
    }
}

fn default_local_id(definition: &MeasureDefinition) -> Identifier {
    match definition {
        MeasureDefinition::Simple(s) => match s.aggregation {
            Some(agg) => format!("m_{}_{}", s.item.local_id_fragment(), agg.as_str()),
            None => format!("m_{}", s.item.local_id_fragment()),
        },
        MeasureDefinition::Arithmetic(a) => {
            format!("m_{}_{}", a.operator.as_str(), a.measure_identifiers.join("_"))
        }
        MeasureDefinition::PoP(p) => format!("m_{}_pop", p.measure_identifier),
        MeasureDefinition::PreviousPeriod(p) => {
            format!("m_{}_previous_period", p.measure_identifier)
        }
    }
}
