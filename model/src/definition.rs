//! FILENAME: model/src/definition.rs
//! Execution definition and the assembler building it.
//!
//! A definition is assembled once from items, buckets or an insight and never
//! mutated afterwards. Every `with_*` call returns a new definition. Natural
//! order is preserved: items keep their position inside a bucket and buckets
//! are concatenated in the order given.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::attribute::{attributes_find, Attribute};
use crate::bucket::{buckets_attributes, buckets_measures, AttributeOrMeasure, Bucket};
use crate::dimension::{resolve_dimensions, Dimension, DimensionSpec, Total, MEASURE_GROUP};
use crate::error::ModelError;
use crate::filter::Filter;
use crate::fingerprint::{write_effective_filters, Fingerprint, FingerprintBuilder};
use crate::insight::InsightDefinition;
use crate::measure::{measures_find, Measure};
use crate::sort::SortItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "DefinitionData")]
pub struct ExecutionDefinition {
    workspace: String,
    attributes: Vec<Attribute>,
    measures: Vec<Measure>,
    filters: Vec<Filter>,
    sort_by: Vec<SortItem>,
    dimensions: Vec<Dimension>,
}

/// Serialized form, checked on the way in like any assembled definition.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionData {
    workspace: String,
    #[serde(default)]
    attributes: Vec<Attribute>,
    #[serde(default)]
    measures: Vec<Measure>,
    #[serde(default)]
    filters: Vec<Filter>,
    #[serde(default)]
    sort_by: Vec<SortItem>,
    #[serde(default)]
    dimensions: Vec<Dimension>,
}

impl TryFrom<DefinitionData> for ExecutionDefinition {
    type Error = ModelError;

    fn try_from(data: DefinitionData) -> Result<Self, ModelError> {
        let definition = ExecutionDefinition {
            workspace: data.workspace,
            attributes: data.attributes,
            measures: data.measures,
            filters: data.filters,
            sort_by: data.sort_by,
            dimensions: data.dimensions,
        };
        definition.check_local_ids()?;
        Ok(definition)
    }
}

// ============================================================================
// ASSEMBLY
// ============================================================================

impl ExecutionDefinition {
    /// Assembles a definition from attributes and measures.
    pub fn new(
        workspace: impl Into<String>,
        attributes: Vec<Attribute>,
        measures: Vec<Measure>,
        filters: Vec<Filter>,
    ) -> Result<Self, ModelError> {
        let definition = ExecutionDefinition {
            workspace: workspace.into(),
            attributes,
            measures,
            filters,
            sort_by: Vec::new(),
            dimensions: Vec::new(),
        };
        definition.check_local_ids()?;
        Ok(definition)
    }

    /// Assembles a definition from a flat list of items.
    pub fn for_items(
        workspace: impl Into<String>,
        items: Vec<AttributeOrMeasure>,
        filters: Vec<Filter>,
    ) -> Result<Self, ModelError> {
        let mut attributes = Vec::new();
        let mut measures = Vec::new();
        for item in items {
            match item {
                AttributeOrMeasure::Attribute(a) => attributes.push(a),
                AttributeOrMeasure::Measure(m) => measures.push(m),
            }
        }
        Self::new(workspace, attributes, measures, filters)
    }

    /// Assembles a definition from buckets, keeping natural order.
    pub fn for_buckets(
        workspace: impl Into<String>,
        buckets: &[Bucket],
        filters: Vec<Filter>,
    ) -> Result<Self, ModelError> {
        Self::new(
            workspace,
            buckets_attributes(buckets),
            buckets_measures(buckets),
            filters,
        )
    }

    /// Assembles a definition from an insight. Insight filters come first,
    /// followed by `extra_filters`; insight sorts are carried over.
    pub fn for_insight(
        workspace: impl Into<String>,
        insight: &InsightDefinition,
        extra_filters: Vec<Filter>,
    ) -> Result<Self, ModelError> {
        let mut filters = insight.filters.clone();
        filters.extend(extra_filters);

        let definition = Self::for_buckets(workspace, &insight.buckets, filters)?;
        Ok(definition.with_sorting(insight.sorts.clone()))
    }

    fn check_local_ids(&self) -> Result<(), ModelError> {
        let mut seen = HashSet::new();
        let ids = self
            .attributes
            .iter()
            .map(|a| a.local_identifier.as_str())
            .chain(self.measures.iter().map(|m| m.local_identifier.as_str()));

        for id in ids {
            if id == MEASURE_GROUP {
                return Err(ModelError::ReservedLocalId(id.to_string()));
            }
            if !seen.insert(id) {
                return Err(ModelError::DuplicateLocalId(id.to_string()));
            }
        }
        Ok(())
    }
}

// ============================================================================
// TRANSFORMS
// ============================================================================

impl ExecutionDefinition {
    /// Replaces the sort items wholesale.
    pub fn with_sorting(&self, sort_by: Vec<SortItem>) -> Self {
        ExecutionDefinition {
            sort_by,
            ..self.clone()
        }
    }

    /// Replaces the dimensions wholesale. Generators are evaluated against this definition.
    pub fn with_dimensions(&self, specs: &[DimensionSpec]) -> Result<Self, ModelError> {
        let dimensions = resolve_dimensions(self, specs);
        let with_measure_group = dimensions.iter().filter(|d| d.contains_measure_group()).count();
        if with_measure_group > 1 {
            return Err(ModelError::MeasureGroupInMultipleDimensions);
        }
        Ok(ExecutionDefinition {
            dimensions,
            ..self.clone()
        })
    }

    /// Appends filters to the existing ones.
    pub fn with_filters(&self, filters: Vec<Filter>) -> Self {
        let mut merged = self.filters.clone();
        merged.extend(filters);
        ExecutionDefinition {
            filters: merged,
            ..self.clone()
        }
    }

    /// Same definition bound to another workspace.
    pub fn with_workspace(&self, workspace: impl Into<String>) -> Self {
        ExecutionDefinition {
            workspace: workspace.into(),
            ..self.clone()
        }
    }

    /// Same data part with sorts, dimensions and totals cleared.
    pub fn without_layout(&self) -> Self {
        ExecutionDefinition {
            sort_by: Vec::new(),
            dimensions: Vec::new(),
            ..self.clone()
        }
    }
}

// ============================================================================
// ACCESSORS
// ============================================================================

impl ExecutionDefinition {
    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn sort_by(&self) -> &[SortItem] {
        &self.sort_by
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn attribute(&self, local_id: &str) -> Option<&Attribute> {
        attributes_find(&self.attributes, local_id)
    }

    pub fn measure(&self, local_id: &str) -> Option<&Measure> {
        measures_find(&self.measures, local_id)
    }

    /// Totals of all dimensions, in dimension order.
    pub fn totals(&self) -> Vec<&Total> {
        self.dimensions.iter().flat_map(|d| d.totals.iter()).collect()
    }

    /// Native (roll-up) totals of all dimensions.
    pub fn native_totals(&self) -> Vec<&Total> {
        self.totals().into_iter().filter(|t| t.is_native()).collect()
    }

    /// Filters that actually restrict data; empty attribute filters are dropped.
    pub fn effective_filters(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter().filter(|f| !f.is_empty())
    }

    /// Index of the dimension holding the given attribute or `measureGroup`.
    pub fn dimension_of(&self, item_id: &str) -> Option<usize> {
        self.dimensions
            .iter()
            .position(|d| d.item_identifiers.iter().any(|i| i == item_id))
    }
}

// ============================================================================
// FINGERPRINT
// ============================================================================

impl ExecutionDefinition {
    /// Content identity: equal for semantically equal definitions, regardless
    /// of how they were assembled.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut fp = FingerprintBuilder::new();
        fp.tag("executionDefinition").str(&self.workspace);
        fp.seq(&self.attributes);
        fp.seq(&self.measures);
        write_effective_filters(&mut fp, &self.filters);
        fp.seq(&self.sort_by);
        fp.seq(&self.dimensions);
        fp.finish()
    }
}
