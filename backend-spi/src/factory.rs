//! FILENAME: backend-spi/src/factory.rs
//! Execution factory - the assembler boundary where default dimensions are applied.

use std::sync::Arc;

use model::{
    buckets_totals, default_dimensions_with_totals, AttributeOrMeasure, Bucket, DimensionGenerator,
    DimensionSpec, ExecutionDefinition, Filter, InsightDefinition, Total,
};

use crate::backend::ExecutionBackend;
use crate::error::BackendError;
use crate::prepared::PreparedExecution;

/// Creates prepared executions for one workspace of one backend.
#[derive(Clone)]
pub struct ExecutionFactory {
    workspace: String,
    backend: Arc<dyn ExecutionBackend>,
}

impl ExecutionFactory {
    pub fn new(workspace: impl Into<String>, backend: Arc<dyn ExecutionBackend>) -> Self {
        ExecutionFactory {
            workspace: workspace.into(),
            backend,
        }
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// Wraps an existing definition; a definition without dimensions gets the default layout.
    pub fn for_definition(&self, definition: ExecutionDefinition) -> Result<PreparedExecution, BackendError> {
        let definition = if definition.dimensions().is_empty() {
            with_default_dimensions(definition, Vec::new())?
        } else {
            definition
        };
        Ok(PreparedExecution::new(self.backend.clone(), definition))
    }

    pub fn for_items(
        &self,
        items: Vec<AttributeOrMeasure>,
        filters: Vec<Filter>,
    ) -> Result<PreparedExecution, BackendError> {
        let definition = ExecutionDefinition::for_items(&self.workspace, items, filters)?;
        self.for_definition(definition)
    }

    /// Bucket totals are attached to the attribute dimension of the default layout.
    pub fn for_buckets(
        &self,
        buckets: &[Bucket],
        filters: Vec<Filter>,
    ) -> Result<PreparedExecution, BackendError> {
        let definition = ExecutionDefinition::for_buckets(&self.workspace, buckets, filters)?;
        let definition = with_default_dimensions(definition, buckets_totals(buckets))?;
        Ok(PreparedExecution::new(self.backend.clone(), definition))
    }

    pub fn for_insight(
        &self,
        insight: &InsightDefinition,
        filters: Vec<Filter>,
    ) -> Result<PreparedExecution, BackendError> {
        let definition = ExecutionDefinition::for_insight(&self.workspace, insight, filters)?;
        let definition = with_default_dimensions(definition, insight.totals())?;
        Ok(PreparedExecution::new(self.backend.clone(), definition))
    }
}

fn with_default_dimensions(
    definition: ExecutionDefinition,
    totals: Vec<Total>,
) -> Result<ExecutionDefinition, BackendError> {
    let generator: DimensionGenerator =
        Arc::new(move |def: &ExecutionDefinition| default_dimensions_with_totals(def, totals.clone()));
    Ok(definition.with_dimensions(&[DimensionSpec::Generator(generator)])?)
}
