//! FILENAME: backend-spi/src/prepared.rs
//! Prepared execution - an immutable, submittable unit of work.
//!
//! Every `with_*` call returns a new instance and leaves the receiver as it
//! was. `execute()` validates the definition locally before any I/O.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use model::{
    check_executable, default_dimension_generator, DimensionSpec, ExecutionDefinition, Fingerprint,
    SortItem,
};
use tokio_util::sync::CancellationToken;

use crate::backend::{cancellable, ExecutionBackend, ExecutionRequest, ExecutionResult, TransformOrigin};
use crate::error::BackendError;

#[derive(Clone)]
pub struct PreparedExecution {
    definition: Arc<ExecutionDefinition>,
    fingerprint: Fingerprint,
    backend: Arc<dyn ExecutionBackend>,
    origin: Option<Arc<TransformOrigin>>,
    cancel: CancellationToken,
}

impl PreparedExecution {
    pub fn new(backend: Arc<dyn ExecutionBackend>, definition: ExecutionDefinition) -> Self {
        Self::from_parts(backend, Arc::new(definition), None, CancellationToken::new())
    }

    fn from_parts(
        backend: Arc<dyn ExecutionBackend>,
        definition: Arc<ExecutionDefinition>,
        origin: Option<Arc<TransformOrigin>>,
        cancel: CancellationToken,
    ) -> Self {
        let fingerprint = definition.fingerprint();
        PreparedExecution {
            definition,
            fingerprint,
            backend,
            origin,
            cancel,
        }
    }

    /// Prepared execution derived from an existing result: same data part,
    /// sorts and dimensions cleared, layout reset to the default dimensions.
    pub fn transformed(
        backend: Arc<dyn ExecutionBackend>,
        definition: &ExecutionDefinition,
        origin: TransformOrigin,
        cancel: CancellationToken,
    ) -> Self {
        let bare = definition.without_layout();
        let laid_out = bare
            .with_dimensions(&[DimensionSpec::Generator(default_dimension_generator())])
            .unwrap_or(bare);
        Self::from_parts(backend, Arc::new(laid_out), Some(Arc::new(origin)), cancel)
    }

    pub fn definition(&self) -> &Arc<ExecutionDefinition> {
        &self.definition
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn backend(&self) -> &Arc<dyn ExecutionBackend> {
        &self.backend
    }

    pub fn equals(&self, other: &PreparedExecution) -> bool {
        self.fingerprint == other.fingerprint
    }

    /// True when this execution was derived from an existing result.
    pub fn is_transformed(&self) -> bool {
        self.origin.is_some()
    }

    // ========================================================================
    // TRANSFORMS
    // ========================================================================

    /// Replaces the sort items wholesale.
    pub fn with_sorting(&self, sort_by: Vec<SortItem>) -> Self {
        let definition = self.definition.with_sorting(sort_by);
        Self::from_parts(
            self.backend.clone(),
            Arc::new(definition),
            self.origin.clone(),
            self.cancel.clone(),
        )
    }

    /// Replaces the dimensions wholesale; generators see the current definition.
    pub fn with_dimensions(&self, specs: &[DimensionSpec]) -> Result<Self, BackendError> {
        let definition = self.definition.with_dimensions(specs)?;
        Ok(Self::from_parts(
            self.backend.clone(),
            Arc::new(definition),
            self.origin.clone(),
            self.cancel.clone(),
        ))
    }

    /// I/O of the new instance, and of every result it produces, aborts when `token` fires.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        PreparedExecution {
            cancel: token,
            ..self.clone()
        }
    }

    // ========================================================================
    // EXECUTE
    // ========================================================================

    pub async fn execute(&self) -> Result<Arc<dyn ExecutionResult>, BackendError> {
        if let Err(e) = check_executable(&self.definition) {
            warn!(
                target: "EXEC",
                "rejected fingerprint={} reason={}",
                self.fingerprint, e
            );
            return Err(e.into());
        }

        let origin = self.reusable_origin();
        info!(
            target: "EXEC",
            "execute backend={} fingerprint={} reuse_candidate={}",
            self.backend.name(),
            self.fingerprint,
            origin.is_some()
        );

        let request = ExecutionRequest {
            definition: self.definition.clone(),
            fingerprint: self.fingerprint.clone(),
            origin,
            cancel: self.cancel.clone(),
        };
        let backend = self.backend.clone();
        let result = cancellable(&self.cancel, backend.execute(request)).await;

        match &result {
            Ok(r) => debug!(target: "EXEC", "executed result={}", r.fingerprint()),
            Err(e) => warn!(target: "EXEC", "failed fingerprint={} error={}", self.fingerprint, e),
        }
        result
    }

    /// Origin passed to the backend, or `None` when reuse is not allowed.
    /// Adding native totals always forces a full computation.
    fn reusable_origin(&self) -> Option<Arc<TransformOrigin>> {
        let origin = self.origin.as_ref()?;
        if !self.backend.capabilities().can_transform_existing_result {
            return None;
        }
        if origin.adds_native_totals(&self.definition) {
            debug!(
                target: "EXEC",
                "new native totals, recomputing fingerprint={}",
                self.fingerprint
            );
            return None;
        }
        Some(origin.clone())
    }
}

impl fmt::Debug for PreparedExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedExecution")
            .field("backend", &self.backend.name())
            .field("fingerprint", &self.fingerprint)
            .field("transformed", &self.origin.is_some())
            .finish()
    }
}
