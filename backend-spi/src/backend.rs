//! FILENAME: backend-spi/src/backend.rs
//! Traits every backend implements.
//!
//! A backend turns a validated definition into an [`ExecutionResult`]; the
//! result reads data views on demand. All I/O is async and honors the
//! cancellation token carried by the request.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use model::{ExecutionDefinition, Fingerprint, Total};
use tokio_util::sync::CancellationToken;

use crate::capabilities::BackendCapabilities;
use crate::data_view::DataView;
use crate::error::BackendError;
use crate::prepared::PreparedExecution;
use crate::results::DimensionDescriptor;

// ============================================================================
// TRANSFORM ORIGIN
// ============================================================================

/// Link from a transformed execution back to the result it was derived from.
///
/// Backends declaring `can_transform_existing_result` may answer the new
/// execution from `reusable` when the data part of the definition did not
/// change. Reuse is an optimization only; results must be identical either way.
#[derive(Clone)]
pub struct TransformOrigin {
    pub result_fingerprint: Fingerprint,
    /// Fingerprint of the origin definition with sorts and dimensions cleared.
    pub data_fingerprint: Fingerprint,
    /// Native totals the origin result was computed with.
    pub native_totals: Vec<Total>,
    /// Backend-specific computed state, e.g. an aggregated cube.
    pub reusable: Option<Arc<dyn Any + Send + Sync>>,
}

impl TransformOrigin {
    pub fn new(definition: &ExecutionDefinition, result_fingerprint: Fingerprint) -> Self {
        TransformOrigin {
            result_fingerprint,
            data_fingerprint: definition.without_layout().fingerprint(),
            native_totals: definition.native_totals().into_iter().cloned().collect(),
            reusable: None,
        }
    }

    pub fn with_reusable(mut self, reusable: Arc<dyn Any + Send + Sync>) -> Self {
        self.reusable = Some(reusable);
        self
    }

    /// True when `definition` asks for native totals the origin was not computed with.
    pub fn adds_native_totals(&self, definition: &ExecutionDefinition) -> bool {
        definition
            .native_totals()
            .into_iter()
            .any(|t| !self.native_totals.contains(t))
    }
}

impl fmt::Debug for TransformOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformOrigin")
            .field("result_fingerprint", &self.result_fingerprint)
            .field("data_fingerprint", &self.data_fingerprint)
            .field("native_totals", &self.native_totals)
            .field("reusable", &self.reusable.is_some())
            .finish()
    }
}

// ============================================================================
// REQUEST
// ============================================================================

/// One submission of a definition to a backend.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub definition: Arc<ExecutionDefinition>,
    pub fingerprint: Fingerprint,
    /// Present only when the backend may reuse the origin result.
    pub origin: Option<Arc<TransformOrigin>>,
    pub cancel: CancellationToken,
}

// ============================================================================
// TRAITS
// ============================================================================

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn capabilities(&self) -> BackendCapabilities;

    /// Submits a definition. The definition has already been validated.
    async fn execute(
        self: Arc<Self>,
        request: ExecutionRequest,
    ) -> Result<Arc<dyn ExecutionResult>, BackendError>;
}

#[async_trait]
pub trait ExecutionResult: Send + Sync {
    /// The definition this result was computed for.
    fn definition(&self) -> &Arc<ExecutionDefinition>;

    /// Shape metadata, one descriptor per result dimension.
    fn dimensions(&self) -> &[DimensionDescriptor];

    fn fingerprint(&self) -> &Fingerprint;

    /// Reads the entire result.
    async fn read_all(&self) -> Result<DataView, BackendError>;

    /// Reads one window; `offset` and `size` hold one entry per dimension.
    async fn read_window(&self, offset: &[usize], size: &[usize]) -> Result<DataView, BackendError>;

    /// Fresh prepared execution of the same data with layout reset to defaults.
    fn transform(&self) -> PreparedExecution;

    fn equals(&self, other: &dyn ExecutionResult) -> bool {
        self.fingerprint() == other.fingerprint()
    }
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Runs `fut` unless `cancel` fires first.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    if cancel.is_cancelled() {
        return Err(BackendError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BackendError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{new_dimension, Attribute, DimensionSpec, Measure, ObjRef, TotalType, MEASURE_GROUP};

    fn definition(totals: Vec<Total>) -> ExecutionDefinition {
        ExecutionDefinition::new(
            "ws",
            vec![Attribute::new(ObjRef::identifier("df1")).with_local_id("a")],
            vec![Measure::simple(ObjRef::identifier("m1")).local_id("m").build()],
            vec![],
        )
        .unwrap()
        .with_dimensions(&[
            DimensionSpec::from(new_dimension(["a"], totals)),
            DimensionSpec::from(new_dimension([MEASURE_GROUP], vec![])),
        ])
        .unwrap()
    }

    #[test]
    fn test_adds_native_totals() {
        let origin = TransformOrigin::new(&definition(vec![]), Fingerprint::from("r"));

        assert!(!origin.adds_native_totals(&definition(vec![Total::new(TotalType::Sum, "m", "a")])));
        assert!(origin.adds_native_totals(&definition(vec![Total::new(TotalType::Nat, "m", "a")])));
    }

    #[test]
    fn test_data_fingerprint_ignores_layout() {
        let a = TransformOrigin::new(&definition(vec![]), Fingerprint::from("r1"));
        let b = TransformOrigin::new(&definition(vec![Total::new(TotalType::Sum, "m", "a")]), Fingerprint::from("r2"));
        assert_eq!(a.data_fingerprint, b.data_fingerprint);
    }

    #[tokio::test]
    async fn test_cancellable() {
        let token = CancellationToken::new();
        let ok: Result<u32, BackendError> = cancellable(&token, async { Ok(1) }).await;
        assert_eq!(ok.unwrap(), 1);

        token.cancel();
        let cancelled: Result<u32, BackendError> = cancellable(&token, async { Ok(1) }).await;
        assert!(matches!(cancelled, Err(BackendError::Cancelled)));
    }
}
