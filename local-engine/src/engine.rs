//! FILENAME: local-engine/src/engine.rs
//! Local engine - the in-process backend.
//!
//! `execute()` computes (or reuses) the cube and lays it out; reads only
//! slice the layout. A transformed execution whose data part is unchanged
//! gets the origin's cube handed back through the transform origin and skips
//! aggregation entirely.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use backend_spi::{
    BackendCapabilities, BackendError, DataView, DimensionDescriptor, ExecutionBackend, ExecutionRequest,
    ExecutionResult, PreparedExecution, ResultWindow, TransformOrigin,
};
use log::{debug, info};
use model::{ExecutionDefinition, Fingerprint};
use tokio_util::sync::CancellationToken;

use crate::config::LocalEngineConfig;
use crate::cube::{native_rollup_grains, Cube, GrainSpec};
use crate::dataset::Dataset;
use crate::layout::Layout;

// ============================================================================
// STATISTICS
// ============================================================================

/// How many executions were computed from records and how many reused a cube.
#[derive(Debug, Default)]
pub struct EngineStats {
    computations: AtomicUsize,
    reuses: AtomicUsize,
}

impl EngineStats {
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::SeqCst)
    }

    pub fn reuses(&self) -> usize {
        self.reuses.load(Ordering::SeqCst)
    }
}

// ============================================================================
// BACKEND
// ============================================================================

pub struct LocalEngine {
    dataset: Arc<Dataset>,
    config: LocalEngineConfig,
    stats: EngineStats,
}

impl LocalEngine {
    pub fn new(dataset: Dataset, config: LocalEngineConfig) -> Self {
        Self::with_shared_dataset(Arc::new(dataset), config)
    }

    pub fn with_shared_dataset(dataset: Arc<Dataset>, config: LocalEngineConfig) -> Self {
        LocalEngine {
            dataset,
            config,
            stats: EngineStats::default(),
        }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn config(&self) -> &LocalEngineConfig {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// The origin's cube, when it was computed for the same data part and
    /// already holds every roll-up the new layout needs.
    fn reusable_cube(&self, request: &ExecutionRequest, grains: &[GrainSpec]) -> Option<Arc<Cube>> {
        let origin = request.origin.as_ref()?;
        if origin.data_fingerprint != request.definition.without_layout().fingerprint() {
            debug!(
                target: "LOCAL",
                "reuse skipped fingerprint={} reason=data changed",
                request.fingerprint
            );
            return None;
        }
        let cube = origin.reusable.clone()?.downcast::<Cube>().ok()?;
        if !cube.has_rollups(grains) {
            debug!(
                target: "LOCAL",
                "reuse skipped fingerprint={} reason=missing roll-ups",
                request.fingerprint
            );
            return None;
        }
        Some(cube)
    }

    fn compute(&self, definition: &ExecutionDefinition, grains: &[GrainSpec]) -> Result<Cube, BackendError> {
        let cube = Cube::compute(&self.dataset, definition, grains)?;
        if cube.base().len() > self.config.max_cube_rows {
            return Err(BackendError::execution(format!(
                "execution produced {} tuples, limit is {}",
                cube.base().len(),
                self.config.max_cube_rows
            )));
        }
        Ok(cube)
    }
}

#[async_trait]
impl ExecutionBackend for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            can_transform_existing_result: true,
            ..Default::default()
        }
    }

    async fn execute(self: Arc<Self>, request: ExecutionRequest) -> Result<Arc<dyn ExecutionResult>, BackendError> {
        let grains = native_rollup_grains(&request.definition);

        let cube = match self.reusable_cube(&request, &grains) {
            Some(cube) => {
                self.stats.reuses.fetch_add(1, Ordering::SeqCst);
                info!(
                    target: "LOCAL",
                    "reused cube fingerprint={} tuples={}",
                    request.fingerprint,
                    cube.base().len()
                );
                cube
            }
            None => {
                let cube = self.compute(&request.definition, &grains)?;
                self.stats.computations.fetch_add(1, Ordering::SeqCst);
                info!(
                    target: "LOCAL",
                    "computed cube fingerprint={} rows={} tuples={} rollups={}",
                    request.fingerprint,
                    cube.contributing_rows(),
                    cube.base().len(),
                    grains.len()
                );
                Arc::new(cube)
            }
        };

        let layout = Layout::build(&self.dataset, &request.definition, &cube, &self.config)?;
        Ok(Arc::new(LocalResult {
            fingerprint: request.fingerprint.join("localResult"),
            definition: request.definition,
            cube,
            layout,
            engine: self.clone(),
            cancel: request.cancel,
        }))
    }
}

// ============================================================================
// RESULT
// ============================================================================

pub struct LocalResult {
    definition: Arc<ExecutionDefinition>,
    fingerprint: Fingerprint,
    cube: Arc<Cube>,
    layout: Layout,
    engine: Arc<LocalEngine>,
    cancel: CancellationToken,
}

impl LocalResult {
    fn check_data(&self) -> Result<(), BackendError> {
        if self.cube.is_empty() {
            return Err(BackendError::NoData(format!(
                "execution {} returned no data",
                self.fingerprint
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionResult for LocalResult {
    fn definition(&self) -> &Arc<ExecutionDefinition> {
        &self.definition
    }

    fn dimensions(&self) -> &[DimensionDescriptor] {
        self.layout.dimensions()
    }

    fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    async fn read_all(&self) -> Result<DataView, BackendError> {
        self.check_data()?;
        let counts = self.layout.total_count();
        let window = ResultWindow::new(&vec![0; counts.len()], &counts);
        let payload = self.layout.payload(&self.cube, &window);
        Ok(DataView::for_all(self.definition.clone(), &self.fingerprint, payload))
    }

    async fn read_window(&self, offset: &[usize], size: &[usize]) -> Result<DataView, BackendError> {
        let window = ResultWindow::new(offset, size);
        window.check_arity(self.layout.dimension_count())?;
        self.check_data()?;
        debug!(
            target: "LOCAL",
            "read window result={} window={}",
            self.fingerprint,
            window.coordinates()
        );
        let payload = self.layout.payload(&self.cube, &window);
        Ok(DataView::for_window(self.definition.clone(), &self.fingerprint, &window, payload))
    }

    fn transform(&self) -> PreparedExecution {
        let reusable: Arc<dyn Any + Send + Sync> = self.cube.clone();
        PreparedExecution::transformed(
            self.engine.clone(),
            &self.definition,
            TransformOrigin::new(&self.definition, self.fingerprint.clone()).with_reusable(reusable),
            self.cancel.clone(),
        )
    }
}
