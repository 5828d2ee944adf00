//! FILENAME: recorded-backend/src/backend.rs
//! Replay backend - answers executions from recordings only.
//!
//! Lookups are exact: an unknown definition fails at `execute()`, a known
//! definition without the requested data view fails at read time. Nothing
//! is computed or approximated.

use std::sync::Arc;

use async_trait::async_trait;
use backend_spi::{
    BackendCapabilities, BackendError, DataView, DimensionDescriptor, ExecutionBackend, ExecutionRequest,
    ExecutionResult, PreparedExecution, ResultWindow, TransformOrigin,
};
use log::debug;
use model::{ExecutionDefinition, Fingerprint};
use tokio_util::sync::CancellationToken;

use crate::recording::{
    data_view_window_key, ExecutionRecording, RecordingIndex, ScenarioDescriptor, DATA_VIEW_ALL,
};

// ============================================================================
// BACKEND
// ============================================================================

pub struct RecordedBackend {
    index: Arc<RecordingIndex>,
}

impl RecordedBackend {
    pub fn new(index: RecordingIndex) -> Self {
        Self::with_shared_index(Arc::new(index))
    }

    pub fn with_shared_index(index: Arc<RecordingIndex>) -> Self {
        RecordedBackend { index }
    }

    pub fn index(&self) -> &Arc<RecordingIndex> {
        &self.index
    }
}

#[async_trait]
impl ExecutionBackend for RecordedBackend {
    fn name(&self) -> &str {
        "recorded"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            supports_arbitrary_windows: false,
            ..Default::default()
        }
    }

    async fn execute(self: Arc<Self>, request: ExecutionRequest) -> Result<Arc<dyn ExecutionResult>, BackendError> {
        let Some(recording) = self.index.get(&request.fingerprint) else {
            debug!(target: "REPLAY", "no recording fingerprint={}", request.fingerprint);
            return Err(BackendError::NoData("recording was not found".into()));
        };

        Ok(Arc::new(RecordedResult {
            fingerprint: request.fingerprint.join("recordedResult"),
            definition: request.definition,
            recording: recording.clone(),
            backend: self.clone(),
            cancel: request.cancel,
        }))
    }
}

// ============================================================================
// RESULT
// ============================================================================

pub struct RecordedResult {
    definition: Arc<ExecutionDefinition>,
    fingerprint: Fingerprint,
    recording: Arc<ExecutionRecording>,
    backend: Arc<RecordedBackend>,
    cancel: CancellationToken,
}

#[async_trait]
impl ExecutionResult for RecordedResult {
    fn definition(&self) -> &Arc<ExecutionDefinition> {
        &self.definition
    }

    fn dimensions(&self) -> &[DimensionDescriptor] {
        self.recording.dimensions()
    }

    fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    async fn read_all(&self) -> Result<DataView, BackendError> {
        let payload = self
            .recording
            .data_view(DATA_VIEW_ALL)
            .ok_or_else(|| BackendError::NoData("there is no execution recording that contains all data".into()))?;
        Ok(DataView::for_all(self.definition.clone(), &self.fingerprint, payload.clone()))
    }

    async fn read_window(&self, offset: &[usize], size: &[usize]) -> Result<DataView, BackendError> {
        let window = ResultWindow::new(offset, size);
        window.check_arity(self.definition.dimensions().len())?;

        let key = data_view_window_key(offset, size);
        let payload = self.recording.data_view(&key).ok_or_else(|| {
            debug!(target: "REPLAY", "no data view result={} key={}", self.fingerprint, key);
            BackendError::NoData("there is no execution recording for requested window".into())
        })?;
        Ok(DataView::for_window(self.definition.clone(), &self.fingerprint, &window, payload.clone()))
    }

    fn transform(&self) -> PreparedExecution {
        PreparedExecution::transformed(
            self.backend.clone(),
            &self.definition,
            TransformOrigin::new(&self.definition, self.fingerprint.clone()),
            self.cancel.clone(),
        )
    }
}

// ============================================================================
// NAMED DATA VIEWS
// ============================================================================

/// All-data view of one test scenario, named `<vis> - <scenario>`.
#[derive(Debug, Clone)]
pub struct NamedDataView {
    pub name: String,
    pub scenario: ScenarioDescriptor,
    pub data_view: DataView,
}

/// Named views for every recording that has scenarios and an all-data view,
/// sorted by name.
pub fn recorded_data_views(index: &RecordingIndex) -> Vec<NamedDataView> {
    let mut views: Vec<NamedDataView> = index.recordings().flat_map(|r| expand_recording(r)).collect();
    views.sort_by(|a, b| a.name.cmp(&b.name));
    views
}

fn expand_recording(recording: &ExecutionRecording) -> Vec<NamedDataView> {
    let Some(payload) = recording.data_view(DATA_VIEW_ALL) else {
        return Vec::new();
    };
    let result_fingerprint = recording.fingerprint().join("recordedResult");

    recording
        .scenarios()
        .iter()
        .map(|scenario| NamedDataView {
            name: format!("{} - {}", scenario.vis, scenario.scenario),
            scenario: scenario.clone(),
            data_view: DataView::for_all(recording.definition().clone(), &result_fingerprint, payload.clone()),
        })
        .collect()
}
