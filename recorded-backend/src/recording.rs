//! FILENAME: recorded-backend/src/recording.rs
//! In-memory recordings and the index the replay backend resolves against.
//!
//! A recording is keyed by `fp_<definition fingerprint>`. Inside it, data
//! views are keyed by `dataView_all` or `dataView_o<offsets>s<sizes>` with
//! coordinates joined by `_`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use backend_spi::{DataViewPayload, DimensionDescriptor};
use model::{Bucket, ExecutionDefinition, Fingerprint};
use serde::{Deserialize, Serialize};

// ============================================================================
// KEYS
// ============================================================================

pub const DATA_VIEW_PREFIX: &str = "dataView_";
pub const DATA_VIEW_ALL: &str = "dataView_all";

pub fn recording_key(fingerprint: &Fingerprint) -> String {
    format!("fp_{}", fingerprint)
}

pub fn data_view_window_key(offset: &[usize], size: &[usize]) -> String {
    format!("{}{}", DATA_VIEW_PREFIX, data_view_window_id(offset, size))
}

/// The window UI components read first.
pub fn data_view_first_page_key() -> String {
    data_view_window_key(&[0, 0], &[100, 1000])
}

fn data_view_window_id(offset: &[usize], size: &[usize]) -> String {
    format!("o{}s{}", join(offset), join(size))
}

fn join(values: &[usize]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("_")
}

// ============================================================================
// RECORDING
// ============================================================================

/// Visualization test scenario an execution belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDescriptor {
    pub vis: String,
    pub scenario: String,
    #[serde(default)]
    pub buckets: Vec<Bucket>,
}

/// Contents of `executionResult.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResultRecording {
    #[serde(default)]
    pub dimensions: Vec<DimensionDescriptor>,
}

#[derive(Debug, Clone)]
pub struct ExecutionRecording {
    definition: Arc<ExecutionDefinition>,
    fingerprint: Fingerprint,
    dimensions: Vec<DimensionDescriptor>,
    data_views: BTreeMap<String, DataViewPayload>,
    scenarios: Vec<ScenarioDescriptor>,
}

impl ExecutionRecording {
    pub fn new(definition: ExecutionDefinition, dimensions: Vec<DimensionDescriptor>) -> Self {
        let fingerprint = definition.fingerprint();
        ExecutionRecording {
            definition: Arc::new(definition),
            fingerprint,
            dimensions,
            data_views: BTreeMap::new(),
            scenarios: Vec::new(),
        }
    }

    /// Adds a data view under `key` (`DATA_VIEW_ALL` or a window key).
    pub fn with_data_view(mut self, key: impl Into<String>, payload: DataViewPayload) -> Self {
        self.data_views.insert(key.into(), payload);
        self
    }

    pub fn with_scenarios(mut self, scenarios: Vec<ScenarioDescriptor>) -> Self {
        self.scenarios = scenarios;
        self
    }

    pub fn definition(&self) -> &Arc<ExecutionDefinition> {
        &self.definition
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn key(&self) -> String {
        recording_key(&self.fingerprint)
    }

    pub fn dimensions(&self) -> &[DimensionDescriptor] {
        &self.dimensions
    }

    pub fn scenarios(&self) -> &[ScenarioDescriptor] {
        &self.scenarios
    }

    pub fn data_view(&self, key: &str) -> Option<&DataViewPayload> {
        self.data_views.get(key)
    }

    pub fn data_view_keys(&self) -> impl Iterator<Item = &str> {
        self.data_views.keys().map(String::as_str)
    }
}

// ============================================================================
// INDEX
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RecordingIndex {
    executions: HashMap<String, Arc<ExecutionRecording>>,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a recording, replacing any previous one for the same definition.
    pub fn insert(&mut self, recording: ExecutionRecording) {
        self.executions.insert(recording.key(), Arc::new(recording));
    }

    pub fn with_recording(mut self, recording: ExecutionRecording) -> Self {
        self.insert(recording);
        self
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Arc<ExecutionRecording>> {
        self.executions.get(&recording_key(fingerprint))
    }

    pub fn recordings(&self) -> impl Iterator<Item = &Arc<ExecutionRecording>> {
        self.executions.values()
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{Attribute, ObjRef};

    #[test]
    fn test_keys() {
        assert_eq!(data_view_window_key(&[0, 10], &[5, 20]), "dataView_o0_10s5_20");
        assert_eq!(data_view_first_page_key(), "dataView_o0_0s100_1000");
        assert_eq!(recording_key(&Fingerprint::from("abc")), "fp_abc");
    }

    #[test]
    fn test_index_lookup_by_definition_fingerprint() {
        let definition =
            ExecutionDefinition::new("ws", vec![Attribute::new(ObjRef::identifier("df1"))], vec![], vec![]).unwrap();
        let fingerprint = definition.fingerprint();
        let index = RecordingIndex::new().with_recording(
            ExecutionRecording::new(definition, vec![]).with_data_view(DATA_VIEW_ALL, DataViewPayload::default()),
        );

        let recording = index.get(&fingerprint).unwrap();
        assert!(recording.data_view(DATA_VIEW_ALL).is_some());
        assert!(recording.data_view("dataView_o0s1").is_none());
        assert!(index.get(&Fingerprint::from("other")).is_none());
    }
}
