//! FILENAME: recorded-backend/src/fixtures.rs
//! On-disk recordings.
//!
//! One directory per execution, named after the definition fingerprint:
//! - `definition.json`: the execution definition
//! - `executionResult.json`: `{"dimensions": [...]}`
//! - `dataView_all.json`, `dataView_o<offsets>s<sizes>.json`: data views
//! - `scenarios.json` (optional): `[{vis, scenario, buckets}]`
//! - `requests.json` (optional): `{allData, windows: [{offset, size}]}`
//!
//! Scenario and request files are hand-written; when they are malformed the
//! loader warns and falls back instead of failing.

use std::fs;
use std::path::{Path, PathBuf};

use backend_spi::DataViewPayload;
use log::{debug, warn};
use model::{ExecutionDefinition, Fingerprint};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::FixtureError;
use crate::recording::{
    data_view_window_key, recording_key, ExecutionRecording, ExecutionResultRecording, RecordingIndex,
    ScenarioDescriptor, DATA_VIEW_ALL, DATA_VIEW_PREFIX,
};

pub const DEFINITION_FILE: &str = "definition.json";
pub const EXECUTION_RESULT_FILE: &str = "executionResult.json";
pub const SCENARIOS_FILE: &str = "scenarios.json";
pub const REQUESTS_FILE: &str = "requests.json";

// ============================================================================
// DATA VIEW REQUESTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedWindow {
    pub offset: Vec<usize>,
    pub size: Vec<usize>,
}

/// Which data views a recording should contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataViewRequests {
    #[serde(default)]
    pub all_data: Option<bool>,
    #[serde(default)]
    pub windows: Option<Vec<RequestedWindow>>,
}

impl Default for DataViewRequests {
    fn default() -> Self {
        DataViewRequests {
            all_data: Some(true),
            windows: None,
        }
    }
}

/// One data view file a recording needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataViewRequest {
    All,
    Window(RequestedWindow),
}

impl DataViewRequest {
    pub fn key(&self) -> String {
        match self {
            DataViewRequest::All => DATA_VIEW_ALL.to_string(),
            DataViewRequest::Window(w) => data_view_window_key(&w.offset, &w.size),
        }
    }
}

// ============================================================================
// RECORDING DIRECTORY
// ============================================================================

#[derive(Debug, Clone)]
pub struct RecordingDirectory {
    directory: PathBuf,
    definition: ExecutionDefinition,
    fingerprint: Fingerprint,
    scenarios: Vec<ScenarioDescriptor>,
    requests: DataViewRequests,
}

impl RecordingDirectory {
    /// Opens a recording directory. Only `definition.json` is required.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let directory = directory.as_ref().to_path_buf();
        let definition_file = directory.join(DEFINITION_FILE);
        if !definition_file.is_file() {
            return Err(FixtureError::NotARecording(directory.display().to_string()));
        }

        let definition: ExecutionDefinition = read_json(&definition_file)?;
        let fingerprint = definition.fingerprint();
        let stored = directory.file_name().map(|n| n.to_string_lossy().to_string());
        if stored.as_deref() != Some(fingerprint.as_str()) {
            warn!(
                target: "REPLAY",
                "fingerprint mismatch dir={} actual={}",
                directory.display(),
                fingerprint
            );
        }

        let scenarios = load_scenarios(&directory);
        let requests = load_requests(&directory);
        Ok(RecordingDirectory {
            directory,
            definition,
            fingerprint,
            scenarios,
            requests,
        })
    }

    pub fn path(&self) -> &Path {
        &self.directory
    }

    pub fn definition(&self) -> &ExecutionDefinition {
        &self.definition
    }

    /// Fingerprint recomputed from the stored definition.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn recording_name(&self) -> String {
        recording_key(&self.fingerprint)
    }

    pub fn scenarios(&self) -> &[ScenarioDescriptor] {
        &self.scenarios
    }

    pub fn requests(&self) -> &DataViewRequests {
        &self.requests
    }

    pub fn required_data_views(&self) -> Vec<DataViewRequest> {
        let mut required = Vec::new();
        if self.requests.all_data.unwrap_or(false) {
            required.push(DataViewRequest::All);
        }
        if let Some(windows) = &self.requests.windows {
            required.extend(windows.iter().cloned().map(DataViewRequest::Window));
        }
        required
    }

    pub fn missing_data_views(&self) -> Vec<DataViewRequest> {
        self.required_data_views()
            .into_iter()
            .filter(|r| !self.data_view_file(&r.key()).is_file())
            .collect()
    }

    pub fn has_result(&self) -> bool {
        self.directory.join(EXECUTION_RESULT_FILE).is_file()
    }

    pub fn is_complete(&self) -> bool {
        self.has_result() && self.missing_data_views().is_empty()
    }

    pub(crate) fn data_view_file(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.json", key))
    }

    /// Reads the recorded result and every data view file in the directory.
    pub fn load(&self) -> Result<ExecutionRecording, FixtureError> {
        let result: ExecutionResultRecording = read_json(&self.directory.join(EXECUTION_RESULT_FILE))?;
        let mut recording = ExecutionRecording::new(self.definition.clone(), result.dimensions)
            .with_scenarios(self.scenarios.clone());

        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            let Some(key) = data_view_key(&path) else { continue };
            let payload: DataViewPayload = read_json(&path)?;
            recording = recording.with_data_view(key, payload);
        }
        Ok(recording)
    }
}

/// Data view key of a `dataView_*.json` file name.
fn data_view_key(path: &Path) -> Option<String> {
    if path.extension()?.to_str()? != "json" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.starts_with(DATA_VIEW_PREFIX).then(|| stem.to_string())
}

// ============================================================================
// INDEX LOADING
// ============================================================================

/// Every directory under `root` (including `root`) holding a `definition.json`.
pub fn find_recordings(root: impl AsRef<Path>) -> Result<Vec<RecordingDirectory>, FixtureError> {
    let mut found = Vec::new();
    let mut pending = vec![root.as_ref().to_path_buf()];
    while let Some(dir) = pending.pop() {
        if dir.join(DEFINITION_FILE).is_file() {
            found.push(RecordingDirectory::open(&dir)?);
        }
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            }
        }
    }
    found.sort_by(|a, b| a.directory.cmp(&b.directory));
    Ok(found)
}

/// Loads all complete recordings under `root`. Recordings without an
/// execution result are skipped.
pub fn load_index(root: impl AsRef<Path>) -> Result<RecordingIndex, FixtureError> {
    let mut index = RecordingIndex::new();
    for directory in find_recordings(root)? {
        if !directory.has_result() {
            warn!(
                target: "REPLAY",
                "skipping recording without result dir={}",
                directory.path().display()
            );
            continue;
        }
        index.insert(directory.load()?);
    }
    debug!(target: "REPLAY", "loaded recordings count={}", index.len());
    Ok(index)
}

// ============================================================================
// FILE HELPERS
// ============================================================================

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, FixtureError> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| FixtureError::Json {
        path: path.display().to_string(),
        source,
    })
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), FixtureError> {
    let text = serde_json::to_string_pretty(value).map_err(|source| FixtureError::Json {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, text)?;
    Ok(())
}

fn load_scenarios(directory: &Path) -> Vec<ScenarioDescriptor> {
    let file = directory.join(SCENARIOS_FILE);
    if !file.is_file() {
        return Vec::new();
    }

    let value: serde_json::Value = match read_json(&file) {
        Ok(value) => value,
        Err(e) => {
            warn!(target: "REPLAY", "unreadable scenarios, ignoring dir={} error={}", directory.display(), e);
            return Vec::new();
        }
    };
    let Some(items) = value.as_array() else {
        warn!(target: "REPLAY", "scenarios are not an array, ignoring dir={}", directory.display());
        return Vec::new();
    };

    let valid: Vec<ScenarioDescriptor> = items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect();
    if valid.len() != items.len() {
        warn!(
            target: "REPLAY",
            "dropped invalid scenarios dir={} valid={} total={}",
            directory.display(),
            valid.len(),
            items.len()
        );
    }
    valid
}

fn load_requests(directory: &Path) -> DataViewRequests {
    let file = directory.join(REQUESTS_FILE);
    if !file.is_file() {
        return DataViewRequests::default();
    }

    let parsed = read_json::<serde_json::Value>(&file).and_then(|value| {
        serde_json::from_value::<DataViewRequests>(value).map_err(|source| FixtureError::Json {
            path: file.display().to_string(),
            source,
        })
    });
    match parsed {
        Ok(requests) if requests.all_data.is_some() || requests.windows.is_some() => requests,
        Ok(_) => {
            warn!(target: "REPLAY", "requests name nothing, using all data dir={}", directory.display());
            DataViewRequests::default()
        }
        Err(e) => {
            warn!(target: "REPLAY", "unreadable requests, using all data dir={} error={}", directory.display(), e);
            DataViewRequests::default()
        }
    }
}
