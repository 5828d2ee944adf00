//! FILENAME: recorded-backend/src/recorder.rs
//! Populates recording directories from a live backend.

use std::path::Path;
use std::sync::Arc;

use backend_spi::{ExecutionBackend, PreparedExecution};
use log::info;

use crate::error::FixtureError;
use crate::fixtures::{find_recordings, write_json, DataViewRequest, RecordingDirectory, EXECUTION_RESULT_FILE};
use crate::recording::ExecutionResultRecording;

/// Outcome of recording one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingReport {
    pub recording: String,
    /// Data view keys written by this run.
    pub written: Vec<String>,
    pub complete: bool,
}

pub struct Recorder {
    backend: Arc<dyn ExecutionBackend>,
    workspace: String,
}

impl Recorder {
    /// Stored definitions carry a test workspace; executions are rebound to `workspace`.
    pub fn new(backend: Arc<dyn ExecutionBackend>, workspace: impl Into<String>) -> Self {
        Recorder {
            backend,
            workspace: workspace.into(),
        }
    }

    /// Executes the recording's definition, writes `executionResult.json`
    /// and every data view file that is still missing.
    pub async fn record(&self, directory: &RecordingDirectory) -> Result<RecordingReport, FixtureError> {
        let definition = directory.definition().with_workspace(self.workspace.as_str());
        let result = PreparedExecution::new(self.backend.clone(), definition).execute().await?;

        write_json(
            &directory.path().join(EXECUTION_RESULT_FILE),
            &ExecutionResultRecording {
                dimensions: result.dimensions().to_vec(),
            },
        )?;

        let mut written = Vec::new();
        for request in directory.missing_data_views() {
            let view = match &request {
                DataViewRequest::All => result.read_all().await?,
                DataViewRequest::Window(w) => result.read_window(&w.offset, &w.size).await?,
            };
            let key = request.key();
            write_json(&directory.data_view_file(&key), view.payload())?;
            written.push(key);
        }

        let report = RecordingReport {
            recording: directory.recording_name(),
            written,
            complete: directory.is_complete(),
        };
        info!(
            target: "REPLAY",
            "recorded {} backend={} views={} complete={}",
            report.recording,
            self.backend.name(),
            report.written.len(),
            report.complete
        );
        Ok(report)
    }

    /// Records every incomplete recording under `root`.
    pub async fn record_incomplete(&self, root: impl AsRef<Path>) -> Result<Vec<RecordingReport>, FixtureError> {
        let mut reports = Vec::new();
        for directory in find_recordings(root)? {
            if directory.is_complete() {
                continue;
            }
            reports.push(self.record(&directory).await?);
        }
        Ok(reports)
    }
}
