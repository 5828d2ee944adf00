//! FILENAME: recorded-backend/src/lib.rs
//! Fixture-backed replay of executions.
//!
//! Layers:
//! - `recording`: in-memory recordings and the fingerprint-keyed index
//! - `fixtures`: recording directories on disk
//! - `recorder`: fills recording directories from a live backend
//! - `backend`: the replay ExecutionBackend and named scenario data views

pub mod backend;
mod error;
pub mod fixtures;
pub mod recorder;
pub mod recording;

pub use backend::{recorded_data_views, NamedDataView, RecordedBackend, RecordedResult};
pub use error::FixtureError;
pub use fixtures::{load_index, DataViewRequest, DataViewRequests, RecordingDirectory, RequestedWindow};
pub use recorder::{Recorder, RecordingReport};
pub use recording::{
    data_view_first_page_key, data_view_window_key, recording_key, ExecutionRecording, ExecutionResultRecording,
    RecordingIndex, ScenarioDescriptor, DATA_VIEW_ALL,
};
