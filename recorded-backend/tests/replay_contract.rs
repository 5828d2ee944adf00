//! FILENAME: recorded-backend/tests/replay_contract.rs
//! Recording from a live backend and replaying from disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use backend_spi::*;
use local_engine::{Dataset, LocalEngine, LocalEngineConfig};
use model::*;
use recorded_backend::fixtures::{DEFINITION_FILE, REQUESTS_FILE, SCENARIOS_FILE};
use recorded_backend::*;

fn engine() -> Arc<LocalEngine> {
    let dataset = Dataset::builder()
        .label(
            ObjRef::identifier("df1"),
            "Region",
            [Some("West"), Some("East"), Some("West")],
        )
        .fact(ObjRef::identifier("m1"), "Sales", [Some(10.0), Some(20.0), Some(30.0)])
        .build()
        .unwrap();
    Arc::new(LocalEngine::new(dataset, LocalEngineConfig::default()))
}

/// Workspace `test`, `sales` = sum of `m1`, `region` = `df1`, dims `[[region], [measureGroup]]`.
fn definition(workspace: &str) -> ExecutionDefinition {
    ExecutionDefinition::new(
        workspace,
        vec![Attribute::new(ObjRef::identifier("df1")).with_local_id("region")],
        vec![Measure::simple(ObjRef::identifier("m1"))
            .aggregation(MeasureAggregation::Sum)
            .local_id("sales")
            .build()],
        vec![],
    )
    .unwrap()
    .with_dimensions(&[
        DimensionSpec::from(new_dimension(["region"], vec![])),
        DimensionSpec::from(new_dimension([MEASURE_GROUP], vec![])),
    ])
    .unwrap()
}

fn write_recording(root: &Path, requests: Option<&str>) -> PathBuf {
    let def = definition("test");
    let dir = root.join(def.fingerprint().as_str());
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(DEFINITION_FILE), serde_json::to_string(&def).unwrap()).unwrap();
    fs::write(
        dir.join(SCENARIOS_FILE),
        r#"[{"vis": "BarChart", "scenario": "single measure"}, {"vis": "Table", "scenario": "base"}]"#,
    )
    .unwrap();
    if let Some(requests) = requests {
        fs::write(dir.join(REQUESTS_FILE), requests).unwrap();
    }
    dir
}

async fn record(root: &Path) -> Vec<RecordingReport> {
    Recorder::new(engine(), "test").record_incomplete(root).await.unwrap()
}

fn replay(root: &Path) -> Arc<RecordedBackend> {
    Arc::new(RecordedBackend::new(load_index(root).unwrap()))
}

#[tokio::test]
async fn test_record_then_replay_all_data() {
    let root = tempfile::tempdir().unwrap();
    write_recording(root.path(), None);

    let reports = record(root.path()).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].written, vec![DATA_VIEW_ALL.to_string()]);
    assert!(reports[0].complete);

    let result = PreparedExecution::new(replay(root.path()), definition("test"))
        .execute()
        .await
        .unwrap();
    assert_eq!(result.fingerprint(), &definition("test").fingerprint().join("recordedResult"));
    assert_eq!(result.dimensions().len(), 2);

    let view = result.read_all().await.unwrap();
    assert_eq!(view.total_count(), &[2, 1]);
    assert_eq!(
        view.data(),
        &DataMatrix::TwoDim(vec![vec![DataValue::Number(20.0)], vec![DataValue::Number(40.0)]])
    );
    let regions: Vec<_> = view.header_items()[0][0].iter().filter_map(|h| h.name()).collect();
    assert_eq!(regions, vec!["East", "West"]);

    // Already complete: nothing to do on a second run.
    assert!(record(root.path()).await.is_empty());
}

#[tokio::test]
async fn test_unknown_definition_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    write_recording(root.path(), None);
    record(root.path()).await;

    let other = definition("test").with_sorting(vec![new_attribute_sort("region", SortDirection::Desc, false)]);
    let err = PreparedExecution::new(replay(root.path()), other).execute().await.err().unwrap();
    match err {
        BackendError::NoData(message) => assert_eq!(message, "recording was not found"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_windows_must_match_exactly() {
    let root = tempfile::tempdir().unwrap();
    write_recording(
        root.path(),
        Some(r#"{"allData": false, "windows": [{"offset": [0, 0], "size": [1, 1]}]}"#),
    );
    let reports = record(root.path()).await;
    assert_eq!(reports[0].written, vec!["dataView_o0_0s1_1".to_string()]);

    let result = PreparedExecution::new(replay(root.path()), definition("test"))
        .execute()
        .await
        .unwrap();

    let window = result.read_window(&[0, 0], &[1, 1]).await.unwrap();
    assert_eq!(window.data().get(0, 0).and_then(|v| v.as_f64()), Some(20.0));

    let err = result.read_window(&[0, 0], &[2, 1]).await.unwrap_err();
    assert!(err.is_no_data());

    // Execution succeeded, but the all-data view was never recorded.
    let err = result.read_all().await.unwrap_err();
    match err {
        BackendError::NoData(message) => {
            assert_eq!(message, "there is no execution recording that contains all data")
        }
        other => panic!("unexpected error {:?}", other),
    }

    assert!(result.read_window(&[0], &[1]).await.unwrap_err().is_validation());
}

#[tokio::test]
async fn test_named_data_views() {
    let root = tempfile::tempdir().unwrap();
    write_recording(root.path(), None);
    record(root.path()).await;

    let views = recorded_data_views(&load_index(root.path()).unwrap());
    let names: Vec<_> = views.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["BarChart - single measure", "Table - base"]);
    assert_eq!(views[0].data_view.total_count(), &[2, 1]);
}

#[tokio::test]
async fn test_transform_resolves_against_the_index() {
    let def = definition("test");
    let laid_out = def
        .without_layout()
        .with_dimensions(&[DimensionSpec::Generator(default_dimension_generator())])
        .unwrap();
    let payload = DataViewPayload {
        data: DataMatrix::TwoDim(vec![vec![DataValue::Number(60.0)]]),
        header_items: vec![],
        totals: None,
        count: vec![1, 1],
        offset: vec![0, 0],
        total_count: vec![1, 1],
    };
    let index = RecordingIndex::new()
        .with_recording(ExecutionRecording::new(def.clone(), vec![]))
        .with_recording(ExecutionRecording::new(laid_out, vec![]).with_data_view(DATA_VIEW_ALL, payload.clone()));
    let backend = Arc::new(RecordedBackend::new(index));

    let result = PreparedExecution::new(backend, def).execute().await.unwrap();
    let transformed = result.transform().execute().await.unwrap();
    assert_eq!(transformed.read_all().await.unwrap().payload(), &payload);
}
