//! FILENAME: remote-backend/tests/remote_execution.rs
//! Remote executions against a scripted transport.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use afm::AfmDialect;
use async_trait::async_trait;
use backend_spi::*;
use model::*;
use remote_backend::{AfmTransport, RemoteBackend, RemoteBackendConfig, TransportResponse};

const RESULT_LINK: &str = "/gdc/app/projects/test/executionResults/42?q=abc";

/// Answers requests from per-path queues and records every call.
#[derive(Default)]
struct ScriptedTransport {
    answers: Mutex<HashMap<String, VecDeque<TransportResponse>>>,
    calls: Mutex<Vec<(String, Option<serde_json::Value>)>>,
}

impl ScriptedTransport {
    fn answer(&self, path: &str, status: u16, body: &str) -> &Self {
        self.answers
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(TransportResponse::new(status, body));
        self
    }

    fn calls(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, path: &str) -> TransportResponse {
        self.answers
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| TransportResponse::new(500, format!("unexpected request {}", path)))
    }
}

#[async_trait]
impl AfmTransport for ScriptedTransport {
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<TransportResponse, BackendError> {
        self.calls.lock().unwrap().push((path.to_string(), Some(body.clone())));
        Ok(self.next(path))
    }

    async fn get(&self, path: &str) -> Result<TransportResponse, BackendError> {
        self.calls.lock().unwrap().push((path.to_string(), None));
        Ok(self.next(path))
    }
}

fn config(dialect: AfmDialect) -> RemoteBackendConfig {
    RemoteBackendConfig {
        dialect,
        poll_interval_ms: 1,
        max_polls: 3,
        page_limit: 2,
        ..Default::default()
    }
}

fn execution_response(link: &str) -> String {
    serde_json::json!({
        "executionResponse": {
            "dimensions": [
                {"headers": [{"attributeHeader": {
                    "localIdentifier": "region",
                    "name": "Region",
                    "formOf": {"name": "Region", "identifier": "df1"}
                }}]},
                {"headers": [{"measureGroupHeader": {"items": [
                    {"measureHeaderItem": {"localIdentifier": "sales", "name": "Sales", "format": "#,##0"}}
                ]}}]}
            ],
            "links": {"executionResult": link}
        }
    })
    .to_string()
}

fn bear_page(rows: &[(&str, f64)], offset: usize, total: usize) -> String {
    let data: Vec<Vec<String>> = rows.iter().map(|(_, v)| vec![v.to_string()]).collect();
    let elements: Vec<serde_json::Value> = rows
        .iter()
        .map(|(name, _)| serde_json::json!({"attributeHeaderItem": {"uri": format!("/gdc/e/{}", name), "name": name}}))
        .collect();
    serde_json::json!({
        "executionResult": {
            "data": data,
            "headerItems": [[elements], [[{"measureHeaderItem": {"name": "Sales", "order": 0}}]]],
            "paging": {"count": [rows.len(), 1], "offset": [offset, 0], "total": [total, 1]}
        }
    })
    .to_string()
}

fn prepared(backend: Arc<RemoteBackend>) -> PreparedExecution {
    ExecutionFactory::new("test", backend)
        .for_items(
            vec![
                Attribute::new(ObjRef::identifier("df1")).with_local_id("region").into(),
                Measure::simple(ObjRef::identifier("m1"))
                    .aggregation(MeasureAggregation::Sum)
                    .local_id("sales")
                    .build()
                    .into(),
            ],
            vec![],
        )
        .unwrap()
        .with_dimensions(&[
            DimensionSpec::from(new_dimension(["region"], vec![])),
            DimensionSpec::from(new_dimension([MEASURE_GROUP], vec![])),
        ])
        .unwrap()
}

#[tokio::test]
async fn test_bear_execute_and_read_window() {
    let transport = Arc::new(ScriptedTransport::default());
    transport
        .answer("/gdc/app/projects/test/executeAfm", 201, &execution_response(RESULT_LINK))
        .answer(
            &format!("{}&offset=0,0&limit=1,1", RESULT_LINK),
            202,
            "",
        )
        .answer(
            &format!("{}&offset=0,0&limit=1,1", RESULT_LINK),
            200,
            &bear_page(&[("East", 10.0)], 0, 3),
        );
    let backend = Arc::new(RemoteBackend::with_transport(config(AfmDialect::Bear), transport.clone()));

    let result = prepared(backend).execute().await.unwrap();
    assert_eq!(result.dimensions().len(), 2);

    let view = result.read_window(&[0, 0], &[1, 1]).await.unwrap();
    assert_eq!(view.total_count(), &[3, 1]);
    assert_eq!(view.data().get(0, 0).and_then(|v| v.as_f64()), Some(10.0));

    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    let posted = calls[0].1.as_ref().unwrap();
    assert!(posted["execution"]["afm"]["measures"].is_array());
}

#[tokio::test]
async fn test_read_all_stitches_pages() {
    let transport = Arc::new(ScriptedTransport::default());
    transport
        .answer("/gdc/app/projects/test/executeAfm", 201, &execution_response(RESULT_LINK))
        .answer(
            &format!("{}&offset=0,0&limit=2,2", RESULT_LINK),
            200,
            &bear_page(&[("East", 10.0), ("North", 5.0)], 0, 3),
        )
        .answer(
            &format!("{}&offset=2,0&limit=2,2", RESULT_LINK),
            200,
            &bear_page(&[("West", 40.0)], 2, 3),
        );
    let backend = Arc::new(RemoteBackend::with_transport(config(AfmDialect::Bear), transport.clone()));

    let view = prepared(backend).execute().await.unwrap().read_all().await.unwrap();

    assert_eq!(view.count(), &[3, 1]);
    assert_eq!(view.offset(), &[0, 0]);
    let values: Vec<_> = (0..3).map(|r| view.data().get(r, 0).and_then(|v| v.as_f64())).collect();
    assert_eq!(values, vec![Some(10.0), Some(5.0), Some(40.0)]);
    let names: Vec<_> = view.header_items()[0][0].iter().filter_map(|h| h.name()).collect();
    assert_eq!(names, vec!["East", "North", "West"]);
}

#[tokio::test]
async fn test_status_mapping() {
    let transport = Arc::new(ScriptedTransport::default());
    transport
        .answer("/gdc/app/projects/test/executeAfm", 201, &execution_response(RESULT_LINK))
        .answer(&format!("{}&offset=0,0&limit=2,2", RESULT_LINK), 204, "")
        .answer(&format!("{}&offset=5,0&limit=1,1", RESULT_LINK), 400, "bad window");
    let backend = Arc::new(RemoteBackend::with_transport(config(AfmDialect::Bear), transport));
    let result = prepared(backend).execute().await.unwrap();

    assert!(result.read_all().await.unwrap_err().is_no_data());
    match result.read_window(&[5, 0], &[1, 1]).await.unwrap_err() {
        BackendError::Execution { message, .. } => {
            assert!(message.contains("400"));
            assert!(message.contains("bad window"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_polling_gives_up() {
    let transport = Arc::new(ScriptedTransport::default());
    let path = format!("{}&offset=0,0&limit=1,1", RESULT_LINK);
    transport.answer("/gdc/app/projects/test/executeAfm", 201, &execution_response(RESULT_LINK));
    for _ in 0..3 {
        transport.answer(&path, 202, "");
    }
    let backend = Arc::new(RemoteBackend::with_transport(config(AfmDialect::Bear), transport));
    let result = prepared(backend).execute().await.unwrap();

    let err = result.read_window(&[0, 0], &[1, 1]).await.unwrap_err();
    assert!(matches!(err, BackendError::Execution { .. }));
}

#[tokio::test]
async fn test_rejected_execution() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.answer("/gdc/app/projects/test/executeAfm", 404, "");
    let backend = Arc::new(RemoteBackend::with_transport(config(AfmDialect::Bear), transport));

    let err = prepared(backend).execute().await.err().unwrap();
    assert!(err.is_no_data());
}

#[tokio::test]
async fn test_tiger_execution() {
    let transport = Arc::new(ScriptedTransport::default());
    let link = "/api/workspaces/test/execution/afm/execute/result/abc";
    transport
        .answer("/api/workspaces/test/execution/afm/execute", 200, &execution_response(link))
        .answer(
            &format!("{}?offset=0,0&limit=5,5", link),
            200,
            r#"{
                "data": [[10], [40]],
                "dimensionHeaders": [
                    {"headerGroups": [{"headers": [{"attributeHeader": {"labelValue": "East"}}, {"attributeHeader": {"labelValue": "West"}}]}]},
                    {"headerGroups": [{"headers": [{"measureHeader": {"name": "Sales", "order": 0}}]}]}
                ],
                "paging": {"count": [2, 1], "offset": [0, 0], "total": [2, 1]}
            }"#,
        );
    let backend = Arc::new(RemoteBackend::with_transport(config(AfmDialect::Tiger), transport.clone()));
    assert!(!backend.capabilities().can_transform_existing_result);

    let result = prepared(backend).execute().await.unwrap();
    let view = result.read_window(&[0, 0], &[5, 5]).await.unwrap();
    assert_eq!(
        view.header_items()[0][0][1],
        ResultHeader::attribute(Some("West".into()), Some("/fake/West".into()))
    );

    let posted = transport.calls()[0].1.clone().unwrap();
    assert_eq!(posted["project"], "test");
}

#[tokio::test]
async fn test_unsupported_definition_never_reaches_server() {
    let transport = Arc::new(ScriptedTransport::default());
    let backend = Arc::new(RemoteBackend::with_transport(config(AfmDialect::Tiger), transport.clone()));

    let prepared = ExecutionFactory::new("test", backend)
        .for_items(
            vec![
                Attribute::new(ObjRef::uri("/gdc/md/obj/1")).with_local_id("a").into(),
                Measure::simple(ObjRef::identifier("m1")).local_id("m").build().into(),
            ],
            vec![],
        )
        .unwrap();
    assert!(model::check_executable(prepared.definition()).is_ok());
    let err = prepared.execute().await.err().unwrap();

    assert!(matches!(err, BackendError::NotSupported(_)), "{:?}", err);
    assert!(transport.calls().is_empty());
}
