//! FILENAME: remote-backend/src/protocol.rs
//! Endpoints and response bodies of the two AFM dialects.
//!
//! Both dialects answer an execution with dimension descriptors and a link
//! to the result; result pages differ. Bear pages already have the shared
//! `DataViewPayload` shape, Tiger pages are normalized here.

use afm::AfmDialect;
use backend_spi::{
    BackendError, DataMatrix, DataValue, DataViewPayload, DimensionDescriptor, ResultHeader, ResultWindow,
};
use serde::Deserialize;

// ============================================================================
// ENDPOINTS
// ============================================================================

pub fn execute_path(dialect: AfmDialect, workspace: &str) -> String {
    match dialect {
        AfmDialect::Bear => format!("/gdc/app/projects/{}/executeAfm", workspace),
        AfmDialect::Tiger => format!("/api/workspaces/{}/execution/afm/execute", workspace),
    }
}

/// Result link with the window appended as `offset` / `limit` parameters.
pub fn page_path(result_link: &str, window: &ResultWindow) -> String {
    let separator = if result_link.contains('?') { '&' } else { '?' };
    format!(
        "{}{}offset={}&limit={}",
        result_link,
        separator,
        join(&window.offset),
        join(&window.size)
    )
}

fn join(values: &[usize]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

// ============================================================================
// EXECUTION RESPONSE
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionResponseEnvelope {
    execution_response: ExecutionResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionResponse {
    #[serde(default)]
    pub dimensions: Vec<DimensionDescriptor>,
    pub links: ExecutionLinks,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLinks {
    pub execution_result: String,
}

pub fn parse_execution_response(body: &str) -> Result<ExecutionResponse, BackendError> {
    serde_json::from_str::<ExecutionResponseEnvelope>(body)
        .map(|envelope| envelope.execution_response)
        .map_err(|e| BackendError::execution_caused_by("malformed execution response", e))
}

// ============================================================================
// RESULT PAGES
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BearResultEnvelope {
    execution_result: BearExecutionResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BearExecutionResult {
    data: DataMatrix,
    #[serde(default)]
    header_items: Vec<Vec<Vec<ResultHeader>>>,
    #[serde(default)]
    totals: Option<Vec<Vec<Vec<DataValue>>>>,
    paging: Paging,
}

#[derive(Debug, Deserialize)]
struct Paging {
    count: Vec<usize>,
    offset: Vec<usize>,
    total: Vec<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TigerExecutionResult {
    data: DataMatrix,
    #[serde(default)]
    dimension_headers: Option<Vec<TigerDimensionHeader>>,
    paging: Paging,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TigerDimensionHeader {
    header_groups: Vec<TigerHeaderGroup>,
}

#[derive(Debug, Deserialize)]
struct TigerHeaderGroup {
    headers: Vec<TigerHeader>,
}

#[derive(Debug, Deserialize)]
enum TigerHeader {
    #[serde(rename = "attributeHeader")]
    Attribute {
        #[serde(rename = "labelValue")]
        label_value: String,
    },
    #[serde(rename = "measureHeader")]
    Measure { name: String, order: usize },
    #[serde(rename = "totalHeader")]
    Total {
        name: String,
        #[serde(rename = "type")]
        total_type: String,
    },
}

impl From<TigerHeader> for ResultHeader {
    fn from(header: TigerHeader) -> Self {
        match header {
            // Tiger elements have no uri; the label value stands in for one.
            TigerHeader::Attribute { label_value } => {
                ResultHeader::attribute(Some(label_value.clone()), Some(format!("/fake/{}", label_value)))
            }
            TigerHeader::Measure { name, order } => ResultHeader::measure(name, order),
            TigerHeader::Total { name, total_type } => ResultHeader::total(name, total_type),
        }
    }
}

/// Parses one result page of `dialect` into the shared payload shape.
pub fn parse_result_page(dialect: AfmDialect, body: &str) -> Result<DataViewPayload, BackendError> {
    let malformed = |e: serde_json::Error| BackendError::execution_caused_by("malformed execution result", e);
    match dialect {
        AfmDialect::Bear => {
            let result = serde_json::from_str::<BearResultEnvelope>(body).map_err(malformed)?.execution_result;
            Ok(DataViewPayload {
                data: result.data,
                header_items: result.header_items,
                totals: result.totals,
                count: result.paging.count,
                offset: result.paging.offset,
                total_count: result.paging.total,
            })
        }
        AfmDialect::Tiger => {
            let result = serde_json::from_str::<TigerExecutionResult>(body).map_err(malformed)?;
            let header_items = match result.dimension_headers {
                Some(dimensions) => dimensions
                    .into_iter()
                    .map(|dim| {
                        dim.header_groups
                            .into_iter()
                            .map(|group| group.headers.into_iter().map(ResultHeader::from).collect())
                            .collect()
                    })
                    .collect(),
                None => vec![vec![vec![]]],
            };
            Ok(DataViewPayload {
                data: result.data,
                header_items,
                totals: None,
                count: result.paging.count,
                offset: result.paging.offset,
                total_count: result.paging.total,
            })
        }
    }
}
