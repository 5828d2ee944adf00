//! FILENAME: remote-backend/src/backend.rs
//! Remote backend - executes definitions on an analytical server over HTTP.
//!
//! `execute()` compiles and submits the definition and keeps the result link;
//! every read GETs a window of that link, polling while the server is still
//! computing.

use std::sync::Arc;

use afm::{AfmDialect, AfmError};
use async_trait::async_trait;
use backend_spi::{
    cancellable, BackendCapabilities, BackendError, DataView, DataViewPayload, DimensionDescriptor,
    ExecutionBackend, ExecutionRequest, ExecutionResult, PreparedExecution, ResultWindow, TransformOrigin,
};
use log::{debug, info, warn};
use model::{ExecutionDefinition, Fingerprint};
use tokio_util::sync::CancellationToken;

use crate::config::RemoteBackendConfig;
use crate::pages::{assemble, page_windows};
use crate::protocol::{execute_path, page_path, parse_execution_response, parse_result_page};
use crate::transport::{AfmTransport, HttpTransport, TransportResponse};

const STATUS_ACCEPTED: u16 = 202;

// ============================================================================
// BACKEND
// ============================================================================

pub struct RemoteBackend {
    config: RemoteBackendConfig,
    transport: Arc<dyn AfmTransport>,
}

impl RemoteBackend {
    /// Backend talking to `config.base_url` through reqwest.
    pub fn new(config: RemoteBackendConfig) -> Result<Self, BackendError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: RemoteBackendConfig, transport: Arc<dyn AfmTransport>) -> Self {
        RemoteBackend { config, transport }
    }

    pub fn config(&self) -> &RemoteBackendConfig {
        &self.config
    }

    fn dialect(&self) -> AfmDialect {
        self.config.dialect
    }

    fn compile(&self, definition: &ExecutionDefinition) -> Result<serde_json::Value, BackendError> {
        self.dialect().compile(definition).map_err(|e| match e {
            AfmError::NotSupported(message) => BackendError::NotSupported(message),
            other => BackendError::execution_caused_by("failed to compile execution", other),
        })
    }

    /// GETs one window, polling while the result is not ready yet.
    async fn fetch_page(&self, result_link: &str, window: &ResultWindow) -> Result<DataViewPayload, BackendError> {
        let path = page_path(result_link, window);
        let mut polls = 0u32;
        loop {
            let response = self.transport.get(&path).await?;
            if response.status == STATUS_ACCEPTED {
                polls += 1;
                if polls >= self.config.max_polls {
                    return Err(BackendError::execution(format!(
                        "result {} not ready after {} polls",
                        result_link, polls
                    )));
                }
                debug!(target: "REMOTE", "result not ready link={} poll={}", result_link, polls);
                tokio::time::sleep(self.config.poll_interval()).await;
                continue;
            }
            if !response.is_success() || response.status == 204 {
                return Err(status_error("reading result", &response));
            }
            return parse_result_page(self.dialect(), &response.body);
        }
    }
}

/// NoData for 204/404, an execution error with status and body otherwise.
fn status_error(action: &str, response: &TransportResponse) -> BackendError {
    match response.status {
        204 | 404 => BackendError::NoData(format!("{}: server returned status {}", action, response.status)),
        status => BackendError::execution(format!("{} failed with status {}: {}", action, status, response.body)),
    }
}

#[async_trait]
impl ExecutionBackend for RemoteBackend {
    fn name(&self) -> &str {
        "remote"
    }

    fn capabilities(&self) -> BackendCapabilities {
        match self.dialect() {
            AfmDialect::Bear => BackendCapabilities::default(),
            AfmDialect::Tiger => BackendCapabilities {
                can_calculate_totals: false,
                can_calculate_native_totals: false,
                supports_measure_value_filters: false,
                ..Default::default()
            },
        }
    }

    async fn execute(self: Arc<Self>, request: ExecutionRequest) -> Result<Arc<dyn ExecutionResult>, BackendError> {
        let payload = self.compile(&request.definition)?;
        let path = execute_path(self.dialect(), request.definition.workspace());

        let response = self.transport.post_json(&path, &payload).await?;
        if !response.is_success() || response.status == 204 {
            warn!(
                target: "REMOTE",
                "execution rejected fingerprint={} status={}",
                request.fingerprint,
                response.status
            );
            return Err(status_error("executing definition", &response));
        }

        let execution = parse_execution_response(&response.body)?;
        info!(
            target: "REMOTE",
            "executed fingerprint={} dialect={} link={}",
            request.fingerprint,
            self.dialect().as_str(),
            execution.links.execution_result
        );

        Ok(Arc::new(RemoteResult {
            fingerprint: request.fingerprint.join(&execution.links.execution_result),
            definition: request.definition,
            dimensions: execution.dimensions,
            result_link: execution.links.execution_result,
            backend: self,
            cancel: request.cancel,
        }))
    }
}

// ============================================================================
// RESULT
// ============================================================================

pub struct RemoteResult {
    definition: Arc<ExecutionDefinition>,
    fingerprint: Fingerprint,
    dimensions: Vec<DimensionDescriptor>,
    result_link: String,
    backend: Arc<RemoteBackend>,
    cancel: CancellationToken,
}

impl RemoteResult {
    pub fn result_link(&self) -> &str {
        &self.result_link
    }

    async fn read_pages(&self) -> Result<DataViewPayload, BackendError> {
        let limit = self.backend.config.effective_page_limit();
        let dims = self.definition.dimensions().len();
        let first_window = ResultWindow::new(&vec![0; dims], &vec![limit; dims]);
        let first = self.backend.fetch_page(&self.result_link, &first_window).await?;

        let windows = page_windows(&first.total_count, limit);
        if windows.len() <= 1 {
            return Ok(first);
        }

        let mut pages = Vec::with_capacity(windows.len());
        pages.push(first);
        for window in windows.iter().skip(1) {
            pages.push(self.backend.fetch_page(&self.result_link, window).await?);
        }
        info!(
            target: "REMOTE",
            "read all result={} pages={}",
            self.fingerprint,
            pages.len()
        );
        Ok(assemble(pages))
    }
}

#[async_trait]
impl ExecutionResult for RemoteResult {
    fn definition(&self) -> &Arc<ExecutionDefinition> {
        &self.definition
    }

    fn dimensions(&self) -> &[DimensionDescriptor] {
        &self.dimensions
    }

    fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    async fn read_all(&self) -> Result<DataView, BackendError> {
        let payload = cancellable(&self.cancel, self.read_pages()).await?;
        Ok(DataView::for_all(self.definition.clone(), &self.fingerprint, payload))
    }

    async fn read_window(&self, offset: &[usize], size: &[usize]) -> Result<DataView, BackendError> {
        let window = ResultWindow::new(offset, size);
        window.check_arity(self.definition.dimensions().len())?;
        debug!(
            target: "REMOTE",
            "read window result={} window={}",
            self.fingerprint,
            window.coordinates()
        );
        let payload = cancellable(&self.cancel, self.backend.fetch_page(&self.result_link, &window)).await?;
        Ok(DataView::for_window(self.definition.clone(), &self.fingerprint, &window, payload))
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
