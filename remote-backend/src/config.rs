//! FILENAME: remote-backend/src/config.rs

use std::collections::BTreeMap;
use std::time::Duration;

use afm::AfmDialect;
use serde::{Deserialize, Serialize};

/// Connection and paging settings of a remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteBackendConfig {
    /// Scheme, host and port, without a trailing slash.
    pub base_url: String,
    pub dialect: AfmDialect,
    pub timeout_secs: u64,
    /// Delay between polls while a result is still being computed.
    pub poll_interval_ms: u64,
    pub max_polls: u32,
    /// Largest window requested per dimension when reading all data.
    pub page_limit: usize,
    /// Extra headers sent with every request, e.g. authentication.
    pub headers: BTreeMap<String, String>,
}

impl Default for RemoteBackendConfig {
    fn default() -> Self {
        RemoteBackendConfig {
            base_url: "http://localhost:3000".to_string(),
            dialect: AfmDialect::Bear,
            timeout_secs: 60,
            poll_interval_ms: 500,
            max_polls: 120,
            page_limit: 1000,
            headers: BTreeMap::new(),
        }
    }
}

impl RemoteBackendConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Page size actually used; a zero limit would never make progress.
    pub fn effective_page_limit(&self) -> usize {
        self.page_limit.max(1)
    }
}
