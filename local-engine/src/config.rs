//! FILENAME: local-engine/src/config.rs

use serde::{Deserialize, Serialize};

/// Limits and presentation defaults of the local engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocalEngineConfig {
    /// Executions producing more attribute tuples than this fail.
    pub max_cube_rows: usize,
    /// Format reported for measures that do not carry their own.
    pub default_measure_format: String,
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        LocalEngineConfig {
            max_cube_rows: 1_000_000,
            default_measure_format: "#,##0.00".to_string(),
        }
    }
}

impl LocalEngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = LocalEngineConfig::from_json(r#"{"maxCubeRows": 10}"#).unwrap();
        assert_eq!(config.max_cube_rows, 10);
        assert_eq!(config.default_measure_format, "#,##0.00");
    }
}
