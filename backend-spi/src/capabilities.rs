//! FILENAME: backend-spi/src/capabilities.rs

use serde::{Deserialize, Serialize};

/// What a backend can do beyond the basic execute/read contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendCapabilities {
    /// Transformed executions may be answered from an existing result.
    pub can_transform_existing_result: bool,

    /// Totals (sum, avg, ...) are computed by the backend.
    pub can_calculate_totals: bool,

    /// Native roll-up totals are computed by the backend.
    pub can_calculate_native_totals: bool,

    pub supports_measure_value_filters: bool,

    /// Reads of arbitrary windows are computed on demand.
    pub supports_arbitrary_windows: bool,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            can_transform_existing_result: false,
            can_calculate_totals: true,
            can_calculate_native_totals: true,
            supports_measure_value_filters: true,
            supports_arbitrary_windows: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let caps: BackendCapabilities =
            serde_json::from_str(r#"{"canTransformExistingResult": true}"#).unwrap();
        assert!(caps.can_transform_existing_result);
        assert!(caps.can_calculate_totals);
    }
}
