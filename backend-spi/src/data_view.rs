//! FILENAME: backend-spi/src/data_view.rs
//! Windowed data views.
//!
//! A DataView is one slice of result data, created per read call. Its
//! fingerprint is the result fingerprint combined with the window coordinates,
//! so two reads of different windows never share an identity.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use model::{ExecutionDefinition, Fingerprint, ModelError};

use crate::results::{DataMatrix, DataValue, ResultHeader};

// ============================================================================
// WINDOW
// ============================================================================

/// Rectangular region of a result: one zero-based offset and one size per dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultWindow {
    pub offset: Vec<usize>,
    pub size: Vec<usize>,
}

impl ResultWindow {
    pub fn new(offset: &[usize], size: &[usize]) -> Self {
        ResultWindow {
            offset: offset.to_vec(),
            size: size.to_vec(),
        }
    }

    /// The window must address every dimension of the result exactly once.
    pub fn check_arity(&self, dimension_count: usize) -> Result<(), ModelError> {
        if self.offset.len() != dimension_count || self.size.len() != dimension_count {
            return Err(ModelError::Invalid(format!(
                "window offset/size arity ({}/{}) does not match dimension count {}",
                self.offset.len(),
                self.size.len(),
                dimension_count
            )));
        }
        Ok(())
    }

    /// Window coordinates rendered as `<offsets>_<sizes>`, comma separated.
    pub fn coordinates(&self) -> String {
        format!("{}_{}", join(&self.offset, ","), join(&self.size, ","))
    }

    /// Clipped range `[start, end)` of dimension `dim` given its total length.
    pub fn range(&self, dim: usize, total: usize) -> std::ops::Range<usize> {
        let start = self.offset.get(dim).copied().unwrap_or(0).min(total);
        let size = self.size.get(dim).copied().unwrap_or(total);
        start..start.saturating_add(size).min(total)
    }
}

pub(crate) fn join(values: &[usize], sep: &str) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(sep)
}

// ============================================================================
// PAYLOAD
// ============================================================================

/// Data of one view as backends send it and recordings store it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataViewPayload {
    pub data: DataMatrix,
    /// `[dimension][header][item]`
    #[serde(default)]
    pub header_items: Vec<Vec<Vec<ResultHeader>>>,
    /// `[dimension][total][value]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<Vec<Vec<Vec<DataValue>>>>,
    pub count: Vec<usize>,
    pub offset: Vec<usize>,
    pub total_count: Vec<usize>,
}

// ============================================================================
// DATA VIEW
// ============================================================================

#[derive(Debug, Clone)]
pub struct DataView {
    definition: Arc<ExecutionDefinition>,
    result_fingerprint: Fingerprint,
    fingerprint: Fingerprint,
    payload: DataViewPayload,
}

impl DataView {
    /// View answering a window read; identity follows the requested window.
    pub fn for_window(
        definition: Arc<ExecutionDefinition>,
        result_fingerprint: &Fingerprint,
        window: &ResultWindow,
        payload: DataViewPayload,
    ) -> Self {
        let fingerprint = result_fingerprint.join(&format!("dataView/{}", window.coordinates()));
        DataView {
            definition,
            result_fingerprint: result_fingerprint.clone(),
            fingerprint,
            payload,
        }
    }

    /// View answering a read of all data; identity follows the returned coordinates.
    pub fn for_all(
        definition: Arc<ExecutionDefinition>,
        result_fingerprint: &Fingerprint,
        payload: DataViewPayload,
    ) -> Self {
        let window = ResultWindow::new(&payload.offset, &payload.count);
        Self::for_window(definition, result_fingerprint, &window, payload)
    }

    pub fn definition(&self) -> &Arc<ExecutionDefinition> {
        &self.definition
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn result_fingerprint(&self) -> &Fingerprint {
        &self.result_fingerprint
    }

    pub fn offset(&self) -> &[usize] {
        &self.payload.offset
    }

    pub fn count(&self) -> &[usize] {
        &self.payload.count
    }

    pub fn total_count(&self) -> &[usize] {
        &self.payload.total_count
    }

    pub fn header_items(&self) -> &[Vec<Vec<ResultHeader>>] {
        &self.payload.header_items
    }

    pub fn data(&self) -> &DataMatrix {
        &self.payload.data
    }

    pub fn totals(&self) -> Option<&[Vec<Vec<DataValue>>]> {
        self.payload.totals.as_deref()
    }

    pub fn payload(&self) -> &DataViewPayload {
        &self.payload
    }

    pub fn into_payload(self) -> DataViewPayload {
        self.payload
    }

    pub fn equals(&self, other: &DataView) -> bool {
        self.fingerprint == other.fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> Arc<ExecutionDefinition> {
        Arc::new(ExecutionDefinition::new("ws", vec![], vec![], vec![]).unwrap())
    }

    #[test]
    fn test_window_arity() {
        let window = ResultWindow::new(&[0, 0], &[10]);
        assert!(window.check_arity(2).is_err());
        assert!(ResultWindow::new(&[0, 0], &[10, 10]).check_arity(2).is_ok());
    }

    #[test]
    fn test_window_range_clips() {
        let window = ResultWindow::new(&[8, 0], &[5, 100]);
        assert_eq!(window.range(0, 10), 8..10);
        assert_eq!(window.range(1, 3), 0..3);
        assert_eq!(ResultWindow::new(&[20], &[5]).range(0, 10), 10..10);
    }

    #[test]
    fn test_fingerprint_follows_window() {
        let result_fp = Fingerprint::from("abc/recordedResult");
        let v1 = DataView::for_window(definition(), &result_fp, &ResultWindow::new(&[0, 0], &[2, 2]), DataViewPayload::default());
        let v2 = DataView::for_window(definition(), &result_fp, &ResultWindow::new(&[2, 0], &[2, 2]), DataViewPayload::default());

        assert_eq!(v1.fingerprint().as_str(), "abc/recordedResult/dataView/0,0_2,2");
        assert_ne!(v1.fingerprint(), v2.fingerprint());
        assert!(!v1.equals(&v2));
    }

    #[test]
    fn test_payload_json_shape() {
        let json = r#"{
            "data": [["1", "2"]],
            "headerItems": [[[{"attributeHeaderItem": {"uri": "/e/1", "name": "East"}}]], [[{"measureHeaderItem": {"name": "Sales", "order": 0}}, {"measureHeaderItem": {"name": "Cost", "order": 1}}]]],
            "count": [1, 2],
            "offset": [0, 0],
            "totalCount": [1, 2]
        }"#;
        let payload: DataViewPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.total_count, vec![1, 2]);
        assert!(payload.totals.is_none());

        let view = DataView::for_all(definition(), &Fingerprint::from("r"), payload);
        assert_eq!(view.fingerprint().as_str(), "r/dataView/0,0_1,2");
        assert_eq!(view.header_items()[1][0].len(), 2);
    }
}
