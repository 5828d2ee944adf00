//! FILENAME: afm/src/lib.rs
//! Backend translators.
//!
//! Each dialect module holds the wire types of one backend and a compiler
//! from [`model::ExecutionDefinition`]. Compilers are total over the model:
//! every variant is matched, and what a dialect cannot express is reported
//! as `NotSupported`. Compiling the same definition twice yields identical
//! payloads; the fingerprint engine never looks at them.

pub mod bear;
mod error;
pub mod tiger;

pub use error::AfmError;

use log::debug;
use model::ExecutionDefinition;
use serde::{Deserialize, Serialize};

/// Wire dialect of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AfmDialect {
    Bear,
    Tiger,
}

impl Default for AfmDialect {
    fn default() -> Self {
        AfmDialect::Bear
    }
}

impl AfmDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            AfmDialect::Bear => "bear",
            AfmDialect::Tiger => "tiger",
        }
    }

    /// Compiles a definition into this dialect's JSON payload.
    pub fn compile(&self, definition: &ExecutionDefinition) -> Result<serde_json::Value, AfmError> {
        let payload = match self {
            AfmDialect::Bear => serde_json::to_value(bear::to_afm_execution(definition))?,
            AfmDialect::Tiger => serde_json::to_value(tiger::to_afm_execution(definition)?)?,
        };
        debug!(
            target: "AFM",
            "compiled dialect={} attributes={} measures={} filters={}",
            self.as_str(),
            definition.attributes().len(),
            definition.measures().len(),
            definition.effective_filters().count()
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{Attribute, Measure, MeasureAggregation, ObjRef};

    #[test]
    fn test_compile_is_deterministic() {
        let def = ExecutionDefinition::new(
            "ws",
            vec![Attribute::new(ObjRef::identifier("df1"))],
            vec![Measure::simple(ObjRef::identifier("m1"))
                .aggregation(MeasureAggregation::Avg)
                .build()],
            vec![],
        )
        .unwrap();

        for dialect in [AfmDialect::Bear, AfmDialect::Tiger] {
            let first = dialect.compile(&def).unwrap();
            let second = dialect.compile(&def).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_dialect_from_json() {
        let dialect: AfmDialect = serde_json::from_str("\"tiger\"").unwrap();
        assert_eq!(dialect, AfmDialect::Tiger);
    }
}
