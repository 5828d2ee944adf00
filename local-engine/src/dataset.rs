//! FILENAME: local-engine/src/dataset.rs
//! In-memory dataset the local engine computes over.
//!
//! The dataset is columnar. Label columns hold attribute element values and
//! are keyed by the display form they belong to; fact columns hold numbers
//! and are keyed by the item simple measures aggregate; date columns are keyed
//! by the date dataset absolute date filters restrict. Keys are the
//! identifier (or uri) of the reference, so typed and untyped references to
//! the same object resolve to the same column.
//!
//! Label values are interned: each unique value is stored once and rows hold
//! `ValueId`s, which keeps group keys small and comparisons cheap.

use std::cmp::Ordering;

use chrono::NaiveDate;
use model::ObjRef;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

// ============================================================================
// VALUE INTERNING
// ============================================================================

/// A reference to an interned value within a label column.
pub type ValueId = u32;

/// A missing label value.
pub const VALUE_ID_EMPTY: ValueId = u32::MAX;

const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// COLUMNS
// ============================================================================

/// Attribute elements of one display form, one interned id per row.
#[derive(Debug, Clone)]
pub struct LabelColumn {
    title: String,
    value_to_id: FxHashMap<String, ValueId>,
    id_to_value: Vec<String>,
    /// Position of each ValueId in ascending value order.
    rank: Vec<u32>,
    rows: Vec<ValueId>,
}

impl LabelColumn {
    fn new(title: String) -> Self {
        LabelColumn {
            title,
            value_to_id: FxHashMap::default(),
            id_to_value: Vec::new(),
            rank: Vec::new(),
            rows: Vec::new(),
        }
    }

    fn intern(&mut self, value: Option<String>) -> ValueId {
        let value = match value {
            Some(v) => v,
            None => return VALUE_ID_EMPTY,
        };
        if let Some(&id) = self.value_to_id.get(&value) {
            return id;
        }
        let id = self.id_to_value.len() as ValueId;
        self.id_to_value.push(value.clone());
        self.value_to_id.insert(value, id);
        id
    }

    fn rebuild_rank(&mut self) {
        let mut sorted: Vec<ValueId> = (0..self.id_to_value.len() as ValueId).collect();
        sorted.sort_by(|&a, &b| self.id_to_value[a as usize].cmp(&self.id_to_value[b as usize]));
        self.rank = vec![0; sorted.len()];
        for (position, id) in sorted.into_iter().enumerate() {
            self.rank[id as usize] = position as u32;
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Element value of an id, `None` for the empty value.
    pub fn value(&self, id: ValueId) -> Option<&str> {
        if id == VALUE_ID_EMPTY {
            return None;
        }
        self.id_to_value.get(id as usize).map(|s| s.as_str())
    }

    pub fn id_of(&self, value: &str) -> Option<ValueId> {
        self.value_to_id.get(value).copied()
    }

    pub fn row(&self, row: usize) -> ValueId {
        self.rows.get(row).copied().unwrap_or(VALUE_ID_EMPTY)
    }

    /// Number of unique values (excluding empty).
    pub fn unique_count(&self) -> usize {
        self.id_to_value.len()
    }

    /// Ascending element order; the empty value sorts first.
    pub fn compare(&self, a: ValueId, b: ValueId) -> Ordering {
        match (a == VALUE_ID_EMPTY, b == VALUE_ID_EMPTY) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.rank[a as usize].cmp(&self.rank[b as usize]),
        }
    }
}

/// Numbers a simple measure aggregates.
#[derive(Debug, Clone)]
pub struct FactColumn {
    title: String,
    rows: Vec<Option<f64>>,
}

impl FactColumn {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn row(&self, row: usize) -> Option<f64> {
        self.rows.get(row).copied().flatten()
    }
}

#[derive(Debug, Clone)]
pub struct DateColumn {
    title: String,
    rows: Vec<Option<NaiveDate>>,
}

impl DateColumn {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn row(&self, row: usize) -> Option<NaiveDate> {
        self.rows.get(row).copied().flatten()
    }
}

// ============================================================================
// DATASET
// ============================================================================

#[derive(Debug, Clone)]
pub struct Dataset {
    row_count: usize,
    labels: FxHashMap<String, LabelColumn>,
    facts: FxHashMap<String, FactColumn>,
    dates: FxHashMap<String, DateColumn>,
}

impl Dataset {
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    /// Loads a dataset from its JSON form, see [`DatasetSource`].
    pub fn from_json(json: &str) -> Result<Self, DatasetError> {
        let source: DatasetSource = serde_json::from_str(json)?;
        source.into_dataset()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn label(&self, display_form: &ObjRef) -> Option<&LabelColumn> {
        self.labels.get(display_form.id_or_uri())
    }

    pub fn fact(&self, item: &ObjRef) -> Option<&FactColumn> {
        self.facts.get(item.id_or_uri())
    }

    pub fn date(&self, data_set: &ObjRef) -> Option<&DateColumn> {
        self.dates.get(data_set.id_or_uri())
    }
}

// ============================================================================
// BUILDER
// ============================================================================

enum ColumnData {
    Label(Vec<Option<String>>),
    Fact(Vec<Option<f64>>),
    Date(Vec<Option<NaiveDate>>),
}

struct PendingColumn {
    key: String,
    title: String,
    data: ColumnData,
}

impl PendingColumn {
    fn len(&self) -> usize {
        match &self.data {
            ColumnData::Label(v) => v.len(),
            ColumnData::Fact(v) => v.len(),
            ColumnData::Date(v) => v.len(),
        }
    }
}

/// Collects columns; `build()` checks that all of them have the same length.
#[derive(Default)]
pub struct DatasetBuilder {
    columns: Vec<PendingColumn>,
}

impl DatasetBuilder {
    pub fn label<I, S>(mut self, display_form: ObjRef, title: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.columns.push(PendingColumn {
            key: display_form.id_or_uri().to_string(),
            title: title.into(),
            data: ColumnData::Label(values.into_iter().map(|v| v.map(Into::into)).collect()),
        });
        self
    }

    pub fn fact<I>(mut self, item: ObjRef, title: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        self.columns.push(PendingColumn {
            key: item.id_or_uri().to_string(),
            title: title.into(),
            data: ColumnData::Fact(values.into_iter().collect()),
        });
        self
    }

    pub fn date<I>(mut self, data_set: ObjRef, title: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<NaiveDate>>,
    {
        self.columns.push(PendingColumn {
            key: data_set.id_or_uri().to_string(),
            title: title.into(),
            data: ColumnData::Date(values.into_iter().collect()),
        });
        self
    }

    pub fn build(self) -> Result<Dataset, DatasetError> {
        let row_count = self.columns.first().map(|c| c.len()).unwrap_or(0);
        let mut dataset = Dataset {
            row_count,
            labels: FxHashMap::default(),
            facts: FxHashMap::default(),
            dates: FxHashMap::default(),
        };

        for column in self.columns {
            let actual = column.len();
            if actual != row_count {
                return Err(DatasetError::ColumnLength {
                    column: column.key,
                    expected: row_count,
                    actual,
                });
            }
            let duplicate = match column.data {
                ColumnData::Label(values) => {
                    let mut label = LabelColumn::new(column.title);
                    let rows: Vec<ValueId> = values.into_iter().map(|v| label.intern(v)).collect();
                    label.rows = rows;
                    label.rebuild_rank();
                    dataset.labels.insert(column.key.clone(), label).is_some()
                }
                ColumnData::Fact(rows) => dataset
                    .facts
                    .insert(column.key.clone(), FactColumn { title: column.title, rows })
                    .is_some(),
                ColumnData::Date(rows) => dataset
                    .dates
                    .insert(column.key.clone(), DateColumn { title: column.title, rows })
                    .is_some(),
            };
            if duplicate {
                return Err(DatasetError::DuplicateColumn(column.key));
            }
        }
        Ok(dataset)
    }
}

// ============================================================================
// JSON SOURCE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSource<T> {
    #[serde(rename = "ref")]
    pub obj_ref: ObjRef,
    #[serde(default)]
    pub title: Option<String>,
    pub values: Vec<Option<T>>,
}

impl<T> ColumnSource<T> {
    fn title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| self.obj_ref.id_or_uri().to_string())
    }
}

/// Serialized dataset: dates are `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSource {
    pub labels: Vec<ColumnSource<String>>,
    pub facts: Vec<ColumnSource<f64>>,
    pub dates: Vec<ColumnSource<String>>,
}

impl DatasetSource {
    pub fn into_dataset(self) -> Result<Dataset, DatasetError> {
        let mut builder = Dataset::builder();
        for column in self.labels {
            let title = column.title();
            builder = builder.label(column.obj_ref, title, column.values);
        }
        for column in self.facts {
            let title = column.title();
            builder = builder.fact(column.obj_ref, title, column.values);
        }
        for column in self.dates {
            let title = column.title();
            let mut parsed = Vec::with_capacity(column.values.len());
            for value in &column.values {
                parsed.push(match value {
                    Some(text) => Some(parse_date(text)?),
                    None => None,
                });
            }
            builder = builder.date(column.obj_ref, title, parsed);
        }
        builder.build()
    }
}

pub(crate) fn parse_date(text: &str) -> Result<NaiveDate, DatasetError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|_| DatasetError::InvalidDate(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_interning() {
        let dataset = Dataset::builder()
            .label(ObjRef::identifier("df.region"), "Region", [Some("West"), Some("East"), None, Some("West")])
            .build()
            .unwrap();

        let column = dataset.label(&ObjRef::identifier("df.region")).unwrap();
        assert_eq!(column.unique_count(), 2);
        assert_eq!(column.row(0), column.row(3));
        assert_eq!(column.row(2), VALUE_ID_EMPTY);
        assert_eq!(column.value(column.row(1)), Some("East"));
        assert_eq!(column.value(VALUE_ID_EMPTY), None);
    }

    #[test]
    fn test_label_order_ignores_insertion() {
        let dataset = Dataset::builder()
            .label(ObjRef::identifier("df"), "Region", [Some("West"), Some("East")])
            .build()
            .unwrap();
        let column = dataset.label(&ObjRef::identifier("df")).unwrap();
        let west = column.id_of("West").unwrap();
        let east = column.id_of("East").unwrap();

        assert_eq!(column.compare(east, west), Ordering::Less);
        assert_eq!(column.compare(VALUE_ID_EMPTY, east), Ordering::Less);
    }

    #[test]
    fn test_typed_ref_finds_untyped_column() {
        let dataset = Dataset::builder()
            .fact(ObjRef::identifier("fact.amount"), "Amount", [Some(1.0)])
            .build()
            .unwrap();
        assert!(dataset
            .fact(&ObjRef::typed("fact.amount", model::ObjectType::Fact))
            .is_some());
    }

    #[test]
    fn test_column_length_mismatch() {
        let result = Dataset::builder()
            .label(ObjRef::identifier("df"), "Region", [Some("West"), Some("East")])
            .fact(ObjRef::identifier("m"), "Amount", [Some(1.0)])
            .build();
        assert!(matches!(result, Err(DatasetError::ColumnLength { expected: 2, actual: 1, .. })));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "labels": [{"ref": {"identifier": "df.region"}, "title": "Region", "values": ["West", null]}],
            "facts": [{"ref": {"identifier": "fact.amount"}, "values": [1.5, 2]}],
            "dates": [{"ref": {"identifier": "date"}, "values": ["2024-01-31", null]}]
        }"#;
        let dataset = Dataset::from_json(json).unwrap();

        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.fact(&ObjRef::identifier("fact.amount")).unwrap().title(), "fact.amount");
        assert_eq!(
            dataset.date(&ObjRef::identifier("date")).unwrap().row(0),
            NaiveDate::from_ymd_opt(2024, 1, 31)
        );
    }

    #[test]
    fn test_invalid_date_rejected() {
        let json = r#"{"dates": [{"ref": {"identifier": "date"}, "values": ["31/01/2024"]}]}"#;
        assert!(matches!(Dataset::from_json(json), Err(DatasetError::InvalidDate(_))));
    }
}
