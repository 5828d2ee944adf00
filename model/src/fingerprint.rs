//! FILENAME: model/src/fingerprint.rs
//! Fingerprint engine.
//!
//! Every model value writes itself into a canonical byte stream: each field is
//! preceded by a one-byte marker and a length, each variant by its kind tag,
//! each list by its element count. The stream is hashed with BLAKE3 and the
//! digest rendered as lowercase hex. The stream never depends on any wire
//! format, so changing a backend payload never changes a fingerprint.
//!
//! Attribute filters with no elements do not restrict anything and are left
//! out of the stream.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;
use crate::dimension::{Dimension, Total};
use crate::filter::{
    AttributeElements, Filter, MeasureFilter, MeasureValueCondition, MeasureValueFilter,
};
use crate::measure::{Measure, MeasureDefinition};
use crate::objref::{ObjRef, ObjRefInScope};
use crate::sort::{LocatorItem, SortItem};

// ============================================================================
// FINGERPRINT
// ============================================================================

/// Stable identity of a definition, or of something derived from one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives a new identity by appending a path segment, e.g. `<fp>/dataView/0_10`.
    pub fn join(&self, segment: &str) -> Fingerprint {
        Fingerprint(format!("{}/{}", self.0, segment))
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Fingerprint(value)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Fingerprint(value.to_string())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// CANONICAL STREAM
// ============================================================================

const MARK_TAG: u8 = b'T';
const MARK_STR: u8 = b'S';
const MARK_NONE: u8 = b'N';
const MARK_INT: u8 = b'I';
const MARK_FLOAT: u8 = b'F';
const MARK_BOOL: u8 = b'B';
const MARK_SEQ: u8 = b'L';

/// Writes canonical tokens into a BLAKE3 hasher.
pub struct FingerprintBuilder {
    hasher: blake3::Hasher,
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        FingerprintBuilder {
            hasher: blake3::Hasher::new(),
        }
    }

    fn bytes(&mut self, marker: u8, bytes: &[u8]) -> &mut Self {
        self.hasher.update(&[marker]);
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
        self
    }

    /// Kind tag of the value that follows.
    pub fn tag(&mut self, kind: &str) -> &mut Self {
        self.bytes(MARK_TAG, kind.as_bytes())
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.bytes(MARK_STR, value.as_bytes())
    }

    pub fn opt_str(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => self.str(v),
            None => self.none(),
        }
    }

    pub fn none(&mut self) -> &mut Self {
        self.bytes(MARK_NONE, &[])
    }

    pub fn int(&mut self, value: i64) -> &mut Self {
        self.bytes(MARK_INT, &value.to_le_bytes())
    }

    /// Floats hash by bit pattern; all NaNs are one value and -0.0 equals 0.0.
    pub fn float(&mut self, value: f64) -> &mut Self {
        let bits = if value.is_nan() {
            u64::MAX
        } else if value == 0.0 {
            0.0f64.to_bits()
        } else {
            value.to_bits()
        };
        self.bytes(MARK_FLOAT, &bits.to_le_bytes())
    }

    pub fn opt_float(&mut self, value: Option<f64>) -> &mut Self {
        match value {
            Some(v) => self.float(v),
            None => self.none(),
        }
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.bytes(MARK_BOOL, &[value as u8])
    }

    pub fn seq_len(&mut self, len: usize) -> &mut Self {
        self.bytes(MARK_SEQ, &(len as u64).to_le_bytes())
    }

    pub(crate) fn seq<'a, T, I>(&mut self, items: I) -> &mut Self
    where
        T: Canonical + 'a,
        I: IntoIterator<Item = &'a T>,
        I::IntoIter: ExactSizeIterator,
    {
        let items = items.into_iter();
        self.seq_len(items.len());
        for item in items {
            item.write_canonical(self);
        }
        self
    }

    pub(crate) fn value<T: Canonical + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.write_canonical(self);
        self
    }

    pub fn finish(&self) -> Fingerprint {
        Fingerprint(self.hasher.finalize().to_hex().to_string())
    }
}

/// Canonical form of a model value.
pub(crate) trait Canonical {
    fn write_canonical(&self, fp: &mut FingerprintBuilder);
}

impl Canonical for String {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        fp.str(self);
    }
}

impl Canonical for ObjRef {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        match self {
            ObjRef::Uri { uri } => {
                fp.tag("uri").str(uri);
            }
            ObjRef::Identifier { identifier, obj_type } => {
                fp.tag("identifier")
                    .str(identifier)
                    .opt_str(obj_type.map(|t| t.as_str()));
            }
        }
    }
}

impl Canonical for ObjRefInScope {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        match self {
            ObjRefInScope::LocalId { local_identifier } => {
                fp.tag("localId").str(local_identifier);
            }
            ObjRefInScope::Ref(r) => {
                fp.value(r);
            }
        }
    }
}

impl Canonical for Attribute {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        fp.tag("attribute")
            .str(&self.local_identifier)
            .value(&self.display_form)
            .opt_str(self.alias.as_deref());
    }
}

impl Canonical for Measure {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        fp.tag("measure")
            .str(&self.local_identifier)
            .opt_str(self.alias.as_deref())
            .opt_str(self.format.as_deref())
            .opt_str(self.title.as_deref())
            .value(&self.definition);
    }
}

impl Canonical for MeasureDefinition {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        match self {
            MeasureDefinition::Simple(s) => {
                let filters: Vec<&MeasureFilter> = s.filters.iter().filter(|f| !f.is_empty()).collect();
                fp.tag("simple")
                    .value(&s.item)
                    .opt_str(s.aggregation.map(|a| a.as_str()))
                    .bool(s.compute_ratio)
                    .seq_len(filters.len());
                for f in filters {
                    fp.value(f);
                }
            }
            MeasureDefinition::Arithmetic(a) => {
                fp.tag("arithmetic")
                    .str(a.operator.as_str())
                    .seq(&a.measure_identifiers);
            }
            MeasureDefinition::PoP(p) => {
                fp.tag("pop").str(&p.measure_identifier).value(&p.pop_attribute);
            }
            MeasureDefinition::PreviousPeriod(p) => {
                fp.tag("previousPeriod")
                    .str(&p.measure_identifier)
                    .seq_len(p.date_data_sets.len());
                for ds in &p.date_data_sets {
                    fp.value(&ds.data_set).int(ds.periods_ago as i64);
                }
            }
        }
    }
}

impl Canonical for AttributeElements {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        match self {
            AttributeElements::ByUri { uris } => fp.tag("uris").seq(uris),
            AttributeElements::ByValue { values } => fp.tag("values").seq(values),
        };
    }
}

impl Canonical for MeasureFilter {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        // Measure filters share the canonical form of their execution-level twin.
        Filter::from(self.clone()).write_canonical(fp);
    }
}

impl Canonical for Filter {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        fp.tag(self.kind_name());
        match self {
            Filter::PositiveAttribute(f) => {
                fp.value(&f.display_form).value(&f.in_elements);
            }
            Filter::NegativeAttribute(f) => {
                fp.value(&f.display_form).value(&f.not_in);
            }
            Filter::AbsoluteDate(f) => {
                fp.value(&f.data_set).str(&f.from).str(&f.to);
            }
            Filter::RelativeDate(f) => {
                fp.value(&f.data_set)
                    .str(f.granularity.as_str())
                    .int(f.from as i64)
                    .int(f.to as i64);
            }
            Filter::MeasureValue(f) => {
                fp.value(f);
            }
        }
    }
}

impl Canonical for MeasureValueFilter {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        fp.value(&self.measure);
        match &self.condition {
            None => {
                fp.none();
            }
            Some(MeasureValueCondition::Comparison(c)) => {
                fp.tag("comparison")
                    .str(c.operator.as_str())
                    .float(c.value)
                    .opt_float(c.treat_null_values_as);
            }
            Some(MeasureValueCondition::Range(r)) => {
                fp.tag("range")
                    .str(r.operator.as_str())
                    .float(r.from)
                    .float(r.to)
                    .opt_float(r.treat_null_values_as);
            }
        }
    }
}

impl Canonical for SortItem {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        match self {
            SortItem::Attribute(a) => {
                fp.tag("attributeSort")
                    .str(a.direction.as_str())
                    .str(&a.attribute_identifier)
                    .bool(a.aggregation.is_some());
            }
            SortItem::Measure(m) => {
                fp.tag("measureSort").str(m.direction.as_str()).seq(&m.locators);
            }
        }
    }
}

impl Canonical for LocatorItem {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        match self {
            LocatorItem::Attribute(l) => {
                fp.tag("attributeLocator").str(&l.attribute_identifier).str(&l.element);
            }
            LocatorItem::Measure(l) => {
                fp.tag("measureLocator").str(&l.measure_identifier);
            }
        }
    }
}

impl Canonical for Total {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        fp.tag("total")
            .str(self.total_type.as_str())
            .str(&self.measure_identifier)
            .str(&self.attribute_identifier);
    }
}

impl Canonical for Dimension {
    fn write_canonical(&self, fp: &mut FingerprintBuilder) {
        fp.tag("dimension").seq(&self.item_identifiers).seq(&self.totals);
    }
}

/// Writes the filters that actually restrict data.
pub(crate) fn write_effective_filters(fp: &mut FingerprintBuilder, filters: &[Filter]) {
    let effective: Vec<&Filter> = filters.iter().filter(|f| !f.is_empty()).collect();
    fp.seq_len(effective.len());
    for f in effective {
        fp.value(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_rendering() {
        let mut fp = FingerprintBuilder::new();
        fp.str("x");
        let out = fp.finish();
        assert_eq!(out.as_str().len(), 64);
        assert!(out.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_length_prefix_prevents_concatenation_collisions() {
        let mut a = FingerprintBuilder::new();
        a.str("ab").str("c");
        let mut b = FingerprintBuilder::new();
        b.str("a").str("bc");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_float_normalization() {
        let mut a = FingerprintBuilder::new();
        a.float(0.0);
        let mut b = FingerprintBuilder::new();
        b.float(-0.0);
        assert_eq!(a.finish(), b.finish());

        let mut c = FingerprintBuilder::new();
        c.float(10.0);
        let mut d = FingerprintBuilder::new();
        d.float(10.5);
        assert_ne!(c.finish(), d.finish());
    }

    #[test]
    fn test_join() {
        let fp = Fingerprint::from("abc");
        assert_eq!(fp.join("recordedResult").as_str(), "abc/recordedResult");
    }
}
