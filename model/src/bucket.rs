//! FILENAME: model/src/bucket.rs
//! Buckets - named, ordered groups of attributes and measures used when authoring.

use serde::{Deserialize, Serialize};
use crate::attribute::Attribute;
use crate::dimension::Total;
use crate::measure::Measure;
use crate::objref::Identifier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeOrMeasure {
    Attribute(Attribute),
    Measure(Measure),
}

impl AttributeOrMeasure {
    pub fn local_id(&self) -> &str {
        match self {
            AttributeOrMeasure::Attribute(a) => a.local_id(),
            AttributeOrMeasure::Measure(m) => m.local_id(),
        }
    }
}

impl From<Attribute> for AttributeOrMeasure {
    fn from(value: Attribute) -> Self {
        AttributeOrMeasure::Attribute(value)
    }
}

impl From<Measure> for AttributeOrMeasure {
    fn from(value: Measure) -> Self {
        AttributeOrMeasure::Measure(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub local_identifier: Identifier,
    pub items: Vec<AttributeOrMeasure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub totals: Vec<Total>,
}

impl Bucket {
    pub fn new(local_id: impl Into<String>, items: Vec<AttributeOrMeasure>) -> Self {
        Bucket {
            local_identifier: local_id.into(),
            items,
            totals: Vec::new(),
        }
    }

    pub fn with_totals(mut self, totals: Vec<Total>) -> Self {
        self.totals = totals;
        self
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.items.iter().filter_map(|i| match i {
            AttributeOrMeasure::Attribute(a) => Some(a),
            AttributeOrMeasure::Measure(_) => None,
        })
    }

    pub fn measures(&self) -> impl Iterator<Item = &Measure> {
        self.items.iter().filter_map(|i| match i {
            AttributeOrMeasure::Measure(m) => Some(m),
            AttributeOrMeasure::Attribute(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// BUCKET LIST HELPERS
// ============================================================================

/// All attributes across buckets, in natural order.
pub fn buckets_attributes(buckets: &[Bucket]) -> Vec<Attribute> {
    buckets.iter().flat_map(|b| b.attributes().cloned()).collect()
}

/// All measures across buckets, in natural order.
pub fn buckets_measures(buckets: &[Bucket]) -> Vec<Measure> {
    buckets.iter().flat_map(|b| b.measures().cloned()).collect()
}

pub fn buckets_totals(buckets: &[Bucket]) -> Vec<Total> {
    buckets.iter().flat_map(|b| b.totals.iter().cloned()).collect()
}

pub fn buckets_find_attribute<'a>(buckets: &'a [Bucket], local_id: &str) -> Option<&'a Attribute> {
    buckets
        .iter()
        .flat_map(|b| b.attributes())
        .find(|a| a.local_identifier == local_id)
}

pub fn buckets_find_measure<'a>(buckets: &'a [Bucket], local_id: &str) -> Option<&'a Measure> {
    buckets
        .iter()
        .flat_map(|b| b.measures())
        .find(|m| m.local_identifier == local_id)
}

pub fn buckets_is_empty(buckets: &[Bucket]) -> bool {
    buckets.iter().all(|b| b.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objref::ObjRef;

    fn attr(id: &str) -> AttributeOrMeasure {
        Attribute::new(ObjRef::identifier(id)).with_local_id(id).into()
    }

    fn measure(id: &str) -> AttributeOrMeasure {
        Measure::simple(ObjRef::identifier(id)).local_id(id).build().into()
    }

    #[test]
    fn test_natural_order_across_buckets() {
        let buckets = vec![
            Bucket::new("b1", vec![attr("A1"), attr("A2"), measure("M1")]),
            Bucket::new("b2", vec![attr("A3"), measure("M2"), measure("M3")]),
        ];

        let attrs: Vec<String> = buckets_attributes(&buckets).into_iter().map(|a| a.local_identifier).collect();
        let measures: Vec<String> = buckets_measures(&buckets).into_iter().map(|m| m.local_identifier).collect();

        assert_eq!(attrs, vec!["A1", "A2", "A3"]);
        assert_eq!(measures, vec!["M1", "M2", "M3"]);
        assert!(buckets_find_measure(&buckets, "M2").is_some());
        assert!(buckets_find_attribute(&buckets, "M2").is_none());
    }

    #[test]
    fn test_empty_buckets() {
        let buckets = vec![Bucket::new("b1", vec![]), Bucket::new("b2", vec![])];
        assert!(buckets_is_empty(&buckets));
        assert!(!buckets_is_empty(&[Bucket::new("b", vec![attr("A1")])]));
    }
}
