//! FILENAME: model/src/insight.rs
//! Saved visualization definition, used as an input to the definition assembler.

use serde::{Deserialize, Serialize};
use crate::bucket::{buckets_attributes, buckets_measures, buckets_totals, Bucket};
use crate::attribute::Attribute;
use crate::dimension::Total;
use crate::filter::Filter;
use crate::measure::Measure;
use crate::sort::SortItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightDefinition {
    pub title: String,
    pub visualization_url: String,
    #[serde(default)]
    pub buckets: Vec<Bucket>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub sorts: Vec<SortItem>,
}

impl InsightDefinition {
    pub fn new(title: impl Into<String>, visualization_url: impl Into<String>) -> Self {
        InsightDefinition {
            title: title.into(),
            visualization_url: visualization_url.into(),
            buckets: Vec::new(),
            filters: Vec::new(),
            sorts: Vec::new(),
        }
    }

    pub fn with_buckets(mut self, buckets: Vec<Bucket>) -> Self {
        self.buckets = buckets;
        self
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_sorts(mut self, sorts: Vec<SortItem>) -> Self {
        self.sorts = sorts;
        self
    }

    pub fn attributes(&self) -> Vec<Attribute> {
        buckets_attributes(&self.buckets)
    }

    pub fn measures(&self) -> Vec<Measure> {
        buckets_measures(&self.buckets)
    }

    pub fn totals(&self) -> Vec<Total> {
        buckets_totals(&self.buckets)
    }
}
