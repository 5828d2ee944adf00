//! FILENAME: model/src/filter.rs
//! Execution filters.
//!
//! Attribute filters select elements of a display form (by value or by URI),
//! date filters restrict a date dataset, measure value filters restrict rows
//! by the computed value of a measure.

use serde::{Deserialize, Serialize};
use crate::error::ModelError;
use crate::objref::{ObjRef, ObjRefInScope};

// ============================================================================
// ATTRIBUTE FILTERS
// ============================================================================

/// Set of attribute elements, given either by their URIs or by their values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeElements {
    ByUri { uris: Vec<String> },
    ByValue { values: Vec<String> },
}

impl AttributeElements {
    pub fn len(&self) -> usize {
        match self {
            AttributeElements::ByUri { uris } => uris.len(),
            AttributeElements::ByValue { values } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn items(&self) -> &[String] {
        match self {
            AttributeElements::ByUri { uris } => uris,
            AttributeElements::ByValue { values } => values,
        }
    }

    pub fn is_by_uri(&self) -> bool {
        matches!(self, AttributeElements::ByUri { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositiveAttributeFilter {
    pub display_form: ObjRef,
    #[serde(rename = "in")]
    pub in_elements: AttributeElements,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegativeAttributeFilter {
    pub display_form: ObjRef,
    pub not_in: AttributeElements,
}

// ============================================================================
// DATE FILTERS
// ============================================================================

/// Granularity of a relative date filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateGranularity {
    #[serde(rename = "GDC.time.date")]
    Date,
    #[serde(rename = "GDC.time.week_us")]
    Week,
    #[serde(rename = "GDC.time.month")]
    Month,
    #[serde(rename = "GDC.time.quarter")]
    Quarter,
    #[serde(rename = "GDC.time.year")]
    Year,
}

impl DateGranularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateGranularity::Date => "GDC.time.date",
            DateGranularity::Week => "GDC.time.week_us",
            DateGranularity::Month => "GDC.time.month",
            DateGranularity::Quarter => "GDC.time.quarter",
            DateGranularity::Year => "GDC.time.year",
        }
    }
}

/// Date range with inclusive calendar-date bounds (`YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsoluteDateFilter {
    pub data_set: ObjRef,
    pub from: String,
    pub to: String,
}

/// Date range relative to today, in units of `granularity`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelativeDateFilter {
    pub data_set: ObjRef,
    pub granularity: DateGranularity,
    pub from: i32,
    pub to: i32,
}

// ============================================================================
// MEASURE VALUE FILTERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonOperator {
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    EqualTo,
    NotEqualTo,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::GreaterThan => "GREATER_THAN",
            ComparisonOperator::GreaterThanOrEqualTo => "GREATER_THAN_OR_EQUAL_TO",
            ComparisonOperator::LessThan => "LESS_THAN",
            ComparisonOperator::LessThanOrEqualTo => "LESS_THAN_OR_EQUAL_TO",
            ComparisonOperator::EqualTo => "EQUAL_TO",
            ComparisonOperator::NotEqualTo => "NOT_EQUAL_TO",
        }
    }

    pub fn matches(&self, value: f64, bound: f64) -> bool {
        match self {
            ComparisonOperator::GreaterThan => value > bound,
            ComparisonOperator::GreaterThanOrEqualTo => value >= bound,
            ComparisonOperator::LessThan => value < bound,
            ComparisonOperator::LessThanOrEqualTo => value <= bound,
            ComparisonOperator::EqualTo => value == bound,
            ComparisonOperator::NotEqualTo => value != bound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RangeOperator {
    Between,
    NotBetween,
}

impl RangeOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeOperator::Between => "BETWEEN",
            RangeOperator::NotBetween => "NOT_BETWEEN",
        }
    }

    /// Bounds are inclusive and may be given in either order.
    pub fn matches(&self, value: f64, from: f64, to: f64) -> bool {
        let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
        let inside = value >= lo && value <= hi;
        match self {
            RangeOperator::Between => inside,
            RangeOperator::NotBetween => !inside,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonCondition {
    pub operator: ComparisonOperator,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treat_null_values_as: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeCondition {
    pub operator: RangeOperator,
    pub from: f64,
    pub to: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treat_null_values_as: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasureValueCondition {
    #[serde(rename = "comparison")]
    Comparison(ComparisonCondition),
    #[serde(rename = "range")]
    Range(RangeCondition),
}

impl MeasureValueCondition {
    /// Evaluates the condition; a missing value is substituted if the condition says so.
    pub fn matches(&self, value: Option<f64>) -> bool {
        match self {
            MeasureValueCondition::Comparison(c) => match value.or(c.treat_null_values_as) {
                Some(v) => c.operator.matches(v, c.value),
                None => false,
            },
            MeasureValueCondition::Range(r) => match value.or(r.treat_null_values_as) {
                Some(v) => r.operator.matches(v, r.from, r.to),
                None => false,
            },
        }
    }

    pub fn operator_name(&self) -> &'static str {
        match self {
            MeasureValueCondition::Comparison(c) => c.operator.as_str(),
            MeasureValueCondition::Range(r) => r.operator.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureValueFilter {
    pub measure: ObjRefInScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<MeasureValueCondition>,
}

// ============================================================================
// FILTER
// ============================================================================

/// Any filter usable at the execution level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    #[serde(rename = "positiveAttributeFilter")]
    PositiveAttribute(PositiveAttributeFilter),
    #[serde(rename = "negativeAttributeFilter")]
    NegativeAttribute(NegativeAttributeFilter),
    #[serde(rename = "absoluteDateFilter")]
    AbsoluteDate(AbsoluteDateFilter),
    #[serde(rename = "relativeDateFilter")]
    RelativeDate(RelativeDateFilter),
    #[serde(rename = "measureValueFilter")]
    MeasureValue(MeasureValueFilter),
}

impl Filter {
    pub fn positive_values(display_form: ObjRef, values: Vec<String>) -> Self {
        Filter::PositiveAttribute(PositiveAttributeFilter {
            display_form,
            in_elements: AttributeElements::ByValue { values },
        })
    }

    pub fn positive_uris(display_form: ObjRef, uris: Vec<String>) -> Self {
        Filter::PositiveAttribute(PositiveAttributeFilter {
            display_form,
            in_elements: AttributeElements::ByUri { uris },
        })
    }

    pub fn negative_values(display_form: ObjRef, values: Vec<String>) -> Self {
        Filter::NegativeAttribute(NegativeAttributeFilter {
            display_form,
            not_in: AttributeElements::ByValue { values },
        })
    }

    pub fn negative_uris(display_form: ObjRef, uris: Vec<String>) -> Self {
        Filter::NegativeAttribute(NegativeAttributeFilter {
            display_form,
            not_in: AttributeElements::ByUri { uris },
        })
    }

    pub fn absolute_date(data_set: ObjRef, from: impl Into<String>, to: impl Into<String>) -> Self {
        Filter::AbsoluteDate(AbsoluteDateFilter {
            data_set,
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn relative_date(data_set: ObjRef, granularity: DateGranularity, from: i32, to: i32) -> Self {
        Filter::RelativeDate(RelativeDateFilter {
            data_set,
            granularity,
            from,
            to,
        })
    }

    pub fn measure_value(measure: ObjRefInScope, condition: Option<MeasureValueCondition>) -> Self {
        Filter::MeasureValue(MeasureValueFilter { measure, condition })
    }

    pub fn comparison(
        measure: ObjRefInScope,
        operator: ComparisonOperator,
        value: f64,
        treat_null_values_as: Option<f64>,
    ) -> Self {
        Self::measure_value(
            measure,
            Some(MeasureValueCondition::Comparison(ComparisonCondition {
                operator,
                value,
                treat_null_values_as,
            })),
        )
    }

    pub fn range(
        measure: ObjRefInScope,
        operator: RangeOperator,
        from: f64,
        to: f64,
        treat_null_values_as: Option<f64>,
    ) -> Self {
        Self::measure_value(
            measure,
            Some(MeasureValueCondition::Range(RangeCondition {
                operator,
                from,
                to,
                treat_null_values_as,
            })),
        )
    }

    /// An attribute filter with no elements does not restrict anything.
    ///
    /// Only attribute filters can be empty.
    pub fn is_empty(&self) -> bool {
        self.attribute_elements().map(|e| e.is_empty()).unwrap_or(false)
    }

    /// The display form, date dataset or measure this filter is applied to.
    pub fn object_ref(&self) -> ObjRefInScope {
        match self {
            Filter::PositiveAttribute(f) => f.display_form.clone().into(),
            Filter::NegativeAttribute(f) => f.display_form.clone().into(),
            Filter::AbsoluteDate(f) => f.data_set.clone().into(),
            Filter::RelativeDate(f) => f.data_set.clone().into(),
            Filter::MeasureValue(f) => f.measure.clone(),
        }
    }

    pub fn attribute_elements(&self) -> Option<&AttributeElements> {
        match self {
            Filter::PositiveAttribute(f) => Some(&f.in_elements),
            Filter::NegativeAttribute(f) => Some(&f.not_in),
            _ => None,
        }
    }

    pub fn is_attribute_filter(&self) -> bool {
        matches!(self, Filter::PositiveAttribute(_) | Filter::NegativeAttribute(_))
    }

    pub fn is_date_filter(&self) -> bool {
        matches!(self, Filter::AbsoluteDate(_) | Filter::RelativeDate(_))
    }

    /// Operator name of a measure value filter, `None` for other filters or
    /// measure value filters without a condition.
    pub fn measure_value_operator(&self) -> Option<&'static str> {
        match self {
            Filter::MeasureValue(MeasureValueFilter { condition: Some(c), .. }) => {
                Some(c.operator_name())
            }
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Filter::PositiveAttribute(_) => "positiveAttributeFilter",
            Filter::NegativeAttribute(_) => "negativeAttributeFilter",
            Filter::AbsoluteDate(_) => "absoluteDateFilter",
            Filter::RelativeDate(_) => "relativeDateFilter",
            Filter::MeasureValue(_) => "measureValueFilter",
        }
    }
}

// ============================================================================
// MEASURE FILTERS
// ============================================================================

/// Filters a simple measure may carry. Measure value filters are never allowed here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasureFilter {
    #[serde(rename = "positiveAttributeFilter")]
    PositiveAttribute(PositiveAttributeFilter),
    #[serde(rename = "negativeAttributeFilter")]
    NegativeAttribute(NegativeAttributeFilter),
    #[serde(rename = "absoluteDateFilter")]
    AbsoluteDate(AbsoluteDateFilter),
    #[serde(rename = "relativeDateFilter")]
    RelativeDate(RelativeDateFilter),
}

impl MeasureFilter {
    pub fn is_empty(&self) -> bool {
        match self {
            MeasureFilter::PositiveAttribute(f) => f.in_elements.is_empty(),
            MeasureFilter::NegativeAttribute(f) => f.not_in.is_empty(),
            _ => false,
        }
    }
}

impl From<MeasureFilter> for Filter {
    fn from(value: MeasureFilter) -> Self {
        match value {
            MeasureFilter::PositiveAttribute(f) => Filter::PositiveAttribute(f),
            MeasureFilter::NegativeAttribute(f) => Filter::NegativeAttribute(f),
            MeasureFilter::AbsoluteDate(f) => Filter::AbsoluteDate(f),
            MeasureFilter::RelativeDate(f) => Filter::RelativeDate(f),
        }
    }
}

impl TryFrom<Filter> for MeasureFilter {
    type Error = ModelError;

    fn try_from(value: Filter) -> Result<Self, Self::Error> {
        match value {
            Filter::PositiveAttribute(f) => Ok(MeasureFilter::PositiveAttribute(f)),
            Filter::NegativeAttribute(f) => Ok(MeasureFilter::NegativeAttribute(f)),
            Filter::AbsoluteDate(f) => Ok(MeasureFilter::AbsoluteDate(f)),
            Filter::RelativeDate(f) => Ok(MeasureFilter::RelativeDate(f)),
            Filter::MeasureValue(_) => Err(ModelError::Invalid(
                "measure value filter cannot be used as a measure filter".to_string(),
            )),
        }
    }
}
