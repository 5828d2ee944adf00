//! FILENAME: local-engine/src/filter.rs
//! Record filtering.
//!
//! Filters narrow a mask with one entry per dataset row; `true` keeps the row.
//! Measure value filters work on aggregated values and are applied by the
//! cube, not here.

use backend_spi::BackendError;
use model::{AbsoluteDateFilter, AttributeElements, Filter, MeasureFilter, ModelError, ObjRef};
use rustc_hash::FxHashSet;

use crate::dataset::{parse_date, Dataset, ValueId};

/// Mask of rows passing every record-level filter.
pub(crate) fn record_mask<'a, I>(dataset: &Dataset, filters: I) -> Result<Vec<bool>, BackendError>
where
    I: IntoIterator<Item = &'a Filter>,
{
    let mut mask = vec![true; dataset.row_count()];
    for filter in filters {
        apply_filter(dataset, filter, &mut mask)?;
    }
    Ok(mask)
}

/// Mask of rows passing the filters of one simple measure, or `None` when it has none.
pub(crate) fn measure_mask(dataset: &Dataset, filters: &[MeasureFilter]) -> Result<Option<Vec<bool>>, BackendError> {
    let effective: Vec<Filter> = filters
        .iter()
        .filter(|f| !f.is_empty())
        .cloned()
        .map(Filter::from)
        .collect();
    if effective.is_empty() {
        return Ok(None);
    }
    record_mask(dataset, &effective).map(Some)
}

fn apply_filter(dataset: &Dataset, filter: &Filter, mask: &mut [bool]) -> Result<(), BackendError> {
    if filter.is_empty() {
        return Ok(());
    }
    match filter {
        Filter::PositiveAttribute(f) => apply_elements(dataset, &f.display_form, &f.in_elements, true, mask),
        Filter::NegativeAttribute(f) => apply_elements(dataset, &f.display_form, &f.not_in, false, mask),
        Filter::AbsoluteDate(f) => apply_absolute_date(dataset, f, mask),
        Filter::RelativeDate(_) => Err(BackendError::NotSupported(
            "relative date filters are not supported by the local engine".into(),
        )),
        Filter::MeasureValue(_) => Ok(()),
    }
}

fn apply_elements(
    dataset: &Dataset,
    display_form: &ObjRef,
    elements: &AttributeElements,
    keep_matching: bool,
    mask: &mut [bool],
) -> Result<(), BackendError> {
    if elements.is_by_uri() {
        return Err(BackendError::NotSupported(format!(
            "attribute filter on {} uses element uris; the local engine matches values only",
            display_form
        )));
    }
    let column = dataset
        .label(display_form)
        .ok_or_else(|| BackendError::execution(format!("dataset has no label column {}", display_form)))?;

    // Unknown values match no row.
    let ids: FxHashSet<ValueId> = elements.items().iter().filter_map(|v| column.id_of(v)).collect();
    for (row, keep) in mask.iter_mut().enumerate() {
        if *keep {
            *keep = ids.contains(&column.row(row)) == keep_matching;
        }
    }
    Ok(())
}

fn apply_absolute_date(dataset: &Dataset, filter: &AbsoluteDateFilter, mask: &mut [bool]) -> Result<(), BackendError> {
    let from = parse_date(&filter.from).map_err(|e| ModelError::Invalid(e.to_string()))?;
    let to = parse_date(&filter.to).map_err(|e| ModelError::Invalid(e.to_string()))?;
    let column = dataset
        .date(&filter.data_set)
        .ok_or_else(|| BackendError::execution(format!("dataset has no date column {}", filter.data_set)))?;

    for (row, keep) in mask.iter_mut().enumerate() {
        if *keep {
            *keep = matches!(column.row(row), Some(d) if d >= from && d <= to);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::{DateGranularity, PositiveAttributeFilter};

    fn dataset() -> Dataset {
        Dataset::builder()
            .label(
                ObjRef::identifier("df.region"),
                "Region",
                [Some("West"), Some("East"), None, Some("North")],
            )
            .date(
                ObjRef::identifier("date"),
                "Date",
                [
                    NaiveDate::from_ymd_opt(2024, 1, 1),
                    NaiveDate::from_ymd_opt(2024, 2, 1),
                    NaiveDate::from_ymd_opt(2024, 3, 1),
                    None,
                ],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_positive_and_negative_filters() {
        let ds = dataset();
        let positive = Filter::positive_values(ObjRef::identifier("df.region"), vec!["West".into(), "South".into()]);
        assert_eq!(record_mask(&ds, [&positive]).unwrap(), vec![true, false, false, false]);

        let negative = Filter::negative_values(ObjRef::identifier("df.region"), vec!["West".into()]);
        assert_eq!(record_mask(&ds, [&negative]).unwrap(), vec![false, true, true, true]);
    }

    #[test]
    fn test_empty_positive_filter_keeps_everything() {
        let ds = dataset();
        let empty = Filter::PositiveAttribute(PositiveAttributeFilter {
            display_form: ObjRef::identifier("df.region"),
            in_elements: AttributeElements::ByValue { values: vec![] },
        });
        assert_eq!(record_mask(&ds, [&empty]).unwrap(), vec![true; 4]);
    }

    #[test]
    fn test_absolute_date_bounds_are_inclusive() {
        let ds = dataset();
        let filter = Filter::absolute_date(ObjRef::identifier("date"), "2024-01-01", "2024-02-01");
        assert_eq!(record_mask(&ds, [&filter]).unwrap(), vec![true, true, false, false]);
    }

    #[test]
    fn test_unsupported_filters() {
        let ds = dataset();
        let by_uri = Filter::positive_uris(ObjRef::identifier("df.region"), vec!["/gdc/e/1".into()]);
        assert!(matches!(record_mask(&ds, [&by_uri]), Err(BackendError::NotSupported(_))));

        let relative = Filter::relative_date(ObjRef::identifier("date"), DateGranularity::Month, -1, 0);
        assert!(matches!(record_mask(&ds, [&relative]), Err(BackendError::NotSupported(_))));
    }

    #[test]
    fn test_unknown_column_is_an_execution_error() {
        let ds = dataset();
        let filter = Filter::positive_values(ObjRef::identifier("df.city"), vec!["Prague".into()]);
        assert!(matches!(record_mask(&ds, [&filter]), Err(BackendError::Execution { .. })));
    }
}
