//! FILENAME: remote-backend/src/pages.rs
//! Reading a whole result in pages.
//!
//! Servers cap the window size, so a full read requests a grid of windows
//! and stitches the pages back into one payload positioned at the origin.

use backend_spi::{DataMatrix, DataValue, DataViewPayload, ResultHeader, ResultWindow};

/// Windows covering `total_count` with at most `limit` items per dimension,
/// in row-major order. An empty dimension still gets one window at 0.
pub(crate) fn page_windows(total_count: &[usize], limit: usize) -> Vec<ResultWindow> {
    let per_dim: Vec<Vec<usize>> = total_count
        .iter()
        .map(|&total| if total == 0 { vec![0] } else { (0..total).step_by(limit).collect() })
        .collect();

    let mut offsets: Vec<Vec<usize>> = vec![vec![]];
    for dim_offsets in &per_dim {
        offsets = offsets
            .into_iter()
            .flat_map(|prefix| {
                dim_offsets.iter().map(move |&o| {
                    let mut next = prefix.clone();
                    next.push(o);
                    next
                })
            })
            .collect();
    }

    offsets
        .into_iter()
        .map(|offset| {
            let size: Vec<usize> = offset.iter().map(|_| limit).collect();
            ResultWindow::new(&offset, &size)
        })
        .collect()
}

/// Stitches pages of one result into a single payload covering all of it.
pub(crate) fn assemble(pages: Vec<DataViewPayload>) -> DataViewPayload {
    if pages.len() <= 1 {
        return pages.into_iter().next().unwrap_or_default();
    }
    let first = &pages[0];

    let total = first.total_count.clone();
    let dims = total.len();

    let mut data = match dims {
        1 => DataMatrix::OneDim(vec![DataValue::Null; total[0]]),
        _ => DataMatrix::TwoDim(vec![vec![DataValue::Null; total.get(1).copied().unwrap_or(0)]; total[0]]),
    };
    let mut headers: Vec<Vec<Vec<Option<ResultHeader>>>> = first
        .header_items
        .iter()
        .enumerate()
        .map(|(d, slices)| slices.iter().map(|_| vec![None; total.get(d).copied().unwrap_or(0)]).collect())
        .collect();
    let mut totals: Option<Vec<Vec<Vec<DataValue>>>> = first.totals.as_ref().map(|per_dim| {
        per_dim
            .iter()
            .enumerate()
            .map(|(d, rows)| {
                let across = other_dim(d, dims).and_then(|o| total.get(o).copied()).unwrap_or(0);
                rows.iter().map(|_| vec![DataValue::Null; across]).collect()
            })
            .collect()
    });

    for page in pages {
        place_data(&mut data, &page);
        place_headers(&mut headers, &page);
        if let (Some(target), Some(source)) = (totals.as_mut(), page.totals.as_ref()) {
            place_totals(target, source, &page.offset, dims);
        }
    }

    DataViewPayload {
        data,
        header_items: headers
            .into_iter()
            .map(|slices| slices.into_iter().map(|items| items.into_iter().flatten().collect()).collect())
            .collect(),
        totals,
        count: total.clone(),
        offset: vec![0; dims],
        total_count: total,
    }
}

fn other_dim(dim: usize, dims: usize) -> Option<usize> {
    (dims == 2).then_some(1 - dim)
}

fn place_data(target: &mut DataMatrix, page: &DataViewPayload) {
    match (target, &page.data) {
        (DataMatrix::OneDim(values), DataMatrix::OneDim(source)) => {
            let start = page.offset.first().copied().unwrap_or(0);
            for (i, value) in source.iter().enumerate() {
                if let Some(slot) = values.get_mut(start + i) {
                    *slot = value.clone();
                }
            }
        }
        (DataMatrix::TwoDim(rows), DataMatrix::TwoDim(source)) => {
            let row_start = page.offset.first().copied().unwrap_or(0);
            let col_start = page.offset.get(1).copied().unwrap_or(0);
            for (r, source_row) in source.iter().enumerate() {
                let Some(row) = rows.get_mut(row_start + r) else { continue };
                for (c, value) in source_row.iter().enumerate() {
                    if let Some(slot) = row.get_mut(col_start + c) {
                        *slot = value.clone();
                    }
                }
            }
        }
        _ => {}
    }
}

fn place_headers(target: &mut [Vec<Vec<Option<ResultHeader>>>], page: &DataViewPayload) {
    for (d, slices) in page.header_items.iter().enumerate() {
        let start = page.offset.get(d).copied().unwrap_or(0);
        let Some(target_slices) = target.get_mut(d) else { continue };
        for (s, items) in slices.iter().enumerate() {
            let Some(target_items) = target_slices.get_mut(s) else { continue };
            for (i, item) in items.iter().enumerate() {
                if let Some(slot) = target_items.get_mut(start + i) {
                    if slot.is_none() {
                        *slot = Some(item.clone());
                    }
                }
            }
        }
    }
}

fn place_totals(target: &mut [Vec<Vec<DataValue>>], source: &[Vec<Vec<DataValue>>], offset: &[usize], dims: usize) {
    for (d, rows) in source.iter().enumerate() {
        let start = other_dim(d, dims).and_then(|o| offset.get(o).copied()).unwrap_or(0);
        let Some(target_rows) = target.get_mut(d) else { continue };
        for (t, values) in rows.iter().enumerate() {
            let Some(target_values) = target_rows.get_mut(t) else { continue };
            for (i, value) in values.iter().enumerate() {
                if let Some(slot) = target_values.get_mut(start + i) {
                    *slot = value.clone();
                }
            }
        }
    }
}
