//! FILENAME: local-engine/src/layout.rs
//! Layout - lays a computed cube out along the definition's dimensions.
//!
//! Every dimension becomes an axis: an ordered list of entries, each entry an
//! attribute tuple plus the measure it shows when the dimension holds the
//! measure group. Sorting and totals are resolved here, once per execution;
//! reading a window only slices the prepared axes.

use std::cmp::Ordering;
use std::ops::Range;

use backend_spi::{
    AttributeDescriptor, AttributeFormOf, BackendError, DataMatrix, DataValue, DataViewPayload, DimensionDescriptor,
    DimensionHeader, MeasureDescriptor, MeasureDescriptorItem, MeasureGroupDescriptor, ResultHeader, ResultWindow,
    TotalDescriptor, TotalDescriptorItem,
};
use model::{
    ExecutionDefinition, LocatorItem, Measure, MeasureDefinition, ModelError, ObjRef, SortDirection, SortItem,
    Total, TotalType, MEASURE_GROUP,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::LocalEngineConfig;
use crate::cube::{attribute_labels, median, Cube, GrainSpec, GroupKey};
use crate::dataset::{Dataset, LabelColumn, ValueId};

// ============================================================================
// AXIS STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisItem {
    /// Index into the definition's attributes.
    Attribute(usize),
    MeasureGroup,
}

#[derive(Debug, Clone)]
struct AxisEntry {
    /// One element per attribute of the axis, in axis order.
    values: GroupKey,
    measure: Option<usize>,
}

#[derive(Debug, Clone)]
struct Axis {
    items: Vec<AxisItem>,
    /// Definition attribute indices in axis order.
    attributes: Vec<usize>,
    entries: Vec<AxisEntry>,
    /// `[item][entry]`
    headers: Vec<Vec<ResultHeader>>,
}

impl Axis {
    fn has_measure_group(&self) -> bool {
        self.items.contains(&AxisItem::MeasureGroup)
    }

    fn position_of(&self, attribute: usize) -> Option<usize> {
        self.attributes.iter().position(|&a| a == attribute)
    }
}

#[derive(Debug, Clone)]
struct TotalRow {
    total_type: TotalType,
    /// One value per entry of the other axis.
    values: Vec<Option<f64>>,
}

// ============================================================================
// LAYOUT
// ============================================================================

#[derive(Debug, Clone)]
pub struct Layout {
    axes: Vec<Axis>,
    /// `[dimension][total type]`
    totals: Vec<Vec<TotalRow>>,
    descriptors: Vec<DimensionDescriptor>,
    /// Axis and position of every definition attribute.
    placement: Vec<(usize, usize)>,
    has_measures: bool,
}

struct LayoutBuilder<'a> {
    definition: &'a ExecutionDefinition,
    dataset: &'a Dataset,
    labels: Vec<&'a LabelColumn>,
    cube: &'a Cube,
    config: &'a LocalEngineConfig,
}

impl Layout {
    pub fn build(
        dataset: &Dataset,
        definition: &ExecutionDefinition,
        cube: &Cube,
        config: &LocalEngineConfig,
    ) -> Result<Self, BackendError> {
        let builder = LayoutBuilder {
            definition,
            dataset,
            labels: attribute_labels(dataset, definition)?,
            cube,
            config,
        };
        builder.build()
    }

    pub fn dimensions(&self) -> &[DimensionDescriptor] {
        &self.descriptors
    }

    pub fn dimension_count(&self) -> usize {
        self.axes.len()
    }

    /// Number of entries along each dimension.
    pub fn total_count(&self) -> Vec<usize> {
        self.axes.iter().map(|a| a.entries.len()).collect()
    }

    /// Data of one window, clipped to the result.
    pub fn payload(&self, cube: &Cube, window: &ResultWindow) -> DataViewPayload {
        let ranges: Vec<Range<usize>> = self
            .axes
            .iter()
            .enumerate()
            .map(|(d, axis)| window.range(d, axis.entries.len()))
            .collect();

        let header_items = self
            .axes
            .iter()
            .zip(&ranges)
            .map(|(axis, range)| axis.headers.iter().map(|h| h[range.clone()].to_vec()).collect())
            .collect();

        DataViewPayload {
            data: self.data(cube, &ranges),
            header_items,
            totals: self.window_totals(&ranges),
            count: ranges.iter().map(|r| r.len()).collect(),
            offset: ranges.iter().map(|r| r.start).collect(),
            total_count: self.total_count(),
        }
    }

    fn data(&self, cube: &Cube, ranges: &[Range<usize>]) -> DataMatrix {
        match (self.axes.as_slice(), self.has_measures) {
            ([_], false) => DataMatrix::OneDim(Vec::new()),
            (_, false) => DataMatrix::TwoDim(Vec::new()),
            ([rows], true) => DataMatrix::OneDim(
                rows.entries[ranges[0].clone()]
                    .iter()
                    .map(|r| DataValue::from(self.cell(cube, &[r])))
                    .collect(),
            ),
            ([rows, cols], true) => DataMatrix::TwoDim(
                rows.entries[ranges[0].clone()]
                    .iter()
                    .map(|r| {
                        cols.entries[ranges[1].clone()]
                            .iter()
                            .map(|c| DataValue::from(self.cell(cube, &[r, c])))
                            .collect()
                    })
                    .collect(),
            ),
            _ => DataMatrix::default(),
        }
    }

    fn window_totals(&self, ranges: &[Range<usize>]) -> Option<Vec<Vec<Vec<DataValue>>>> {
        if self.totals.iter().all(|t| t.is_empty()) {
            return None;
        }
        Some(
            self.totals
                .iter()
                .enumerate()
                .map(|(d, rows)| {
                    let other = ranges.get(1 - d.min(1)).cloned().unwrap_or(0..0);
                    rows.iter()
                        .map(|row| row.values[other.clone()].iter().map(|v| DataValue::from(*v)).collect())
                        .collect()
                })
                .collect(),
        )
    }

    /// Value at the intersection of one entry per axis.
    fn cell(&self, cube: &Cube, entries: &[&AxisEntry]) -> Option<f64> {
        let measure = entries.iter().find_map(|e| e.measure)?;
        let key: GroupKey = self
            .placement
            .iter()
            .map(|&(axis, position)| entries[axis].values[position])
            .collect();
        cube.base().value(&key, measure)
    }
}

// ============================================================================
// BUILD
// ============================================================================

impl<'a> LayoutBuilder<'a> {
    fn build(self) -> Result<Layout, BackendError> {
        let dimensions = self.definition.dimensions();
        if dimensions.is_empty() || dimensions.len() > 2 {
            return Err(BackendError::NotSupported(format!(
                "the local engine lays out one or two dimensions, got {}",
                dimensions.len()
            )));
        }

        let mut axes = Vec::with_capacity(dimensions.len());
        let mut placement: Vec<Option<(usize, usize)>> = vec![None; self.definition.attributes().len()];
        for (d, dimension) in dimensions.iter().enumerate() {
            let mut items = Vec::new();
            let mut attributes = Vec::new();
            for id in &dimension.item_identifiers {
                if id == MEASURE_GROUP {
                    items.push(AxisItem::MeasureGroup);
                    continue;
                }
                let a = self.attribute_index(id)?;
                placement[a] = Some((d, attributes.len()));
                attributes.push(a);
                items.push(AxisItem::Attribute(a));
            }
            axes.push(Axis {
                items,
                attributes,
                entries: Vec::new(),
                headers: Vec::new(),
            });
        }

        let placement = placement
            .into_iter()
            .enumerate()
            .map(|(a, p)| {
                p.ok_or_else(|| {
                    BackendError::Validation(ModelError::AttributeNotInDimension(
                        self.definition.attributes()[a].local_identifier.clone(),
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for d in 0..axes.len() {
            let mut tuples = self.distinct_tuples(&axes[d]);
            let keys = self.sort_keys(&axes, d);
            tuples.sort_by(|a, b| self.compare_tuples(&axes[d], &keys, a, b));
            axes[d].entries = self.expand_measures(&axes[d], tuples);
            axes[d].headers = self.headers(&axes[d]);
        }

        let mut layout = Layout {
            axes,
            totals: Vec::new(),
            descriptors: Vec::new(),
            placement,
            has_measures: !self.definition.measures().is_empty(),
        };
        layout.totals = (0..layout.axes.len())
            .map(|d| self.totals(&layout, d))
            .collect::<Result<Vec<_>, _>>()?;
        layout.descriptors = self.descriptors(&layout);
        Ok(layout)
    }

    fn attribute_index(&self, local_id: &str) -> Result<usize, BackendError> {
        self.definition
            .attributes()
            .iter()
            .position(|a| a.local_identifier == local_id)
            .ok_or_else(|| BackendError::execution(format!("unknown attribute {}", local_id)))
    }

    fn measure_index(&self, local_id: &str) -> Option<usize> {
        self.definition
            .measures()
            .iter()
            .position(|m| m.local_identifier == local_id)
    }

    /// Tuples of the axis attributes present in the cube, in first-seen order.
    fn distinct_tuples(&self, axis: &Axis) -> Vec<GroupKey> {
        if axis.attributes.is_empty() {
            return vec![GroupKey::new()];
        }
        let mut seen = FxHashSet::default();
        let mut tuples = Vec::new();
        for key in self.cube.base().keys() {
            let tuple: GroupKey = axis.attributes.iter().map(|&a| key[a]).collect();
            if seen.insert(tuple.clone()) {
                tuples.push(tuple);
            }
        }
        tuples
    }

    /// Nests the measures at the measure group's position: tuples sharing the
    /// attributes before it form a group, and each group repeats per measure.
    fn expand_measures(&self, axis: &Axis, tuples: Vec<GroupKey>) -> Vec<AxisEntry> {
        let Some(position) = axis.items.iter().position(|i| *i == AxisItem::MeasureGroup) else {
            return tuples
                .into_iter()
                .map(|values| AxisEntry { values, measure: None })
                .collect();
        };

        let mut group_of: FxHashMap<GroupKey, usize> = FxHashMap::default();
        let mut groups: Vec<Vec<GroupKey>> = Vec::new();
        for tuple in tuples {
            let prefix: GroupKey = tuple[..position].into();
            let index = *group_of.entry(prefix).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[index].push(tuple);
        }

        let measure_count = self.definition.measures().len();
        let mut entries = Vec::with_capacity(groups.iter().map(|g| g.len()).sum::<usize>() * measure_count);
        for group in groups {
            for m in 0..measure_count {
                for tuple in &group {
                    entries.push(AxisEntry {
                        values: tuple.clone(),
                        measure: Some(m),
                    });
                }
            }
        }
        entries
    }

    fn headers(&self, axis: &Axis) -> Vec<Vec<ResultHeader>> {
        let mut position = 0;
        axis.items
            .iter()
            .map(|item| match item {
                AxisItem::Attribute(a) => {
                    let label = self.labels[*a];
                    let p = position;
                    position += 1;
                    axis.entries
                        .iter()
                        .map(|e| ResultHeader::attribute(label.value(e.values[p]).map(str::to_string), None))
                        .collect()
                }
                AxisItem::MeasureGroup => axis
                    .entries
                    .iter()
                    .map(|e| {
                        let m = e.measure.unwrap_or(0);
                        ResultHeader::measure(self.measure_name(&self.definition.measures()[m]), m)
                    })
                    .collect(),
            })
            .collect()
    }

    fn measure_name(&self, measure: &Measure) -> String {
        if let Some(name) = measure.alias.as_ref().or(measure.title.as_ref()) {
            return name.clone();
        }
        match &measure.definition {
            MeasureDefinition::Simple(simple) => self
                .dataset
                .fact(&simple.item)
                .map(|f| f.title().to_string())
                .unwrap_or_else(|| measure.local_identifier.clone()),
            _ => measure.local_identifier.clone(),
        }
    }
}

// ============================================================================
// SORTING
// ============================================================================

enum SortKey {
    Attribute {
        position: usize,
        attribute: usize,
        direction: SortDirection,
        /// Sum of all measures per element, for aggregated attribute sorts.
        aggregated: Option<FxHashMap<ValueId, f64>>,
    },
    Measure {
        direction: SortDirection,
        values: FxHashMap<GroupKey, Option<f64>>,
    },
}

impl<'a> LayoutBuilder<'a> {
    /// Sort keys applying to axis `d`, in priority order. A measure sort
    /// applies to the axis that holds neither its locators nor the measures.
    fn sort_keys(&self, axes: &[Axis], d: usize) -> Vec<SortKey> {
        let axis = &axes[d];
        let mut keys = Vec::new();
        for item in self.definition.sort_by() {
            match item {
                SortItem::Attribute(sort) => {
                    let Ok(attribute) = self.attribute_index(&sort.attribute_identifier) else {
                        continue;
                    };
                    let Some(position) = axis.position_of(attribute) else {
                        continue;
                    };
                    let aggregated = sort.aggregation.map(|_| self.element_totals(attribute));
                    keys.push(SortKey::Attribute {
                        position,
                        attribute,
                        direction: sort.direction,
                        aggregated,
                    });
                }
                SortItem::Measure(sort) => {
                    if axis.has_measure_group() {
                        continue;
                    }
                    if let Some(values) = self.measure_sort_values(axis, &sort.locators) {
                        keys.push(SortKey::Measure {
                            direction: sort.direction,
                            values,
                        });
                    }
                }
            }
        }
        keys
    }

    fn element_totals(&self, attribute: usize) -> FxHashMap<ValueId, f64> {
        let base = self.cube.base();
        let mut totals: FxHashMap<ValueId, f64> = FxHashMap::default();
        for (row, key) in base.keys().iter().enumerate() {
            let sum: f64 = base.row_values(row).iter().flatten().sum();
            *totals.entry(key[attribute]).or_insert(0.0) += sum;
        }
        totals
    }

    /// Value of the located column for every tuple of `axis`, or `None` when
    /// the locators do not apply to it.
    fn measure_sort_values(&self, axis: &Axis, locators: &[LocatorItem]) -> Option<FxHashMap<GroupKey, Option<f64>>> {
        let mut measure = None;
        let mut fixed: Vec<Option<ValueId>> = vec![None; self.definition.attributes().len()];
        let mut resolvable = true;
        for locator in locators {
            match locator {
                LocatorItem::Measure(l) => measure = Some(self.measure_index(&l.measure_identifier)?),
                LocatorItem::Attribute(l) => {
                    let a = self.attribute_index(&l.attribute_identifier).ok()?;
                    if axis.position_of(a).is_some() {
                        return None;
                    }
                    match self.labels[a].id_of(&l.element) {
                        Some(id) => fixed[a] = Some(id),
                        None => resolvable = false,
                    }
                }
            }
        }
        let measure = measure?;

        let tuples = self.distinct_tuples(axis);
        let values = tuples
            .into_iter()
            .map(|tuple| {
                let value = if resolvable {
                    let mut key = fixed.clone();
                    for (p, &a) in axis.attributes.iter().enumerate() {
                        key[a] = Some(tuple[p]);
                    }
                    key.into_iter()
                        .collect::<Option<GroupKey>>()
                        .and_then(|key| self.cube.base().value(&key, measure))
                } else {
                    None
                };
                (tuple, value)
            })
            .collect();
        Some(values)
    }

    fn compare_tuples(&self, axis: &Axis, keys: &[SortKey], a: &GroupKey, b: &GroupKey) -> Ordering {
        for key in keys {
            let (ordering, direction) = match key {
                SortKey::Attribute {
                    position,
                    attribute,
                    direction,
                    aggregated: Some(totals),
                } => {
                    let va = totals.get(&a[*position]).copied();
                    let vb = totals.get(&b[*position]).copied();
                    let ordering = compare_values(va, vb)
                        .then_with(|| self.labels[*attribute].compare(a[*position], b[*position]));
                    (ordering, *direction)
                }
                SortKey::Attribute {
                    position,
                    attribute,
                    direction,
                    aggregated: None,
                } => (self.labels[*attribute].compare(a[*position], b[*position]), *direction),
                SortKey::Measure { direction, values } => {
                    let va = values.get(a).copied().flatten();
                    let vb = values.get(b).copied().flatten();
                    (compare_values(va, vb), *direction)
                }
            };
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        for (p, &attribute) in axis.attributes.iter().enumerate() {
            let ordering = self.labels[attribute].compare(a[p], b[p]);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Missing values sort before numbers.
fn compare_values(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

// ============================================================================
// TOTALS
// ============================================================================

impl<'a> LayoutBuilder<'a> {
    /// Grand totals of dimension `d`, one row per total type, each holding a
    /// value for every entry of the other dimension.
    fn totals(&self, layout: &Layout, d: usize) -> Result<Vec<TotalRow>, BackendError> {
        let totals = &self.definition.dimensions()[d].totals;
        if totals.is_empty() {
            return Ok(Vec::new());
        }

        let axis = &layout.axes[d];
        let other = match layout.axes.len() {
            2 => &layout.axes[1 - d],
            _ => {
                return Err(BackendError::NotSupported(
                    "totals need a second dimension holding the measure group".into(),
                ))
            }
        };
        if !other.has_measure_group() {
            return Err(BackendError::NotSupported(
                "totals need the measure group in the other dimension".into(),
            ));
        }
        for total in totals {
            let attribute = self.attribute_index(&total.attribute_identifier)?;
            if axis.attributes.first() != Some(&attribute) {
                return Err(BackendError::NotSupported(format!(
                    "subtotals are not supported by the local engine (total on {})",
                    total.attribute_identifier
                )));
            }
        }

        let mut types: Vec<TotalType> = Vec::new();
        for total in totals {
            if !types.contains(&total.total_type) {
                types.push(total.total_type);
            }
        }

        let mut rollup_grain: GrainSpec = other.attributes.clone();
        rollup_grain.sort_unstable();

        let rows = types
            .into_iter()
            .map(|total_type| TotalRow {
                total_type,
                values: other
                    .entries
                    .iter()
                    .map(|column| {
                        let measure = column.measure?;
                        let requested = totals
                            .iter()
                            .any(|t| t.total_type == total_type && self.is_total_of(t, measure));
                        if !requested {
                            return None;
                        }
                        match total_type {
                            TotalType::Nat => {
                                let key: GroupKey = rollup_grain
                                    .iter()
                                    .filter_map(|a| other.position_of(*a).map(|p| column.values[p]))
                                    .collect();
                                self.cube.rollup(&rollup_grain)?.value(&key, measure)
                            }
                            _ => {
                                let values: Vec<f64> = axis
                                    .entries
                                    .iter()
                                    .filter_map(|row| {
                                        let entries = if d == 0 { [row, column] } else { [column, row] };
                                        layout.cell(self.cube, &entries)
                                    })
                                    .collect();
                                aggregate_total(total_type, &values)
                            }
                        }
                    })
                    .collect(),
            })
            .collect();
        Ok(rows)
    }

    fn is_total_of(&self, total: &Total, measure: usize) -> bool {
        self.definition.measures()[measure].local_identifier == total.measure_identifier
    }
}

fn aggregate_total(total_type: TotalType, values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    match total_type {
        TotalType::Sum => Some(values.iter().sum()),
        TotalType::Avg => Some(values.iter().sum::<f64>() / values.len() as f64),
        TotalType::Max => values.iter().copied().reduce(f64::max),
        TotalType::Min => values.iter().copied().reduce(f64::min),
        TotalType::Med => median(values),
        TotalType::Nat => None,
    }
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

impl<'a> LayoutBuilder<'a> {
    fn descriptors(&self, layout: &Layout) -> Vec<DimensionDescriptor> {
        layout
            .axes
            .iter()
            .zip(&layout.totals)
            .map(|(axis, totals)| DimensionDescriptor {
                headers: axis
                    .items
                    .iter()
                    .map(|item| match item {
                        AxisItem::Attribute(a) => {
                            let total_items = if axis.attributes.first() == Some(a) {
                                totals
                                    .iter()
                                    .map(|row| TotalDescriptorItem {
                                        total_header_item: TotalDescriptor {
                                            name: row.total_type.as_str().to_string(),
                                        },
                                    })
                                    .collect()
                            } else {
                                Vec::new()
                            };
                            DimensionHeader::Attribute(self.attribute_descriptor(*a, total_items))
                        }
                        AxisItem::MeasureGroup => DimensionHeader::MeasureGroup(self.measure_group_descriptor()),
                    })
                    .collect(),
            })
            .collect()
    }

    fn attribute_descriptor(&self, a: usize, total_items: Vec<TotalDescriptorItem>) -> AttributeDescriptor {
        let attribute = &self.definition.attributes()[a];
        let title = self.labels[a].title().to_string();
        let (uri, identifier) = ref_parts(&attribute.display_form);
        AttributeDescriptor {
            local_identifier: attribute.local_identifier.clone(),
            name: attribute.alias.clone().unwrap_or_else(|| title.clone()),
            uri: uri.clone(),
            identifier: identifier.clone(),
            form_of: AttributeFormOf {
                name: title,
                uri,
                identifier,
            },
            total_items,
        }
    }

    fn measure_group_descriptor(&self) -> MeasureGroupDescriptor {
        MeasureGroupDescriptor {
            items: self
                .definition
                .measures()
                .iter()
                .map(|measure| {
                    let (uri, identifier) = match measure.simple_definition() {
                        Some(simple) => ref_parts(&simple.item),
                        None => (None, None),
                    };
                    MeasureDescriptorItem {
                        measure_header_item: MeasureDescriptor {
                            local_identifier: measure.local_identifier.clone(),
                            name: self.measure_name(measure),
                            format: measure
                                .format
                                .clone()
                                .unwrap_or_else(|| self.config.default_measure_format.clone()),
                            uri,
                            identifier,
                        },
                    }
                })
                .collect(),
        }
    }
}

fn ref_parts(obj_ref: &ObjRef) -> (Option<String>, Option<String>) {
    if obj_ref.is_uri() {
        (Some(obj_ref.id_or_uri().to_string()), None)
    } else {
        (None, Some(obj_ref.id_or_uri().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        new_attribute_locator, new_attribute_sort, new_dimension, new_measure_sort, Attribute, DimensionSpec,
        MeasureAggregation,
    };

    fn dataset() -> Dataset {
        Dataset::builder()
            .label(
                ObjRef::identifier("df.region"),
                "Region",
                [Some("West"), Some("East"), Some("West"), Some("East"), Some("North")],
            )
            .label(
                ObjRef::identifier("df.product"),
                "Product",
                [Some("A"), Some("A"), Some("B"), Some("B"), Some("A")],
            )
            .fact(
                ObjRef::identifier("fact.amount"),
                "Amount",
                [Some(10.0), Some(20.0), Some(30.0), Some(1.0), Some(5.0)],
            )
            .fact(
                ObjRef::identifier("fact.cost"),
                "Cost",
                [Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)],
            )
            .build()
            .unwrap()
    }

    fn definition(dims: &[&[&str]], totals: Vec<Total>) -> ExecutionDefinition {
        let specs: Vec<DimensionSpec> = dims
            .iter()
            .enumerate()
            .map(|(i, items)| {
                let t = if i == 0 { totals.clone() } else { vec![] };
                DimensionSpec::from(new_dimension(items.iter().copied(), t))
            })
            .collect();
        let placed = |id: &str| dims.iter().any(|items| items.contains(&id));
        let attributes = [
            Attribute::new(ObjRef::identifier("df.region")).with_local_id("region"),
            Attribute::new(ObjRef::identifier("df.product")).with_local_id("product"),
        ]
        .into_iter()
        .filter(|a| placed(&a.local_identifier))
        .collect();
        ExecutionDefinition::new(
            "ws",
            attributes,
            vec![
                Measure::simple(ObjRef::identifier("fact.amount"))
                    .aggregation(MeasureAggregation::Sum)
                    .local_id("amount")
                    .build(),
                Measure::simple(ObjRef::identifier("fact.cost"))
                    .local_id("cost")
                    .alias("Costs")
                    .build(),
            ],
            vec![],
        )
        .unwrap()
        .with_dimensions(&specs)
        .unwrap()
    }

    fn lay_out(ds: &Dataset, def: &ExecutionDefinition) -> (Cube, Layout) {
        let cube = Cube::compute(ds, def, &crate::cube::native_rollup_grains(def)).unwrap();
        let layout = Layout::build(ds, def, &cube, &LocalEngineConfig::default()).unwrap();
        (cube, layout)
    }

    fn all(layout: &Layout) -> ResultWindow {
        let counts = layout.total_count();
        ResultWindow::new(&vec![0; counts.len()], &counts)
    }

    fn names(headers: &[ResultHeader]) -> Vec<String> {
        headers.iter().map(|h| h.name().unwrap_or("").to_string()).collect()
    }

    #[test]
    fn test_rows_by_columns() {
        let ds = dataset();
        let def = definition(&[&["region"], &["product", MEASURE_GROUP]], vec![]);
        let (cube, layout) = lay_out(&ds, &def);
        let payload = layout.payload(&cube, &all(&layout));

        assert_eq!(payload.total_count, vec![3, 4]);
        assert_eq!(names(&payload.header_items[0][0]), vec!["East", "North", "West"]);
        assert_eq!(names(&payload.header_items[1][0]), vec!["A", "A", "B", "B"]);
        assert_eq!(names(&payload.header_items[1][1]), vec!["Amount", "Costs", "Amount", "Costs"]);
        assert_eq!(payload.data.get(2, 0).and_then(|v| v.as_f64()), Some(10.0));
        assert_eq!(payload.data.get(2, 2).and_then(|v| v.as_f64()), Some(30.0));
        assert!(payload.data.get(1, 2).unwrap().is_null());
        assert!(payload.totals.is_none());
    }

    #[test]
    fn test_measure_group_first_nests_attributes() {
        let ds = dataset();
        let def = definition(&[&[MEASURE_GROUP, "product"], &["region"]], vec![]);
        let (cube, layout) = lay_out(&ds, &def);
        let payload = layout.payload(&cube, &all(&layout));

        assert_eq!(names(&payload.header_items[0][0]), vec!["Amount", "Amount", "Costs", "Costs"]);
        assert_eq!(names(&payload.header_items[0][1]), vec!["A", "B", "A", "B"]);
    }

    #[test]
    fn test_window_slices_data_and_headers() {
        let ds = dataset();
        let def = definition(&[&["region", "product"], &[MEASURE_GROUP]], vec![]);
        let (cube, layout) = lay_out(&ds, &def);
        let payload = layout.payload(&cube, &ResultWindow::new(&[1, 1], &[2, 5]));

        assert_eq!(payload.offset, vec![1, 1]);
        assert_eq!(payload.count, vec![2, 1]);
        assert_eq!(payload.total_count, vec![5, 2]);
        assert_eq!(names(&payload.header_items[0][0]), vec!["East", "North"]);
        assert_eq!(payload.data.get(0, 0).and_then(|v| v.as_f64()), Some(4.0));
    }

    #[test]
    fn test_attribute_and_measure_sorts() {
        let ds = dataset();
        let def = definition(&[&["region"], &[MEASURE_GROUP]], vec![]);

        let by_name = def.with_sorting(vec![new_attribute_sort("region", SortDirection::Desc, false)]);
        let (cube, layout) = lay_out(&ds, &by_name);
        let payload = layout.payload(&cube, &all(&layout));
        assert_eq!(names(&payload.header_items[0][0]), vec!["West", "North", "East"]);

        let by_amount = def.with_sorting(vec![new_measure_sort("amount", SortDirection::Asc, vec![])]);
        let (cube, layout) = lay_out(&ds, &by_amount);
        let payload = layout.payload(&cube, &all(&layout));
        assert_eq!(names(&payload.header_items[0][0]), vec!["North", "East", "West"]);
    }

    #[test]
    fn test_measure_sort_with_attribute_locator() {
        let ds = dataset();
        let def = definition(&[&["region"], &["product", MEASURE_GROUP]], vec![]).with_sorting(vec![new_measure_sort(
            "amount",
            SortDirection::Desc,
            vec![new_attribute_locator("product", "B")],
        )]);
        let (cube, layout) = lay_out(&ds, &def);
        let payload = layout.payload(&cube, &all(&layout));

        // North has no B; missing values sort first ascending, last descending.
        assert_eq!(names(&payload.header_items[0][0]), vec!["West", "East", "North"]);
    }

    #[test]
    fn test_aggregated_attribute_sort() {
        let ds = dataset();
        let def = definition(&[&["region"], &[MEASURE_GROUP]], vec![])
            .with_sorting(vec![new_attribute_sort("region", SortDirection::Asc, true)]);
        let (cube, layout) = lay_out(&ds, &def);
        let payload = layout.payload(&cube, &all(&layout));

        assert_eq!(names(&payload.header_items[0][0]), vec!["North", "East", "West"]);
    }

    #[test]
    fn test_grand_totals() {
        let ds = dataset();
        let def = definition(
            &[&["region"], &[MEASURE_GROUP]],
            vec![
                Total::new(TotalType::Sum, "amount", "region"),
                Total::new(TotalType::Max, "cost", "region"),
                Total::new(TotalType::Nat, "amount", "region"),
            ],
        );
        let (cube, layout) = lay_out(&ds, &def);
        let payload = layout.payload(&cube, &all(&layout));
        let totals = payload.totals.unwrap();

        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].len(), 3);
        assert_eq!(totals[0][0], vec![DataValue::Number(66.0), DataValue::Null]);
        assert_eq!(totals[0][1], vec![DataValue::Null, DataValue::Number(6.0)]);
        assert_eq!(totals[0][2], vec![DataValue::Number(66.0), DataValue::Null]);
        assert!(totals[1].is_empty());

        let descriptor = &layout.dimensions()[0].headers[0];
        let DimensionHeader::Attribute(attribute) = descriptor else {
            panic!("expected attribute header");
        };
        assert_eq!(attribute.total_items.len(), 3);
    }

    #[test]
    fn test_unplaced_attribute_rejected() {
        let ds = dataset();
        let def = ExecutionDefinition::new(
            "ws",
            vec![
                Attribute::new(ObjRef::identifier("df.region")).with_local_id("region"),
                Attribute::new(ObjRef::identifier("df.product")).with_local_id("product"),
            ],
            vec![Measure::simple(ObjRef::identifier("fact.amount")).local_id("amount").build()],
            vec![],
        )
        .unwrap()
        .with_dimensions(&[
            DimensionSpec::from(new_dimension(["region"], vec![])),
            DimensionSpec::from(new_dimension([MEASURE_GROUP], vec![])),
        ])
        .unwrap();
        let cube = Cube::compute(&ds, &def, &[]).unwrap();
        let result = Layout::build(&ds, &def, &cube, &LocalEngineConfig::default());
        assert!(matches!(
            result,
            Err(BackendError::Validation(ModelError::AttributeNotInDimension(ref id))) if id == "product"
        ));
    }

    #[test]
    fn test_subtotals_not_supported() {
        let ds = dataset();
        let def = definition(
            &[&["region", "product"], &[MEASURE_GROUP]],
            vec![Total::new(TotalType::Sum, "amount", "product")],
        );
        let cube = Cube::compute(&ds, &def, &[]).unwrap();
        let result = Layout::build(&ds, &def, &cube, &LocalEngineConfig::default());
        assert!(matches!(result, Err(BackendError::NotSupported(_))));
    }

    #[test]
    fn test_descriptors() {
        let ds = dataset();
        let def = definition(&[&["region"], &["product", MEASURE_GROUP]], vec![]);
        let (_, layout) = lay_out(&ds, &def);
        let dims = layout.dimensions();

        let region: Vec<_> = dims[0].attribute_descriptors().collect();
        assert_eq!(region[0].name, "Region");
        assert_eq!(region[0].form_of.identifier.as_deref(), Some("df.region"));

        let group = dims[1].measure_group().unwrap();
        assert_eq!(group.items[0].measure_header_item.format, "#,##0.00");
        assert_eq!(group.items[1].measure_header_item.name, "Costs");
    }
}
