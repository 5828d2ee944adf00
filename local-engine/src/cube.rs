//! FILENAME: local-engine/src/cube.rs
//! Cube - measure values aggregated per attribute tuple.
//!
//! The cube depends only on the data part of a definition (attributes,
//! measures, filters). Sorting, dimension layout and non-native totals are
//! applied on top of it, which is what makes a computed cube reusable for a
//! transformed execution.
//!
//! Algorithm:
//! 1. Filter records with the definition's attribute and date filters
//! 2. Group records by their attribute tuple, accumulating each simple measure
//!    over the records that also pass its own measure filters
//! 3. Derive ratios and arithmetic measures per tuple
//! 4. Drop tuples failing a measure value filter
//! 5. Re-aggregate the surviving records at every roll-up grain native
//!    totals need

use std::cmp::Ordering;

use backend_spi::BackendError;
use model::{
    ArithmeticOperator, ExecutionDefinition, Filter, MeasureAggregation, MeasureDefinition, MeasureValueFilter,
    ObjRefInScope, MEASURE_GROUP,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::dataset::{Dataset, FactColumn, LabelColumn, ValueId};
use crate::filter::{measure_mask, record_mask};

// ============================================================================
// GROUP KEY
// ============================================================================

/// Attribute element ids of one tuple, in grain order.
pub type GroupKey = SmallVec<[ValueId; 4]>;

/// Attribute indices (into the definition's attributes) a grain groups by, ascending.
pub type GrainSpec = Vec<usize>;

// ============================================================================
// AGGREGATE ACCUMULATOR
// ============================================================================

/// Intermediate state of one simple measure for one tuple.
#[derive(Debug, Clone, Default)]
pub struct AggregateAccumulator {
    pub sum: f64,
    pub count_numbers: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Kept only for median.
    values: Vec<f64>,
    keep_values: bool,
}

impl AggregateAccumulator {
    pub fn new(aggregation: MeasureAggregation) -> Self {
        AggregateAccumulator {
            keep_values: aggregation == MeasureAggregation::Median,
            ..Default::default()
        }
    }

    pub fn add_number(&mut self, value: f64) {
        self.count_numbers += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        if self.keep_values {
            self.values.push(value);
        }
    }

    /// Final value; `None` when no number was added, except for count.
    pub fn compute(&self, aggregation: MeasureAggregation) -> Option<f64> {
        if aggregation == MeasureAggregation::Count {
            return Some(self.count_numbers as f64);
        }
        if self.count_numbers == 0 {
            return None;
        }
        match aggregation {
            MeasureAggregation::Sum | MeasureAggregation::Runsum => Some(self.sum),
            MeasureAggregation::Count => Some(self.count_numbers as f64),
            MeasureAggregation::Avg => Some(self.sum / self.count_numbers as f64),
            MeasureAggregation::Min => self.min,
            MeasureAggregation::Max => self.max,
            MeasureAggregation::Median => median(&self.values),
        }
    }
}

pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

// ============================================================================
// MEASURE PLAN
// ============================================================================

enum MeasurePlan<'a> {
    Simple {
        column: &'a FactColumn,
        aggregation: MeasureAggregation,
        mask: Option<Vec<bool>>,
        compute_ratio: bool,
    },
    Arithmetic {
        operator: ArithmeticOperator,
        operands: Vec<usize>,
    },
}

fn plan_measures<'a>(dataset: &'a Dataset, definition: &ExecutionDefinition) -> Result<Vec<MeasurePlan<'a>>, BackendError> {
    let mut plans = Vec::with_capacity(definition.measures().len());
    for measure in definition.measures() {
        let plan = match &measure.definition {
            MeasureDefinition::Simple(simple) => {
                let aggregation = simple.aggregation.unwrap_or(MeasureAggregation::Sum);
                if aggregation == MeasureAggregation::Runsum {
                    return Err(BackendError::NotSupported(
                        "runsum aggregation is not supported by the local engine".into(),
                    ));
                }
                let column = dataset.fact(&simple.item).ok_or_else(|| {
                    BackendError::execution(format!("dataset has no fact column {}", simple.item))
                })?;
                MeasurePlan::Simple {
                    column,
                    aggregation,
                    mask: measure_mask(dataset, &simple.filters)?,
                    compute_ratio: simple.compute_ratio,
                }
            }
            MeasureDefinition::Arithmetic(arithmetic) => {
                let operands = arithmetic
                    .measure_identifiers
                    .iter()
                    .map(|id| measure_index(definition, id))
                    .collect::<Result<Vec<_>, _>>()?;
                MeasurePlan::Arithmetic {
                    operator: arithmetic.operator,
                    operands,
                }
            }
            MeasureDefinition::PoP(_) | MeasureDefinition::PreviousPeriod(_) => {
                return Err(BackendError::NotSupported(format!(
                    "{} measures are not supported by the local engine",
                    measure.definition.kind_name()
                )));
            }
        };
        plans.push(plan);
    }
    Ok(plans)
}

fn measure_index(definition: &ExecutionDefinition, local_id: &str) -> Result<usize, BackendError> {
    definition
        .measures()
        .iter()
        .position(|m| m.local_identifier == local_id)
        .ok_or_else(|| BackendError::execution(format!("unknown measure {}", local_id)))
}

/// Measures ordered so every arithmetic measure follows its operands.
fn evaluation_order(plans: &[MeasurePlan]) -> Result<Vec<usize>, BackendError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Visiting,
        Done,
    }

    fn visit(index: usize, plans: &[MeasurePlan], marks: &mut [Mark], order: &mut Vec<usize>) -> Result<(), BackendError> {
        match marks[index] {
            Mark::Done => return Ok(()),
            Mark::Visiting => {
                return Err(BackendError::execution("arithmetic measures reference each other in a cycle"));
            }
            Mark::New => {}
        }
        marks[index] = Mark::Visiting;
        if let MeasurePlan::Arithmetic { operands, .. } = &plans[index] {
            for &operand in operands {
                visit(operand, plans, marks, order)?;
            }
        }
        marks[index] = Mark::Done;
        order.push(index);
        Ok(())
    }

    let mut marks = vec![Mark::New; plans.len()];
    let mut order = Vec::with_capacity(plans.len());
    for index in 0..plans.len() {
        visit(index, plans, &mut marks, &mut order)?;
    }
    Ok(order)
}

fn arithmetic(operator: ArithmeticOperator, operands: &[Option<f64>]) -> Option<f64> {
    match operator {
        ArithmeticOperator::Sum => {
            let present: Vec<f64> = operands.iter().flatten().copied().collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum())
            }
        }
        ArithmeticOperator::Difference => match operands {
            [Some(a), Some(b), ..] => Some(a - b),
            _ => None,
        },
        ArithmeticOperator::Multiplication => {
            let mut product = 1.0;
            for operand in operands {
                product *= (*operand)?;
            }
            Some(product)
        }
        ArithmeticOperator::Ratio => match operands {
            [Some(a), Some(b), ..] if *b != 0.0 => Some(a / b),
            _ => None,
        },
        ArithmeticOperator::Change => match operands {
            [Some(current), Some(previous), ..] if *previous != 0.0 => Some((current - previous) / previous),
            _ => None,
        },
    }
}

// ============================================================================
// GRAIN
// ============================================================================

/// Measure values of every tuple present at one grain.
#[derive(Debug, Clone, Default)]
pub struct Grain {
    keys: Vec<GroupKey>,
    index: FxHashMap<GroupKey, usize>,
    /// `[tuple][measure]`
    values: Vec<Vec<Option<f64>>>,
}

impl Grain {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[GroupKey] {
        &self.keys
    }

    pub fn value(&self, key: &[ValueId], measure: usize) -> Option<f64> {
        let row = *self.index.get(key)?;
        self.values[row].get(measure).copied().flatten()
    }

    pub fn row_values(&self, row: usize) -> &[Option<f64>] {
        &self.values[row]
    }

    fn retain(&mut self, keep: &[bool]) {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for (i, (key, row)) in self.keys.drain(..).zip(self.values.drain(..)).enumerate() {
            if keep[i] {
                keys.push(key);
                values.push(row);
            }
        }
        self.index = keys.iter().cloned().enumerate().map(|(i, k)| (k, i)).collect();
        self.keys = keys;
        self.values = values;
    }
}

struct GrainInput<'a> {
    labels: &'a [&'a LabelColumn],
    plans: &'a [MeasurePlan<'a>],
    order: &'a [usize],
    mask: &'a [bool],
}

impl<'a> GrainInput<'a> {
    fn key(&self, grain: &[usize], row: usize) -> GroupKey {
        grain.iter().map(|&a| self.labels[a].row(row)).collect()
    }

    fn aggregate(&self, grain: &[usize], row_count: usize) -> Grain {
        let mut result = Grain::default();
        let mut accumulators: Vec<Vec<AggregateAccumulator>> = Vec::new();
        let mut ratio_totals: Vec<AggregateAccumulator> = self.fresh_accumulators();

        for row in 0..row_count {
            if !self.mask[row] {
                continue;
            }
            let key = self.key(grain, row);
            let slot = match result.index.get(&key) {
                Some(&slot) => slot,
                None => {
                    let slot = result.keys.len();
                    result.index.insert(key.clone(), slot);
                    result.keys.push(key);
                    accumulators.push(self.fresh_accumulators());
                    slot
                }
            };
            for (m, plan) in self.plans.iter().enumerate() {
                if let MeasurePlan::Simple { column, mask, .. } = plan {
                    if mask.as_ref().is_some_and(|mask| !mask[row]) {
                        continue;
                    }
                    if let Some(v) = column.row(row) {
                        accumulators[slot][m].add_number(v);
                        ratio_totals[m].add_number(v);
                    }
                }
            }
        }

        result.values = accumulators
            .iter()
            .map(|accs| self.finish_tuple(accs, &ratio_totals))
            .collect();
        result
    }

    fn fresh_accumulators(&self) -> Vec<AggregateAccumulator> {
        self.plans
            .iter()
            .map(|plan| match plan {
                MeasurePlan::Simple { aggregation, .. } => AggregateAccumulator::new(*aggregation),
                MeasurePlan::Arithmetic { .. } => AggregateAccumulator::default(),
            })
            .collect()
    }

    fn finish_tuple(&self, accs: &[AggregateAccumulator], ratio_totals: &[AggregateAccumulator]) -> Vec<Option<f64>> {
        let mut values = vec![None; self.plans.len()];
        for &m in self.order {
            values[m] = match &self.plans[m] {
                MeasurePlan::Simple {
                    aggregation,
                    compute_ratio,
                    ..
                } => {
                    let value = accs[m].compute(*aggregation);
                    if *compute_ratio {
                        match (value, ratio_totals[m].compute(*aggregation)) {
                            (Some(v), Some(total)) if total != 0.0 => Some(v / total),
                            _ => None,
                        }
                    } else {
                        value
                    }
                }
                MeasurePlan::Arithmetic { operator, operands } => {
                    let inputs: Vec<Option<f64>> = operands.iter().map(|&o| values[o]).collect();
                    arithmetic(*operator, &inputs)
                }
            };
        }
        values
    }
}

// ============================================================================
// CUBE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Cube {
    /// Tuples of all attributes, in definition order.
    base: Grain,
    rollups: FxHashMap<GrainSpec, Grain>,
    /// Rows that contributed to the surviving tuples.
    contributing_rows: usize,
}

impl Cube {
    /// Computes the cube of `definition` over `dataset`, with a roll-up for
    /// each grain in `rollups`.
    pub fn compute(dataset: &Dataset, definition: &ExecutionDefinition, rollups: &[GrainSpec]) -> Result<Self, BackendError> {
        let labels = attribute_labels(dataset, definition)?;
        let plans = plan_measures(dataset, definition)?;
        let order = evaluation_order(&plans)?;
        let mut mask = record_mask(dataset, definition.effective_filters())?;

        let all: GrainSpec = (0..labels.len()).collect();
        let mut base = GrainInput {
            labels: &labels,
            plans: &plans,
            order: &order,
            mask: &mask,
        }
        .aggregate(&all, dataset.row_count());

        let value_filters = measure_value_filters(definition)?;
        if !value_filters.is_empty() {
            let keep: Vec<bool> = (0..base.len())
                .map(|row| {
                    value_filters
                        .iter()
                        .all(|(m, mvf)| mvf.condition.as_ref().map_or(true, |c| c.matches(base.values[row][*m])))
                })
                .collect();
            base.retain(&keep);

            let input = GrainInput {
                labels: &labels,
                plans: &plans,
                order: &order,
                mask: &mask,
            };
            let surviving: Vec<bool> = (0..dataset.row_count())
                .map(|row| mask[row] && base.index.contains_key(&input.key(&all, row)))
                .collect();
            mask = surviving;
        }

        let input = GrainInput {
            labels: &labels,
            plans: &plans,
            order: &order,
            mask: &mask,
        };
        let mut cube = Cube {
            contributing_rows: mask.iter().filter(|&&keep| keep).count(),
            base,
            rollups: FxHashMap::default(),
        };
        for grain in rollups {
            if !cube.rollups.contains_key(grain) {
                let rolled = input.aggregate(grain, dataset.row_count());
                cube.rollups.insert(grain.clone(), rolled);
            }
        }
        Ok(cube)
    }

    pub fn base(&self) -> &Grain {
        &self.base
    }

    pub fn rollup(&self, grain: &[usize]) -> Option<&Grain> {
        self.rollups.get(grain)
    }

    /// True when every grain in `grains` was rolled up.
    pub fn has_rollups(&self, grains: &[GrainSpec]) -> bool {
        grains.iter().all(|g| self.rollups.contains_key(g))
    }

    pub fn contributing_rows(&self) -> usize {
        self.contributing_rows
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }
}

/// Label column of every attribute, in definition order.
pub(crate) fn attribute_labels<'a>(
    dataset: &'a Dataset,
    definition: &ExecutionDefinition,
) -> Result<Vec<&'a LabelColumn>, BackendError> {
    definition
        .attributes()
        .iter()
        .map(|a| {
            dataset
                .label(&a.display_form)
                .ok_or_else(|| BackendError::execution(format!("dataset has no label column {}", a.display_form)))
        })
        .collect()
}

fn measure_value_filters(definition: &ExecutionDefinition) -> Result<Vec<(usize, &MeasureValueFilter)>, BackendError> {
    let mut resolved = Vec::new();
    for filter in definition.filters() {
        let Filter::MeasureValue(mvf) = filter else {
            continue;
        };
        if mvf.condition.is_none() {
            continue;
        }
        let index = match &mvf.measure {
            ObjRefInScope::LocalId { local_identifier } => measure_index(definition, local_identifier)?,
            ObjRefInScope::Ref(obj_ref) => definition
                .measures()
                .iter()
                .position(|m| m.simple_definition().is_some_and(|s| &s.item == obj_ref))
                .ok_or_else(|| {
                    BackendError::NotSupported(format!(
                        "measure value filter on {} does not match a measure of the execution",
                        obj_ref
                    ))
                })?,
        };
        resolved.push((index, mvf));
    }
    Ok(resolved)
}

/// Grains native totals of `definition` are rolled up at: the attributes of
/// the other dimensions plus those preceding the total's attribute in its own.
pub fn native_rollup_grains(definition: &ExecutionDefinition) -> Vec<GrainSpec> {
    let attribute_index = |id: &str| definition.attributes().iter().position(|a| a.local_identifier == id);
    let mut grains: Vec<GrainSpec> = Vec::new();

    for (d, dimension) in definition.dimensions().iter().enumerate() {
        for total in dimension.totals.iter().filter(|t| t.is_native()) {
            let mut grain: GrainSpec = definition
                .dimensions()
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != d)
                .flat_map(|(_, dim)| dim.item_identifiers.iter())
                .filter(|id| id.as_str() != MEASURE_GROUP)
                .filter_map(|id| attribute_index(id))
                .collect();
            grain.extend(
                dimension
                    .item_identifiers
                    .iter()
                    .take_while(|id| **id != total.attribute_identifier)
                    .filter(|id| id.as_str() != MEASURE_GROUP)
                    .filter_map(|id| attribute_index(id)),
            );
            grain.sort_unstable();
            if !grains.contains(&grain) {
                grains.push(grain);
            }
        }
    }
    grains
}
