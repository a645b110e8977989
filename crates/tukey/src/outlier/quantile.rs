//! Quartile estimation per group and outlier column.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::group::{GroupKey, GroupKeyIndex};
use super::model::{Interval, IntervalModel};
use super::resolve_outlier_columns;
use super::sketch::QuantileSketch;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::input::{DataTable, Row};
use crate::schema::TableSchema;

/// Default number of samples a sketch level holds before compacting.
pub const DEFAULT_SKETCH_CAPACITY: usize = 1024;

/// Default row count above which [`QuantileMethod::Auto`] switches to the sketch.
pub const DEFAULT_HEURISTIC_THRESHOLD: usize = 1_000_000;

pub const DEFAULT_SEED: u64 = 0x7c3a_91d5;

/// Percentile interpolation formulas (Hyndman and Fan, plus the legacy rule).
///
/// The naming and the clamping at the ends of the sample follow the
/// estimation types of Apache Commons Math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EstimationType {
    #[serde(rename = "legacy")]
    Legacy,
    #[serde(rename = "r1")]
    R1,
    #[serde(rename = "r2")]
    R2,
    #[serde(rename = "r3")]
    R3,
    #[serde(rename = "r4")]
    R4,
    #[serde(rename = "r5")]
    R5,
    #[default]
    #[serde(rename = "r6")]
    R6,
    #[serde(rename = "r7")]
    R7,
    #[serde(rename = "r8")]
    R8,
    #[serde(rename = "r9")]
    R9,
}

impl EstimationType {
    pub const ALL: [EstimationType; 10] = [
        EstimationType::Legacy,
        EstimationType::R1,
        EstimationType::R2,
        EstimationType::R3,
        EstimationType::R4,
        EstimationType::R5,
        EstimationType::R6,
        EstimationType::R7,
        EstimationType::R8,
        EstimationType::R9,
    ];

    /// One-based position of the `p` quantile in a sample of size `n`.
    fn index(&self, p: f64, n: usize) -> f64 {
        let n = n as f64;
        match self {
            EstimationType::Legacy => {
                if p == 0.0 {
                    0.0
                } else if p == 1.0 {
                    n
                } else {
                    p * (n + 1.0)
                }
            }
            EstimationType::R1 | EstimationType::R2 => {
                if p == 0.0 {
                    0.0
                } else {
                    n * p + 0.5
                }
            }
            EstimationType::R3 => {
                if p <= 0.5 / n {
                    0.0
                } else {
                    (n * p).round_ties_even()
                }
            }
            EstimationType::R4 => {
                if p < 1.0 / n {
                    0.0
                } else if p == 1.0 {
                    n
                } else {
                    n * p
                }
            }
            EstimationType::R5 => bounded(p, 0.5 / n, (n - 0.5) / n, n, n * p + 0.5),
            EstimationType::R6 => bounded(p, 1.0 / (n + 1.0), n / (n + 1.0), n, (n + 1.0) * p),
            EstimationType::R7 => {
                if p == 0.0 {
                    0.0
                } else if p == 1.0 {
                    n
                } else {
                    1.0 + (n - 1.0) * p
                }
            }
            EstimationType::R8 => {
                let third = 1.0 / 3.0;
                bounded(
                    p,
                    (2.0 * third) / (n + third),
                    (n - third) / (n + third),
                    n,
                    (n + third) * p + third,
                )
            }
            EstimationType::R9 => bounded(
                p,
                0.625 / (n + 0.25),
                (n - 0.375) / (n + 0.25),
                n,
                (n + 0.25) * p + 0.375,
            ),
        }
    }

    /// The `p` quantile (`0 < p <= 1`) of an ascending sample. `None` if empty.
    ///
    /// ```
    /// use tukey::EstimationType;
    ///
    /// let sorted = [1.0, 2.0, 3.0, 4.0, 100.0];
    /// assert_eq!(EstimationType::R7.quantile(&sorted, 0.25), Some(2.0));
    /// assert_eq!(EstimationType::R6.quantile(&sorted, 0.25), Some(1.5));
    /// ```
    pub fn quantile(&self, sorted: &[f64], p: f64) -> Option<f64> {
        if sorted.is_empty() {
            return None;
        }
        let pos = self.index(p, sorted.len());
        let value = match self {
            EstimationType::R1 => interpolate(sorted, (pos - 0.5).ceil()),
            EstimationType::R2 => {
                let low = interpolate(sorted, (pos - 0.5).ceil());
                let high = interpolate(sorted, (pos + 0.5).floor());
                (low + high) / 2.0
            }
            _ => interpolate(sorted, pos),
        };
        Some(value)
    }
}

fn bounded(p: f64, min_limit: f64, max_limit: f64, n: f64, index: f64) -> f64 {
    if p < min_limit {
        0.0
    } else if p >= max_limit {
        n
    } else {
        index
    }
}

/// Linear interpolation at a one-based, possibly fractional position.
fn interpolate(sorted: &[f64], pos: f64) -> f64 {
    let n = sorted.len();
    if pos < 1.0 {
        return sorted[0];
    }
    if pos >= n as f64 {
        return sorted[n - 1];
    }
    let floor = pos.floor();
    let idx = floor as usize;
    let lower = sorted[idx - 1];
    let upper = sorted[idx];
    lower + (pos - floor) * (upper - lower)
}

/// How quartiles are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantileMethod {
    /// Sort every value; memory grows with the row count.
    #[default]
    Exact,
    /// Compacting sketch; memory bounded by the sketch capacity.
    Heuristic,
    /// Exact below the heuristic threshold, sketch above it.
    Auto,
}

/// Per (group, column) value store.
#[derive(Debug, Clone)]
enum Accumulator {
    Exact(Vec<f64>),
    Sketch(QuantileSketch),
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        match self {
            Accumulator::Exact(values) => values.push(value),
            Accumulator::Sketch(sketch) => sketch.insert(value),
        }
    }

    fn quartiles(self, estimation_type: EstimationType) -> Option<(f64, f64)> {
        match self {
            Accumulator::Exact(mut values) => {
                values.sort_by(f64::total_cmp);
                Some((
                    estimation_type.quantile(&values, 0.25)?,
                    estimation_type.quantile(&values, 0.75)?,
                ))
            }
            Accumulator::Sketch(sketch) => Some((
                sketch.quantile(0.25, estimation_type)?,
                sketch.quantile(0.75, estimation_type)?,
            )),
        }
    }
}

/// Computes Q1/Q3 per group and column and turns them into an [`IntervalModel`].
#[derive(Debug, Clone)]
pub struct QuantileEstimator {
    method: QuantileMethod,
    estimation_type: EstimationType,
    iqr_multiplier: f64,
    sketch_capacity: usize,
    heuristic_threshold: usize,
    seed: u64,
}

impl QuantileEstimator {
    /// Exact R-6 estimation with the given IQR multiplier.
    pub fn new(iqr_multiplier: f64) -> Self {
        Self {
            method: QuantileMethod::Exact,
            estimation_type: EstimationType::R6,
            iqr_multiplier,
            sketch_capacity: DEFAULT_SKETCH_CAPACITY,
            heuristic_threshold: DEFAULT_HEURISTIC_THRESHOLD,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_method(mut self, method: QuantileMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_estimation_type(mut self, estimation_type: EstimationType) -> Self {
        self.estimation_type = estimation_type;
        self
    }

    pub fn with_sketch_capacity(mut self, capacity: usize) -> Self {
        self.sketch_capacity = capacity;
        self
    }

    pub fn with_heuristic_threshold(mut self, rows: usize) -> Self {
        self.heuristic_threshold = rows;
        self
    }

    /// Seed of the sketch compactors; the same seed and row order give the same model.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn iqr_multiplier(&self) -> f64 {
        self.iqr_multiplier
    }

    /// The concrete method used for an input of `row_count` rows.
    pub fn resolve_method(&self, row_count: usize) -> QuantileMethod {
        match self.method {
            QuantileMethod::Auto if row_count > self.heuristic_threshold => QuantileMethod::Heuristic,
            QuantileMethod::Auto => QuantileMethod::Exact,
            method => method,
        }
    }

    /// Estimate the model over a materialized table.
    pub fn estimate(
        &self,
        table: &DataTable,
        outlier_columns: &[String],
        group_columns: &[String],
        ctx: &ExecutionContext,
    ) -> Result<IntervalModel> {
        let method = self.resolve_method(table.row_count());
        self.estimate_rows(
            &table.schema,
            &table.rows,
            outlier_columns,
            group_columns,
            method,
            ctx,
        )
    }

    /// Estimate the model in one pass over `rows`.
    ///
    /// `QuantileMethod::Auto` is treated as exact here, since the row count
    /// is not known up front.
    pub fn estimate_rows<'a>(
        &self,
        schema: &TableSchema,
        rows: impl IntoIterator<Item = &'a Row>,
        outlier_columns: &[String],
        group_columns: &[String],
        method: QuantileMethod,
        ctx: &ExecutionContext,
    ) -> Result<IntervalModel> {
        let outliers = resolve_outlier_columns(schema, outlier_columns)?;
        let index = GroupKeyIndex::new(schema, group_columns)?;
        let rows = rows.into_iter();
        let (row_hint, _) = rows.size_hint();

        let mut accumulators: IndexMap<GroupKey, Vec<Accumulator>> = IndexMap::new();
        for (row_idx, row) in rows.enumerate() {
            ctx.check_cancelled()?;
            if row_hint > 0 {
                ctx.set_progress(row_idx as f64 / row_hint as f64, || {
                    format!("Reading row {} of {}", row_idx + 1, row_hint)
                });
            }

            let key = index.key_for(row);
            let idx = match accumulators.get_index_of(&key) {
                Some(idx) => idx,
                None => {
                    let fresh = outliers.iter().map(|_| self.accumulator(method)).collect();
                    accumulators.insert_full(key, fresh).0
                }
            };
            for (acc, column) in accumulators[idx].iter_mut().zip(&outliers) {
                match row.get(column.position).and_then(|c| c.as_f64()) {
                    Some(value) if !value.is_nan() => acc.push(value),
                    _ => {}
                }
            }
        }

        let mut model = IntervalModel::new(index.columns().to_vec(), outliers.clone());
        for (key, accs) in accumulators {
            model.add_group(key.clone());
            for (acc, column) in accs.into_iter().zip(&outliers) {
                if let Some((q1, q3)) = acc.quartiles(self.estimation_type) {
                    let interval =
                        Interval::from_quartiles(q1, q3, self.iqr_multiplier, column.column_type);
                    debug!(
                        group = %key,
                        column = %column.name,
                        q1,
                        q3,
                        lower = interval.lower,
                        upper = interval.upper,
                        "computed permitted interval"
                    );
                    model.insert(key.clone(), column.name.clone(), interval);
                }
            }
        }

        info!(
            groups = model.group_count(),
            columns = outliers.len(),
            method = ?method,
            estimation_type = ?self.estimation_type,
            "estimated interval model"
        );
        Ok(model)
    }

    fn accumulator(&self, method: QuantileMethod) -> Accumulator {
        match method {
            QuantileMethod::Heuristic => {
                Accumulator::Sketch(QuantileSketch::new(self.sketch_capacity, self.seed))
            }
            _ => Accumulator::Exact(Vec::new()),
        }
    }
}

impl Default for QuantileEstimator {
    fn default() -> Self {
        Self::new(1.5)
    }
}
