//! Rank correlation between numeric columns.
//!
//! Every column pair is computed over the rows where both cells hold a
//! number, so a missing cell only removes its row from the pairs it touches.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::rank::average_ranks;
use super::{numeric_columns, students_t_cdf};
use crate::context::ExecutionContext;
use crate::error::{Result, TukeyError};
use crate::input::DataTable;
use crate::schema::{Cell, ColumnType, TableSchema};
use crate::warning::WarningLog;

pub const FIRST_COLUMN: &str = "First column name";
pub const SECOND_COLUMN: &str = "Second column name";
pub const CORRELATION_VALUE: &str = "Correlation value";
pub const P_VALUE: &str = "p value";
pub const DEGREES_OF_FREEDOM: &str = "Degrees of freedom";

const MISSING_ROWS_WARNING: &str =
    "Rows containing missing values are ignored for the column pairs they affect";
const EMPTY_INPUT_WARNING: &str = "Empty input table! Generating missing values as correlation values.";

/// Rank correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    #[default]
    Spearman,
    KendallTauA,
    /// Tau-a corrected for ties in either variable.
    KendallTauB,
    /// Goodman and Kruskal's gamma; ignores tied pairs entirely.
    Gamma,
}

impl CorrelationMethod {
    /// Coefficient over paired complete observations; NaN when undefined.
    pub fn coefficient(&self, x: &[f64], y: &[f64]) -> f64 {
        match self {
            CorrelationMethod::Spearman => spearman(x, y),
            CorrelationMethod::KendallTauA => PairCounts::new(x, y).tau_a(),
            CorrelationMethod::KendallTauB => PairCounts::new(x, y).tau_b(),
            CorrelationMethod::Gamma => PairCounts::new(x, y).gamma(),
        }
    }

    /// Only Spearman's rho comes with a p-value.
    pub fn has_p_value(&self) -> bool {
        matches!(self, CorrelationMethod::Spearman)
    }
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CorrelationMethod::Spearman => "Spearman",
            CorrelationMethod::KendallTauA => "Kendall Tau a",
            CorrelationMethod::KendallTauB => "Kendall Tau b",
            CorrelationMethod::Gamma => "Goodman and Kruskal's gamma",
        })
    }
}

/// Alternative hypothesis of the Spearman p-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PValueAlternative {
    #[default]
    TwoSided,
    Less,
    Greater,
}

/// Correlation of one column pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationPair {
    pub first: String,
    pub second: String,
    pub coefficient: f64,
    /// Complete observations the coefficient was computed on.
    pub observations: usize,
    pub p_value: Option<f64>,
    pub degrees_of_freedom: Option<i64>,
}

/// All pairwise correlations of a column selection.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub method: CorrelationMethod,
    pub columns: Vec<String>,
    /// Upper triangle in row-major order: (0,1), (0,2), ..., (1,2), ...
    pub pairs: Vec<CorrelationPair>,
    pub warnings: WarningLog,
}

impl CorrelationMatrix {
    /// Coefficient of a column pair in either order; 1 on the diagonal.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        if a == b {
            return self.columns.iter().any(|c| c == a).then_some(1.0);
        }
        self.pairs
            .iter()
            .find(|p| (p.first == a && p.second == b) || (p.first == b && p.second == a))
            .map(|p| p.coefficient)
    }

    /// One row per pair. Undefined values become missing cells.
    pub fn to_table(&self) -> DataTable {
        let schema = TableSchema::from_pairs([
            (FIRST_COLUMN, ColumnType::String),
            (SECOND_COLUMN, ColumnType::String),
            (CORRELATION_VALUE, ColumnType::Double),
            (P_VALUE, ColumnType::Double),
            (DEGREES_OF_FREEDOM, ColumnType::Long),
        ]);
        let rows = self
            .pairs
            .iter()
            .map(|pair| {
                vec![
                    Cell::from(pair.first.as_str()),
                    Cell::from(pair.second.as_str()),
                    double_cell(pair.coefficient),
                    pair.p_value.map_or(Cell::Missing, double_cell),
                    pair.degrees_of_freedom.map_or(Cell::Missing, Cell::Long),
                ]
            })
            .collect();
        DataTable { schema, rows }
    }
}

fn double_cell(value: f64) -> Cell {
    if value.is_nan() { Cell::Missing } else { Cell::Double(value) }
}

/// Correlate every pair of `columns` in `table`.
pub fn correlation_matrix(
    table: &DataTable,
    columns: &[String],
    method: CorrelationMethod,
    alternative: PValueAlternative,
    ctx: &ExecutionContext,
) -> Result<CorrelationMatrix> {
    if columns.len() < 2 {
        return Err(TukeyError::InsufficientData(
            "correlation needs at least two columns".into(),
        ));
    }
    let resolved = numeric_columns(&table.schema, columns)?;
    info!(
        method = %method,
        columns = resolved.len(),
        rows = table.row_count(),
        "computing rank correlation"
    );

    let mut warnings = WarningLog::new();
    if table.is_empty() {
        warnings.push(EMPTY_INPUT_WARNING);
    }

    let total = resolved.len() * (resolved.len() - 1) / 2;
    let mut pairs = Vec::with_capacity(total);
    for (i, first) in resolved.iter().enumerate() {
        for second in &resolved[i + 1..] {
            ctx.check_cancelled()?;
            let (x, y) = complete_pairs(table, first.position, second.position);
            if x.len() < table.row_count() {
                warnings.push(MISSING_ROWS_WARNING);
            }

            let coefficient = method.coefficient(&x, &y);
            let (p_value, degrees_of_freedom) = if method.has_p_value() {
                (
                    Some(spearman_p_value(coefficient, x.len(), alternative)),
                    Some(x.len() as i64 - 2),
                )
            } else {
                (None, None)
            };
            debug!(first = %first.name, second = %second.name, coefficient, "pair done");

            pairs.push(CorrelationPair {
                first: first.name.clone(),
                second: second.name.clone(),
                coefficient,
                observations: x.len(),
                p_value,
                degrees_of_freedom,
            });
            ctx.set_progress(pairs.len() as f64 / total as f64, || {
                format!("Correlated {}/{} column pairs", pairs.len(), total)
            });
        }
    }

    Ok(CorrelationMatrix {
        method,
        columns: resolved.into_iter().map(|c| c.name).collect(),
        pairs,
        warnings,
    })
}

/// [`correlation_matrix`] rendered as a table.
pub fn correlation_table(
    table: &DataTable,
    columns: &[String],
    method: CorrelationMethod,
    alternative: PValueAlternative,
    ctx: &ExecutionContext,
) -> Result<(DataTable, WarningLog)> {
    let matrix = correlation_matrix(table, columns, method, alternative, ctx)?;
    Ok((matrix.to_table(), matrix.warnings))
}

fn complete_pairs(table: &DataTable, a: usize, b: usize) -> (Vec<f64>, Vec<f64>) {
    table
        .rows
        .iter()
        .filter_map(|row| {
            let x = row.get(a).and_then(Cell::as_f64)?;
            let y = row.get(b).and_then(Cell::as_f64)?;
            (!x.is_nan() && !y.is_nan()).then_some((x, y))
        })
        .unzip()
}

/// Spearman's rho: Pearson correlation of the average ranks.
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let rx = average_ranks(&x[..n]);
    let ry = average_ranks(&y[..n]);
    let mean = (n as f64 + 1.0) / 2.0;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in rx.iter().zip(&ry) {
        let (dx, dy) = (a - mean, b - mean);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx * syy).sqrt()
}

/// p-value of Spearman's rho through Student's t with `n - 2` degrees of freedom.
///
/// NaN when rho is undefined or fewer than three observations exist.
pub fn spearman_p_value(rho: f64, n: usize, alternative: PValueAlternative) -> f64 {
    let dof = n as f64 - 2.0;
    if dof <= 0.0 || rho.is_nan() {
        return f64::NAN;
    }
    let t = rho * (dof / ((rho + 1.0) * (1.0 - rho))).sqrt();
    if t.is_nan() {
        return 0.0;
    }
    let cdf = |t: f64| {
        if t == f64::INFINITY {
            1.0
        } else if t == f64::NEG_INFINITY {
            0.0
        } else {
            students_t_cdf(t, dof)
        }
    };
    match alternative {
        PValueAlternative::TwoSided => 2.0 * (1.0 - cdf(t.abs())),
        PValueAlternative::Less => cdf(t),
        PValueAlternative::Greater => 1.0 - cdf(t),
    }
}

/// Pair classification behind the Kendall family of coefficients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PairCounts {
    n: usize,
    concordant: u64,
    discordant: u64,
    /// Tied in x only.
    ties_x: u64,
    /// Tied in y only.
    ties_y: u64,
    ties_both: u64,
}

impl PairCounts {
    fn new(x: &[f64], y: &[f64]) -> Self {
        let n = x.len().min(y.len());
        let mut counts = PairCounts {
            n,
            ..Self::default()
        };
        for i in 0..n {
            for j in i + 1..n {
                let dx = x[i] - x[j];
                let dy = y[i] - y[j];
                match (dx == 0.0, dy == 0.0) {
                    (true, true) => counts.ties_both += 1,
                    (true, false) => counts.ties_x += 1,
                    (false, true) => counts.ties_y += 1,
                    (false, false) if (dx > 0.0) == (dy > 0.0) => counts.concordant += 1,
                    (false, false) => counts.discordant += 1,
                }
            }
        }
        counts
    }

    fn score(&self) -> f64 {
        self.concordant as f64 - self.discordant as f64
    }

    fn total_pairs(&self) -> f64 {
        let n = self.n as f64;
        n * (n - 1.0) / 2.0
    }

    fn tau_a(&self) -> f64 {
        let n0 = self.total_pairs();
        if n0 == 0.0 { f64::NAN } else { self.score() / n0 }
    }

    fn tau_b(&self) -> f64 {
        let n0 = self.total_pairs();
        let n1 = (self.ties_x + self.ties_both) as f64;
        let n2 = (self.ties_y + self.ties_both) as f64;
        let denominator = ((n0 - n1) * (n0 - n2)).sqrt();
        if denominator == 0.0 { f64::NAN } else { self.score() / denominator }
    }

    fn gamma(&self) -> f64 {
        let untied = (self.concordant + self.discordant) as f64;
        if untied == 0.0 { f64::NAN } else { self.score() / untied }
    }
}
