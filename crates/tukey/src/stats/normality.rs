//! Shapiro-Wilk and Shapiro-Francia normality tests.
//!
//! Shapiro-Wilk uses Royston's (1992) approximation of the coefficients
//! and of the null distribution of W. Shapiro-Francia is only applied to
//! leptokurtic samples; for the others Shapiro-Wilk is used instead.

use std::cmp::Ordering;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{normal_cdf, normal_quantile, numeric_columns, MISSING_VALUES_WARNING};
use crate::context::ExecutionContext;
use crate::error::{Result, TukeyError};
use crate::input::DataTable;
use crate::schema::{Cell, ColumnType, TableSchema};
use crate::warning::WarningLog;

pub const TESTED_COLUMN: &str = "Column";
pub const REJECT_H0: &str = "Reject H0";
pub const TEST_STATISTIC: &str = "Test Statistic (W)";
pub const P_VALUE: &str = "p-Value";

pub const NOT_LEPTOKURTIC_WARNING: &str =
    "Some samples are not leptokurtic, Shapiro-Wilk is used instead";
const INACCURATE_WARNING: &str =
    "The test might be inaccurate for data sets with more than 50 data points.";

/// Minimum sample size of both tests.
pub const MIN_SAMPLES: usize = 3;
const INACCURATE_ROWS: usize = 50;
const MAX_ROWS: usize = 5000;

// Royston's polynomial coefficients, lowest order first
const C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];
const AN: [f64; 5] = [0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
const AN1: [f64; 5] = [0.042981, -0.293762, -1.752461, 5.682633, -3.582633];

/// Which test produced a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalityTest {
    ShapiroWilk,
    ShapiroFrancia,
}

/// Normality test outcome for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalityResult {
    pub column: String,
    pub test: NormalityTest,
    /// Non-missing values tested.
    pub samples: usize,
    pub statistic: f64,
    pub p_value: f64,
    pub reject: bool,
}

/// Results for all tested columns, in selection order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalityReport {
    pub results: Vec<NormalityResult>,
    pub warnings: WarningLog,
}

impl NormalityReport {
    pub fn to_table(&self) -> DataTable {
        let schema = TableSchema::from_pairs([
            (TESTED_COLUMN, ColumnType::String),
            (REJECT_H0, ColumnType::Boolean),
            (TEST_STATISTIC, ColumnType::Double),
            (P_VALUE, ColumnType::Double),
        ]);
        let rows = self
            .results
            .iter()
            .map(|r| {
                vec![
                    Cell::from(r.column.as_str()),
                    Cell::Bool(r.reject),
                    Cell::Double(r.statistic),
                    Cell::Double(r.p_value),
                ]
            })
            .collect();
        DataTable { schema, rows }
    }
}

fn ascending(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

fn sum_of_squares(values: &[f64]) -> f64 {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum()
}

/// Evaluates `c[0] + c[1] x + c[2] x^2 + ...`.
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, coefficient| acc * x + coefficient)
}

/// Blom scores: expected normal order statistics of a sample of `n`.
fn blom_scores(n: usize) -> Vec<f64> {
    (1..=n)
        .map(|i| normal_quantile((i as f64 - 0.375) / (n as f64 + 0.25)))
        .collect()
}

fn check_samples(values: &[f64]) -> Result<()> {
    if values.len() < MIN_SAMPLES {
        return Err(TukeyError::InsufficientData(
            "Not enough data points to calculate the statistic.".into(),
        ));
    }
    Ok(())
}

/// Royston's Shapiro-Wilk coefficients for a sample of `n >= 3`, ascending.
fn shapiro_wilk_coefficients(n: usize) -> Vec<f64> {
    if n == 3 {
        return vec![-FRAC_1_SQRT_2, 0.0, FRAC_1_SQRT_2];
    }
    let m = blom_scores(n);
    let ss_m: f64 = m.iter().map(|v| v * v).sum();
    let root = ss_m.sqrt();
    let u = 1.0 / (n as f64).sqrt();

    let an = m[n - 1] / root + u * poly(&AN, u);
    let mut a = vec![0.0; n];
    a[n - 1] = an;
    a[0] = -an;

    let middle = if n >= 6 {
        let an1 = m[n - 2] / root + u * poly(&AN1, u);
        a[n - 2] = an1;
        a[1] = -an1;
        let phi = (ss_m - 2.0 * m[n - 1].powi(2) - 2.0 * m[n - 2].powi(2))
            / (1.0 - 2.0 * an.powi(2) - 2.0 * an1.powi(2));
        (2..n - 2, phi)
    } else {
        let phi = (ss_m - 2.0 * m[n - 1].powi(2)) / (1.0 - 2.0 * an.powi(2));
        (1..n - 1, phi)
    };
    let (range, phi) = middle;
    let scale = phi.sqrt();
    for i in range {
        a[i] = m[i] / scale;
    }
    a
}

/// Upper-tail probability of W under normality.
fn shapiro_wilk_p_value(w: f64, n: usize) -> f64 {
    if n == 3 {
        // exact: (6 / pi) (asin(sqrt(W)) - asin(sqrt(3 / 4)))
        return (6.0 / PI * ((w.sqrt()).asin() - (PI / 3.0))).max(0.0);
    }
    let n_f = n as f64;
    let mut y = (1.0 - w).ln();
    let (m, s) = if n <= 11 {
        let gamma = poly(&G, n_f);
        if y >= gamma {
            return f64::MIN_POSITIVE;
        }
        y = -(gamma - y).ln();
        (poly(&C3, n_f), poly(&C4, n_f).exp())
    } else {
        let ln_n = n_f.ln();
        (poly(&C5, ln_n), poly(&C6, ln_n).exp())
    };
    1.0 - normal_cdf((y - m) / s)
}

/// Shapiro-Wilk W and its p-value. Needs at least three values; a sample
/// without spread has an undefined statistic (NaN).
pub fn shapiro_wilk(values: &[f64]) -> Result<(f64, f64)> {
    check_samples(values)?;
    let sorted = ascending(values);
    let ss = sum_of_squares(&sorted);
    if ss == 0.0 {
        return Ok((f64::NAN, f64::NAN));
    }
    let a = shapiro_wilk_coefficients(sorted.len());
    let weighted: f64 = a.iter().zip(&sorted).map(|(a, x)| a * x).sum();
    let w = (weighted * weighted / ss).min(1.0);
    Ok((w, shapiro_wilk_p_value(w, sorted.len())))
}

/// Shapiro-Francia W' and its p-value (Royston 1993).
pub fn shapiro_francia(values: &[f64]) -> Result<(f64, f64)> {
    check_samples(values)?;
    let sorted = ascending(values);
    let ss = sum_of_squares(&sorted);
    if ss == 0.0 {
        return Ok((f64::NAN, f64::NAN));
    }
    let m = blom_scores(sorted.len());
    let root = m.iter().map(|v| v * v).sum::<f64>().sqrt();
    let weighted: f64 = m.iter().zip(&sorted).map(|(m, x)| m / root * x).sum();
    let w = (weighted * weighted / ss).min(1.0);

    let u = (sorted.len() as f64).ln();
    let v = u.ln();
    let mu = -1.2725 + 1.0521 * (v - u);
    let sigma = 1.0308 - 0.26758 * (v + 2.0 / u);
    let p = 1.0 - normal_cdf(((1.0 - w).ln() - mu) / sigma);
    Ok((w, p))
}

/// Non-excess kurtosis `m4 / m2^2`; a normal sample is close to 3.
pub fn kurtosis(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let (m2, m4) = values.iter().fold((0.0, 0.0), |(m2, m4), v| {
        let d2 = (v - mean).powi(2);
        (m2 + d2, m4 + d2 * d2)
    });
    (m4 / n) / (m2 / n).powi(2)
}

/// Test every column in `columns` for normality at level `alpha`.
///
/// With `francia` set, leptokurtic columns use Shapiro-Francia. Missing
/// cells are ignored with a warning. An empty table gives an empty report.
pub fn normality_tests(
    table: &DataTable,
    columns: &[String],
    alpha: f64,
    francia: bool,
    ctx: &ExecutionContext,
) -> Result<NormalityReport> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(TukeyError::Config(format!(
            "The significance level must be between 0 and 1 (is: {})",
            alpha
        )));
    }
    if columns.is_empty() {
        return Err(TukeyError::Config("Please select at least one test column.".into()));
    }
    let resolved = numeric_columns(&table.schema, columns)?;

    let mut report = NormalityReport::default();
    if table.is_empty() {
        return Ok(report);
    }
    if table.row_count() > MAX_ROWS {
        return Err(TukeyError::Config(format!(
            "The test is not applicable for data sets with more than {} data points.",
            MAX_ROWS
        )));
    }
    if table.row_count() > INACCURATE_ROWS {
        report.warnings.push(INACCURATE_WARNING);
    }
    info!(columns = resolved.len(), rows = table.row_count(), francia, "testing normality");

    for (i, column) in resolved.iter().enumerate() {
        ctx.check_cancelled()?;
        let values: Vec<f64> = table
            .numeric_values(column.position)
            .into_iter()
            .filter(|v| !v.is_nan())
            .collect();
        if values.len() < table.row_count() {
            report.warnings.push(MISSING_VALUES_WARNING);
        }
        if values.len() < MIN_SAMPLES {
            return Err(TukeyError::InsufficientData(format!(
                "Not enough data points in column '{}' to calculate the statistic.",
                column.name
            )));
        }

        let leptokurtic = francia && kurtosis(&values) > 3.0;
        if francia && !leptokurtic {
            report.warnings.push(NOT_LEPTOKURTIC_WARNING);
        }
        let (test, (statistic, p_value)) = if leptokurtic {
            (NormalityTest::ShapiroFrancia, shapiro_francia(&values)?)
        } else {
            (NormalityTest::ShapiroWilk, shapiro_wilk(&values)?)
        };
        debug!(column = %column.name, ?test, statistic, p_value, "column tested");

        report.results.push(NormalityResult {
            column: column.name.clone(),
            test,
            samples: values.len(),
            statistic,
            p_value,
            reject: p_value < alpha,
        });
        ctx.set_progress((i + 1) as f64 / resolved.len() as f64, || {
            format!("Tested column {}", column.name)
        });
    }
    Ok(report)
}

/// [`normality_tests`] rendered as a table.
pub fn normality_table(
    table: &DataTable,
    columns: &[String],
    alpha: f64,
    francia: bool,
    ctx: &ExecutionContext,
) -> Result<(DataTable, WarningLog)> {
    let report = normality_tests(table, columns, alpha, francia, ctx)?;
    Ok((report.to_table(), report.warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_table(columns: &[(&str, Vec<Option<f64>>)]) -> DataTable {
        let schema =
            TableSchema::from_pairs(columns.iter().map(|(name, _)| (*name, ColumnType::Double)));
        let rows = (0..columns[0].1.len())
            .map(|i| {
                columns
                    .iter()
                    .map(|(_, values)| values[i].map_or(Cell::Missing, Cell::Double))
                    .collect()
            })
            .collect();
        DataTable::new(schema, rows).unwrap()
    }

    fn normal_sample(n: usize) -> Vec<f64> {
        (1..=n)
            .map(|i| 10.0 + 2.0 * normal_quantile((i as f64 - 0.5) / n as f64))
            .collect()
    }

    #[test]
    fn test_poly_lowest_order_first() {
        assert_eq!(poly(&[1.0, 2.0, 3.0], 2.0), 17.0);
    }

    #[test]
    fn test_three_evenly_spaced_values() {
        let (w, p) = shapiro_wilk(&[3.0, 1.0, 2.0]).unwrap();
        assert!((w - 1.0).abs() < 1e-9);
        assert!((p - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_coefficients_are_antisymmetric_unit_vector() {
        for n in [4, 5, 6, 11, 12, 40] {
            let a = shapiro_wilk_coefficients(n);
            let norm: f64 = a.iter().map(|v| v * v).sum();
            assert!((norm - 1.0).abs() < 1e-3, "n = {}: {}", n, norm);
            for i in 0..n {
                assert!((a[i] + a[n - 1 - i]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_normal_sample_is_accepted() {
        for n in [8, 30] {
            let (w, p) = shapiro_wilk(&normal_sample(n)).unwrap();
            assert!(w > 0.95 && w <= 1.0);
            assert!(p > 0.5, "n = {}: p = {}", n, p);
        }
    }

    #[test]
    fn test_skewed_sample_is_rejected() {
        let skewed: Vec<f64> = (1..=20).map(|i| (i as f64).exp()).collect();
        let (w, p) = shapiro_wilk(&skewed).unwrap();
        assert!(w < 0.8);
        assert!(p < 0.01);
    }

    #[test]
    fn test_degenerate_samples() {
        assert!(matches!(shapiro_wilk(&[1.0, 2.0]), Err(TukeyError::InsufficientData(_))));
        let (w, p) = shapiro_wilk(&[4.0; 5]).unwrap();
        assert!(w.is_nan() && p.is_nan());
    }

    #[test]
    fn test_kurtosis() {
        let uniform: Vec<f64> = (1..=10).map(f64::from).collect();
        assert!(kurtosis(&uniform) < 3.0);
        let peaked = [-10.0, -1.0, -0.5, -0.2, -0.1, 0.0, 0.0, 0.0, 0.1, 0.2, 0.5, 1.0, 10.0];
        assert!(kurtosis(&peaked) > 6.0);
    }

    #[test]
    fn test_francia_only_for_leptokurtic_columns() {
        let peaked = vec![-10.0, -1.0, -0.5, -0.2, -0.1, 0.0, 0.0, 0.0, 0.1, 0.2, 0.5, 1.0, 10.0];
        let flat: Vec<f64> = (1..=13).map(f64::from).collect();
        let table = column_table(&[
            ("peaked", peaked.into_iter().map(Some).collect()),
            ("flat", flat.into_iter().map(Some).collect()),
        ]);
        let columns = vec!["peaked".to_string(), "flat".to_string()];

        let report = normality_tests(&table, &columns, 0.05, true, &ExecutionContext::new()).unwrap();
        assert_eq!(report.results[0].test, NormalityTest::ShapiroFrancia);
        assert!(report.results[0].reject);
        assert_eq!(report.results[1].test, NormalityTest::ShapiroWilk);
        assert!(!report.results[1].reject);
        assert!(report.warnings.contains(NOT_LEPTOKURTIC_WARNING));

        let plain = normality_tests(&table, &columns, 0.05, false, &ExecutionContext::new()).unwrap();
        assert!(plain.results.iter().all(|r| r.test == NormalityTest::ShapiroWilk));
        assert!(plain.warnings.is_empty());
    }

    #[test]
    fn test_missing_values_are_ignored() {
        let table = column_table(&[("v", vec![Some(1.0), None, Some(2.0), Some(4.0), Some(3.0)])]);
        let report =
            normality_tests(&table, &["v".to_string()], 0.05, false, &ExecutionContext::new()).unwrap();
        assert_eq!(report.results[0].samples, 4);
        assert!(report.warnings.contains(MISSING_VALUES_WARNING));

        let out = report.to_table();
        assert_eq!(out.headers(), vec![TESTED_COLUMN, REJECT_H0, TEST_STATISTIC, P_VALUE]);
        assert_eq!(out.rows[0][0], Cell::from("v"));
    }

    #[test]
    fn test_table_preconditions() {
        let ctx = ExecutionContext::new();
        let table = column_table(&[("v", vec![Some(1.0), None, Some(2.0)])]);
        let v = vec!["v".to_string()];
        assert!(matches!(
            normality_tests(&table, &v, 0.05, false, &ctx),
            Err(TukeyError::InsufficientData(_))
        ));
        assert!(matches!(normality_tests(&table, &[], 0.05, false, &ctx), Err(TukeyError::Config(_))));
        assert!(matches!(normality_tests(&table, &v, 0.0, false, &ctx), Err(TukeyError::Config(_))));

        let empty = DataTable::empty(table.schema.clone());
        assert!(normality_tests(&empty, &v, 0.05, false, &ctx).unwrap().results.is_empty());
    }
}
