//! Friedman rank test for differences between three or more related columns.

use serde::Serialize;
use statrs::distribution::ContinuousCDF;
use tracing::{info, warn};

use super::rank::average_ranks;
use super::{chi_squared, numeric_columns, MISSING_VALUES_WARNING};
use crate::context::ExecutionContext;
use crate::error::{Result, TukeyError};
use crate::input::DataTable;
use crate::schema::{Cell, ColumnType, TableSchema};
use crate::warning::WarningLog;

pub const REJECT_H0: &str = "Reject H0";
pub const Q_STATISTIC: &str = "Q";
pub const CRITICAL_VALUE: &str = "Critical ChiSq Value";
pub const P_VALUE: &str = "p-Value";

/// Outcome of a Friedman test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FriedmanResult {
    pub columns: Vec<String>,
    /// Rows with a value in every column.
    pub rows: usize,
    pub alpha: f64,
    pub degrees_of_freedom: usize,
    pub q: f64,
    /// Chi-squared quantile at `1 - alpha`.
    pub critical_value: f64,
    pub p_value: f64,
    pub reject: bool,
    #[serde(skip)]
    pub warnings: WarningLog,
}

impl FriedmanResult {
    /// Single-row table: reject flag, Q, critical value, p-value.
    pub fn to_table(&self) -> DataTable {
        let schema = TableSchema::from_pairs([
            (REJECT_H0, ColumnType::Boolean),
            (Q_STATISTIC, ColumnType::Double),
            (CRITICAL_VALUE, ColumnType::Double),
            (P_VALUE, ColumnType::Double),
        ]);
        let row = vec![
            Cell::Bool(self.reject),
            Cell::Double(self.q),
            Cell::Double(self.critical_value),
            Cell::Double(self.p_value),
        ];
        DataTable {
            schema,
            rows: vec![row],
        }
    }
}

/// Run the Friedman test over `columns`, each row being one block.
///
/// Rows are ranked with average ties. Q is compared against a chi-squared
/// distribution with `k - 1` degrees of freedom; rows with a missing cell
/// are skipped.
pub fn friedman_test(
    table: &DataTable,
    columns: &[String],
    alpha: f64,
    ctx: &ExecutionContext,
) -> Result<FriedmanResult> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(TukeyError::Config(format!(
            "The significance level must be between 0 and 1 (is: {})",
            alpha
        )));
    }
    let k = columns.len();
    if k < 3 {
        return Err(TukeyError::InsufficientData(format!(
            "The Friedman test needs at least 3 columns (is: {})",
            k
        )));
    }
    let resolved = numeric_columns(&table.schema, columns)?;
    let mut warnings = WarningLog::new();
    if k <= 4 {
        warnings.push(format!(
            "The resulting test statistic Q has a Chi-squared probability distribution only for more than 4 columns (is: {}).",
            k
        ));
    }

    let mut ranked: Vec<Vec<f64>> = Vec::with_capacity(table.row_count());
    let total = table.row_count().max(1) as f64;
    for (i, row) in table.rows.iter().enumerate() {
        ctx.check_cancelled()?;
        let values: Option<Vec<f64>> = resolved
            .iter()
            .map(|c| row.get(c.position).and_then(Cell::as_f64).filter(|v| !v.is_nan()))
            .collect();
        match values {
            Some(values) => ranked.push(average_ranks(&values)),
            None => {
                warnings.push(MISSING_VALUES_WARNING);
            }
        }
        ctx.set_progress((i + 1) as f64 / total, || format!("Ranked {} rows", i + 1));
    }

    let n = ranked.len();
    if n == 0 {
        return Err(TukeyError::EmptyData(
            "no row has a value in every selected column".into(),
        ));
    }
    if n <= 15 {
        warnings.push(format!(
            "The resulting test statistic Q has a Chi-squared probability distribution only for more than 15 rows (is: {}).",
            n
        ));
    }

    let n_f = n as f64;
    let mut column_means = vec![0.0; k];
    for ranks in &ranked {
        for (mean, r) in column_means.iter_mut().zip(ranks) {
            *mean += r;
        }
    }
    column_means.iter_mut().for_each(|m| *m /= n_f);
    let grand_mean = column_means.iter().sum::<f64>() / k as f64;

    let sst = n_f * column_means.iter().map(|m| (m - grand_mean).powi(2)).sum::<f64>();
    let sse = ranked
        .iter()
        .flatten()
        .map(|r| (r - grand_mean).powi(2))
        .sum::<f64>()
        / (n_f * (k - 1) as f64);
    let q = sst / sse;

    let df = k - 1;
    let (critical_value, p_value) = match chi_squared(df as f64) {
        // all rows fully tied: Q is undefined
        Some(dist) if q.is_nan() => (dist.inverse_cdf(1.0 - alpha), f64::NAN),
        Some(dist) => (dist.inverse_cdf(1.0 - alpha), 1.0 - dist.cdf(q)),
        None => (f64::NAN, f64::NAN),
    };
    let reject = p_value < alpha;

    for message in warnings.messages() {
        warn!(target: "tukey::warning", "{}", message);
    }
    info!(k, n, q, p_value, reject, "friedman test done");

    Ok(FriedmanResult {
        columns: resolved.into_iter().map(|c| c.name).collect(),
        rows: n,
        alpha,
        degrees_of_freedom: df,
        q,
        critical_value,
        p_value,
        reject,
        warnings,
    })
}

/// [`friedman_test`] rendered as a table.
pub fn friedman_table(
    table: &DataTable,
    columns: &[String],
    alpha: f64,
    ctx: &ExecutionContext,
) -> Result<(DataTable, WarningLog)> {
    let result = friedman_test(table, columns, alpha, ctx)?;
    Ok((result.to_table(), result.warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[[Option<f64>; 3]]) -> DataTable {
        let schema = TableSchema::from_pairs([
            ("a", ColumnType::Double),
            ("b", ColumnType::Double),
            ("c", ColumnType::Double),
        ]);
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|v| v.map_or(Cell::Missing, Cell::Double)).collect())
            .collect();
        DataTable::new(schema, rows).unwrap()
    }

    fn abc() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn test_consistent_ordering() {
        let data = table(&[
            [Some(1.0), Some(2.0), Some(3.0)],
            [Some(4.0), Some(5.0), Some(9.0)],
            [Some(0.5), Some(0.6), Some(0.7)],
            [Some(10.0), Some(20.0), Some(30.0)],
        ]);
        let result = friedman_test(&data, &abc(), 0.05, &ExecutionContext::new()).unwrap();

        // 12 / (n k (k + 1)) * sum(R^2) - 3 n (k + 1) = 56 - 48
        assert!((result.q - 8.0).abs() < 1e-12);
        assert_eq!(result.degrees_of_freedom, 2);
        // chi2(2) survival is exp(-x / 2)
        assert!((result.p_value - (-4.0f64).exp()).abs() < 1e-9);
        assert!((result.critical_value - (-2.0 * 0.05f64.ln())).abs() < 1e-4);
        assert!(result.reject);
        assert_eq!(result.warnings.len(), 2);

        let out = result.to_table();
        assert_eq!(out.headers(), vec![REJECT_H0, Q_STATISTIC, CRITICAL_VALUE, P_VALUE]);
        assert_eq!(out.rows[0][0], Cell::Bool(true));
    }

    #[test]
    fn test_ties_and_missing_rows() {
        let data = table(&[
            [Some(1.0), Some(1.0), Some(2.0)],
            [Some(3.0), None, Some(1.0)],
            [Some(2.0), Some(1.0), Some(3.0)],
        ]);
        let result = friedman_test(&data, &abc(), 0.05, &ExecutionContext::new()).unwrap();
        assert_eq!(result.rows, 2);
        assert!(result.warnings.contains(MISSING_VALUES_WARNING));

        // ranks [1.5, 1.5, 3] and [2, 1, 3]; means 1.75, 1.25, 3; grand mean 2
        // sst = 2 * (0.0625 + 0.5625 + 1) = 3.25; sse = (0.25+0.25+1+0+1+1) / 4 = 0.875
        assert!((result.q - 3.25 / 0.875).abs() < 1e-12);
        assert!(!result.reject);
    }

    #[test]
    fn test_identical_columns_do_not_reject() {
        let data = table(&[[Some(1.0), Some(1.0), Some(1.0)]; 20]);
        let result = friedman_test(&data, &abc(), 0.05, &ExecutionContext::new()).unwrap();
        assert!(result.q.is_nan());
        assert!(!result.reject);
        // n > 15: only the column count warning remains
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_preconditions() {
        let data = table(&[[Some(1.0), Some(2.0), Some(3.0)]]);
        let ctx = ExecutionContext::new();
        let two = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(
            friedman_test(&data, &two, 0.05, &ctx),
            Err(TukeyError::InsufficientData(_))
        ));
        assert!(matches!(
            friedman_test(&data, &abc(), 1.5, &ctx),
            Err(TukeyError::Config(_))
        ));

        let missing = table(&[[None, Some(2.0), Some(3.0)]]);
        assert!(matches!(
            friedman_test(&missing, &abc(), 0.05, &ctx),
            Err(TukeyError::EmptyData(_))
        ));
    }

    #[test]
    fn test_cancelled() {
        let ctx = ExecutionContext::new();
        ctx.cancel();
        let data = table(&[[Some(1.0), Some(2.0), Some(3.0)]]);
        assert!(matches!(
            friedman_test(&data, &abc(), 0.05, &ctx),
            Err(TukeyError::Cancelled)
        ));
    }
}
