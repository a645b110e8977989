//! Rank statistics and normality tests over numeric table columns.
//!
//! Distributions come from `statrs`; every routine here works on the
//! pairwise or row-wise complete observations of the selected columns.

mod correlation;
mod friedman;
mod normality;
mod rank;

pub use correlation::{
    correlation_matrix, correlation_table, spearman, spearman_p_value, CorrelationMatrix,
    CorrelationMethod, CorrelationPair, PValueAlternative,
};
pub use friedman::{friedman_table, friedman_test, FriedmanResult};
pub use normality::{
    kurtosis, normality_table, normality_tests, shapiro_francia, shapiro_wilk, NormalityReport,
    NormalityResult, NormalityTest, NOT_LEPTOKURTIC_WARNING,
};
pub use rank::average_ranks;

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};

use crate::error::Result;
use crate::outlier::resolve_outlier_columns;
use crate::schema::{ColumnSchema, TableSchema};

/// Warning raised when rows or values with missing cells are skipped.
pub const MISSING_VALUES_WARNING: &str = "Input contains missing values. They will be ignored";

/// Standard normal CDF.
pub(crate) fn normal_cdf(x: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.cdf(x),
        Err(_) => f64::NAN,
    }
}

/// Standard normal quantile.
pub(crate) fn normal_quantile(p: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(p),
        Err(_) => f64::NAN,
    }
}

/// Student-t CDF with `dof` degrees of freedom; NaN for invalid `dof`.
pub(crate) fn students_t_cdf(t: f64, dof: f64) -> f64 {
    match StudentsT::new(0.0, 1.0, dof) {
        Ok(dist) => dist.cdf(t),
        Err(_) => f64::NAN,
    }
}

/// Chi-squared distribution with `df` degrees of freedom.
pub(crate) fn chi_squared(df: f64) -> Option<ChiSquared> {
    ChiSquared::new(df).ok()
}

/// Resolve the named columns, each of which must exist and be numeric.
pub(crate) fn numeric_columns(schema: &TableSchema, names: &[String]) -> Result<Vec<ColumnSchema>> {
    resolve_outlier_columns(schema, names)
}
