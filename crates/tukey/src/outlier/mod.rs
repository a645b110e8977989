//! Group-aware IQR outlier detection and treatment.
//!
//! Estimation learns an [`IntervalModel`] of permitted intervals per group
//! and column; the [`OutlierReviser`] then treats rows against it in a
//! single pass, producing the counts behind the summary table.

pub mod codec;
mod counter;
mod domain;
mod group;
mod model;
mod options;
mod pipeline;
mod quantile;
mod reviser;
mod sketch;
pub mod summary;

pub use counter::MemberCounter;
pub use domain::DomainTracker;
pub use group::{GroupKey, GroupKeyIndex};
pub use model::{Interval, IntervalModel};
pub use options::{DetectionScope, ReplacementStrategy, TreatmentAction, TreatmentOptions};
pub use pipeline::{
    apply_model, NumericOutliers, OutlierResult, EMPTY_TABLE_WARNING, UNKNOWN_GROUP_WARNING,
};
pub use quantile::{
    EstimationType, QuantileEstimator, QuantileMethod, DEFAULT_HEURISTIC_THRESHOLD, DEFAULT_SEED,
    DEFAULT_SKETCH_CAPACITY,
};
pub use reviser::{OutlierReviser, PartitionState};
pub use sketch::QuantileSketch;
pub use summary::{build_summary, summary_rows, SummaryRow};

use crate::error::{Result, TukeyError};
use crate::schema::{ColumnSchema, TableSchema};

pub(crate) const UNSUPPORTED_TYPE_MESSAGE: &str =
    "Only cells of type double, integer, and long are supported";

/// Look up the outlier columns in `schema`; each must exist and be numeric.
pub(crate) fn resolve_outlier_columns(
    schema: &TableSchema,
    names: &[String],
) -> Result<Vec<ColumnSchema>> {
    names
        .iter()
        .map(|name| {
            let column = schema.require(name)?;
            if !column.column_type.is_numeric() {
                return Err(TukeyError::UnsupportedColumnType {
                    column: name.clone(),
                    found: column.column_type,
                    message: UNSUPPORTED_TYPE_MESSAGE.into(),
                });
            }
            Ok(column.clone())
        })
        .collect()
}
