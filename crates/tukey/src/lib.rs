//! Tukey: group-aware IQR outlier detection and treatment for tabular data.
//!
//! Values outside `[Q1 - k * IQR, Q3 + k * IQR]` of their group are
//! outliers. They can be replaced (by a missing value or the nearest
//! bound) or their rows filtered out or kept exclusively. The learned
//! interval model can be stored and applied to other tables.
//!
//! # Core Principles
//!
//! - **Group-aware**: quartiles are computed per combination of group values
//! - **Single pass treatment**: counts for the summary are collected while rows stream through
//! - **Mergeable state**: partitions treat rows independently and merge their counters
//!
//! # Example
//!
//! ```no_run
//! use tukey::{ExecutionContext, OutlierConfig, Tukey};
//!
//! let config = OutlierConfig::new(["weight"]).with_group_columns(["species"]);
//! let detection = Tukey::new(config)
//!     .detect("measurements.csv", &ExecutionContext::new())
//!     .unwrap();
//!
//! println!("Outliers: {}", detection.report().total_outliers());
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod inference;
pub mod input;
pub mod logging;
pub mod outlier;
pub mod output;
pub mod schema;
pub mod stats;
pub mod warning;

mod tukey;

pub use crate::tukey::{ColumnTotals, Detection, DetectionReport, GroupOutliers, Tukey, TukeyConfig};
pub use config::OutlierConfig;
pub use context::{ExecutionContext, RowSink};
pub use error::{Result, TukeyError};
pub use input::{DataTable, Parser, ParserConfig, Row, SourceMetadata};
pub use outlier::{
    DetectionScope, EstimationType, IntervalModel, NumericOutliers, OutlierResult,
    QuantileMethod, ReplacementStrategy, TreatmentAction, TreatmentOptions,
};
pub use output::{OutputFormat, TableWriter};
pub use schema::{Cell, ColumnSchema, ColumnType, Domain, TableSchema};
pub use warning::{WarningLog, WarningSink};
