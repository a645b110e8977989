//! Main Tukey struct and public API.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::OutlierConfig;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::input::{DataTable, Parser, ParserConfig, SourceMetadata};
use crate::outlier::{summary_rows, IntervalModel, NumericOutliers, OutlierResult};
use crate::warning::{TracingSink, WarningSink};

/// Configuration for file-based runs.
#[derive(Debug, Clone, Default)]
pub struct TukeyConfig {
    /// Parser configuration.
    pub parser: ParserConfig,
    /// Detection and treatment settings.
    pub outliers: OutlierConfig,
    /// Treat rows in this many parallel partitions (None = one batch).
    pub partitions: Option<usize>,
}

/// A detection or apply run over one input file.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Metadata about the source file.
    pub source: SourceMetadata,
    pub result: OutlierResult,
}

impl Detection {
    /// Serializable overview of the run.
    pub fn report(&self) -> DetectionReport {
        let model = &self.result.model;
        let columns = model.outlier_column_names();
        let state = &self.result.state;

        let totals = columns
            .iter()
            .map(|column| ColumnTotals {
                column: column.clone(),
                members: state.members.total(column),
                outliers: state.outliers.total(column),
                missing_group_rows: state.missing_groups.total(column),
            })
            .collect();

        let groups = summary_rows(state, &columns)
            .into_iter()
            .filter(|row| row.outliers > 0)
            .map(|row| GroupOutliers {
                column: row.column,
                group: row.group.to_string(),
                outliers: row.outliers,
                members: row.members,
                lower_bound: row.interval.map(|i| i.lower),
                upper_bound: row.interval.map(|i| i.upper),
            })
            .collect();

        DetectionReport {
            source: self.source.clone(),
            group_columns: model.group_column_names(),
            groups_in_model: model.group_count(),
            rows_out: self.result.table.row_count(),
            totals,
            groups_with_outliers: groups,
            warnings: self.result.warnings.to_vec(),
        }
    }
}

/// Overview of a run, for JSON output and terminal display.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub source: SourceMetadata,
    pub group_columns: Vec<String>,
    pub groups_in_model: usize,
    /// Rows in the treated table.
    pub rows_out: usize,
    pub totals: Vec<ColumnTotals>,
    pub groups_with_outliers: Vec<GroupOutliers>,
    pub warnings: Vec<String>,
}

impl DetectionReport {
    pub fn total_outliers(&self) -> u64 {
        self.totals.iter().map(|t| t.outliers).sum()
    }
}

/// Counts of one outlier column over all groups.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnTotals {
    pub column: String,
    pub members: u64,
    pub outliers: u64,
    /// Rows whose group was unknown to the model.
    pub missing_group_rows: u64,
}

/// A (column, group) pair with at least one outlier.
#[derive(Debug, Clone, Serialize)]
pub struct GroupOutliers {
    pub column: String,
    pub group: String,
    pub outliers: u64,
    pub members: u64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
}

/// Reads delimited files and runs outlier detection on them.
pub struct Tukey {
    config: TukeyConfig,
    parser: Parser,
    sinks: Vec<Arc<dyn WarningSink>>,
}

impl Tukey {
    /// Detection with default parsing; warnings are logged through `tracing`.
    pub fn new(outliers: OutlierConfig) -> Self {
        Self::with_config(TukeyConfig {
            outliers,
            ..TukeyConfig::default()
        })
    }

    pub fn with_config(config: TukeyConfig) -> Self {
        let parser = Parser::with_config(config.parser.clone());
        Self {
            config,
            parser,
            sinks: vec![Arc::new(TracingSink)],
        }
    }

    /// Additional warning sink, notified once per distinct message.
    pub fn with_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.config.partitions = Some(partitions);
        self
    }

    pub fn config(&self) -> &TukeyConfig {
        &self.config
    }

    /// Parse `path` into a typed table.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<(DataTable, SourceMetadata)> {
        self.parser.parse_file(path)
    }

    /// Estimate a model from `path` and treat the same rows with it.
    pub fn detect(&self, path: impl AsRef<Path>, ctx: &ExecutionContext) -> Result<Detection> {
        let (table, source) = self.load(path)?;
        let engine = self.engine()?;
        let result = match self.config.partitions {
            Some(partitions) if partitions > 1 => engine.run_partitioned(&table, partitions, ctx)?,
            _ => engine.run(&table, ctx)?,
        };
        info!(
            file = %source.file,
            outliers = result.state.outliers.entries().map(|(_, _, n)| n).sum::<u64>(),
            "detection finished"
        );
        Ok(Detection { source, result })
    }

    /// Treat `path` with a model learned earlier.
    pub fn apply(
        &self,
        path: impl AsRef<Path>,
        model: Arc<IntervalModel>,
        ctx: &ExecutionContext,
    ) -> Result<Detection> {
        let (table, source) = self.load(path)?;
        let result = crate::outlier::apply_model(
            model,
            self.config.outliers.treatment,
            &table,
            ctx,
            &self.sinks,
        )?;
        Ok(Detection { source, result })
    }

    fn engine(&self) -> Result<NumericOutliers> {
        let engine = NumericOutliers::new(self.config.outliers.clone())?;
        Ok(self
            .sinks
            .iter()
            .cloned()
            .fold(engine, |engine, sink| engine.with_sink(sink)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outlier::EstimationType;
    use crate::warning::CollectingSink;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn config() -> OutlierConfig {
        OutlierConfig::new(["value"]).with_estimation_type(EstimationType::R7)
    }

    #[test]
    fn test_detect_file() {
        let file = create_test_file("id,value\na,1\nb,2\nc,3\nd,4\ne,100\n");
        let detection = Tukey::new(config()).detect(file.path(), &ExecutionContext::new()).unwrap();

        assert_eq!(detection.source.row_count, 5);
        let report = detection.report();
        assert_eq!(report.total_outliers(), 1);
        assert_eq!(report.totals[0].members, 5);
        assert_eq!(report.groups_with_outliers.len(), 1);
        assert_eq!(report.groups_with_outliers[0].upper_bound, Some(7.0));
        assert!(detection.result.table.rows[4][1].is_missing());
    }

    #[test]
    fn test_partitioned_matches_batch() {
        let mut content = String::from("site,value\n");
        for i in 0..40 {
            content.push_str(&format!("{},{}\n", if i % 2 == 0 { "x" } else { "y" }, i % 7));
        }
        content.push_str("x,500\n");
        let file = create_test_file(&content);
        let ctx = ExecutionContext::new();

        let outliers = config().with_group_columns(["site"]);
        let batch = Tukey::new(outliers.clone()).detect(file.path(), &ctx).unwrap();
        let parallel = Tukey::new(outliers).with_partitions(4).detect(file.path(), &ctx).unwrap();

        assert_eq!(batch.result.state, parallel.result.state);
        assert_eq!(batch.result.table, parallel.result.table);
    }

    #[test]
    fn test_apply_stored_model() {
        let train = create_test_file("value\n1\n2\n3\n4\n100\n");
        let ctx = ExecutionContext::new();
        let tukey = Tukey::new(config());
        let model = tukey.detect(train.path(), &ctx).unwrap().result.model;

        let sink = CollectingSink::new();
        let other = create_test_file("value,extra\n5,0\n,1\n-50,2\n");
        let applied = Tukey::new(config())
            .with_sink(sink.clone())
            .apply(other.path(), model, &ctx)
            .unwrap();
        assert_eq!(applied.report().total_outliers(), 1);
        assert!(sink.log().is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = Tukey::new(config())
            .detect("/nonexistent/values.csv", &ExecutionContext::new())
            .unwrap_err();
        assert!(matches!(err, crate::error::TukeyError::Io { .. }));
    }
}
