//! Estimate, treat, summarize.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use super::model::IntervalModel;
use super::options::TreatmentOptions;
use super::reviser::{OutlierReviser, PartitionState};
use super::summary::build_summary;
use super::resolve_outlier_columns;
use crate::config::OutlierConfig;
use crate::context::ExecutionContext;
use crate::error::{Result, TukeyError};
use crate::input::{DataTable, Row};
use crate::schema::TableSchema;
use crate::warning::{WarningLog, WarningSink};

pub const EMPTY_TABLE_WARNING: &str = "Node created an empty data table";
pub const UNKNOWN_GROUP_WARNING: &str =
    "Some rows belong to groups unknown to the model and were not treated";

/// Output of a detection or apply run.
#[derive(Debug, Clone)]
pub struct OutlierResult {
    /// Treated rows, with refreshed domains when domain updating is on.
    pub table: DataTable,
    pub summary: DataTable,
    pub model: Arc<IntervalModel>,
    pub warnings: WarningLog,
    /// Merged counters, ready for [`super::codec::encode_state`].
    pub state: PartitionState,
}

/// Numeric outlier detection over a table.
pub struct NumericOutliers {
    config: OutlierConfig,
    sinks: Vec<Arc<dyn WarningSink>>,
}

impl NumericOutliers {
    /// Fails on configuration errors that do not depend on the input.
    pub fn new(config: OutlierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sinks: Vec::new(),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn config(&self) -> &OutlierConfig {
        &self.config
    }

    /// Check the configuration against an input schema.
    ///
    /// Returns the group columns actually used: those that are also outlier
    /// columns are dropped.
    pub fn validate(&self, schema: &TableSchema) -> Result<Vec<String>> {
        self.config.validate()?;
        resolve_outlier_columns(schema, &self.config.outlier_columns)?;
        let groups = self.config.effective_group_columns();
        for name in &groups {
            schema.require(name)?;
        }
        Ok(groups)
    }

    /// Learn the interval model of `table`.
    pub fn estimate(&self, table: &DataTable, ctx: &ExecutionContext) -> Result<IntervalModel> {
        let groups = self.validate(&table.schema)?;
        self.config
            .estimator()
            .estimate(table, &self.config.outlier_columns, &groups, ctx)
    }

    /// Batch run: estimate, treat every row, build the summary.
    pub fn run(&self, table: &DataTable, ctx: &ExecutionContext) -> Result<OutlierResult> {
        let model = Arc::new(self.estimate(table, ctx)?);
        let reviser = self.reviser(model, &table.schema)?;
        let mut rows = Vec::with_capacity(table.row_count());
        let state = reviser.treat(&table.rows, &mut rows, ctx)?;
        info!(rows = table.row_count(), emitted = rows.len(), "outlier treatment finished");
        Ok(finish(&reviser, state, rows, &table.schema))
    }

    /// Treat `partitions` contiguous row ranges in parallel and merge their states.
    ///
    /// The model is estimated up front over the whole table. Rows keep their
    /// input order and the result equals that of [`NumericOutliers::run`].
    pub fn run_partitioned(
        &self,
        table: &DataTable,
        partitions: usize,
        ctx: &ExecutionContext,
    ) -> Result<OutlierResult> {
        let model = Arc::new(self.estimate(table, ctx)?);
        let reviser = self.reviser(Arc::clone(&model), &table.schema)?;
        let chunk = table.row_count().div_ceil(partitions.max(1)).max(1);

        let treated = table
            .rows
            .par_chunks(chunk)
            .map(|rows| {
                let mut out = Vec::with_capacity(rows.len());
                let state = reviser.treat(rows, &mut out, ctx)?;
                Ok((out, state))
            })
            .collect::<Result<Vec<(Vec<Row>, PartitionState)>>>()?;

        let state = PartitionState::merge(model, treated.iter().map(|(_, state)| state));
        let rows: Vec<Row> = treated.into_iter().flat_map(|(rows, _)| rows).collect();
        info!(
            rows = table.row_count(),
            emitted = rows.len(),
            partitions = table.row_count().div_ceil(chunk),
            "partitioned outlier treatment finished"
        );
        Ok(finish(&reviser, state, rows, &table.schema))
    }

    /// Treat `table` with a stored model, using this run's treatment options.
    pub fn apply(
        &self,
        model: Arc<IntervalModel>,
        table: &DataTable,
        ctx: &ExecutionContext,
    ) -> Result<OutlierResult> {
        apply_model(model, self.config.treatment, table, ctx, &self.sinks)
    }

    fn reviser(&self, model: Arc<IntervalModel>, schema: &TableSchema) -> Result<OutlierReviser> {
        Ok(OutlierReviser::new(model, self.config.treatment, schema)?
            .with_sinks(self.sinks.iter().cloned()))
    }
}

/// Treat `table` with a model learned elsewhere.
///
/// Every group column of the model must exist with the same type. Outlier
/// columns that are absent or not numeric are skipped with a warning;
/// if none is usable the call fails.
pub fn apply_model(
    model: Arc<IntervalModel>,
    options: TreatmentOptions,
    table: &DataTable,
    ctx: &ExecutionContext,
    sinks: &[Arc<dyn WarningSink>],
) -> Result<OutlierResult> {
    let schema = &table.schema;

    let missing: Vec<&str> = model
        .group_columns()
        .iter()
        .filter(|c| schema.get_column(&c.name).is_none())
        .map(|c| c.name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(TukeyError::Config(format!(
            "The model uses group column(s) ({}) which do not exist in the table",
            missing.join(", ")
        )));
    }

    let mismatched: Vec<&str> = model
        .group_columns()
        .iter()
        .filter(|c| {
            schema
                .get_column(&c.name)
                .is_some_and(|found| found.column_type != c.column_type)
        })
        .map(|c| c.name.as_str())
        .collect();
    if !mismatched.is_empty() {
        return Err(TukeyError::Config(format!(
            "The data type of group column(s) ({}) differs between the table and the model",
            mismatched.join(", ")
        )));
    }

    let (usable, unusable): (Vec<String>, Vec<String>) =
        model.outlier_column_names().into_iter().partition(|name| {
            schema
                .get_column(name)
                .is_some_and(|c| c.column_type.is_numeric())
        });
    let skipped_message = format!(
        "The following outlier columns are missing or incompatible: {}",
        unusable.join(", ")
    );
    if usable.is_empty() {
        return Err(TukeyError::Config(skipped_message));
    }

    let reviser = OutlierReviser::for_columns(model, options, schema, &usable)?
        .with_sinks(sinks.iter().cloned());
    let mut rows = Vec::with_capacity(table.row_count());
    let mut state = reviser.treat(&table.rows, &mut rows, ctx)?;
    if !unusable.is_empty() {
        warn!(columns = ?unusable, "skipping outlier columns");
        reviser.warn(&mut state, &skipped_message);
    }
    Ok(finish(&reviser, state, rows, schema))
}

fn finish(
    reviser: &OutlierReviser,
    mut state: PartitionState,
    rows: Vec<Row>,
    schema: &TableSchema,
) -> OutlierResult {
    let summary = build_summary(&state, &reviser.column_names());
    if rows.is_empty() && !summary.is_empty() {
        reviser.warn(&mut state, EMPTY_TABLE_WARNING);
    }
    let schema = match reviser.domain_tracker() {
        Some(tracker) => tracker.refresh(schema),
        None => schema.clone(),
    };
    OutlierResult {
        table: DataTable { schema, rows },
        summary,
        model: state.shared_model(),
        warnings: state.warnings.clone(),
        state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outlier::{
        EstimationType, GroupKey, Interval, ReplacementStrategy, TreatmentAction,
    };
    use crate::schema::{Cell, ColumnType, Domain};
    use crate::warning::CollectingSink;

    fn table() -> DataTable {
        let schema = TableSchema::from_pairs([
            ("site", ColumnType::String),
            ("v", ColumnType::Int),
            ("label", ColumnType::String),
        ]);
        let mut rows = Vec::new();
        for v in [1, 2, 3, 4, 100] {
            rows.push(vec![Cell::from("A"), Cell::Int(v), Cell::from("x")]);
        }
        for v in [10, 11, 12, 13, -50] {
            rows.push(vec![Cell::from("B"), Cell::Int(v), Cell::from("y")]);
        }
        DataTable::new(schema, rows).unwrap()
    }

    fn config() -> OutlierConfig {
        OutlierConfig::new(["v"])
            .with_group_columns(["site"])
            .with_estimation_type(EstimationType::R7)
    }

    fn key(g: &str) -> GroupKey {
        GroupKey::new(vec![Cell::from(g)])
    }

    #[test]
    fn test_validate_errors() {
        let schema = table().schema;
        let err = NumericOutliers::new(OutlierConfig::new(["label"]))
            .unwrap()
            .validate(&schema)
            .unwrap_err();
        assert!(matches!(err, TukeyError::UnsupportedColumnType { .. }));

        let err = NumericOutliers::new(OutlierConfig::new(["nope"]))
            .unwrap()
            .validate(&schema)
            .unwrap_err();
        assert!(matches!(err, TukeyError::ColumnNotFound(_)));

        assert!(NumericOutliers::new(OutlierConfig::default()).is_err());

        let groups = NumericOutliers::new(OutlierConfig::new(["v"]).with_group_columns(["v", "site"]))
            .unwrap()
            .validate(&schema)
            .unwrap();
        assert_eq!(groups, vec!["site".to_string()]);
    }

    #[test]
    fn test_run_replace() {
        let result = NumericOutliers::new(config())
            .unwrap()
            .run(&table(), &ExecutionContext::new())
            .unwrap();
        assert_eq!(result.model.interval(&key("A"), "v"), Some(Interval::new(-1.0, 7.0)));
        assert_eq!(result.table.rows[4][1], Cell::Missing);
        assert_eq!(result.table.rows[9][1], Cell::Missing);
        assert_eq!(result.state.members.get("v", &key("A")), 5);
        assert_eq!(result.state.outliers.get("v", &key("A")), 1);
        assert_eq!(result.summary.row_count(), 2);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_partitioned_equals_batch() {
        let config = config().with_treatment(
            TreatmentOptions::new()
                .with_replacement(ReplacementStrategy::ClampToBoundary)
                .with_update_domain(true),
        );
        let engine = NumericOutliers::new(config).unwrap();
        let ctx = ExecutionContext::new();
        let batch = engine.run(&table(), &ctx).unwrap();
        for partitions in [1, 2, 3, 7, 20] {
            let partitioned = engine.run_partitioned(&table(), partitions, &ctx).unwrap();
            assert_eq!(partitioned.table, batch.table);
            assert_eq!(partitioned.summary, batch.summary);
            assert_eq!(partitioned.state, batch.state);
        }
        assert_eq!(
            batch.table.schema.get_column("v").unwrap().domain,
            Some(Domain::new(1.0, 13.0))
        );
    }

    #[test]
    fn test_empty_output_warning() {
        let sink = CollectingSink::new();
        let config = config().with_treatment(
            TreatmentOptions::new().with_action(TreatmentAction::RetainOutlierRows),
        );
        let engine = NumericOutliers::new(config.with_iqr_multiplier(1000.0))
            .unwrap()
            .with_sink(sink.clone());
        let result = engine.run(&table(), &ExecutionContext::new()).unwrap();
        assert!(result.table.is_empty());
        assert!(result.warnings.contains(EMPTY_TABLE_WARNING));
        assert!(sink.log().contains(EMPTY_TABLE_WARNING));
    }

    #[test]
    fn test_apply_validation() {
        let engine = NumericOutliers::new(config()).unwrap();
        let ctx = ExecutionContext::new();
        let model = Arc::new(engine.estimate(&table(), &ctx).unwrap());

        let no_group = DataTable::new(
            TableSchema::from_pairs([("v", ColumnType::Int)]),
            vec![vec![Cell::Int(1)]],
        )
        .unwrap();
        assert!(engine.apply(Arc::clone(&model), &no_group, &ctx).is_err());

        let wrong_type = DataTable::new(
            TableSchema::from_pairs([("site", ColumnType::Int), ("v", ColumnType::Int)]),
            vec![vec![Cell::Int(1), Cell::Int(1)]],
        )
        .unwrap();
        assert!(engine.apply(Arc::clone(&model), &wrong_type, &ctx).is_err());

        let no_outlier_column = DataTable::new(
            TableSchema::from_pairs([("site", ColumnType::String), ("v", ColumnType::String)]),
            vec![vec![Cell::from("A"), Cell::from("a")]],
        )
        .unwrap();
        let err = engine.apply(Arc::clone(&model), &no_outlier_column, &ctx).unwrap_err();
        assert!(err.to_string().contains("missing or incompatible: v"));
    }

    #[test]
    fn test_apply_skips_incompatible_columns() {
        let schema = TableSchema::from_pairs([("v", ColumnType::Int), ("w", ColumnType::Double)]);
        let mut model = IntervalModel::new(Vec::new(), schema.columns.clone());
        model.insert(GroupKey::global(), "v", Interval::new(0.0, 10.0));
        model.insert(GroupKey::global(), "w", Interval::new(0.0, 10.0));

        let input = DataTable::new(
            TableSchema::from_pairs([("w", ColumnType::Double), ("v", ColumnType::String)]),
            vec![
                vec![Cell::Double(50.0), Cell::from("keep")],
                vec![Cell::Double(5.0), Cell::from("keep")],
            ],
        )
        .unwrap();
        let result = apply_model(
            Arc::new(model),
            TreatmentOptions::new(),
            &input,
            &ExecutionContext::new(),
            &[],
        )
        .unwrap();
        assert_eq!(result.table.rows[0], vec![Cell::Missing, Cell::from("keep")]);
        assert_eq!(result.state.outliers.get("w", &GroupKey::global()), 1);
        assert_eq!(
            result.warnings.to_vec(),
            vec!["The following outlier columns are missing or incompatible: v"]
        );
        assert_eq!(result.summary.row_count(), 1);
    }

    #[test]
    fn test_cancelled_run_returns_no_table() {
        let ctx = ExecutionContext::new();
        ctx.cancel();
        let result = NumericOutliers::new(config()).unwrap().run_partitioned(&table(), 4, &ctx);
        assert!(matches!(result, Err(TukeyError::Cancelled)));
    }
}
