//! Row-by-row outlier treatment.
//!
//! One routine serves both execution regimes: a batch run is a single
//! partition, a partitioned run treats disjoint row ranges independently and
//! merges their [`PartitionState`]s afterwards.

use std::sync::Arc;

use tracing::debug;

use super::counter::MemberCounter;
use super::domain::DomainTracker;
use super::group::{GroupKey, GroupKeyIndex};
use super::model::{Interval, IntervalModel};
use super::options::{ReplacementStrategy, TreatmentAction, TreatmentOptions};
use super::pipeline::UNKNOWN_GROUP_WARNING;
use super::resolve_outlier_columns;
use crate::context::{ExecutionContext, RowSink};
use crate::error::Result;
use crate::input::Row;
use crate::schema::{Cell, ColumnSchema, TableSchema};
use crate::warning::{self, WarningLog, WarningSink};

/// Accumulated result of treating one partition of rows.
///
/// Counters are only ever added to, so merging states is associative and
/// commutative; warnings merge in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionState {
    model: Arc<IntervalModel>,
    /// Non-missing values of known groups, per column and group.
    pub members: MemberCounter,
    /// Detected (filter/retain) or changed (replace) values.
    pub outliers: MemberCounter,
    /// Non-missing values whose group is absent from the model.
    pub missing_groups: MemberCounter,
    pub warnings: WarningLog,
}

impl PartitionState {
    pub fn new(model: Arc<IntervalModel>) -> Self {
        Self {
            model,
            members: MemberCounter::new(),
            outliers: MemberCounter::new(),
            missing_groups: MemberCounter::new(),
            warnings: WarningLog::new(),
        }
    }

    pub fn model(&self) -> &IntervalModel {
        &self.model
    }

    pub fn shared_model(&self) -> Arc<IntervalModel> {
        Arc::clone(&self.model)
    }

    /// Fold `other` into `self`. Both must come from the same model.
    pub fn merge_from(&mut self, other: &PartitionState) {
        self.members.merge_from(&other.members);
        self.outliers.merge_from(&other.outliers);
        self.missing_groups.merge_from(&other.missing_groups);
        self.warnings.merge(&other.warnings);
    }

    /// Merge partition states in the given order.
    pub fn merge<'a>(
        model: Arc<IntervalModel>,
        states: impl IntoIterator<Item = &'a PartitionState>,
    ) -> PartitionState {
        let mut merged = PartitionState::new(model);
        for state in states {
            merged.merge_from(state);
        }
        merged
    }
}

/// Applies an [`IntervalModel`] to rows according to [`TreatmentOptions`].
pub struct OutlierReviser {
    model: Arc<IntervalModel>,
    options: TreatmentOptions,
    columns: Vec<ColumnSchema>,
    groups: GroupKeyIndex,
    sinks: Vec<Arc<dyn WarningSink>>,
    domain: Option<Arc<DomainTracker>>,
}

impl OutlierReviser {
    /// Reviser over every outlier column of the model.
    pub fn new(
        model: Arc<IntervalModel>,
        options: TreatmentOptions,
        schema: &TableSchema,
    ) -> Result<Self> {
        let columns = model.outlier_column_names();
        Self::for_columns(model, options, schema, &columns)
    }

    /// Reviser over a subset of the model's outlier columns.
    ///
    /// Column and group positions are resolved against `schema`, which may
    /// differ from the schema the model was estimated on.
    pub fn for_columns(
        model: Arc<IntervalModel>,
        options: TreatmentOptions,
        schema: &TableSchema,
        outlier_columns: &[String],
    ) -> Result<Self> {
        let columns = resolve_outlier_columns(schema, outlier_columns)?;
        let groups = GroupKeyIndex::new(schema, &model.group_column_names())?;
        let domain = options
            .update_domain
            .then(|| Arc::new(DomainTracker::new(outlier_columns.to_vec())));
        Ok(Self {
            model,
            options,
            columns,
            groups,
            sinks: Vec::new(),
            domain,
        })
    }

    /// Add a warning listener.
    pub fn with_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_sinks(mut self, sinks: impl IntoIterator<Item = Arc<dyn WarningSink>>) -> Self {
        self.sinks.extend(sinks);
        self
    }

    /// Share a domain tracker between revisers. Ignored unless domain updating is on.
    pub fn with_domain_tracker(mut self, tracker: Arc<DomainTracker>) -> Self {
        if self.options.update_domain {
            self.domain = Some(tracker);
        }
        self
    }

    pub fn domain_tracker(&self) -> Option<&Arc<DomainTracker>> {
        self.domain.as_ref()
    }

    pub fn options(&self) -> &TreatmentOptions {
        &self.options
    }

    pub fn model(&self) -> &Arc<IntervalModel> {
        &self.model
    }

    /// Names of the treated outlier columns.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn sinks(&self) -> &[Arc<dyn WarningSink>] {
        &self.sinks
    }

    /// Record a warning in `state` and notify the listeners.
    pub fn warn(&self, state: &mut PartitionState, message: &str) {
        warning::raise(&mut state.warnings, &self.sinks, message);
    }

    /// Treat `rows` in order, pushing emitted rows into `sink`.
    ///
    /// Cancellation is checked before every row; on cancellation the error
    /// is returned and the caller must discard whatever reached `sink`.
    pub fn treat<'a>(
        &self,
        rows: impl IntoIterator<Item = &'a Row>,
        sink: &mut impl RowSink,
        ctx: &ExecutionContext,
    ) -> Result<PartitionState> {
        let mut state = PartitionState::new(Arc::clone(&self.model));
        let rows = rows.into_iter();
        let (row_hint, _) = rows.size_hint();
        let mut emitted = 0usize;
        let mut seen = 0usize;
        for row in rows {
            ctx.check_cancelled()?;
            if row_hint > 0 {
                ctx.set_progress(seen as f64 / row_hint as f64, || {
                    format!("Treating row {} of {}", seen + 1, row_hint)
                });
            }
            seen += 1;
            if let Some(treated) = self.treat_row(row, &mut state) {
                sink.push(treated)?;
                emitted += 1;
            }
        }
        debug!(
            rows = seen,
            emitted,
            action = ?self.options.action,
            "treated partition"
        );
        Ok(state)
    }

    /// Treat one row. `None` when the row is filtered out.
    pub fn treat_row(&self, row: &Row, state: &mut PartitionState) -> Option<Row> {
        let key = self.groups.key_for(row);
        match self.options.action {
            TreatmentAction::Replace => Some(self.replace_row(row, &key, state)),
            TreatmentAction::FilterOutlierRows | TreatmentAction::RetainOutlierRows => {
                self.filter_row(row, &key, state)
            }
        }
    }

    fn replace_row(&self, row: &Row, key: &GroupKey, state: &mut PartitionState) -> Row {
        let intervals = self.model.group_intervals(key);
        let mut treated = row.clone();
        for column in &self.columns {
            let Some(cell) = row.get(column.position) else {
                continue;
            };
            let Some(value) = cell.as_f64() else {
                continue;
            };
            let Some(intervals) = intervals else {
                self.count_unknown(&column.name, key, state);
                self.track(&column.name, value);
                continue;
            };

            state.members.increment(&column.name, key);
            let replaced = match intervals.get(&column.name) {
                Some(interval) => self.replace_cell(cell, value, interval, column),
                None => None,
            };
            match replaced {
                Some(new_cell) if new_cell != *cell => {
                    state.outliers.increment(&column.name, key);
                    if let Some(v) = new_cell.as_f64() {
                        self.track(&column.name, v);
                    }
                    treated[column.position] = new_cell;
                }
                _ => self.track(&column.name, value),
            }
        }
        treated
    }

    /// The replacement for an outlier cell, `None` if the value is kept.
    fn replace_cell(
        &self,
        cell: &Cell,
        value: f64,
        interval: &Interval,
        column: &ColumnSchema,
    ) -> Option<Cell> {
        if !interval.is_outlier(value, self.options.scope) {
            return None;
        }
        match self.options.replacement {
            ReplacementStrategy::SetMissing => Some(Cell::Missing),
            ReplacementStrategy::ClampToBoundary => {
                let column_type = cell.column_type().unwrap_or(column.column_type);
                let clamped = interval.clamp(value, self.options.scope, column_type);
                (clamped != value).then(|| Cell::numeric(column_type, clamped))
            }
        }
    }

    fn filter_row(&self, row: &Row, key: &GroupKey, state: &mut PartitionState) -> Option<Row> {
        let intervals = self.model.group_intervals(key);
        let mut has_outlier = false;
        for column in &self.columns {
            let Some(value) = row.get(column.position).and_then(Cell::as_f64) else {
                continue;
            };
            let Some(intervals) = intervals else {
                self.count_unknown(&column.name, key, state);
                continue;
            };
            state.members.increment(&column.name, key);
            if let Some(interval) = intervals.get(&column.name) {
                if interval.is_outlier(value, self.options.scope) {
                    has_outlier = true;
                    state.outliers.increment(&column.name, key);
                }
            }
        }

        let emit = match self.options.action {
            TreatmentAction::RetainOutlierRows => has_outlier,
            _ => !has_outlier,
        };
        if !emit {
            return None;
        }
        if self.domain.is_some() {
            for column in &self.columns {
                if let Some(value) = row.get(column.position).and_then(Cell::as_f64) {
                    self.track(&column.name, value);
                }
            }
        }
        Some(row.clone())
    }

    /// Count a value of a group the model does not know; warn on its first sighting.
    fn count_unknown(&self, column: &str, key: &GroupKey, state: &mut PartitionState) {
        if state.missing_groups.get(column, key) == 0 {
            self.warn(state, UNKNOWN_GROUP_WARNING);
        }
        state.missing_groups.increment(column, key);
    }

        fn track(&self, column: &str, value: f64) {
        if let Some(domain) = &self.domain {
            domain.update(column, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outlier::options::DetectionScope;
    use crate::schema::ColumnType;
    use crate::warning::CollectingSink;

    fn schema() -> TableSchema {
        TableSchema::from_pairs([("g", ColumnType::String), ("v", ColumnType::Int)])
    }

    fn model() -> Arc<IntervalModel> {
        let schema = schema();
        let mut model = IntervalModel::new(
            vec![schema.columns[0].clone()],
            vec![schema.columns[1].clone()],
        );
        model.insert(GroupKey::new(vec![Cell::from("A")]), "v", Interval::new(-1.0, 7.0));
        model.add_group(GroupKey::new(vec![Cell::from("E")]));
        Arc::new(model)
    }

    fn rows(values: &[(&str, Option<i32>)]) -> Vec<Row> {
        values
            .iter()
            .map(|(g, v)| vec![Cell::from(*g), v.map(Cell::Int).unwrap_or(Cell::Missing)])
            .collect()
    }

    fn key(g: &str) -> GroupKey {
        GroupKey::new(vec![Cell::from(g)])
    }

    fn run(options: TreatmentOptions, input: &[Row]) -> (Vec<Row>, PartitionState) {
        let reviser = OutlierReviser::new(model(), options, &schema()).unwrap();
        let mut out = Vec::new();
        let state = reviser.treat(input, &mut out, &ExecutionContext::new()).unwrap();
        (out, state)
    }

    #[test]
    fn test_replace_set_missing() {
        let input = rows(&[("A", Some(1)), ("A", Some(2)), ("A", Some(3)), ("A", Some(4)), ("A", Some(100))]);
        let (out, state) = run(TreatmentOptions::new(), &input);
        assert_eq!(out.len(), 5);
        assert_eq!(out[4][1], Cell::Missing);
        assert_eq!(out[0][1], Cell::Int(1));
        assert_eq!(state.members.get("v", &key("A")), 5);
        assert_eq!(state.outliers.get("v", &key("A")), 1);
    }

    #[test]
    fn test_replace_clamp_respects_scope() {
        let input = rows(&[("A", Some(-5)), ("A", Some(100))]);
        let options = TreatmentOptions::new()
            .with_replacement(ReplacementStrategy::ClampToBoundary)
            .with_scope(DetectionScope::LowerOnly);
        let (out, state) = run(options, &input);
        assert_eq!(out[0][1], Cell::Int(-1));
        assert_eq!(out[1][1], Cell::Int(100));
        assert_eq!(state.outliers.get("v", &key("A")), 1);
    }

    #[test]
    fn test_unknown_group_passes_through() {
        let input = rows(&[("Z", Some(1000)), ("Z", None)]);
        let (out, state) = run(TreatmentOptions::new(), &input);
        assert_eq!(out, input);
        assert_eq!(state.missing_groups.get("v", &key("Z")), 1);
        assert_eq!(state.outliers.get("v", &key("Z")), 0);
        assert_eq!(state.members.get("v", &key("Z")), 0);
        assert_eq!(state.warnings.to_vec(), vec![UNKNOWN_GROUP_WARNING]);

        let sink = CollectingSink::new();
        let reviser = OutlierReviser::new(model(), TreatmentOptions::new(), &schema())
            .unwrap()
            .with_sink(sink.clone());
        let more = rows(&[("Z", Some(1)), ("Y", Some(2)), ("A", Some(3))]);
        let state = reviser.treat(&more, &mut Vec::<Row>::new(), &ExecutionContext::new()).unwrap();
        assert_eq!(state.missing_groups.get("v", &key("Y")), 1);
        assert_eq!(state.warnings.len(), 1);
        assert_eq!(sink.log().to_vec(), vec![UNKNOWN_GROUP_WARNING]);
    }

    #[test]
    fn test_known_groups_raise_no_warning() {
        let input = rows(&[("A", Some(1)), ("A", Some(100)), ("E", Some(5)), ("Z", None)]);
        let (_, state) = run(TreatmentOptions::new(), &input);
        assert!(state.warnings.is_empty());
    }

    #[test]
    fn test_known_group_without_interval_counts_members() {
        let input = rows(&[("E", Some(1000))]);
        let (out, state) = run(TreatmentOptions::new(), &input);
        assert_eq!(out, input);
        assert_eq!(state.members.get("v", &key("E")), 1);
        assert_eq!(state.outliers.get("v", &key("E")), 0);
        assert_eq!(state.missing_groups.get("v", &key("E")), 0);
    }

    #[test]
    fn test_filter_and_retain() {
        let input = rows(&[("A", Some(1)), ("A", Some(100)), ("Z", Some(100)), ("A", None)]);
        let filter = TreatmentOptions::new().with_action(TreatmentAction::FilterOutlierRows);
        let (kept, state) = run(filter, &input);
        assert_eq!(kept.len(), 3);
        assert!(!kept.contains(&input[1]));
        assert_eq!(state.outliers.get("v", &key("A")), 1);
        assert_eq!(state.missing_groups.get("v", &key("Z")), 1);
        assert!(state.warnings.contains(UNKNOWN_GROUP_WARNING));

        let retain = TreatmentOptions::new().with_action(TreatmentAction::RetainOutlierRows);
        let (retained, _) = run(retain, &input);
        assert_eq!(retained, vec![input[1].clone()]);
    }

    #[test]
    fn test_domain_only_from_emitted_rows() {
        let input = rows(&[("A", Some(1)), ("A", Some(100)), ("A", Some(5))]);
        let options = TreatmentOptions::new()
            .with_action(TreatmentAction::FilterOutlierRows)
            .with_update_domain(true);
        let reviser = OutlierReviser::new(model(), options, &schema()).unwrap();
        let mut out = Vec::new();
        reviser.treat(&input, &mut out, &ExecutionContext::new()).unwrap();
        let tracker = reviser.domain_tracker().unwrap();
        assert_eq!(tracker.bounds("v"), Some((1.0, 5.0)));
    }

    #[test]
    fn test_domain_includes_unknown_groups_in_replace_mode() {
        let input = rows(&[("A", Some(100)), ("Z", Some(-40))]);
        let options = TreatmentOptions::new()
            .with_replacement(ReplacementStrategy::ClampToBoundary)
            .with_update_domain(true);
        let reviser = OutlierReviser::new(model(), options, &schema()).unwrap();
        reviser.treat(&input, &mut Vec::new(), &ExecutionContext::new()).unwrap();
        assert_eq!(reviser.domain_tracker().unwrap().bounds("v"), Some((-40.0, 7.0)));
    }

    #[test]
    fn test_cancellation_aborts() {
        let ctx = ExecutionContext::new();
        ctx.cancel();
        let reviser = OutlierReviser::new(model(), TreatmentOptions::new(), &schema()).unwrap();
        let input = rows(&[("A", Some(1))]);
        let result = reviser.treat(&input, &mut Vec::new(), &ctx);
        assert!(matches!(result, Err(crate::error::TukeyError::Cancelled)));
    }

    #[test]
    fn test_merge_states() {
        let input = rows(&[("A", Some(1)), ("A", Some(100)), ("Z", Some(3)), ("A", Some(-50))]);
        let (_, whole) = run(TreatmentOptions::new(), &input);
        let (_, first) = run(TreatmentOptions::new(), &input[..2]);
        let (_, second) = run(TreatmentOptions::new(), &input[2..]);
        let merged = PartitionState::merge(model(), [&second, &first]);
        assert_eq!(merged, whole);
    }

    #[test]
    fn test_warnings_reach_sinks() {
        let sink = CollectingSink::new();
        let reviser = OutlierReviser::new(model(), TreatmentOptions::new(), &schema())
            .unwrap()
            .with_sink(sink.clone());
        let mut state = PartitionState::new(model());
        reviser.warn(&mut state, "careful");
        reviser.warn(&mut state, "careful");
        assert_eq!(state.warnings.to_vec(), vec!["careful"]);
        assert_eq!(sink.log().len(), 1);
    }
}
