//! Permitted intervals per group and outlier column.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;

use super::codec;
use super::group::GroupKey;
use super::options::DetectionScope;
use crate::error::{Result, TukeyError};
use crate::schema::{ColumnSchema, ColumnType};

/// The permitted value range `[lower, upper]` of one (group, column) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Tukey fences `[q1 - k*iqr, q3 + k*iqr]`.
    ///
    /// For integer columns the lower bound is rounded up and the upper bound
    /// down. Rounding that would invert the interval is skipped.
    pub fn from_quartiles(q1: f64, q3: f64, multiplier: f64, column_type: ColumnType) -> Self {
        let iqr = q3 - q1;
        let lower = q1 - multiplier * iqr;
        let upper = q3 + multiplier * iqr;
        if column_type.is_integral() {
            let (lo, hi) = (lower.ceil(), upper.floor());
            if lo <= hi {
                return Self::new(lo, hi);
            }
        }
        Self::new(lower, upper)
    }

    /// Strict test: values equal to a bound are never outliers.
    pub fn is_outlier(&self, value: f64, scope: DetectionScope) -> bool {
        (scope.checks_lower() && value < self.lower) || (scope.checks_upper() && value > self.upper)
    }

    /// Clamp `value` into the active side(s) of the interval.
    ///
    /// Integer columns clamp into `[ceil(lower), floor(upper)]`.
    pub fn clamp(&self, value: f64, scope: DetectionScope, column_type: ColumnType) -> f64 {
        let (lower, upper) = if column_type.is_integral() {
            (self.lower.ceil(), self.upper.floor())
        } else {
            (self.lower, self.upper)
        };
        let mut clamped = value;
        if scope.checks_lower() {
            clamped = clamped.max(lower);
        }
        if scope.checks_upper() {
            clamped = clamped.min(upper);
        }
        clamped
    }
}

/// Intervals learned per group, per outlier column.
///
/// A group with no entry for a column had no non-missing values for it; such
/// a pair never produces outliers. Groups keep the order in which they were
/// first seen.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalModel {
    group_columns: Vec<ColumnSchema>,
    outlier_columns: Vec<ColumnSchema>,
    intervals: IndexMap<GroupKey, IndexMap<String, Interval>>,
}

impl IntervalModel {
    pub fn new(group_columns: Vec<ColumnSchema>, outlier_columns: Vec<ColumnSchema>) -> Self {
        Self {
            group_columns,
            outlier_columns,
            intervals: IndexMap::new(),
        }
    }

    pub fn group_columns(&self) -> &[ColumnSchema] {
        &self.group_columns
    }

    pub fn outlier_columns(&self) -> &[ColumnSchema] {
        &self.outlier_columns
    }

    pub fn group_column_names(&self) -> Vec<String> {
        self.group_columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn outlier_column_names(&self) -> Vec<String> {
        self.outlier_columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Register a group, even if none of its columns gets an interval.
    pub fn add_group(&mut self, key: GroupKey) {
        self.intervals.entry(key).or_default();
    }

    /// Set the interval of `(key, column)`, registering the group if needed.
    pub fn insert(&mut self, key: GroupKey, column: impl Into<String>, interval: Interval) {
        self.intervals
            .entry(key)
            .or_default()
            .insert(column.into(), interval);
    }

    /// Intervals of a group, `None` if the group is unknown.
    pub fn group_intervals(&self, key: &GroupKey) -> Option<&IndexMap<String, Interval>> {
        self.intervals.get(key)
    }

    pub fn interval(&self, key: &GroupKey, column: &str) -> Option<Interval> {
        self.intervals
            .get(key)
            .and_then(|columns| columns.get(column))
            .copied()
    }

    pub fn contains_group(&self, key: &GroupKey) -> bool {
        self.intervals.contains_key(key)
    }

    /// Groups and their intervals, in first-seen order.
    pub fn groups(&self) -> impl Iterator<Item = (&GroupKey, &IndexMap<String, Interval>)> {
        self.intervals.iter()
    }

    pub fn group_count(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Save the model as a binary blob.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, codec::encode_model(self)).map_err(|e| TukeyError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load a model saved with [`IntervalModel::save`] or any full state blob.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| TukeyError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        codec::decode_model(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Cell;

    #[test]
    fn test_fences_from_quartiles() {
        let interval = Interval::from_quartiles(2.0, 4.0, 1.5, ColumnType::Double);
        assert_eq!(interval, Interval::new(-1.0, 7.0));

        let zero = Interval::from_quartiles(2.0, 4.0, 0.0, ColumnType::Double);
        assert_eq!(zero, Interval::new(2.0, 4.0));
    }

    #[test]
    fn test_integer_rounding() {
        let interval = Interval::from_quartiles(2.5, 3.5, 0.3, ColumnType::Int);
        assert_eq!(interval, Interval::new(3.0, 3.0));

        // ceil(1.25) > floor(1.75): keep the raw bounds
        let narrow = Interval::from_quartiles(1.25, 1.75, 0.0, ColumnType::Long);
        assert_eq!(narrow, Interval::new(1.25, 1.75));
    }

    #[test]
    fn test_boundaries_are_not_outliers() {
        let interval = Interval::new(-1.0, 7.0);
        assert!(!interval.is_outlier(-1.0, DetectionScope::Both));
        assert!(!interval.is_outlier(7.0, DetectionScope::Both));
        assert!(interval.is_outlier(7.5, DetectionScope::Both));
        assert!(!interval.is_outlier(7.5, DetectionScope::LowerOnly));
        assert!(interval.is_outlier(-2.0, DetectionScope::LowerOnly));
    }

    #[test]
    fn test_integer_clamp_uses_inner_integers() {
        let interval = Interval::new(1.2, 7.8);
        assert_eq!(interval.clamp(0.0, DetectionScope::Both, ColumnType::Int), 2.0);
        assert_eq!(interval.clamp(100.0, DetectionScope::Both, ColumnType::Long), 7.0);
        assert_eq!(interval.clamp(100.0, DetectionScope::Both, ColumnType::Double), 7.8);
        assert_eq!(interval.clamp(100.0, DetectionScope::LowerOnly, ColumnType::Double), 100.0);
    }

    #[test]
    fn test_unknown_pairs() {
        let mut model = IntervalModel::new(Vec::new(), Vec::new());
        let a = GroupKey::new(vec![Cell::from("a")]);
        model.add_group(a.clone());
        model.insert(a.clone(), "v", Interval::new(0.0, 1.0));
        model.add_group(GroupKey::new(vec![Cell::from("b")]));

        assert!(model.contains_group(&GroupKey::new(vec![Cell::from("b")])));
        assert_eq!(model.interval(&a, "v"), Some(Interval::new(0.0, 1.0)));
        assert_eq!(model.interval(&a, "w"), None);
        assert_eq!(model.group_count(), 2);
    }
}
