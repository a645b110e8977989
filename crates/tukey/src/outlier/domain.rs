//! Observed value ranges of the outlier columns after treatment.

use dashmap::DashMap;

use crate::schema::{Domain, TableSchema};

/// Concurrent per-column `(min, max)` tracker.
///
/// Partitions treated in parallel share one tracker; updates are
/// synchronized per column by the map's shards.
#[derive(Debug, Default)]
pub struct DomainTracker {
    columns: Vec<String>,
    bounds: DashMap<String, (f64, f64)>,
}

impl DomainTracker {
    /// Track the given columns. Values of other columns are ignored.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            bounds: DashMap::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Widen the range of `column` to include `value`.
    pub fn update(&self, column: &str, value: f64) {
        if value.is_nan() {
            return;
        }
        if let Some(mut entry) = self.bounds.get_mut(column) {
            let (min, max) = *entry;
            *entry = (min.min(value), max.max(value));
            return;
        }
        if self.columns.iter().any(|c| c == column) {
            self.bounds
                .entry(column.to_string())
                .and_modify(|(min, max)| {
                    *min = min.min(value);
                    *max = max.max(value);
                })
                .or_insert((value, value));
        }
    }

    /// Observed `(min, max)` of a column, `None` if it saw no value.
    pub fn bounds(&self, column: &str) -> Option<(f64, f64)> {
        self.bounds.get(column).map(|r| *r)
    }

    /// A copy of `schema` whose tracked columns carry the observed domain.
    ///
    /// Integer columns get `[floor(min), ceil(max)]`. Tracked columns that
    /// saw no value lose their domain.
    pub fn refresh(&self, schema: &TableSchema) -> TableSchema {
        let mut refreshed = schema.clone();
        for name in &self.columns {
            let Some(column) = refreshed.get_column_mut(name) else {
                continue;
            };
            column.domain = self.bounds(name).map(|(min, max)| {
                if column.column_type.is_integral() {
                    Domain::new(min.floor(), max.ceil())
                } else {
                    Domain::new(min, max)
                }
            });
        }
        refreshed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_refresh_integer_and_double() {
        let schema = TableSchema::from_pairs([
            ("i", ColumnType::Int),
            ("d", ColumnType::Double),
            ("s", ColumnType::String),
        ]);
        let tracker = DomainTracker::new(vec!["i".into(), "d".into()]);
        tracker.update("i", 2.0);
        tracker.update("i", 7.0);
        tracker.update("d", 0.5);
        tracker.update("d", -1.25);
        tracker.update("s", 100.0);

        let refreshed = tracker.refresh(&schema);
        assert_eq!(refreshed.get_column("i").unwrap().domain, Some(Domain::new(2.0, 7.0)));
        assert_eq!(refreshed.get_column("d").unwrap().domain, Some(Domain::new(-1.25, 0.5)));
        assert_eq!(refreshed.get_column("s").unwrap().domain, None);
        assert_eq!(tracker.bounds("s"), None);
    }

    #[test]
    fn test_concurrent_updates() {
        let tracker = Arc::new(DomainTracker::new(vec!["v".into()]));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    for i in 0..1000 {
                        tracker.update("v", (t * 1000 + i) as f64);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.bounds("v"), Some((0.0, 3999.0)));
    }
}
