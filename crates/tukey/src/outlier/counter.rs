//! Per-(column, group) counters.

use indexmap::{IndexMap, IndexSet};

use super::group::GroupKey;

/// Counts per outlier column and group key.
///
/// Counters only grow. Merging sums elementwise, so the result does not
/// depend on merge order; equality ignores insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberCounter {
    counts: IndexMap<String, IndexMap<GroupKey, u64>>,
}

impl MemberCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to the count of `(column, key)`.
    pub fn increment(&mut self, column: &str, key: &GroupKey) {
        self.add(column, key, 1);
    }

    /// Add `count` to the count of `(column, key)`.
    pub fn add(&mut self, column: &str, key: &GroupKey, count: u64) {
        let idx = match self.counts.get_index_of(column) {
            Some(idx) => idx,
            None => self.counts.insert_full(column.to_string(), IndexMap::new()).0,
        };
        let groups = &mut self.counts[idx];
        if let Some(value) = groups.get_mut(key) {
            *value += count;
        } else {
            groups.insert(key.clone(), count);
        }
    }

    /// Count for `(column, key)`, 0 if never seen.
    pub fn get(&self, column: &str, key: &GroupKey) -> u64 {
        self.counts
            .get(column)
            .and_then(|groups| groups.get(key))
            .copied()
            .unwrap_or(0)
    }

    /// All observed group keys across columns, in first-seen order.
    pub fn group_keys(&self) -> IndexSet<GroupKey> {
        self.counts
            .values()
            .flat_map(|groups| groups.keys().cloned())
            .collect()
    }

    /// Columns with at least one count.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// Iterate every `(column, key, count)` entry.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &GroupKey, u64)> {
        self.counts.iter().flat_map(|(column, groups)| {
            groups
                .iter()
                .map(move |(key, count)| (column.as_str(), key, *count))
        })
    }

    /// Sum of all counts for one column.
    pub fn total(&self, column: &str) -> u64 {
        self.counts
            .get(column)
            .map(|groups| groups.values().sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Add every count of `other` into `self`.
    pub fn merge_from(&mut self, other: &MemberCounter) {
        for (column, key, count) in other.entries() {
            self.add(column, key, count);
        }
    }

    /// Elementwise sum of several counters.
    pub fn merge<'a>(counters: impl IntoIterator<Item = &'a MemberCounter>) -> MemberCounter {
        let mut merged = MemberCounter::new();
        for counter in counters {
            merged.merge_from(counter);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Cell;

    fn key(name: &str) -> GroupKey {
        GroupKey::new(vec![Cell::from(name)])
    }

    #[test]
    fn test_increment_and_get() {
        let mut counter = MemberCounter::new();
        counter.increment("v", &key("a"));
        counter.increment("v", &key("a"));
        counter.increment("w", &key("b"));
        assert_eq!(counter.get("v", &key("a")), 2);
        assert_eq!(counter.get("v", &key("b")), 0);
        assert_eq!(counter.get("x", &key("a")), 0);
        assert_eq!(counter.total("v"), 2);
    }

    #[test]
    fn test_group_keys_first_seen_order() {
        let mut counter = MemberCounter::new();
        counter.increment("v", &key("b"));
        counter.increment("w", &key("a"));
        counter.increment("v", &key("a"));
        let keys: Vec<_> = counter.group_keys().into_iter().collect();
        assert_eq!(keys, vec![key("b"), key("a")]);
    }

    #[test]
    fn test_merge_order_independent() {
        let mut a = MemberCounter::new();
        a.add("v", &key("x"), 3);
        let mut b = MemberCounter::new();
        b.add("v", &key("x"), 2);
        b.add("v", &key("y"), 1);
        let mut c = MemberCounter::new();
        c.add("w", &key("x"), 5);

        let left = MemberCounter::merge([&MemberCounter::merge([&a, &b]), &c]);
        let right = MemberCounter::merge([&c, &b, &a]);
        assert_eq!(left, right);
        assert_eq!(left.get("v", &key("x")), 5);
        assert_eq!(left.get("w", &key("x")), 5);
    }
}
