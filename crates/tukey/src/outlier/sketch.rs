//! Bounded-memory quantile sketch.
//!
//! A stack of compactors: level `h` holds samples of weight `2^h`. When a
//! level fills up it is sorted and every other sample, starting at a random
//! offset, moves one level up. Retained samples stay below
//! `capacity * levels`, with `levels` growing logarithmically in the number
//! of inserted values.

use super::quantile::EstimationType;

const MIN_CAPACITY: usize = 8;

#[derive(Debug, Clone)]
pub struct QuantileSketch {
    capacity: usize,
    levels: Vec<Vec<f64>>,
    count: u64,
    rng: fastrand::Rng,
}

impl QuantileSketch {
    pub fn new(capacity: usize, seed: u64) -> Self {
        Self {
            capacity: capacity.max(MIN_CAPACITY),
            levels: vec![Vec::new()],
            count: 0,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    pub fn insert(&mut self, value: f64) {
        self.count += 1;
        self.levels[0].push(value);
        if self.levels[0].len() >= self.capacity {
            self.compact();
        }
    }

    /// Number of inserted values.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Number of samples currently held.
    pub fn retained(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// True while no compaction has happened, so every value is still held.
    pub fn is_exact(&self) -> bool {
        self.levels.len() == 1
    }

    fn compact(&mut self) {
        let mut level = 0;
        while level < self.levels.len() && self.levels[level].len() >= self.capacity {
            let mut items = std::mem::take(&mut self.levels[level]);
            items.sort_by(f64::total_cmp);
            // an odd sample stays behind at its level
            if items.len() % 2 == 1 {
                if let Some(last) = items.pop() {
                    self.levels[level].push(last);
                }
            }
            let offset = usize::from(self.rng.bool());
            let promoted: Vec<f64> = items.into_iter().skip(offset).step_by(2).collect();
            if level + 1 == self.levels.len() {
                self.levels.push(Vec::new());
            }
            self.levels[level + 1].extend(promoted);
            level += 1;
        }
    }

    /// Approximate `p` quantile. `None` if nothing was inserted.
    ///
    /// Before the first compaction this is exact under `estimation_type`.
    /// Afterwards it is the smallest sample whose cumulative weight reaches
    /// `p` of the total.
    pub fn quantile(&self, p: f64, estimation_type: EstimationType) -> Option<f64> {
        if self.is_exact() {
            let mut values = self.levels[0].clone();
            values.sort_by(f64::total_cmp);
            return estimation_type.quantile(&values, p);
        }

        let mut weighted: Vec<(f64, u64)> = self
            .levels
            .iter()
            .enumerate()
            .flat_map(|(h, items)| items.iter().map(move |&v| (v, 1u64 << h)))
            .collect();
        if weighted.is_empty() {
            return None;
        }
        weighted.sort_by(|a, b| a.0.total_cmp(&b.0));
        let total: u64 = weighted.iter().map(|(_, w)| w).sum();
        let target = p * total as f64;
        let mut cumulative = 0u64;
        for &(value, weight) in &weighted {
            cumulative += weight;
            if cumulative as f64 >= target {
                return Some(value);
            }
        }
        weighted.last().map(|(v, _)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_input_is_exact() {
        let mut sketch = QuantileSketch::new(64, 1);
        for v in [1.0, 2.0, 3.0, 4.0, 100.0] {
            sketch.insert(v);
        }
        assert!(sketch.is_exact());
        assert_eq!(sketch.quantile(0.25, EstimationType::R7), Some(2.0));
        assert_eq!(sketch.quantile(0.75, EstimationType::R7), Some(4.0));
    }

    #[test]
    fn test_memory_is_bounded() {
        let mut sketch = QuantileSketch::new(64, 7);
        for i in 0..100_000 {
            sketch.insert(i as f64);
        }
        assert!(!sketch.is_exact());
        assert_eq!(sketch.count(), 100_000);
        assert!(sketch.retained() < 64 * 20, "retained {}", sketch.retained());
    }

    #[test]
    fn test_approximate_quartiles_on_uniform_data() {
        let mut sketch = QuantileSketch::new(256, 42);
        let n = 50_000;
        for i in 0..n {
            // interleave to avoid sorted input
            let v = ((i * 7919) % n) as f64;
            sketch.insert(v);
        }
        let q1 = sketch.quantile(0.25, EstimationType::R6).unwrap();
        let q3 = sketch.quantile(0.75, EstimationType::R6).unwrap();
        let tolerance = n as f64 * 0.05;
        assert!((q1 - 12_500.0).abs() < tolerance, "q1 = {}", q1);
        assert!((q3 - 37_500.0).abs() < tolerance, "q3 = {}", q3);
    }

    #[test]
    fn test_same_seed_same_result() {
        let run = |seed| {
            let mut sketch = QuantileSketch::new(16, seed);
            for i in 0..5_000 {
                sketch.insert(((i * 31) % 977) as f64);
            }
            sketch.quantile(0.5, EstimationType::R6)
        };
        assert_eq!(run(3), run(3));
    }

    #[test]
    fn test_empty_sketch() {
        let sketch = QuantileSketch::new(16, 0);
        assert_eq!(sketch.quantile(0.5, EstimationType::R6), None);
    }
}
