//! Outlier detection configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TukeyError};
use crate::outlier::{
    EstimationType, QuantileEstimator, QuantileMethod, TreatmentOptions,
    DEFAULT_HEURISTIC_THRESHOLD, DEFAULT_SEED, DEFAULT_SKETCH_CAPACITY,
};

pub(crate) const NO_COLUMNS_MESSAGE: &str = "Please include at least one numerical column";
pub(crate) const NEGATIVE_SCALAR_MESSAGE: &str =
    "The IQR scalar has to be greater than or equal 0.";

/// Configuration for one outlier detection run.
///
/// Loadable from JSON; every field except `outlier_columns` has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Numeric columns to check.
    pub outlier_columns: Vec<String>,
    /// Columns whose values split the rows into groups.
    pub group_columns: Vec<String>,
    /// Multiplier `k` of the IQR fences.
    pub iqr_multiplier: f64,
    /// Exact, sketch-based, or chosen by input size.
    pub method: QuantileMethod,
    /// Interpolation formula used by exact estimation.
    pub estimation_type: EstimationType,
    /// Samples per sketch level.
    pub sketch_capacity: usize,
    /// Row count above which `method = auto` uses the sketch.
    pub heuristic_threshold: usize,
    /// Seed of the sketch compactors.
    pub seed: u64,
    #[serde(flatten)]
    pub treatment: TreatmentOptions,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            outlier_columns: Vec::new(),
            group_columns: Vec::new(),
            iqr_multiplier: 1.5,
            method: QuantileMethod::Exact,
            estimation_type: EstimationType::R6,
            sketch_capacity: DEFAULT_SKETCH_CAPACITY,
            heuristic_threshold: DEFAULT_HEURISTIC_THRESHOLD,
            seed: DEFAULT_SEED,
            treatment: TreatmentOptions::default(),
        }
    }
}

impl OutlierConfig {
    pub fn new(outlier_columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            outlier_columns: outlier_columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_group_columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = multiplier;
        self
    }

    pub fn with_method(mut self, method: QuantileMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_estimation_type(mut self, estimation_type: EstimationType) -> Self {
        self.estimation_type = estimation_type;
        self
    }

    pub fn with_treatment(mut self, treatment: TreatmentOptions) -> Self {
        self.treatment = treatment;
        self
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| TukeyError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Checks that do not need the input table.
    pub fn validate(&self) -> Result<()> {
        if self.outlier_columns.is_empty() {
            return Err(TukeyError::Config(NO_COLUMNS_MESSAGE.into()));
        }
        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(TukeyError::Config(NEGATIVE_SCALAR_MESSAGE.into()));
        }
        Ok(())
    }

    /// Group columns without the ones that are also outlier columns.
    pub fn effective_group_columns(&self) -> Vec<String> {
        self.group_columns
            .iter()
            .filter(|g| !self.outlier_columns.contains(g))
            .cloned()
            .collect()
    }

    /// The quantile estimator described by this configuration.
    pub fn estimator(&self) -> QuantileEstimator {
        QuantileEstimator::new(self.iqr_multiplier)
            .with_method(self.method)
            .with_estimation_type(self.estimation_type)
            .with_sketch_capacity(self.sketch_capacity)
            .with_heuristic_threshold(self.heuristic_threshold)
            .with_seed(self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outlier::{ReplacementStrategy, TreatmentAction};
    use std::io::Write;

    #[test]
    fn test_validate() {
        assert!(OutlierConfig::new(["v"]).validate().is_ok());

        let err = OutlierConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains(NO_COLUMNS_MESSAGE));

        let err = OutlierConfig::new(["v"]).with_iqr_multiplier(-0.5).validate().unwrap_err();
        assert!(err.to_string().contains(NEGATIVE_SCALAR_MESSAGE));
        assert!(OutlierConfig::new(["v"]).with_iqr_multiplier(f64::NAN).validate().is_err());
        assert!(OutlierConfig::new(["v"]).with_iqr_multiplier(0.0).validate().is_ok());
    }

    #[test]
    fn test_group_columns_overlapping_outliers_are_dropped() {
        let config = OutlierConfig::new(["a", "b"]).with_group_columns(["b", "g"]);
        assert_eq!(config.effective_group_columns(), vec!["g".to_string()]);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "outlier_columns": ["v"],
                "group_columns": ["site"],
                "iqr_multiplier": 3.0,
                "estimation_type": "r7",
                "action": "retain_outlier_rows",
                "replacement": "clamp_to_boundary"
            }}"#
        )
        .unwrap();

        let config = OutlierConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.outlier_columns, vec!["v"]);
        assert_eq!(config.iqr_multiplier, 3.0);
        assert_eq!(config.estimation_type, EstimationType::R7);
        assert_eq!(config.method, QuantileMethod::Exact);
        assert_eq!(config.treatment.action, TreatmentAction::RetainOutlierRows);
        assert_eq!(config.treatment.replacement, ReplacementStrategy::ClampToBoundary);
        assert!(!config.treatment.update_domain);
    }
}
