//! Treatment options.

use serde::{Deserialize, Serialize};

/// Which side(s) of the permitted interval are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionScope {
    LowerOnly,
    UpperOnly,
    #[default]
    Both,
}

impl DetectionScope {
    pub fn checks_lower(&self) -> bool {
        matches!(self, DetectionScope::LowerOnly | DetectionScope::Both)
    }

    pub fn checks_upper(&self) -> bool {
        matches!(self, DetectionScope::UpperOnly | DetectionScope::Both)
    }
}

/// What happens to rows and cells holding outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentAction {
    /// Rewrite outlier cells according to the replacement strategy.
    #[default]
    Replace,
    /// Drop every row with at least one outlier.
    FilterOutlierRows,
    /// Keep only rows with at least one outlier.
    RetainOutlierRows,
}

/// How an outlier cell is rewritten in `TreatmentAction::Replace` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementStrategy {
    #[default]
    SetMissing,
    ClampToBoundary,
}

/// Treatment configuration, fixed for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreatmentOptions {
    pub scope: DetectionScope,
    pub action: TreatmentAction,
    pub replacement: ReplacementStrategy,
    /// Refresh the domains of the outlier columns from the treated values.
    pub update_domain: bool,
}

impl TreatmentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(mut self, scope: DetectionScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_action(mut self, action: TreatmentAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_replacement(mut self, replacement: ReplacementStrategy) -> Self {
        self.replacement = replacement;
        self
    }

    pub fn with_update_domain(mut self, update_domain: bool) -> Self {
        self.update_domain = update_domain;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_sides() {
        assert!(DetectionScope::Both.checks_lower() && DetectionScope::Both.checks_upper());
        assert!(!DetectionScope::UpperOnly.checks_lower());
        assert!(!DetectionScope::LowerOnly.checks_upper());
    }

    #[test]
    fn test_options_from_partial_json() {
        let options: TreatmentOptions =
            serde_json::from_str(r#"{"action": "filter_outlier_rows"}"#).unwrap();
        assert_eq!(options.action, TreatmentAction::FilterOutlierRows);
        assert_eq!(options.scope, DetectionScope::Both);
        assert_eq!(options.replacement, ReplacementStrategy::SetMissing);
    }
}
