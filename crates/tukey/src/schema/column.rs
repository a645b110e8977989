//! Name, position, type and domain of one column.

use serde::{Deserialize, Serialize};

use super::types::ColumnType;

/// Observed value range of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub lower: f64,
    pub upper: f64,
}

impl Domain {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Zero-based index into each row.
    pub position: usize,
    /// Data type of every non-missing cell.
    pub column_type: ColumnType,
    /// Value range, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, position: usize, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            position,
            column_type,
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }
}
