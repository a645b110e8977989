//! Ordered column schemas of a table.

use serde::{Deserialize, Serialize};

use super::column::ColumnSchema;
use super::types::ColumnType;
use crate::error::{Result, TukeyError};

/// Schema for an entire table: ordered, uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Positions are renumbered to match the order of `columns`.
    pub fn with_columns(columns: Vec<ColumnSchema>) -> Self {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(position, mut column)| {
                column.position = position;
                column
            })
            .collect();
        Self { columns }
    }

    /// Build a schema from `(name, type)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, ColumnType)>) -> Self {
        Self::with_columns(
            pairs
                .into_iter()
                .map(|(name, column_type)| ColumnSchema::new(name, 0, column_type))
                .collect(),
        )
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut ColumnSchema> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// The named column, or `ColumnNotFound`.
    pub fn require(&self, name: &str) -> Result<&ColumnSchema> {
        self.get_column(name)
            .ok_or_else(|| TukeyError::ColumnNotFound(name.to_string()))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Numeric columns, in table order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.iter().filter(|c| c.column_type.is_numeric())
    }
}
