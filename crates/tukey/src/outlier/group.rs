//! Group identity of a row.

use std::fmt;

use crate::error::Result;
use crate::input::Row;
use crate::schema::{Cell, ColumnSchema, TableSchema};

/// Ordered tuple of a row's group-column values.
///
/// The empty key stands for the single implicit group used when no group
/// columns are configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GroupKey(Vec<Cell>);

impl GroupKey {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self(cells)
    }

    /// The key of the implicit global group.
    pub fn global() -> Self {
        Self(Vec::new())
    }

    pub fn cells(&self) -> &[Cell] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Cell>> for GroupKey {
    fn from(cells: Vec<Cell>) -> Self {
        Self(cells)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<all>");
        }
        for (i, cell) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if cell.is_missing() {
                f.write_str("?")?;
            } else {
                write!(f, "{}", cell)?;
            }
        }
        Ok(())
    }
}

/// Resolves group column positions once and builds keys per row.
#[derive(Debug, Clone)]
pub struct GroupKeyIndex {
    columns: Vec<ColumnSchema>,
}

impl GroupKeyIndex {
    /// Resolve the group columns against `schema`.
    pub fn new(schema: &TableSchema, group_columns: &[String]) -> Result<Self> {
        let columns = group_columns
            .iter()
            .map(|name| schema.require(name).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }

    /// Schemas of the group columns, in configured order.
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    /// Build the key for one row. Missing group values are part of the key.
    pub fn key_for(&self, row: &Row) -> GroupKey {
        GroupKey(
            self.columns
                .iter()
                .map(|c| row.get(c.position).cloned().unwrap_or(Cell::Missing))
                .collect(),
        )
    }
}
