//! In-memory tables and the metadata of the file they were read from.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TukeyError};
use crate::schema::{Cell, ColumnSchema, TableSchema};

/// One record, cells ordered like the table schema.
pub type Row = Vec<Cell>;

/// Raw values read as missing, compared case-insensitively after trimming.
pub const NULL_TOKENS: &[&str] = &["", "?", ".", "-", "na", "n/a", "nan", "null", "none", "nil"];

/// Where a table came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// File name without its directory.
    pub file: String,
    pub path: PathBuf,
    /// `sha256:<hex>` of the raw bytes.
    pub hash: String,
    pub size_bytes: u64,
    /// `csv`, `tsv`, `csv-semicolon`, `psv` or `delimited`.
    pub format: String,
    /// Data records, header excluded.
    pub row_count: usize,
    pub column_count: usize,
    pub read_at: DateTime<Utc>,
}

impl SourceMetadata {
    pub fn new(
        path: PathBuf,
        hash: String,
        size_bytes: u64,
        format: String,
        row_count: usize,
        column_count: usize,
    ) -> Self {
        Self {
            file: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path,
            hash,
            size_bytes,
            format,
            row_count,
            column_count,
            read_at: Utc::now(),
        }
    }
}

/// A schema and its rows, fully in memory.
///
/// Every row holds exactly one cell per schema column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    pub schema: TableSchema,
    pub rows: Vec<Row>,
}

impl DataTable {
    /// Fails with a parse error naming the first row of the wrong width.
    pub fn new(schema: TableSchema, rows: Vec<Row>) -> Result<Self> {
        let width = schema.column_count();
        match rows.iter().position(|r| r.len() != width) {
            Some(idx) => Err(TukeyError::Parse {
                row: idx,
                column: rows[idx].len(),
                message: format!("expected {} cells, found {}", width, rows[idx].len()),
            }),
            None => Ok(Self { schema, rows }),
        }
    }

    pub fn empty(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn column_count(&self) -> usize {
        self.schema.column_count()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> Vec<&str> {
        self.schema.column_names()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.schema.get_column(name)
    }

    /// Cells of the column at `index`, in row order.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Non-missing numeric values of a column, in row order.
    pub fn numeric_values(&self, index: usize) -> Vec<f64> {
        self.column_values(index).filter_map(Cell::as_f64).collect()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row)?.get(col)
    }

    /// Whether raw text is one of the [`NULL_TOKENS`].
    pub fn is_null_value(value: &str) -> bool {
        let trimmed = value.trim();
        NULL_TOKENS.iter().any(|token| trimmed.eq_ignore_ascii_case(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    #[test]
    fn test_rejects_ragged_rows() {
        let schema = TableSchema::from_pairs([("a", ColumnType::Int), ("b", ColumnType::Int)]);
        let result = DataTable::new(schema, vec![vec![Cell::Int(1)]]);
        assert!(matches!(result, Err(TukeyError::Parse { row: 0, .. })));
    }

    #[test]
    fn test_numeric_values_skip_missing() {
        let schema = TableSchema::from_pairs([("v", ColumnType::Double)]);
        let table = DataTable::new(
            schema,
            vec![vec![Cell::Double(1.5)], vec![Cell::Missing], vec![Cell::Double(2.5)]],
        )
        .unwrap();
        assert_eq!(table.numeric_values(0), vec![1.5, 2.5]);
        assert_eq!(table.get(1, 0), Some(&Cell::Missing));
    }

    #[test]
    fn test_is_null_value() {
        assert!(DataTable::is_null_value(""));
        assert!(DataTable::is_null_value("NA"));
        assert!(DataTable::is_null_value("N/A"));
        assert!(DataTable::is_null_value("?"));
        assert!(DataTable::is_null_value("NULL"));
        assert!(!DataTable::is_null_value("0"));
        assert!(!DataTable::is_null_value("value"));
    }
}
