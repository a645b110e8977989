//! Column type inference and typed cell parsing.

use std::collections::HashMap;

use crate::error::{Result, TukeyError};
use crate::input::DataTable;
use crate::schema::{Cell, ColumnType};

/// Result of inferring the type of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInference {
    /// Inferred data type.
    pub column_type: ColumnType,
    /// Share of non-null values whose own type matches the most common type.
    pub confidence: f64,
    /// Number of null/missing values.
    pub null_count: usize,
}

/// Infers column types from raw text values.
#[derive(Debug, Clone)]
pub struct TypeInferrer {
    /// Recognize true/false/yes/no as booleans.
    detect_booleans: bool,
}

impl TypeInferrer {
    /// Create a new type inferrer with default settings.
    pub fn new() -> Self {
        Self {
            detect_booleans: true,
        }
    }

    /// Disable boolean detection; such columns become strings.
    pub fn without_booleans(mut self) -> Self {
        self.detect_booleans = false;
        self
    }

    /// Infer the type of a column from its raw values.
    ///
    /// Integers that all fit in 32 bits stay `Int`, otherwise `Long`; any
    /// floating value among integers promotes the column to `Double`. A
    /// column mixing numbers with text or booleans is a `String` column, as
    /// is a column without any non-null value.
    pub fn infer_column<'a>(&self, values: impl IntoIterator<Item = &'a str>) -> TypeInference {
        let mut type_counts: HashMap<ColumnType, usize> = HashMap::new();
        let mut null_count = 0;
        let mut total = 0usize;

        for value in values {
            if DataTable::is_null_value(value) {
                null_count += 1;
                continue;
            }
            total += 1;
            *type_counts.entry(self.detect_value_type(value)).or_insert(0) += 1;
        }

        if total == 0 {
            return TypeInference {
                column_type: ColumnType::String,
                confidence: 0.0,
                null_count,
            };
        }

        let count_of = |t: ColumnType| type_counts.get(&t).copied().unwrap_or(0);
        let numeric = count_of(ColumnType::Int) + count_of(ColumnType::Long) + count_of(ColumnType::Double);

        let column_type = if numeric == total {
            if count_of(ColumnType::Double) > 0 {
                ColumnType::Double
            } else if count_of(ColumnType::Long) > 0 {
                ColumnType::Long
            } else {
                ColumnType::Int
            }
        } else if count_of(ColumnType::Boolean) == total {
            ColumnType::Boolean
        } else {
            ColumnType::String
        };

        let best = type_counts.values().copied().max().unwrap_or(0);
        let confidence = if column_type.is_numeric() {
            1.0
        } else {
            best as f64 / total as f64
        };

        TypeInference {
            column_type,
            confidence,
            null_count,
        }
    }

    /// Detect the type of a single value.
    pub fn detect_value_type(&self, value: &str) -> ColumnType {
        let trimmed = value.trim();

        if self.detect_booleans && parse_bool(trimmed).is_some() {
            return ColumnType::Boolean;
        }

        if let Ok(v) = trimmed.parse::<i64>() {
            return if i32::try_from(v).is_ok() {
                ColumnType::Int
            } else {
                ColumnType::Long
            };
        }

        if trimmed.parse::<f64>().is_ok() {
            return ColumnType::Double;
        }

        ColumnType::String
    }

    /// Parse a raw value into a cell of the given type.
    ///
    /// Null markers become `Cell::Missing`. `row` and `column` only feed the error.
    pub fn parse_cell(
        &self,
        raw: &str,
        column_type: ColumnType,
        row: usize,
        column: usize,
    ) -> Result<Cell> {
        if DataTable::is_null_value(raw) {
            return Ok(Cell::Missing);
        }
        let trimmed = raw.trim();
        let fail = |what: &str| TukeyError::Parse {
            row,
            column,
            message: format!("'{}' is not a valid {}", trimmed, what),
        };

        let cell = match column_type {
            ColumnType::Int => Cell::Int(trimmed.parse().map_err(|_| fail("int"))?),
            ColumnType::Long => Cell::Long(trimmed.parse().map_err(|_| fail("long"))?),
            ColumnType::Double => Cell::Double(trimmed.parse().map_err(|_| fail("double"))?),
            ColumnType::Boolean => Cell::Bool(parse_bool(trimmed).ok_or_else(|| fail("boolean"))?),
            ColumnType::String => Cell::Str(raw.to_string()),
        };
        Ok(cell)
    }
}

impl Default for TypeInferrer {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}
