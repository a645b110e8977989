//! Core type definitions for cells and column types.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Data type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// 32-bit signed integers.
    Int,
    /// 64-bit signed integers.
    Long,
    /// Double precision floating point numbers.
    Double,
    /// Text values.
    String,
    /// Boolean values (true/false).
    Boolean,
}

impl ColumnType {
    /// Returns true if outlier detection can run on this type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Int | ColumnType::Long | ColumnType::Double)
    }

    /// Returns true for the integer types, whose bounds are rounded into the integer domain.
    pub fn is_integral(&self) -> bool {
        matches!(self, ColumnType::Int | ColumnType::Long)
    }

    /// Stable one-byte tag used by the binary codec.
    pub(crate) fn tag(&self) -> u8 {
        match self {
            ColumnType::Int => 0,
            ColumnType::Long => 1,
            ColumnType::Double => 2,
            ColumnType::String => 3,
            ColumnType::Boolean => 4,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ColumnType::Int),
            1 => Some(ColumnType::Long),
            2 => Some(ColumnType::Double),
            3 => Some(ColumnType::String),
            4 => Some(ColumnType::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Int => "int",
            ColumnType::Long => "long",
            ColumnType::Double => "double",
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A single typed value in a table, or the missing-value marker.
///
/// Equality and hashing are by value. Doubles compare by bit pattern with
/// `-0.0` folded into `0.0`, so a cell can be used inside a group key.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Missing,
    Int(i32),
    Long(i64),
    Double(f64),
    Str(String),
    Bool(bool),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Numeric value widened to f64. `None` for missing and non-numeric cells.
    ///
    /// Longs beyond 2^53 lose precision here; intervals are computed the same way.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(f64::from(*v)),
            Cell::Long(v) => Some(*v as f64),
            Cell::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// The column type this cell belongs to, `None` for missing cells.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Cell::Missing => None,
            Cell::Int(_) => Some(ColumnType::Int),
            Cell::Long(_) => Some(ColumnType::Long),
            Cell::Double(_) => Some(ColumnType::Double),
            Cell::Str(_) => Some(ColumnType::String),
            Cell::Bool(_) => Some(ColumnType::Boolean),
        }
    }

    /// Build a numeric cell of the given column type from a double.
    ///
    /// Integer types truncate toward zero; callers round beforehand.
    pub fn numeric(column_type: ColumnType, value: f64) -> Cell {
        match column_type {
            ColumnType::Int => Cell::Int(value as i32),
            ColumnType::Long => Cell::Long(value as i64),
            _ => Cell::Double(value),
        }
    }

    fn normalized_bits(value: f64) -> u64 {
        if value == 0.0 { 0.0f64.to_bits() } else { value.to_bits() }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Missing, Cell::Missing) => true,
            (Cell::Int(a), Cell::Int(b)) => a == b,
            (Cell::Long(a), Cell::Long(b)) => a == b,
            (Cell::Double(a), Cell::Double(b)) => {
                Cell::normalized_bits(*a) == Cell::normalized_bits(*b)
            }
            (Cell::Str(a), Cell::Str(b)) => a == b,
            (Cell::Bool(a), Cell::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Cell::Missing => {}
            Cell::Int(v) => v.hash(state),
            Cell::Long(v) => v.hash(state),
            Cell::Double(v) => Cell::normalized_bits(*v).hash(state),
            Cell::Str(v) => v.hash(state),
            Cell::Bool(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Long(v) => write!(f, "{}", v),
            Cell::Double(v) => write!(f, "{}", v),
            Cell::Str(v) => f.write_str(v),
            Cell::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<i32> for Cell {
    fn from(v: i32) -> Self {
        Cell::Int(v)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Long(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Double(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Str(v.to_string())
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Cell::Missing, Into::into)
    }
}
