//! Schema types for typed tabular data.

mod column;
mod table;
mod types;

pub use column::{ColumnSchema, Domain};
pub use table::TableSchema;
pub use types::{Cell, ColumnType};
