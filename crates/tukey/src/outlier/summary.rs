//! Summary table: member and outlier counts with the permitted interval.

use super::group::GroupKey;
use super::model::Interval;
use super::reviser::PartitionState;
use crate::input::{DataTable, Row};
use crate::schema::{Cell, ColumnSchema, ColumnType, TableSchema};

pub const OUTLIER_COLUMN: &str = "Outlier column";
pub const MEMBER_COUNT: &str = "Member count";
pub const OUTLIER_COUNT: &str = "Outlier count";
pub const LOWER_BOUND: &str = "Lower bound";
pub const UPPER_BOUND: &str = "Upper bound";

/// One (outlier column, group) line of the summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub column: String,
    pub group: GroupKey,
    pub members: u64,
    pub outliers: u64,
    /// `None` when the model has no interval for this pair.
    pub interval: Option<Interval>,
}

impl SummaryRow {
    fn into_row(self) -> Row {
        let mut row = Vec::with_capacity(self.group.len() + 5);
        row.push(Cell::Str(self.column));
        row.extend(self.group.cells().iter().cloned());
        row.push(Cell::Long(self.members as i64));
        row.push(Cell::Long(self.outliers as i64));
        match self.interval {
            Some(interval) => {
                row.push(Cell::Double(interval.lower));
                row.push(Cell::Double(interval.upper));
            }
            None => {
                row.push(Cell::Missing);
                row.push(Cell::Missing);
            }
        }
        row
    }
}

/// Summary lines for `columns`, in deterministic order.
///
/// Per column: every group of the model in model order, then every group
/// seen only through the missing-groups counter (under any column), whose
/// member count comes from that counter and whose bounds are missing.
pub fn summary_rows(state: &PartitionState, columns: &[String]) -> Vec<SummaryRow> {
    let model = state.model();
    let unknown = state.missing_groups.group_keys();
    let mut rows = Vec::new();
    for column in columns {
        for (key, intervals) in model.groups() {
            rows.push(SummaryRow {
                column: column.clone(),
                group: key.clone(),
                members: state.members.get(column, key),
                outliers: state.outliers.get(column, key),
                interval: intervals.get(column).copied(),
            });
        }
        for key in &unknown {
            debug_assert!(!model.contains_group(key));
            rows.push(SummaryRow {
                column: column.clone(),
                group: key.clone(),
                members: state.missing_groups.get(column, key),
                outliers: state.outliers.get(column, key),
                interval: None,
            });
        }
    }
    rows
}

/// Schema of the summary table; group columns keep their types.
pub fn summary_schema(group_columns: &[ColumnSchema]) -> TableSchema {
    let mut columns = vec![ColumnSchema::new(OUTLIER_COLUMN, 0, ColumnType::String)];
    columns.extend(group_columns.iter().map(|c| {
        let mut column = c.clone();
        column.domain = None;
        column
    }));
    columns.push(ColumnSchema::new(MEMBER_COUNT, 0, ColumnType::Long));
    columns.push(ColumnSchema::new(OUTLIER_COUNT, 0, ColumnType::Long));
    columns.push(ColumnSchema::new(LOWER_BOUND, 0, ColumnType::Double));
    columns.push(ColumnSchema::new(UPPER_BOUND, 0, ColumnType::Double));
    TableSchema::with_columns(columns)
}

/// Render the summary of `state` for `columns` as a table.
pub fn build_summary(state: &PartitionState, columns: &[String]) -> DataTable {
    let schema = summary_schema(state.model().group_columns());
    let rows = summary_rows(state, columns)
        .into_iter()
        .map(SummaryRow::into_row)
        .collect();
    DataTable { schema, rows }
}
