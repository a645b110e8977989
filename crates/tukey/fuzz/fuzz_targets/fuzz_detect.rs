//! Fuzz target for detection over arbitrary grouped values.
//!
//! Checks that treated values never fall outside their group's interval when
//! clamping, whatever the input.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tukey::outlier::GroupKey;
use tukey::{
    Cell, ColumnType, DataTable, DetectionScope, ExecutionContext, NumericOutliers, OutlierConfig,
    ReplacementStrategy, TableSchema, TreatmentOptions,
};

#[derive(Debug, Arbitrary)]
struct Input {
    multiplier: u8,
    rows: Vec<(u8, Option<f64>)>,
}

fuzz_target!(|input: Input| {
    if input.rows.len() > 10_000 {
        return;
    }
    let schema = TableSchema::from_pairs([("g", ColumnType::Long), ("v", ColumnType::Double)]);
    let rows = input
        .rows
        .iter()
        .map(|(group, value)| {
            let value = match value {
                Some(v) if v.is_finite() => Cell::Double(*v),
                _ => Cell::Missing,
            };
            vec![Cell::Long(i64::from(group % 4)), value]
        })
        .collect();
    let table = DataTable { schema, rows };

    let config = OutlierConfig::new(["v"])
        .with_group_columns(["g"])
        .with_iqr_multiplier(f64::from(input.multiplier) / 10.0)
        .with_treatment(
            TreatmentOptions::new().with_replacement(ReplacementStrategy::ClampToBoundary),
        );
    let Ok(engine) = NumericOutliers::new(config) else {
        return;
    };
    let Ok(result) = engine.run(&table, &ExecutionContext::new()) else {
        return;
    };

    for row in &result.table.rows {
        let (Some(value), key) = (row[1].as_f64(), GroupKey::new(vec![row[0].clone()])) else {
            continue;
        };
        if let Some(interval) = result.model.interval(&key, "v") {
            assert!(!interval.is_outlier(value, DetectionScope::Both));
        }
    }
});
