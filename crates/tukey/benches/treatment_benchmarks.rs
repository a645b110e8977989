//! Outlier treatment benchmarks.
//!
//! Measures a full estimate-and-treat run per treatment action, and batch
//! against partitioned treatment.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tukey::{
    Cell, ColumnType, DataTable, ExecutionContext, NumericOutliers, OutlierConfig,
    ReplacementStrategy, TableSchema, TreatmentAction, TreatmentOptions,
};

fn generate_table(rows: usize) -> DataTable {
    let mut rng = StdRng::seed_from_u64(7);
    let schema = TableSchema::from_pairs([
        ("site", ColumnType::String),
        ("reading", ColumnType::Long),
    ]);
    let rows = (0..rows)
        .map(|i| {
            let value = if rng.gen_ratio(1, 50) {
                rng.gen_range(1_000..10_000)
            } else {
                rng.gen_range(0..100)
            };
            vec![Cell::Str(format!("site_{}", i % 8)), Cell::Long(value)]
        })
        .collect();
    DataTable { schema, rows }
}

fn engine(treatment: TreatmentOptions) -> NumericOutliers {
    let config = OutlierConfig::new(["reading"])
        .with_group_columns(["site"])
        .with_treatment(treatment);
    NumericOutliers::new(config).unwrap()
}

/// Benchmark each treatment action on the same input.
fn bench_treatment_actions(c: &mut Criterion) {
    let mut group = c.benchmark_group("treatment");
    let table = generate_table(50_000);
    let ctx = ExecutionContext::new();
    group.throughput(Throughput::Elements(table.row_count() as u64));

    let actions = [
        ("set_missing", TreatmentOptions::new()),
        (
            "clamp",
            TreatmentOptions::new().with_replacement(ReplacementStrategy::ClampToBoundary),
        ),
        (
            "filter",
            TreatmentOptions::new().with_action(TreatmentAction::FilterOutlierRows),
        ),
        (
            "retain",
            TreatmentOptions::new().with_action(TreatmentAction::RetainOutlierRows),
        ),
    ];
    for (name, treatment) in actions {
        let engine = engine(treatment);
        group.bench_function(name, |b| b.iter(|| black_box(engine.run(&table, &ctx).unwrap())));
    }

    group.finish();
}

/// Benchmark partitioned treatment against a single partition.
fn bench_partitions(c: &mut Criterion) {
    let mut group = c.benchmark_group("partitions");
    let table = generate_table(200_000);
    let ctx = ExecutionContext::new();
    let engine = engine(TreatmentOptions::new().with_update_domain(true));
    group.throughput(Throughput::Elements(table.row_count() as u64));

    for partitions in [1, 2, 4, 8].iter() {
        group.bench_with_input(BenchmarkId::new("count", partitions), partitions, |b, &n| {
            b.iter(|| black_box(engine.run_partitioned(&table, n, &ctx).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_treatment_actions, bench_partitions);
criterion_main!(benches);
