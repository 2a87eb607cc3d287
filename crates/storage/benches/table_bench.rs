//! Benchmarks for Table lookups: indexed vs scanned queries, cached reads.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fmt::Write;
use tessera_core::{Row, Value, ValueKind};
use tessera_storage::{Conditions, Table};

const SECTORS: [&str; 5] = ["Tech", "Finance", "Health", "Energy", "Consumer"];

/// Writes `count` rows straight to a table file and loads it, so setup does
/// not pay one file rewrite per row.
fn populate_table(dir: &std::path::Path, count: u64) -> Table {
    let path = dir.join(format!("bench_{}.csv", count));
    let mut text = String::from("id,price,sector,symbol\n");
    for i in 1..=count {
        let _ = writeln!(
            text,
            "{},{},{},SYM{}",
            i,
            i % 1000,
            SECTORS[(i as usize) % SECTORS.len()],
            i
        );
    }
    std::fs::write(&path, text).unwrap();

    let table = Table::new("bench", path);
    table.declare_column_kind("price", ValueKind::Int);
    table.load().unwrap();
    table
}

fn conditions(pairs: &[(&str, Value)]) -> Conditions {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Benchmark: equality query with and without an index
fn table_query_benchmark(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut group = c.benchmark_group("table_query");

    for count in [1000u64, 10000, 100000].iter() {
        let table = populate_table(dir.path(), *count);
        let cond = conditions(&[("price", Value::Int(42)), ("sector", Value::from("Tech"))]);

        group.bench_with_input(BenchmarkId::new("scan", count), &cond, |b, cond| {
            b.iter(|| black_box(table.query(cond)))
        });

        table.create_index("price");
        group.bench_with_input(BenchmarkId::new("single_index", count), &cond, |b, cond| {
            b.iter(|| black_box(table.query(cond)))
        });

        table.create_multi_column_index(&["price", "sector"]);
        group.bench_with_input(BenchmarkId::new("composite_index", count), &cond, |b, cond| {
            b.iter(|| black_box(table.query(cond)))
        });
    }

    group.finish();
}

/// Benchmark: repeated point reads, mostly served from the cache
fn table_get_benchmark(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let table = populate_table(dir.path(), 10000);

    c.bench_function("table_get_hot", |b| {
        b.iter(|| {
            for id in 1..=50u64 {
                black_box(table.get_record(id));
            }
        })
    });

    c.bench_function("table_range_query", |b| {
        let (low, high) = (Value::Int(100), Value::Int(200));
        b.iter(|| black_box(table.range_query("price", Some(&low), Some(&high))))
    });
}

/// Benchmark: insert including the file rewrite
fn table_insert_benchmark(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let table = populate_table(dir.path(), 1000);
    let mut next = 1_000_000u64;

    c.bench_function("table_insert_1000_rows", |b| {
        b.iter(|| {
            next += 1;
            table
                .add_record(Row::new(next).with("price", 1).with("sector", "Tech"))
                .unwrap();
            table.delete_record(next).unwrap();
        })
    });
}

criterion_group!(benches, table_query_benchmark, table_get_benchmark, table_insert_benchmark);
criterion_main!(benches);
