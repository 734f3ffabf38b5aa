//! Criterion benchmarks for rust_sqlite_driver

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_sqlite_driver::prelude::*;

fn memory_db(rows: usize) -> Connection {
    let conn = Connection::open(":memory:").expect("open");
    conn.execute("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, score REAL)")
        .expect("create");
    conn.begin().expect("begin");
    for i in 0..rows {
        conn.prepare(
            "INSERT INTO items (name, score) VALUES (?, ?)",
            params![format!("item-{i}"), i as f64 * 0.5],
        )
        .and_then(|mut stmt| stmt.all())
        .expect("insert");
    }
    conn.commit().expect("commit");
    conn
}

// ============================================================================
// Value Creation Benchmarks
// ============================================================================

fn bench_value_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_creation");
    group.throughput(Throughput::Elements(1));

    group.bench_function("int64", |b| {
        b.iter(|| black_box(Value::from(black_box(123456789i64))));
    });

    group.bench_function("text", |b| {
        b.iter(|| black_box(Value::from(black_box("hello world"))));
    });

    group.bench_function("opaque", |b| {
        b.iter(|| black_box(Value::opaque(black_box(vec![1u32, 2, 3]))));
    });

    group.finish();
}

// ============================================================================
// Statement Benchmarks
// ============================================================================

fn bench_prepared_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepared_insert");

    for size in [10usize, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("reuse", size), size, |b, &size| {
            b.iter(|| {
                let conn = memory_db(0);
                conn.begin().expect("begin");
                let mut stmt = conn
                    .prepare("INSERT INTO items (name, score) VALUES (?, ?)", &[])
                    .expect("prepare");
                for i in 0..size {
                    stmt.bind(1, params!["bench", i as f64]).expect("bind");
                    stmt.step().expect("step");
                }
                stmt.finalize().expect("finalize");
                conn.commit().expect("commit");
            });
        });
    }

    group.finish();
}

fn bench_select_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_all");

    for size in [100usize, 1000].iter() {
        let conn = memory_db(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut rows = Vec::with_capacity(*size);
                conn.execute_with("SELECT id, name, score FROM items", |_, row| {
                    rows.push(row.to_vec());
                    Ok(())
                })
                .expect("select");
                black_box(rows)
            });
        });
    }

    group.finish();
}

// ============================================================================
// Backup Benchmarks
// ============================================================================

fn bench_full_backup(c: &mut Criterion) {
    let source = memory_db(1000);

    c.bench_function("full_backup_1000_rows", |b| {
        b.iter(|| {
            let dest = Connection::open(":memory:").expect("open");
            dest.load(&source, None).expect("load");
            black_box(dest)
        });
    });
}

criterion_group!(
    benches,
    bench_value_creation,
    bench_prepared_insert,
    bench_select_all,
    bench_full_backup
);

criterion_main!(benches);
