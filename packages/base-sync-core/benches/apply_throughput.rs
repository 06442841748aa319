//! Ingest throughput benchmarks for the synchronization engine.
//!
//! Each accepted notification clones the replica once, so cost grows with
//! replica size rather than batch size for small batches.

use base_sync_core::{
    Base, Field, FieldType, Record, SyncEngine, SyncNotification, Table,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::hint::black_box;

/// Creates a base with one table holding `records` records.
fn create_base(records: usize) -> Base {
    let mut table = Table::new("T1", "Bench")
        .with_field(Field::new("F1", "Name", FieldType::SingleLineText))
        .with_field(Field::new("F2", "Count", FieldType::Number));
    for i in 0..records {
        table = table.with_record(
            Record::new(format!("R{}", i))
                .with_cell("F1", json!(format!("row {}", i)))
                .with_cell("F2", json!(i)),
        );
    }
    Base::new("B1", "Bench").with_table(table)
}

/// Builds a notification of `changes` record updates.
fn record_updates(number: u64, changes: usize) -> SyncNotification {
    let changes: Vec<_> = (0..changes)
        .map(|i| {
            json!({
                "type": "update",
                "resourceAddress": {
                    "is": "record",
                    "tableId": "T1",
                    "recordId": format!("R{}", i)
                },
                "data": { "cells": { "F2": i * 2 } }
            })
        })
        .collect();
    SyncNotification::from_value(json!({ "number": number, "changes": changes }))
        .expect("benchmark notification must decode")
}

/// Benchmark: one batch of updates against replicas of increasing size
fn benchmark_ingest_by_replica_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_by_replica_size");
    for records in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(records), &records, |b, &records| {
            let engine = SyncEngine::default();
            engine.install_snapshot(create_base(records));
            let mut number = 0u64;
            b.iter(|| {
                number += 1;
                let report = engine.ingest(&record_updates(number, 10));
                black_box(report);
            });
        });
    }
    group.finish();
}

/// Benchmark: batches of increasing size against a fixed replica
fn benchmark_ingest_by_batch_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_by_batch_size");
    for changes in [1usize, 50, 500] {
        let notifications: Vec<_> = (1..=64)
            .map(|n| record_updates(n, changes))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(changes), &changes, |b, _| {
            b.iter(|| {
                let engine = SyncEngine::default();
                engine.install_snapshot(create_base(1_000));
                for notification in &notifications {
                    black_box(engine.ingest(notification));
                }
            });
        });
    }
    group.finish();
}

/// Benchmark: rejected duplicates should cost only the gate check
fn benchmark_duplicate_rejection(c: &mut Criterion) {
    let engine = SyncEngine::default();
    engine.install_snapshot(create_base(1_000));
    let notification = record_updates(1, 10);
    engine.ingest(&notification);

    c.bench_function("duplicate_rejection", |b| {
        b.iter(|| black_box(engine.ingest(black_box(&notification))));
    });
}

criterion_group!(
    benches,
    benchmark_ingest_by_replica_size,
    benchmark_ingest_by_batch_size,
    benchmark_duplicate_rejection
);
criterion_main!(benches);
