//! Throughput Benchmark for clonekv
//!
//! Measures the storage engine and the dispatcher under a few workloads.
//! Benchmarks unwrap storage results: the in-memory engine only fails on a
//! poisoned lock.

use bytes::Bytes;
use clonekv::commands::CommandHandler;
use clonekv::storage::{MemoryStorage, SetCondition, Storage};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(MemoryStorage::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            engine.set(key, Bytes::from("small_value"), None).unwrap();
            i += 1;
        });
    });

    group.bench_function("set_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("ttl:{}", i));
            engine
                .set(key, Bytes::from("value"), Some(Duration::from_secs(3600)))
                .unwrap();
            i += 1;
        });
    });

    group.bench_function("set_nx_contended", |b| {
        b.iter(|| {
            black_box(
                engine
                    .set_if(Bytes::from("lock"), Bytes::from("v"), None, SetCondition::IfAbsent)
                    .unwrap(),
            );
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let engine = Arc::new(MemoryStorage::new());

    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        engine.set(key, value, None).unwrap();
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(engine.get(key.as_bytes()).unwrap());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(engine.get(key.as_bytes()).unwrap());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access through the single lock
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let engine = Arc::new(MemoryStorage::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            engine.set(key.clone(), Bytes::from("value"), None).unwrap();
                            black_box(engine.get(&key).unwrap());
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(engine.len().unwrap());
        });
    });

    group.finish();
}

/// Benchmark full command execution including reply encoding
fn bench_dispatch(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(MemoryStorage::new()));
    handler.execute(&["SET", "name", "GoClone"]);

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_ex_nx", |b| {
        b.iter(|| {
            black_box(
                handler
                    .execute(&["SET", "lock", "v", "EX", "30", "NX"])
                    .serialize(),
            );
        });
    });

    group.bench_function("get", |b| {
        b.iter(|| {
            black_box(handler.execute(&["GET", "name"]).serialize());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_set, bench_get, bench_concurrent, bench_dispatch);

criterion_main!(benches);
