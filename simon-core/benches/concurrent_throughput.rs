use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use simon_core::Manager;

/// Concurrent increments of one counter with varying thread counts
fn bench_concurrent_increments(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_increments");

    for thread_count in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(*thread_count as u64 * 1000));
        group.bench_with_input(
            BenchmarkId::new("threads", thread_count),
            thread_count,
            |b, &thread_count| {
                b.iter(|| {
                    let manager = Manager::new();
                    let counter = Arc::new(manager.get_counter("bench.shared").unwrap());

                    let workers: Vec<_> = (0..thread_count)
                        .map(|_| {
                            let counter = Arc::clone(&counter);
                            thread::spawn(move || {
                                for _ in 0..1000 {
                                    black_box(&counter).increment();
                                }
                            })
                        })
                        .collect();

                    for worker in workers {
                        worker.join().unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

/// Concurrent splits on one stopwatch
fn bench_concurrent_splits(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_splits");

    for thread_count in [2, 4, 8].iter() {
        group.throughput(Throughput::Elements(*thread_count as u64 * 1000));
        group.bench_with_input(
            BenchmarkId::from_parameter(thread_count),
            thread_count,
            |b, &thread_count| {
                b.iter(|| {
                    let manager = Manager::new();
                    let stopwatch = manager.get_stopwatch("bench.shared").unwrap();

                    thread::scope(|s| {
                        for _ in 0..thread_count {
                            s.spawn(|| {
                                for _ in 0..1000 {
                                    let mut split = stopwatch.start();
                                    black_box(split.stop());
                                }
                            });
                        }
                    });
                });
            },
        );
    }
    group.finish();
}

/// Each thread records against its own monitor (low contention)
fn bench_concurrent_distinct_monitors(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_distinct_monitors");

    for thread_count in [2, 4, 8].iter() {
        group.throughput(Throughput::Elements(*thread_count as u64 * 1000));
        group.bench_with_input(
            BenchmarkId::from_parameter(thread_count),
            thread_count,
            |b, &thread_count| {
                b.iter(|| {
                    let manager = Manager::new();

                    thread::scope(|s| {
                        for thread_id in 0..thread_count {
                            let manager = &manager;
                            s.spawn(move || {
                                let counter = manager
                                    .get_counter(&format!("bench.thread{}", thread_id))
                                    .unwrap();
                                for _ in 0..1000 {
                                    counter.increment();
                                }
                            });
                        }
                    });
                });
            },
        );
    }
    group.finish();
}

/// Writers racing a thread that repeatedly collects snapshots
fn bench_concurrent_with_collect(c: &mut Criterion) {
    c.bench_function("concurrent_with_collect", |b| {
        b.iter(|| {
            let manager = Manager::new();

            thread::scope(|s| {
                for thread_id in 0..4 {
                    let manager = &manager;
                    s.spawn(move || {
                        let stopwatch = manager
                            .get_stopwatch(&format!("bench.writer{}", thread_id))
                            .unwrap();
                        for i in 0..500 {
                            stopwatch.add(i);
                        }
                    });
                }
                s.spawn(|| {
                    for _ in 0..10 {
                        black_box(manager.collect());
                    }
                });
            });
        });
    });
}

criterion_group!(
    benches,
    bench_concurrent_increments,
    bench_concurrent_splits,
    bench_concurrent_distinct_monitors,
    bench_concurrent_with_collect
);
criterion_main!(benches);
