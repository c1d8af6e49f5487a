use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::thread;
use warehouse_core::cache::{Cache, EvictionPolicy};

fn new_cache(limit: usize, policy: EvictionPolicy) -> Cache<String, i32> {
    Cache::builder(limit).eviction(policy).build()
}

fn bench_insert_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_sequential");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("Fifo", size), size, |b, &size| {
            b.iter(|| {
                let cache = new_cache(size, EvictionPolicy::Fifo);
                for i in 0..size {
                    cache.insert(format!("key{}", i), black_box(i as i32), &[]).unwrap();
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("Lru", size), size, |b, &size| {
            b.iter(|| {
                let cache = new_cache(size, EvictionPolicy::Lru);
                for i in 0..size {
                    cache.insert(format!("key{}", i), black_box(i as i32), &[]).unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_find_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_sequential");

    for size in [10, 100, 1000].iter() {
        let cache = new_cache(*size, EvictionPolicy::Fifo);
        for i in 0..*size {
            cache.insert(format!("key{}", i), i as i32, &[]).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("Fifo", size), size, |b, &size| {
            b.iter(|| {
                for i in 0..size {
                    black_box(cache.find(&format!("key{}", i)));
                }
            });
        });

        let lru_cache = new_cache(*size, EvictionPolicy::Lru);
        for i in 0..*size {
            lru_cache.insert(format!("key{}", i), i as i32, &[]).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("Lru", size), size, |b, &size| {
            b.iter(|| {
                for i in 0..size {
                    black_box(lru_cache.find(&format!("key{}", i)));
                }
            });
        });
    }

    group.finish();
}

fn bench_concurrent_reads(c: &mut Criterion) {
    use std::sync::Arc;

    let mut group = c.benchmark_group("concurrent_reads");

    for num_threads in [2, 4, 8].iter() {
        let cache = Arc::new(new_cache(100, EvictionPolicy::Fifo));
        for i in 0..100 {
            cache.insert(format!("key{}", i), i as i32, &[]).unwrap();
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let cache = Arc::clone(&cache);
                            thread::spawn(move || {
                                for i in 0..100 {
                                    black_box(cache.find(&format!("key{}", i % 100)));
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_concurrent_mixed(c: &mut Criterion) {
    use std::sync::Arc;

    let mut group = c.benchmark_group("concurrent_mixed");

    for num_threads in [2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let cache = Arc::new(new_cache(100 * num_threads, EvictionPolicy::Fifo));
                    let handles: Vec<_> = (0..num_threads)
                        .map(|thread_id| {
                            let cache = Arc::clone(&cache);
                            thread::spawn(move || {
                                for i in 0..50 {
                                    if i % 2 == 0 {
                                        cache
                                            .insert(
                                                format!("key{}", thread_id * 50 + i),
                                                black_box(i as i32),
                                                &[],
                                            )
                                            .unwrap();
                                    } else {
                                        black_box(cache.find(&format!("key{}", thread_id * 50 + i)));
                                    }
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction");

    group.bench_function("Fifo_eviction", |b| {
        b.iter(|| {
            let cache = new_cache(50, EvictionPolicy::Fifo);
            for i in 0..100 {
                cache.insert(format!("key{}", i), black_box(i as i32), &[]).unwrap();
            }
        });
    });

    group.bench_function("Lru_eviction", |b| {
        b.iter(|| {
            let cache = new_cache(50, EvictionPolicy::Lru);
            for i in 0..100 {
                cache.insert(format!("key{}", i), black_box(i as i32), &[]).unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_sequential,
    bench_find_sequential,
    bench_concurrent_reads,
    bench_concurrent_mixed,
    bench_eviction
);
criterion_main!(benches);
