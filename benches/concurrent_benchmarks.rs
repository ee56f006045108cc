//! Concurrent Cache Benchmarks
//!
//! Benchmarks for measuring `FastCache` throughput across access patterns,
//! shard counts and the read-through path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use tiercache::config::FastCacheConfig;
use tiercache::{FastCache, Produced, Ttl, Value};

const CACHE_SIZE: usize = 10_000;
const OPS_PER_THREAD: usize = 1_000;
const THREADS: usize = 8;

fn make_cache(buckets: usize) -> Arc<FastCache> {
    let config = FastCacheConfig::new(NonZeroUsize::new(CACHE_SIZE / buckets).unwrap())
        .with_buckets(buckets)
        .with_auto_cleaner(false);
    Arc::new(FastCache::init(config, None))
}

fn key(i: usize) -> [u8; 8] {
    (i as u64).to_le_bytes()
}

fn populate(cache: &FastCache) {
    for i in 0..CACHE_SIZE {
        cache.set(&key(i), Value::any(i));
    }
}

/// Benchmark concurrent read operations
fn concurrent_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("Concurrent Reads");
    group.throughput(Throughput::Elements((THREADS * OPS_PER_THREAD) as u64));

    let cache = make_cache(16);
    populate(&cache);

    group.bench_function("FastCache", |b| {
        b.iter(|| run_concurrent_reads(Arc::clone(&cache), THREADS, OPS_PER_THREAD));
    });

    group.finish();
}

/// Benchmark concurrent write operations
fn concurrent_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("Concurrent Writes");
    group.throughput(Throughput::Elements((THREADS * OPS_PER_THREAD) as u64));

    let cache = make_cache(16);

    group.bench_function("FastCache", |b| {
        b.iter(|| run_concurrent_writes(Arc::clone(&cache), THREADS, OPS_PER_THREAD));
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn concurrent_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("Concurrent Mixed");
    group.throughput(Throughput::Elements((THREADS * OPS_PER_THREAD) as u64));

    let cache = make_cache(16);
    populate(&cache);

    group.bench_function("FastCache", |b| {
        b.iter(|| run_concurrent_mixed(Arc::clone(&cache), THREADS, OPS_PER_THREAD));
    });

    group.finish();
}

/// Compare throughput across shard counts
fn shard_count_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("Shard Count");
    group.throughput(Throughput::Elements((THREADS * OPS_PER_THREAD) as u64));

    for buckets in [1, 4, 16, 64] {
        let cache = make_cache(buckets);
        populate(&cache);
        group.bench_with_input(
            BenchmarkId::new("buckets", buckets),
            &buckets,
            |b, _| {
                b.iter(|| run_concurrent_mixed(Arc::clone(&cache), THREADS, OPS_PER_THREAD));
            },
        );
    }

    group.finish();
}

/// Read-through under contention: every thread asks for the same cold keys.
fn provide_get_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("Provide Get");
    group.throughput(Throughput::Elements((THREADS * 100) as u64));

    group.bench_function("shared cold keys", |b| {
        b.iter(|| {
            let cache = make_cache(16);
            let mut handles = Vec::with_capacity(THREADS);
            for _ in 0..THREADS {
                let cache = Arc::clone(&cache);
                handles.push(thread::spawn(move || {
                    for i in 0..100 {
                        let v = cache.provide_get(&key(i), Ttl::Default, || {
                            Ok::<_, String>(Produced::Cache(Value::any(i)))
                        });
                        black_box(v.is_ok());
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
}

fn run_concurrent_reads(cache: Arc<FastCache>, num_threads: usize, ops_per_thread: usize) {
    let mut handles = Vec::with_capacity(num_threads);
    for t in 0..num_threads {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..ops_per_thread {
                black_box(cache.get(&key((t * ops_per_thread + i) % CACHE_SIZE)));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

fn run_concurrent_writes(cache: Arc<FastCache>, num_threads: usize, ops_per_thread: usize) {
    let mut handles = Vec::with_capacity(num_threads);
    for t in 0..num_threads {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..ops_per_thread {
                let k = (t * ops_per_thread + i) % CACHE_SIZE;
                cache.set(&key(k), Value::any(k));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

fn run_concurrent_mixed(cache: Arc<FastCache>, num_threads: usize, ops_per_thread: usize) {
    let mut handles = Vec::with_capacity(num_threads);
    for t in 0..num_threads {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..ops_per_thread {
                let k = (t * ops_per_thread + i) % CACHE_SIZE;
                if i % 5 == 0 {
                    cache.set(&key(k), Value::any(k));
                } else {
                    black_box(cache.get(&key(k)));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

criterion_group!(
    benches,
    concurrent_reads,
    concurrent_writes,
    concurrent_mixed,
    shard_count_comparison,
    provide_get_contention
);
criterion_main!(benches);
