use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use leafline::BPlusTreeMap;
use std::collections::BTreeMap;

const N: usize = 10_000;

// ─── Helper functions to generate key sequences ─────────────────────────────

fn ordered_keys(n: usize) -> Vec<i64> {
    (0..n as i64).collect()
}

fn random_keys(n: usize) -> Vec<i64> {
    // Simple LCG for a deterministic pseudo-random sequence
    let mut keys = Vec::with_capacity(n);
    let mut x: u64 = 12345;
    for _ in 0..n {
        x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
        keys.push((x >> 33) as i64);
    }
    keys
}

// ─── Insert benchmarks ──────────────────────────────────────────────────────

fn bench_insert_ordered(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_ordered");

    group.bench_function(BenchmarkId::new("BPlusTreeMap", N), |b| {
        b.iter(|| {
            let mut map = BPlusTreeMap::with_order(64);
            for i in 0..N as i64 {
                map.insert(i, i);
            }
            map
        });
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| {
            let mut map = BTreeMap::new();
            for i in 0..N as i64 {
                map.insert(i, i);
            }
            map
        });
    });

    group.finish();
}

fn bench_insert_random(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_random");
    let keys = random_keys(N);

    group.bench_function(BenchmarkId::new("BPlusTreeMap", N), |b| {
        b.iter(|| {
            let mut map = BPlusTreeMap::with_order(64);
            for &k in &keys {
                map.insert(k, k);
            }
            map
        });
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| {
            let mut map = BTreeMap::new();
            for &k in &keys {
                map.insert(k, k);
            }
            map
        });
    });

    group.finish();
}

// ─── Lookup benchmarks ──────────────────────────────────────────────────────

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    let keys = random_keys(N);

    let mut bp_map = BPlusTreeMap::with_order(64);
    let mut bt_map = BTreeMap::new();
    for &k in &keys {
        bp_map.insert(k, k);
        bt_map.insert(k, k);
    }

    group.bench_function(BenchmarkId::new("BPlusTreeMap", N), |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for k in &keys {
                if bp_map.get(k).is_some() {
                    hits += 1;
                }
            }
            hits
        });
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for k in &keys {
                if bt_map.get(k).is_some() {
                    hits += 1;
                }
            }
            hits
        });
    });

    group.finish();
}

// ─── Removal benchmarks ─────────────────────────────────────────────────────

fn bench_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove");
    let keys = random_keys(N);

    group.bench_function(BenchmarkId::new("BPlusTreeMap", N), |b| {
        b.iter_batched(
            || {
                let mut map = BPlusTreeMap::with_order(64);
                for &k in &keys {
                    map.insert(k, k);
                }
                map
            },
            |mut map| {
                for k in &keys {
                    map.remove(k);
                }
                map
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter_batched(
            || {
                let mut map = BTreeMap::new();
                for &k in &keys {
                    map.insert(k, k);
                }
                map
            },
            |mut map| {
                for k in &keys {
                    map.remove(k);
                }
                map
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

// ─── Traversal benchmarks ───────────────────────────────────────────────────

fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");
    let keys = random_keys(N);

    let mut bp_map = BPlusTreeMap::with_order(64);
    let mut bt_map = BTreeMap::new();
    for &k in &keys {
        bp_map.insert(k, k);
        bt_map.insert(k, k);
    }

    group.bench_function(BenchmarkId::new("BPlusTreeMap", N), |b| {
        b.iter(|| bp_map.iter().map(|(_, v)| *v).sum::<i64>());
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| bt_map.iter().map(|(_, v)| *v).sum::<i64>());
    });

    group.finish();
}

// ─── Bulk loading vs repeated insertion ─────────────────────────────────────

fn bench_bulk_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_load");
    let keys = ordered_keys(N);

    group.bench_function(BenchmarkId::new("bulk_load", N), |b| {
        b.iter(|| {
            let mut map = BPlusTreeMap::with_order(64);
            map.bulk_load(keys.iter().map(|&k| (k, k)));
            map
        });
    });

    group.bench_function(BenchmarkId::new("insert_each", N), |b| {
        b.iter(|| {
            let mut map = BPlusTreeMap::with_order(64);
            for &k in &keys {
                map.insert(k, k);
            }
            map
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_ordered,
    bench_insert_random,
    bench_get,
    bench_remove,
    bench_iterate,
    bench_bulk_load
);
criterion_main!(benches);
