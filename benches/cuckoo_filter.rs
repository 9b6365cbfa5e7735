use amq_filters::cuckoo::{CuckooFilter, PackedTable, SingleTable};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

fn bench_insert(c: &mut Criterion) {
    let mut initial_items = 0u64;
    while initial_items < 1024 - 32 {
        c.bench_function(&format!("cuckoo insert at {} items", initial_items), |b| {
            b.iter_batched_ref(
                || {
                    let mut filter = CuckooFilter::<SingleTable>::new(1024);
                    for key in 0..initial_items {
                        filter.insert(key);
                    }
                    filter
                },
                |filter| filter.insert(0xDEAD_BEEF),
                BatchSize::PerIteration,
            )
        });
        initial_items += 256;
    }
}

fn bench_contains(c: &mut Criterion) {
    let mut filter = CuckooFilter::<SingleTable>::new(1 << 16);
    for key in 0..60_000u64 {
        filter.insert(key);
    }
    let mut key = 0u64;
    c.bench_function("cuckoo contains hit", |b| {
        b.iter(|| {
            key = (key + 1) % 60_000;
            filter.contains(key)
        })
    });
    c.bench_function("cuckoo contains miss", |b| {
        b.iter(|| {
            key += 1;
            filter.contains(60_000 + key)
        })
    });
}

fn bench_contains_packed(c: &mut Criterion) {
    let mut filter = CuckooFilter::<PackedTable>::with_bits_per_tag(1 << 16, 13);
    for key in 0..60_000u64 {
        filter.insert(key);
    }
    let mut key = 0u64;
    c.bench_function("packed cuckoo contains hit", |b| {
        b.iter(|| {
            key = (key + 1) % 60_000;
            filter.contains(key)
        })
    });
}

criterion_group!(benches, bench_insert, bench_contains, bench_contains_packed);
criterion_main!(benches);
