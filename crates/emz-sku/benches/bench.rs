use core::hint::black_box;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use emz_sku::{CodeDeriver, Prefix, SequenceStore, SkuAllocator, backend::MemoryBackend};
use futures::future::try_join_all;
use tokio::runtime::Builder;

// Allocations per benchmark iteration.
const TOTAL_ALLOCATIONS: usize = 1024;

const INPUTS: &[(&str, &str)] = &[
    ("Louis Vuitton", "Speedy Bandouliere 25"),
    ("Chanel", "Classic Flap Wallet"),
    ("Hermès", "Birkin 30"),
    ("No Name Atelier", "Odeon Tote"),
    ("", ""),
];

fn bench_derive(c: &mut Criterion) {
    let deriver = CodeDeriver::default();
    let mut group = c.benchmark_group("derive");
    group.throughput(Throughput::Elements(INPUTS.len() as u64));
    group.bench_function("prefix", |b| {
        b.iter(|| {
            for (brand, model) in INPUTS {
                black_box(deriver.prefix(black_box(brand), black_box(model)));
            }
        });
    });
    group.finish();
}

fn bench_memory_allocate(c: &mut Criterion) {
    let runtime = Builder::new_multi_thread().enable_all().build().unwrap();
    let mut group = c.benchmark_group("memory/allocate");
    group.throughput(Throughput::Elements(TOTAL_ALLOCATIONS as u64));

    group.bench_function(BenchmarkId::new("sequential", TOTAL_ALLOCATIONS), |b| {
        b.to_async(&runtime).iter(|| async {
            let store = MemoryBackend::new();
            let prefix = Prefix::new("LV", "SPD");
            for _ in 0..TOTAL_ALLOCATIONS {
                black_box(store.allocate(&prefix).await.unwrap());
            }
        });
    });

    for tasks in [8, 64] {
        group.bench_function(BenchmarkId::new("tasks", tasks), |b| {
            b.to_async(&runtime).iter(|| async move {
                let allocator = SkuAllocator::new(MemoryBackend::new());
                let handles = (0..tasks).map(|_| {
                    let allocator = allocator.clone();
                    tokio::spawn(async move {
                        for _ in 0..TOTAL_ALLOCATIONS / tasks {
                            black_box(allocator.allocate("Chanel", "Boy Bag").await?);
                        }
                        emz_sku::Result::Ok(())
                    })
                });
                for joined in try_join_all(handles).await.unwrap() {
                    joined.unwrap();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_derive, bench_memory_allocate);
criterion_main!(benches);
