use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use geobin::bins::SpatialBin;
use geobin::collector::{MemoryCollector, SpatialBinCollector, SpillingCollector};

/// 50 batches of 2000 fragments over 20k bin indices, each batch sorted like a binner output.
fn batches(rng: &mut StdRng) -> Vec<Vec<SpatialBin>> {
    (0..50)
        .map(|_| {
            let mut batch: Vec<SpatialBin> = (0..2000)
                .map(|_| SpatialBin {
                    index: rng.random_range(0..20_000),
                    num_obs: rng.random_range(1..20),
                    num_passes: 1,
                    features: (0..5).map(|_| rng.random::<f32>()).collect(),
                })
                .collect();
            batch.sort_by_key(|b| b.index);
            batch
        })
        .collect()
}

fn drain<C: SpatialBinCollector>(collector: C, input: Vec<Vec<SpatialBin>>) -> usize {
    for batch in input {
        collector.consume(batch).unwrap();
    }
    collector
        .complete()
        .unwrap()
        .map(|group| group.unwrap().1.len())
        .sum()
}

fn bench_collectors(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0x5B111);
    let input = batches(&mut rng);

    let mut group = c.benchmark_group("collector");
    group.sample_size(20);

    group.bench_function("memory/100k", |b| {
        b.iter_batched(
            || input.clone(),
            |input| black_box(drain(MemoryCollector::new(), input)),
            BatchSize::LargeInput,
        )
    });

    for threshold in [5_000, 25_000] {
        group.bench_function(format!("spill_{threshold}/100k"), |b| {
            b.iter_batched(
                || input.clone(),
                |input| {
                    let collector = SpillingCollector::new(threshold, None).unwrap();
                    black_box(drain(collector, input))
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_collectors);
criterion_main!(benches);
