use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use geobin::aggregators::{AggregatorConfig, VariableContext};
use geobin::bin_manager::BinManager;
use geobin::observations::{GeoCoding, GriddedProduct, Observation};
use geobin::planetary_grid::{GridType, PlanetaryGrid};
use geobin::spatial_binner::SpatialBinner;
use geobin::{Binning, BinningConfig};

fn manager() -> BinManager {
    let ctx = VariableContext::new(&["chl", "sst"]);
    BinManager::from_config(
        &[
            AggregatorConfig::Average {
                var_name: "chl".into(),
                weight_coeff: 0.0,
            },
            AggregatorConfig::MinMax {
                var_name: "sst".into(),
            },
        ],
        &[],
        &ctx,
    )
    .unwrap()
}

/// 1000×1000 affine swath of about 10°×10°.
fn swath(rng: &mut StdRng) -> GriddedProduct {
    let n = 1000 * 1000;
    let geo = GeoCoding::Affine {
        lat0: 40.0,
        lon0: -20.0,
        lat_step: 0.01,
        lon_step: 0.01,
    };
    GriddedProduct::new("swath", 1000, 1000, geo)
        .with_band((0..n).map(|_| rng.random_range(0.01..5.0_f32)).collect())
        .with_band((0..n).map(|_| rng.random_range(270.0..300.0_f32)).collect())
        .with_time_range(55000.0, 55000.01)
}

fn bench_bin_index(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xB1A5);
    let points: Vec<(f64, f64)> = (0..100_000)
        .map(|_| (rng.random_range(-90.0..90.0), rng.random_range(-180.0..180.0)))
        .collect();

    for grid_type in [GridType::SeaGrid, GridType::PlateCarree] {
        let grid = grid_type.create(2160).unwrap();
        c.bench_function(&format!("bin_index/{grid_type}/100k"), |b| {
            b.iter(|| {
                for &(lat, lon) in &points {
                    black_box(grid.bin_index(black_box(lat), black_box(lon)));
                }
            })
        });
    }
}

fn bench_observations(c: &mut Criterion) {
    let manager = manager();
    let grid = GridType::SeaGrid.create(2160).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let observations: Vec<Observation> = (0..100_000)
        .map(|_| {
            Observation::new(
                rng.random_range(30.0..40.0),
                rng.random_range(-20.0..-10.0),
                55000.0,
                &[rng.random_range(0.01..5.0), rng.random_range(270.0..300.0)],
            )
        })
        .collect();

    c.bench_function("spatial_binner/100k_observations", |b| {
        b.iter_batched(
            || SpatialBinner::new(&manager, grid.as_ref(), 1, None),
            |mut binner| {
                for obs in &observations {
                    binner.process_observation(obs);
                }
                black_box(binner.complete())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let product = swath(&mut rng);
    let config = BinningConfig::builder()
        .variables(&["chl", "sst"])
        .aggregator(AggregatorConfig::Average {
            var_name: "chl".into(),
            weight_coeff: 0.0,
        })
        .aggregator(AggregatorConfig::MinMax {
            var_name: "sst".into(),
        })
        .tile_height(64)
        .build()
        .unwrap();
    let binning = Binning::new(config).unwrap();

    let mut group = c.benchmark_group("binning");
    group.sample_size(10);
    group.bench_function("process/1Mpx_memory", |b| {
        b.iter(|| black_box(binning.process(std::slice::from_ref(&product), || false).unwrap()))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_bin_index,
    bench_observations,
    bench_full_pipeline
);
criterion_main!(benches);
