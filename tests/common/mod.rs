#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::Rng;

use geobin::aggregators::AggregatorConfig;
use geobin::bins::TemporalBin;
use geobin::config::{BinningConfig, BinningConfigBuilder};
use geobin::observations::{GeoCoding, GriddedProduct};
use geobin::BinningResult;

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn avg(var: &str) -> AggregatorConfig {
    AggregatorConfig::Average {
        var_name: var.into(),
        weight_coeff: 0.0,
    }
}

/// Builder with one `chl` variable and the given aggregators.
pub fn chl_builder(num_rows: usize, aggregators: &[AggregatorConfig]) -> BinningConfigBuilder {
    aggregators.iter().cloned().fold(
        BinningConfig::builder()
            .num_rows(num_rows)
            .variables(&["chl"]),
        |builder, agg| builder.aggregator(agg),
    )
}

/// Random swath over a 2°×2° box, per-pixel geocoding, ~10% masked pixels.
pub fn random_product(rng: &mut StdRng, name: &str, width: usize, height: usize) -> GriddedProduct {
    let n = width * height;
    let lat0: f64 = rng.random_range(-60.0..60.0);
    let lon0: f64 = rng.random_range(-180.0..180.0);
    let lat = (0..n)
        .map(|_| (lat0 + rng.random_range(0.0..2.0)) as f32)
        .collect();
    let lon = (0..n)
        .map(|_| (lon0 + rng.random_range(0.0..2.0)) as f32)
        .collect();
    let values = (0..n).map(|_| rng.random_range(0.01..10.0_f32)).collect();
    let mask = (0..n).map(|_| rng.random_bool(0.9)).collect();
    let start = 55000.0 + rng.random_range(0.0..1.0);

    GriddedProduct::new(name, width, height, GeoCoding::PerPixel { lat, lon })
        .with_band(values)
        .with_mask(mask)
        .with_time_range(start, start + 0.01)
}

/// Drain every temporal bin of a result.
pub fn collect_bins(result: &mut BinningResult) -> Vec<TemporalBin> {
    result
        .bins
        .iter()
        .collect::<Result<Vec<_>, _>>()
        .expect("readable temporal bins")
}

/// Bitwise comparison of feature vectors (`NaN` equal to itself).
pub fn assert_same_bins(actual: &[TemporalBin], expected: &[TemporalBin]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_eq!(a.index, e.index);
        assert_eq!(a.num_obs, e.num_obs, "bin {}", a.index);
        assert_eq!(a.num_passes, e.num_passes, "bin {}", a.index);
        let a_bits: Vec<u32> = a.features.iter().map(|f| f.to_bits()).collect();
        let e_bits: Vec<u32> = e.features.iter().map(|f| f.to_bits()).collect();
        assert_eq!(a_bits, e_bits, "bin {}", a.index);
    }
}
