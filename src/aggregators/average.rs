//! Arithmetic mean and standard deviation.
//!
//! Feature layouts for variable `v`
//! -----------------
//! * spatial: `[v_sum_x, v_sum_xx, v_counts]`; after completion `[mean, mean of squares, counts]`
//! * temporal: `[v_sum_x, v_sum_xx, v_sum_w, v_counts]` where each pass contributes its mean
//!   weighted by `w = counts^weight_coeff` (`weight_coeff = 0` gives every pass the same weight,
//!   `1` weights by observation count)
//! * output: `[v_mean, v_sigma, v_counts]`, `sigma = sqrt(max(0, E[x²] − E[x]²))`
use crate::{binning_errors::BinningError, constants::Feature, observations::Observation};

use super::{feature_names, Aggregator, VariableContext};

#[derive(Debug, Clone)]
pub struct AverageAggregator {
    var_index: usize,
    weight_coeff: f64,
    spatial_names: Vec<String>,
    temporal_names: Vec<String>,
    output_names: Vec<String>,
}

impl AverageAggregator {
    pub fn new(
        ctx: &VariableContext,
        var_name: &str,
        weight_coeff: f64,
    ) -> Result<Self, BinningError> {
        Ok(AverageAggregator {
            var_index: ctx.index_of(var_name)?,
            weight_coeff,
            spatial_names: feature_names(var_name, &["sum_x", "sum_xx", "counts"]),
            temporal_names: feature_names(var_name, &["sum_x", "sum_xx", "sum_w", "counts"]),
            output_names: feature_names(var_name, &["mean", "sigma", "counts"]),
        })
    }
}

// Slice-level rules, shared with the log-normal variant.

#[inline]
pub(super) fn accumulate(spatial: &mut [Feature], x: Feature) {
    spatial[0] += x;
    spatial[1] += x * x;
    spatial[2] += 1.0;
}

#[inline]
pub(super) fn combine(other: &[Feature], spatial: &mut [Feature]) {
    for (slot, v) in spatial.iter_mut().zip(other) {
        *slot += v;
    }
}

#[inline]
pub(super) fn complete(spatial: &mut [Feature]) {
    let counts = spatial[2];
    if counts > 0.0 {
        spatial[0] /= counts;
        spatial[1] /= counts;
    } else {
        spatial[0] = Feature::NAN;
        spatial[1] = Feature::NAN;
    }
}

#[inline]
pub(super) fn merge_pass(spatial: &[Feature], temporal: &mut [Feature], weight_coeff: f64) {
    let counts = spatial[2];
    if counts <= 0.0 {
        return;
    }
    let w = (counts as f64).powf(weight_coeff) as Feature;
    temporal[0] += spatial[0] * w;
    temporal[1] += spatial[1] * w;
    temporal[2] += w;
    temporal[3] += counts;
}

/// `(mean, variance, counts)` of a temporal slice.
#[inline]
pub(super) fn moments(temporal: &[Feature]) -> (Feature, Feature, Feature) {
    let sum_w = temporal[2];
    if sum_w > 0.0 {
        let mean = temporal[0] / sum_w;
        let variance = (temporal[1] / sum_w - mean * mean).max(0.0);
        (mean, variance, temporal[3])
    } else {
        (Feature::NAN, Feature::NAN, temporal[3])
    }
}

impl Aggregator for AverageAggregator {
    fn name(&self) -> &str {
        "AVG"
    }

    fn spatial_feature_names(&self) -> &[String] {
        &self.spatial_names
    }

    fn temporal_feature_names(&self) -> &[String] {
        &self.temporal_names
    }

    fn output_feature_names(&self) -> &[String] {
        &self.output_names
    }

    fn init_spatial(&self, spatial: &mut [Feature]) {
        spatial.fill(0.0);
    }

    fn aggregate_spatial(&self, observation: &Observation, spatial: &mut [Feature]) {
        let x = observation.values[self.var_index];
        if !x.is_nan() {
            accumulate(spatial, x);
        }
    }

    fn merge_spatial(&self, other: &[Feature], spatial: &mut [Feature]) {
        combine(other, spatial);
    }

    fn complete_spatial(&self, _num_spatial_obs: u32, spatial: &mut [Feature]) {
        complete(spatial);
    }

    fn init_temporal(&self, temporal: &mut [Feature]) {
        temporal.fill(0.0);
    }

    fn aggregate_temporal(
        &self,
        spatial: &[Feature],
        _num_spatial_obs: u32,
        temporal: &mut [Feature],
    ) {
        merge_pass(spatial, temporal, self.weight_coeff);
    }

    fn compute_output(&self, temporal: &[Feature], output: &mut [Feature]) {
        let (mean, variance, counts) = moments(temporal);
        output[0] = mean;
        output[1] = variance.sqrt();
        output[2] = counts;
    }
}

#[cfg(test)]
mod average_test {
    use super::*;
    use approx::assert_relative_eq;

    fn obs(x: Feature) -> Observation {
        Observation::new(0.0, 0.0, 55000.0, &[x])
    }

    fn spatial_pass(agg: &AverageAggregator, values: &[Feature]) -> Vec<Feature> {
        let mut spatial = vec![0.0; 3];
        agg.init_spatial(&mut spatial);
        for v in values {
            agg.aggregate_spatial(&obs(*v), &mut spatial);
        }
        agg.complete_spatial(values.len() as u32, &mut spatial);
        spatial
    }

    #[test]
    fn test_spatial_mean() {
        let ctx = VariableContext::new(&["chl"]);
        let agg = AverageAggregator::new(&ctx, "chl", 0.0).unwrap();
        let spatial = spatial_pass(&agg, &[2.4, 2.4, 2.4]);
        assert_relative_eq!(spatial[0], 2.4, epsilon = 1e-6);
        assert_eq!(spatial[2], 3.0);
        assert_eq!(
            agg.output_feature_names(),
            &["chl_mean", "chl_sigma", "chl_counts"]
        );
    }

    #[test]
    fn test_merge_before_completion() {
        let ctx = VariableContext::new(&["chl"]);
        let agg = AverageAggregator::new(&ctx, "chl", 0.0).unwrap();
        let partial = |values: &[Feature]| {
            let mut spatial = vec![0.0; 3];
            agg.init_spatial(&mut spatial);
            for v in values {
                agg.aggregate_spatial(&obs(*v), &mut spatial);
            }
            spatial
        };

        let mut spatial = partial(&[1.0, 1.0]);
        agg.merge_spatial(&partial(&[7.0]), &mut spatial);
        agg.complete_spatial(3, &mut spatial);
        assert_eq!(spatial, spatial_pass(&agg, &[1.0, 1.0, 7.0]));
        assert_eq!(spatial[0], 3.0);
    }

    #[test]
    fn test_temporal_mean_of_passes() {
        let ctx = VariableContext::new(&["chl"]);
        let agg = AverageAggregator::new(&ctx, "chl", 0.0).unwrap();

        let mut temporal = vec![0.0; 4];
        agg.init_temporal(&mut temporal);
        agg.aggregate_temporal(&spatial_pass(&agg, &[2.0]), 1, &mut temporal);
        agg.aggregate_temporal(&spatial_pass(&agg, &[4.0]), 1, &mut temporal);

        let mut output = vec![0.0; 3];
        agg.compute_output(&temporal, &mut output);
        assert_relative_eq!(output[0], 3.0);
        assert_relative_eq!(output[1], 1.0);
        assert_eq!(output[2], 2.0);
    }

    #[test]
    fn test_weight_coeff() {
        let ctx = VariableContext::new(&["chl"]);
        let agg = AverageAggregator::new(&ctx, "chl", 1.0).unwrap();

        let mut temporal = vec![0.0; 4];
        agg.init_temporal(&mut temporal);
        agg.aggregate_temporal(&spatial_pass(&agg, &[1.0, 1.0, 1.0]), 3, &mut temporal);
        agg.aggregate_temporal(&spatial_pass(&agg, &[5.0]), 1, &mut temporal);

        let mut output = vec![0.0; 3];
        agg.compute_output(&temporal, &mut output);
        assert_relative_eq!(output[0], 2.0);
    }

    #[test]
    fn test_nan_skipped_and_propagated() {
        let ctx = VariableContext::new(&["chl"]);
        let agg = AverageAggregator::new(&ctx, "chl", 0.0).unwrap();

        let spatial = spatial_pass(&agg, &[Feature::NAN, 1.0]);
        assert_eq!(spatial[0], 1.0);
        assert_eq!(spatial[2], 1.0);

        let spatial = spatial_pass(&agg, &[Feature::NAN]);
        assert!(spatial[0].is_nan());

        let mut temporal = vec![0.0; 4];
        agg.init_temporal(&mut temporal);
        agg.aggregate_temporal(&spatial, 1, &mut temporal);
        let mut output = vec![0.0; 3];
        agg.compute_output(&temporal, &mut output);
        assert!(output[0].is_nan());
        assert!(output[1].is_nan());
        assert_eq!(output[2], 0.0);
    }
}
