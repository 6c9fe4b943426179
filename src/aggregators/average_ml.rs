//! Maximum-likelihood estimates for log-normally distributed variables (e.g. chlorophyll).
//!
//! The [`average`](super::average) rules are applied to `ln(x)` for `x > 0`; non-positive and
//! `NaN` samples are skipped. With `m` and `s²` the weighted mean and variance of `ln(x)`:
//!
//! ```text
//! mean   = exp(m + s²/2)
//! sigma  = mean · sqrt(exp(s²) − 1)
//! median = exp(m)
//! mode   = exp(m − s²)
//! ```
use crate::{binning_errors::BinningError, constants::Feature, observations::Observation};

use super::{
    average::{accumulate, combine, complete, merge_pass, moments},
    feature_names, Aggregator, VariableContext,
};

#[derive(Debug, Clone)]
pub struct AverageMlAggregator {
    var_index: usize,
    weight_coeff: f64,
    spatial_names: Vec<String>,
    temporal_names: Vec<String>,
    output_names: Vec<String>,
}

impl AverageMlAggregator {
    pub fn new(
        ctx: &VariableContext,
        var_name: &str,
        weight_coeff: f64,
    ) -> Result<Self, BinningError> {
        Ok(AverageMlAggregator {
            var_index: ctx.index_of(var_name)?,
            weight_coeff,
            spatial_names: feature_names(var_name, &["sum_x", "sum_xx", "counts"]),
            temporal_names: feature_names(var_name, &["sum_x", "sum_xx", "sum_w", "counts"]),
            output_names: feature_names(var_name, &["mean", "sigma", "median", "mode"]),
        })
    }
}

impl Aggregator for AverageMlAggregator {
    fn name(&self) -> &str {
        "AVG_ML"
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
        if x > 0.0 {
            accumulate(spatial, x.ln());
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
        let (m, s2, _) = moments(temporal);
        let mean = (m + 0.5 * s2).exp();
        output[0] = mean;
        output[1] = mean * (s2.exp() - 1.0).sqrt();
        output[2] = m.exp();
        output[3] = (m - s2).exp();
    }
}

#[cfg(test)]
mod average_ml_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_samples() {
        let ctx = VariableContext::new(&["chl"]);
        let agg = AverageMlAggregator::new(&ctx, "chl", 0.0).unwrap();

        let mut spatial = vec![0.0; 3];
        agg.init_spatial(&mut spatial);
        for x in [1.0, 1.0, -1.0, 1.0] {
            agg.aggregate_spatial(&Observation::new(0.0, 0.0, 0.0, &[x]), &mut spatial);
        }
        agg.complete_spatial(4, &mut spatial);
        assert_eq!(spatial[2], 3.0);

        let mut temporal = vec![0.0; 4];
        agg.init_temporal(&mut temporal);
        agg.aggregate_temporal(&spatial, 4, &mut temporal);

        let mut output = vec![0.0; 4];
        agg.compute_output(&temporal, &mut output);
        for (i, expected) in [1.0, 0.0, 1.0, 1.0].into_iter().enumerate() {
            assert_relative_eq!(output[i], expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_no_valid_sample() {
        let ctx = VariableContext::new(&["chl"]);
        let agg = AverageMlAggregator::new(&ctx, "chl", 0.0).unwrap();
        let mut temporal = vec![0.0; 4];
        agg.init_temporal(&mut temporal);
        let mut output = vec![0.0; 4];
        agg.compute_output(&temporal, &mut output);
        assert!(output.iter().all(|v| v.is_nan()));
    }
}
