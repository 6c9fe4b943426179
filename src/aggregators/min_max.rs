//! Running minimum and maximum. All three layouts are `[v_min, v_max]`, initialized to `NaN`
//! so that a bin without a valid sample reports `NaN`.
use crate::{binning_errors::BinningError, constants::Feature, observations::Observation};

use super::{feature_names, Aggregator, VariableContext};

#[derive(Debug, Clone)]
pub struct MinMaxAggregator {
    var_index: usize,
    names: Vec<String>,
}

impl MinMaxAggregator {
    pub fn new(ctx: &VariableContext, var_name: &str) -> Result<Self, BinningError> {
        Ok(MinMaxAggregator {
            var_index: ctx.index_of(var_name)?,
            names: feature_names(var_name, &["min", "max"]),
        })
    }
}

// `f32::min`/`max` return the non-NaN operand.
#[inline]
fn merge(target: &mut [Feature], min: Feature, max: Feature) {
    target[0] = target[0].min(min);
    target[1] = target[1].max(max);
}

impl Aggregator for MinMaxAggregator {
    fn name(&self) -> &str {
        "MIN_MAX"
    }

    fn spatial_feature_names(&self) -> &[String] {
        &self.names
    }

    fn temporal_feature_names(&self) -> &[String] {
        &self.names
    }

    fn output_feature_names(&self) -> &[String] {
        &self.names
    }

    fn init_spatial(&self, spatial: &mut [Feature]) {
        spatial.fill(Feature::NAN);
    }

    fn aggregate_spatial(&self, observation: &Observation, spatial: &mut [Feature]) {
        let x = observation.values[self.var_index];
        merge(spatial, x, x);
    }

    fn merge_spatial(&self, other: &[Feature], spatial: &mut [Feature]) {
        merge(spatial, other[0], other[1]);
    }

    fn init_temporal(&self, temporal: &mut [Feature]) {
        temporal.fill(Feature::NAN);
    }

    fn aggregate_temporal(
        &self,
        spatial: &[Feature],
        _num_spatial_obs: u32,
        temporal: &mut [Feature],
    ) {
        merge(temporal, spatial[0], spatial[1]);
    }

    fn compute_output(&self, temporal: &[Feature], output: &mut [Feature]) {
        output.copy_from_slice(temporal);
    }
}
