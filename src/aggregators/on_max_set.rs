//! Keep the sample with the largest ranking variable, together with a set of companion variables.
//!
//! Spatial and temporal layout: `[v_max, v_mjd_day, v_mjd_frac, set_1, …, set_n]`. The
//! acquisition time is split into whole days and day fraction so that sub-minute tie-breaks
//! survive the `f32` feature slots.
//!
//! Selection rule: a candidate replaces the current sample if its value is larger, or if the
//! values are equal and it was acquired earlier. A sample without acquisition time loses every
//! tie against a timed one. `NaN` ranking values are skipped.
//!
//! Output: `[v_max, v_mjd, set_1, …, set_n]`.
use crate::{
    binning_errors::BinningError,
    constants::{Feature, MJD},
    observations::Observation,
};

use super::{Aggregator, VariableContext};

const HEADER: usize = 3;

#[derive(Debug, Clone)]
pub struct OnMaxSetAggregator {
    on_max_index: usize,
    set_indices: Vec<usize>,
    names: Vec<String>,
    output_names: Vec<String>,
}

impl OnMaxSetAggregator {
    pub fn new<S: AsRef<str>>(
        ctx: &VariableContext,
        on_max_var_name: &str,
        set_var_names: &[S],
    ) -> Result<Self, BinningError> {
        let on_max_index = ctx.index_of(on_max_var_name)?;
        let set_indices = set_var_names
            .iter()
            .map(|n| ctx.index_of(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let set_names = set_var_names.iter().map(|n| n.as_ref().to_string());
        let names = [
            format!("{on_max_var_name}_max"),
            format!("{on_max_var_name}_mjd_day"),
            format!("{on_max_var_name}_mjd_frac"),
        ]
        .into_iter()
        .chain(set_names.clone())
        .collect();
        let output_names = [
            format!("{on_max_var_name}_max"),
            format!("{on_max_var_name}_mjd"),
        ]
        .into_iter()
        .chain(set_names)
        .collect();

        Ok(OnMaxSetAggregator {
            on_max_index,
            set_indices,
            names,
            output_names,
        })
    }
}

#[inline]
fn split_mjd(mjd: MJD) -> (Feature, Feature) {
    let day = mjd.floor();
    (day as Feature, (mjd - day) as Feature)
}

/// True if `(value, day, frac)` should replace the sample held in `current`.
#[inline]
fn wins(value: Feature, day: Feature, frac: Feature, current: &[Feature]) -> bool {
    if value.is_nan() {
        return false;
    }
    let current_value = current[0];
    if current_value.is_nan() || value > current_value {
        return true;
    }
    if value < current_value {
        return false;
    }
    match (day.is_nan(), current[1].is_nan()) {
        (false, true) => true,
        (true, _) => false,
        (false, false) => (day, frac) < (current[1], current[2]),
    }
}

impl Aggregator for OnMaxSetAggregator {
    fn name(&self) -> &str {
        "ON_MAX_SET"
    }

    fn spatial_feature_names(&self) -> &[String] {
        &self.names
    }

    fn temporal_feature_names(&self) -> &[String] {
        &self.names
    }

    fn output_feature_names(&self) -> &[String] {
        &self.output_names
    }

    fn init_spatial(&self, spatial: &mut [Feature]) {
        spatial.fill(Feature::NAN);
    }

    fn aggregate_spatial(&self, observation: &Observation, spatial: &mut [Feature]) {
        let value = observation.values[self.on_max_index];
        let (day, frac) = split_mjd(observation.mjd);
        if wins(value, day, frac, spatial) {
            spatial[0] = value;
            spatial[1] = day;
            spatial[2] = frac;
            for (slot, &i) in spatial[HEADER..].iter_mut().zip(&self.set_indices) {
                *slot = observation.values[i];
            }
        }
    }

    fn merge_spatial(&self, other: &[Feature], spatial: &mut [Feature]) {
        if wins(other[0], other[1], other[2], spatial) {
            spatial.copy_from_slice(other);
        }
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
        if wins(spatial[0], spatial[1], spatial[2], temporal) {
            temporal.copy_from_slice(spatial);
        }
    }

    fn compute_output(&self, temporal: &[Feature], output: &mut [Feature]) {
        output[0] = temporal[0];
        output[1] = temporal[1] + temporal[2];
        output[2..].copy_from_slice(&temporal[HEADER..]);
    }
}

#[cfg(test)]
mod on_max_set_test {
    use super::*;

    fn aggregator() -> OnMaxSetAggregator {
        let ctx = VariableContext::new(&["ndvi", "red", "nir"]);
        OnMaxSetAggregator::new(&ctx, "ndvi", &["red", "nir"]).unwrap()
    }

    fn spatial_of(agg: &OnMaxSetAggregator, observations: &[Observation]) -> Vec<Feature> {
        let mut spatial = vec![0.0; 5];
        agg.init_spatial(&mut spatial);
        for obs in observations {
            agg.aggregate_spatial(obs, &mut spatial);
        }
        spatial
    }

    #[test]
    fn test_layout() {
        let agg = aggregator();
        assert_eq!(agg.spatial_feature_names().len(), 5);
        assert_eq!(
            agg.output_feature_names(),
            &["ndvi_max", "ndvi_mjd", "red", "nir"]
        );
    }

    #[test]
    fn test_keeps_max_any_order() {
        let agg = aggregator();
        let a = Observation::new(0.0, 0.0, 55000.25, &[0.3, 1.0, 2.0]);
        let b = Observation::new(0.0, 0.0, 55001.5, &[0.8, 3.0, 4.0]);
        let c = Observation::new(0.0, 0.0, 55002.0, &[Feature::NAN, 5.0, 6.0]);

        let forward = spatial_of(&agg, &[a.clone(), b.clone(), c.clone()]);
        let backward = spatial_of(&agg, &[c, b, a]);
        assert_eq!(forward, backward);
        assert_eq!(&forward[3..], &[3.0, 4.0]);

        let mut output = vec![0.0; 4];
        let mut temporal = vec![0.0; 5];
        agg.init_temporal(&mut temporal);
        agg.aggregate_temporal(&forward, 3, &mut temporal);
        agg.compute_output(&temporal, &mut output);
        assert_eq!(output, vec![0.8, 55001.5, 3.0, 4.0]);
    }

    #[test]
    fn test_merge_spatial() {
        let agg = aggregator();
        let a = Observation::new(0.0, 0.0, 55000.75, &[0.5, 1.0, 1.0]);
        let b = Observation::new(0.0, 0.0, 55000.25, &[0.5, 2.0, 2.0]);
        let c = Observation::new(0.0, 0.0, 55000.5, &[0.2, 3.0, 3.0]);

        let mut merged = spatial_of(&agg, &[a.clone(), c.clone()]);
        agg.merge_spatial(&spatial_of(&agg, &[b.clone()]), &mut merged);
        assert_eq!(merged, spatial_of(&agg, &[a, b, c]));
        assert_eq!(merged[3], 2.0);
    }

    #[test]
    fn test_tie_break_earliest() {
        let agg = aggregator();
        let late = Observation::new(0.0, 0.0, 55000.75, &[0.5, 1.0, 1.0]);
        let early = Observation::new(0.0, 0.0, 55000.25, &[0.5, 2.0, 2.0]);
        let untimed = Observation::new(0.0, 0.0, MJD::NAN, &[0.5, 3.0, 3.0]);

        let spatial = spatial_of(&agg, &[untimed.clone(), late.clone(), early.clone()]);
        assert_eq!(spatial[3], 2.0);
        let spatial = spatial_of(&agg, &[early, late, untimed]);
        assert_eq!(spatial[3], 2.0);
    }
}
