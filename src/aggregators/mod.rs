//! # Aggregators
//!
//! An aggregator is a **stateless** statistic strategy. It declares three feature layouts
//! (spatial, temporal, output) and the operations moving data between them:
//!
//! ```text
//! init_spatial → aggregate_spatial* → complete_spatial           (per spatial bin)
//!              ↘ merge_spatial*  (tiles of the same pass, before completion)
//! init_temporal → aggregate_temporal* → complete_temporal         (per bin index)
//! compute_output                                                  (temporal → output)
//! ```
//!
//! The [`BinManager`](crate::bin_manager::BinManager) concatenates the layouts of all configured
//! aggregators into one vector per phase; each aggregator only ever sees its own slice.
//!
//! Kinds
//! -----------------
//! | Config tag     | Spatial / temporal rule | Output |
//! |----------------|-------------------------|--------|
//! | `AVG`          | sums → per-pass mean, weighted mean of passes (`w = count^weight_coeff`) | `mean`, `sigma`, `counts` |
//! | `AVG_ML`       | `AVG` over `ln(x)` for `x > 0` | log-normal `mean`, `sigma`, `median`, `mode` |
//! | `MIN_MAX`      | running min / max | `min`, `max` |
//! | `ON_MAX_SET`   | sample with the largest ranking value, ties → earliest MJD | `max`, `mjd`, set values |
//!
//! `AVG`, `AVG_ML` and `MIN_MAX` are commutative and associative up to floating-point rounding.
//! `ON_MAX_SET` is order independent except for samples tied on both value and time.
//!
//! Non-finite policy
//! -----------------
//! `NaN` samples are skipped. A slice whose statistic cannot be formed (no valid sample, or an
//! overflow to `inf`) yields `NaN`/`inf` output features for that bin only; the bin is still
//! emitted and rendering is left to the formatter.
use std::fmt;

use ahash::RandomState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{binning_errors::BinningError, constants::Feature, observations::Observation};

pub mod average;
pub mod average_ml;
pub mod min_max;
pub mod on_max_set;

pub use average::AverageAggregator;
pub use average_ml::AverageMlAggregator;
pub use min_max::MinMaxAggregator;
pub use on_max_set::OnMaxSetAggregator;

/// Capability set of one statistic.
pub trait Aggregator: Send + Sync + fmt::Debug {
    /// Short name used in log events.
    fn name(&self) -> &str;

    fn spatial_feature_names(&self) -> &[String];

    fn temporal_feature_names(&self) -> &[String];

    fn output_feature_names(&self) -> &[String];

    fn init_spatial(&self, spatial: &mut [Feature]);

    fn aggregate_spatial(&self, observation: &Observation, spatial: &mut [Feature]);

    /// Fold `other`, a not yet completed accumulator of the same pass, into `spatial`.
    fn merge_spatial(&self, other: &[Feature], spatial: &mut [Feature]);

    /// Called once per spatial bin after its last observation.
    fn complete_spatial(&self, _num_spatial_obs: u32, _spatial: &mut [Feature]) {}

    fn init_temporal(&self, temporal: &mut [Feature]);

    fn aggregate_temporal(
        &self,
        spatial: &[Feature],
        num_spatial_obs: u32,
        temporal: &mut [Feature],
    );

    /// Called once per bin index after its last spatial fragment.
    fn complete_temporal(&self, _num_temporal_obs: u32, _temporal: &mut [Feature]) {}

    fn compute_output(&self, temporal: &[Feature], output: &mut [Feature]);
}

/// Resolves variable names to positions in an observation's sample vector.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    names: Vec<String>,
    positions: HashMap<String, usize, RandomState>,
}

impl VariableContext {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let names: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        let positions = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        VariableContext { names, positions }
    }

    pub fn index_of(&self, name: &str) -> Result<usize, BinningError> {
        self.positions
            .get(name)
            .copied()
            .ok_or_else(|| BinningError::UnknownVariable(name.to_string()))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Aggregator selection as read from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AggregatorConfig {
    #[serde(rename = "AVG")]
    Average {
        var_name: String,
        #[serde(default)]
        weight_coeff: f64,
    },
    #[serde(rename = "AVG_ML")]
    AverageMl {
        var_name: String,
        #[serde(default)]
        weight_coeff: f64,
    },
    #[serde(rename = "MIN_MAX")]
    MinMax { var_name: String },
    #[serde(rename = "ON_MAX_SET")]
    OnMaxSet {
        on_max_var_name: String,
        #[serde(default)]
        set_var_names: Vec<String>,
    },
}

impl AggregatorConfig {
    /// Variables read by this aggregator.
    pub fn var_names(&self) -> Vec<&str> {
        match self {
            AggregatorConfig::Average { var_name, .. }
            | AggregatorConfig::AverageMl { var_name, .. }
            | AggregatorConfig::MinMax { var_name } => vec![var_name.as_str()],
            AggregatorConfig::OnMaxSet {
                on_max_var_name,
                set_var_names,
            } => std::iter::once(on_max_var_name.as_str())
                .chain(set_var_names.iter().map(String::as_str))
                .collect(),
        }
    }

    /// Instantiate the aggregator, resolving variables through `ctx`.
    pub fn create(&self, ctx: &VariableContext) -> Result<Box<dyn Aggregator>, BinningError> {
        Ok(match self {
            AggregatorConfig::Average {
                var_name,
                weight_coeff,
            } => Box::new(AverageAggregator::new(ctx, var_name, *weight_coeff)?),
            AggregatorConfig::AverageMl {
                var_name,
                weight_coeff,
            } => Box::new(AverageMlAggregator::new(ctx, var_name, *weight_coeff)?),
            AggregatorConfig::MinMax { var_name } => Box::new(MinMaxAggregator::new(ctx, var_name)?),
            AggregatorConfig::OnMaxSet {
                on_max_var_name,
                set_var_names,
            } => Box::new(OnMaxSetAggregator::new(
                ctx,
                on_max_var_name,
                set_var_names,
            )?),
        })
    }
}

/// `["{prefix}_{suffix}", ...]`
pub(crate) fn feature_names(prefix: &str, suffixes: &[&str]) -> Vec<String> {
    suffixes.iter().map(|s| format!("{prefix}_{s}")).collect()
}
