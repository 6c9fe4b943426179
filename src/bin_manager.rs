//! # Bin manager
//!
//! Owns the configured [`Aggregator`]s, the layout of their concatenated feature vectors and
//! the optional [`CellProcessorChain`]. Every bin operation of the pipeline goes through it:
//!
//! 1. [`create_spatial_bin`](BinManager::create_spatial_bin) → zeroed/initialized spatial vector,
//! 2. [`aggregate_spatial_bin`](BinManager::aggregate_spatial_bin) per observation,
//!    [`merge_spatial_bin`](BinManager::merge_spatial_bin) across the tiles of one source, then
//!    [`complete_spatial_bin`](BinManager::complete_spatial_bin) once,
//! 3. [`create_temporal_bin`](BinManager::create_temporal_bin) then
//!    [`aggregate_temporal_bin`](BinManager::aggregate_temporal_bin) per spatial fragment, then
//!    [`complete_temporal_bin`](BinManager::complete_temporal_bin) once,
//! 4. [`compute_output`](BinManager::compute_output) → output features, post-processed.
//!
//! Offsets are fixed at construction: aggregator `i` owns the slots
//! `offsets[i]..offsets[i + 1]` of each phase's vector.
use itertools::Itertools;

use crate::{
    aggregators::{Aggregator, AggregatorConfig, VariableContext},
    binning_errors::BinningError,
    bins::{SpatialBin, TemporalBin},
    cell_processor::{CellProcessorChain, CellProcessorConfig},
    constants::{BinIndex, Feature},
    observations::Observation,
};

/// Concatenated feature layout of one phase.
#[derive(Debug, Clone, Default)]
struct FeatureLayout {
    offsets: Vec<usize>,
    names: Vec<String>,
}

impl FeatureLayout {
    fn new<'a>(per_aggregator: impl Iterator<Item = &'a [String]>) -> Self {
        let mut offsets = vec![0];
        let mut names = Vec::new();
        for agg_names in per_aggregator {
            names.extend_from_slice(agg_names);
            offsets.push(names.len());
        }
        FeatureLayout { offsets, names }
    }

    #[inline]
    fn range(&self, i: usize) -> std::ops::Range<usize> {
        self.offsets[i]..self.offsets[i + 1]
    }

    fn len(&self) -> usize {
        self.names.len()
    }
}

#[derive(Debug)]
pub struct BinManager {
    variables: VariableContext,
    aggregators: Vec<Box<dyn Aggregator>>,
    spatial: FeatureLayout,
    temporal: FeatureLayout,
    output: FeatureLayout,
    post_processor: CellProcessorChain,
}

impl BinManager {
    /// Build a manager from already instantiated aggregators.
    ///
    /// Arguments
    /// -----------------
    /// * `variables`: names of the observation samples, in sample order.
    /// * `aggregators`: statistics in layout order.
    /// * `post_processors`: cell processors applied to the output vector, in order.
    ///
    /// Return
    /// ----------
    /// * The manager, or [`BinningError::UnknownFeature`] if a post-processor references a
    ///   feature no aggregator produces.
    pub fn new(
        variables: VariableContext,
        aggregators: Vec<Box<dyn Aggregator>>,
        post_processors: &[CellProcessorConfig],
    ) -> Result<Self, BinningError> {
        let spatial = FeatureLayout::new(aggregators.iter().map(|a| a.spatial_feature_names()));
        let temporal = FeatureLayout::new(aggregators.iter().map(|a| a.temporal_feature_names()));
        let output = FeatureLayout::new(aggregators.iter().map(|a| a.output_feature_names()));
        let post_processor = CellProcessorChain::new(post_processors, &output.names)?;

        tracing::debug!(
            aggregators = %aggregators.iter().map(|a| a.name()).join(","),
            spatial_features = spatial.len(),
            temporal_features = temporal.len(),
            output_features = output.len(),
            "bin manager initialized"
        );

        Ok(BinManager {
            variables,
            aggregators,
            spatial,
            temporal,
            output,
            post_processor,
        })
    }

    /// Instantiate aggregators and post-processors from configuration.
    pub fn from_config(
        aggregators: &[AggregatorConfig],
        post_processors: &[CellProcessorConfig],
        ctx: &VariableContext,
    ) -> Result<Self, BinningError> {
        let aggregators = aggregators
            .iter()
            .map(|config| config.create(ctx))
            .collect::<Result<Vec<_>, _>>()?;
        BinManager::new(ctx.clone(), aggregators, post_processors)
    }

    /// Length of the sample vector every observation must carry.
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn variables(&self) -> &VariableContext {
        &self.variables
    }

    pub fn aggregator_count(&self) -> usize {
        self.aggregators.len()
    }

    pub fn aggregator(&self, i: usize) -> &dyn Aggregator {
        self.aggregators[i].as_ref()
    }

    pub fn spatial_feature_count(&self) -> usize {
        self.spatial.len()
    }

    pub fn temporal_feature_count(&self) -> usize {
        self.temporal.len()
    }

    pub fn spatial_feature_names(&self) -> &[String] {
        &self.spatial.names
    }

    pub fn temporal_feature_names(&self) -> &[String] {
        &self.temporal.names
    }

    /// Names of the final features, after post-processing.
    pub fn result_feature_names(&self) -> &[String] {
        self.post_processor
            .output_feature_names()
            .unwrap_or(&self.output.names)
    }

    pub fn create_spatial_bin(&self, index: BinIndex) -> SpatialBin {
        let mut bin = SpatialBin::new(index, self.spatial.len());
        for (i, agg) in self.aggregators.iter().enumerate() {
            agg.init_spatial(&mut bin.features[self.spatial.range(i)]);
        }
        bin
    }

    pub fn aggregate_spatial_bin(&self, observation: &Observation, bin: &mut SpatialBin) {
        for (i, agg) in self.aggregators.iter().enumerate() {
            agg.aggregate_spatial(observation, &mut bin.features[self.spatial.range(i)]);
        }
        bin.num_obs += 1;
    }

    /// Fold `other`, an incomplete accumulator of the same bin and pass, into `bin`.
    pub fn merge_spatial_bin(&self, other: &SpatialBin, bin: &mut SpatialBin) {
        for (i, agg) in self.aggregators.iter().enumerate() {
            let range = self.spatial.range(i);
            agg.merge_spatial(&other.features[range.clone()], &mut bin.features[range]);
        }
        bin.num_obs += other.num_obs;
    }

    pub fn complete_spatial_bin(&self, bin: &mut SpatialBin) {
        for (i, agg) in self.aggregators.iter().enumerate() {
            agg.complete_spatial(bin.num_obs, &mut bin.features[self.spatial.range(i)]);
        }
    }

    pub fn create_temporal_bin(&self, index: BinIndex) -> TemporalBin {
        let mut bin = TemporalBin::new(index, self.temporal.len());
        for (i, agg) in self.aggregators.iter().enumerate() {
            agg.init_temporal(&mut bin.features[self.temporal.range(i)]);
        }
        bin
    }

    /// Merge one spatial fragment into the temporal accumulator of the same index.
    pub fn aggregate_temporal_bin(
        &self,
        spatial_bin: &SpatialBin,
        temporal_bin: &mut TemporalBin,
    ) -> Result<(), BinningError> {
        if spatial_bin.index != temporal_bin.index {
            return Err(BinningError::MismatchedBinGroup {
                expected: temporal_bin.index,
                found: spatial_bin.index,
            });
        }
        if spatial_bin.features.len() != self.spatial.len() {
            return Err(BinningError::FeatureLengthMismatch {
                index: spatial_bin.index,
                expected: self.spatial.len(),
                found: spatial_bin.features.len(),
            });
        }
        for (i, agg) in self.aggregators.iter().enumerate() {
            agg.aggregate_temporal(
                &spatial_bin.features[self.spatial.range(i)],
                spatial_bin.num_obs,
                &mut temporal_bin.features[self.temporal.range(i)],
            );
        }
        temporal_bin.num_obs += spatial_bin.num_obs;
        temporal_bin.num_passes += spatial_bin.num_passes;
        Ok(())
    }

    pub fn complete_temporal_bin(&self, bin: &mut TemporalBin) {
        for (i, agg) in self.aggregators.iter().enumerate() {
            agg.complete_temporal(bin.num_obs, &mut bin.features[self.temporal.range(i)]);
        }
    }

    /// Output features of a completed temporal accumulator, after post-processing.
    pub fn compute_output(&self, temporal_bin: &TemporalBin) -> Vec<Feature> {
        let mut output = vec![0.0; self.output.len()];
        for (i, agg) in self.aggregators.iter().enumerate() {
            agg.compute_output(
                &temporal_bin.features[self.temporal.range(i)],
                &mut output[self.output.range(i)],
            );
        }
        self.post_processor.apply(output)
    }

    /// Reduce all spatial fragments of one bin index into a temporal bin carrying the
    /// output features.
    pub fn process_spatial_bins(
        &self,
        index: BinIndex,
        spatial_bins: &[SpatialBin],
    ) -> Result<TemporalBin, BinningError> {
        let mut temporal_bin = self.create_temporal_bin(index);
        for spatial_bin in spatial_bins {
            self.aggregate_temporal_bin(spatial_bin, &mut temporal_bin)?;
        }
        self.complete_temporal_bin(&mut temporal_bin);
        let features = self.compute_output(&temporal_bin);
        Ok(TemporalBin {
            features,
            ..temporal_bin
        })
    }
}
