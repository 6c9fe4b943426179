//! # Temporal binning
//!
//! Reduces each group of spatial fragments sharing a bin index to one [`TemporalBin`] carrying
//! the output features. Groups must arrive in strictly ascending index order, which is what the
//! [collectors](crate::collector) produce; anything else is a programming error and fails fast
//! with [`BinningError::BinOrderViolation`].
use crate::{
    bin_manager::BinManager,
    binning_errors::BinningError,
    bins::{SpatialBin, TemporalBin},
    constants::BinIndex,
};

pub struct TemporalBinner<'a> {
    manager: &'a BinManager,
    last_index: Option<BinIndex>,
    num_bins: usize,
    num_obs: u64,
}

impl<'a> TemporalBinner<'a> {
    pub fn new(manager: &'a BinManager) -> Self {
        TemporalBinner {
            manager,
            last_index: None,
            num_bins: 0,
            num_obs: 0,
        }
    }

    /// Merge all fragments of `index` into a finished temporal bin.
    ///
    /// Arguments
    /// -----------------
    /// * `index`: bin index of the group, greater than every index processed before.
    /// * `spatial_bins`: the fragments, all with bin index `index`.
    ///
    /// Return
    /// ----------
    /// * The temporal bin with output features, or the first ordering or layout violation.
    pub fn process_spatial_bins(
        &mut self,
        index: BinIndex,
        spatial_bins: &[SpatialBin],
    ) -> Result<TemporalBin, BinningError> {
        if let Some(previous) = self.last_index {
            if index <= previous {
                return Err(BinningError::BinOrderViolation {
                    previous,
                    current: index,
                });
            }
        }
        self.last_index = Some(index);

        let bin = self.manager.process_spatial_bins(index, spatial_bins)?;
        self.num_bins += 1;
        self.num_obs += bin.num_obs as u64;
        Ok(bin)
    }

    /// Number of temporal bins produced so far.
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Observations merged into the produced bins.
    pub fn num_obs(&self) -> u64 {
        self.num_obs
    }
}

#[cfg(test)]
mod temporal_binner_test {
    use super::*;
    use crate::{
        aggregators::{AggregatorConfig, VariableContext},
        observations::Observation,
    };

    fn manager() -> BinManager {
        let ctx = VariableContext::new(&["chl"]);
        BinManager::from_config(
            &[AggregatorConfig::Average {
                var_name: "chl".into(),
                weight_coeff: 0.0,
            }],
            &[],
            &ctx,
        )
        .unwrap()
    }

    fn fragment(manager: &BinManager, index: BinIndex, values: &[f32]) -> SpatialBin {
        let mut bin = manager.create_spatial_bin(index);
        for &v in values {
            manager.aggregate_spatial_bin(&Observation::new(0.0, 0.0, 0.0, &[v]), &mut bin);
        }
        manager.complete_spatial_bin(&mut bin);
        bin
    }

    #[test]
    fn test_two_fragments() {
        let manager = manager();
        let mut binner = TemporalBinner::new(&manager);
        let fragments = [
            fragment(&manager, 4, &[2.0, 2.0]),
            fragment(&manager, 4, &[4.0]),
        ];
        let bin = binner.process_spatial_bins(4, &fragments).unwrap();
        assert_eq!(bin.num_obs, 3);
        assert_eq!(bin.num_passes, 2);
        // unweighted mean of the per-pass means
        assert_eq!(bin.features[0], 3.0);
        assert_eq!(binner.num_bins(), 1);
        assert_eq!(binner.num_obs(), 3);
    }

    #[test]
    fn test_order_violation() {
        let manager = manager();
        let mut binner = TemporalBinner::new(&manager);
        binner
            .process_spatial_bins(5, &[fragment(&manager, 5, &[1.0])])
            .unwrap();
        assert_eq!(
            binner
                .process_spatial_bins(5, &[fragment(&manager, 5, &[1.0])])
                .unwrap_err(),
            BinningError::BinOrderViolation {
                previous: 5,
                current: 5
            }
        );
        assert_eq!(
            binner
                .process_spatial_bins(2, &[fragment(&manager, 2, &[1.0])])
                .unwrap_err(),
            BinningError::BinOrderViolation {
                previous: 5,
                current: 2
            }
        );
    }
}
