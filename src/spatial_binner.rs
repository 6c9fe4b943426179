//! # Spatial binning
//!
//! A [`SpatialBinner`] turns the pixels of one raster region into [`SpatialBin`] fragments.
//! It owns its bins exclusively: every worker (one per tile) creates its own binner and fills
//! it. No shared state is touched.
//!
//! One source is one pass: its tiles hand over their accumulators uncompleted
//! ([`SpatialBinner::into_partial`]), and [`merge_tiles`] folds them into a single fragment per
//! bin before completion. The completed [`SpatialBatch`] of the whole source is what reaches the
//! [`SpatialBinCollector`](crate::collector::SpatialBinCollector), so neither pass counts nor
//! per-pass means depend on the tiling.
//!
//! ## Per pixel
//! -----------------
//! 1. pixels failing the mask are skipped,
//! 2. samples are read once per pixel; an evaluation failure skips the pixel, as does an
//!    observation whose sample vector does not match the configured variables,
//! 3. with a super-sampling factor `S`, the pixel is sampled at the `S²` sub-pixel positions
//!    `(x + (i + ½)/S, y + (j + ½)/S)`, each an independent observation,
//! 4. unresolvable positions are skipped, as are positions outside the configured [`GeoRegion`],
//! 5. with a [`DataPeriod`], observations outside the current period are rejected (as are
//!    observations without acquisition time),
//! 6. the observation is aggregated into the tile-local bin of its grid cell.
//!
//! Every skipped or rejected observation is counted in [`SpatialStats`]; none aborts the tile.
use std::collections::HashMap;

use ahash::RandomState;
use itertools::Itertools;

use crate::{
    bin_manager::BinManager,
    bins::SpatialBin,
    constants::{BinIndex, Feature, MJD},
    geo_region::GeoRegion,
    observations::{Observation, PixelSource, Region},
    planetary_grid::PlanetaryGrid,
    time::{DataPeriod, Membership},
};

/// Observation counters of one or more spatial passes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpatialStats {
    /// Observations aggregated into a bin.
    pub num_obs: u64,
    /// Observations whose pixel failed the mask.
    pub num_masked: u64,
    /// Observations whose pixel samples could not be evaluated.
    pub num_failed: u64,
    /// Observations without a resolvable position (or time, when a data period is set).
    pub num_unresolved: u64,
    /// Observations outside the current data period.
    pub num_out_of_period: u64,
    /// Observations outside the configured region.
    pub num_outside_region: u64,
}

impl SpatialStats {
    pub fn merge(&mut self, other: &SpatialStats) {
        self.num_obs += other.num_obs;
        self.num_masked += other.num_masked;
        self.num_failed += other.num_failed;
        self.num_unresolved += other.num_unresolved;
        self.num_out_of_period += other.num_out_of_period;
        self.num_outside_region += other.num_outside_region;
    }

    /// All observations looked at, accepted or not.
    pub fn num_seen(&self) -> u64 {
        self.num_obs
            + self.num_masked
            + self.num_failed
            + self.num_unresolved
            + self.num_out_of_period
            + self.num_outside_region
    }
}

/// Fragments of one spatial pass, sorted by bin index.
#[derive(Debug, Clone, Default)]
pub struct SpatialBatch {
    pub bins: Vec<SpatialBin>,
    pub stats: SpatialStats,
}

pub struct SpatialBinner<'a> {
    manager: &'a BinManager,
    grid: &'a dyn PlanetaryGrid,
    super_sampling: u32,
    data_period: Option<DataPeriod>,
    region: Option<GeoRegion>,
    active_bins: HashMap<BinIndex, SpatialBin, RandomState>,
    stats: SpatialStats,
}

impl<'a> SpatialBinner<'a> {
    /// Create an empty binner.
    ///
    /// Arguments
    /// -----------------
    /// * `manager`: the aggregator layout shared by all workers.
    /// * `grid`: the planetary grid.
    /// * `super_sampling`: sub-pixel factor `S ≥ 1` (values below 1 are treated as 1).
    /// * `data_period`: optional composite window filter.
    pub fn new(
        manager: &'a BinManager,
        grid: &'a dyn PlanetaryGrid,
        super_sampling: u32,
        data_period: Option<DataPeriod>,
    ) -> Self {
        SpatialBinner {
            manager,
            grid,
            super_sampling: super_sampling.max(1),
            data_period,
            region: None,
            active_bins: HashMap::default(),
            stats: SpatialStats::default(),
        }
    }

    /// Reject observations outside `region`.
    pub fn with_region(mut self, region: Option<GeoRegion>) -> Self {
        self.region = region;
        self
    }

    pub fn stats(&self) -> &SpatialStats {
        &self.stats
    }

    /// Number of distinct bins touched so far.
    pub fn num_active_bins(&self) -> usize {
        self.active_bins.len()
    }

    /// Aggregate one observation. Returns `true` if it was accepted.
    pub fn process_observation(&mut self, observation: &Observation) -> bool {
        if observation.values.len() != self.manager.num_variables() {
            self.stats.num_failed += 1;
            return false;
        }
        if let Some(region) = &self.region {
            if !region.contains(observation.lat, observation.lon) {
                self.stats.num_outside_region += 1;
                return false;
            }
        }
        if let Some(period) = &self.data_period {
            if observation.mjd.is_nan() {
                self.stats.num_unresolved += 1;
                return false;
            }
            if period.membership(observation.lon, observation.mjd) != Membership::CurrentPeriod {
                self.stats.num_out_of_period += 1;
                return false;
            }
        }

        let index = self.grid.bin_index(observation.lat, observation.lon);
        let manager = self.manager;
        let bin = self
            .active_bins
            .entry(index)
            .or_insert_with(|| manager.create_spatial_bin(index));
        manager.aggregate_spatial_bin(observation, bin);
        self.stats.num_obs += 1;
        true
    }

    /// Aggregate every pixel of `region`.
    pub fn process_region<S: PixelSource + ?Sized>(&mut self, source: &S, region: Region) {
        let s = self.super_sampling as usize;
        let sub_per_pixel = (s * s) as u64;
        let offsets: Vec<f64> = (0..s).map(|i| (i as f64 + 0.5) / s as f64).collect();

        let mut samples: Vec<Feature> = vec![0.0; self.manager.num_variables()];
        let mut observation = Observation::new(0.0, 0.0, MJD::NAN, &[]);

        for y in region.y..region.y + region.height {
            for x in region.x..region.x + region.width {
                if !source.is_valid(x, y) {
                    self.stats.num_masked += sub_per_pixel;
                    continue;
                }
                if !source.samples(x, y, &mut samples) {
                    self.stats.num_failed += sub_per_pixel;
                    continue;
                }
                observation.values.clear();
                observation.values.extend_from_slice(&samples);
                observation.mjd = source.acquisition_time(x, y).unwrap_or(MJD::NAN);

                for dy in &offsets {
                    for dx in &offsets {
                        match source.geo_pos(x as f64 + dx, y as f64 + dy) {
                            Some((lat, lon)) => {
                                observation.lat = lat;
                                observation.lon = lon;
                                self.process_observation(&observation);
                            }
                            None => self.stats.num_unresolved += 1,
                        }
                    }
                }
            }
        }
    }

    /// Aggregate the whole raster of `source`.
    pub fn process_source<S: PixelSource + ?Sized>(&mut self, source: &S) {
        let region = Region {
            x: 0,
            y: 0,
            width: source.width(),
            height: source.height(),
        };
        self.process_region(source, region);
    }

    /// Hand over the bins uncompleted, sorted by bin index, for [`merge_tiles`].
    pub fn into_partial(self) -> SpatialBatch {
        let mut bins: Vec<SpatialBin> = self.active_bins.into_values().collect();
        bins.sort_unstable_by_key(|b| b.index);
        SpatialBatch {
            bins,
            stats: self.stats,
        }
    }

    /// Complete every bin and hand over the batch, sorted by bin index.
    pub fn complete(self) -> SpatialBatch {
        let manager = self.manager;
        let mut batch = self.into_partial();
        for bin in &mut batch.bins {
            manager.complete_spatial_bin(bin);
        }
        batch
    }
}

/// Fold the partial batches of the tiles of one pass into one completed batch holding a single
/// fragment per bin. Fragments of a bin are merged in tile order.
pub fn merge_tiles(manager: &BinManager, tiles: Vec<SpatialBatch>) -> SpatialBatch {
    let mut stats = SpatialStats::default();
    let mut fragments = Vec::with_capacity(tiles.iter().map(|t| t.bins.len()).sum());
    for tile in tiles {
        stats.merge(&tile.stats);
        fragments.extend(tile.bins);
    }
    // stable: equal indices keep their tile order
    fragments.sort_by_key(|b| b.index);

    let mut bins: Vec<SpatialBin> = fragments
        .into_iter()
        .coalesce(|mut bin, next| {
            if bin.index == next.index {
                manager.merge_spatial_bin(&next, &mut bin);
                Ok(bin)
            } else {
                Err((bin, next))
            }
        })
        .collect();
    for bin in &mut bins {
        manager.complete_spatial_bin(bin);
    }
    SpatialBatch { bins, stats }
}
