//! # Binning pipeline
//!
//! [`Binning`] is the entry point of the crate. It is built once from a validated
//! [`BinningConfig`] (grid, aggregators, post-processors, data period, date filter) and then runs
//! the two phases over any number of [`PixelSource`]s:
//!
//! 1. **Spatial phase** (parallel, [rayon](https://docs.rs/rayon)): every source is cut into
//!    horizontal stripes of `tile_height` lines. Each stripe is binned by its own
//!    [`SpatialBinner`]; the stripes of one source are then merged in stripe order into one
//!    fragment per bin ([`merge_tiles`]), and that batch is handed to a shared
//!    [`SpatialBinCollector`] (in memory, or spilling when `bins_per_spill_file` is set).
//!    One source therefore counts as one pass whatever the tile height.
//! 2. **Temporal phase** (sequential): the collector yields the fragments grouped by ascending
//!    bin index; each group becomes one [`TemporalBin`](crate::bins::TemporalBin) appended to a
//!    paged [`TemporalBinList`].
//!
//! Source filters
//! -----------------
//! A source is skipped before binning when
//!
//! * its acquisition range does not overlap `start_date..=end_date`,
//! * a data period is configured and the source is acquired more than half a day away from it
//!   ([`DataPeriod::may_contain`]),
//! * a region is configured and the source footprint does not intersect it.
//!
//! Sources that report no acquisition range or footprint are never skipped. Observations of an
//! accepted source are still checked one by one against the data period and the region.
//!
//! Cancellation
//! -----------------
//! `should_cancel` is polled before every tile and, at most every [`CANCEL_POLL_INTERVAL`],
//! between bin groups. A cancelled run returns [`BinningError::Cancelled`]; spill and page files
//! are removed as their owners are dropped.
//!
//! Example
//! -----------------
//! ```rust, no_run
//! use geobin::{
//!     aggregators::AggregatorConfig,
//!     binning::Binning,
//!     config::BinningConfig,
//!     observations::{GeoCoding, GriddedProduct},
//! };
//!
//! let config = BinningConfig::builder()
//!     .num_rows(180)
//!     .variables(&["chl"])
//!     .aggregator(AggregatorConfig::Average { var_name: "chl".into(), weight_coeff: 0.0 })
//!     .build()?;
//! let binning = Binning::new(config)?;
//!
//! let geo = GeoCoding::Affine { lat0: 10.0, lon0: 20.0, lat_step: 0.01, lon_step: 0.01 };
//! let product = GriddedProduct::new("p1", 2, 2, geo).with_band(vec![0.1, 0.2, 0.3, 0.4]);
//!
//! let mut result = binning.process(&[product], || false)?;
//! for bin in result.bins.iter() {
//!     let bin = bin?;
//!     println!("{} {:?}", bin.index, bin.features);
//! }
//! # Ok::<(), geobin::binning_errors::BinningError>(())
//! ```
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use rayon::prelude::*;

use crate::{
    bin_manager::BinManager,
    binning_errors::BinningError,
    collector::{MemoryCollector, SpatialBinCollection, SpatialBinCollector, SpillingCollector},
    config::BinningConfig,
    observations::{PixelSource, Region},
    planetary_grid::PlanetaryGrid,
    spatial_binner::{merge_tiles, SpatialBatch, SpatialBinner, SpatialStats},
    temporal_bin_list::TemporalBinList,
    temporal_binner::TemporalBinner,
    time::{DataPeriod, TimeRange},
};

#[cfg(feature = "progress")]
use crate::progress_bar::GroupProgress;

/// Minimum time between two cancellation polls of the temporal phase.
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Counters of one binning run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BinningStats {
    /// Sources handed to the run.
    pub num_sources: usize,
    /// Sources skipped by the date, data-period or region filter.
    pub num_sources_skipped: usize,
    /// Tiles binned in the spatial phase.
    pub num_tiles: usize,
    pub spatial: SpatialStats,
    /// Spatial fragments handed to the collector, one per bin and source.
    pub num_fragments: u64,
    pub num_spill_files: usize,
    /// Temporal bins produced.
    pub num_bins: usize,
}

/// Outcome of [`Binning::process`].
#[derive(Debug)]
pub struct BinningResult {
    /// Temporal bins in ascending index order, features named by `feature_names`.
    pub bins: TemporalBinList,
    pub feature_names: Vec<String>,
    pub grid: Arc<dyn PlanetaryGrid>,
    pub stats: BinningStats,
}

#[derive(Debug)]
pub struct Binning {
    config: BinningConfig,
    grid: Arc<dyn PlanetaryGrid>,
    manager: BinManager,
    data_period: Option<DataPeriod>,
    time_range: Option<TimeRange>,
}

impl Binning {
    /// Build the grid, the aggregators and the filters described by `config`.
    ///
    /// Return
    /// ----------
    /// * The pipeline, or the first validation error of the configuration.
    pub fn new(config: BinningConfig) -> Result<Self, BinningError> {
        config.validate()?;

        let grid: Arc<dyn PlanetaryGrid> = Arc::from(config.grid_type.create(config.num_rows)?);
        let manager = BinManager::from_config(
            &config.aggregators,
            &config.post_processors,
            &config.variable_context(),
        )?;
        let data_period = config.data_period()?;
        let time_range = config.time_range()?;

        tracing::info!(
            grid = %config.grid_type,
            num_rows = config.num_rows,
            num_bins = grid.num_bins(),
            super_sampling = config.super_sampling,
            spill = ?config.bins_per_spill_file,
            mask = ?config.mask_expression,
            "binning initialized"
        );

        Ok(Binning {
            config,
            grid,
            manager,
            data_period,
            time_range,
        })
    }

    pub fn config(&self) -> &BinningConfig {
        &self.config
    }

    pub fn grid(&self) -> &dyn PlanetaryGrid {
        self.grid.as_ref()
    }

    pub fn bin_manager(&self) -> &BinManager {
        &self.manager
    }

    /// Names of the features of every produced temporal bin.
    pub fn feature_names(&self) -> &[String] {
        self.manager.result_feature_names()
    }

    /// Mask expression the upstream reader should evaluate into [`PixelSource::is_valid`].
    pub fn mask_expression(&self) -> Option<&str> {
        self.config.mask_expression.as_deref()
    }

    /// True if `source` passes the source filters.
    pub fn accepts_source<S: PixelSource + ?Sized>(&self, source: &S) -> bool {
        self.rejection(source).is_none()
    }

    /// Name of the first source filter rejecting `source`.
    fn rejection<S: PixelSource + ?Sized>(&self, source: &S) -> Option<&'static str> {
        if let Some((start, end)) = source.time_range() {
            if self.time_range.is_some_and(|range| !range.overlaps(start, end)) {
                return Some("date range");
            }
            if self
                .data_period
                .is_some_and(|period| !period.may_contain(start, end))
            {
                return Some("data period");
            }
        }
        if let (Some(region), Some(bounds)) = (&self.config.region, source.geo_bounds()) {
            if !region.intersects(&bounds) {
                return Some("region");
            }
        }
        None
    }

    /// Run both phases over `sources`.
    ///
    /// Arguments
    /// -----------------
    /// * `sources`: the rasters to bin; the sample order of each must follow the configured
    ///   variables.
    /// * `should_cancel`: cooperative cancellation flag, called from worker threads.
    ///
    /// Return
    /// ----------
    /// * The temporal bins and run statistics, [`BinningError::Cancelled`], or the first I/O or
    ///   consistency error.
    pub fn process<S, F>(&self, sources: &[S], should_cancel: F) -> Result<BinningResult, BinningError>
    where
        S: PixelSource,
        F: Fn() -> bool + Sync,
    {
        match self.config.bins_per_spill_file {
            Some(threshold) => {
                let collector =
                    SpillingCollector::new(threshold, self.config.temp_dir.as_deref())?;
                self.process_with(collector, sources, &should_cancel)
            }
            None => self.process_with(MemoryCollector::new(), sources, &should_cancel),
        }
    }

    /// Run both phases with an explicit collector.
    pub fn process_with<C, S, F>(
        &self,
        collector: C,
        sources: &[S],
        should_cancel: &F,
    ) -> Result<BinningResult, BinningError>
    where
        C: SpatialBinCollector,
        S: PixelSource,
        F: Fn() -> bool + Sync,
    {
        let start = Instant::now();
        let mut stats = BinningStats {
            num_sources: sources.len(),
            ..BinningStats::default()
        };

        for source in sources {
            if let Some(filter) = self.rejection(source) {
                tracing::info!(source = source.name(), filter, "source skipped");
                stats.num_sources_skipped += 1;
                continue;
            }
            let (tiles, spatial) = self.process_spatial(source, &collector, should_cancel)?;
            stats.num_tiles += tiles;
            stats.spatial.merge(&spatial);
        }

        let collection = collector.complete()?;
        stats.num_fragments = collection.num_fragments();
        stats.num_spill_files = collection.num_spill_files();
        tracing::info!(
            sources = stats.num_sources - stats.num_sources_skipped,
            observations = stats.spatial.num_obs,
            fragments = stats.num_fragments,
            spill_files = stats.num_spill_files,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "spatial binning done"
        );

        let bins = self.process_temporal(collection, should_cancel)?;
        stats.num_bins = bins.len();
        tracing::info!(
            bins = stats.num_bins,
            pages = bins.num_pages(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "temporal binning done"
        );

        Ok(BinningResult {
            bins,
            feature_names: self.feature_names().to_vec(),
            grid: Arc::clone(&self.grid),
            stats,
        })
    }

    /// Spatial phase of one source: tiles are binned in parallel, merged into one fragment per
    /// bin and consumed by `collector`.
    ///
    /// Return
    /// ----------
    /// * `(number of tiles, observation counters)`
    pub fn process_spatial<S, C, F>(
        &self,
        source: &S,
        collector: &C,
        should_cancel: &F,
    ) -> Result<(usize, SpatialStats), BinningError>
    where
        S: PixelSource + ?Sized,
        C: SpatialBinCollector,
        F: Fn() -> bool + Sync,
    {
        let tiles = Region::stripes(source.width(), source.height(), self.config.tile_height);
        let partials = tiles
            .par_iter()
            .map(|&region| {
                if should_cancel() {
                    return Err(BinningError::Cancelled);
                }
                let mut binner = SpatialBinner::new(
                    &self.manager,
                    self.grid.as_ref(),
                    self.config.super_sampling,
                    self.data_period,
                )
                .with_region(self.config.region);
                binner.process_region(source, region);
                Ok(binner.into_partial())
            })
            .collect::<Result<Vec<SpatialBatch>, BinningError>>()?;

        let batch = merge_tiles(&self.manager, partials);
        let stats = batch.stats;
        collector.consume(batch.bins)?;

        tracing::info!(
            source = source.name(),
            tiles = tiles.len(),
            accepted = stats.num_obs,
            masked = stats.num_masked,
            failed = stats.num_failed,
            unresolved = stats.num_unresolved,
            out_of_period = stats.num_out_of_period,
            outside_region = stats.num_outside_region,
            "source spatially binned"
        );
        Ok((tiles.len(), stats))
    }

    /// Temporal phase: reduce every group of `collection` into the paged result list.
    pub fn process_temporal<F>(
        &self,
        collection: SpatialBinCollection,
        should_cancel: &F,
    ) -> Result<TemporalBinList, BinningError>
    where
        F: Fn() -> bool + Sync,
    {
        let mut bins = TemporalBinList::new(
            self.config.page_capacity,
            self.config.max_cached_pages,
            self.config.temp_dir.as_deref(),
        )?;
        let mut binner = TemporalBinner::new(&self.manager);

        #[cfg(feature = "progress")]
        let mut progress = GroupProgress::new(collection.num_fragments());

        let mut last_poll: Option<Instant> = None;
        for group in collection {
            if last_poll.map_or(true, |t| t.elapsed() >= CANCEL_POLL_INTERVAL) {
                if should_cancel() {
                    tracing::warn!(bins = bins.len(), "temporal binning cancelled");
                    return Err(BinningError::Cancelled);
                }
                last_poll = Some(Instant::now());
            }

            let (index, fragments) = group?;
            let bin = binner.process_spatial_bins(index, &fragments)?;
            bins.add(bin)?;

            #[cfg(feature = "progress")]
            progress.advance(fragments.len());
        }
        Ok(bins)
    }
}
