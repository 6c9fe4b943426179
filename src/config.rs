//! # Binning configuration
//!
//! [`BinningConfig`] gathers every option of a binning run. It can be read from JSON
//! ([`BinningConfig::from_json_str`], [`BinningConfig::from_json_file`]) or assembled in code
//! with the fluent [`BinningConfigBuilder`]. Both paths end in the same validation.
//!
//! Example
//! -----------------
//! ```json
//! {
//!   "grid_type": "SEAGrid",
//!   "num_rows": 2160,
//!   "variables": ["chl"],
//!   "aggregators": [{ "type": "AVG", "var_name": "chl", "weight_coeff": 0.0 }],
//!   "super_sampling": 1,
//!   "data_period": { "anchor_time": "2009-06-18", "period_duration_days": 1.0 }
//! }
//! ```
//!
//! Options omitted from the JSON take their defaults from [`crate::constants`].
//! `mask_expression` is carried verbatim for the upstream pixel source; it is not evaluated here.
//! `region` restricts the run to a lat/lon box (see [`GeoRegion`]).
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::{
    aggregators::{AggregatorConfig, VariableContext},
    binning_errors::BinningError,
    cell_processor::CellProcessorConfig,
    constants::{
        DEFAULT_MAX_CACHED_PAGES, DEFAULT_NUM_ROWS, DEFAULT_PAGE_CAPACITY, DEFAULT_SUPER_SAMPLING,
        DEFAULT_TILE_HEIGHT,
    },
    geo_region::GeoRegion,
    planetary_grid::GridType,
    time::{DataPeriod, DataPeriodConfig, TimeRange},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinningConfig {
    pub grid_type: GridType,
    pub num_rows: usize,
    /// Names of the sample vector entries, in order.
    pub variables: Vec<String>,
    pub aggregators: Vec<AggregatorConfig>,
    pub post_processors: Vec<CellProcessorConfig>,
    pub super_sampling: u32,
    /// Pixel validity expression. Evaluation belongs to the upstream [`PixelSource`] reader,
    /// which reads it through [`Binning::mask_expression`](crate::binning::Binning::mask_expression)
    /// and reports the outcome through [`PixelSource::is_valid`]. The binning core never parses it.
    ///
    /// [`PixelSource`]: crate::observations::PixelSource
    /// [`PixelSource::is_valid`]: crate::observations::PixelSource::is_valid
    pub mask_expression: Option<String>,
    /// Restricts binning to a lat/lon box; sources outside it are skipped.
    pub region: Option<GeoRegion>,
    pub data_period: Option<DataPeriodConfig>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Spill threshold of the collector; everything stays in memory if `None`.
    pub bins_per_spill_file: Option<usize>,
    pub page_capacity: usize,
    pub max_cached_pages: usize,
    /// Parent directory of spill and page files, the system temp dir if `None`.
    pub temp_dir: Option<Utf8PathBuf>,
    /// Raster lines per parallel tile.
    pub tile_height: usize,
}

impl Default for BinningConfig {
    fn default() -> Self {
        BinningConfig {
            grid_type: GridType::default(),
            num_rows: DEFAULT_NUM_ROWS,
            variables: Vec::new(),
            aggregators: Vec::new(),
            post_processors: Vec::new(),
            super_sampling: DEFAULT_SUPER_SAMPLING,
            mask_expression: None,
            region: None,
            data_period: None,
            start_date: None,
            end_date: None,
            bins_per_spill_file: None,
            page_capacity: DEFAULT_PAGE_CAPACITY,
            max_cached_pages: DEFAULT_MAX_CACHED_PAGES,
            temp_dir: None,
            tile_height: DEFAULT_TILE_HEIGHT,
        }
    }
}

impl BinningConfig {
    pub fn builder() -> BinningConfigBuilder {
        BinningConfigBuilder::new()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, BinningError> {
        let config: BinningConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: &Utf8Path) -> Result<Self, BinningError> {
        let json = fs::read_to_string(path)?;
        BinningConfig::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, BinningError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Variable resolution context of the sample vector.
    pub fn variable_context(&self) -> VariableContext {
        VariableContext::new(&self.variables)
    }

    /// Resolved data period, if configured.
    pub fn data_period(&self) -> Result<Option<DataPeriod>, BinningError> {
        self.data_period
            .as_ref()
            .map(DataPeriod::from_config)
            .transpose()
    }

    /// Source acquisition filter, if both dates are configured.
    pub fn time_range(&self) -> Result<Option<TimeRange>, BinningError> {
        TimeRange::from_dates(self.start_date.as_deref(), self.end_date.as_deref())
    }

    /// Check every option and cross-reference.
    pub fn validate(&self) -> Result<(), BinningError> {
        if self.num_rows == 0 {
            return Err(BinningError::InvalidGridRows(self.num_rows));
        }
        if self.super_sampling < 1 {
            return Err(BinningError::InvalidConfiguration(
                "super_sampling must be >= 1".into(),
            ));
        }
        if self.page_capacity < 1 || self.max_cached_pages < 1 {
            return Err(BinningError::InvalidConfiguration(
                "page_capacity and max_cached_pages must be >= 1".into(),
            ));
        }
        if self.bins_per_spill_file == Some(0) {
            return Err(BinningError::InvalidConfiguration(
                "bins_per_spill_file must be >= 1".into(),
            ));
        }
        if self.tile_height < 1 {
            return Err(BinningError::InvalidConfiguration(
                "tile_height must be >= 1".into(),
            ));
        }
        if self.aggregators.is_empty() {
            return Err(BinningError::InvalidConfiguration(
                "at least one aggregator is required".into(),
            ));
        }

        let ctx = self.variable_context();
        for name in self.aggregators.iter().flat_map(AggregatorConfig::var_names) {
            ctx.index_of(name)?;
        }

        if let Some(region) = &self.region {
            region.validate()?;
        }
        self.time_range()?;
        self.data_period()?;
        Ok(())
    }
}

/// Builder for [`BinningConfig`], with validation.
#[derive(Debug, Clone, Default)]
pub struct BinningConfigBuilder {
    config: BinningConfig,
}

impl BinningConfigBuilder {
    /// Create a new builder initialized with default values.
    pub fn new() -> Self {
        Self {
            config: BinningConfig::default(),
        }
    }

    // --- Grid ---
    pub fn grid_type(mut self, v: GridType) -> Self {
        self.config.grid_type = v;
        self
    }
    pub fn num_rows(mut self, v: usize) -> Self {
        self.config.num_rows = v;
        self
    }

    // --- Variables and statistics ---
    pub fn variables<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.config.variables = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }
    pub fn aggregator(mut self, v: AggregatorConfig) -> Self {
        self.config.aggregators.push(v);
        self
    }
    pub fn post_processor(mut self, v: CellProcessorConfig) -> Self {
        self.config.post_processors.push(v);
        self
    }

    // --- Sampling and filtering ---
    pub fn super_sampling(mut self, v: u32) -> Self {
        self.config.super_sampling = v;
        self
    }
    pub fn mask_expression(mut self, v: &str) -> Self {
        self.config.mask_expression = Some(v.to_string());
        self
    }
    pub fn region(mut self, v: GeoRegion) -> Self {
        self.config.region = Some(v);
        self
    }
    pub fn data_period(mut self, v: DataPeriodConfig) -> Self {
        self.config.data_period = Some(v);
        self
    }
    pub fn start_date(mut self, v: &str) -> Self {
        self.config.start_date = Some(v.to_string());
        self
    }
    pub fn end_date(mut self, v: &str) -> Self {
        self.config.end_date = Some(v.to_string());
        self
    }

    // --- Resources ---
    pub fn bins_per_spill_file(mut self, v: usize) -> Self {
        self.config.bins_per_spill_file = Some(v);
        self
    }
    pub fn page_capacity(mut self, v: usize) -> Self {
        self.config.page_capacity = v;
        self
    }
    pub fn max_cached_pages(mut self, v: usize) -> Self {
        self.config.max_cached_pages = v;
        self
    }
    pub fn temp_dir(mut self, v: impl Into<Utf8PathBuf>) -> Self {
        self.config.temp_dir = Some(v.into());
        self
    }
    pub fn tile_height(mut self, v: usize) -> Self {
        self.config.tile_height = v;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<BinningConfig, BinningError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
