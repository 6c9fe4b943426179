//! Spatial and temporal binning of geolocated raster observations onto planetary grids.
//!
//! See [`binning::Binning`] for the pipeline entry point.
pub mod aggregators;
pub mod bin_manager;
pub mod binning;
pub mod binning_errors;
pub mod bins;
pub mod cell_processor;
pub mod collector;
pub mod config;
pub mod constants;
pub mod geo_region;
pub mod observations;
pub mod planetary_grid;
#[cfg(feature = "progress")]
pub mod progress_bar;
pub mod spatial_binner;
pub mod temporal_bin_list;
pub mod temporal_binner;
pub mod time;

pub use binning::{Binning, BinningResult, BinningStats};
pub use binning_errors::BinningError;
pub use config::BinningConfig;
