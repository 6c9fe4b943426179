//! # Planetary grids
//!
//! Mapping between geographic coordinates and **bin indices**. A grid partitions the sphere
//! into `num_rows` latitude bands, numbered from the **north pole** (row 0) to the south pole,
//! and each row into `num_cols(row)` columns starting at longitude −180°. Bin indices are dense:
//! the first bin of row `r` is the sum of the column counts of rows `0..r`.
//!
//! Implementations
//! -----------------
//! * [`SeaGrid`] – equal-area grid, column count ∝ `cos(latitude)`.
//! * [`PlateCarreeGrid`] – regular lat/lon grid with `2 × num_rows` columns per row.
//!
//! Conventions
//! -----------------
//! * Latitudes are clamped to `[-90, 90]`, longitudes wrap into `[-180, 180)`.
//! * Every row owns at least one column, pole rows included.
//! * Row lookup from an index is a binary search over per-row base indices (O(log num_rows)).
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    binning_errors::BinningError,
    constants::{BinIndex, Degree},
};

pub mod plate_carree;
pub mod sea_grid;

pub use plate_carree::PlateCarreeGrid;
pub use sea_grid::SeaGrid;

/// Geographic ↔ bin-index mapping shared by the spatial binner and downstream formatters.
pub trait PlanetaryGrid: Send + Sync + fmt::Debug {
    /// Index of the bin containing `(lat, lon)`.
    fn bin_index(&self, lat: Degree, lon: Degree) -> BinIndex;

    /// Row of a bin. `bin_index` must be in `0..num_bins()`.
    fn row_index(&self, bin_index: BinIndex) -> usize;

    /// Total number of bins.
    fn num_bins(&self) -> BinIndex;

    fn num_rows(&self) -> usize;

    /// Number of columns of `row`.
    fn num_cols(&self, row: usize) -> usize;

    /// Index of the first (westernmost) bin of `row`.
    fn first_bin_index(&self, row: usize) -> BinIndex;

    /// Latitude of the center of `row`.
    fn center_lat(&self, row: usize) -> Degree;

    /// `(lat, lon)` of the center of a bin.
    fn center_lat_lon(&self, bin_index: BinIndex) -> (Degree, Degree) {
        let row = self.row_index(bin_index);
        let col = (bin_index - self.first_bin_index(row)) as f64;
        let lon = -180.0 + 360.0 * (col + 0.5) / self.num_cols(row) as f64;
        (self.center_lat(row), lon)
    }
}

/// Grid flavours selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GridType {
    #[default]
    #[serde(rename = "SEAGrid")]
    SeaGrid,
    #[serde(rename = "PlateCarree")]
    PlateCarree,
}

impl FromStr for GridType {
    type Err = BinningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SEAGrid" | "SEA" | "sea" => Ok(GridType::SeaGrid),
            "PlateCarree" | "plate_carree" => Ok(GridType::PlateCarree),
            other => Err(BinningError::UnknownGridType(other.to_string())),
        }
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridType::SeaGrid => write!(f, "SEAGrid"),
            GridType::PlateCarree => write!(f, "PlateCarree"),
        }
    }
}

impl GridType {
    /// Build the grid with `num_rows` latitude bands.
    pub fn create(self, num_rows: usize) -> Result<Box<dyn PlanetaryGrid>, BinningError> {
        Ok(match self {
            GridType::SeaGrid => Box::new(SeaGrid::new(num_rows)?),
            GridType::PlateCarree => Box::new(PlateCarreeGrid::new(num_rows)?),
        })
    }
}

/// Wrap a longitude into `[-180, 180)`.
#[inline]
pub fn normalize_lon(lon: Degree) -> Degree {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Row of a latitude in a grid of `num_rows` equally tall bands, row 0 at the north pole.
#[inline]
pub(crate) fn lat_to_row(lat: Degree, num_rows: usize) -> usize {
    let lat = lat.clamp(-90.0, 90.0);
    let row = ((90.0 - lat) * num_rows as f64 / 180.0) as usize;
    row.min(num_rows - 1)
}

/// Column of a longitude in a row of `num_cols` equally wide cells starting at −180°.
#[inline]
pub(crate) fn lon_to_col(lon: Degree, num_cols: usize) -> usize {
    let col = ((normalize_lon(lon) + 180.0) / 360.0 * num_cols as f64) as usize;
    col.min(num_cols - 1)
}

/// Row owning `bin_index`, given ascending per-row base indices.
#[inline]
pub(crate) fn row_of(base_bins: &[BinIndex], bin_index: BinIndex) -> usize {
    base_bins
        .partition_point(|&b| b <= bin_index)
        .saturating_sub(1)
}
