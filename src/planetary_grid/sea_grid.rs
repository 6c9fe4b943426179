//! Equal-area ("SEA") grid.
//!
//! Row `r` is centered on `lat_r = 90 − (r + 0.5) · 180 / num_rows` and holds
//! `max(1, round(2 · num_rows · cos(lat_r)))` columns, so that every bin spans roughly the same
//! area (`180 / num_rows` degrees of arc on each side). With the default 2160 rows the grid has
//! 5 940 422 bins of about 9.28 km.
use crate::{
    binning_errors::BinningError,
    constants::{BinIndex, Degree},
};

use super::{lat_to_row, lon_to_col, row_of, PlanetaryGrid};

#[derive(Debug, Clone)]
pub struct SeaGrid {
    num_rows: usize,
    lat_bin: Vec<Degree>,
    num_bin: Vec<usize>,
    base_bin: Vec<BinIndex>,
    num_bins: BinIndex,
}

impl SeaGrid {
    /// Build the equal-area grid.
    ///
    /// Arguments
    /// ---------
    /// * `num_rows`: number of latitude bands, must be strictly positive
    ///
    /// Return
    /// ------
    /// * the grid, or [`BinningError::InvalidGridRows`]
    pub fn new(num_rows: usize) -> Result<Self, BinningError> {
        if num_rows == 0 {
            return Err(BinningError::InvalidGridRows(num_rows));
        }

        let mut lat_bin = Vec::with_capacity(num_rows);
        let mut num_bin = Vec::with_capacity(num_rows);
        let mut base_bin = Vec::with_capacity(num_rows);

        let mut base: BinIndex = 0;
        for row in 0..num_rows {
            let lat = 90.0 - (row as f64 + 0.5) * 180.0 / num_rows as f64;
            let cols = (0.5 + 2.0 * num_rows as f64 * lat.to_radians().cos()) as usize;
            let cols = cols.max(1);

            lat_bin.push(lat);
            num_bin.push(cols);
            base_bin.push(base);
            base += cols as BinIndex;
        }

        Ok(SeaGrid {
            num_rows,
            lat_bin,
            num_bin,
            base_bin,
            num_bins: base,
        })
    }
}

impl PlanetaryGrid for SeaGrid {
    fn bin_index(&self, lat: Degree, lon: Degree) -> BinIndex {
        let row = lat_to_row(lat, self.num_rows);
        let col = lon_to_col(lon, self.num_bin[row]);
        self.base_bin[row] + col as BinIndex
    }

    fn row_index(&self, bin_index: BinIndex) -> usize {
        row_of(&self.base_bin, bin_index)
    }

    fn num_bins(&self) -> BinIndex {
        self.num_bins
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self, row: usize) -> usize {
        self.num_bin[row]
    }

    fn first_bin_index(&self, row: usize) -> BinIndex {
        self.base_bin[row]
    }

    fn center_lat(&self, row: usize) -> Degree {
        self.lat_bin[row]
    }
}

#[cfg(test)]
mod sea_grid_test {
    use super::*;

    #[test]
    fn test_default_grid_size() {
        let grid = SeaGrid::new(2160).unwrap();
        assert_eq!(grid.num_rows(), 2160);
        assert_eq!(grid.num_bins(), 5_940_422);
        assert_eq!(grid.num_cols(0), 3);
        assert_eq!(grid.num_cols(1080), 4320);
    }

    #[test]
    fn test_small_grid_layout() {
        let grid = SeaGrid::new(6).unwrap();
        // cos(75°), cos(45°), cos(15°) → 3, 8, 12 columns, mirrored in the south
        let cols: Vec<usize> = (0..6).map(|r| grid.num_cols(r)).collect();
        assert_eq!(cols, vec![3, 8, 12, 12, 8, 3]);
        assert_eq!(grid.num_bins(), 46);
        assert_eq!(grid.first_bin_index(2), 11);
        assert_eq!(grid.row_index(10), 1);
        assert_eq!(grid.row_index(11), 2);
        assert_eq!(grid.row_index(45), 5);
    }

    #[test]
    fn test_bin_index_corners() {
        let grid = SeaGrid::new(6).unwrap();
        assert_eq!(grid.bin_index(90.0, -180.0), 0);
        assert_eq!(grid.bin_index(90.0, 179.999), 2);
        assert_eq!(grid.bin_index(-90.0, 179.999), 45);
        // 180° wraps onto the first column
        assert_eq!(grid.bin_index(-90.0, 180.0), 43);
    }

    #[test]
    fn test_center() {
        let grid = SeaGrid::new(6).unwrap();
        let (lat, lon) = grid.center_lat_lon(0);
        assert_eq!(lat, 75.0);
        assert_eq!(lon, -120.0);
        let (lat, lon) = grid.center_lat_lon(11);
        assert_eq!(lat, 15.0);
        assert_eq!(lon, -165.0);
    }
}
