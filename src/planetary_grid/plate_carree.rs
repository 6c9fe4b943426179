//! Regular lat/lon ("plate carrée") grid: `num_rows` rows of `2 · num_rows` square cells.
use crate::{
    binning_errors::BinningError,
    constants::{BinIndex, Degree},
};

use super::{lat_to_row, lon_to_col, PlanetaryGrid};

#[derive(Debug, Clone)]
pub struct PlateCarreeGrid {
    num_rows: usize,
    num_cols: usize,
}

impl PlateCarreeGrid {
    pub fn new(num_rows: usize) -> Result<Self, BinningError> {
        if num_rows == 0 {
            return Err(BinningError::InvalidGridRows(num_rows));
        }
        Ok(PlateCarreeGrid {
            num_rows,
            num_cols: 2 * num_rows,
        })
    }
}

impl PlanetaryGrid for PlateCarreeGrid {
    fn bin_index(&self, lat: Degree, lon: Degree) -> BinIndex {
        let row = lat_to_row(lat, self.num_rows);
        let col = lon_to_col(lon, self.num_cols);
        (row * self.num_cols + col) as BinIndex
    }

    fn row_index(&self, bin_index: BinIndex) -> usize {
        (bin_index as usize / self.num_cols).min(self.num_rows - 1)
    }

    fn num_bins(&self) -> BinIndex {
        (self.num_rows * self.num_cols) as BinIndex
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self, _row: usize) -> usize {
        self.num_cols
    }

    fn first_bin_index(&self, row: usize) -> BinIndex {
        (row * self.num_cols) as BinIndex
    }

    fn center_lat(&self, row: usize) -> Degree {
        90.0 - (row as f64 + 0.5) * 180.0 / self.num_rows as f64
    }
}
