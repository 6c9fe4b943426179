//! In-memory [`PixelSource`] over already decoded rasters.
//!
//! Bands are stored row-major (`y * width + x`), one `Vec<f32>` per variable. Geolocation is
//! either an affine lat/lon transform (continuous, so super-sampling spreads sub-pixels across
//! the pixel footprint) or per-pixel lat/lon arrays where `NaN` marks an unresolvable pixel.
//! Acquisition time is interpolated linearly per line between the start and end times.
use itertools::{Itertools, MinMaxResult};

use crate::{
    constants::{Degree, Feature, MJD},
    geo_region::GeoRegion,
    planetary_grid::normalize_lon,
};

use super::PixelSource;

/// Geolocation of a [`GriddedProduct`].
#[derive(Debug, Clone, PartialEq)]
pub enum GeoCoding {
    /// `lat = lat0 - y * lat_step`, `lon = lon0 + x * lon_step` at fractional pixel coordinates;
    /// `(lat0, lon0)` is the upper-left corner of pixel `(0, 0)`.
    Affine {
        lat0: Degree,
        lon0: Degree,
        lat_step: Degree,
        lon_step: Degree,
    },
    /// One position per pixel, applied to the whole pixel footprint.
    PerPixel { lat: Vec<f32>, lon: Vec<f32> },
}

#[derive(Debug, Clone)]
pub struct GriddedProduct {
    name: String,
    width: usize,
    height: usize,
    geo_coding: GeoCoding,
    bands: Vec<Vec<Feature>>,
    mask: Option<Vec<bool>>,
    time_range: Option<(MJD, MJD)>,
}

impl GriddedProduct {
    pub fn new(name: &str, width: usize, height: usize, geo_coding: GeoCoding) -> Self {
        GriddedProduct {
            name: name.to_string(),
            width,
            height,
            geo_coding,
            bands: Vec::new(),
            mask: None,
            time_range: None,
        }
    }

    /// Append a band; the band order must follow the configured variables.
    ///
    /// Panics
    /// ----------
    /// * if `values.len() != width * height`
    pub fn with_band(mut self, values: Vec<Feature>) -> Self {
        assert_eq!(values.len(), self.width * self.height, "band size mismatch");
        self.bands.push(values);
        self
    }

    /// Attach a validity mask.
    ///
    /// Panics
    /// ----------
    /// * if `mask.len() != width * height`
    pub fn with_mask(mut self, mask: Vec<bool>) -> Self {
        assert_eq!(mask.len(), self.width * self.height, "mask size mismatch");
        self.mask = Some(mask);
        self
    }

    /// Acquisition of the first line at `start`, of the last line at `end`.
    pub fn with_time_range(mut self, start: MJD, end: MJD) -> Self {
        self.time_range = Some((start, end));
        self
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }
}

fn finite_range(values: &[f32]) -> Option<(Degree, Degree)> {
    match values.iter().filter(|v| v.is_finite()).minmax() {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(v) => Some((*v as Degree, *v as Degree)),
        MinMaxResult::MinMax(min, max) => Some((*min as Degree, *max as Degree)),
    }
}

/// Box from raw bounds; a longitude span of a full turn or more covers every longitude.
fn bounds(south: Degree, north: Degree, west: Degree, east: Degree) -> GeoRegion {
    let (west, east) = if east - west >= 360.0 {
        (-180.0, 180.0)
    } else {
        (normalize_lon(west), normalize_lon(east))
    };
    GeoRegion {
        north: north.min(90.0),
        south: south.max(-90.0),
        west,
        east,
    }
}

impl PixelSource for GriddedProduct {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn geo_pos(&self, x: f64, y: f64) -> Option<(Degree, Degree)> {
        match &self.geo_coding {
            GeoCoding::Affine {
                lat0,
                lon0,
                lat_step,
                lon_step,
            } => {
                let lat = lat0 - y * lat_step;
                let lon = lon0 + x * lon_step;
                (-90.0..=90.0).contains(&lat).then_some((lat, lon))
            }
            GeoCoding::PerPixel { lat, lon } => {
                let px = (x as usize).min(self.width.saturating_sub(1));
                let py = (y as usize).min(self.height.saturating_sub(1));
                let i = self.offset(px, py);
                let (lat, lon) = (*lat.get(i)? as f64, *lon.get(i)? as f64);
                (lat.is_finite() && lon.is_finite()).then_some((lat, lon))
            }
        }
    }

    fn is_valid(&self, x: usize, y: usize) -> bool {
        self.mask
            .as_ref()
            .map_or(true, |mask| mask[self.offset(x, y)])
    }

    fn samples(&self, x: usize, y: usize, out: &mut [Feature]) -> bool {
        if out.len() != self.bands.len() {
            return false;
        }
        let i = self.offset(x, y);
        for (slot, band) in out.iter_mut().zip(&self.bands) {
            *slot = band[i];
        }
        true
    }

    fn acquisition_time(&self, _x: usize, y: usize) -> Option<MJD> {
        let (start, end) = self.time_range?;
        if self.height <= 1 {
            return Some(start);
        }
        Some(start + (end - start) * y as f64 / (self.height - 1) as f64)
    }

    fn time_range(&self) -> Option<(MJD, MJD)> {
        self.time_range
    }

    fn geo_bounds(&self) -> Option<GeoRegion> {
        match &self.geo_coding {
            GeoCoding::Affine {
                lat0,
                lon0,
                lat_step,
                lon_step,
            } => {
                let lat1 = lat0 - self.height as f64 * lat_step;
                let lon1 = lon0 + self.width as f64 * lon_step;
                Some(bounds(
                    lat0.min(lat1),
                    lat0.max(lat1),
                    lon0.min(lon1),
                    lon0.max(lon1),
                ))
            }
            // per-pixel longitudes are not unwrapped: a swath over the date line gets a wide,
            // still enclosing box
            GeoCoding::PerPixel { lat, lon } => {
                let (south, north) = finite_range(lat)?;
                let (west, east) = finite_range(lon)?;
                Some(bounds(south, north, west, east))
            }
        }
    }
}

#[cfg(test)]
mod gridded_product_test {
    use super::*;

    fn affine() -> GeoCoding {
        GeoCoding::Affine {
            lat0: 10.0,
            lon0: 20.0,
            lat_step: 1.0,
            lon_step: 2.0,
        }
    }

    #[test]
    fn test_affine_geo_pos() {
        let product = GriddedProduct::new("p", 2, 2, affine());
        assert_eq!(product.geo_pos(0.5, 0.5), Some((9.5, 21.0)));
        assert_eq!(product.geo_pos(2.0, 2.0), Some((8.0, 24.0)));
    }

    #[test]
    fn test_per_pixel_unresolved() {
        let geo = GeoCoding::PerPixel {
            lat: vec![1.0, f32::NAN],
            lon: vec![2.0, 3.0],
        };
        let product = GriddedProduct::new("p", 2, 1, geo);
        assert_eq!(product.geo_pos(0.25, 0.75), Some((1.0, 2.0)));
        assert_eq!(product.geo_pos(1.5, 0.5), None);
    }

    #[test]
    fn test_geo_bounds() {
        let product = GriddedProduct::new("p", 2, 3, affine());
        assert_eq!(
            product.geo_bounds(),
            Some(GeoRegion {
                north: 10.0,
                south: 7.0,
                west: 20.0,
                east: 24.0
            })
        );

        let geo = GeoCoding::PerPixel {
            lat: vec![1.0, f32::NAN, -2.0],
            lon: vec![179.0, 3.0, -179.0],
        };
        let bounds = GriddedProduct::new("p", 3, 1, geo).geo_bounds().unwrap();
        assert_eq!((bounds.south, bounds.north), (-2.0, 1.0));
        assert!(bounds.contains(0.0, 179.0) && bounds.contains(0.0, -179.0));

        let unresolved = GeoCoding::PerPixel {
            lat: vec![f32::NAN],
            lon: vec![0.0],
        };
        assert_eq!(GriddedProduct::new("p", 1, 1, unresolved).geo_bounds(), None);
    }

    #[test]
    fn test_samples_mask_and_time() {
        let product = GriddedProduct::new("p", 2, 3, affine())
            .with_band(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
            .with_mask(vec![true, false, true, true, true, true])
            .with_time_range(100.0, 101.0);

        let mut out = [0.0_f32; 1];
        assert!(product.samples(1, 2, &mut out));
        assert_eq!(out[0], 5.0);
        assert!(!product.samples(1, 2, &mut [0.0; 2]));
        assert!(!product.is_valid(1, 0));
        assert_eq!(product.acquisition_time(0, 1), Some(100.5));
        assert_eq!(product.time_range(), Some((100.0, 101.0)));
    }
}
