//! # Observations and pixel sources
//!
//! The binning core never reads files. Upstream readers expose their rasters through the
//! [`PixelSource`] trait; the [`SpatialBinner`](crate::spatial_binner::SpatialBinner) walks a
//! region of that raster and turns every accepted (sub-)pixel into an [`Observation`].
//!
//! Per pixel a source supplies
//! -----------------
//! * a geographic position at fractional pixel coordinates, or `None` when it cannot be resolved,
//! * a validity bit (the evaluated mask expression),
//! * one sample per configured variable (band-math already applied upstream),
//! * an acquisition time as **MJD (UTC)**, when known.
//!
//! Per source it may also report its acquisition range and footprint, so that whole sources can
//! be skipped by the date, data-period and region filters.
//!
//! See also
//! ------------
//! * [`gridded_product::GriddedProduct`] – In-memory source with affine or per-pixel geocoding.
//! * [`crate::config::BinningConfig::variables`] – Order of the sample vector.
use smallvec::SmallVec;

use crate::{
    constants::{Degree, Feature, MJD},
    geo_region::GeoRegion,
};

pub mod gridded_product;

pub use gridded_product::{GeoCoding, GriddedProduct};

/// Sample vector of one observation, inline for the usual handful of variables.
pub type Samples = SmallVec<[Feature; 8]>;

/// A single geolocated measurement fed to the aggregators.
///
/// # Fields
///
/// * `lat` - Latitude in degrees
/// * `lon` - Longitude in degrees
/// * `mjd` - Acquisition time (MJD, UTC), `NaN` when the source provides none
/// * `values` - One sample per configured variable
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub lat: Degree,
    pub lon: Degree,
    pub mjd: MJD,
    pub values: Samples,
}

impl Observation {
    pub fn new(lat: Degree, lon: Degree, mjd: MJD, values: &[Feature]) -> Self {
        Observation {
            lat,
            lon,
            mjd,
            values: SmallVec::from_slice(values),
        }
    }
}

/// Rectangular pixel region `[x, x + width) × [y, y + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Region {
    /// Split `width × height` into horizontal stripes of at most `tile_height` lines.
    pub fn stripes(width: usize, height: usize, tile_height: usize) -> Vec<Region> {
        let tile_height = tile_height.max(1);
        (0..height)
            .step_by(tile_height)
            .map(|y| Region {
                x: 0,
                y,
                width,
                height: tile_height.min(height - y),
            })
            .collect()
    }
}

/// Upstream raster boundary.
///
/// Implementations must be shareable between worker threads: the spatial phase reads
/// disjoint regions of one source concurrently.
pub trait PixelSource: Send + Sync {
    /// Name used in log events.
    fn name(&self) -> &str;

    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Geographic position `(lat, lon)` at fractional pixel coordinates.
    /// The center of pixel `(x, y)` is `(x + 0.5, y + 0.5)`.
    fn geo_pos(&self, x: f64, y: f64) -> Option<(Degree, Degree)>;

    /// Evaluated mask for pixel `(x, y)`.
    fn is_valid(&self, x: usize, y: usize) -> bool;

    /// Write the samples of pixel `(x, y)` into `out` (one per variable).
    /// Returns `false` when the samples cannot be evaluated.
    fn samples(&self, x: usize, y: usize, out: &mut [Feature]) -> bool;

    /// Acquisition time of pixel `(x, y)`.
    fn acquisition_time(&self, x: usize, y: usize) -> Option<MJD>;

    /// Acquisition range of the whole source, used for date filtering.
    fn time_range(&self) -> Option<(MJD, MJD)> {
        None
    }

    /// Box enclosing every resolvable position, used for region filtering.
    /// Sources that cannot tell are never skipped.
    fn geo_bounds(&self) -> Option<GeoRegion> {
        None
    }
}

macro_rules! forward_pixel_source {
    ($($ptr:ty),*) => {$(
        impl<T: PixelSource + ?Sized> PixelSource for $ptr {
            fn name(&self) -> &str {
                (**self).name()
            }
            fn width(&self) -> usize {
                (**self).width()
            }
            fn height(&self) -> usize {
                (**self).height()
            }
            fn geo_pos(&self, x: f64, y: f64) -> Option<(Degree, Degree)> {
                (**self).geo_pos(x, y)
            }
            fn is_valid(&self, x: usize, y: usize) -> bool {
                (**self).is_valid(x, y)
            }
            fn samples(&self, x: usize, y: usize, out: &mut [Feature]) -> bool {
                (**self).samples(x, y, out)
            }
            fn acquisition_time(&self, x: usize, y: usize) -> Option<MJD> {
                (**self).acquisition_time(x, y)
            }
            fn time_range(&self) -> Option<(MJD, MJD)> {
                (**self).time_range()
            }
            fn geo_bounds(&self) -> Option<GeoRegion> {
                (**self).geo_bounds()
            }
        }
    )*};
}

forward_pixel_source!(&T, Box<T>);

#[cfg(test)]
mod observations_test {
    use super::*;

    #[test]
    fn test_stripes() {
        let stripes = Region::stripes(10, 25, 10);
        assert_eq!(stripes.len(), 3);
        assert_eq!(
            stripes[2],
            Region {
                x: 0,
                y: 20,
                width: 10,
                height: 5
            }
        );
        assert_eq!(stripes.iter().map(|r| r.height).sum::<usize>(), 25);
        assert!(Region::stripes(10, 0, 10).is_empty());
    }

    #[test]
    fn test_new_observation() {
        let obs = Observation::new(10.0, 20.0, 55000.0, &[1.0, 2.0]);
        assert_eq!(obs.values.as_slice(), &[1.0, 2.0]);
        assert!(!obs.values.spilled());
    }
}
