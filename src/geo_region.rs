//! # Geographic region
//!
//! A [`GeoRegion`] is a latitude/longitude box restricting a binning run. Sources whose
//! footprint does not intersect it are skipped as a whole, and observations falling outside it
//! are rejected one by one.
//!
//! Longitudes are normalized to `[-180, 180)`. A box with `west > east` crosses the date line,
//! e.g. `west = 170, east = -170` covers 20° of longitude around the antimeridian. A box with
//! `west = -180, east = 180` covers every longitude.
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use crate::{binning_errors::BinningError, constants::Degree, planetary_grid::normalize_lon};

/// Closed longitude interval without date-line wrap.
type LonSegment = (Degree, Degree);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRegion {
    pub north: Degree,
    pub south: Degree,
    pub west: Degree,
    pub east: Degree,
}

impl GeoRegion {
    /// Validated box.
    ///
    /// Return
    /// ----------
    /// * [`BinningError::InvalidConfiguration`] if a bound is out of range or `south > north`.
    pub fn new(north: Degree, south: Degree, west: Degree, east: Degree) -> Result<Self, BinningError> {
        let region = GeoRegion {
            north,
            south,
            west,
            east,
        };
        region.validate()?;
        Ok(region)
    }

    pub fn validate(&self) -> Result<(), BinningError> {
        let lat_ok = |v: Degree| (-90.0..=90.0).contains(&v);
        let lon_ok = |v: Degree| (-180.0..=180.0).contains(&v);
        if !(lat_ok(self.north) && lat_ok(self.south) && lon_ok(self.west) && lon_ok(self.east)) {
            return Err(BinningError::InvalidConfiguration(format!(
                "region bounds out of range: {self:?}"
            )));
        }
        if self.south > self.north {
            return Err(BinningError::InvalidConfiguration(format!(
                "region south {} above north {}",
                self.south, self.north
            )));
        }
        Ok(())
    }

    fn is_full_circle(&self) -> bool {
        self.east - self.west >= 360.0
    }

    /// The longitude span as one or two non-wrapping segments.
    fn lon_segments(&self) -> SmallVec<[LonSegment; 2]> {
        if self.is_full_circle() {
            return smallvec![(-180.0, 180.0)];
        }
        let west = normalize_lon(self.west);
        let east = normalize_lon(self.east);
        if west <= east {
            smallvec![(west, east)]
        } else {
            smallvec![(west, 180.0), (-180.0, east)]
        }
    }

    /// True if `(lat, lon)` lies inside the box, borders included.
    pub fn contains(&self, lat: Degree, lon: Degree) -> bool {
        if !(self.south..=self.north).contains(&lat) {
            return false;
        }
        let lon = normalize_lon(lon);
        self.lon_segments()
            .iter()
            .any(|&(w, e)| (w..=e).contains(&lon))
    }

    /// True if the two boxes share at least one point.
    pub fn intersects(&self, other: &GeoRegion) -> bool {
        if self.south > other.north || other.south > self.north {
            return false;
        }
        let theirs = other.lon_segments();
        self.lon_segments()
            .iter()
            .any(|&(w1, e1)| theirs.iter().any(|&(w2, e2)| w1 <= e2 && w2 <= e1))
    }
}

#[cfg(test)]
mod geo_region_test {
    use super::*;

    #[test]
    fn test_contains() {
        let region = GeoRegion::new(50.0, 40.0, -10.0, 5.0).unwrap();
        assert!(region.contains(45.0, 0.0));
        assert!(region.contains(50.0, -10.0));
        assert!(!region.contains(51.0, 0.0));
        assert!(!region.contains(45.0, 6.0));
        assert!(region.contains(45.0, 360.0));
    }

    #[test]
    fn test_date_line() {
        let region = GeoRegion::new(10.0, -10.0, 170.0, -170.0).unwrap();
        assert!(region.contains(0.0, 175.0));
        assert!(region.contains(0.0, -175.0));
        assert!(region.contains(0.0, 180.0));
        assert!(!region.contains(0.0, 0.0));

        let pacific = GeoRegion::new(5.0, -5.0, -179.0, -160.0).unwrap();
        let atlantic = GeoRegion::new(5.0, -5.0, -40.0, -20.0).unwrap();
        assert!(region.intersects(&pacific));
        assert!(pacific.intersects(&region));
        assert!(!region.intersects(&atlantic));
    }

    #[test]
    fn test_global_and_invalid() {
        let global = GeoRegion::new(90.0, -90.0, -180.0, 180.0).unwrap();
        assert!(global.contains(-89.0, 179.9));
        assert!(global.contains(0.0, -180.0));

        assert!(GeoRegion::new(10.0, 20.0, 0.0, 1.0).is_err());
        assert!(GeoRegion::new(91.0, 0.0, 0.0, 1.0).is_err());
        assert!(GeoRegion::new(10.0, 0.0, 0.0, 200.0).is_err());
        assert!(global.intersects(&GeoRegion::new(90.0, 90.0, 0.0, 1.0).unwrap()));
    }
}
