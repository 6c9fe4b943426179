//! # Acquisition time handling
//!
//! Date parsing into **MJD (UTC)** via [hifitime](https://docs.rs/hifitime), and the
//! [`DataPeriod`] filter deciding whether an observation belongs to the composite window.
//!
//! ## Data period semantics
//!
//! An observation acquired at `mjd` over longitude `lon` has the local solar time
//!
//! ```text
//! t_local = mjd + lon / 360
//! ```
//!
//! The window starts at `anchor + offset_hours / 24` and lasts `duration_days`.
//! `t_local` before the window is [`Membership::PreviousPeriod`], at or after its end
//! [`Membership::SubsequentPeriod`], otherwise [`Membership::CurrentPeriod`].
//! Longitudes are normalized to `[-180, 180)` first, so swaths crossing the date line
//! are split consistently between the two neighbouring periods.
//!
//! Since `|lon / 360| ≤ ½`, a source acquired entirely more than half a day before the window
//! or half a day after it cannot contribute, and is skipped without being read
//! ([`DataPeriod::may_contain`]).
use std::str::FromStr;

use hifitime::Epoch;
use serde::{Deserialize, Serialize};

use crate::{
    binning_errors::BinningError,
    constants::{Degree, DEGREES_PER_DAY, HOURS_PER_DAY, MJD},
    planetary_grid::normalize_lon,
};

/// Parse a date into an MJD (UTC).
///
/// Accepts anything [`Epoch::from_str`] accepts (e.g. `2012-01-01T12:00:00 UTC`) as well as
/// plain `YYYY-MM-DD` dates, interpreted as midnight UTC.
///
/// Arguments
/// ---------
/// * `date`: the date string
///
/// Return
/// ------
/// * the MJD in the UTC time scale, or [`BinningError::InvalidDate`]
pub fn parse_date_to_mjd(date: &str) -> Result<MJD, BinningError> {
    let trimmed = date.trim();
    let candidate = if trimmed.len() == 10 && !trimmed.contains('T') {
        format!("{trimmed}T00:00:00 UTC")
    } else {
        trimmed.to_string()
    };
    Epoch::from_str(&candidate)
        .map(|e| e.to_mjd_utc_days())
        .map_err(|e| BinningError::InvalidDate(format!("{date}: {e}")))
}

/// Membership of an observation relative to the composite window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Membership {
    PreviousPeriod,
    CurrentPeriod,
    SubsequentPeriod,
}

/// Serializable description of a data period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPeriodConfig {
    /// Start day of the composite window, e.g. `2012-06-01`.
    pub anchor_time: String,
    /// Length of the window in days.
    pub period_duration_days: f64,
    /// Shift of the window start in hours of local solar time.
    #[serde(default)]
    pub period_offset_hours: f64,
}

/// Composite window resolved to MJD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPeriod {
    start: MJD,
    end: MJD,
}

impl DataPeriod {
    /// Window starting `offset_hours` after `anchor` and lasting `duration_days`.
    pub fn new(anchor: MJD, duration_days: f64, offset_hours: f64) -> Result<Self, BinningError> {
        if !(duration_days > 0.0) {
            return Err(BinningError::InvalidConfiguration(format!(
                "data period duration must be positive, got {duration_days}"
            )));
        }
        let start = anchor + offset_hours / HOURS_PER_DAY;
        Ok(DataPeriod {
            start,
            end: start + duration_days,
        })
    }

    pub fn from_config(config: &DataPeriodConfig) -> Result<Self, BinningError> {
        let anchor = parse_date_to_mjd(&config.anchor_time)?;
        DataPeriod::new(
            anchor,
            config.period_duration_days,
            config.period_offset_hours,
        )
    }

    pub fn start(&self) -> MJD {
        self.start
    }

    pub fn end(&self) -> MJD {
        self.end
    }

    /// True if some observation acquired within `[start, end]` (UTC) can fall into the window
    /// at some longitude.
    pub fn may_contain(&self, start: MJD, end: MJD) -> bool {
        let max_shift = 0.5;
        end + max_shift >= self.start && start - max_shift < self.end
    }

    /// Classify an observation by its longitude and acquisition time.
    pub fn membership(&self, lon: Degree, mjd: MJD) -> Membership {
        let local_time = mjd + normalize_lon(lon) / DEGREES_PER_DAY;
        if local_time < self.start {
            Membership::PreviousPeriod
        } else if local_time >= self.end {
            Membership::SubsequentPeriod
        } else {
            Membership::CurrentPeriod
        }
    }
}

/// Inclusive acquisition range used to pre-filter whole sources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: MJD,
    pub end: MJD,
}

impl TimeRange {
    /// Build a range from optional bounds; `None` if either bound is missing.
    pub fn from_dates(
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Option<TimeRange>, BinningError> {
        let (Some(start_str), Some(end_str)) = (start, end) else {
            return Ok(None);
        };
        let start = parse_date_to_mjd(start_str)?;
        let end = parse_date_to_mjd(end_str)?;
        if end < start {
            return Err(BinningError::InvalidDateRange {
                start: start_str.to_string(),
                end: end_str.to_string(),
            });
        }
        Ok(Some(TimeRange { start, end }))
    }

    /// True when `[start, end]` overlaps this range.
    pub fn overlaps(&self, start: MJD, end: MJD) -> bool {
        start <= self.end && end >= self.start
    }
}

#[cfg(test)]
mod time_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_date_only() {
        // 2000-01-01T00:00:00 UTC
        let mjd = parse_date_to_mjd("2000-01-01").unwrap();
        assert_relative_eq!(mjd, 51544.0, epsilon = 1e-9);
    }

    #[test]
    fn test_parse_invalid_date() {
        assert!(matches!(
            parse_date_to_mjd("not a date"),
            Err(BinningError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_membership() {
        let period = DataPeriod::new(55000.0, 1.0, 0.0).unwrap();

        assert_eq!(period.membership(0.0, 55000.5), Membership::CurrentPeriod);
        assert_eq!(period.membership(0.0, 54999.9), Membership::PreviousPeriod);
        assert_eq!(period.membership(0.0, 55001.0), Membership::SubsequentPeriod);

        // 23:00 UTC at 90°E is already the next local day
        assert_eq!(
            period.membership(90.0, 55000.0 + 23.0 / 24.0),
            Membership::SubsequentPeriod
        );
        // 01:00 UTC at 90°W is still the previous local day
        assert_eq!(
            period.membership(-90.0, 55000.0 + 1.0 / 24.0),
            Membership::PreviousPeriod
        );
        // 190°E wraps to 170°W
        assert_eq!(
            period.membership(190.0, 55000.1),
            period.membership(-170.0, 55000.1)
        );
    }

    #[test]
    fn test_may_contain() {
        let period = DataPeriod::new(55000.0, 1.0, 0.0).unwrap();
        assert!(period.may_contain(55000.2, 55000.3));
        // late evening UTC of the day before is already the period east of Greenwich
        assert!(period.may_contain(54999.6, 54999.7));
        assert!(!period.may_contain(54999.0, 54999.4));
        assert!(period.may_contain(55001.4, 55002.0));
        assert!(!period.may_contain(55001.5, 55002.0));
        assert!(period.may_contain(54990.0, 55010.0));
    }

    #[test]
    fn test_offset_and_invalid_duration() {
        let period = DataPeriod::new(55000.0, 1.0, 10.0).unwrap();
        assert_relative_eq!(period.start(), 55000.0 + 10.0 / 24.0);
        assert_eq!(period.membership(0.0, 55000.2), Membership::PreviousPeriod);

        assert!(DataPeriod::new(55000.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_time_range() {
        assert_eq!(TimeRange::from_dates(Some("2010-01-01"), None).unwrap(), None);

        let err = TimeRange::from_dates(Some("2010-01-02"), Some("2010-01-01")).unwrap_err();
        assert_eq!(
            err,
            BinningError::InvalidDateRange {
                start: "2010-01-02".into(),
                end: "2010-01-01".into()
            }
        );

        let range = TimeRange::from_dates(Some("2010-01-01"), Some("2010-01-03"))
            .unwrap()
            .unwrap();
        assert!(range.overlaps(range.start - 1.0, range.start));
        assert!(!range.overlaps(range.end + 0.1, range.end + 1.0));
    }
}
