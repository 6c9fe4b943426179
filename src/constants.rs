//! # Constants and type definitions for geobin
//!
//! This module centralizes the **default values**, **unit conversions**, and **common type
//! aliases** shared by the binning engine.
//!
//! ## Overview
//!
//! - Type aliases for bin indices, angles and epochs
//! - Defaults for grid resolution, super-sampling, spilling and paging
//! - Layout constants of the private binary record format (spill and page files)

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Unique identifier of one cell of a planetary grid. Dense, starts at 0.
pub type BinIndex = i64;

/// Angle in degrees
pub type Degree = f64;

/// Modified Julian Date (days)
pub type MJD = f64;

/// Accumulator slot of a feature vector
pub type Feature = f32;

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// Number of hours in a day
pub const HOURS_PER_DAY: f64 = 24.0;

/// Degrees of longitude per day of local solar time
pub const DEGREES_PER_DAY: f64 = 360.0;

// -------------------------------------------------------------------------------------------------
// Defaults
// -------------------------------------------------------------------------------------------------

/// Default number of latitude rows (≈ 9.28 km equal-area bins).
pub const DEFAULT_NUM_ROWS: usize = 2160;

/// Default super-sampling factor (one observation per pixel).
pub const DEFAULT_SUPER_SAMPLING: u32 = 1;

/// Default number of temporal bins per page of a [`TemporalBinList`](crate::temporal_bin_list::TemporalBinList).
pub const DEFAULT_PAGE_CAPACITY: usize = 1_000_000;

/// Default number of pages kept resident by a [`TemporalBinList`](crate::temporal_bin_list::TemporalBinList).
pub const DEFAULT_MAX_CACHED_PAGES: usize = 4;

/// Default height (in raster lines) of the tiles processed in parallel.
pub const DEFAULT_TILE_HEIGHT: usize = 512;

// -------------------------------------------------------------------------------------------------
// Record layout
// -------------------------------------------------------------------------------------------------

/// Bin index terminating a spill or page file.
pub const END_OF_RECORDS: BinIndex = -1;

/// Size of the fixed record header: index (i64), numObs (i32), numPasses (i32), feature count (i32).
pub const RECORD_HEADER_BYTES: usize = 8 + 4 + 4 + 4;
