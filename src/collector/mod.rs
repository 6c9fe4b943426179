//! # Spatial bin collectors
//!
//! Between the spatial and the temporal phase, completed [`SpatialBin`] fragments from every
//! worker are gathered and regrouped **by bin index**. A collector is fed concurrently through
//! [`SpatialBinCollector::consume`] and drained once through
//! [`SpatialBinCollector::complete`], which yields the groups in strictly ascending index order.
//!
//! Implementations
//! -----------------
//! * [`MemoryCollector`] – ordered map in memory.
//! * [`SpillingCollector`] – bounded buffer, sorted spill files in a temporary directory,
//!   streaming k-way merge on completion.
//!
//! Both produce the same groups with the fragments of one group in the same order (the order in
//! which they were consumed), so the temporal phase is bit-identical whichever is used.
use std::fmt;

use crate::{binning_errors::BinningError, bins::SpatialBin, constants::BinIndex};

pub mod memory;
pub mod spill;

pub use memory::MemoryCollector;
pub use spill::SpillingCollector;

/// All fragments of one bin index, in consume order.
pub type BinGroup = (BinIndex, Vec<SpatialBin>);

/// Sink of the spatial phase.
///
/// `consume` may be called from many threads at once; `complete` is called once, after the
/// last `consume` returned.
pub trait SpatialBinCollector: Send + Sync + Sized {
    /// Take ownership of a batch of fragments (any order, duplicates allowed).
    fn consume(&self, bins: Vec<SpatialBin>) -> Result<(), BinningError>;

    /// Number of fragments consumed so far.
    fn num_fragments(&self) -> u64;

    /// Close the collector and hand out the groups in ascending index order.
    fn complete(self) -> Result<SpatialBinCollection, BinningError>;
}

/// Ordered, single-pass stream of [`BinGroup`]s.
///
/// Spill files (if any) stay alive as long as the collection and are removed when it is
/// dropped, whether or not it was fully read.
pub struct SpatialBinCollection {
    groups: Box<dyn Iterator<Item = Result<BinGroup, BinningError>> + Send>,
    num_fragments: u64,
    num_spill_files: usize,
}

impl SpatialBinCollection {
    pub(crate) fn new(
        groups: Box<dyn Iterator<Item = Result<BinGroup, BinningError>> + Send>,
        num_fragments: u64,
        num_spill_files: usize,
    ) -> Self {
        SpatialBinCollection {
            groups,
            num_fragments,
            num_spill_files,
        }
    }

    pub fn num_fragments(&self) -> u64 {
        self.num_fragments
    }

    pub fn num_spill_files(&self) -> usize {
        self.num_spill_files
    }
}

impl Iterator for SpatialBinCollection {
    type Item = Result<BinGroup, BinningError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.groups.next()
    }
}

impl fmt::Debug for SpatialBinCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialBinCollection")
            .field("num_fragments", &self.num_fragments)
            .field("num_spill_files", &self.num_spill_files)
            .finish_non_exhaustive()
    }
}
