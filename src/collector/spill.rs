//! Spilling collector.
//!
//! Fragments accumulate in a buffer. Once it holds `bins_per_spill_file` fragments it is swapped
//! out under the lock, stably sorted by index and written as `spill_NNNNN.bin` into a private
//! temporary directory (record layout of [`crate::bins`]). The lock is not held while writing.
//!
//! [`complete`](SpatialBinCollector::complete) merges the spill files and the in-memory
//! remainder with a streaming k-way merge keyed by `(bin index, stream number)`. Streams are
//! numbered in spill order and the remainder comes last, which reproduces the consume order
//! inside every group. Only one record per stream is resident during the merge.
//!
//! The temporary directory is owned by the collector and then by the merge; dropping either one
//! removes every spill file, including after an error.
use std::{
    cmp::Reverse,
    collections::BinaryHeap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use camino::Utf8Path;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::{
    binning_errors::BinningError,
    bins::{write_end_marker, BinRecord, SpatialBin},
    constants::BinIndex,
};

use super::{BinGroup, SpatialBinCollection, SpatialBinCollector};

#[derive(Debug, Default)]
struct SpillState {
    buffer: Vec<SpatialBin>,
    spill_files: Vec<PathBuf>,
    num_fragments: u64,
}

#[derive(Debug)]
pub struct SpillingCollector {
    bins_per_spill_file: usize,
    dir: TempDir,
    state: Mutex<SpillState>,
}

impl SpillingCollector {
    /// Create a collector spilling every `bins_per_spill_file` fragments.
    ///
    /// Arguments
    /// -----------------
    /// * `bins_per_spill_file`: buffer threshold, must be greater than 0.
    /// * `temp_dir`: parent of the private spill directory, the system temp dir if `None`.
    ///
    /// Return
    /// ----------
    /// * The collector, [`BinningError::InvalidConfiguration`] for a zero threshold, or
    ///   [`BinningError::IoError`] if the spill directory cannot be created.
    pub fn new(
        bins_per_spill_file: usize,
        temp_dir: Option<&Utf8Path>,
    ) -> Result<Self, BinningError> {
        if bins_per_spill_file == 0 {
            return Err(BinningError::InvalidConfiguration(
                "bins_per_spill_file must be greater than 0".into(),
            ));
        }
        let mut builder = tempfile::Builder::new();
        builder.prefix("geobin-spill-");
        let dir = match temp_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };

        tracing::debug!(
            bins_per_spill_file,
            spill_dir = %dir.path().display(),
            "spilling collector initialized"
        );

        Ok(SpillingCollector {
            bins_per_spill_file,
            dir,
            state: Mutex::new(SpillState::default()),
        })
    }

    /// Private directory holding the spill files.
    pub fn spill_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn num_spill_files(&self) -> usize {
        self.state.lock().spill_files.len()
    }
}

impl SpatialBinCollector for SpillingCollector {
    fn consume(&self, bins: Vec<SpatialBin>) -> Result<(), BinningError> {
        let spill = {
            let mut state = self.state.lock();
            state.num_fragments += bins.len() as u64;
            state.buffer.extend(bins);
            if state.buffer.len() < self.bins_per_spill_file {
                return Ok(());
            }
            let seq = state.spill_files.len();
            let path = self.dir.path().join(format!("spill_{seq:05}.bin"));
            state.spill_files.push(path.clone());
            (seq, path, std::mem::take(&mut state.buffer))
        };

        let (seq, path, mut buffer) = spill;
        buffer.sort_by_key(|b| b.index);
        write_spill_file(&path, &buffer)?;
        tracing::debug!(
            spill = seq,
            bins = buffer.len(),
            path = %path.display(),
            "spatial bins spilled"
        );
        Ok(())
    }

    fn num_fragments(&self) -> u64 {
        self.state.lock().num_fragments
    }

    fn complete(self) -> Result<SpatialBinCollection, BinningError> {
        let SpillState {
            mut buffer,
            spill_files,
            num_fragments,
        } = self.state.into_inner();
        buffer.sort_by_key(|b| b.index);

        let mut streams = Vec::with_capacity(spill_files.len() + 1);
        for path in &spill_files {
            streams.push(FragmentStream::File(BufReader::new(File::open(path)?)));
        }
        streams.push(FragmentStream::Memory(buffer.into_iter()));

        tracing::info!(
            spill_files = spill_files.len(),
            fragments = num_fragments,
            "merging spatial bins"
        );

        let merge = SpillMerge::new(streams, self.dir)?;
        Ok(SpatialBinCollection::new(
            Box::new(merge),
            num_fragments,
            spill_files.len(),
        ))
    }
}

fn write_spill_file(path: &Path, bins: &[SpatialBin]) -> Result<(), BinningError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for bin in bins {
        bin.write_record(&mut writer)?;
    }
    write_end_marker(&mut writer)?;
    writer.flush()?;
    Ok(())
}

/// One sorted input of the merge.
enum FragmentStream {
    File(BufReader<File>),
    Memory(std::vec::IntoIter<SpatialBin>),
}

impl FragmentStream {
    fn next_bin(&mut self) -> Result<Option<SpatialBin>, BinningError> {
        match self {
            FragmentStream::File(reader) => SpatialBin::read_record(reader),
            FragmentStream::Memory(bins) => Ok(bins.next()),
        }
    }
}

/// Streaming k-way merge of sorted fragment streams, grouped by bin index.
struct SpillMerge {
    streams: Vec<FragmentStream>,
    heads: Vec<Option<SpatialBin>>,
    heap: BinaryHeap<Reverse<(BinIndex, usize)>>,
    // removed on drop
    _dir: TempDir,
}

impl SpillMerge {
    fn new(streams: Vec<FragmentStream>, dir: TempDir) -> Result<Self, BinningError> {
        let mut merge = SpillMerge {
            heads: (0..streams.len()).map(|_| None).collect(),
            heap: BinaryHeap::with_capacity(streams.len()),
            streams,
            _dir: dir,
        };
        for i in 0..merge.streams.len() {
            merge.advance(i)?;
        }
        Ok(merge)
    }

    /// Load the next record of stream `i` and register it in the heap.
    fn advance(&mut self, i: usize) -> Result<(), BinningError> {
        if let Some(bin) = self.streams[i].next_bin()? {
            self.heap.push(Reverse((bin.index, i)));
            self.heads[i] = Some(bin);
        }
        Ok(())
    }

    fn next_group(&mut self) -> Result<Option<BinGroup>, BinningError> {
        let Some(&Reverse((index, _))) = self.heap.peek() else {
            return Ok(None);
        };
        let mut group = Vec::new();
        while let Some(&Reverse((head_index, stream))) = self.heap.peek() {
            if head_index != index {
                break;
            }
            self.heap.pop();
            if let Some(bin) = self.heads[stream].take() {
                group.push(bin);
            }
            self.advance(stream)?;
        }
        Ok(Some((index, group)))
    }
}

impl Iterator for SpillMerge {
    type Item = Result<BinGroup, BinningError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_group() {
            Ok(group) => group.map(Ok),
            Err(err) => {
                self.heap.clear();
                Some(Err(err))
            }
        }
    }
}
