//! # Paged temporal bin list
//!
//! Append-only list of [`TemporalBin`]s for results too large to keep in memory. Bins are grouped
//! in pages of `page_capacity` entries:
//!
//! * the page being filled (the *open* page) always stays in memory,
//! * full pages are immutable; at most `max_cached_pages` of them are resident, the least
//!   recently used one is written to `page_NNNNNN.bin` in a private temporary directory when
//!   another page needs the room, and read back on demand,
//! * a page is written at most once.
//!
//! The directory is created lazily on the first eviction and removed by [`TemporalBinList::close`]
//! or when the list is dropped.
use std::{
    collections::VecDeque,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

use crate::{
    binning_errors::BinningError,
    bins::{write_end_marker, BinRecord, TemporalBin},
};

#[derive(Debug, Default)]
struct Page {
    bins: Option<Vec<TemporalBin>>,
    path: Option<PathBuf>,
}

#[derive(Debug)]
pub struct TemporalBinList {
    page_capacity: usize,
    max_cached_pages: usize,
    len: usize,
    open: Vec<TemporalBin>,
    pages: Vec<Page>,
    // resident full pages, least recently used first
    lru: VecDeque<usize>,
    temp_dir: Option<Utf8PathBuf>,
    dir: Option<TempDir>,
}

impl TemporalBinList {
    /// Create an empty list.
    ///
    /// Arguments
    /// -----------------
    /// * `page_capacity`: bins per page, greater than 0.
    /// * `max_cached_pages`: full pages kept in memory, greater than 0.
    /// * `temp_dir`: parent of the page directory, the system temp dir if `None`.
    pub fn new(
        page_capacity: usize,
        max_cached_pages: usize,
        temp_dir: Option<&Utf8Path>,
    ) -> Result<Self, BinningError> {
        if page_capacity == 0 || max_cached_pages == 0 {
            return Err(BinningError::InvalidConfiguration(format!(
                "page_capacity ({page_capacity}) and max_cached_pages ({max_cached_pages}) must be greater than 0"
            )));
        }
        Ok(TemporalBinList {
            page_capacity,
            max_cached_pages,
            len: 0,
            open: Vec::new(),
            pages: Vec::new(),
            lru: VecDeque::new(),
            temp_dir: temp_dir.map(Utf8Path::to_path_buf),
            dir: None,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of full pages.
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Number of full pages currently in memory.
    pub fn num_resident_pages(&self) -> usize {
        self.lru.len()
    }

    /// Page directory, once the first page has been evicted.
    pub fn page_dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    pub fn add(&mut self, bin: TemporalBin) -> Result<(), BinningError> {
        self.open.push(bin);
        self.len += 1;
        if self.open.len() == self.page_capacity {
            self.seal_open_page()?;
        }
        Ok(())
    }

    /// Bin at position `i` (insertion order).
    pub fn get(&mut self, i: usize) -> Result<TemporalBin, BinningError> {
        if i >= self.len {
            return Err(BinningError::IndexOutOfBounds {
                index: i,
                len: self.len,
            });
        }
        let (page, offset) = (i / self.page_capacity, i % self.page_capacity);
        let bins = if page == self.pages.len() {
            &self.open
        } else {
            self.load_page(page)?;
            self.touch(page);
            self.evict_overflow()?;
            self.pages[page].bins.as_deref().unwrap_or_default()
        };
        bins.get(offset)
            .cloned()
            .ok_or(BinningError::IndexOutOfBounds {
                index: i,
                len: self.len,
            })
    }

    /// All bins in insertion order, loading pages as needed.
    pub fn iter(&mut self) -> impl Iterator<Item = Result<TemporalBin, BinningError>> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    /// Release every page and delete the page directory.
    pub fn close(mut self) -> Result<(), BinningError> {
        if let Some(dir) = self.dir.take() {
            tracing::debug!(
                pages = self.pages.len(),
                page_dir = %dir.path().display(),
                "closing temporal bin list"
            );
            dir.close()?;
        }
        Ok(())
    }

    fn seal_open_page(&mut self) -> Result<(), BinningError> {
        let bins = std::mem::take(&mut self.open);
        let id = self.pages.len();
        self.pages.push(Page {
            bins: Some(bins),
            path: None,
        });
        self.touch(id);
        self.evict_overflow()
    }

    fn touch(&mut self, id: usize) {
        if let Some(pos) = self.lru.iter().position(|&p| p == id) {
            self.lru.remove(pos);
        }
        self.lru.push_back(id);
    }

    fn evict_overflow(&mut self) -> Result<(), BinningError> {
        while self.lru.len() > self.max_cached_pages {
            let Some(victim) = self.lru.pop_front() else {
                break;
            };
            if let Err(err) = self.store_page(victim) {
                // still resident, retried on the next eviction
                self.lru.push_front(victim);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Write the page out if it never was, then drop its bins from memory.
    fn store_page(&mut self, id: usize) -> Result<(), BinningError> {
        if self.pages[id].bins.is_none() {
            return Ok(());
        }
        if self.pages[id].path.is_none() {
            let path = self.page_path(id)?;
            let bins = self.pages[id].bins.as_deref().unwrap_or_default();
            write_page(&path, bins)?;
            tracing::trace!(page = id, bins = bins.len(), "temporal page evicted");
            self.pages[id].path = Some(path);
        }
        self.pages[id].bins = None;
        Ok(())
    }

    fn load_page(&mut self, id: usize) -> Result<(), BinningError> {
        if self.pages[id].bins.is_some() {
            return Ok(());
        }
        let Some(path) = self.pages[id].path.as_ref() else {
            return Err(BinningError::CorruptRecord(format!(
                "temporal page {id} neither resident nor stored"
            )));
        };
        let mut reader = BufReader::new(File::open(path)?);
        let mut bins = Vec::with_capacity(self.page_capacity);
        while let Some(bin) = TemporalBin::read_record(&mut reader)? {
            bins.push(bin);
        }
        self.pages[id].bins = Some(bins);
        Ok(())
    }

    fn page_path(&mut self, id: usize) -> Result<PathBuf, BinningError> {
        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => {
                let mut builder = tempfile::Builder::new();
                builder.prefix("geobin-pages-");
                let dir = match &self.temp_dir {
                    Some(parent) => builder.tempdir_in(parent)?,
                    None => builder.tempdir()?,
                };
                tracing::debug!(
                    page_capacity = self.page_capacity,
                    max_cached_pages = self.max_cached_pages,
                    page_dir = %dir.path().display(),
                    "temporal bin list paging to disk"
                );
                dir
            }
        };
        let path = dir.path().join(format!("page_{id:06}.bin"));
        self.dir = Some(dir);
        Ok(path)
    }
}

fn write_page(path: &Path, bins: &[TemporalBin]) -> Result<(), BinningError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for bin in bins {
        bin.write_record(&mut writer)?;
    }
    write_end_marker(&mut writer)?;
    writer.flush()?;
    Ok(())
}
