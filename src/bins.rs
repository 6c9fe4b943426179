//! # Spatial and temporal bins
//!
//! * [`SpatialBin`] – partial accumulation of one grid cell produced by one spatial pass
//!   (one source, all of its tiles merged).
//! * [`TemporalBin`] – final state of one grid cell after merging all of its spatial fragments;
//!   its feature vector holds the **output** features.
//!
//! Both share the private binary record layout used by spill files and page files
//! (all little-endian):
//!
//! ```text
//! [index: i64][num_obs: i32][num_passes: i32][len: i32][len × f32]
//! ...
//! [-1: i64]                                   end of records
//! ```
//!
//! The layout is deterministic for identical bins and carries no compatibility promise.
use std::io::{self, Read, Write};

use crate::{
    binning_errors::BinningError,
    constants::{BinIndex, Feature, END_OF_RECORDS},
};

#[derive(Debug, Clone, PartialEq)]
pub struct SpatialBin {
    pub index: BinIndex,
    pub num_obs: u32,
    pub num_passes: u32,
    pub features: Vec<Feature>,
}

impl SpatialBin {
    pub fn new(index: BinIndex, num_features: usize) -> Self {
        SpatialBin {
            index,
            num_obs: 0,
            num_passes: 1,
            features: vec![0.0; num_features],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalBin {
    pub index: BinIndex,
    pub num_obs: u32,
    pub num_passes: u32,
    pub features: Vec<Feature>,
}

impl TemporalBin {
    pub fn new(index: BinIndex, num_features: usize) -> Self {
        TemporalBin {
            index,
            num_obs: 0,
            num_passes: 0,
            features: vec![0.0; num_features],
        }
    }
}

/// Binary record codec shared by both bin kinds.
pub(crate) trait BinRecord: Sized {
    fn index(&self) -> BinIndex;

    fn write_record<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    /// Read the next record, `None` at the end-of-records marker.
    fn read_record<R: Read>(reader: &mut R) -> Result<Option<Self>, BinningError>;
}

macro_rules! impl_bin_record {
    ($bin:ty) => {
        impl BinRecord for $bin {
            fn index(&self) -> BinIndex {
                self.index
            }

            fn write_record<W: Write>(&self, writer: &mut W) -> io::Result<()> {
                write_raw(
                    writer,
                    self.index,
                    self.num_obs,
                    self.num_passes,
                    &self.features,
                )
            }

            fn read_record<R: Read>(reader: &mut R) -> Result<Option<Self>, BinningError> {
                Ok(read_raw(reader)?.map(|(index, num_obs, num_passes, features)| Self {
                    index,
                    num_obs,
                    num_passes,
                    features,
                }))
            }
        }
    };
}

impl_bin_record!(SpatialBin);
impl_bin_record!(TemporalBin);

/// Write the end-of-records marker.
pub(crate) fn write_end_marker<W: Write>(writer: &mut W) -> io::Result<()> {
    writer.write_all(&END_OF_RECORDS.to_le_bytes())
}

fn write_raw<W: Write>(
    writer: &mut W,
    index: BinIndex,
    num_obs: u32,
    num_passes: u32,
    features: &[Feature],
) -> io::Result<()> {
    writer.write_all(&index.to_le_bytes())?;
    writer.write_all(&(num_obs as i32).to_le_bytes())?;
    writer.write_all(&(num_passes as i32).to_le_bytes())?;
    writer.write_all(&(features.len() as i32).to_le_bytes())?;
    for value in features {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

type RawRecord = (BinIndex, u32, u32, Vec<Feature>);

fn read_raw<R: Read>(reader: &mut R) -> Result<Option<RawRecord>, BinningError> {
    let index = i64::from_le_bytes(read_array(reader)?);
    if index == END_OF_RECORDS {
        return Ok(None);
    }
    if index < 0 {
        return Err(BinningError::CorruptRecord(format!(
            "negative bin index {index}"
        )));
    }

    let num_obs = i32::from_le_bytes(read_array(reader)?);
    let num_passes = i32::from_le_bytes(read_array(reader)?);
    let len = i32::from_le_bytes(read_array(reader)?);
    if num_obs < 0 || num_passes < 0 || len < 0 {
        return Err(BinningError::CorruptRecord(format!(
            "negative header field in bin {index}"
        )));
    }

    let mut bytes = vec![0_u8; len as usize * std::mem::size_of::<Feature>()];
    reader.read_exact(&mut bytes).map_err(truncated)?;
    let features = bytes
        .chunks_exact(4)
        .map(|c| Feature::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(Some((index, num_obs as u32, num_passes as u32, features)))
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N], BinningError> {
    let mut buf = [0_u8; N];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf)
}

fn truncated(err: io::Error) -> BinningError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        BinningError::CorruptRecord("truncated record".into())
    } else {
        BinningError::IoError(err)
    }
}
