use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::{binning_errors::BinningError, bins::SpatialBin, constants::BinIndex};

use super::{SpatialBinCollection, SpatialBinCollector};

#[derive(Debug, Default)]
struct MemoryState {
    groups: BTreeMap<BinIndex, Vec<SpatialBin>>,
    num_fragments: u64,
}

/// Keeps every fragment in an ordered map; suitable when all fragments fit in memory.
#[derive(Debug, Default)]
pub struct MemoryCollector {
    state: Mutex<MemoryState>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        MemoryCollector::default()
    }

    /// Number of distinct bin indices seen so far.
    pub fn num_groups(&self) -> usize {
        self.state.lock().groups.len()
    }
}

impl SpatialBinCollector for MemoryCollector {
    fn consume(&self, bins: Vec<SpatialBin>) -> Result<(), BinningError> {
        let mut state = self.state.lock();
        state.num_fragments += bins.len() as u64;
        for bin in bins {
            state.groups.entry(bin.index).or_default().push(bin);
        }
        Ok(())
    }

    fn num_fragments(&self) -> u64 {
        self.state.lock().num_fragments
    }

    fn complete(self) -> Result<SpatialBinCollection, BinningError> {
        let state = self.state.into_inner();
        tracing::debug!(
            groups = state.groups.len(),
            fragments = state.num_fragments,
            "spatial bins collected in memory"
        );
        Ok(SpatialBinCollection::new(
            Box::new(state.groups.into_iter().map(Ok)),
            state.num_fragments,
            0,
        ))
    }
}

#[cfg(test)]
mod memory_test {
    use super::*;

    fn bin(index: BinIndex, value: f32) -> SpatialBin {
        SpatialBin {
            index,
            num_obs: 1,
            num_passes: 1,
            features: vec![value],
        }
    }

    #[test]
    fn test_groups_sorted_in_consume_order() {
        let collector = MemoryCollector::new();
        collector.consume(vec![bin(5, 1.0), bin(2, 2.0)]).unwrap();
        collector.consume(vec![bin(5, 3.0)]).unwrap();
        assert_eq!(collector.num_groups(), 2);
        assert_eq!(collector.num_fragments(), 3);

        let groups: Vec<_> = collector
            .complete()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, 2);
        assert_eq!(groups[1].0, 5);
        let values: Vec<f32> = groups[1].1.iter().map(|b| b.features[0]).collect();
        assert_eq!(values, vec![1.0, 3.0]);
    }

    #[test]
    fn test_empty() {
        let collection = MemoryCollector::new().complete().unwrap();
        assert_eq!(collection.num_fragments(), 0);
        assert_eq!(collection.count(), 0);
    }
}
