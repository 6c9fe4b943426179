//! # Cell post-processors
//!
//! Optional transforms applied to the **output** feature vector of every temporal bin, after
//! [`Aggregator::compute_output`](crate::aggregators::Aggregator::compute_output). They never
//! touch bin identity or the observation/pass counts.
//!
//! * [`Selection`] – keep a subset of named features, in the given order.
//! * [`FeatureScale`] – derive `v · factor + offset` for one named feature, in place.
//!
//! Processors are chained in configuration order; each one resolves its feature names against
//! the output names of its predecessor when the chain is built.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{binning_errors::BinningError, constants::Feature};

pub trait CellProcessor: Send + Sync + fmt::Debug {
    fn output_feature_names(&self) -> &[String];

    fn compute(&self, input: &[Feature], output: &mut [Feature]);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CellProcessorConfig {
    #[serde(rename = "Selection")]
    Selection { var_names: Vec<String> },
    #[serde(rename = "FeatureScale")]
    FeatureScale {
        var_name: String,
        factor: f64,
        #[serde(default)]
        offset: f64,
    },
}

impl CellProcessorConfig {
    pub fn create(&self, input_names: &[String]) -> Result<Box<dyn CellProcessor>, BinningError> {
        Ok(match self {
            CellProcessorConfig::Selection { var_names } => {
                Box::new(Selection::new(input_names, var_names)?)
            }
            CellProcessorConfig::FeatureScale {
                var_name,
                factor,
                offset,
            } => Box::new(FeatureScale::new(input_names, var_name, *factor, *offset)?),
        })
    }
}

fn position_of(names: &[String], name: &str) -> Result<usize, BinningError> {
    names
        .iter()
        .position(|n| n == name)
        .ok_or_else(|| BinningError::UnknownFeature(name.to_string()))
}

#[derive(Debug, Clone)]
pub struct Selection {
    indices: Vec<usize>,
    names: Vec<String>,
}

impl Selection {
    pub fn new(input_names: &[String], selected: &[String]) -> Result<Self, BinningError> {
        let indices = selected
            .iter()
            .map(|n| position_of(input_names, n))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Selection {
            indices,
            names: selected.to_vec(),
        })
    }
}

impl CellProcessor for Selection {
    fn output_feature_names(&self) -> &[String] {
        &self.names
    }

    fn compute(&self, input: &[Feature], output: &mut [Feature]) {
        for (slot, &i) in output.iter_mut().zip(&self.indices) {
            *slot = input[i];
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeatureScale {
    index: usize,
    factor: f64,
    offset: f64,
    names: Vec<String>,
}

impl FeatureScale {
    pub fn new(
        input_names: &[String],
        var_name: &str,
        factor: f64,
        offset: f64,
    ) -> Result<Self, BinningError> {
        Ok(FeatureScale {
            index: position_of(input_names, var_name)?,
            factor,
            offset,
            names: input_names.to_vec(),
        })
    }
}

impl CellProcessor for FeatureScale {
    fn output_feature_names(&self) -> &[String] {
        &self.names
    }

    fn compute(&self, input: &[Feature], output: &mut [Feature]) {
        output.copy_from_slice(input);
        output[self.index] = (input[self.index] as f64 * self.factor + self.offset) as Feature;
    }
}

/// Ordered chain of processors with the resulting feature names.
#[derive(Debug, Default)]
pub struct CellProcessorChain {
    processors: Vec<Box<dyn CellProcessor>>,
}

impl CellProcessorChain {
    pub fn new(
        configs: &[CellProcessorConfig],
        input_names: &[String],
    ) -> Result<Self, BinningError> {
        let mut processors: Vec<Box<dyn CellProcessor>> = Vec::with_capacity(configs.len());
        for config in configs {
            let names = processors
                .last()
                .map_or(input_names, |p| p.output_feature_names());
            let processor = config.create(names)?;
            processors.push(processor);
        }
        Ok(CellProcessorChain { processors })
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Output names of the last processor, `None` for an empty chain.
    pub fn output_feature_names(&self) -> Option<&[String]> {
        self.processors.last().map(|p| p.output_feature_names())
    }

    pub fn apply(&self, features: Vec<Feature>) -> Vec<Feature> {
        self.processors.iter().fold(features, |input, processor| {
            let mut output = vec![0.0; processor.output_feature_names().len()];
            processor.compute(&input, &mut output);
            output
        })
    }
}

#[cfg(test)]
mod cell_processor_test {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_chain() {
        let input = names(&["chl_mean", "chl_sigma", "chl_counts"]);
        let configs = vec![
            CellProcessorConfig::Selection {
                var_names: names(&["chl_counts", "chl_mean"]),
            },
            CellProcessorConfig::FeatureScale {
                var_name: "chl_mean".into(),
                factor: 10.0,
                offset: 1.0,
            },
        ];
        let chain = CellProcessorChain::new(&configs, &input).unwrap();
        assert_eq!(
            chain.output_feature_names().unwrap(),
            &["chl_counts", "chl_mean"]
        );
        assert_eq!(chain.apply(vec![0.5, 0.1, 4.0]), vec![4.0, 6.0]);
    }

    #[test]
    fn test_unknown_feature() {
        let input = names(&["chl_mean"]);
        let configs = vec![CellProcessorConfig::Selection {
            var_names: names(&["sst_mean"]),
        }];
        assert_eq!(
            CellProcessorChain::new(&configs, &input).unwrap_err(),
            BinningError::UnknownFeature("sst_mean".into())
        );
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = CellProcessorChain::new(&[], &names(&["a"])).unwrap();
        assert!(chain.is_empty());
        assert_eq!(chain.apply(vec![1.0]), vec![1.0]);
    }
}
