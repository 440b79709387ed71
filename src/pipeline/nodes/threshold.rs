//! ThresholdNode: turns raw byte pairs into foreground flags.
//!
//! A sample is foreground when it is at or above `level`. With `invert`
//! set, samples below `level` are foreground instead.

use crate::config::ThresholdConfig;
use crate::pipeline::block::Processor;
use crate::pipeline::chunk::{Chunk, Payload};
use crate::types::{FilteredPair, RawPair};

/// Binarizes raw samples.
pub struct ThresholdNode {
    level: u8,
    /// Invert mode: if true, samples below `level` are foreground.
    invert: bool,
}

impl ThresholdNode {
    pub fn new(level: u8) -> Self {
        Self {
            level,
            invert: false,
        }
    }

    pub fn from_config(config: &ThresholdConfig) -> Self {
        Self {
            level: config.level,
            invert: config.invert,
        }
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    #[inline]
    pub fn is_foreground(&self, value: u8) -> bool {
        (value >= self.level) != self.invert
    }

    pub fn filter(&self, pair: RawPair) -> FilteredPair {
        FilteredPair {
            filt1: self.is_foreground(pair.data1),
            filt2: self.is_foreground(pair.data2),
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn invert(&self) -> bool {
        self.invert
    }
}

impl Default for ThresholdNode {
    fn default() -> Self {
        Self::from_config(&ThresholdConfig::default())
    }
}

impl Processor for ThresholdNode {
    fn name(&self) -> &str {
        "Threshold"
    }

    fn process_chunk(&mut self, chunk: Chunk) -> Option<Chunk> {
        match chunk {
            Chunk::End => Some(Chunk::End),
            Chunk::Data(Payload::Raw(pair)) => Some(Chunk::filtered(self.filter(pair))),
            Chunk::Data(_) => None,
        }
    }
}
