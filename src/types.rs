//! Core data types shared by the pipeline stages
//!
//! - [`RawPair`] / [`FilteredPair`] - What sources and the threshold stage emit
//! - [`LabelledChunk`] / [`Merge`] - Output of the labelling stage
//! - [`ResolvedChunk`] / [`Component`] - Output of the resolver
//! - [`LabelReusal`] - Feedback message returning retired label ids
//! - [`StageStats`] - Per-stage observability counters

use serde::{Deserialize, Serialize};

/// Provisional component identifier. `0` is background.
pub type Label = u32;

/// The background label.
pub const BACKGROUND: Label = 0;

/// Raster coordinate of a scanned element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Position of the next element in raster order for a row of `width` elements.
    #[inline]
    pub fn advance(self, width: usize) -> Self {
        if self.col + 1 >= width {
            Self {
                row: self.row + 1,
                col: 0,
            }
        } else {
            Self {
                row: self.row,
                col: self.col + 1,
            }
        }
    }
}

/// Two raw samples as read by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawPair {
    pub data1: u8,
    pub data2: u8,
}

/// Two foreground flags produced by the threshold stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilteredPair {
    pub filt1: bool,
    pub filt2: bool,
}

/// Equivalence of two provisional labels discovered during the scan.
///
/// Always built with `a < b`. The same pair may be reported many times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Merge {
    pub a: Label,
    pub b: Label,
}

impl Merge {
    pub fn new(a: Label, b: Label) -> Self {
        debug_assert!(a != 0 && b != 0 && a != b, "merge of {a} and {b}");
        if a < b {
            Self { a, b }
        } else {
            Self { a: b, b: a }
        }
    }
}

/// Labelling result for one scanned pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelledChunk {
    /// Position of the first element; the second is `position.advance(width)`.
    pub position: Position,
    pub labels: [Label; 2],
    pub merges: Vec<Merge>,
}

/// A finished connected component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Sequence number in completion order.
    pub id: u64,
    pub area: u64,
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

impl Component {
    /// Shape key that ignores the completion-order id.
    pub fn extent(&self) -> (u64, usize, usize, usize, usize) {
        (self.area, self.min_row, self.min_col, self.max_row, self.max_col)
    }
}

/// Resolver output for one scanned pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedChunk {
    pub position: Position,
    /// Current class representatives of the two elements (0 for background).
    pub labels: [Label; 2],
    /// Components that were completed while processing this pair.
    pub completed: Vec<Component>,
}

/// Feedback message returning retired label ids to the labelling stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelReusal {
    pub labels: Vec<Label>,
}

impl LabelReusal {
    pub fn new(labels: Vec<Label>) -> Self {
        Self { labels }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Observability counters for a single stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStats {
    pub name: String,
    /// Chunks handed to the transform
    pub received: u64,
    /// Chunks the transform produced
    pub emitted: u64,
    /// Ticks where the transform produced nothing
    pub suppressed: u64,
    /// Chunks written into this stage's mailbox
    pub published: u64,
    /// Chunks overwritten in this stage's mailbox before being retrieved
    pub lost_chunks: u64,
    pub running: bool,
}

impl StageStats {
    /// Fraction of published chunks that were never retrieved, as a percentage.
    pub fn loss_rate(&self) -> f64 {
        if self.published == 0 {
            0.0
        } else {
            (self.lost_chunks as f64 / self.published as f64) * 100.0
        }
    }
}
