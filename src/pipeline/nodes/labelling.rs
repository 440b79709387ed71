//! Labelling node: single-pass streaming connected-component labelling.
//!
//! Consumes `Filtered` pairs in raster order and assigns each foreground
//! element a provisional label. Only two row buffers are kept:
//!
//! ```text
//!   prev_row:  ... NW  N  NE ...
//!   cur_row:   ... W   X
//! ```
//!
//! For a foreground element `X` the positive labels among W, NW, N and NE are
//! collected (8-connectivity). With none, a label is drawn from the pool.
//! Otherwise `X` takes the smallest, a [`Merge`] is recorded against every
//! larger one, and those neighbour cells are rewritten to the smallest so
//! later lookups in this pass see the unified id. Resolving the merge list
//! is left to the resolver downstream, which also hands retired ids back
//! through [`LabelReuseSink`].

use crate::pipeline::block::Processor;
use crate::pipeline::chunk::{Chunk, Payload};
use crate::pipeline::label_pool::{LabelPool, LabelReuseSink, SharedLabelPool};
use crate::types::{FilteredPair, Label, LabelledChunk, Merge, Position, BACKGROUND};
use parking_lot::Mutex;
use std::sync::Arc;

/// Neighbour cell in one of the two row buffers.
#[derive(Debug, Clone, Copy)]
enum Cell {
    Cur(usize),
    Prev(usize),
}

/// Streaming raster-scan labeller.
pub struct LabellingNode {
    width: usize,
    prev_row: Vec<Label>,
    cur_row: Vec<Label>,
    pos: Position,
    pool: SharedLabelPool,
}

impl LabellingNode {
    /// Labeller for rows of `width` elements. The pool is seeded with `width` ids.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero; the assembler validates the width beforehand.
    pub fn new(width: usize) -> Self {
        assert!(width > 0, "row width must be positive");
        Self {
            width,
            prev_row: vec![BACKGROUND; width],
            cur_row: vec![BACKGROUND; width],
            pos: Position::default(),
            pool: Arc::new(Mutex::new(LabelPool::new(width as Label))),
        }
    }

    /// Handle for returning retired labels to this node's pool.
    pub fn reuse_sink(&self) -> LabelReuseSink {
        LabelReuseSink::new(self.pool.clone())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Position of the next element to be scanned.
    pub fn position(&self) -> Position {
        self.pos
    }

    /// Ids currently handed out by the pool.
    pub fn outstanding_labels(&self) -> usize {
        self.pool.lock().outstanding()
    }

    /// Label both elements of `pair`.
    pub fn label_pair(&mut self, pair: FilteredPair) -> LabelledChunk {
        let mut out = LabelledChunk {
            position: self.pos,
            labels: [BACKGROUND; 2],
            merges: Vec::new(),
        };
        out.labels[0] = self.process_element(pair.filt1, &mut out.merges);
        out.labels[1] = self.process_element(pair.filt2, &mut out.merges);

        tracing::trace!(
            "({},{}) labels {:?} merges {:?}",
            out.position.row,
            out.position.col,
            out.labels,
            out.merges
        );
        out
    }

    fn process_element(&mut self, elem: bool, merges: &mut Vec<Merge>) -> Label {
        let col = self.pos.col;
        let label = if elem {
            self.label_foreground(col, merges)
        } else {
            BACKGROUND
        };

        self.cur_row[col] = label;
        self.advance();
        label
    }

    fn label_foreground(&mut self, col: usize, merges: &mut Vec<Merge>) -> Label {
        let mut neighbours: [(Cell, Label); 4] = [(Cell::Cur(0), BACKGROUND); 4];
        let mut n = 0;

        let mut candidates: [Option<Cell>; 4] = [None; 4];
        if col > 0 {
            candidates[0] = Some(Cell::Cur(col - 1));
            candidates[1] = Some(Cell::Prev(col - 1));
        }
        candidates[2] = Some(Cell::Prev(col));
        if col + 1 < self.width {
            candidates[3] = Some(Cell::Prev(col + 1));
        }

        for cell in candidates.into_iter().flatten() {
            let value = self.read(cell);
            if value != BACKGROUND {
                neighbours[n] = (cell, value);
                n += 1;
            }
        }

        if n == 0 {
            return self.pool.lock().allocate();
        }

        let found = &mut neighbours[..n];
        found.sort_unstable_by_key(|&(_, label)| label);
        let min_label = found[0].1;

        for &(cell, label) in found.iter() {
            if label > min_label {
                merges.push(Merge::new(min_label, label));
            }
            self.write(cell, min_label);
        }
        min_label
    }

    #[inline]
    fn read(&self, cell: Cell) -> Label {
        match cell {
            Cell::Cur(c) => self.cur_row[c],
            Cell::Prev(c) => self.prev_row[c],
        }
    }

    #[inline]
    fn write(&mut self, cell: Cell, label: Label) {
        match cell {
            Cell::Cur(c) => self.cur_row[c] = label,
            Cell::Prev(c) => self.prev_row[c] = label,
        }
    }

    /// Move to the next column; on row end swap buffers. The stale contents
    /// of the new current row are overwritten before they are ever read.
    fn advance(&mut self) {
        self.pos.col += 1;
        if self.pos.col >= self.width {
            self.pos.col = 0;
            self.pos.row += 1;
            std::mem::swap(&mut self.prev_row, &mut self.cur_row);
        }
    }
}

impl Processor for LabellingNode {
    fn name(&self) -> &str {
        "Labelling"
    }

    fn process_chunk(&mut self, chunk: Chunk) -> Option<Chunk> {
        match chunk {
            Chunk::End => Some(Chunk::End),
            Chunk::Data(Payload::Filtered(pair)) => Some(Chunk::labelled(self.label_pair(pair))),
            Chunk::Data(other) => {
                tracing::trace!("Labelling ignored {} payload", other.variant_name());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LabelReusal, RawPair};

    /// Feed a row-major boolean grid through the labeller, padding an odd tail.
    fn scan(node: &mut LabellingNode, cells: &[bool]) -> Vec<LabelledChunk> {
        cells
            .chunks(2)
            .map(|pair| {
                node.label_pair(FilteredPair {
                    filt1: pair[0],
                    filt2: pair.get(1).copied().unwrap_or(false),
                })
            })
            .collect()
    }

    fn grid(rows: &[&str]) -> Vec<bool> {
        rows.iter()
            .flat_map(|r| r.split_whitespace().map(|c| c == "1"))
            .collect()
    }

    fn flatten(chunks: &[LabelledChunk], len: usize) -> Vec<Label> {
        chunks
            .iter()
            .flat_map(|c| c.labels)
            .take(len)
            .collect()
    }

    #[test]
    fn test_three_row_grid() {
        let cells = grid(&["1 1 0 0 1", "0 1 1 0 0", "0 0 0 0 1"]);
        let mut node = LabellingNode::new(5);
        let out = scan(&mut node, &cells);
        let labels = flatten(&out, cells.len());
        let at = |r: usize, c: usize| labels[r * 5 + c];

        // Rows 0-1 blob.
        let blob = at(0, 0);
        assert!(blob > 0);
        for (r, c) in [(0, 1), (1, 1), (1, 2)] {
            assert_eq!(at(r, c), blob);
        }
        // Isolated cells.
        assert!(at(0, 4) > 0 && at(0, 4) != blob);
        assert!(at(2, 4) > 0 && at(2, 4) != blob && at(2, 4) != at(0, 4));
        // Background.
        for (r, c) in [(0, 2), (0, 3), (1, 0), (1, 3), (1, 4), (2, 0)] {
            assert_eq!(at(r, c), 0);
        }
        // Provisional labels already agree, so nothing to merge.
        assert!(out.iter().all(|c| c.merges.is_empty()));
    }

    #[test]
    fn test_u_shape_records_merge_and_patches_buffer() {
        // Two arms get different labels and meet on row 1.
        let cells = grid(&["1 0 1", "1 1 1"]);
        let mut node = LabellingNode::new(3);
        let out = scan(&mut node, &cells);
        let labels = flatten(&out, cells.len());

        assert_eq!(labels[0], 1);
        assert_eq!(labels[2], 2);
        // Row 1: all take the smaller label.
        assert_eq!(&labels[3..6], &[1, 1, 1]);

        let merges: Vec<Merge> = out.iter().flat_map(|c| c.merges.clone()).collect();
        assert!(merges.contains(&Merge { a: 1, b: 2 }));
        assert!(merges.iter().all(|m| m.a < m.b));
    }

    #[test]
    fn test_patched_neighbours_hide_stale_label() {
        // (1,1) sees NW=1 and NE=2 and patches both cells to 1.
        // (1,2) then reads N=1 instead of 2; only its NE cell still holds 2.
        let cells = grid(&["1 0 1 1", "0 1 1 0"]);
        let mut node = LabellingNode::new(4);
        let out = scan(&mut node, &cells);
        let labels = flatten(&out, cells.len());
        assert_eq!(&labels[..4], &[1, 0, 2, 2]);
        assert_eq!(&labels[4..], &[0, 1, 1, 0]);

        let merges: Vec<Merge> = out.iter().flat_map(|c| c.merges.clone()).collect();
        assert_eq!(merges.first(), Some(&Merge { a: 1, b: 2 }));
        // After patching, the N cell of (1,2) already reads 1.
        assert!(merges.iter().all(|m| *m == Merge { a: 1, b: 2 }));
        assert_eq!(merges.len(), 2);
    }

    #[test]
    fn test_position_wraps_mid_pair_with_odd_width() {
        let mut node = LabellingNode::new(3);
        let first = node.label_pair(FilteredPair::default());
        let second = node.label_pair(FilteredPair::default());
        assert_eq!(first.position, Position::new(0, 0));
        assert_eq!(second.position, Position::new(0, 2));
        assert_eq!(node.position(), Position::new(1, 1));
    }

    #[test]
    fn test_end_is_propagated() {
        let mut node = LabellingNode::new(4);
        assert_eq!(node.process_chunk(Chunk::End), Some(Chunk::End));
    }

    #[test]
    fn test_unexpected_payload_is_ignored() {
        let mut node = LabellingNode::new(4);
        let out = node.process_chunk(Chunk::raw(RawPair { data1: 1, data2: 1 }));
        assert!(out.is_none());
        // Scan position untouched.
        assert_eq!(node.position(), Position::default());
    }

    #[test]
    fn test_recycled_labels_are_reused() {
        let mut node = LabellingNode::new(2);
        let sink = node.reuse_sink();

        let a = node.label_pair(FilteredPair { filt1: true, filt2: false });
        assert_eq!(a.labels, [1, 0]);
        // Row 1 empty, row 2 starts a new blob.
        node.label_pair(FilteredPair::default());
        assert_eq!(sink.reuse_labels(&LabelReusal::new(vec![1])), 1);
        let b = node.label_pair(FilteredPair { filt1: false, filt2: true });
        assert_eq!(b.labels, [0, 1]);
        assert_eq!(node.outstanding_labels(), 1);
    }

    #[test]
    fn test_fresh_labels_beyond_seed() {
        // Width 3 seeds ids 1..=3; a checkerboard-ish row pattern needs more.
        let cells = grid(&["1 0 1", "0 0 0", "1 0 1", "0 0 0"]);
        let mut node = LabellingNode::new(3);
        let labels = flatten(&scan(&mut node, &cells), cells.len());
        assert_eq!(labels[0], 1);
        assert_eq!(labels[2], 2);
        assert_eq!(labels[6], 3);
        assert_eq!(labels[8], 4);
    }
}
