//! Reference labelling and a single-threaded driver for the stage processors

use super::builders::Grid;
use pipeliner_rs::pipeline::nodes::{GridSource, LabellingNode, ResolverNode, ThresholdNode};
use pipeliner_rs::pipeline::{Chunk, Processor, ResolverSummary, SinkMessage};
use pipeliner_rs::Component;
use std::collections::VecDeque;

/// `(area, min_row, min_col, max_row, max_col)`
pub type Extent = (u64, usize, usize, usize, usize);

/// 8-connected components by breadth-first flood fill, sorted.
pub fn flood_fill(grid: &Grid) -> Vec<Extent> {
    let height = grid.height();
    let mut seen = vec![false; grid.width * height];
    let mut extents = Vec::new();

    for row in 0..height {
        for col in 0..grid.width {
            if !grid.get(row, col) || seen[row * grid.width + col] {
                continue;
            }
            seen[row * grid.width + col] = true;
            let mut queue = VecDeque::from([(row, col)]);
            let mut extent = (0, row, col, row, col);
            while let Some((r, c)) = queue.pop_front() {
                extent.0 += 1;
                extent.1 = extent.1.min(r);
                extent.2 = extent.2.min(c);
                extent.3 = extent.3.max(r);
                extent.4 = extent.4.max(c);
                for dr in -1i64..=1 {
                    for dc in -1i64..=1 {
                        let (nr, nc) = (r as i64 + dr, c as i64 + dc);
                        if nr < 0 || nc < 0 || nr as usize >= height || nc as usize >= grid.width {
                            continue;
                        }
                        let (nr, nc) = (nr as usize, nc as usize);
                        if grid.get(nr, nc) && !seen[nr * grid.width + nc] {
                            seen[nr * grid.width + nc] = true;
                            queue.push_back((nr, nc));
                        }
                    }
                }
            }
            extents.push(extent);
        }
    }
    extents.sort();
    extents
}

/// Result of driving the processors by hand.
#[derive(Debug)]
pub struct SyncRun {
    pub components: Vec<Component>,
    pub summary: Option<ResolverSummary>,
    /// Most labels outstanding at once in the labeller's pool
    pub peak_outstanding: usize,
    /// Labels still outstanding after end of stream
    pub final_outstanding: usize,
}

impl SyncRun {
    pub fn extents(&self) -> Vec<Extent> {
        let mut extents: Vec<_> = self.components.iter().map(|c| c.extent()).collect();
        extents.sort();
        extents
    }
}

/// Run every chunk of `grid` through source, threshold, labelling and resolver
/// on the calling thread, so no chunk can be overwritten.
pub fn run_sync(grid: &Grid, recycle: bool) -> SyncRun {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut source = GridSource::new(grid.samples());
    let mut threshold = ThresholdNode::new(128);
    let mut labelling = LabellingNode::new(grid.width);
    let mut resolver = ResolverNode::new(grid.width).with_reports(tx);
    if recycle {
        resolver = resolver.with_recycling(labelling.reuse_sink());
    }

    let mut peak_outstanding = 0;
    loop {
        let Some(raw) = source.process_chunk(Chunk::empty()) else {
            break;
        };
        let end = raw.is_end();
        let labelled = threshold
            .process_chunk(raw)
            .and_then(|c| labelling.process_chunk(c));
        peak_outstanding = peak_outstanding.max(labelling.outstanding_labels());
        if let Some(chunk) = labelled {
            resolver.process_chunk(chunk);
        }
        if end {
            break;
        }
    }

    let mut components = Vec::new();
    let mut summary = None;
    for msg in rx.try_iter() {
        match msg {
            SinkMessage::Components(batch) => components.extend(batch),
            SinkMessage::End(s) => summary = Some(s),
        }
    }

    SyncRun {
        components,
        summary,
        peak_outstanding,
        final_outstanding: labelling.outstanding_labels(),
    }
}
