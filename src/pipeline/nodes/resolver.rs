//! Resolver node: finalizes components from the labelling stage's output.
//!
//! Merge records are applied to a union-find forest over provisional labels
//! (duplicates are harmless: a repeated union is a no-op). Every foreground
//! element updates its class's area, bounding box and last row.
//!
//! When the first element of row `r` arrives, any class whose last pixel lies
//! on row `r - 2` or earlier can no longer grow, and none of its labels can
//! still sit in the labeller's two row buffers. Such classes are reported as
//! [`Component`]s, their union-find entries are reset, and their labels are
//! handed back through the [`LabelReuseSink`]. At end of stream every open
//! class is completed.

use crate::pipeline::block::Processor;
use crate::pipeline::bridge::{ResolverSummary, SinkMessage};
use crate::pipeline::chunk::{Chunk, Payload};
use crate::pipeline::label_pool::LabelReuseSink;
use crate::types::{Component, Label, LabelReusal, LabelledChunk, Position, ResolvedChunk, BACKGROUND};
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::time::Duration;

/// How long the final summary may wait for room in the report channel.
const END_REPORT_TIMEOUT: Duration = Duration::from_secs(1);

/// Accumulated state of one equivalence class, keyed by its root label.
#[derive(Debug, Clone)]
struct ClassInfo {
    members: Vec<Label>,
    area: u64,
    bbox: Option<(Position, Position)>,
    last_row: usize,
}

impl ClassInfo {
    fn new(label: Label, row: usize) -> Self {
        Self {
            members: vec![label],
            area: 0,
            bbox: None,
            last_row: row,
        }
    }

    fn absorb_pixel(&mut self, pos: Position) {
        self.area += 1;
        self.last_row = self.last_row.max(pos.row);
        self.bbox = Some(match self.bbox {
            None => (pos, pos),
            Some((lo, hi)) => (
                Position::new(lo.row.min(pos.row), lo.col.min(pos.col)),
                Position::new(hi.row.max(pos.row), hi.col.max(pos.col)),
            ),
        });
    }

    fn absorb_class(&mut self, other: ClassInfo) {
        self.members.extend(other.members);
        self.area += other.area;
        self.last_row = self.last_row.max(other.last_row);
        self.bbox = match (self.bbox, other.bbox) {
            (None, b) | (b, None) => b,
            (Some((alo, ahi)), Some((blo, bhi))) => Some((
                Position::new(alo.row.min(blo.row), alo.col.min(blo.col)),
                Position::new(ahi.row.max(bhi.row), ahi.col.max(bhi.col)),
            )),
        };
    }
}

/// Streaming union-find resolver with label recycling.
pub struct ResolverNode {
    width: usize,
    /// `parents[l]` is `l`'s parent, or 0 when `l` is not in use.
    parents: Vec<Label>,
    classes: HashMap<Label, ClassInfo>,
    current_row: Option<usize>,
    recycle: Option<LabelReuseSink>,
    reports: Option<Sender<SinkMessage>>,
    next_component_id: u64,
    merges_applied: u64,
    recycled_labels: u64,
    dropped_reports: u64,
}

impl ResolverNode {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
            parents: Vec::new(),
            classes: HashMap::new(),
            current_row: None,
            recycle: None,
            reports: None,
            next_component_id: 0,
            merges_applied: 0,
            recycled_labels: 0,
            dropped_reports: 0,
        }
    }

    /// Return retired labels to the labelling stage through `sink`.
    pub fn with_recycling(mut self, sink: LabelReuseSink) -> Self {
        self.recycle = Some(sink);
        self
    }

    /// Report completed components on `tx`.
    pub fn with_reports(mut self, tx: Sender<SinkMessage>) -> Self {
        self.reports = Some(tx);
        self
    }

    /// Number of components completed so far.
    pub fn completed_components(&self) -> u64 {
        self.next_component_id
    }

    /// Number of classes still open.
    pub fn open_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn summary(&self) -> ResolverSummary {
        ResolverSummary {
            components: self.next_component_id,
            merges_applied: self.merges_applied,
            recycled_labels: self.recycled_labels,
            dropped_reports: self.dropped_reports,
        }
    }

    /// Current representative of `label`, or 0 if the label is not in use.
    pub fn representative(&mut self, label: Label) -> Label {
        if !self.is_registered(label) {
            return BACKGROUND;
        }
        self.find(label)
    }

    /// Apply the merges of one labelled pair and account for its elements.
    pub fn resolve(&mut self, chunk: &LabelledChunk) -> ResolvedChunk {
        let row_hint = chunk.position.row;
        for merge in &chunk.merges {
            if self.union(merge.a, merge.b, row_hint) {
                self.merges_applied += 1;
            }
        }

        let mut completed = Vec::new();
        let mut labels = [BACKGROUND; 2];
        let mut pos = chunk.position;
        for (slot, &label) in labels.iter_mut().zip(chunk.labels.iter()) {
            match self.current_row {
                Some(row) if pos.row <= row => {}
                Some(_) => {
                    completed.extend(self.retire(|info| info.last_row + 1 < pos.row));
                    self.current_row = Some(pos.row);
                }
                None => self.current_row = Some(pos.row),
            }
            if label != BACKGROUND {
                *slot = self.observe(label, pos);
            }
            pos = pos.advance(self.width);
        }

        if !completed.is_empty() {
            self.report(completed.clone());
        }

        ResolvedChunk {
            position: chunk.position,
            labels,
            completed,
        }
    }

    /// Complete every open class. Called at end of stream.
    pub fn flush(&mut self) -> Vec<Component> {
        let completed = self.retire(|_| true);
        if !completed.is_empty() {
            self.report(completed.clone());
        }
        completed
    }

    fn is_registered(&self, label: Label) -> bool {
        self.parents.get(label as usize).is_some_and(|&p| p != BACKGROUND)
    }

    fn ensure(&mut self, label: Label, row: usize) {
        let idx = label as usize;
        if idx >= self.parents.len() {
            self.parents.resize(idx + 1, BACKGROUND);
        }
        if self.parents[idx] == BACKGROUND {
            self.parents[idx] = label;
            self.classes.insert(label, ClassInfo::new(label, row));
        }
    }

    /// Root of `label` with path halving.
    fn find(&mut self, mut label: Label) -> Label {
        while self.parents[label as usize] != label {
            let parent = self.parents[label as usize];
            let grandparent = self.parents[parent as usize];
            self.parents[label as usize] = grandparent;
            label = grandparent;
        }
        label
    }

    /// Merge the classes of `a` and `b`; the smaller root survives.
    fn union(&mut self, a: Label, b: Label, row: usize) -> bool {
        if a == BACKGROUND || b == BACKGROUND {
            return false;
        }
        self.ensure(a, row);
        self.ensure(b, row);
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parents[child as usize] = root;
        if let Some(child_info) = self.classes.remove(&child) {
            if let Some(root_info) = self.classes.get_mut(&root) {
                root_info.absorb_class(child_info);
            }
        }
        true
    }

    fn observe(&mut self, label: Label, pos: Position) -> Label {
        self.ensure(label, pos.row);
        let root = self.find(label);
        if let Some(info) = self.classes.get_mut(&root) {
            info.absorb_pixel(pos);
        }
        root
    }

    /// Complete the classes matching `done`, reset their labels and recycle them.
    fn retire(&mut self, done: impl Fn(&ClassInfo) -> bool) -> Vec<Component> {
        let mut roots: Vec<Label> = self
            .classes
            .iter()
            .filter(|(_, info)| done(info))
            .map(|(&root, _)| root)
            .collect();
        if roots.is_empty() {
            return Vec::new();
        }
        roots.sort_by_key(|root| {
            let info = &self.classes[root];
            (info.bbox.map(|(lo, _)| lo), *root)
        });

        let mut completed = Vec::with_capacity(roots.len());
        let mut freed = Vec::new();
        for root in roots {
            let Some(info) = self.classes.remove(&root) else {
                continue;
            };
            for &member in &info.members {
                self.parents[member as usize] = BACKGROUND;
            }
            freed.extend_from_slice(&info.members);

            if let Some((lo, hi)) = info.bbox {
                completed.push(Component {
                    id: self.next_component_id,
                    area: info.area,
                    min_row: lo.row,
                    min_col: lo.col,
                    max_row: hi.row,
                    max_col: hi.col,
                });
                self.next_component_id += 1;
            }
        }

        tracing::debug!(
            "Retired {} component(s), recycling {} label(s)",
            completed.len(),
            freed.len()
        );
        if let Some(sink) = &self.recycle {
            self.recycled_labels += sink.reuse_labels(&LabelReusal::new(freed)) as u64;
        }
        completed
    }

    fn report(&mut self, components: Vec<Component>) {
        if let Some(tx) = &self.reports {
            if tx.try_send(SinkMessage::Components(components)).is_err() {
                self.dropped_reports += 1;
            }
        }
    }

    fn finish(&mut self) {
        self.flush();
        let summary = self.summary();
        if summary.dropped_reports > 0 {
            tracing::warn!(
                "Resolver dropped {} report(s) due to backpressure",
                summary.dropped_reports
            );
        }
        if let Some(tx) = &self.reports {
            if tx.send_timeout(SinkMessage::End(summary), END_REPORT_TIMEOUT).is_err() {
                tracing::warn!("Resolver could not deliver end-of-stream summary");
            }
        }
    }
}

impl Processor for ResolverNode {
    fn name(&self) -> &str {
        "Resolver"
    }

    fn process_chunk(&mut self, chunk: Chunk) -> Option<Chunk> {
        match chunk {
            Chunk::End => {
                self.finish();
                Some(Chunk::End)
            }
            Chunk::Data(Payload::Labelled(labelled)) => Some(Chunk::resolved(self.resolve(&labelled))),
            Chunk::Data(_) => None,
        }
    }
}
