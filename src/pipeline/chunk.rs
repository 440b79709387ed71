//! Chunks: the unit of work exchanged between stages.
//!
//! A chunk is either `Data` carrying one [`Payload`] variant or the terminal
//! `End` marker. The payload set is closed; each stage matches the single
//! variant it understands and ignores the rest.

use crate::types::{FilteredPair, LabelledChunk, RawPair, ResolvedChunk};

/// Discriminant of a [`Chunk`], handy for assertions and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Data,
    End,
}

/// Stage-specific payload carried by a data chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// No payload. Fed to sources on every tick.
    Empty,
    Raw(RawPair),
    Filtered(FilteredPair),
    Labelled(LabelledChunk),
    Resolved(ResolvedChunk),
}

impl Payload {
    /// Short variant name for log lines.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Payload::Empty => "Empty",
            Payload::Raw(_) => "Raw",
            Payload::Filtered(_) => "Filtered",
            Payload::Labelled(_) => "Labelled",
            Payload::Resolved(_) => "Resolved",
        }
    }
}

/// A unit of work flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Data(Payload),
    /// End of stream. Carries nothing and must reach every downstream stage.
    End,
}

impl Chunk {
    /// The input a source processor receives each tick.
    pub fn empty() -> Self {
        Chunk::Data(Payload::Empty)
    }

    pub fn kind(&self) -> ChunkKind {
        match self {
            Chunk::Data(_) => ChunkKind::Data,
            Chunk::End => ChunkKind::End,
        }
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        matches!(self, Chunk::End)
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Chunk::Data(p) => Some(p),
            Chunk::End => None,
        }
    }

    pub fn raw(pair: RawPair) -> Self {
        Chunk::Data(Payload::Raw(pair))
    }

    pub fn filtered(pair: FilteredPair) -> Self {
        Chunk::Data(Payload::Filtered(pair))
    }

    pub fn labelled(chunk: LabelledChunk) -> Self {
        Chunk::Data(Payload::Labelled(chunk))
    }

    pub fn resolved(chunk: ResolvedChunk) -> Self {
        Chunk::Data(Payload::Resolved(chunk))
    }
}
