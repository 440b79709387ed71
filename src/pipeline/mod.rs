//! Staged streaming pipeline.
//!
//! Each stage is a [`Block`] running one [`Processor`] on its own thread.
//! Stages hand work downstream through single-slot [`Mailbox`]es that keep
//! only the newest chunk, so a slow stage sees the latest data and the
//! overwritten chunks are counted as lost.
//!
//! # Architecture
//!
//! ```text
//! [Source] ──► [Threshold] ──► [Labelling] ──► [Resolver]
//!                                  ▲               │
//!                                  └─ LabelReusal ─┘
//! ```
//!
//! The resolver reports completed components through the [`PipelineBridge`]
//! rather than its mailbox, so nothing it finds at end of stream is overwritten.

pub mod block;
pub mod bridge;
pub mod chunk;
pub mod executor;
pub mod id;
pub mod label_pool;
pub mod mailbox;
pub mod nodes;

pub use block::{Block, BlockOptions, Processor, Stage, DEFAULT_POLL_INTERVAL};
pub use bridge::{PipelineBridge, ResolverSummary, SinkMessage, REPORT_CHANNEL_CAPACITY};
pub use chunk::{Chunk, ChunkKind, Payload};
pub use executor::{Pipeline, PipelineBuilder, PipelineStageIds, RunReport};
pub use id::StageId;
pub use label_pool::{LabelPool, LabelReuseSink, ReleaseOutcome, SharedLabelPool};
pub use mailbox::{Mailbox, Upstream};
