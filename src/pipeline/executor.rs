//! Pipeline assembler: a linear chain of blocks, one worker thread each.
//!
//! Stages are appended upstream to downstream. Each new stage is wired to the
//! previous stage's mailbox, so the first stage appended must be a source.
//!
//! ```text
//! [Source] ──► [Threshold] ──► [Labelling] ──► [Resolver] ──► PipelineBridge
//!                                   ▲               │
//!                                   └── labels ─────┘
//! ```
//!
//! Start goes tail first so every consumer is waiting before its producer runs.
//! Stop goes head first so nothing new enters a stage that is shutting down.
//! Dropping the pipeline tears the stages down in reverse construction order.

use crate::config::{PipelineConfig, SourceConfig};
use crate::error::Result;
use crate::pipeline::block::{Block, BlockOptions, Processor, Stage};
use crate::pipeline::bridge::{PipelineBridge, ResolverSummary, SinkMessage};
use crate::pipeline::id::StageId;
use crate::pipeline::mailbox::Upstream;
use crate::pipeline::nodes::{CsvSource, LabellingNode, RandomSource, ResolverNode, ThresholdNode};
use crate::types::{Component, StageStats};
use crossbeam_channel::RecvTimeoutError;
use serde::Serialize;
use std::time::{Duration, Instant};

/// How long `run_until_end` waits on the bridge before re-checking its deadline.
const BRIDGE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of [`Pipeline::run_until_end`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// True when the resolver delivered its end-of-stream summary.
    pub completed: bool,
    pub elapsed_ms: u64,
    pub components: Vec<Component>,
    pub summary: Option<ResolverSummary>,
    pub stages: Vec<StageStats>,
}

impl RunReport {
    /// Chunks overwritten between stages.
    ///
    /// The last stage's mailbox has no consumer, so its overwrites are not counted.
    pub fn lost_chunks(&self) -> u64 {
        self.stages
            .split_last()
            .map_or(0, |(_, upstream)| upstream.iter().map(|s| s.lost_chunks).sum())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Fold one resolver message in. Returns true at end of stream.
    fn absorb(&mut self, msg: SinkMessage) -> bool {
        match msg {
            SinkMessage::Components(components) => {
                self.components.extend(components);
                false
            }
            SinkMessage::End(summary) => {
                self.summary = Some(summary);
                self.completed = true;
                true
            }
        }
    }
}

/// A linear chain of running stages.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage fed by the current tail. Returns its id.
    pub fn append<P: Processor>(&mut self, processor: P, options: BlockOptions) -> StageId {
        let id = StageId(self.stages.len() as u32);
        let upstream = self.tail();
        let block = Block::new(processor, upstream, options);
        tracing::debug!("Appended stage '{}' as {}", block.name(), id);
        self.stages.push(Box::new(block));
        id
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Mailbox of the last stage.
    pub fn tail(&self) -> Option<Upstream> {
        self.stages.last().map(|s| s.output())
    }

    /// Mailbox of the given stage.
    pub fn output(&self, id: StageId) -> Option<Upstream> {
        self.stages.get(id.index()).map(|s| s.output())
    }

    /// First stage with the given name.
    pub fn find(&self, name: &str) -> Option<StageId> {
        self.stages
            .iter()
            .position(|s| s.name() == name)
            .map(|idx| StageId(idx as u32))
    }

    pub fn start(&mut self) {
        tracing::info!("Starting pipeline with {} stage(s)", self.stages.len());
        for stage in self.stages.iter_mut().rev() {
            stage.start();
        }
    }

    pub fn stop(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.stop();
        }
    }

    /// True while any stage's worker is still processing.
    pub fn is_running(&self) -> bool {
        self.stages.iter().any(|s| s.is_running())
    }

    pub fn stats(&self) -> Vec<StageStats> {
        self.stages.iter().map(|s| s.stats()).collect()
    }

    /// Start the chain and collect resolver reports until end of stream.
    ///
    /// With `max_runtime` set, the chain is stopped once it elapses and the
    /// report is returned with `completed == false`.
    pub fn run_until_end(
        &mut self,
        bridge: &PipelineBridge,
        max_runtime: Option<Duration>,
    ) -> RunReport {
        let started = Instant::now();
        let deadline = max_runtime.map(|d| started + d);
        let mut report = RunReport::default();

        self.start();
        loop {
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::warn!("Pipeline hit its runtime limit before end of stream");
                        break;
                    }
                    (deadline - now).min(BRIDGE_POLL_INTERVAL)
                }
                None => BRIDGE_POLL_INTERVAL,
            };
            match bridge.recv_timeout(wait) {
                Ok(msg) => {
                    if report.absorb(msg) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) if !self.is_running() => {
                    // Every worker is gone; whatever was sent is already queued.
                    for msg in bridge.drain() {
                        report.absorb(msg);
                    }
                    if !report.completed {
                        tracing::warn!("All stages exited before end of stream");
                    }
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("Report channel closed before end of stream");
                    break;
                }
            }
        }
        self.stop();

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        report.stages = self.stats();
        let lost = report.lost_chunks();
        if lost > 0 {
            tracing::warn!("{} chunk(s) were overwritten before being consumed", lost);
        }
        tracing::info!(
            "Pipeline finished in {} ms: {} component(s)",
            report.elapsed_ms,
            report.components.len()
        );
        report
    }
}

impl Drop for Pipeline {
    /// Tear stages down in reverse construction order.
    fn drop(&mut self) {
        while let Some(mut stage) = self.stages.pop() {
            stage.stop();
        }
    }
}

/// Ids of the stages created by [`PipelineBuilder`].
#[derive(Debug, Clone, Copy)]
pub struct PipelineStageIds {
    pub source: StageId,
    pub threshold: StageId,
    pub labelling: StageId,
    pub resolver: StageId,
}

/// Builds the standard source → threshold → labelling → resolver chain.
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Build with the source named in the config.
    pub fn build(self) -> Result<(Pipeline, PipelineBridge, PipelineStageIds)> {
        self.config.validate()?;
        match self.config.source.clone() {
            SourceConfig::Csv { path } => {
                let source = CsvSource::open(&path)?;
                self.build_with_source(source)
            }
            SourceConfig::Random { pairs, seed } => {
                let source = RandomSource::new(seed, pairs);
                self.build_with_source(source)
            }
        }
    }

    /// Build with a caller-supplied source.
    pub fn build_with_source<S: Processor>(
        self,
        source: S,
    ) -> Result<(Pipeline, PipelineBridge, PipelineStageIds)> {
        let config = &self.config;
        config.validate()?;

        let (bridge, report_tx) = PipelineBridge::new(config.resolver.report_capacity);
        let labelling = LabellingNode::new(config.width);
        let mut resolver = ResolverNode::new(config.width).with_reports(report_tx);
        if config.resolver.recycle_labels {
            resolver = resolver.with_recycling(labelling.reuse_sink());
        }

        let stage_options = config.engine.block_options();
        let mut pipeline = Pipeline::new();
        let ids = PipelineStageIds {
            source: pipeline.append(source, config.engine.source_options()),
            threshold: pipeline.append(ThresholdNode::from_config(&config.threshold), stage_options),
            labelling: pipeline.append(labelling, stage_options),
            resolver: pipeline.append(resolver, stage_options),
        };

        tracing::info!(
            "Built pipeline: width {}, threshold {}{}, recycling {}",
            config.width,
            config.threshold.level,
            if config.threshold.invert { " (inverted)" } else { "" },
            config.resolver.recycle_labels
        );
        Ok((pipeline, bridge, ids))
    }
}
