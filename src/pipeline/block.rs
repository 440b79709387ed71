//! Block execution engine.
//!
//! A [`Block`] owns one [`Processor`] and, once started, one worker thread.
//! The worker pulls the latest chunk from the upstream mailbox (or feeds an
//! empty chunk to a source), runs the processor's transform and publishes
//! the result into the block's own mailbox.
//!
//! ```text
//!  upstream mailbox ──► [worker: process_chunk] ──► own mailbox ──► next block
//! ```
//!
//! # Lifecycle
//!
//! - `start()` spawns the worker. Calling it on a started block does nothing.
//! - `stop()` raises the stop flag, joins the worker and takes the processor
//!   back, so the block can be started again. Calling it on a block that was
//!   never started does nothing.
//! - The worker exits on its own after forwarding `End`.

use crate::pipeline::chunk::Chunk;
use crate::pipeline::mailbox::{Mailbox, Upstream};
use crate::types::StageStats;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Default time a worker waits on its upstream before re-checking the stop flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Stage-specific transform.
///
/// The processor owns its input and returns at most one output chunk.
/// Returning `None` suppresses the tick (for example on an unexpected payload).
pub trait Processor: Send + 'static {
    /// Human-readable name, also used as the worker thread name.
    fn name(&self) -> &str;

    /// Transform one chunk.
    fn process_chunk(&mut self, chunk: Chunk) -> Option<Chunk>;
}

/// Tuning knobs for a block's worker loop.
#[derive(Debug, Clone, Copy)]
pub struct BlockOptions {
    /// How long a retrieve may block before the stop flag is checked again.
    pub poll_interval: Duration,
    /// Minimum time between two iterations. `None` runs flat out.
    pub min_period: Option<Duration>,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_period: None,
        }
    }
}

impl BlockOptions {
    /// Pace the loop at `hz` iterations per second. `0` disables pacing.
    pub fn with_rate_hz(mut self, hz: u32) -> Self {
        self.min_period = if hz == 0 {
            None
        } else {
            Some(Duration::from_nanos(1_000_000_000 / hz as u64))
        };
        self
    }
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    emitted: AtomicU64,
    suppressed: AtomicU64,
}

/// Object-safe view of a block, used by the pipeline assembler.
pub trait Stage: Send {
    fn name(&self) -> &str;

    fn start(&mut self);

    fn stop(&mut self);

    /// True while the worker thread is alive and has not finished the stream.
    fn is_running(&self) -> bool;

    fn stats(&self) -> StageStats;

    /// Handle to this stage's mailbox, for wiring the next stage.
    fn output(&self) -> Upstream;
}

/// One pipeline stage with its own worker thread and outbound mailbox.
pub struct Block<P: Processor> {
    name: String,
    upstream: Option<Upstream>,
    mailbox: Upstream,
    options: BlockOptions,
    processor: Option<P>,
    worker: Option<JoinHandle<P>>,
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl<P: Processor> Block<P> {
    /// Create a block. `upstream` is `None` only for sources.
    pub fn new(processor: P, upstream: Option<Upstream>, options: BlockOptions) -> Self {
        Self {
            name: processor.name().to_string(),
            upstream,
            mailbox: Mailbox::shared(),
            options,
            processor: Some(processor),
            worker: None,
            stop: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Borrow the processor while the block is stopped.
    pub fn processor(&self) -> Option<&P> {
        self.processor.as_ref()
    }

    /// Mutably borrow the processor while the block is stopped.
    pub fn processor_mut(&mut self) -> Option<&mut P> {
        self.processor.as_mut()
    }

    /// This block's outbound mailbox.
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn is_started(&self) -> bool {
        self.worker.is_some()
    }

    /// Launch the worker. No-op if already started.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let Some(processor) = self.processor.take() else {
            tracing::error!("Block '{}' cannot start: processor was lost", self.name);
            return;
        };

        self.stop.store(false, Ordering::SeqCst);
        self.finished.store(false, Ordering::SeqCst);

        let worker = Worker {
            processor,
            upstream: self.upstream.clone(),
            mailbox: self.mailbox.clone(),
            options: self.options,
            stop: self.stop.clone(),
            finished: self.finished.clone(),
            counters: self.counters.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                // The closure (and the processor inside it) is gone with the failed spawn.
                tracing::error!("Failed to spawn worker for '{}': {}", self.name, e);
            }
        }
    }

    /// Signal the worker to exit and wait for it. No-op if not started.
    pub fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.stop.store(true, Ordering::SeqCst);
        match handle.join() {
            Ok(processor) => self.processor = Some(processor),
            Err(_) => tracing::error!("Worker for '{}' panicked; stage is unusable", self.name),
        }
        self.finished.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some() && !self.finished.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StageStats {
        StageStats {
            name: self.name.clone(),
            received: self.counters.received.load(Ordering::Relaxed),
            emitted: self.counters.emitted.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
            published: self.mailbox.published_chunks(),
            lost_chunks: self.mailbox.lost_chunks(),
            running: self.is_running(),
        }
    }
}

impl<P: Processor> Stage for Block<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) {
        Block::start(self)
    }

    fn stop(&mut self) {
        Block::stop(self)
    }

    fn is_running(&self) -> bool {
        Block::is_running(self)
    }

    fn stats(&self) -> StageStats {
        Block::stats(self)
    }

    fn output(&self) -> Upstream {
        self.mailbox.clone()
    }
}

impl<P: Processor> Drop for Block<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved into the worker thread.
struct Worker<P: Processor> {
    processor: P,
    upstream: Option<Upstream>,
    mailbox: Upstream,
    options: BlockOptions,
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl<P: Processor> Worker<P> {
    fn run(mut self) -> P {
        let name = self.processor.name().to_string();
        tracing::info!("Stage '{}' started", name);

        while !self.should_stop() {
            let iteration_start = Instant::now();

            let input = match &self.upstream {
                None => Chunk::empty(),
                Some(upstream) => match upstream.retrieve_timeout(self.options.poll_interval) {
                    Some(chunk) => chunk,
                    None => continue,
                },
            };

            let input_was_end = input.is_end();
            self.counters.received.fetch_add(1, Ordering::Relaxed);
            let output = self.processor.process_chunk(input);

            if input_was_end {
                // End is forwarded as-is whatever the transform made of it.
                self.counters.emitted.fetch_add(1, Ordering::Relaxed);
                self.mailbox.publish(Chunk::End);
                tracing::info!("Stage '{}' forwarded end of stream", name);
                break;
            }

            match output {
                Some(chunk) => {
                    let output_is_end = chunk.is_end();
                    self.counters.emitted.fetch_add(1, Ordering::Relaxed);
                    self.mailbox.publish(chunk);
                    if output_is_end {
                        tracing::info!("Stage '{}' produced end of stream", name);
                        break;
                    }
                }
                None => {
                    self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
                }
            }

            self.pace(iteration_start);
        }

        self.finished.store(true, Ordering::SeqCst);
        tracing::info!("Stage '{}' exiting", name);
        self.processor
    }

    #[inline]
    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Sleep out the rest of `min_period`, in slices that keep `stop` responsive.
    fn pace(&self, iteration_start: Instant) {
        let Some(period) = self.options.min_period else {
            return;
        };
        loop {
            let elapsed = iteration_start.elapsed();
            if elapsed >= period || self.should_stop() {
                return;
            }
            std::thread::sleep((period - elapsed).min(self.options.poll_interval));
        }
    }
}
