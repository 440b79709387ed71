//! Integration tests for pipeline start/stop and mailbox backpressure

mod common;

use pipeliner_rs::config::PipelineConfig;
use pipeliner_rs::pipeline::nodes::{GridSource, RandomSource};
use pipeliner_rs::pipeline::{BlockOptions, Chunk, Pipeline, PipelineBuilder, Processor, StageId};
use pipeliner_rs::types::RawPair;
use std::thread;
use std::time::Duration;

/// Emits `remaining` raw pairs as fast as it is polled, then End.
struct Burst {
    remaining: u32,
}

impl Processor for Burst {
    fn name(&self) -> &str {
        "Burst"
    }

    fn process_chunk(&mut self, _chunk: Chunk) -> Option<Chunk> {
        if self.remaining == 0 {
            return Some(Chunk::End);
        }
        self.remaining -= 1;
        Some(Chunk::raw(RawPair::default()))
    }
}

/// Forwards everything after sleeping.
struct Slow(Duration);

impl Processor for Slow {
    fn name(&self) -> &str {
        "Slow"
    }

    fn process_chunk(&mut self, chunk: Chunk) -> Option<Chunk> {
        thread::sleep(self.0);
        Some(chunk)
    }
}

struct Passthrough;

impl Processor for Passthrough {
    fn name(&self) -> &str {
        "Passthrough"
    }

    fn process_chunk(&mut self, chunk: Chunk) -> Option<Chunk> {
        Some(chunk)
    }
}

#[test]
fn test_end_reaches_tail_of_long_chain() {
    let mut pipeline = Pipeline::new();
    pipeline.append(Burst { remaining: 10 }, BlockOptions::default());
    for _ in 0..6 {
        pipeline.append(Passthrough, BlockOptions::default());
    }
    let tail = pipeline.tail().unwrap();

    pipeline.start();
    common::wait_for_end(&tail, common::test_timeout());
    pipeline.stop();

    assert!(!pipeline.is_running());
    for stats in pipeline.stats() {
        assert!(stats.emitted >= 1, "stage {} emitted nothing", stats.name);
    }
}

#[test]
fn test_fast_producer_overwrites_slow_consumer() {
    let mut pipeline = Pipeline::new();
    let source = pipeline.append(Burst { remaining: 2_000 }, BlockOptions::default());
    pipeline.append(Slow(Duration::from_millis(2)), BlockOptions::default());
    let tail = pipeline.tail().unwrap();

    pipeline.start();
    common::wait_for_end(&tail, common::test_timeout());
    pipeline.stop();

    let stats = pipeline.stats();
    let source_stats = &stats[source.index()];
    assert_eq!(source_stats.published, 2_001);
    assert!(source_stats.lost_chunks > 0);
    // Every published chunk was either consumed or overwritten.
    assert_eq!(source_stats.published - source_stats.lost_chunks, stats[1].received);
    assert!(source_stats.loss_rate() > 0.0);
}

#[test]
fn test_stop_leaves_mailboxes_quiet() {
    let mut pipeline = Pipeline::new();
    pipeline.append(RandomSource::new(Some(1), None), BlockOptions::default());
    pipeline.append(Passthrough, BlockOptions::default());

    pipeline.start();
    thread::sleep(Duration::from_millis(20));
    assert!(pipeline.is_running());
    pipeline.stop();
    assert!(!pipeline.is_running());

    let published: Vec<_> = pipeline.stats().iter().map(|s| s.published).collect();
    assert!(published[0] > 0);
    thread::sleep(Duration::from_millis(30));
    let after: Vec<_> = pipeline.stats().iter().map(|s| s.published).collect();
    assert_eq!(published, after);
}

#[test]
fn test_stop_twice_and_restart() {
    let mut pipeline = Pipeline::new();
    pipeline.append(GridSource::new(vec![255; 8]), BlockOptions::default());
    pipeline.append(Passthrough, BlockOptions::default());

    pipeline.stop();
    pipeline.start();
    pipeline.stop();
    pipeline.stop();
    assert!(!pipeline.is_running());

    // The source resumes from where it was stopped and still ends the stream.
    let tail = pipeline.output(StageId(1)).unwrap();
    pipeline.start();
    common::wait_for_end(&tail, common::test_timeout());
    pipeline.stop();
}

#[test]
fn test_runtime_limit_stops_unbounded_source() {
    let mut config = PipelineConfig::default();
    config.engine.max_runtime_ms = 50;
    let (mut pipeline, bridge, _ids) = PipelineBuilder::new(config)
        .build_with_source(RandomSource::new(Some(3), None))
        .unwrap();

    let report = pipeline.run_until_end(&bridge, Some(Duration::from_millis(50)));
    assert!(!report.completed);
    assert!(report.summary.is_none());
    assert!(!pipeline.is_running());
    assert!(report.stages[0].published > 0);
}

#[test]
fn test_report_serializes_to_json() {
    let config = PipelineConfig {
        width: 2,
        ..PipelineConfig::default()
    };
    let (mut pipeline, bridge, _ids) = PipelineBuilder::new(config)
        .build_with_source(GridSource::new(vec![255, 0, 0, 0]))
        .unwrap();

    let report = pipeline.run_until_end(&bridge, Some(common::test_timeout()));
    assert!(report.completed);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["completed"], true);
    assert_eq!(json["stages"].as_array().unwrap().len(), 4);
    assert_eq!(json["stages"][2]["name"], "Labelling");
}
