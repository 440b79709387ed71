//! # Pipeliner-RS: Streaming Connected-Component Labelling
//!
//! A multi-threaded pipeline that scans a 2-D grid of `u8` samples in raster
//! order, two elements at a time, and finds its 8-connected foreground
//! components in a single pass with bounded memory.
//!
//! ## Architecture
//!
//! - **Blocks**: one worker thread per stage, linked by single-slot mailboxes
//! - **Labelling**: two row buffers and a recyclable label pool
//! - **Resolver**: union-find over provisional labels; retires finished
//!   components and returns their labels to the pool
//! - **Reports**: completed components leave through a crossbeam channel
//!
//! ## Example
//!
//! ```ignore
//! use pipeliner_rs::{PipelineBuilder, PipelineConfig};
//!
//! fn main() -> pipeliner_rs::Result<()> {
//!     let config = PipelineConfig::load("pipeline.toml")?;
//!     let max_runtime = config.engine.max_runtime();
//!     let (mut pipeline, bridge, _ids) = PipelineBuilder::new(config).build()?;
//!
//!     let report = pipeline.run_until_end(&bridge, max_runtime);
//!     for component in &report.components {
//!         println!("{:?}", component);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use config::{PipelineConfig, SourceConfig};
pub use error::{PipelinerError, Result};
pub use pipeline::{Pipeline, PipelineBridge, PipelineBuilder, RunReport};
pub use types::{Component, Label, Position, StageStats};
