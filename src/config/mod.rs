//! Configuration module for pipeliner-rs
//!
//! A pipeline is described by a single TOML file:
//!
//! ```toml
//! width = 16
//!
//! [source]
//! kind = "csv"
//! path = "samples.csv"
//!
//! [threshold]
//! level = 128
//! invert = false
//!
//! [resolver]
//! recycle_labels = true
//! report_capacity = 1024
//!
//! [engine]
//! poll_interval_ms = 5
//! source_rate_hz = 0
//! max_runtime_ms = 0
//! ```
//!
//! Every section is optional and falls back to [`Default`].

use crate::error::{PipelinerError, Result, ResultExt};
use crate::pipeline::block::BlockOptions;
use crate::pipeline::bridge::REPORT_CHANNEL_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default row width, matching 16-column sample files
pub const DEFAULT_WIDTH: usize = 16;

/// Default foreground threshold
pub const DEFAULT_THRESHOLD: u8 = 128;

/// Default time a worker waits on its upstream before re-checking for stop
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5;

/// Where raw samples come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Comma-separated `u8` rows
    Csv { path: PathBuf },
    /// Seeded random samples
    Random {
        /// Number of pairs to emit; unbounded when absent
        #[serde(default)]
        pairs: Option<u64>,
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Random {
            pairs: Some(DEFAULT_WIDTH as u64 * 100 / 2),
            seed: None,
        }
    }
}

/// Threshold stage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub level: u8,
    pub invert: bool,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_THRESHOLD,
            invert: false,
        }
    }
}

/// Resolver stage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Return retired labels to the labelling stage
    pub recycle_labels: bool,
    /// Capacity of the component report channel
    pub report_capacity: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            recycle_labels: true,
            report_capacity: REPORT_CHANNEL_CAPACITY,
        }
    }
}

/// Worker loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub poll_interval_ms: u64,
    /// Pace the source at this many pairs per second; 0 runs flat out
    pub source_rate_hz: u32,
    /// Stop waiting for end of stream after this long; 0 waits forever
    pub max_runtime_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            source_rate_hz: 0,
            max_runtime_ms: 0,
        }
    }
}

impl EngineConfig {
    /// Options for interior stages.
    pub fn block_options(&self) -> BlockOptions {
        BlockOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            min_period: None,
        }
    }

    /// Options for the source stage, including pacing.
    pub fn source_options(&self) -> BlockOptions {
        self.block_options().with_rate_hz(self.source_rate_hz)
    }

    pub fn max_runtime(&self) -> Option<Duration> {
        (self.max_runtime_ms > 0).then(|| Duration::from_millis(self.max_runtime_ms))
    }
}

/// Complete pipeline description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Elements per row of the scanned image
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub threshold: ThresholdConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_width() -> usize {
    DEFAULT_WIDTH
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            source: SourceConfig::default(),
            threshold: ThresholdConfig::default(),
            resolver: ResolverConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Reading config {}", path.display()))?;
        let config = Self::from_toml(&content).context(format!("Parsing {}", path.display()))?;
        tracing::info!("Loaded pipeline config from {:?}", path);
        Ok(config)
    }

    /// Parse and validate config text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_toml()?;
        std::fs::write(path, content).with_context(|| format!("Writing {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the values that cannot be caught by deserialization
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(PipelinerError::InvalidWidth(self.width));
        }
        if self.width > u32::MAX as usize {
            return Err(PipelinerError::InvalidWidth(self.width));
        }
        if self.resolver.report_capacity == 0 {
            return Err(PipelinerError::Config(
                "resolver.report_capacity must be at least 1".to_string(),
            ));
        }
        if let SourceConfig::Csv { path } = &self.source {
            if path.as_os_str().is_empty() {
                return Err(PipelinerError::Config("source.path is empty".to_string()));
            }
        }
        Ok(())
    }
}
