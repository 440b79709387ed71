//! Source nodes: produce raw byte pairs at the head of the pipeline.
//!
//! Sources have no upstream; the engine feeds them an empty chunk every tick.
//! Each emits `Raw` pairs in row-major order and then `End` once its input
//! is exhausted. An odd trailing sample is padded with `0`.
//!
//! - [`CsvSource`] - Comma-separated rows of `u8` samples
//! - [`RandomSource`] - Seeded random samples, optionally bounded
//! - [`GridSource`] - An in-memory sample buffer

use crate::error::{PipelinerError, Result, ResultExt};
use crate::pipeline::block::Processor;
use crate::pipeline::chunk::Chunk;
use crate::types::RawPair;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Reads `u8` samples from comma-separated text.
pub struct CsvSource<R> {
    reader: R,
    pending: VecDeque<u8>,
    line_no: usize,
    skipped_tokens: u64,
    exhausted: bool,
}

impl CsvSource<BufReader<File>> {
    /// Open a CSV file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Opening {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> CsvSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: VecDeque::new(),
            line_no: 0,
            skipped_tokens: 0,
            exhausted: false,
        }
    }

    /// Tokens that were not valid `u8` values and got skipped.
    pub fn skipped_tokens(&self) -> u64 {
        self.skipped_tokens
    }

    /// Read lines until at least two samples are pending or input ends.
    fn fill(&mut self) {
        let mut line = String::new();
        while self.pending.len() < 2 && !self.exhausted {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => self.exhausted = true,
                Ok(_) => {
                    self.line_no += 1;
                    self.parse_line(&line);
                }
                Err(e) => {
                    tracing::error!("CSV read failed after line {}: {}", self.line_no, e);
                    self.exhausted = true;
                }
            }
        }
    }

    fn parse_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        for token in line.split(',') {
            let token = token.trim();
            match token.parse::<u8>() {
                Ok(v) => self.pending.push_back(v),
                Err(_) => {
                    self.skipped_tokens += 1;
                    tracing::warn!("Skipping non-sample token {:?} on line {}", token, self.line_no);
                }
            }
        }
    }

    /// Next pair, or `None` at end of input.
    pub fn next_pair(&mut self) -> Option<RawPair> {
        self.fill();
        let data1 = self.pending.pop_front()?;
        let data2 = self.pending.pop_front().unwrap_or(0);
        Some(RawPair { data1, data2 })
    }
}

impl<R: BufRead + Send + 'static> Processor for CsvSource<R> {
    fn name(&self) -> &str {
        "CsvSource"
    }

    fn process_chunk(&mut self, _chunk: Chunk) -> Option<Chunk> {
        Some(self.next_pair().map(Chunk::raw).unwrap_or(Chunk::End))
    }
}

/// Number of samples on the first non-empty line of a CSV file.
pub fn detect_csv_width(path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Opening {}", path.display()))?;
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let width = line
            .split(',')
            .filter(|t| t.trim().parse::<u8>().is_ok())
            .count();
        if width == 0 {
            return Err(PipelinerError::Csv {
                line: idx + 1,
                message: "first row holds no samples".to_string(),
            });
        }
        return Ok(width);
    }
    Err(PipelinerError::Csv {
        line: 0,
        message: "file is empty".to_string(),
    })
}

/// Uniformly random samples.
pub struct RandomSource {
    rng: StdRng,
    /// Stop after this many pairs. `None` runs forever.
    limit: Option<u64>,
    emitted: u64,
}

impl RandomSource {
    pub fn new(seed: Option<u64>, limit: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            limit,
            emitted: 0,
        }
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn next_pair(&mut self) -> Option<RawPair> {
        if self.limit.is_some_and(|limit| self.emitted >= limit) {
            return None;
        }
        self.emitted += 1;
        Some(RawPair {
            data1: self.rng.random(),
            data2: self.rng.random(),
        })
    }
}

impl Processor for RandomSource {
    fn name(&self) -> &str {
        "RandomSource"
    }

    fn process_chunk(&mut self, _chunk: Chunk) -> Option<Chunk> {
        Some(self.next_pair().map(Chunk::raw).unwrap_or(Chunk::End))
    }
}

/// Replays an in-memory sample buffer.
#[derive(Debug, Clone)]
pub struct GridSource {
    samples: Vec<u8>,
    cursor: usize,
}

impl GridSource {
    pub fn new(samples: Vec<u8>) -> Self {
        Self { samples, cursor: 0 }
    }

    /// Build from foreground flags: `true` becomes `255`, `false` becomes `0`.
    pub fn from_mask(mask: &[bool]) -> Self {
        Self::new(mask.iter().map(|&b| if b { u8::MAX } else { 0 }).collect())
    }

    pub fn next_pair(&mut self) -> Option<RawPair> {
        let data1 = *self.samples.get(self.cursor)?;
        let data2 = self.samples.get(self.cursor + 1).copied().unwrap_or(0);
        self.cursor += 2;
        Some(RawPair { data1, data2 })
    }
}

impl Processor for GridSource {
    fn name(&self) -> &str {
        "GridSource"
    }

    fn process_chunk(&mut self, _chunk: Chunk) -> Option<Chunk> {
        Some(self.next_pair().map(Chunk::raw).unwrap_or(Chunk::End))
    }
}
