//! Benchmark configuration.

use crate::generator::BUFFER_SIZE;
use std::path::PathBuf;
use thiserror::Error;

/// Workloads run when `--benchmarks` is not given.
pub const DEFAULT_BENCHMARKS: &str = "fillseq,fillrandom,overwrite,fillsync,readseq,readreverse,\
                                      readrandom,compact,readseq,readreverse,readrandom,fill100K";

/// Default database directory.
pub const DEFAULT_DB_PATH: &str = "/tmp/dbbench";

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("--num must be positive")]
    ZeroEntries,

    #[error("--value_size must be positive")]
    ZeroValueSize,

    #[error("--value_size={value_size} exceeds the {max} byte value generator buffer")]
    ValueSizeTooLarge { value_size: usize, max: usize },

    #[error("--compression_ratio={0} is outside (0, 1]")]
    CompressionRatio(f64),

    #[error("--write_buffer_size must be positive")]
    ZeroWriteBuffer,
}

/// Immutable settings for one benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Workload names and directives, in execution order.
    pub benchmarks: Vec<String>,
    /// Number of key/value pairs per workload.
    pub num: u64,
    /// Size of each generated value, in bytes.
    pub value_size: usize,
    /// Target compressed/uncompressed ratio of generated values.
    pub compression_ratio: f64,
    /// Record and print per-operation latency distributions.
    pub histogram: bool,
    /// Engine write buffer size, in bytes.
    pub write_buffer_size: usize,
    /// Database directory.
    pub db: PathBuf,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            benchmarks: parse_benchmark_list(DEFAULT_BENCHMARKS),
            num: 1_000_000,
            value_size: 100,
            compression_ratio: 0.5,
            histogram: false,
            write_buffer_size: 1 << 20,
            db: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

impl BenchmarkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num == 0 {
            return Err(ConfigError::ZeroEntries);
        }
        if self.value_size == 0 {
            return Err(ConfigError::ZeroValueSize);
        }
        if self.value_size > BUFFER_SIZE {
            return Err(ConfigError::ValueSizeTooLarge {
                value_size: self.value_size,
                max: BUFFER_SIZE,
            });
        }
        if !(self.compression_ratio > 0.0 && self.compression_ratio <= 1.0) {
            return Err(ConfigError::CompressionRatio(self.compression_ratio));
        }
        if self.write_buffer_size == 0 {
            return Err(ConfigError::ZeroWriteBuffer);
        }
        Ok(())
    }
}

/// Split a comma-separated operation list. Names are kept verbatim, including
/// empty segments, so the runner sees exactly what was requested.
pub fn parse_benchmark_list(list: &str) -> Vec<String> {
    list.split(',').map(str::to_string).collect()
}
