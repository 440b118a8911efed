//! Command-line interface for the benchmark harness.

use crate::config::{BenchmarkConfig, DEFAULT_BENCHMARKS, DEFAULT_DB_PATH, parse_benchmark_list};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Workload benchmark harness for key-value storage engines.
///
/// Runs an ordered list of fill, read and maintenance workloads against a
/// fresh database and prints one timing line per workload.
#[derive(Parser, Debug)]
#[command(name = "dbbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Comma-separated list of workloads and directives to run, in order.
    ///
    /// Workloads:
    /// fillseq, fillrandom, overwrite, fillsync, fill100K,
    /// readseq, readreverse, readrandom, compact, heapprofile
    ///
    /// Directives (not timed):
    /// sync, nosync, tenth, normal, fresh
    #[arg(long, default_value = DEFAULT_BENCHMARKS, value_name = "LIST")]
    pub benchmarks: String,

    /// Number of key/value pairs to place in the database.
    #[arg(long, default_value_t = 1_000_000)]
    pub num: u64,

    /// Size of each value in bytes.
    #[arg(long = "value_size", default_value_t = 100)]
    pub value_size: usize,

    /// Target compressed/uncompressed size ratio of generated values.
    #[arg(long = "compression_ratio", default_value_t = 0.5)]
    pub compression_ratio: f64,

    /// Print a latency histogram for each workload (0 or 1).
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub histogram: u8,

    /// Bytes buffered in memory before the engine flushes to disk.
    #[arg(long = "write_buffer_size", default_value_t = 1 << 20)]
    pub write_buffer_size: usize,

    /// Database directory. Destroyed at startup.
    #[arg(long, default_value = DEFAULT_DB_PATH, value_name = "PATH")]
    pub db: PathBuf,

    /// Export results to JSON file.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Verbose output.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    /// Convert CLI arguments into a validated benchmark configuration.
    pub fn into_config(self) -> Result<BenchmarkConfig> {
        let config = BenchmarkConfig {
            benchmarks: parse_benchmark_list(&self.benchmarks),
            num: self.num,
            value_size: self.value_size,
            compression_ratio: self.compression_ratio,
            histogram: self.histogram == 1,
            write_buffer_size: self.write_buffer_size,
            db: self.db,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn test_flags_use_equals_form() {
        let cli = Cli::try_parse_from([
            "dbbench",
            "--benchmarks=fillseq,readseq",
            "--num=500",
            "--value_size=64",
            "--compression_ratio=0.25",
            "--histogram=1",
            "--write_buffer_size=65536",
            "--db=/tmp/somewhere",
        ])
        .unwrap();

        let config = cli.into_config().unwrap();
        assert_eq!(config.benchmarks, vec!["fillseq", "readseq"]);
        assert_eq!(config.num, 500);
        assert_eq!(config.value_size, 64);
        assert!((config.compression_ratio - 0.25).abs() < f64::EPSILON);
        assert!(config.histogram);
        assert_eq!(config.write_buffer_size, 65536);
        assert_eq!(config.db, PathBuf::from("/tmp/somewhere"));
    }

    #[test]
    fn test_defaults() {
        let config = Cli::try_parse_from(["dbbench"]).unwrap().into_config().unwrap();
        assert_eq!(config.num, 1_000_000);
        assert_eq!(config.value_size, 100);
        assert!(!config.histogram);
        assert_eq!(config.write_buffer_size, 1_048_576);
        assert_eq!(config.benchmarks.len(), 12);
    }

    #[test]
    fn test_rejects_unknown_and_malformed_flags() {
        assert!(Cli::try_parse_from(["dbbench", "--bogus=1"]).is_err());
        assert!(Cli::try_parse_from(["dbbench", "--histogram=2"]).is_err());
        assert!(Cli::try_parse_from(["dbbench", "--num=abc"]).is_err());
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let err = Cli::try_parse_from(["dbbench", "--compression_ratio=0"])
            .unwrap()
            .into_config()
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::CompressionRatio(0.0))
        );
    }
}
