//! Run header and per-workload report output.

#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use crate::bench::KEY_SIZE;
use crate::config::BenchmarkConfig;
use crate::results::WorkloadReport;
use std::fmt::Write as _;

const MB: f64 = 1_048_576.0;

/// CPU description gathered from `/proc/cpuinfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuInfo {
    pub count: usize,
    pub model: String,
    pub cache_size: String,
}

impl CpuInfo {
    /// Parse the `model name` and `cache size` fields; one `model name` per CPU.
    pub fn parse(cpuinfo: &str) -> Option<Self> {
        let mut info = Self::default();
        for line in cpuinfo.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            match key.trim() {
                "model name" => {
                    info.count += 1;
                    info.model = value.trim().to_string();
                }
                "cache size" => info.cache_size = value.trim().to_string(),
                _ => {}
            }
        }
        (info.count > 0).then_some(info)
    }

    fn detect() -> Option<Self> {
        let text = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        Self::parse(&text)
    }
}

/// Prints the run header and workload reports.
pub struct BenchmarkPrinter;

impl BenchmarkPrinter {
    pub fn new() -> Self {
        Self
    }

    /// Engine version, date and CPU lines, written to stderr.
    pub fn print_environment(&self) {
        eprintln!("Engine:     dbbench-engine {}", dbbench_engine::VERSION);
        eprintln!(
            "Date:       {}",
            chrono::Local::now().format("%a %b %e %H:%M:%S %Y")
        );
        if let Some(cpu) = CpuInfo::detect() {
            eprintln!("CPU:        {} * {}", cpu.count, cpu.model);
            eprintln!("CPUCache:   {}", cpu.cache_size);
        }
    }

    /// Print the environment lines and the configuration banner.
    pub fn print_header(&self, config: &BenchmarkConfig) {
        self.print_environment();
        print!("{}", header(config));
    }

    /// Print the report line and, when collected, the latency histogram.
    pub fn print_report(&self, report: &WorkloadReport) {
        println!("{}", report.line());
        if let Some(histogram) = &report.histogram {
            println!("Microseconds per op:\n{histogram}");
        }
    }
}

impl Default for BenchmarkPrinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration banner: key/value sizes, estimated raw and compressed
/// sizes, build warnings and a separator.
pub fn header(config: &BenchmarkConfig) -> String {
    let num = config.num as f64;
    let value_size = config.value_size as f64;
    let compressed = (value_size * config.compression_ratio).round() as u64;

    let mut out = String::new();
    let _ = writeln!(out, "Keys:       {KEY_SIZE} bytes each");
    let _ = writeln!(
        out,
        "Values:     {} bytes each ({compressed} bytes after compression)",
        config.value_size
    );
    let _ = writeln!(out, "Entries:    {}", config.num);
    let _ = writeln!(
        out,
        "RawSize:    {:.1} MB (estimated)",
        (KEY_SIZE as f64 + value_size) * num / MB
    );
    let _ = writeln!(
        out,
        "FileSize:   {:.1} MB (estimated)",
        (KEY_SIZE as f64 + value_size * config.compression_ratio) * num / MB
    );
    if cfg!(debug_assertions) {
        let _ = writeln!(out, "WARNING: Optimization is disabled: benchmarks unnecessarily slow");
        let _ = writeln!(out, "WARNING: Assertions are enabled; benchmarks unnecessarily slow");
    }
    let _ = writeln!(out, "{}", "-".repeat(48));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_sizes() {
        let config = BenchmarkConfig {
            num: 1_000_000,
            value_size: 100,
            compression_ratio: 0.5,
            ..Default::default()
        };
        let text = header(&config);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Keys:       16 bytes each");
        assert_eq!(lines[1], "Values:     100 bytes each (50 bytes after compression)");
        assert_eq!(lines[2], "Entries:    1000000");
        assert_eq!(lines[3], "RawSize:    110.6 MB (estimated)");
        assert_eq!(lines[4], "FileSize:   62.9 MB (estimated)");
        assert_eq!(*lines.last().unwrap(), "-".repeat(48));
    }

    #[test]
    fn test_cpuinfo_parse() {
        let text = "processor\t: 0\nmodel name\t: Example CPU @ 3.00GHz\ncache size\t: 8192 KB\n\n\
                    processor\t: 1\nmodel name\t: Example CPU @ 3.00GHz\ncache size\t: 8192 KB\n";
        let info = CpuInfo::parse(text).unwrap();
        assert_eq!(info.count, 2);
        assert_eq!(info.model, "Example CPU @ 3.00GHz");
        assert_eq!(info.cache_size, "8192 KB");

        assert_eq!(CpuInfo::parse("flags: fpu\n"), None);
    }
}
