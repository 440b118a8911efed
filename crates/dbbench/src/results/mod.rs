//! Workload reports: the fixed-width report line, histograms and JSON export.

pub mod histogram;
pub mod printer;

pub use histogram::{HistogramSummary, LatencyHistogram};
pub use printer::BenchmarkPrinter;

use crate::config::BenchmarkConfig;
use serde::Serialize;
use std::path::Path;

/// Measurements of one completed workload, produced by `Recorder::stop`.
#[derive(Debug, Clone)]
pub struct WorkloadReport {
    pub name: String,
    /// Completed operations, floored to 1.
    pub ops: u64,
    pub bytes: u64,
    pub elapsed_micros: u64,
    pub micros_per_op: f64,
    /// Throughput, present only when the workload counted bytes.
    pub mb_per_sec: Option<f64>,
    /// Status message, prefixed with the throughput figure when there is one.
    pub message: String,
    pub histogram: Option<LatencyHistogram>,
}

impl WorkloadReport {
    /// The `name : micros/op; message` line.
    pub fn line(&self) -> String {
        format!(
            "{:<12} : {:>11.3} micros/op;{}{}",
            self.name,
            self.micros_per_op,
            if self.message.is_empty() { "" } else { " " },
            self.message
        )
    }
}

/// JSON-serializable benchmark report
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub metadata: ReportMetadata,
    pub results: Vec<WorkloadReportJson>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub platform: String,
    pub dbbench_version: String,
    pub engine_version: String,
    pub num: u64,
    pub value_size: usize,
    pub compression_ratio: f64,
    pub write_buffer_size: usize,
    pub histogram: bool,
}

/// JSON-serializable workload result
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReportJson {
    pub name: String,
    pub ops: u64,
    pub bytes: u64,
    pub elapsed_micros: u64,
    pub micros_per_op: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mb_per_sec: Option<f64>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<HistogramSummary>,
}

impl From<&WorkloadReport> for WorkloadReportJson {
    fn from(report: &WorkloadReport) -> Self {
        Self {
            name: report.name.clone(),
            ops: report.ops,
            bytes: report.bytes,
            elapsed_micros: report.elapsed_micros,
            micros_per_op: report.micros_per_op,
            mb_per_sec: report.mb_per_sec,
            message: report.message.clone(),
            latency: report.histogram.as_ref().map(LatencyHistogram::summary),
        }
    }
}

/// Export results to JSON file
pub fn export_json(
    reports: &[WorkloadReport],
    config: &BenchmarkConfig,
    path: &Path,
) -> anyhow::Result<()> {
    let report = BenchmarkReport {
        metadata: ReportMetadata {
            timestamp: chrono::Utc::now().to_rfc3339(),
            platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            dbbench_version: env!("CARGO_PKG_VERSION").to_string(),
            engine_version: dbbench_engine::VERSION.to_string(),
            num: config.num,
            value_size: config.value_size,
            compression_ratio: config.compression_ratio,
            write_buffer_size: config.write_buffer_size,
            histogram: config.histogram,
        },
        results: reports.iter().map(WorkloadReportJson::from).collect(),
    };

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report(name: &str, message: &str) -> WorkloadReport {
        WorkloadReport {
            name: name.to_string(),
            ops: 1000,
            bytes: 0,
            elapsed_micros: 2500,
            micros_per_op: 2.5,
            mb_per_sec: None,
            message: message.to_string(),
            histogram: None,
        }
    }

    #[test]
    fn test_report_line_format() {
        assert_eq!(
            report("readrandom", "").line(),
            "readrandom   :       2.500 micros/op;"
        );
        assert_eq!(
            report("fillseq", " 12.3 MB/s").line(),
            "fillseq      :       2.500 micros/op;  12.3 MB/s"
        );
    }

    #[test]
    fn test_export_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");

        let mut with_hist = report("fillseq", "(10 ops)");
        let mut hist = LatencyHistogram::new().unwrap();
        hist.record(7);
        with_hist.histogram = Some(hist);
        with_hist.mb_per_sec = Some(1.5);

        export_json(&[with_hist, report("compact", "")], &BenchmarkConfig::default(), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["metadata"]["num"], 1_000_000);
        assert_eq!(value["results"][0]["name"], "fillseq");
        assert_eq!(value["results"][0]["latency"]["count"], 1);
        assert_eq!(value["results"][0]["mb_per_sec"], 1.5);
        assert!(value["results"][1].get("latency").is_none());
        assert!(value["results"][1].get("mb_per_sec").is_none());
    }
}
