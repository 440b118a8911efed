//! Per-operation latency distribution.

#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use hdrhistogram::{CreationError, Histogram};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Significant figures kept by the underlying HDR histogram.
const SIGNIFICANT_FIGURES: u8 = 3;

/// Width of the `#` bar drawn for a bucket holding every sample.
const BAR_WIDTH: f64 = 20.0;

/// Microsecond latency samples for one workload.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    inner: Histogram<u64>,
}

/// Headline numbers of a [`LatencyHistogram`], for export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub mean_micros: f64,
    pub std_dev_micros: f64,
    pub min_micros: u64,
    pub max_micros: u64,
    pub p50_micros: u64,
    pub p75_micros: u64,
    pub p99_micros: u64,
    pub p999_micros: u64,
}

impl LatencyHistogram {
    pub fn new() -> Result<Self, CreationError> {
        Ok(Self {
            inner: Histogram::new(SIGNIFICANT_FIGURES)?,
        })
    }

    pub fn record(&mut self, micros: u64) {
        self.inner.saturating_record(micros);
    }

    pub fn clear(&mut self) {
        self.inner.reset();
    }

    pub fn count(&self) -> u64 {
        self.inner.len()
    }

    pub fn percentile(&self, p: f64) -> u64 {
        self.inner.value_at_percentile(p)
    }

    pub fn summary(&self) -> HistogramSummary {
        HistogramSummary {
            count: self.inner.len(),
            mean_micros: self.inner.mean(),
            std_dev_micros: self.inner.stdev(),
            min_micros: self.inner.min(),
            max_micros: self.inner.max(),
            p50_micros: self.percentile(50.0),
            p75_micros: self.percentile(75.0),
            p99_micros: self.percentile(99.0),
            p999_micros: self.percentile(99.9),
        }
    }

    /// Sample counts grouped into power-of-two buckets `[lo, hi)`.
    fn buckets(&self) -> BTreeMap<u32, u64> {
        let mut buckets = BTreeMap::new();
        for value in self.inner.iter_recorded() {
            let bucket = u64::BITS - value.value_iterated_to().leading_zeros();
            *buckets.entry(bucket).or_insert(0) += value.count_at_value();
        }
        buckets
    }
}

fn bucket_bounds(bucket: u32) -> (u64, u64) {
    match bucket {
        0 => (0, 1),
        b if b >= u64::BITS => (1 << (u64::BITS - 1), u64::MAX),
        b => (1 << (b - 1), 1 << b),
    }
}

impl fmt::Display for LatencyHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.summary();
        writeln!(
            f,
            "Count: {}  Average: {:.4}  StdDev: {:.2}",
            s.count, s.mean_micros, s.std_dev_micros
        )?;
        if s.count == 0 {
            return Ok(());
        }
        writeln!(
            f,
            "Min: {}  Median: {}  Max: {}",
            s.min_micros, s.p50_micros, s.max_micros
        )?;
        writeln!(
            f,
            "Percentiles: P50: {} P75: {} P99: {} P99.9: {}",
            s.p50_micros, s.p75_micros, s.p99_micros, s.p999_micros
        )?;
        writeln!(f, "{}", "-".repeat(54))?;

        let total = s.count as f64;
        let mut cumulative = 0;
        for (bucket, count) in self.buckets() {
            let (lo, hi) = bucket_bounds(bucket);
            cumulative += count;
            let pct = count as f64 * 100.0 / total;
            let marks = (BAR_WIDTH * count as f64 / total).round() as usize;
            writeln!(
                f,
                "[ {:>7}, {:>7} ) {:>7} {:>7.3}% {:>7.3}% {}",
                lo,
                hi,
                count,
                pct,
                cumulative as f64 * 100.0 / total,
                "#".repeat(marks)
            )?;
        }
        Ok(())
    }
}
