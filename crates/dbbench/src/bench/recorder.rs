//! Per-workload measurement: elapsed time, bytes, completed operations and
//! progress output.

#![allow(clippy::cast_precision_loss)]

use crate::results::{LatencyHistogram, WorkloadReport};
use dbbench_engine::Env;
use std::io::Write;
use std::sync::Arc;

/// First progress report threshold after `start`.
const FIRST_REPORT: u64 = 100;

/// Single operations slower than this are reported.
const LONG_OP_MICROS: u64 = 20_000;

/// Next progress threshold once `current` has been reached.
fn next_report_after(current: u64) -> u64 {
    let step = match current {
        0..1_000 => 100,
        1_000..10_000 => 1_000,
        10_000..100_000 => 10_000,
        _ => 100_000,
    };
    current + step
}

/// Run state of the workload in progress.
pub struct Recorder {
    env: Arc<dyn Env>,
    histogram: Option<LatencyHistogram>,
    start: u64,
    last_op_finish: u64,
    bytes: u64,
    done: u64,
    next_report: u64,
    message: String,
}

impl Recorder {
    /// `histogram` enables per-operation latency collection.
    pub fn new(env: Arc<dyn Env>, histogram: bool) -> anyhow::Result<Self> {
        let histogram = if histogram {
            Some(LatencyHistogram::new()?)
        } else {
            None
        };
        let now = env.now_micros();
        Ok(Self {
            env,
            histogram,
            start: now,
            last_op_finish: now,
            bytes: 0,
            done: 0,
            next_report: FIRST_REPORT,
            message: String::new(),
        })
    }

    /// Reset every counter and start the clock.
    pub fn start(&mut self) {
        self.start = self.env.now_micros();
        self.last_op_finish = self.start;
        self.bytes = 0;
        self.done = 0;
        self.next_report = FIRST_REPORT;
        self.message.clear();
        if let Some(histogram) = &mut self.histogram {
            histogram.clear();
        }
    }

    /// Count one completed operation.
    pub fn finished_single_op(&mut self) {
        if let Some(histogram) = &mut self.histogram {
            let now = self.env.now_micros();
            let micros = now.saturating_sub(self.last_op_finish);
            histogram.record(micros);
            if micros > LONG_OP_MICROS {
                tracing::warn!("long op: {:.1} micros", micros as f64);
            }
            self.last_op_finish = now;
        }

        self.done += 1;
        if self.done >= self.next_report {
            self.next_report = next_report_after(self.next_report);
            // Progress output is best-effort.
            let mut stderr = std::io::stderr().lock();
            let _ = write!(stderr, "... finished {} ops{:30}\r", self.done, "");
            let _ = stderr.flush();
        }
    }

    pub fn add_bytes(&mut self, bytes: u64) {
        self.bytes += bytes;
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn done(&self) -> u64 {
        self.done
    }

    pub fn next_report(&self) -> u64 {
        self.next_report
    }

    /// Stop the clock and summarize the workload as `name`.
    pub fn stop(&mut self, name: &str) -> WorkloadReport {
        let finish = self.env.now_micros();
        let elapsed_micros = finish.saturating_sub(self.start);
        let ops = self.done.max(1);

        let mut message = std::mem::take(&mut self.message);
        let mb_per_sec = (self.bytes > 0).then(|| {
            let secs = elapsed_micros.max(1) as f64 / 1e6;
            (self.bytes as f64 / 1_048_576.0) / secs
        });
        if let Some(rate) = mb_per_sec {
            let rate = format!("{rate:5.1} MB/s");
            message = if message.is_empty() {
                rate
            } else {
                format!("{rate} {message}")
            };
        }

        WorkloadReport {
            name: name.to_string(),
            ops,
            bytes: self.bytes,
            elapsed_micros,
            micros_per_op: elapsed_micros as f64 / ops as f64,
            mb_per_sec,
            message,
            histogram: self.histogram.clone(),
        }
    }
}
