//! Benchmark orchestration.

use crate::bench::workloads::{self, KeyOrder, WriteParams};
use crate::bench::{Directive, LARGE_VALUE_SIZE, Recorder, Step, Workload};
use crate::config::BenchmarkConfig;
use crate::generator::RandomGenerator;
use crate::results::{BenchmarkPrinter, WorkloadReport};
use anyhow::{Context, Result};
use dbbench_engine::{Env, Options, StorageEngine, WriteOptions};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// Seed of the key-choice random source.
const KEY_SEED: u64 = 301;

/// Prefix of heap profile dumps left in the database directory.
const HEAP_PREFIX: &str = "heap-";

/// Runs the configured operation list against one database.
///
/// The database is opened once before the first workload and reopened only
/// when a workload needs an empty database.
pub struct BenchmarkRunner<'a, E: StorageEngine> {
    config: &'a BenchmarkConfig,
    engine: E,
    env: Arc<dyn Env>,
    printer: BenchmarkPrinter,
    db: Option<E::Handle>,
    generator: RandomGenerator,
    rng: ChaCha8Rng,
    recorder: Recorder,
    /// Current entry count, rescaled by `tenth` and `normal`.
    num: u64,
    sync: bool,
    fresh_pending: bool,
    heap_counter: u32,
}

impl<'a, E: StorageEngine> BenchmarkRunner<'a, E> {
    /// Create a runner, removing stale heap profiles and any existing
    /// database at `config.db`.
    pub fn new(config: &'a BenchmarkConfig, engine: E, env: Arc<dyn Env>) -> Result<Self> {
        let recorder = Recorder::new(Arc::clone(&env), config.histogram)?;
        let runner = Self {
            config,
            engine,
            env,
            printer: BenchmarkPrinter::new(),
            db: None,
            generator: RandomGenerator::new(config.compression_ratio),
            rng: ChaCha8Rng::seed_from_u64(KEY_SEED),
            recorder,
            num: config.num,
            sync: false,
            fresh_pending: false,
            heap_counter: 0,
        };

        runner.remove_heap_profiles();
        runner
            .engine
            .destroy(&config.db)
            .with_context(|| format!("destroy error: {}", config.db.display()))?;
        Ok(runner)
    }

    /// The open database, once `run` has started.
    pub fn db(&self) -> Option<&E::Handle> {
        self.db.as_ref()
    }

    fn remove_heap_profiles(&self) {
        let names = match self.env.get_children(&self.config.db) {
            Ok(names) => names,
            Err(e) => {
                tracing::debug!("Nothing to clean up: {}", e);
                return;
            }
        };
        for name in names.iter().filter(|n| n.starts_with(HEAP_PREFIX)) {
            let path = self.config.db.join(name);
            if let Err(e) = self.env.delete_file(&path) {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }

    fn open(&self) -> Result<E::Handle> {
        let options = Options {
            create_if_missing: true,
            write_buffer_size: self.config.write_buffer_size,
            ..Options::default()
        };
        self.engine
            .open(&self.config.db, &options)
            .with_context(|| format!("open error: {}", self.config.db.display()))
    }

    /// Close, destroy and reopen the database.
    fn reopen_fresh(&mut self) -> Result<()> {
        self.db = None;
        self.engine
            .destroy(&self.config.db)
            .with_context(|| format!("destroy error: {}", self.config.db.display()))?;
        self.db = Some(self.open()?);
        Ok(())
    }

    /// Print the environment lines and configuration banner.
    pub fn print_header(&self) {
        self.printer.print_header(self.config);
    }

    /// Run every step of the operation list, in order.
    ///
    /// Unknown names are logged and skipped; engine failures end the run.
    pub fn run(&mut self) -> Result<Vec<WorkloadReport>> {
        if self.db.is_none() {
            self.db = Some(self.open()?);
        }

        let mut reports = Vec::new();
        let config = self.config;
        for name in &config.benchmarks {
            if name.is_empty() {
                continue;
            }
            match name.parse::<Step>() {
                Ok(Step::Directive(directive)) => self.apply(directive),
                Ok(Step::Workload(workload)) => {
                    let report = self.run_workload(workload)?;
                    self.printer.print_report(&report);
                    reports.push(report);
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }
        Ok(reports)
    }

    fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::Sync => self.sync = true,
            Directive::NoSync => self.sync = false,
            Directive::Tenth => self.num = (self.num / 10).max(1),
            Directive::Normal => self.num = self.config.num,
            Directive::Fresh => self.fresh_pending = true,
        }
        tracing::info!(
            "Directive {:?}: num={} sync={} fresh={}",
            directive,
            self.num,
            self.sync,
            self.fresh_pending
        );
    }

    /// Time one workload and return its report.
    pub fn run_workload(&mut self, workload: Workload) -> Result<WorkloadReport> {
        let fresh = workload.needs_fresh_db() | std::mem::take(&mut self.fresh_pending);
        self.recorder.start();
        if fresh {
            self.reopen_fresh()?;
            self.recorder.start();
        }

        let options = if workload == Workload::FillSync || self.sync {
            WriteOptions::SYNC
        } else {
            WriteOptions::ASYNC
        };

        let Some(db) = self.db.as_mut() else {
            anyhow::bail!("database is not open");
        };
        match workload {
            Workload::FillSeq
            | Workload::FillRandom
            | Workload::Overwrite
            | Workload::FillSync
            | Workload::Fill100K => {
                let value_size = self.config.value_size;
                let (order, entries, value_size) = match workload {
                    Workload::FillSeq => (KeyOrder::Sequential, self.num, value_size),
                    Workload::FillSync => (KeyOrder::Random, self.num / 100, value_size),
                    Workload::Fill100K => (KeyOrder::Random, self.num / 1000, LARGE_VALUE_SIZE),
                    _ => (KeyOrder::Random, self.num, value_size),
                };
                let params = WriteParams {
                    order,
                    entries,
                    num: self.num,
                    key_space: self.config.num,
                    value_size,
                    options,
                };
                workloads::write(
                    db,
                    &mut self.generator,
                    &mut self.rng,
                    &mut self.recorder,
                    &params,
                )?;
            }
            Workload::ReadSeq => workloads::read_sequential(db, &mut self.recorder, self.num),
            Workload::ReadReverse => workloads::read_reverse(db, &mut self.recorder, self.num),
            Workload::ReadRandom => workloads::read_random(
                db,
                &mut self.rng,
                &mut self.recorder,
                self.num,
                self.config.num,
            )?,
            Workload::Compact => {
                if let Some(level) = workloads::compact(db)? {
                    tracing::debug!("Compacted levels 0..={}", level);
                }
            }
            Workload::HeapProfile => {
                self.heap_counter += 1;
                workloads::heap_profile(
                    self.env.as_ref(),
                    &self.config.db,
                    self.heap_counter,
                    &mut self.recorder,
                );
            }
        }

        Ok(self.recorder.stop(workload.name()))
    }
}
