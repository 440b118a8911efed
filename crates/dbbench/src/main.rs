//! dbbench - workload benchmark harness for key-value storage engines.

// Use mimalloc for reduced allocation latency (enabled by default).
// Disable with `--no-default-features` if debugging allocator issues.
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use dbbench::{bench::BenchmarkRunner, cli::Cli, results::export_json};
use dbbench_engine::{Env, LsmEngine, PosixEnv};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    // Parse CLI arguments; unknown flags exit here with a usage error.
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise use default based on verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Extract JSON output path before consuming cli
    let json_output = cli.json.clone();

    let config = cli.into_config().context("Invalid benchmark configuration")?;

    let env: Arc<dyn Env> = Arc::new(PosixEnv::new());
    let mut runner = BenchmarkRunner::new(&config, LsmEngine, env)?;
    runner.print_header();
    let reports = runner.run()?;

    if let Some(path) = json_output {
        export_json(&reports, &config, &path).context("Failed to export JSON")?;
        eprintln!("Results exported to: {}", path.display());
    }

    Ok(())
}
