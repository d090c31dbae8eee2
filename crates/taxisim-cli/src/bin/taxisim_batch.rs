//! Sweep one plan variable over a range, several samples per value, and
//! summarize every run in `batch.csv`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use clap::Parser;
use taxisim_cli::batch::{self, BatchRecord, SUMMARY_FILE};
use taxisim_cli::{init_tracing, load_plan, report};
use tokio::sync::Semaphore;

/// Batch runner for parameter sweeps
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Plan file (JSON) with a `batch` section
    #[arg(long, short)]
    plan: PathBuf,

    /// Override a numeric plan value before the sweep
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Runs in flight at once, overriding the plan
    #[arg(long, short = 'j')]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_plan(&args.plan, &args.overrides)
        .with_context(|| format!("loading plan {}", args.plan.display()))?;
    init_tracing(&config.logger)?;

    let sweep = config
        .batch
        .clone()
        .context("plan has no batch section")?;
    let runs = batch::plan_runs(&config, &sweep)?;
    let concurrency = match args.concurrency.unwrap_or(sweep.concurrency) {
        0 => thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        n => n,
    };
    tracing::info!(
        "Sweeping {} over {} ({} runs, {} at a time)",
        sweep.variable,
        sweep.range,
        runs.len(),
        concurrency
    );

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl-C received, stopping running simulations");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut handles = Vec::with_capacity(runs.len());
    for run in runs {
        let permit = semaphore.clone().acquire_owned().await?;
        let cancel = cancel.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            tracing::info!("Starting {}", run.config.name);
            batch::run_one(&run, &cancel)
        }));
    }

    let mut records: Vec<BatchRecord> = Vec::with_capacity(handles.len());
    for handle in handles {
        records.push(handle.await?);
    }
    records.sort_by(|a, b| a.value.total_cmp(&b.value).then(a.nth.cmp(&b.nth)));

    let out_dir = config.output_dir();
    std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let path = out_dir.join(SUMMARY_FILE);
    batch::write_summary(&path, &records)?;

    let failed = records.iter().filter(|r| r.failed).count();
    tracing::info!("Wrote {} ({} runs, {} failed)", path.display(), records.len(), failed);
    Ok(())
}
