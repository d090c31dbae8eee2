//! Run one simulation plan until the end of the simulated day.
//!
//! Ctrl-C stops the run after the current tick; outputs are still saved.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use taxisim_cli::{init_tracing, load_plan, report};
use taxisim_core::{Simulation, StopReason};

/// Airport surface departure taxi simulator
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Plan file (JSON)
    #[arg(long, short)]
    plan: PathBuf,

    /// Override a numeric plan value, e.g. `--set uncertainty.prob_hold=0.2`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Log level for the simulator, overriding the plan
    #[arg(long)]
    log_level: Option<String>,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,
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
    let mut config = load_plan(&args.plan, &args.overrides)
        .with_context(|| format!("loading plan {}", args.plan.display()))?;
    if let Some(level) = args.log_level {
        config.logger.level = level;
    }
    config.logger.json |= args.json;
    init_tracing(&config.logger)?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl-C received, stopping after this tick");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let summary = tokio::task::spawn_blocking(move || {
        let mut simulation = Simulation::load(config)?;
        simulation.run(&cancel)
    })
    .await??;

    let metrics = &summary.metrics;
    match summary.reason {
        StopReason::EndOfDay => tracing::info!("Finished after {} ticks", summary.ticks),
        StopReason::Interrupted => tracing::info!("Stopped after {} ticks", summary.ticks),
    }
    println!(
        "makespan {}s, conflicts {}, delays added {}, unsolvable {}, taxi time {}s",
        metrics.makespan,
        metrics.total_conflicts,
        metrics.delay_added,
        metrics.n_unsolvable_conflicts,
        metrics.taxi_time
    );
    Ok(())
}
