use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use taxisim_cli::batch::plan_runs;
use taxisim_cli::load_plan;
use taxisim_core::{SchedulerKind, Simulation, StopReason};
use tempfile::tempdir;

fn workspace() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn plan(name: &str, out: &Path) -> taxisim_core::SimConfig {
    let mut config = load_plan(&workspace().join("plans").join(name), &[]).unwrap();
    config.simulator.data_dir = workspace().join("data");
    config.simulator.output_dir = out.join("output");
    config.simulator.cache_dir = out.join("cache");
    config
}

#[test]
fn test_sample_plans_parse() {
    let dir = tempdir().unwrap();
    assert_eq!(plan("simple.json", dir.path()).scheduler.name, SchedulerKind::Greedy);
    assert_eq!(plan("predictive.json", dir.path()).scheduler.name, SchedulerKind::Predictive);

    let sweep = plan("sweep.json", dir.path());
    let batch = sweep.batch.clone().unwrap();
    assert_eq!(plan_runs(&sweep, &batch).unwrap().len(), 15);
}

#[test]
fn test_greedy_sample_clears_the_airport() {
    let dir = tempdir().unwrap();
    let mut simulation = Simulation::load(plan("simple.json", dir.path())).unwrap();
    let summary = simulation.run(&AtomicBool::new(false)).unwrap();

    assert_eq!(summary.reason, StopReason::EndOfDay);
    assert!(simulation.state().airport().aircraft().is_empty());
    assert!(summary.metrics.makespan > 0);
    assert!(summary.metrics.taxi_time > 0);
    assert!(dir.path().join("output/simple-greedy/metrics.json").exists());
}

#[test]
fn test_predictive_sample_runs_to_end_of_day() {
    let dir = tempdir().unwrap();
    let mut simulation = Simulation::load(plan("predictive.json", dir.path())).unwrap();
    let summary = simulation.run(&AtomicBool::new(false)).unwrap();

    assert_eq!(summary.reason, StopReason::EndOfDay);
    assert!(summary.metrics.n_reschedules > 0);
    assert!(dir.path().join("output/simple-predictive/tick.csv").exists());
}
