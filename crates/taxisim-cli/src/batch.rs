//! Parameter sweeps: one plan, one numeric variable, many runs.

use std::path::Path;
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context};
use serde::Serialize;
use taxisim_core::{BatchConfig, SimConfig, Simulation, StopReason};

pub const SUMMARY_FILE: &str = "batch.csv";

/// One run of a sweep.
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub value: f64,
    /// Sample number for this value
    pub nth: u32,
    pub config: SimConfig,
}

/// Summary row written to `batch.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRecord {
    pub value: f64,
    pub nth: u32,
    pub failed: bool,
    pub makespan: i64,
    pub total_conflicts: usize,
    pub delay_added: u32,
}

impl BatchRecord {
    fn failed(run: &BatchRun) -> Self {
        Self {
            value: run.value,
            nth: run.nth,
            failed: true,
            makespan: 0,
            total_conflicts: 0,
            delay_added: 0,
        }
    }
}

/// Values of an inclusive `start:end:step` range.
pub fn parse_range(range: &str) -> anyhow::Result<Vec<f64>> {
    let parts: Vec<&str> = range.split(':').map(str::trim).collect();
    let &[start, end, step] = parts.as_slice() else {
        bail!("range {range:?} is not start:end:step");
    };
    let parse = |s: &str| -> anyhow::Result<f64> {
        s.parse::<f64>()
            .with_context(|| format!("range {range:?}: {s:?} is not a number"))
    };
    let (start, end, step) = (parse(start)?, parse(end)?, parse(step)?);
    if !(step > 0.0) || !step.is_finite() {
        bail!("range {range:?}: step must be positive");
    }
    if end < start {
        bail!("range {range:?}: end is before start");
    }

    let count = ((end - start) / step + 1e-9).floor() as u64;
    Ok((0..=count).map(|i| start + step * i as f64).collect())
}

/// Expand a sweep into runs. Each run gets its own name, and with
/// uncertainty enabled each sample gets its own seed.
pub fn plan_runs(base: &SimConfig, batch: &BatchConfig) -> anyhow::Result<Vec<BatchRun>> {
    if batch.variable.is_empty() {
        bail!("batch.variable is empty");
    }
    let mut runs = Vec::new();
    for value in parse_range(&batch.range)? {
        for nth in 0..batch.times.max(1) {
            let mut config = base.with_override(&batch.variable, value)?;
            config.name = format!("{}/{}={}/{}", base.name, batch.variable, value, nth);
            config.batch = None;
            if config.uncertainty.enabled {
                config.uncertainty.seed = base.uncertainty.seed.wrapping_add(u64::from(nth));
            }
            runs.push(BatchRun { value, nth, config });
        }
    }
    Ok(runs)
}

/// Run one sweep member to the end of its day.
pub fn run_one(run: &BatchRun, cancel: &AtomicBool) -> BatchRecord {
    let outcome = Simulation::load(run.config.clone()).and_then(|mut sim| sim.run(cancel));
    match outcome {
        Ok(summary) => {
            if summary.reason == StopReason::Interrupted {
                tracing::warn!("{} interrupted after {} ticks", run.config.name, summary.ticks);
            }
            BatchRecord {
                value: run.value,
                nth: run.nth,
                failed: summary.reason != StopReason::EndOfDay,
                makespan: summary.metrics.makespan,
                total_conflicts: summary.metrics.total_conflicts,
                delay_added: summary.metrics.delay_added,
            }
        }
        Err(e) => {
            tracing::error!(kind = e.kind().as_str(), "{} failed: {}", run.config.name, e);
            BatchRecord::failed(run)
        }
    }
}

pub fn write_summary(path: &Path, records: &[BatchRecord]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_range_is_inclusive() {
        assert_eq!(parse_range("0:1:0.5").unwrap(), vec![0.0, 0.5, 1.0]);
        assert_eq!(parse_range("10:40:10").unwrap(), vec![10.0, 20.0, 30.0, 40.0]);
        assert_eq!(parse_range("3:3:1").unwrap(), vec![3.0]);
        let values = parse_range("0:0.3:0.1").unwrap();
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn test_parse_range_rejects_garbage() {
        assert!(parse_range("0:1").is_err());
        assert!(parse_range("0:1:0").is_err());
        assert!(parse_range("1:0:0.1").is_err());
        assert!(parse_range("a:1:0.1").is_err());
    }

    #[test]
    fn test_plan_runs_names_and_seeds() {
        let mut base = SimConfig::default();
        base.name = "sweep".into();
        base.uncertainty.enabled = true;
        base.uncertainty.seed = 7;
        let batch = BatchConfig {
            variable: "uncertainty.prob_hold".into(),
            range: "0:0.2:0.1".into(),
            times: 2,
            concurrency: 0,
        };

        let runs = plan_runs(&base, &batch).unwrap();
        assert_eq!(runs.len(), 6);
        assert_eq!(runs[0].config.uncertainty.seed, 7);
        assert_eq!(runs[1].config.uncertainty.seed, 8);
        assert_eq!(runs[3].config.uncertainty.prob_hold, runs[3].value);
        assert_eq!(runs[1].config.name, "sweep/uncertainty.prob_hold=0/1");

        let mut names: Vec<&str> = runs.iter().map(|r| r.config.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn test_plan_runs_rejects_unknown_variable() {
        let batch = BatchConfig {
            variable: "scheduler.nope".into(),
            range: "0:1:1".into(),
            times: 1,
            concurrency: 0,
        };
        assert!(plan_runs(&SimConfig::default(), &batch).is_err());
    }

    #[test]
    fn test_write_summary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SUMMARY_FILE);
        let records = vec![BatchRecord {
            value: 0.5,
            nth: 0,
            failed: false,
            makespan: 120,
            total_conflicts: 3,
            delay_added: 4,
        }];
        write_summary(&path, &records).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("value,nth,failed,makespan,total_conflicts,delay_added")
        );
        assert_eq!(lines.next(), Some("0.5,0,false,120,3,4"));
    }
}
