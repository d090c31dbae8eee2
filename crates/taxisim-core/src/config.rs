//! Run configuration loaded from a JSON plan file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::geo::Proximity;

/// Complete configuration for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Run name; outputs land in `output_dir/<name>`.
    pub name: String,
    /// Airport directory name under `data_dir`.
    pub airport: String,
    pub simulation: SimulationConfig,
    pub scheduler: SchedulerConfig,
    pub uncertainty: UncertaintyConfig,
    pub simulator: SimulatorConfig,
    pub logger: LoggerConfig,
    pub batch: Option<BatchConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            airport: "simple".into(),
            simulation: SimulationConfig::default(),
            scheduler: SchedulerConfig::default(),
            uncertainty: UncertaintyConfig::default(),
            simulator: SimulatorConfig::default(),
            logger: LoggerConfig::default(),
            batch: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds of simulated time per tick
    pub time_unit: u32,
    /// Seconds of simulated time between reschedules
    pub reschedule_cycle: u32,
    /// Nodes closer than this (feet) are the same place
    pub close_node_threshold: f64,
    /// A node closer than this (feet) to a link segment lies on the link
    pub close_node_link_threshold: f64,
    /// Reuse the on-disk routing table
    pub cache: bool,
    /// "HH:MM"
    pub start_time: String,
    /// "HH:MM"; passing it ends the day early
    pub end_time: Option<String>,
    /// Wall-clock pause between ticks
    pub pause_between_ticks_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_unit: 10,
            reschedule_cycle: 30,
            close_node_threshold: 10.0,
            close_node_link_threshold: 10.0,
            cache: true,
            start_time: "00:00".into(),
            end_time: None,
            pause_between_ticks_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    /// First-come first-served node reservations.
    Greedy,
    /// Nominal routes delayed until a look-ahead shows no conflict.
    Predictive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub name: SchedulerKind,
    /// Seconds kept free at a node after the previous aircraft leaves
    pub tightness: u32,
    /// Taxi speed in feet per second
    pub aircraft_velocity: f64,
    /// Seconds added per conflict-resolving delay
    pub delay_time: u32,
    /// Look-ahead horizon in seconds
    pub resolve_conflicts_time: u32,
    /// Delays added per reschedule before giving up
    pub max_resolve_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: SchedulerKind::Greedy,
            tightness: 10,
            aircraft_velocity: 30.0,
            delay_time: 10,
            resolve_conflicts_time: 600,
            max_resolve_attempts: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UncertaintyConfig {
    pub enabled: bool,
    /// Per-aircraft, per-tick hold probability
    pub prob_hold: f64,
    pub seed: u64,
    /// Seconds added by one surprise hold
    pub delay_time: u32,
    pub at_gate: bool,
    pub at_spot: bool,
    /// Also hold aircraft at the last waypoint before a runway start
    pub at_runway: bool,
}

impl Default for UncertaintyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prob_hold: 0.0,
            seed: 0,
            delay_time: 30,
            at_gate: true,
            at_spot: true,
            at_runway: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Stop the run when a schedule reports unsolvable conflicts
    pub abort_on_conflict: bool,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Defaults to `data_dir/<airport>/scenario.json`
    pub scenario: Option<PathBuf>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            abort_on_conflict: false,
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            cache_dir: PathBuf::from("cache"),
            scenario: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

/// Parameter sweep settings for batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Dotted key, e.g. `uncertainty.prob_hold`
    pub variable: String,
    /// "start:end:step", end inclusive
    pub range: String,
    /// Samples per value
    pub times: u32,
    /// Runs in flight at once; 0 means one per core
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            variable: String::new(),
            range: String::new(),
            times: 1,
            concurrency: 0,
        }
    }
}

impl SimConfig {
    /// Read a plan file, apply environment overrides and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: SimConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// `TAXISIM_DATA_DIR`, `TAXISIM_OUTPUT_DIR` and `TAXISIM_CACHE_DIR`
    /// replace the plan's directories when set.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = env::var("TAXISIM_DATA_DIR") {
            self.simulator.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("TAXISIM_OUTPUT_DIR") {
            self.simulator.output_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("TAXISIM_CACHE_DIR") {
            self.simulator.cache_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let sim = &self.simulation;
        if sim.time_unit == 0 {
            return invalid("simulation.time_unit must be positive".into());
        }
        if sim.reschedule_cycle == 0 {
            return invalid("simulation.reschedule_cycle must be positive".into());
        }
        if !(sim.close_node_threshold >= 0.0) || !(sim.close_node_link_threshold >= 0.0) {
            return invalid("proximity thresholds must be non-negative".into());
        }
        if !(self.scheduler.aircraft_velocity > 0.0) || !self.scheduler.aircraft_velocity.is_finite() {
            return invalid(format!(
                "scheduler.aircraft_velocity must be positive, got {}",
                self.scheduler.aircraft_velocity
            ));
        }
        if self.scheduler.delay_time == 0 {
            return invalid("scheduler.delay_time must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.uncertainty.prob_hold) {
            return invalid(format!(
                "uncertainty.prob_hold must be within [0, 1], got {}",
                self.uncertainty.prob_hold
            ));
        }
        if self.uncertainty.enabled && self.uncertainty.delay_time == 0 {
            return invalid("uncertainty.delay_time must be positive".into());
        }
        self.start_time()?;
        self.end_time()?;
        Ok(())
    }

    pub fn start_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_clock("simulation.start_time", &self.simulation.start_time)
    }

    pub fn end_time(&self) -> Result<Option<NaiveTime>, ConfigError> {
        self.simulation
            .end_time
            .as_deref()
            .map(|s| parse_clock("simulation.end_time", s))
            .transpose()
    }

    pub fn proximity(&self) -> Proximity {
        Proximity {
            close_node_ft: self.simulation.close_node_threshold,
            close_node_link_ft: self.simulation.close_node_link_threshold,
        }
    }

    pub fn airport_dir(&self) -> PathBuf {
        self.simulator.data_dir.join(&self.airport)
    }

    pub fn scenario_path(&self) -> PathBuf {
        self.simulator
            .scenario
            .clone()
            .unwrap_or_else(|| self.airport_dir().join("scenario.json"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.simulator.output_dir.join(&self.name)
    }

    /// Copy of this config with one numeric key replaced, e.g.
    /// `with_override("uncertainty.prob_hold", 0.2)`.
    pub fn with_override(&self, key: &str, value: f64) -> Result<Self, ConfigError> {
        let mut tree = serde_json::to_value(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let mut slot = &mut tree;
        for part in key.split('.') {
            slot = slot
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }
        let replacement = match &*slot {
            Value::Number(n) if n.is_u64() || n.is_i64() => {
                if value.fract() != 0.0 || value < 0.0 {
                    return Err(ConfigError::Invalid(format!("{key} takes a whole number, got {value}")));
                }
                Value::from(value as u64)
            }
            Value::Number(_) => Value::from(value),
            _ => return Err(ConfigError::Invalid(format!("{key} is not numeric"))),
        };
        *slot = replacement;

        let config: SimConfig = serde_json::from_value(tree).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_clock(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ConfigError::Invalid(format!("{key} must be HH:MM, got {value:?}")))
}
