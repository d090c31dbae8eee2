//! Per-tick and per-reschedule statistics, and the files they end up in.

use std::fs::{self, File};
use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;
use csv::Writer;
use serde::{Deserialize, Serialize};

use crate::error::OutputError;
use crate::itinerary::Itinerary;
use crate::schedule::Schedule;
use crate::simulation::SimulationState;

pub const METRICS_FILE: &str = "metrics.json";
pub const TICK_FILE: &str = "tick.csv";
pub const SCHEDULE_FILE: &str = "schedule.csv";
pub const AIRPORT_FILE: &str = "airport.txt";

#[derive(Debug, Clone, PartialEq)]
pub struct TickRecord {
    pub time: NaiveTime,
    pub aircrafts: usize,
    pub conflicts: usize,
    pub queue_size: usize,
    /// Active aircraft whose plan carries a scheduler delay
    pub n_scheduler_delay: usize,
    /// Active aircraft whose plan carries a surprise hold
    pub n_uncertainty_delay: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRecord {
    pub time: NaiveTime,
    pub exec_time: Duration,
    pub delay_added: u32,
    pub unsolvable_conflicts: u32,
}

/// Summary written to `metrics.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_conflicts: usize,
    /// Seconds between the first and last tick with an active aircraft
    pub makespan: i64,
    pub delay_added: u32,
    pub avg_queue_size: f64,
    /// Milliseconds
    pub avg_reschedule_exec_time: f64,
    pub avg_active_aircrafts: f64,
    /// Aircraft-seconds spent away from the gate
    pub taxi_time: i64,
    pub n_scheduler_delay: usize,
    pub n_uncertainty_delay: usize,
    pub n_unsolvable_conflicts: u32,
    pub n_reschedules: usize,
}

#[derive(Debug, Clone)]
pub struct Analyst {
    airport_name: String,
    time_unit_secs: i64,
    ticks: Vec<TickRecord>,
    schedules: Vec<ScheduleRecord>,
    first_active: Option<NaiveTime>,
    last_active: Option<NaiveTime>,
    taxiing_ticks: i64,
}

impl Analyst {
    pub fn new(airport_name: impl Into<String>, time_unit_secs: i64) -> Self {
        Self {
            airport_name: airport_name.into(),
            time_unit_secs,
            ticks: Vec::new(),
            schedules: Vec::new(),
            first_active: None,
            last_active: None,
            taxiing_ticks: 0,
        }
    }

    /// Record the post-tick state. `time` is the instant the pilots were
    /// advanced to.
    pub fn observe_tick(&mut self, state: &SimulationState, time: NaiveTime) -> &TickRecord {
        let airport = state.airport();
        let close_ft = airport.proximity().close_node_ft;
        let aircraft = airport.aircraft();

        if !aircraft.is_empty() {
            self.first_active.get_or_insert(time);
            self.last_active = Some(time);
        }
        self.taxiing_ticks += aircraft
            .iter()
            .filter(|a| {
                state
                    .scenario()
                    .get_flight(&a.callsign)
                    .is_some_and(|f| !a.location().is_close_to(&f.from_gate, close_ft))
            })
            .count() as i64;

        let delayed_by = |pick: fn(&Itinerary) -> u32| {
            aircraft
                .iter()
                .filter_map(|a| a.itinerary())
                .filter(|i| pick(i) > 0)
                .count()
        };
        let record = TickRecord {
            time,
            aircrafts: aircraft.len(),
            conflicts: airport.conflicts(time).len(),
            queue_size: airport.queue_size(),
            n_scheduler_delay: delayed_by(Itinerary::n_scheduler_delay),
            n_uncertainty_delay: delayed_by(Itinerary::n_uncertainty_delay),
        };
        if record.conflicts > 0 {
            tracing::debug!("{} conflict(s) at {}", record.conflicts, time);
        }
        self.ticks.push(record);
        &self.ticks[self.ticks.len() - 1]
    }

    pub fn observe_schedule(&mut self, time: NaiveTime, exec_time: Duration, schedule: &Schedule) {
        self.schedules.push(ScheduleRecord {
            time,
            exec_time,
            delay_added: schedule.n_delay_added,
            unsolvable_conflicts: schedule.n_unsolvable_conflicts,
        });
    }

    pub fn ticks(&self) -> &[TickRecord] {
        &self.ticks
    }

    pub fn schedules(&self) -> &[ScheduleRecord] {
        &self.schedules
    }

    pub fn metrics(&self) -> Metrics {
        let makespan = match (self.first_active, self.last_active) {
            (Some(first), Some(last)) => (last - first).num_seconds(),
            _ => 0,
        };
        let n_ticks = self.ticks.len();
        let mean = |sum: usize, n: usize| if n == 0 { 0.0 } else { sum as f64 / n as f64 };
        let exec_ms: f64 = self.schedules.iter().map(|s| s.exec_time.as_secs_f64() * 1000.0).sum();

        Metrics {
            total_conflicts: self.ticks.iter().map(|t| t.conflicts).sum(),
            makespan,
            delay_added: self.schedules.iter().map(|s| s.delay_added).sum(),
            avg_queue_size: mean(self.ticks.iter().map(|t| t.queue_size).sum(), n_ticks),
            avg_reschedule_exec_time: if self.schedules.is_empty() {
                0.0
            } else {
                exec_ms / self.schedules.len() as f64
            },
            avg_active_aircrafts: mean(self.ticks.iter().map(|t| t.aircrafts).sum(), n_ticks),
            taxi_time: self.taxiing_ticks * self.time_unit_secs,
            n_scheduler_delay: self.ticks.iter().map(|t| t.n_scheduler_delay).sum(),
            n_uncertainty_delay: self.ticks.iter().map(|t| t.n_uncertainty_delay).sum(),
            n_unsolvable_conflicts: self.schedules.iter().map(|s| s.unsolvable_conflicts).sum(),
            n_reschedules: self.schedules.len(),
        }
    }

    /// Write every output file into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<Metrics, OutputError> {
        fs::create_dir_all(dir).map_err(|source| OutputError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let metrics = self.metrics();
        let metrics_path = dir.join(METRICS_FILE);
        let file = File::create(&metrics_path).map_err(|source| OutputError::Io {
            path: metrics_path.clone(),
            source,
        })?;
        serde_json::to_writer_pretty(file, &metrics)?;

        let mut writer = Writer::from_path(dir.join(TICK_FILE))?;
        self.export_ticks(&mut writer)?;
        writer.flush().map_err(|source| OutputError::Io {
            path: dir.join(TICK_FILE),
            source,
        })?;

        let mut writer = Writer::from_path(dir.join(SCHEDULE_FILE))?;
        self.export_schedules(&mut writer)?;
        writer.flush().map_err(|source| OutputError::Io {
            path: dir.join(SCHEDULE_FILE),
            source,
        })?;

        let airport_path = dir.join(AIRPORT_FILE);
        fs::write(&airport_path, format!("{}\n", self.airport_name)).map_err(|source| OutputError::Io {
            path: airport_path,
            source,
        })?;

        tracing::info!(
            "Saved metrics to {}: makespan {}s, {} conflicts, {} delays added",
            dir.display(),
            metrics.makespan,
            metrics.total_conflicts,
            metrics.delay_added
        );
        Ok(metrics)
    }

    fn export_ticks(&self, writer: &mut Writer<File>) -> Result<(), OutputError> {
        writer.write_record([
            "time",
            "aircrafts",
            "conflicts",
            "queue_size",
            "n_scheduler_delay",
            "n_uncertainty_delay",
        ])?;
        for tick in &self.ticks {
            writer.write_record([
                format_time(tick.time),
                tick.aircrafts.to_string(),
                tick.conflicts.to_string(),
                tick.queue_size.to_string(),
                tick.n_scheduler_delay.to_string(),
                tick.n_uncertainty_delay.to_string(),
            ])?;
        }
        Ok(())
    }

    fn export_schedules(&self, writer: &mut Writer<File>) -> Result<(), OutputError> {
        writer.write_record(["time", "exec_time_ms", "delay_added", "unsolvable_conflicts"])?;
        for schedule in &self.schedules {
            writer.write_record([
                format_time(schedule.time),
                format!("{:.3}", schedule.exec_time.as_secs_f64() * 1000.0),
                schedule.delay_added.to_string(),
                schedule.unsolvable_conflicts.to_string(),
            ])?;
        }
        Ok(())
    }
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}
