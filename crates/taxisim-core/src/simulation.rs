//! Simulation state and the tick loop that drives it.
//!
//! [`SimulationState`] is a plain value: cloning it clones the clock, the
//! active aircraft and their itineraries, while the surface, scenario and
//! routing table stay shared. Look-ahead predictions run on such clones.
//! [`Simulation`] adds the scheduler, the analyst and the output files.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::airport::{Airport, AirportState};
use crate::analyst::{Analyst, Metrics};
use crate::clock::Clock;
use crate::config::SimConfig;
use crate::conflict::Conflict;
use crate::error::{AirportError, ClockError, ConfigError, OutputError, SimulationError};
use crate::routing::RoutingExpert;
use crate::scenario::Scenario;
use crate::schedule::Schedule;
use crate::scheduler::{self, Scheduler};
use crate::state_logger::StateLogger;
use crate::surface::Surface;
use crate::uncertainty::Uncertainty;

/// Prediction clones log everything at trace level.
macro_rules! sim_log {
    ($quiet:expr, $level:ident, $($arg:tt)+) => {
        if $quiet {
            tracing::trace!($($arg)+)
        } else {
            tracing::$level!($($arg)+)
        }
    };
}

/// Serializable mutable part of a [`SimulationState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub clock: Clock,
    pub airport: AirportState,
    /// Index of the next departure not yet admitted
    pub next_flight: usize,
    pub tick_index: u64,
    pub last_schedule_time: Option<NaiveTime>,
}

#[derive(Debug, Clone)]
pub struct SimulationState {
    config: Arc<SimConfig>,
    clock: Clock,
    airport: Airport,
    scenario: Arc<Scenario>,
    routing: Arc<RoutingExpert>,
    uncertainty: Option<Uncertainty>,
    next_flight: usize,
    tick_index: u64,
    last_schedule_time: Option<NaiveTime>,
    quiet: bool,
}

impl SimulationState {
    pub fn new(
        config: Arc<SimConfig>,
        surface: Arc<Surface>,
        scenario: Arc<Scenario>,
        routing: Arc<RoutingExpert>,
    ) -> Result<Self, ConfigError> {
        let clock = Clock::new(config.start_time()?, i64::from(config.simulation.time_unit))
            .with_end_time(config.end_time()?);
        let airport = Airport::new(surface, config.proximity());
        let uncertainty = Uncertainty::from_config(&config.uncertainty);
        Ok(Self {
            config,
            clock,
            airport,
            scenario,
            routing,
            uncertainty,
            next_flight: 0,
            tick_index: 0,
            last_schedule_time: None,
            quiet: false,
        })
    }

    pub fn now(&self) -> NaiveTime {
        self.clock.now()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn airport(&self) -> &Airport {
        &self.airport
    }

    pub fn airport_mut(&mut self) -> &mut Airport {
        &mut self.airport
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn routing(&self) -> &RoutingExpert {
        &self.routing
    }

    pub fn uncertainty(&self) -> Option<&Uncertainty> {
        self.uncertainty.as_ref()
    }

    pub fn set_uncertainty(&mut self, uncertainty: Option<Uncertainty>) {
        self.uncertainty = uncertainty;
    }

    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }

    pub fn last_schedule_time(&self) -> Option<NaiveTime> {
        self.last_schedule_time
    }

    /// Admit queued aircraft whose gate freed up, then every departure
    /// appearing in `[now, now + step)`.
    pub fn admit_flights(&mut self) -> Vec<String> {
        let now = self.clock.now();
        let window_end = self.clock.window_end();
        let mut admitted = self.airport.admit_queued();
        for callsign in &admitted {
            sim_log!(self.quiet, info, "{} left the gate queue at {}", callsign, now);
        }

        let scenario = Arc::clone(&self.scenario);
        while let Some(flight) = scenario.departures().get(self.next_flight) {
            if window_end.is_some_and(|end| flight.appear_time >= end) {
                break;
            }
            self.next_flight += 1;
            if flight.appear_time < now {
                sim_log!(
                    self.quiet,
                    warn,
                    "{} appears at {}, before the simulation start; skipped",
                    flight.callsign,
                    flight.appear_time
                );
                continue;
            }
            if self.airport.add_aircraft(flight.aircraft()) {
                sim_log!(self.quiet, info, "{} appeared at {} at {}", flight.callsign, flight.from_gate.name, now);
                admitted.push(flight.callsign.clone());
            } else {
                sim_log!(self.quiet, info, "{} queued at occupied gate {}", flight.callsign, flight.from_gate.name);
            }
        }
        admitted
    }

    pub fn is_reschedule_due(&self) -> bool {
        let cycle = TimeDelta::seconds(i64::from(self.config.simulation.reschedule_cycle));
        match self.last_schedule_time {
            None => true,
            Some(last) => self.clock.now().signed_duration_since(last) >= cycle,
        }
    }

    /// Install the schedule on the pilots and mark `now` as the last
    /// schedule time.
    pub fn apply_schedule(&mut self, schedule: &Schedule) -> Result<usize, AirportError> {
        let now = self.clock.now();
        let installed = self.airport.apply_schedule(schedule, now)?;
        self.last_schedule_time = Some(now);
        Ok(installed)
    }

    pub fn inject_uncertainty(&mut self) -> Vec<String> {
        match &self.uncertainty {
            Some(uncertainty) => uncertainty.inject(&mut self.airport, self.tick_index),
            None => Vec::new(),
        }
    }

    /// Remove every aircraft that reached its runway start.
    pub fn remove_departed(&mut self) -> Vec<String> {
        let close_ft = self.airport.proximity().close_node_ft;
        let done: Vec<String> = self
            .airport
            .aircraft()
            .iter()
            .filter(|a| {
                self.scenario
                    .get_flight(&a.callsign)
                    .is_some_and(|f| a.location().is_close_to(f.runway_start(), close_ft))
            })
            .map(|a| a.callsign.clone())
            .collect();
        for callsign in &done {
            self.airport.remove_aircraft(callsign);
            sim_log!(self.quiet, info, "{} reached its runway at {}", callsign, self.clock.now());
        }
        done
    }

    /// Everything in a tick after scheduling: uncertainty, pilots, removals
    /// and the clock. Returns the time the pilots were advanced to.
    pub fn advance(&mut self) -> Result<NaiveTime, ClockError> {
        let now = self.clock.now();
        self.inject_uncertainty();
        self.airport.tick(now);
        self.remove_departed();
        self.clock.tick()?;
        self.tick_index += 1;
        Ok(now)
    }

    fn quiet_clone(&self, uncertainty: Option<Uncertainty>) -> Self {
        let mut clone = self.clone();
        clone.quiet = true;
        clone.uncertainty = uncertainty;
        clone
    }

    /// Clone this state, swap in `uncertainty`, apply `schedule` and tick
    /// the clone quietly until `horizon` has elapsed or the day ends.
    pub fn predict_state_after(
        &self,
        schedule: &Schedule,
        horizon: TimeDelta,
        uncertainty: Option<Uncertainty>,
    ) -> Result<SimulationState, AirportError> {
        let mut clone = self.quiet_clone(uncertainty);
        clone.airport.apply_schedule(schedule, clone.now())?;
        let mut elapsed = TimeDelta::zero();
        while elapsed < horizon {
            clone.admit_flights();
            if clone.advance().is_err() {
                break;
            }
            elapsed += clone.clock.step();
        }
        Ok(clone)
    }

    /// Earliest conflict seen while playing `schedule` forward in `step`
    /// increments up to `horizon`, without uncertainty.
    pub fn predict_first_conflict(
        &self,
        schedule: &Schedule,
        horizon: TimeDelta,
        step: TimeDelta,
    ) -> Result<Option<Conflict>, AirportError> {
        let mut clone = self.quiet_clone(None);
        clone.clock.set_step_secs(step.num_seconds().max(1));
        clone.airport.apply_schedule(schedule, clone.now())?;
        let mut elapsed = TimeDelta::zero();
        while elapsed < horizon {
            clone.admit_flights();
            let Ok(time) = clone.advance() else {
                break;
            };
            if let Some(conflict) = clone.airport.conflicts(time).into_iter().next() {
                return Ok(Some(conflict));
            }
            elapsed += clone.clock.step();
        }
        Ok(None)
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            clock: self.clock.clone(),
            airport: self.airport.state(),
            next_flight: self.next_flight,
            tick_index: self.tick_index,
            last_schedule_time: self.last_schedule_time,
        }
    }

    pub fn restore(&mut self, snapshot: SimulationSnapshot) {
        self.clock = snapshot.clock;
        self.airport.restore(snapshot.airport);
        self.next_flight = snapshot.next_flight;
        self.tick_index = snapshot.tick_index;
        self.last_schedule_time = snapshot.last_schedule_time;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfDay,
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reason: StopReason,
    pub ticks: u64,
    pub metrics: Metrics,
}

pub struct Simulation {
    state: SimulationState,
    scheduler: Box<dyn Scheduler>,
    analyst: Analyst,
    state_logger: Option<StateLogger>,
    output_dir: Option<PathBuf>,
    pause: Duration,
}

impl Simulation {
    /// Load the surface, routing table and scenario named by `config` and
    /// write outputs to its output directory.
    pub fn load(config: SimConfig) -> Result<Self, SimulationError> {
        let proximity = config.proximity();
        let mut surface = Surface::load(&config.airport_dir())?;
        let splits = surface.break_links(&proximity)?;
        tracing::debug!("Split {} links at interior nodes", splits);

        let routing = if config.simulation.cache {
            RoutingExpert::with_cache(&surface, proximity, &config.simulator.cache_dir)?
        } else {
            RoutingExpert::new(&surface, proximity)?
        };
        let scenario = Scenario::load(&config.scenario_path(), &surface)?;
        let output_dir = config.output_dir();

        let simulation = Self::new(
            Arc::new(config),
            Arc::new(surface),
            Arc::new(scenario),
            Arc::new(routing),
        )?;
        Ok(simulation.with_output_dir(&output_dir)?)
    }

    /// Simulation over already loaded parts, without output files.
    pub fn new(
        config: Arc<SimConfig>,
        surface: Arc<Surface>,
        scenario: Arc<Scenario>,
        routing: Arc<RoutingExpert>,
    ) -> Result<Self, SimulationError> {
        let scheduler = scheduler::from_config(&config.scheduler);
        let analyst = Analyst::new(surface.name.clone(), i64::from(config.simulation.time_unit));
        let pause = Duration::from_millis(config.simulation.pause_between_ticks_ms);
        let state = SimulationState::new(config, surface, scenario, routing)?;
        Ok(Self {
            state,
            scheduler,
            analyst,
            state_logger: None,
            output_dir: None,
            pause,
        })
    }

    /// Write metrics and the state log into `dir`.
    pub fn with_output_dir(mut self, dir: &Path) -> Result<Self, OutputError> {
        std::fs::create_dir_all(dir).map_err(|source| OutputError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        self.state_logger = Some(StateLogger::create(dir)?);
        self.output_dir = Some(dir.to_path_buf());
        Ok(self)
    }

    pub fn with_scheduler(mut self, scheduler: Box<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    pub fn analyst(&self) -> &Analyst {
        &self.analyst
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// One tick. End of day comes back as an error whose kind is
    /// `end_of_day`.
    pub fn tick(&mut self) -> Result<(), SimulationError> {
        self.state.admit_flights();
        let rescheduled = if self.state.is_reschedule_due() {
            Some(self.reschedule()?)
        } else {
            None
        };

        let time = self.state.advance()?;

        let record = self.analyst.observe_tick(&self.state, time);
        tracing::trace!(
            "tick {}: {} aircraft, {} conflicts, queue {}",
            time,
            record.aircrafts,
            record.conflicts,
            record.queue_size
        );
        if let Some((exec_time, schedule)) = rescheduled {
            self.analyst.observe_schedule(time, exec_time, &schedule);
        }
        if let Some(logger) = self.state_logger.as_mut() {
            logger.log(time, self.state.airport().aircraft())?;
        }
        Ok(())
    }

    fn reschedule(&mut self) -> Result<(Duration, Schedule), SimulationError> {
        let now = self.state.now();
        let started = Instant::now();
        let schedule = self.scheduler.schedule(&self.state)?;
        let exec_time = started.elapsed();
        let installed = self.state.apply_schedule(&schedule)?;
        tracing::debug!(
            "{}: installed {} itineraries at {} in {:?} ({} delays, {} unsolvable)",
            self.scheduler.name(),
            installed,
            now,
            exec_time,
            schedule.n_delay_added,
            schedule.n_unsolvable_conflicts
        );

        if schedule.n_unsolvable_conflicts > 0 && self.state.config().simulator.abort_on_conflict {
            self.analyst.observe_schedule(now, exec_time, &schedule);
            return Err(SimulationError::ConflictOverflow {
                unsolvable: schedule.n_unsolvable_conflicts,
                time: now,
            });
        }
        Ok((exec_time, schedule))
    }

    /// Tick until the day ends, `cancel` is set or an error occurs. Outputs
    /// are flushed in every case.
    pub fn run(&mut self, cancel: &AtomicBool) -> Result<RunSummary, SimulationError> {
        let config = self.state.config();
        tracing::info!(
            "Starting {} at {} from {} ({}s ticks, {} scheduler, {} departures)",
            config.name,
            self.state.airport().name(),
            self.state.now(),
            config.simulation.time_unit,
            self.scheduler.name(),
            self.state.scenario().departures().len()
        );

        let outcome = loop {
            if cancel.load(Ordering::Relaxed) {
                tracing::info!("Interrupted at {}", self.state.now());
                break Ok(StopReason::Interrupted);
            }
            match self.tick() {
                Ok(()) => {}
                Err(e) if e.is_end_of_day() => {
                    tracing::info!("End of day at {}", self.state.now());
                    break Ok(StopReason::EndOfDay);
                }
                Err(e) => break Err(e),
            }
            if !self.pause.is_zero() {
                thread::sleep(self.pause);
            }
        };

        let flushed = self.flush();
        let reason = match outcome {
            Ok(reason) => reason,
            Err(e) => {
                if let Err(flush_err) = flushed {
                    tracing::error!("Failed to save outputs: {}", flush_err);
                }
                return Err(e);
            }
        };
        Ok(RunSummary {
            reason,
            ticks: self.state.tick_index(),
            metrics: flushed?,
        })
    }

    /// Save the analyst outputs and flush the state log.
    pub fn flush(&mut self) -> Result<Metrics, OutputError> {
        if let Some(logger) = self.state_logger.as_mut() {
            logger.flush()?;
        }
        match &self.output_dir {
            Some(dir) => self.analyst.save(dir),
            None => Ok(self.analyst.metrics()),
        }
    }
}
