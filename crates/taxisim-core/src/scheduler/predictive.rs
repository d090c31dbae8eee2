//! Predictive scheduler.
//!
//! Every unscheduled aircraft gets its nominal shortest-route itinerary.
//! The candidate plans are then played forward on a clone of the simulation
//! one delay grain at a time. While the look-ahead shows a conflict, the
//! lower priority aircraft in the earliest conflict is delayed by one grain
//! and the look-ahead restarts.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveTime, TimeDelta};

use super::{departure_of, nominal_itinerary, route_legs, unscheduled, Scheduler};
use crate::config::SchedulerConfig;
use crate::conflict::Conflict;
use crate::error::SchedulerError;
use crate::itinerary::Itinerary;
use crate::schedule::Schedule;
use crate::simulation::SimulationState;

#[derive(Debug, Clone)]
pub struct PredictiveScheduler {
    velocity_fps: f64,
    delay: TimeDelta,
    horizon: TimeDelta,
    max_attempts: u32,
}

impl PredictiveScheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            velocity_fps: config.aircraft_velocity,
            delay: TimeDelta::seconds(i64::from(config.delay_time)),
            horizon: TimeDelta::seconds(i64::from(config.resolve_conflicts_time)),
            max_attempts: config.max_resolve_attempts,
        }
    }

    /// Candidate plans: nominal itineraries for unscheduled aircraft and
    /// copies of the installed plans for the rest.
    fn candidates(&self, state: &SimulationState) -> Result<BTreeMap<String, Itinerary>, SchedulerError> {
        let now = state.now();
        let mut candidates = BTreeMap::new();
        for (aircraft, flight) in unscheduled(state)? {
            let legs = route_legs(state.routing(), aircraft, flight)?;
            let start = flight.departure_time.max(now);
            candidates.insert(
                aircraft.callsign.clone(),
                nominal_itinerary(&legs, start, self.velocity_fps),
            );
        }
        for aircraft in state.airport().aircraft() {
            if let Some(itinerary) = aircraft.itinerary() {
                candidates.insert(aircraft.callsign.clone(), itinerary.clone());
            }
        }
        Ok(candidates)
    }

    /// Pick the aircraft to delay: the one departing latest, then the
    /// highest callsign, among those whose plan can still take a delay.
    fn pick_victim(
        &self,
        state: &SimulationState,
        conflict: &Conflict,
        candidates: &BTreeMap<String, Itinerary>,
        now: NaiveTime,
    ) -> Result<Option<String>, SchedulerError> {
        let mut victim: Option<(NaiveTime, &str)> = None;
        for callsign in &conflict.callsigns {
            let Some(itinerary) = candidates.get(callsign) else {
                continue;
            };
            let delayable = itinerary
                .next_target()
                .is_ok_and(|head| head.edt.is_some_and(|edt| edt >= now));
            if !delayable {
                continue;
            }
            let Some(aircraft) = state.airport().get_aircraft(callsign) else {
                continue;
            };
            let departure = departure_of(state.scenario(), aircraft)?.departure_time;
            let key = (departure, callsign.as_str());
            if victim.map_or(true, |v| key > v) {
                victim = Some(key);
            }
        }
        Ok(victim.map(|(_, callsign)| callsign.to_string()))
    }
}

impl Scheduler for PredictiveScheduler {
    fn name(&self) -> &'static str {
        "predictive"
    }

    fn schedule(&mut self, state: &SimulationState) -> Result<Schedule, SchedulerError> {
        let now = state.now();
        let mut candidates = self.candidates(state)?;
        let mut changed: BTreeSet<String> = unscheduled(state)?
            .into_iter()
            .map(|(aircraft, _)| aircraft.callsign.clone())
            .collect();

        let mut schedule = Schedule::new();
        let mut attempts = 0u32;
        loop {
            let trial = build_schedule(&candidates, &changed);
            let Some(conflict) = state.predict_first_conflict(&trial, self.horizon, self.delay)? else {
                break;
            };

            if attempts >= self.max_attempts {
                tracing::warn!(
                    "predictive: giving up after {} delays, {} still predicted",
                    attempts,
                    conflict
                );
                schedule.n_unsolvable_conflicts += 1;
                break;
            }
            let Some(victim) = self.pick_victim(state, &conflict, &candidates, now)? else {
                tracing::warn!("predictive: no delayable aircraft in {}", conflict);
                schedule.n_unsolvable_conflicts += 1;
                break;
            };

            tracing::debug!("predictive: delaying {} by {}s for {}", victim, self.delay.num_seconds(), conflict);
            if let Some(itinerary) = candidates.get_mut(&victim) {
                itinerary.add_scheduler_delay(self.delay);
            }
            changed.insert(victim);
            schedule.n_delay_added += 1;
            attempts += 1;
        }

        for callsign in &changed {
            if let Some(itinerary) = candidates.remove(callsign) {
                schedule.insert(callsign.clone(), itinerary);
            }
        }
        Ok(schedule)
    }
}

fn build_schedule(candidates: &BTreeMap<String, Itinerary>, changed: &BTreeSet<String>) -> Schedule {
    let mut schedule = Schedule::new();
    for callsign in changed {
        if let Some(itinerary) = candidates.get(callsign) {
            schedule.insert(callsign.clone(), itinerary.clone());
        }
    }
    schedule
}
