//! Greedy node-reservation scheduler.
//!
//! Aircraft are planned one at a time in departure order. Every node keeps
//! the time its last user leaves; a later aircraft may not arrive before
//! that time plus the configured tightness. No holds are inserted, so each
//! target leaves as soon as it arrives.

use std::collections::HashMap;

use chrono::{NaiveTime, TimeDelta};

use super::{route_legs, travel_time, unscheduled, Scheduler};
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::itinerary::{Itinerary, Target};
use crate::node::Node;
use crate::schedule::Schedule;
use crate::simulation::SimulationState;

#[derive(Debug, Clone)]
pub struct GreedyScheduler {
    velocity_fps: f64,
    tightness: TimeDelta,
    /// Node -> time its last reservation ends. Survives between calls.
    last_occupied: HashMap<Node, NaiveTime>,
}

impl GreedyScheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            velocity_fps: config.aircraft_velocity,
            tightness: TimeDelta::seconds(i64::from(config.tightness)),
            last_occupied: HashMap::new(),
        }
    }

    /// Earliest time `node` is free again, never before `now`.
    fn earliest_available(&self, node: &Node, now: NaiveTime) -> NaiveTime {
        match self.last_occupied.get(node) {
            Some(&last) => (last + self.tightness).max(now),
            None => now,
        }
    }

    pub fn last_occupied(&self, node: &Node) -> Option<NaiveTime> {
        self.last_occupied.get(node).copied()
    }
}

impl Scheduler for GreedyScheduler {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn schedule(&mut self, state: &SimulationState) -> Result<Schedule, SchedulerError> {
        let now = state.now();
        let mut schedule = Schedule::new();

        for (aircraft, flight) in unscheduled(state)? {
            let legs = route_legs(state.routing(), aircraft, flight)?;
            let mut targets: Vec<Target> = Vec::with_capacity(legs.len());
            // A pushback time that already passed starts from now.
            let pushback = flight.departure_time.max(now);
            let mut prev_edt = pushback;

            for (i, leg) in legs.iter().enumerate() {
                let earliest_arrival = if i == 0 {
                    pushback
                } else {
                    prev_edt + travel_time(leg.distance_ft, self.velocity_fps)
                };
                let arr = self.earliest_available(&leg.node, now).max(earliest_arrival);
                self.last_occupied.insert(leg.node.clone(), arr);

                let edt = (i + 1 < legs.len()).then_some(arr);
                targets.push(Target::new(leg.node.clone(), arr, edt));
                prev_edt = arr;
            }

            tracing::debug!(
                "greedy: {} {} targets, pushback {} runway {}",
                aircraft.callsign,
                targets.len(),
                targets.first().map(|t| t.eat).unwrap_or(now),
                prev_edt
            );
            schedule.insert(aircraft.callsign.clone(), Itinerary::new(targets));
        }
        Ok(schedule)
    }
}
