//! Schedulers turn the current simulation state into a [`Schedule`].
//!
//! Two disciplines are available:
//! - [`GreedyScheduler`]: first-come first-served node reservations.
//! - [`PredictiveScheduler`]: nominal routes, delayed one grain at a time
//!   until a look-ahead run shows no conflict.

mod greedy;
mod predictive;

pub use greedy::GreedyScheduler;
pub use predictive::PredictiveScheduler;

use chrono::{NaiveTime, TimeDelta};

use crate::aircraft::Aircraft;
use crate::config::{SchedulerConfig, SchedulerKind};
use crate::error::SchedulerError;
use crate::itinerary::{Itinerary, Target};
use crate::route::Leg;
use crate::routing::RoutingExpert;
use crate::scenario::{Flight, FlightKind, Scenario};
use crate::schedule::Schedule;
use crate::simulation::SimulationState;

pub trait Scheduler: Send {
    fn name(&self) -> &'static str;

    /// Plan itineraries for the aircraft this discipline is responsible for.
    fn schedule(&mut self, state: &SimulationState) -> Result<Schedule, SchedulerError>;
}

pub fn from_config(config: &SchedulerConfig) -> Box<dyn Scheduler> {
    match config.name {
        SchedulerKind::Greedy => Box::new(GreedyScheduler::new(config)),
        SchedulerKind::Predictive => Box::new(PredictiveScheduler::new(config)),
    }
}

/// Whole seconds to cover `distance_ft`, rounded up.
pub fn travel_time(distance_ft: f64, velocity_fps: f64) -> TimeDelta {
    TimeDelta::seconds((distance_ft / velocity_fps).ceil() as i64)
}

/// Departure flight of an active aircraft.
pub(crate) fn departure_of<'a>(scenario: &'a Scenario, aircraft: &Aircraft) -> Result<&'a Flight, SchedulerError> {
    scenario
        .get_flight(&aircraft.callsign)
        .filter(|f| f.kind == FlightKind::Departure)
        .ok_or_else(|| SchedulerError::UnknownFlight(aircraft.callsign.clone()))
}

/// Waypoints from the aircraft's location to its runway start, each on the
/// representative node of its place.
pub(crate) fn route_legs(
    routing: &RoutingExpert,
    aircraft: &Aircraft,
    flight: &Flight,
) -> Result<Vec<Leg>, SchedulerError> {
    let route = routing
        .shortest_route(aircraft.location(), flight.runway_start())
        .ok_or_else(|| SchedulerError::NoRoute {
            callsign: aircraft.callsign.clone(),
            from: aircraft.location().name.clone(),
            to: flight.runway_start().name.clone(),
        })?;
    let mut legs = route.legs(routing.proximity().close_node_ft);
    for leg in &mut legs {
        leg.node = routing.canonical(&leg.node);
    }
    Ok(legs)
}

/// Unhindered itinerary over `legs`, leaving the first waypoint at `start`.
pub(crate) fn nominal_itinerary(legs: &[Leg], start: NaiveTime, velocity_fps: f64) -> Itinerary {
    let mut targets: Vec<Target> = Vec::with_capacity(legs.len());
    let mut time = start;
    for (i, leg) in legs.iter().enumerate() {
        if i > 0 {
            time += travel_time(leg.distance_ft, velocity_fps);
        }
        let edt = (i + 1 < legs.len()).then_some(time);
        targets.push(Target::new(leg.node.clone(), time, edt));
    }
    Itinerary::new(targets)
}

/// Active departures without an installed itinerary, by departure time then
/// callsign.
pub(crate) fn unscheduled<'a>(state: &'a SimulationState) -> Result<Vec<(&'a Aircraft, &'a Flight)>, SchedulerError> {
    let mut pending = Vec::new();
    for aircraft in state.airport().aircraft() {
        if aircraft.itinerary().is_some() {
            continue;
        }
        let flight = departure_of(state.scenario(), aircraft)?;
        pending.push((aircraft, flight));
    }
    pending.sort_by(|(a, fa), (b, fb)| {
        fa.departure_time
            .cmp(&fb.departure_time)
            .then_with(|| a.callsign.cmp(&b.callsign))
    });
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_travel_time_rounds_up() {
        assert_eq!(travel_time(0.0, 30.0), TimeDelta::zero());
        assert_eq!(travel_time(30.0, 30.0), TimeDelta::seconds(1));
        assert_eq!(travel_time(31.0, 30.0), TimeDelta::seconds(2));
    }

    #[test]
    fn test_nominal_itinerary_timings() {
        let legs = vec![
            Leg {
                node: Node::new("G1", 0.0, 0.0),
                distance_ft: 0.0,
            },
            Leg {
                node: Node::new("S1", 0.0, 0.001),
                distance_ft: 300.0,
            },
            Leg {
                node: Node::new("R1", 0.0, 0.002),
                distance_ft: 601.0,
            },
        ];
        let itinerary = nominal_itinerary(&legs, t(2, 35, 0), 30.0);
        let targets: Vec<&Target> = itinerary.targets().collect();
        assert_eq!(targets[0].eat, t(2, 35, 0));
        assert_eq!(targets[0].edt, Some(t(2, 35, 0)));
        assert_eq!(targets[1].eat, t(2, 35, 10));
        assert_eq!(targets[1].edt, Some(t(2, 35, 10)));
        assert_eq!(targets[2].eat, t(2, 35, 31));
        assert_eq!(targets[2].edt, None);
    }
}
