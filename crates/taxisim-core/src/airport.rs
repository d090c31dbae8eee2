//! Active aircraft on a surface, plus per-gate waiting queues.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::aircraft::Aircraft;
use crate::conflict::{detect_conflicts, Conflict};
use crate::error::AirportError;
use crate::geo::Proximity;
use crate::node::Node;
use crate::schedule::Schedule;
use crate::surface::Surface;

/// Serializable part of an [`Airport`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AirportState {
    pub aircraft: Vec<Aircraft>,
    pub gate_queue: BTreeMap<String, VecDeque<Aircraft>>,
}

#[derive(Debug, Clone)]
pub struct Airport {
    surface: Arc<Surface>,
    proximity: Proximity,
    aircraft: Vec<Aircraft>,
    gate_queue: BTreeMap<String, VecDeque<Aircraft>>,
}

impl Airport {
    pub fn new(surface: Arc<Surface>, proximity: Proximity) -> Self {
        Self {
            surface,
            proximity,
            aircraft: Vec::new(),
            gate_queue: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.surface.name
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn proximity(&self) -> &Proximity {
        &self.proximity
    }

    pub fn aircraft(&self) -> &[Aircraft] {
        &self.aircraft
    }

    pub fn get_aircraft(&self, callsign: &str) -> Option<&Aircraft> {
        self.aircraft.iter().find(|a| a.callsign == callsign)
    }

    pub fn get_aircraft_mut(&mut self, callsign: &str) -> Option<&mut Aircraft> {
        self.aircraft.iter_mut().find(|a| a.callsign == callsign)
    }

    pub fn is_occupied_at(&self, node: &Node) -> bool {
        self.aircraft
            .iter()
            .any(|a| a.location().is_close_to(node, self.proximity.close_node_ft))
    }

    /// Add an aircraft at its current location, or queue it behind the
    /// aircraft already parked there. Returns false when queued.
    pub fn add_aircraft(&mut self, aircraft: Aircraft) -> bool {
        let gate = aircraft.location().clone();
        let queued = self.gate_queue.get(&gate.name).is_some_and(|q| !q.is_empty());
        if queued || self.is_occupied_at(&gate) {
            self.gate_queue.entry(gate.name).or_default().push_back(aircraft);
            return false;
        }
        self.aircraft.push(aircraft);
        true
    }

    /// Move queue heads onto their gates once the gate is free. Returns the
    /// admitted callsigns.
    pub fn admit_queued(&mut self) -> Vec<String> {
        let mut admitted = Vec::new();
        let gates: Vec<String> = self.gate_queue.keys().cloned().collect();
        for gate in gates {
            let free = match self.gate_queue.get(&gate).and_then(|q| q.front()) {
                Some(head) => !self.is_occupied_at(head.location()),
                None => false,
            };
            if !free {
                continue;
            }
            if let Some(aircraft) = self.gate_queue.get_mut(&gate).and_then(VecDeque::pop_front) {
                admitted.push(aircraft.callsign.clone());
                self.aircraft.push(aircraft);
            }
        }
        self.gate_queue.retain(|_, q| !q.is_empty());
        admitted
    }

    pub fn queue_size(&self) -> usize {
        self.gate_queue.values().map(VecDeque::len).sum()
    }

    pub fn remove_aircraft(&mut self, callsign: &str) -> Option<Aircraft> {
        let pos = self.aircraft.iter().position(|a| a.callsign == callsign)?;
        Some(self.aircraft.remove(pos))
    }

    /// Install a copy of every scheduled itinerary. Fails before touching any
    /// pilot if a scheduled aircraft is not here.
    pub fn apply_schedule(&mut self, schedule: &Schedule, now: NaiveTime) -> Result<usize, AirportError> {
        if let Some((missing, _)) = schedule
            .iter()
            .find(|(callsign, _)| self.get_aircraft(callsign).is_none())
        {
            return Err(AirportError::UnknownAircraft(missing.to_string()));
        }
        let mut installed = 0;
        for (callsign, itinerary) in schedule.iter() {
            if let Some(aircraft) = self.get_aircraft_mut(callsign) {
                if aircraft.install_itinerary(itinerary, now) {
                    installed += 1;
                }
            }
        }
        Ok(installed)
    }

    /// Advance every pilot to `now`.
    pub fn tick(&mut self, now: NaiveTime) {
        let close_ft = self.proximity.close_node_ft;
        for aircraft in &mut self.aircraft {
            aircraft.tick(now, close_ft);
        }
    }

    pub fn conflicts(&self, now: NaiveTime) -> Vec<Conflict> {
        detect_conflicts(&self.aircraft, now, self.proximity.close_node_ft)
    }

    pub fn state(&self) -> AirportState {
        AirportState {
            aircraft: self.aircraft.clone(),
            gate_queue: self.gate_queue.clone(),
        }
    }

    pub fn restore(&mut self, state: AirportState) {
        self.aircraft = state.aircraft;
        self.gate_queue = state.gate_queue;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::itinerary::{Itinerary, Target};

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn airport() -> Airport {
        Airport::new(Arc::new(fixtures::two_gate_surface()), fixtures::proximity())
    }

    #[test]
    fn test_three_aircraft_at_one_node_is_one_conflict() {
        let mut airport = airport();
        let n1 = airport.surface().spots[0].clone();
        for callsign in ["A1", "A2", "A3"] {
            airport.aircraft.push(Aircraft::new(callsign, "B737", n1.clone()));
        }
        let conflicts = airport.conflicts(t(1, 0, 0));
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].callsigns.len(), 3);
        assert_eq!(conflicts[0].node, n1);
        assert!(airport.is_occupied_at(&n1));
    }

    #[test]
    fn test_occupied_gate_queues_until_free() {
        let mut airport = airport();
        let g1 = airport.surface().gates[0].clone();
        assert!(airport.add_aircraft(Aircraft::new("A1", "B737", g1.clone())));
        assert!(!airport.add_aircraft(Aircraft::new("A2", "B737", g1.clone())));
        assert_eq!(airport.aircraft().len(), 1);
        assert_eq!(airport.queue_size(), 1);

        assert!(airport.admit_queued().is_empty());
        airport.remove_aircraft("A1").unwrap();
        assert_eq!(airport.admit_queued(), vec!["A2".to_string()]);
        assert_eq!(airport.queue_size(), 0);
        assert_eq!(airport.aircraft()[0].callsign, "A2");
    }

    #[test]
    fn test_apply_schedule_copies_itinerary() {
        let mut airport = airport();
        let g1 = airport.surface().gates[0].clone();
        let s1 = airport.surface().spots[0].clone();
        airport.add_aircraft(Aircraft::new("A1", "B737", g1.clone()));

        let mut schedule = Schedule::new();
        schedule.insert(
            "A1",
            Itinerary::new(vec![
                Target::new(g1, t(1, 0, 0), Some(t(1, 0, 0))),
                Target::new(s1, t(1, 5, 0), None),
            ]),
        );
        assert_eq!(airport.apply_schedule(&schedule, t(0, 59, 0)).unwrap(), 1);

        // Mutating the schedule afterwards does not reach the pilot.
        if let Some(itinerary) = schedule.get_mut("A1") {
            itinerary.add_delay(chrono::TimeDelta::seconds(600));
        }
        let installed = airport.get_aircraft("A1").and_then(Aircraft::itinerary).unwrap();
        assert_eq!(installed.next_target().unwrap().edt, Some(t(1, 0, 0)));
    }

    #[test]
    fn test_apply_schedule_rejects_unknown_aircraft() {
        let mut airport = airport();
        let g1 = airport.surface().gates[0].clone();
        let mut schedule = Schedule::new();
        schedule.insert(
            "GHOST",
            Itinerary::new(vec![Target::new(g1, t(1, 0, 0), None)]),
        );
        assert_eq!(
            airport.apply_schedule(&schedule, t(1, 0, 0)),
            Err(AirportError::UnknownAircraft("GHOST".to_string()))
        );
    }
}
