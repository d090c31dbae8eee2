//! Small synthetic airport shared by the unit tests.
//!
//! ```text
//!   G2 (47.832)
//!    |  PB2
//!   S1 (47.822) ---- T1 ---- R1 start ==== R1 ==== R1 end
//!    |  PB1
//!   G1 (47.812)
//! ```

use crate::config::SimConfig;
use crate::geo::{GeoPos, Proximity};
use crate::link::Link;
use crate::node::Node;
use crate::scenario::{parse_hhmm, Flight, FlightKind, Scenario};
use crate::surface::Surface;

const LNG: f64 = -122.079057;

fn link(name: &str, points: &[(f64, f64)]) -> Link {
    let nodes = points
        .iter()
        .enumerate()
        .map(|(i, &(lat, lng))| Node::new(format!("{name}#{i}"), lat, lng))
        .collect();
    Link::new(name, nodes).unwrap()
}

pub fn two_gate_surface() -> Surface {
    let mut surface = Surface::new("SIMPLE", GeoPos::new(47.822, -122.069));
    surface.gates = vec![Node::new("G1", 47.812, LNG), Node::new("G2", 47.832, LNG)];
    surface.spots = vec![Node::new("S1", 47.822, LNG)];
    surface.runways = vec![link("R1", &[(47.822, -122.069057), (47.822, -122.059057)])];
    surface.taxiways = vec![link("T1", &[(47.822, LNG), (47.822, -122.069057)])];
    surface.pushback_ways = vec![
        link("PB1", &[(47.812, LNG), (47.822, LNG)]),
        link("PB2", &[(47.832, LNG), (47.822, LNG)]),
    ];
    surface
}

pub fn proximity() -> Proximity {
    Proximity {
        close_node_ft: 10.0,
        close_node_link_ft: 10.0,
    }
}

/// Departure from `gate` through S1 to runway R1.
pub fn departure(surface: &Surface, callsign: &str, gate: &str, time: &str, appear: &str) -> Flight {
    Flight {
        kind: FlightKind::Departure,
        callsign: callsign.to_string(),
        model: "B737".to_string(),
        airport: surface.name.clone(),
        from_gate: surface.get_node(gate).unwrap().clone(),
        spot: surface.spots[0].clone(),
        runway: surface.runways[0].clone(),
        departure_time: parse_hhmm(time).unwrap(),
        appear_time: parse_hhmm(appear).unwrap(),
    }
}

/// `(callsign, gate, time, appear_time)` per departure.
pub fn scenario(surface: &Surface, flights: &[(&str, &str, &str, &str)]) -> Scenario {
    let departures = flights
        .iter()
        .map(|&(callsign, gate, time, appear)| departure(surface, callsign, gate, time, appear))
        .collect();
    Scenario::new(Vec::new(), departures).unwrap()
}

pub fn config() -> SimConfig {
    let mut config = SimConfig::default();
    config.airport = "simple".into();
    config.simulation.cache = false;
    config
}
