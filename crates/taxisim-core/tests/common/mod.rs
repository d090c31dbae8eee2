//! Synthetic two-gate airport written to disk the way real airport data is.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use taxisim_core::{RoutingExpert, Scenario, SimConfig, Simulation, SimulationState, Surface};

pub const AIRPORT: &str = "simple";
const LNG: f64 = -122.079057;

/// `(callsign, gate, time, appear_time)`
pub type Departure<'a> = (&'a str, &'a str, &'a str, &'a str);

fn write(path: PathBuf, body: serde_json::Value) {
    fs::write(path, serde_json::to_string_pretty(&body).unwrap()).unwrap();
}

/// Write surface and scenario files under `root/data/simple`.
pub fn write_airport(root: &Path, departures: &[Departure]) -> PathBuf {
    let dir = root.join("data").join(AIRPORT);
    fs::create_dir_all(&dir).unwrap();

    write(
        dir.join("airport-metadata.json"),
        json!({"name": "SIMPLE", "center": {"lat": 47.822, "lng": -122.069},
               "corners": [{"lat": 47.80, "lng": -122.09}, {"lat": 47.84, "lng": -122.09},
                           {"lat": 47.84, "lng": -122.05}, {"lat": 47.80, "lng": -122.05}]}),
    );
    write(
        dir.join("gates.json"),
        json!([{"name": "G1", "lat": 47.812, "lng": LNG}, {"name": "G2", "lat": 47.832, "lng": LNG}]),
    );
    write(dir.join("spots.json"), json!([{"name": "S1", "lat": 47.822, "lng": LNG}]));
    write(
        dir.join("runways.json"),
        json!([{"name": "R1", "nodes": [[-122.069057, 47.822], [-122.059057, 47.822]]}]),
    );
    write(
        dir.join("taxiways.json"),
        json!([{"name": "T1", "nodes": [[LNG, 47.822], [-122.069057, 47.822]]}]),
    );
    write(
        dir.join("pushback_ways.json"),
        json!([{"name": "PB1", "nodes": [[LNG, 47.812], [LNG, 47.822]]},
               {"name": "PB2", "nodes": [[LNG, 47.832], [LNG, 47.822]]}]),
    );

    let flights: Vec<serde_json::Value> = departures
        .iter()
        .map(|&(callsign, gate, time, appear)| {
            json!({"callsign": callsign, "model": "B737", "airport": "SIMPLE",
                   "gate": gate, "spot": "S1", "runway": "R1",
                   "time": time, "appear_time": appear})
        })
        .collect();
    write(dir.join("scenario.json"), json!({"arrivals": [], "departures": flights}));
    dir
}

/// Plan whose directories all live under `root`.
pub fn plan(root: &Path) -> SimConfig {
    let mut config = SimConfig::default();
    config.name = "test".into();
    config.airport = AIRPORT.into();
    config.simulator.data_dir = root.join("data");
    config.simulator.output_dir = root.join("output");
    config.simulator.cache_dir = root.join("cache");
    config.simulation.cache = false;
    config
}

/// Shared parts of a simulation: config, surface, scenario and routing.
pub type Parts = (Arc<SimConfig>, Arc<Surface>, Arc<Scenario>, Arc<RoutingExpert>);

pub fn load_parts(config: SimConfig) -> Parts {
    let proximity = config.proximity();
    let mut surface = Surface::load(&config.airport_dir()).unwrap();
    surface.break_links(&proximity).unwrap();
    let routing = RoutingExpert::new(&surface, proximity).unwrap();
    let scenario = Scenario::load(&config.scenario_path(), &surface).unwrap();
    (Arc::new(config), Arc::new(surface), Arc::new(scenario), Arc::new(routing))
}

pub fn load_state(config: SimConfig) -> SimulationState {
    let (config, surface, scenario, routing) = load_parts(config);
    SimulationState::new(config, surface, scenario, routing).unwrap()
}

pub fn load_simulation(parts: &Parts) -> Simulation {
    let (config, surface, scenario, routing) = parts;
    Simulation::new(
        Arc::clone(config),
        Arc::clone(surface),
        Arc::clone(scenario),
        Arc::clone(routing),
    )
    .unwrap()
}
