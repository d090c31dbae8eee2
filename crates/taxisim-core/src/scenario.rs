//! Flight schedule for one simulated day.
//!
//! A scenario file looks like:
//!
//! ```json
//! { "arrivals": [],
//!   "departures": [{ "callsign": "UA1", "model": "B737", "airport": "SIMPLE",
//!                    "gate": "G1", "spot": "S1", "runway": "R1",
//!                    "time": "0235", "appear_time": "0230" }] }
//! ```
//!
//! Names resolve against a loaded [`Surface`]. Arrivals are parsed and kept
//! but nothing schedules them yet.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::NaiveTime;
use serde::Deserialize;

use crate::aircraft::Aircraft;
use crate::error::ScenarioError;
use crate::link::Link;
use crate::node::Node;
use crate::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightKind {
    Arrival,
    Departure,
}

/// Immutable flight descriptor.
#[derive(Debug, Clone)]
pub struct Flight {
    pub kind: FlightKind,
    pub callsign: String,
    pub model: String,
    pub airport: String,
    pub from_gate: Node,
    pub spot: Node,
    pub runway: Link,
    /// Scheduled pushback time.
    pub departure_time: NaiveTime,
    pub appear_time: NaiveTime,
}

impl Flight {
    /// A fresh aircraft parked at the flight's gate.
    pub fn aircraft(&self) -> Aircraft {
        Aircraft::new(self.callsign.clone(), self.model.clone(), self.from_gate.clone())
    }

    pub fn runway_start(&self) -> &Node {
        self.runway.start()
    }
}

#[derive(Debug, Deserialize)]
struct RawScenario {
    #[serde(default)]
    arrivals: Vec<RawFlight>,
    #[serde(default)]
    departures: Vec<RawFlight>,
}

#[derive(Debug, Deserialize)]
struct RawFlight {
    callsign: String,
    model: String,
    #[serde(default)]
    airport: String,
    gate: String,
    spot: String,
    runway: String,
    time: String,
    appear_time: String,
}

#[derive(Debug, Clone, Default)]
pub struct Scenario {
    arrivals: Vec<Flight>,
    /// Ordered by appear time, then callsign.
    departures: Vec<Flight>,
    lookup: HashMap<String, (FlightKind, usize)>,
}

impl Scenario {
    pub fn new(arrivals: Vec<Flight>, mut departures: Vec<Flight>) -> Result<Self, ScenarioError> {
        departures.sort_by(|a, b| {
            a.appear_time
                .cmp(&b.appear_time)
                .then_with(|| a.callsign.cmp(&b.callsign))
        });

        let mut lookup = HashMap::new();
        let tagged = arrivals
            .iter()
            .enumerate()
            .map(|(i, f)| (f, FlightKind::Arrival, i))
            .chain(departures.iter().enumerate().map(|(i, f)| (f, FlightKind::Departure, i)));
        for (flight, kind, i) in tagged {
            if lookup.insert(flight.callsign.clone(), (kind, i)).is_some() {
                return Err(ScenarioError::DuplicateCallsign(flight.callsign.clone()));
            }
        }

        Ok(Self {
            arrivals,
            departures,
            lookup,
        })
    }

    /// Parse a scenario file and resolve its names against `surface`.
    pub fn load(path: &Path, surface: &Surface) -> Result<Self, ScenarioError> {
        let text = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawScenario = serde_json::from_str(&text).map_err(|source| ScenarioError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let arrivals = raw
            .arrivals
            .into_iter()
            .map(|f| resolve(f, FlightKind::Arrival, surface))
            .collect::<Result<Vec<_>, _>>()?;
        let departures = raw
            .departures
            .into_iter()
            .map(|f| resolve(f, FlightKind::Departure, surface))
            .collect::<Result<Vec<_>, _>>()?;

        let scenario = Self::new(arrivals, departures)?;
        tracing::info!(
            "Loaded scenario {}: {} arrivals, {} departures",
            path.display(),
            scenario.arrivals.len(),
            scenario.departures.len()
        );
        for flight in &scenario.departures {
            tracing::debug!(
                "departure {} {} -> {} appears {} pushback {}",
                flight.callsign,
                flight.from_gate.name,
                flight.runway.name(),
                flight.appear_time,
                flight.departure_time
            );
        }
        Ok(scenario)
    }

    pub fn arrivals(&self) -> &[Flight] {
        &self.arrivals
    }

    pub fn departures(&self) -> &[Flight] {
        &self.departures
    }

    pub fn get_flight(&self, callsign: &str) -> Option<&Flight> {
        let &(kind, i) = self.lookup.get(callsign)?;
        match kind {
            FlightKind::Arrival => self.arrivals.get(i),
            FlightKind::Departure => self.departures.get(i),
        }
    }

    pub fn len(&self) -> usize {
        self.arrivals.len() + self.departures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse "HHMM".
pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    if value.len() != 4 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H%M").ok()
}

fn resolve(raw: RawFlight, kind: FlightKind, surface: &Surface) -> Result<Flight, ScenarioError> {
    let unknown = |role: &'static str, name: &str| ScenarioError::UnknownName {
        callsign: raw.callsign.clone(),
        role,
        name: name.to_string(),
    };
    let time = |value: &str| {
        parse_hhmm(value).ok_or_else(|| ScenarioError::InvalidTime {
            callsign: raw.callsign.clone(),
            value: value.to_string(),
        })
    };

    let from_gate = surface
        .gates
        .iter()
        .find(|n| n.name == raw.gate)
        .cloned()
        .ok_or_else(|| unknown("gate", &raw.gate))?;
    let spot = surface
        .spots
        .iter()
        .find(|n| n.name == raw.spot)
        .cloned()
        .ok_or_else(|| unknown("spot", &raw.spot))?;
    let runway = surface
        .runways
        .iter()
        .find(|l| l.name() == raw.runway)
        .cloned()
        .ok_or_else(|| unknown("runway", &raw.runway))?;
    let departure_time = time(&raw.time)?;
    let appear_time = time(&raw.appear_time)?;

    Ok(Flight {
        kind,
        callsign: raw.callsign,
        model: raw.model,
        airport: raw.airport,
        from_gate,
        spot,
        runway,
        departure_time,
        appear_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("0235"), NaiveTime::from_hms_opt(2, 35, 0));
        assert_eq!(parse_hhmm("2359"), NaiveTime::from_hms_opt(23, 59, 0));
        assert_eq!(parse_hhmm("2400"), None);
        assert_eq!(parse_hhmm("235"), None);
        assert_eq!(parse_hhmm("02:35"), None);
    }

    #[test]
    fn test_departures_sorted_and_looked_up() {
        let surface = fixtures::two_gate_surface();
        let scenario = fixtures::scenario(
            &surface,
            &[("A2", "G2", "0236", "0230"), ("A1", "G1", "0235", "0230")],
        );
        let order: Vec<&str> = scenario.departures().iter().map(|f| f.callsign.as_str()).collect();
        assert_eq!(order, ["A1", "A2"]);
        assert_eq!(scenario.get_flight("A2").unwrap().from_gate.name, "G2");
        assert!(scenario.get_flight("ZZ9").is_none());
    }

    #[test]
    fn test_duplicate_callsign_rejected() {
        let surface = fixtures::two_gate_surface();
        let flight = fixtures::departure(&surface, "A1", "G1", "0235", "0230");
        let err = Scenario::new(Vec::new(), vec![flight.clone(), flight]).unwrap_err();
        assert!(matches!(err, ScenarioError::DuplicateCallsign(c) if c == "A1"));
    }

    #[test]
    fn test_load_resolves_names() {
        let surface = fixtures::two_gate_surface();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        fs::write(
            &path,
            r#"{"arrivals": [], "departures": [
                {"callsign": "UA1", "model": "B737", "airport": "SIMPLE",
                 "gate": "G1", "spot": "S1", "runway": "R1",
                 "time": "0235", "appear_time": "0230"}]}"#,
        )
        .unwrap();
        let scenario = Scenario::load(&path, &surface).unwrap();
        let flight = scenario.get_flight("UA1").unwrap();
        assert_eq!(flight.kind, FlightKind::Departure);
        assert_eq!(flight.runway.name(), "R1");
        assert_eq!(flight.departure_time, NaiveTime::from_hms_opt(2, 35, 0).unwrap());
    }

    #[test]
    fn test_load_rejects_unknown_gate() {
        let surface = fixtures::two_gate_surface();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        fs::write(
            &path,
            r#"{"departures": [
                {"callsign": "UA1", "model": "B737", "gate": "G9", "spot": "S1",
                 "runway": "R1", "time": "0235", "appear_time": "0230"}]}"#,
        )
        .unwrap();
        let err = Scenario::load(&path, &surface).unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownName { role: "gate", .. }));
    }
}
