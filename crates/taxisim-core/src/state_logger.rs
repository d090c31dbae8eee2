//! Newline-delimited JSON log of every aircraft's state per tick.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::Serialize;

use crate::aircraft::{Aircraft, State};
use crate::analyst::format_time;
use crate::error::OutputError;
use crate::node::Node;

pub const STATES_FILE: &str = "states.json";

#[derive(Debug, Serialize)]
struct TargetLine<'a> {
    node: &'a str,
    eat: String,
    edt: Option<String>,
}

#[derive(Debug, Serialize)]
struct AircraftLine<'a> {
    callsign: &'a str,
    state: State,
    location: &'a Node,
    itinerary: Option<Vec<TargetLine<'a>>>,
    itinerary_index: Option<usize>,
}

#[derive(Debug, Serialize)]
struct StateLine<'a> {
    time: String,
    aircrafts: Vec<AircraftLine<'a>>,
}

impl<'a> AircraftLine<'a> {
    fn new(aircraft: &'a Aircraft) -> Self {
        let itinerary = aircraft.itinerary();
        Self {
            callsign: &aircraft.callsign,
            state: aircraft.state(),
            location: aircraft.location(),
            itinerary: itinerary.map(|i| {
                i.targets()
                    .map(|t| TargetLine {
                        node: &t.node.name,
                        eat: format_time(t.eat),
                        edt: t.edt.map(format_time),
                    })
                    .collect()
            }),
            itinerary_index: itinerary.map(|i| i.index()),
        }
    }
}

pub struct StateLogger {
    path: PathBuf,
    out: BufWriter<File>,
}

impl StateLogger {
    /// Create (or truncate) `states.json` inside `dir`.
    pub fn create(dir: &Path) -> Result<Self, OutputError> {
        let path = dir.join(STATES_FILE);
        let file = File::create(&path).map_err(|source| OutputError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
        })
    }

    pub fn log(&mut self, time: NaiveTime, aircraft: &[Aircraft]) -> Result<(), OutputError> {
        let line = StateLine {
            time: format_time(time),
            aircrafts: aircraft.iter().map(AircraftLine::new).collect(),
        };
        serde_json::to_writer(&mut self.out, &line)?;
        self.out.write_all(b"\n").map_err(|source| self.io_error(source))
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.out.flush().map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> OutputError {
        OutputError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itinerary::{Itinerary, Target};

    #[test]
    fn test_one_line_per_tick() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = StateLogger::create(dir.path()).unwrap();

        let g1 = Node::new("G1", 47.812, -122.079);
        let s1 = Node::new("S1", 47.822, -122.079);
        let now = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        let mut busy = Aircraft::new("A1", "B737", g1.clone());
        busy.install_itinerary(
            &Itinerary::new(vec![
                Target::new(g1.clone(), now, Some(now)),
                Target::new(s1, NaiveTime::from_hms_opt(2, 31, 0).unwrap(), None),
            ]),
            now,
        );
        let idle = Aircraft::new("A2", "B737", g1);

        logger.log(now, &[busy.clone(), idle]).unwrap();
        logger.log(now, &[busy]).unwrap();
        logger.flush().unwrap();

        let text = std::fs::read_to_string(dir.path().join(STATES_FILE)).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["time"], "02:30:00");
        assert_eq!(lines[0]["aircrafts"][0]["callsign"], "A1");
        assert_eq!(lines[0]["aircrafts"][0]["state"], "stop");
        assert_eq!(lines[0]["aircrafts"][0]["itinerary"][1]["node"], "S1");
        assert_eq!(lines[0]["aircrafts"][0]["itinerary_index"], 0);
        assert!(lines[0]["aircrafts"][1]["itinerary"].is_null());
        assert_eq!(lines[1]["aircrafts"].as_array().unwrap().len(), 1);
    }
}
