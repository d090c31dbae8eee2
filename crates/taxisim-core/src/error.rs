//! Error types for the taxi simulator.
//!
//! Every error exposes a [`ErrorKind`] tag so the runner can decide whether
//! to keep going, flush and stop, or exit with a failure code.

use std::io;
use std::path::PathBuf;

use chrono::NaiveTime;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification used for exit codes and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing files, malformed JSON, unresolved names.
    Config,
    /// Disconnected or inconsistent routing graph.
    Graph,
    /// Caller bug or broken model invariant.
    Invariant,
    /// Conflict resolution gave up and the run asked to abort.
    ConflictOverflow,
    /// Natural end of the simulated day.
    EndOfDay,
    /// Output or cache I/O.
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Graph => "graph",
            Self::Invariant => "invariant",
            Self::ConflictOverflow => "conflict_overflow",
            Self::EndOfDay => "end_of_day",
            Self::Io => "io",
        }
    }
}

/// Surface loading and topology errors.
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed surface file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("link {0} needs at least two nodes")]
    TooFewNodes(String),

    #[error("node {0} has coordinates out of range")]
    InvalidCoordinate(String),

    #[error("node {node} is not on link {link}")]
    NodeNotOnLink { node: String, link: String },

    #[error("cannot break link {link} at its endpoint {node}")]
    BreakAtEndpoint { node: String, link: String },
}

impl SurfaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::Parse { .. } | Self::InvalidCoordinate(_) => ErrorKind::Config,
            Self::TooFewNodes(_) | Self::NodeNotOnLink { .. } | Self::BreakAtEndpoint { .. } => {
                ErrorKind::Graph
            }
        }
    }
}

/// Routing graph and routing cache errors.
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("link {link} does not connect to the end of route {from} -> {to}")]
    NotConnected {
        link: String,
        from: String,
        to: String,
    },

    #[error("incomplete route found from {from} to {to}")]
    IncompleteRoute { from: String, to: String },

    #[error("routing cache {path}: {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("routing cache {path} is unreadable: {reason}")]
    CacheFormat { path: PathBuf, reason: String },

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

impl RoutingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConnected { .. } | Self::IncompleteRoute { .. } => ErrorKind::Graph,
            Self::CacheIo { .. } | Self::CacheFormat { .. } => ErrorKind::Io,
            Self::Surface(e) => e.kind(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItineraryError {
    #[error("itinerary has no targets left")]
    Empty,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("end of the day reached at {0}")]
    EndOfDay(NaiveTime),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AirportError {
    #[error("scheduled aircraft {0} is not at the airport")]
    UnknownAircraft(String),
}

/// Scenario file errors.
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed scenario {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("flight {callsign}: unknown {role} {name}")]
    UnknownName {
        callsign: String,
        role: &'static str,
        name: String,
    },

    #[error("flight {callsign}: invalid time {value:?} (expected HHMM)")]
    InvalidTime { callsign: String, value: String },

    #[error("duplicate callsign {0}")]
    DuplicateCallsign(String),
}

impl ScenarioError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("no route for {callsign} from {from} to {to}")]
    NoRoute {
        callsign: String,
        from: String,
        to: String,
    },

    #[error("aircraft {0} has no flight in the scenario")]
    UnknownFlight(String),

    #[error(transparent)]
    Airport(#[from] AirportError),
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoRoute { .. } => ErrorKind::Graph,
            Self::UnknownFlight(_) | Self::Airport(_) => ErrorKind::Invariant,
        }
    }
}

/// Plan file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read plan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed plan {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("unknown configuration key {0}")]
    UnknownKey(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}

/// Errors writing run outputs.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OutputError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Io
    }
}

/// Umbrella error for a simulation run.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Airport(#[from] AirportError),

    #[error(transparent)]
    Itinerary(#[from] ItineraryError),

    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("{unsolvable} unsolvable conflict(s) in schedule at {time}")]
    ConflictOverflow { unsolvable: u32, time: NaiveTime },
}

impl SimulationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(e) => e.kind(),
            Self::Surface(e) => e.kind(),
            Self::Routing(e) => e.kind(),
            Self::Scenario(e) => e.kind(),
            Self::Scheduler(e) => e.kind(),
            Self::Airport(_) | Self::Itinerary(_) => ErrorKind::Invariant,
            Self::Clock(_) => ErrorKind::EndOfDay,
            Self::Output(e) => e.kind(),
            Self::ConflictOverflow { .. } => ErrorKind::ConflictOverflow,
        }
    }

    pub fn is_end_of_day(&self) -> bool {
        self.kind() == ErrorKind::EndOfDay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_carries_a_kind() {
        let err = SimulationError::from(ClockError::EndOfDay(NaiveTime::MIN));
        assert!(err.is_end_of_day());

        let err = SimulationError::from(SchedulerError::NoRoute {
            callsign: "UA1".into(),
            from: "G1".into(),
            to: "R1".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Graph);

        let err = SimulationError::ConflictOverflow {
            unsolvable: 2,
            time: NaiveTime::MIN,
        };
        assert_eq!(err.kind().as_str(), "conflict_overflow");
    }
}
