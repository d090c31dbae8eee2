pub mod aircraft;
pub mod airport;
pub mod analyst;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod error;
pub mod geo;
pub mod itinerary;
pub mod link;
pub mod node;
pub mod route;
pub mod routing;
pub mod scenario;
pub mod schedule;
pub mod scheduler;
pub mod simulation;
pub mod state_logger;
pub mod surface;
pub mod uncertainty;

#[cfg(test)]
mod fixtures;

pub use aircraft::{Aircraft, Pilot, State};
pub use airport::{Airport, AirportState};
pub use analyst::{Analyst, Metrics, ScheduleRecord, TickRecord};
pub use clock::Clock;
pub use config::{
    BatchConfig, LoggerConfig, SchedulerConfig, SchedulerKind, SimConfig, SimulationConfig,
    SimulatorConfig, UncertaintyConfig,
};
pub use conflict::{detect_conflicts, Conflict};
pub use error::{
    AirportError, ClockError, ConfigError, ErrorKind, ItineraryError, OutputError, RoutingError,
    ScenarioError, SchedulerError, SimulationError, SurfaceError,
};
pub use geo::{haversine_distance, GeoPos, Proximity};
pub use itinerary::{Itinerary, Target};
pub use link::Link;
pub use node::Node;
pub use route::{Leg, Route};
pub use routing::RoutingExpert;
pub use scenario::{Flight, FlightKind, Scenario};
pub use schedule::Schedule;
pub use scheduler::{GreedyScheduler, PredictiveScheduler, Scheduler};
pub use simulation::{RunSummary, Simulation, SimulationSnapshot, SimulationState, StopReason};
pub use state_logger::StateLogger;
pub use surface::Surface;
pub use uncertainty::Uncertainty;
