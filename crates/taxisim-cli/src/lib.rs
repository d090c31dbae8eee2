//! Taxi simulator command line tools.
//!
//! - taxisim: run one plan
//! - taxisim-batch: sweep one plan variable over a range
//! - taxisim-routes: print the routing table of an airport

pub mod batch;
pub mod logging;

use std::path::Path;
use std::process::ExitCode;

use taxisim_core::{ConfigError, ErrorKind, RoutingError, SimConfig, SimulationError, SurfaceError};

pub use logging::init_tracing;

/// Read a plan and apply `key=value` overrides from the command line.
pub fn load_plan(path: &Path, overrides: &[String]) -> anyhow::Result<SimConfig> {
    let mut config = SimConfig::from_file(path)?;
    for item in overrides {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| ConfigError::Invalid(format!("override {item:?} is not key=value")))?;
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("override {key} needs a number, got {value:?}")))?;
        config = config.with_override(key.trim(), value)?;
    }
    Ok(config)
}

/// Error kind carried anywhere in the chain, if any.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<SimulationError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<ConfigError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<SurfaceError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<RoutingError>() {
            Some(e.kind())
        } else {
            None
        }
    })
}

pub fn exit_code(kind: Option<ErrorKind>) -> u8 {
    match kind {
        Some(ErrorKind::EndOfDay) => 0,
        Some(ErrorKind::Config) => 2,
        Some(ErrorKind::Graph) => 3,
        Some(ErrorKind::ConflictOverflow) => 4,
        _ => 1,
    }
}

/// Log a failed run and turn it into the process exit code.
pub fn report(err: &anyhow::Error) -> ExitCode {
    let kind = error_kind(err);
    tracing::error!(
        kind = kind.map(|k| k.as_str()).unwrap_or("other"),
        "{:#}",
        err
    );
    eprintln!("error: {err:#}");
    ExitCode::from(exit_code(kind))
}
