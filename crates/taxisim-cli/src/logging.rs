//! Tracing setup shared by the binaries.

use taxisim_core::LoggerConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const TARGETS: [&str; 5] = [
    "taxisim_core",
    "taxisim_cli",
    "taxisim",
    "taxisim_batch",
    "taxisim_routes",
];

/// Install the global subscriber. The plan's level applies to the simulator
/// crates; `RUST_LOG` covers everything else.
pub fn init_tracing(config: &LoggerConfig) -> anyhow::Result<()> {
    let mut filter = EnvFilter::from_default_env();
    for target in TARGETS {
        filter = filter.add_directive(format!("{target}={}", config.level).parse()?);
    }

    let (plain, json) = if config.json {
        (None, Some(fmt::layer().json().with_current_span(false)))
    } else {
        (Some(fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .try_init()?;
    Ok(())
}
