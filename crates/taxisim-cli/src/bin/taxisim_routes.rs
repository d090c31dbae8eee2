//! Print shortest routes from gates or spots to every runway start.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use taxisim_cli::{init_tracing, load_plan, report};
use taxisim_core::{RoutingExpert, Surface};

/// Routing table inspector
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Plan file (JSON) naming the airport
    #[arg(long, short)]
    plan: PathBuf,

    /// Start node names; every gate and spot when omitted
    #[arg(long)]
    from: Vec<String>,

    /// Only print distances
    #[arg(long)]
    brief: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = load_plan(&args.plan, &[])
        .with_context(|| format!("loading plan {}", args.plan.display()))?;
    init_tracing(&config.logger)?;

    let proximity = config.proximity();
    let mut surface = Surface::load(&config.airport_dir())?;
    surface.break_links(&proximity)?;
    let routing = if config.simulation.cache {
        RoutingExpert::with_cache(&surface, proximity, &config.simulator.cache_dir)?
    } else {
        RoutingExpert::new(&surface, proximity)?
    };

    let sources: Vec<_> = if args.from.is_empty() {
        surface.nodes().cloned().collect()
    } else {
        args.from
            .iter()
            .map(|name| {
                surface
                    .get_node(name)
                    .cloned()
                    .with_context(|| format!("no gate or spot named {name}"))
            })
            .collect::<anyhow::Result<_>>()?
    };

    for src in &sources {
        for dst in routing.destinations() {
            let Some(route) = routing.shortest_route(src, dst) else {
                println!("{} -> {}: unreachable", src.name, dst.name);
                continue;
            };
            println!("{} -> {}: {:.0} ft", src.name, dst.name, route.distance());
            if !args.brief {
                let legs = route.legs(proximity.close_node_ft);
                let names: Vec<String> = legs.iter().map(|l| routing.canonical(&l.node).name).collect();
                println!("  {}", names.join(" > "));
            }
        }
    }
    Ok(())
}
