//! Entity paging simulation.
//!
//! Spawns a population of mobs, sweeps a player's view across it, and lets
//! the persistent section manager load and unload columns against an LMDB
//! database. Settings come from the environment, see [`config::SimConfig`].

mod config;
mod counters;
mod mob;
mod sim;

use std::time::Instant;

use rgb_entity::ManagerStats;
use tracing::info;

use crate::config::SimConfig;
use crate::sim::Simulation;

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rgb_entity_sim=info".parse()?)
                .add_directive("rgb_storage=info".parse()?),
        )
        .init();

    let config = SimConfig::from_env();
    info!("{config:?}");

    let started = Instant::now();
    let mut sim = Simulation::open(config)?;
    sim.populate();
    info!("stats columns: {}", ManagerStats::CSV_HEADER);
    sim.run();
    sim.dump_sections()?;

    let stats = sim.stats();
    let counters = sim.close()?;
    info!(
        "done in {:?}: {stats} | {counters}",
        started.elapsed()
    );

    Ok(())
}
