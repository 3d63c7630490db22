#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a Civitas scenario headlessly.

mod scenario;

use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use civitas_core::{Command, Event};
use civitas_system_spawning::Spawning;
use civitas_world::{self as world, query, save_world, World};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use scenario::Scenario;

const PROGRESS_INTERVAL: u64 = 100;

/// Runs a city scenario without a renderer and reports what happened.
#[derive(Parser, Debug)]
#[command(name = "civitas")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario file (.toml)
    #[arg(long)]
    scenario: PathBuf,

    /// Number of ticks to simulate (default: the scenario's)
    #[arg(long)]
    ticks: Option<u64>,

    /// Random seed (default: the scenario's)
    #[arg(long)]
    seed: Option<u64>,

    /// Write a JSON savegame of the final city to this path
    #[arg(long)]
    save: Option<PathBuf>,
}

/// Running totals of the notable events of a run.
#[derive(Debug, Default)]
struct Tally {
    walkers_spawned: usize,
    walkers_died: usize,
    fires_reported: usize,
    disasters: usize,
    rejected_builds: usize,
}

impl Tally {
    fn record(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::WalkerSpawned { .. } => self.walkers_spawned += 1,
                Event::WalkerDied { walker, kind, pos } => {
                    self.walkers_died += 1;
                    debug!(walker = walker.get(), ?kind, i = pos.i(), j = pos.j(), "walker died");
                }
                Event::FireDetected { prefecture, pos } => {
                    self.fires_reported += 1;
                    info!(
                        prefecture = prefecture.get(),
                        i = pos.i(),
                        j = pos.j(),
                        "fire reported"
                    );
                }
                Event::DisasterStruck { pos, kind } => {
                    self.disasters += 1;
                    info!(?kind, i = pos.i(), j = pos.j(), "disaster struck");
                }
                Event::BuildRejected { kind, pos, reason } => {
                    self.rejected_builds += 1;
                    warn!(?kind, i = pos.i(), j = pos.j(), %reason, "build rejected");
                }
                Event::WarningMessage {
                    construction,
                    warning,
                } => warn!(construction = construction.get(), ?warning, "construction warning"),
                _ => {}
            }
        }
    }
}

/// Entry point for the Civitas command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let scenario = Scenario::load(&args.scenario)?;
    let ticks = args.ticks.unwrap_or_else(|| scenario.ticks());
    let mut world = World::with_config(scenario.world_config(args.seed));
    info!(
        scenario = %args.scenario.display(),
        ticks,
        "{}",
        query::welcome_banner(&world)
    );

    let mut tally = Tally::default();
    let mut events = Vec::new();
    for command in scenario.layout()? {
        world::apply(&mut world, command, &mut events);
    }
    tally.record(&events);

    let mut spawning = Spawning::new(scenario.spawning_config());
    for _ in 0..ticks {
        let events = step(&mut world, &mut spawning, &scenario);
        tally.record(&events);

        let tick = query::tick(&world);
        if tick % PROGRESS_INTERVAL == 0 {
            info!(
                tick,
                constructions = query::constructions(&world).count(),
                walkers = query::walker_view(&world).iter().count(),
                balance = query::funds(&world).balance(),
                "progress"
            );
        }
    }

    info!(
        tick = query::tick(&world),
        balance = query::funds(&world).balance(),
        walkers_spawned = tally.walkers_spawned,
        walkers_died = tally.walkers_died,
        fires_reported = tally.fires_reported,
        disasters = tally.disasters,
        rejected_builds = tally.rejected_builds,
        "run finished"
    );

    if let Some(path) = args.save.as_deref() {
        write_savegame(&world, path)?;
    }
    Ok(())
}

/// Advances the world one tick and feeds the result through the spawning
/// system and the scenario script.
fn step(world: &mut World, spawning: &mut Spawning, scenario: &Scenario) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(world, Command::Tick, &mut events);

    let prefectures = query::prefecture_view(world);
    let mut commands = Vec::new();
    spawning.handle(&events, &prefectures, &mut commands);
    commands.extend(scenario.scripted(world));

    for command in commands {
        world::apply(world, command, &mut events);
    }
    events
}

fn write_savegame(world: &World, path: &Path) -> Result<()> {
    let savegame =
        serde_json::to_string_pretty(&save_world(world)).context("failed to encode savegame")?;
    fs::write(path, savegame)
        .with_context(|| format!("failed to write savegame to {}", path.display()))?;
    info!(path = %path.display(), "savegame written");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
