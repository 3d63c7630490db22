//! TOML scenarios describing the city a headless run starts from.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use civitas_core::{Command, ConstructionId, ConstructionKind, Terrain, TilePos};
use civitas_system_spawning::Config;
use civitas_world::{query, World, WorldConfig};
use serde::Deserialize;
use tracing::warn;

const SUPPORTED_SCENARIO_VERSION: u32 = 1;
const DEFAULT_TICKS: u64 = 600;
const DEFAULT_PATROL_INTERVAL: u32 = 20;
const DEFAULT_WATER_SUPPLY: u32 = 100;

/// Starting city, spawning cadence and scripted protests of a run.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    version: u32,
    columns: u32,
    rows: u32,
    seed: Option<u64>,
    funds: Option<i64>,
    #[serde(default = "default_ticks")]
    ticks: u64,
    #[serde(default = "default_patrol_interval")]
    patrol_interval: u32,
    #[serde(default = "default_water_supply")]
    water_supply: u32,
    /// One string per row; `.` grass, `~` water, `#` rock, `T` tree, `=` road.
    #[serde(default)]
    terrain: Vec<String>,
    #[serde(default)]
    buildings: Vec<Placement>,
    #[serde(default)]
    houses: Vec<HouseSetup>,
    #[serde(default)]
    protestors: Vec<Protest>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Placement {
    kind: String,
    at: [i32; 2],
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HouseSetup {
    at: [i32; 2],
    level: u8,
    health: u8,
}

/// A protestor leaving the house at `house` once `tick` has elapsed.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Protest {
    house: [i32; 2],
    tick: u64,
}

const fn default_ticks() -> u64 {
    DEFAULT_TICKS
}

const fn default_patrol_interval() -> u32 {
    DEFAULT_PATROL_INTERVAL
}

const fn default_water_supply() -> u32 {
    DEFAULT_WATER_SUPPLY
}

const fn tile([i, j]: [i32; 2]) -> TilePos {
    TilePos::new(i, j)
}

impl Scenario {
    /// Reads and validates the scenario stored at `path`.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("scenario {} is invalid", path.display()))
    }

    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let scenario: Self =
            toml::from_str(contents).context("failed to parse scenario toml contents")?;
        if scenario.version != SUPPORTED_SCENARIO_VERSION {
            bail!(
                "unsupported scenario version {}; expected {}",
                scenario.version,
                SUPPORTED_SCENARIO_VERSION
            );
        }
        if scenario.terrain.len() > scenario.rows as usize {
            bail!(
                "terrain has {} rows but the map only {}",
                scenario.terrain.len(),
                scenario.rows
            );
        }
        if let Some((j, row)) = scenario
            .terrain
            .iter()
            .enumerate()
            .find(|(_, row)| row.chars().count() > scenario.columns as usize)
        {
            bail!(
                "terrain row {j} is {} tiles wide but the map only {}",
                row.chars().count(),
                scenario.columns
            );
        }
        Ok(scenario)
    }

    /// World parameters; `seed` overrides the scenario's own seed.
    pub(crate) fn world_config(&self, seed: Option<u64>) -> WorldConfig {
        let defaults = WorldConfig::default();
        WorldConfig {
            columns: self.columns,
            rows: self.rows,
            seed: seed.or(self.seed).unwrap_or(defaults.seed),
            initial_funds: self.funds.unwrap_or(defaults.initial_funds),
        }
    }

    pub(crate) const fn spawning_config(&self) -> Config {
        Config::new(self.patrol_interval, self.water_supply)
    }

    pub(crate) const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Commands laying out the terrain, the roads and the buildings.
    ///
    /// Terrain is applied immediately; roads and buildings are built on the
    /// first tick in the order they appear.
    pub(crate) fn layout(&self) -> Result<Vec<Command>> {
        let mut terrain = Vec::new();
        let mut roads = Vec::new();
        for (j, row) in self.terrain.iter().enumerate() {
            for (i, symbol) in row.chars().enumerate() {
                let pos = TilePos::new(i as i32, j as i32);
                let kind = match symbol {
                    '.' => continue,
                    '~' => Terrain::Water,
                    '#' => Terrain::Rock,
                    'T' => Terrain::Tree,
                    '=' => {
                        roads.push(Command::Build {
                            pos,
                            kind: ConstructionKind::Road,
                        });
                        continue;
                    }
                    other => bail!("unknown terrain symbol {other:?} at ({i}, {j})"),
                };
                terrain.push(Command::SetTerrain { pos, terrain: kind });
            }
        }

        let mut commands = terrain;
        commands.extend(roads);
        for placement in &self.buildings {
            let Some(kind) = ConstructionKind::from_name(&placement.kind) else {
                bail!("unknown construction kind {:?}", placement.kind);
            };
            commands.push(Command::Build {
                pos: tile(placement.at),
                kind,
            });
        }
        Ok(commands)
    }

    /// Commands scripted to follow the tick the world has just finished.
    ///
    /// Houses are configured right after the first tick built them.
    pub(crate) fn scripted(&self, world: &World) -> Vec<Command> {
        let tick = query::tick(world);
        let mut commands = Vec::new();
        if tick == 1 {
            for setup in &self.houses {
                match house_at(world, tile(setup.at)) {
                    Some(house) => commands.push(Command::ConfigureHouse {
                        house,
                        level: setup.level,
                        health: setup.health,
                    }),
                    None => warn!(i = setup.at[0], j = setup.at[1], "no house to configure"),
                }
            }
        }
        for protest in self.protestors.iter().filter(|p| p.tick.max(1) == tick) {
            match house_at(world, tile(protest.house)) {
                Some(house) => commands.push(Command::SpawnProtestor { house }),
                None => warn!(
                    i = protest.house[0],
                    j = protest.house[1],
                    "no house to protest from"
                ),
            }
        }
        commands
    }
}

fn house_at(world: &World, pos: TilePos) -> Option<ConstructionId> {
    query::construction_at(world, pos)
        .filter(|construction| construction.kind() == ConstructionKind::House)
        .map(|house| house.id())
}
