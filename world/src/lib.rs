#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Civitas.
//!
//! The [`World`] owns the tilemap, every construction and walker, the
//! treasury and the dispatcher of pending mutations. Adapters and systems
//! mutate it exclusively through [`apply`] and observe it through [`query`].

use std::collections::{BTreeMap, BTreeSet};

use civitas_core::{
    BuildError, Command, ConstructionId, ConstructionKind, DisasterKind, Event, FundIssueKind,
    TilePos, WalkerId, WalkerKind, Warning, WELCOME_BANNER,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

mod construction;
mod dispatcher;
mod funds;
mod pathfinder;
mod persistence;
mod tilemap;
mod walker;

pub use construction::Construction;
pub use funds::Funds;
pub use pathfinder::{Pathfinder, PathwayHelper};
pub use persistence::{load_world, save_world};
pub use tilemap::{Tile, TileFlags, Tilemap};
pub use walker::{
    Behaviour, MarketKidState, PrefectAction, PrefectState, ProtestorAction, ProtestorState,
};

use dispatcher::Dispatcher;
use walker::Walker;

const DEFAULT_COLUMNS: u32 = 32;
const DEFAULT_ROWS: u32 = 32;
const DEFAULT_SEED: u64 = 0x42f0_e1eb_d4a5_3c21;
const DEFAULT_FUNDS: i64 = 5000;

/// Parameters used to construct a fresh [`World`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldConfig {
    /// Number of tile columns.
    pub columns: u32,
    /// Number of tile rows.
    pub rows: u32,
    /// Seed of the world's random number generator.
    pub seed: u64,
    /// Treasury balance at the start of the game.
    pub initial_funds: i64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS,
            seed: DEFAULT_SEED,
            initial_funds: DEFAULT_FUNDS,
        }
    }
}

/// Represents the authoritative Civitas world state.
#[derive(Debug)]
pub struct World {
    banner: &'static str,
    tilemap: Tilemap,
    constructions: BTreeMap<ConstructionId, Construction>,
    walkers: BTreeMap<WalkerId, Walker>,
    dispatcher: Dispatcher,
    funds: Funds,
    pathfinder: Pathfinder,
    rng: ChaCha8Rng,
    seed: u64,
    tick: u64,
    next_construction: u32,
    next_walker: u32,
}

impl World {
    /// Creates a new world using the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates a new world from the provided configuration.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            banner: WELCOME_BANNER,
            tilemap: Tilemap::new(config.columns, config.rows),
            constructions: BTreeMap::new(),
            walkers: BTreeMap::new(),
            dispatcher: Dispatcher::default(),
            funds: Funds::new(config.initial_funds),
            pathfinder: Pathfinder,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            seed: config.seed,
            tick: 0,
            next_construction: 1,
            next_walker: 1,
        }
    }

    fn configure_tilemap(&mut self, columns: u32, rows: u32, out_events: &mut Vec<Event>) {
        for (id, walker) in std::mem::take(&mut self.walkers) {
            out_events.push(Event::WalkerRemoved {
                walker: id,
                kind: walker.kind(),
            });
        }
        for (id, construction) in std::mem::take(&mut self.constructions) {
            out_events.push(Event::ConstructionRemoved {
                construction: id,
                kind: construction.kind(),
            });
        }
        self.dispatcher.clear();
        self.tilemap = Tilemap::new(columns, rows);
        info!(columns, rows, "tilemap configured");
    }

    fn step(&mut self, out_events: &mut Vec<Event>) {
        self.tick = self.tick.saturating_add(1);
        out_events.push(Event::TimeAdvanced { tick: self.tick });

        for construction in self.constructions.values_mut() {
            construction.time_step(&mut self.dispatcher);
        }

        let ids: Vec<WalkerId> = self.walkers.keys().copied().collect();
        for id in ids {
            let Some(mut walker) = self.walkers.remove(&id) else {
                continue;
            };
            if !walker.is_deleted() {
                walker.time_step(self, out_events);
            }
            let _ = self.walkers.insert(id, walker);
        }

        self.remove_deleted_walkers(out_events);
        self.flush(out_events);
        self.purge_constructions(out_events);
    }

    fn remove_deleted_walkers(&mut self, out_events: &mut Vec<Event>) {
        let deleted: Vec<WalkerId> = self
            .walkers
            .values()
            .filter(|walker| walker.is_deleted())
            .map(Walker::id)
            .collect();
        for id in deleted {
            let Some(mut walker) = self.walkers.remove(&id) else {
                continue;
            };
            walker.cancel_reservations(self);
            out_events.push(Event::WalkerRemoved {
                walker: id,
                kind: walker.kind(),
            });
        }
    }

    fn flush(&mut self, out_events: &mut Vec<Event>) {
        if self.dispatcher.len() > 0 {
            debug!(
                tick = self.tick,
                pending = self.dispatcher.len(),
                "flushing dispatcher"
            );
        }
        while let Some(command) = self.dispatcher.pop() {
            self.execute(command, out_events);
        }
    }

    fn purge_constructions(&mut self, out_events: &mut Vec<Event>) {
        let stale: Vec<ConstructionId> = self
            .constructions
            .values()
            .filter(|construction| construction.is_deleted())
            .map(Construction::id)
            .collect();
        for id in stale {
            let _ = self.remove_construction(id, out_events);
        }
    }

    fn execute(&mut self, command: Command, out_events: &mut Vec<Event>) {
        match command {
            Command::Build { pos, kind } => self.build(pos, kind, out_events),
            Command::ClearLand { pos } => self.clear_land(pos, out_events),
            Command::Disaster { pos, kind } => self.disaster(pos, kind, out_events),
            Command::FundIssue { kind, amount } => self.issue_funds(kind, amount, out_events),
            Command::UpdateConstructionState {
                construction,
                param,
                value,
                relative,
            } => match self.constructions.get_mut(&construction) {
                Some(target) => target.update_state(param, value, relative),
                None => debug!(construction = construction.get(), "no construction to update"),
            },
            Command::ConfigureHouse {
                house,
                level,
                health,
            } => match self
                .constructions
                .get_mut(&house)
                .filter(|target| target.kind() == ConstructionKind::House)
            {
                Some(target) => target.configure_house(level, health),
                None => debug!(house = house.get(), "no house to configure"),
            },
            Command::SendPrefect { prefecture, water } => {
                walker::prefect::send_to_city(self, prefecture, water, out_events);
            }
            Command::SpawnProtestor { house } => {
                walker::protestor::send_to_city(self, house, out_events);
            }
            Command::SpawnMarketKid {
                market,
                pathway,
                basket,
                delay,
            } => {
                walker::market_kid::send_to_city(self, market, pathway, basket, delay, out_events);
            }
            Command::SpawnShip { from, to } => {
                walker::ship::send_to_city(self, from, to, out_events);
            }
            Command::ConfigureTilemap { .. } | Command::SetTerrain { .. } | Command::Tick => {
                debug!("configuration command reached the dispatcher");
            }
        }
    }

    fn build(&mut self, pos: TilePos, kind: ConstructionKind, out_events: &mut Vec<Event>) {
        let footprint = match self.tilemap.area(pos, kind.size()) {
            Some(footprint) => footprint,
            None => {
                out_events.push(Event::BuildRejected {
                    kind,
                    pos,
                    reason: BuildError::OutOfBounds,
                });
                return;
            }
        };
        if !footprint
            .iter()
            .all(|tile| self.tilemap.is_constructible(*tile))
        {
            out_events.push(Event::BuildRejected {
                kind,
                pos,
                reason: BuildError::NotConstructible,
            });
            return;
        }

        let id = self.next_construction_id();
        for tile in &footprint {
            if let Some(tile) = self.tilemap.tile_mut(*tile) {
                tile.attach(id, pos);
                let flag = match kind {
                    ConstructionKind::Road => TileFlags::ROAD,
                    ConstructionKind::Garden => TileFlags::GARDEN,
                    _ => TileFlags::BUILDING,
                };
                tile.flags_mut().insert(flag);
            }
        }

        let mut construction = Construction::new(id, kind, pos);
        construction.compute_access_roads(&self.tilemap);
        let stranded = kind.needs_road_access() && construction.access_roads().is_empty();
        let _ = self.constructions.insert(id, construction);
        debug!(
            construction = id.get(),
            kind = kind.name(),
            i = pos.i(),
            j = pos.j(),
            "construction built"
        );

        if kind.cost() > 0 {
            self.issue_funds(FundIssueKind::Construction, -kind.cost(), out_events);
        }
        out_events.push(Event::ConstructionBuilt {
            construction: id,
            kind,
            origin: pos,
        });
        if stranded {
            out_events.push(Event::WarningMessage {
                construction: id,
                warning: Warning::NeedRoadAccess,
            });
        }

        if kind == ConstructionKind::Road {
            let radius = ConstructionKind::ALL
                .iter()
                .map(|kind| kind.road_access_distance())
                .max()
                .unwrap_or(1);
            for neighbour in self.constructions_near(pos, radius) {
                if let Some(neighbour) = self.constructions.get_mut(&neighbour) {
                    neighbour.compute_access_roads(&self.tilemap);
                }
            }
        }
    }

    fn clear_land(&mut self, pos: TilePos, out_events: &mut Vec<Event>) {
        if !self.tilemap.is_destructible(pos) {
            debug!(i = pos.i(), j = pos.j(), "tile cannot be cleared");
            return;
        }
        let cleared = match self.overlay_at(pos) {
            Some(id) => self.remove_construction(id, out_events),
            None => vec![pos],
        };
        for tile in cleared {
            if let Some(tile) = self.tilemap.tile_mut(tile) {
                tile.flags_mut().remove(TileFlags::CLEARABLE);
            }
        }
    }

    fn disaster(&mut self, pos: TilePos, kind: DisasterKind, out_events: &mut Vec<Event>) {
        if !self.tilemap.is_destructible(pos) {
            debug!(i = pos.i(), j = pos.j(), "tile cannot be struck");
            return;
        }
        let struck = match self.overlay_at(pos) {
            Some(id) => self.remove_construction(id, out_events),
            None => vec![pos],
        };
        for tile in struck {
            self.dispatcher.dispatch(Command::Build {
                pos: tile,
                kind: kind.ruins(),
            });
        }
        out_events.push(Event::DisasterStruck { pos, kind });
    }

    fn issue_funds(&mut self, kind: FundIssueKind, amount: i64, out_events: &mut Vec<Event>) {
        let balance = self.funds.resolve(kind, amount);
        out_events.push(Event::FundsChanged {
            kind,
            amount,
            balance,
        });
    }

    /// Takes a construction off the map, returning the tiles it covered.
    fn remove_construction(
        &mut self,
        id: ConstructionId,
        out_events: &mut Vec<Event>,
    ) -> Vec<TilePos> {
        let Some(construction) = self.constructions.remove(&id) else {
            return Vec::new();
        };
        let footprint = self
            .tilemap
            .area(construction.origin(), construction.size())
            .unwrap_or_default();
        for tile in &footprint {
            if let Some(tile) = self.tilemap.tile_mut(*tile) {
                tile.detach();
                tile.flags_mut()
                    .remove(TileFlags::ROAD | TileFlags::BUILDING | TileFlags::GARDEN);
            }
        }
        out_events.push(Event::ConstructionRemoved {
            construction: id,
            kind: construction.kind(),
        });
        footprint
    }

    fn overlay_at(&self, pos: TilePos) -> Option<ConstructionId> {
        self.tilemap.tile(pos).and_then(|tile| tile.overlay())
    }

    fn construction_at(&self, pos: TilePos) -> Option<&Construction> {
        self.overlay_at(pos)
            .and_then(|id| self.constructions.get(&id))
    }

    fn construction_at_mut(&mut self, pos: TilePos) -> Option<&mut Construction> {
        let id = self.overlay_at(pos)?;
        self.constructions.get_mut(&id)
    }

    /// Live constructions covering any tile within `radius` of `center`.
    fn constructions_near(&self, center: TilePos, radius: u32) -> Vec<ConstructionId> {
        self.tilemap
            .square(center, radius)
            .into_iter()
            .filter_map(|pos| self.overlay_at(pos))
            .filter(|id| {
                self.constructions
                    .get(id)
                    .is_some_and(|construction| !construction.is_deleted())
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Live walkers of `kind` within `radius` king moves of `pos`.
    fn walkers_near(&self, pos: TilePos, radius: u32, kind: WalkerKind) -> Vec<(WalkerId, TilePos)> {
        self.walkers
            .values()
            .filter(|walker| {
                walker.kind() == kind
                    && !walker.is_deleted()
                    && walker.pos().chebyshev_distance(pos) <= radius
            })
            .map(|walker| (walker.id(), walker.pos()))
            .collect()
    }

    fn next_construction_id(&mut self) -> ConstructionId {
        let id = ConstructionId::new(self.next_construction);
        self.next_construction = self.next_construction.saturating_add(1);
        id
    }

    fn next_walker_id(&mut self) -> WalkerId {
        let id = WalkerId::new(self.next_walker);
        self.next_walker = self.next_walker.saturating_add(1);
        id
    }

    fn add_walker(&mut self, walker: Walker, out_events: &mut Vec<Event>) {
        let id = walker.id();
        let kind = walker.kind();
        let pos = walker.pos();
        if self.walkers.contains_key(&id) {
            warn!(walker = id.get(), "walker id already in use");
            return;
        }
        debug!(walker = id.get(), kind = kind.name(), "walker spawned");
        let _ = self.walkers.insert(id, walker);
        out_events.push(Event::WalkerSpawned {
            walker: id,
            kind,
            pos,
        });
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Tilemap configuration and ticks take effect immediately. Every other
/// command is queued and executed, in order, when the next tick flushes the
/// dispatcher.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    if command.is_deferred() {
        world.dispatcher.dispatch(command);
        return;
    }
    match command {
        Command::ConfigureTilemap { columns, rows } => {
            world.configure_tilemap(columns, rows, out_events);
        }
        Command::SetTerrain { pos, terrain } => {
            if !world.tilemap.set_terrain(pos, terrain) {
                warn!(i = pos.i(), j = pos.j(), ?terrain, "terrain not applied");
            }
        }
        _ => world.step(out_events),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use civitas_core::{
        Command, ConstructionId, ConstructionKind, Pathway, PrefectureSnapshot, PrefectureView,
        TilePos, WalkerId, WalkerView,
    };

    use super::{Behaviour, Construction, Funds, Tilemap, World};

    /// Retrieves the welcome banner that adapters may display to players.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Provides read-only access to the tilemap.
    #[must_use]
    pub fn tilemap(world: &World) -> &Tilemap {
        &world.tilemap
    }

    /// Provides read-only access to the treasury.
    #[must_use]
    pub fn funds(world: &World) -> &Funds {
        &world.funds
    }

    /// Number of ticks simulated so far.
    #[must_use]
    pub fn tick(world: &World) -> u64 {
        world.tick
    }

    /// Looks up a construction by identifier.
    #[must_use]
    pub fn construction(world: &World, id: ConstructionId) -> Option<&Construction> {
        world.constructions.get(&id)
    }

    /// Iterates over every construction in identifier order.
    pub fn constructions(world: &World) -> impl Iterator<Item = &Construction> {
        world.constructions.values()
    }

    /// Construction covering the tile, if any.
    #[must_use]
    pub fn construction_at(world: &World, pos: TilePos) -> Option<&Construction> {
        world.construction_at(pos)
    }

    /// Captures a read-only view of the walkers roaming the city.
    #[must_use]
    pub fn walker_view(world: &World) -> WalkerView {
        WalkerView::from_snapshots(world.walkers.values().map(|walker| walker.snapshot()).collect())
    }

    /// Kind-specific state of a walker.
    #[must_use]
    pub fn walker_behaviour(world: &World, id: WalkerId) -> Option<Behaviour> {
        world.walkers.get(&id).map(|walker| walker.behaviour())
    }

    /// Route currently followed by a walker.
    #[must_use]
    pub fn walker_pathway(world: &World, id: WalkerId) -> Option<&Pathway> {
        world.walkers.get(&id).map(|walker| walker.pathway())
    }

    /// Captures the prefectures together with the prefects they have out.
    #[must_use]
    pub fn prefecture_view(world: &World) -> PrefectureView {
        let snapshots = world
            .constructions
            .values()
            .filter(|station| {
                station.kind() == ConstructionKind::Prefecture && !station.is_deleted()
            })
            .map(|station| {
                let mut patrols_out = 0;
                let mut water_carriers_out = 0;
                for walker in world.walkers.values() {
                    if walker.is_deleted() || walker.base() != Some(station.id()) {
                        continue;
                    }
                    if let Behaviour::Prefect(state) = walker.behaviour() {
                        if state.action.is_firefighting() {
                            water_carriers_out += 1;
                        } else {
                            patrols_out += 1;
                        }
                    }
                }
                PrefectureSnapshot {
                    id: station.id(),
                    enter_pos: station.enter_pos(),
                    patrols_out,
                    water_carriers_out,
                    pending_fire: station.pending_fire(),
                }
            })
            .collect();
        PrefectureView::from_snapshots(snapshots)
    }

    /// Commands waiting for the next tick flush, in execution order.
    pub fn pending_commands(world: &World) -> impl Iterator<Item = &Command> {
        world.dispatcher.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civitas_core::Terrain;

    fn build(world: &mut World, pos: TilePos, kind: ConstructionKind) -> Vec<Event> {
        let mut events = Vec::new();
        apply(world, Command::Build { pos, kind }, &mut events);
        apply(world, Command::Tick, &mut events);
        events
    }

    #[test]
    fn builds_wait_for_the_next_tick() {
        let mut world = World::new();
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::Build {
                pos: TilePos::new(2, 2),
                kind: ConstructionKind::House,
            },
            &mut events,
        );

        assert!(events.is_empty());
        assert_eq!(query::pending_commands(&world).count(), 1);
        assert!(query::construction_at(&world, TilePos::new(2, 2)).is_none());

        apply(&mut world, Command::Tick, &mut events);

        assert_eq!(query::pending_commands(&world).count(), 0);
        assert!(query::construction_at(&world, TilePos::new(2, 2)).is_some());
        assert_eq!(events.first(), Some(&Event::TimeAdvanced { tick: 1 }));
    }

    #[test]
    fn multi_tile_footprint_shares_one_overlay() {
        let mut world = World::new();
        let events = build(&mut world, TilePos::new(4, 4), ConstructionKind::Market);

        let id = events
            .iter()
            .find_map(|event| match event {
                Event::ConstructionBuilt { construction, .. } => Some(*construction),
                _ => None,
            })
            .expect("market built");
        for pos in [
            TilePos::new(4, 4),
            TilePos::new(5, 4),
            TilePos::new(4, 5),
            TilePos::new(5, 5),
        ] {
            let tile = query::tilemap(&world).tile(pos).expect("inside");
            assert_eq!(tile.overlay(), Some(id));
            assert_eq!(tile.master(), Some(TilePos::new(4, 4)));
        }
        assert!(events.contains(&Event::WarningMessage {
            construction: id,
            warning: Warning::NeedRoadAccess,
        }));
    }

    #[test]
    fn occupied_or_wet_tiles_reject_builds() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SetTerrain {
                pos: TilePos::new(1, 1),
                terrain: Terrain::Water,
            },
            &mut events,
        );

        let events = build(&mut world, TilePos::new(1, 1), ConstructionKind::Road);
        assert!(events.contains(&Event::BuildRejected {
            kind: ConstructionKind::Road,
            pos: TilePos::new(1, 1),
            reason: BuildError::NotConstructible,
        }));

        let events = build(&mut world, TilePos::new(31, 31), ConstructionKind::Granary);
        assert!(events.contains(&Event::BuildRejected {
            kind: ConstructionKind::Granary,
            pos: TilePos::new(31, 31),
            reason: BuildError::OutOfBounds,
        }));
    }

    #[test]
    fn new_road_grants_access_to_neighbours() {
        let mut world = World::new();
        let _ = build(&mut world, TilePos::new(5, 5), ConstructionKind::Prefecture);
        let prefecture = query::construction_at(&world, TilePos::new(5, 5))
            .expect("prefecture built")
            .id();
        assert!(query::construction(&world, prefecture)
            .expect("exists")
            .access_roads()
            .is_empty());

        let _ = build(&mut world, TilePos::new(6, 5), ConstructionKind::Road);

        let station = query::construction(&world, prefecture).expect("exists");
        assert_eq!(station.access_roads(), &[TilePos::new(6, 5)]);
        assert_eq!(station.enter_pos(), TilePos::new(6, 5));
    }

    #[test]
    fn clearing_land_frees_the_footprint_and_trees() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SetTerrain {
                pos: TilePos::new(9, 9),
                terrain: Terrain::Tree,
            },
            &mut events,
        );
        let _ = build(&mut world, TilePos::new(2, 2), ConstructionKind::Granary);

        for pos in [TilePos::new(3, 3), TilePos::new(9, 9)] {
            apply(&mut world, Command::ClearLand { pos }, &mut events);
        }
        apply(&mut world, Command::Tick, &mut events);

        assert!(query::constructions(&world).next().is_none());
        assert!(query::tilemap(&world).is_constructible(TilePos::new(2, 2)));
        assert!(query::tilemap(&world).is_constructible(TilePos::new(9, 9)));
    }

    #[test]
    fn reconfiguring_the_map_drops_everything() {
        let mut world = World::new();
        let _ = build(&mut world, TilePos::new(2, 2), ConstructionKind::House);
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::ConfigureTilemap {
                columns: 8,
                rows: 6,
            },
            &mut events,
        );

        assert!(matches!(
            events.as_slice(),
            [Event::ConstructionRemoved { .. }]
        ));
        assert_eq!(query::tilemap(&world).columns(), 8);
        assert_eq!(query::tilemap(&world).rows(), 6);
        assert!(query::constructions(&world).next().is_none());
    }
}
