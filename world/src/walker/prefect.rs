//! Prefects: patrols, firefighting and riot control.

use std::collections::BTreeSet;

use civitas_core::{
    ConstructionGroup, ConstructionId, ConstructionKind, Event, Pathway, PersistenceError,
    ServiceKind, TerrainPolicy, TilePos, VariantMap, VariantMapExt, WalkerKind,
};
use serde_json::Value;
use tracing::{debug, info};

use super::{reached_buildings, Behaviour, Walker};
use crate::{pathfinder::PathwayHelper, World};

const SERVICE_VALUE: f32 = 5.0;
const PROTESTOR_SCAN_RADIUS: u32 = 3;
const FIGHT_DISTANCE: f32 = 1.5;
const PROTESTOR_DAMAGE: i32 = 3;
const HURRY_SPEED: f32 = 1.5;
const PATROL_SPEED: f32 = 1.0;
const MAX_WATER_SPENT: f32 = 100.0;

/// Longest road patrol sent out of a prefecture.
const PATROL_LENGTH: u32 = 24;
/// Random patrol routes compared before a prefect leaves.
const PATROL_CANDIDATES: usize = 4;

/// Activity a prefect is engaged in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrefectAction {
    /// Walking a route and serving buildings on the way.
    Patrol,
    /// Carrying water toward burning ruins.
    GotoFire,
    /// Pouring water on burning ruins.
    FightFire,
    /// Chasing a protestor.
    GoToProtestor,
    /// Beating a protestor.
    FightProtestor,
    /// Idle, waiting for removal.
    DoNothing,
}

impl PrefectAction {
    /// Persisted numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Patrol => 0,
            Self::GotoFire => 1,
            Self::FightFire => 2,
            Self::GoToProtestor => 3,
            Self::FightProtestor => 4,
            Self::DoNothing => 5,
        }
    }

    /// Decodes a persisted numeric code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Patrol),
            1 => Some(Self::GotoFire),
            2 => Some(Self::FightFire),
            3 => Some(Self::GoToProtestor),
            4 => Some(Self::FightProtestor),
            5 => Some(Self::DoNothing),
            _ => None,
        }
    }

    /// Whether the prefect is out to fight a fire.
    #[must_use]
    pub const fn is_firefighting(self) -> bool {
        matches!(self, Self::GotoFire | Self::FightFire)
    }
}

/// State carried by a prefect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefectState {
    /// Current activity.
    pub action: PrefectAction,
    /// Water left for firefighting.
    pub water: u32,
    /// Tile the current patrol leg ends on.
    pub end_patrol_point: TilePos,
}

impl PrefectState {
    pub(crate) fn save(&self, stream: &mut VariantMap) {
        let _ = stream.insert("prefectAction".to_owned(), Value::from(self.action.code()));
        let _ = stream.insert("water".to_owned(), Value::from(self.water));
        let _ = stream.insert(
            "endPatrolPoint".to_owned(),
            civitas_core::variant::tile_pos_value(self.end_patrol_point),
        );
    }

    pub(crate) fn load(stream: &VariantMap) -> Result<Self, PersistenceError> {
        let raw = stream.uint("prefectAction")?;
        let action = u8::try_from(raw)
            .ok()
            .and_then(PrefectAction::from_code)
            .ok_or_else(|| PersistenceError::UnknownValue {
                key: "prefectAction".to_owned(),
                value: raw.to_string(),
            })?;
        Ok(Self {
            action,
            water: u32::try_from(stream.uint("water")?).unwrap_or(u32::MAX),
            end_patrol_point: stream.tile_pos("endPatrolPoint")?,
        })
    }
}

/// Sends a prefect out of `prefecture`.
///
/// Without water the prefect patrols whichever of a few random road routes
/// passes the most buildings nobody has reserved yet, and reserves the prefect
/// service of each of them. When every building along the routes is already
/// reserved nobody leaves. With water it heads for the fire last reported to
/// the prefecture.
pub(crate) fn send_to_city(
    world: &mut World,
    prefecture: ConstructionId,
    water: u32,
    out: &mut Vec<Event>,
) {
    let Some(station) = world
        .constructions
        .get_mut(&prefecture)
        .filter(|station| station.kind() == ConstructionKind::Prefecture && !station.is_deleted())
    else {
        debug!(prefecture = prefecture.get(), "no prefecture to send a prefect from");
        return;
    };
    if station.access_roads().is_empty() {
        debug!(prefecture = prefecture.get(), "prefecture has no road access");
        return;
    }
    let start = station.enter_pos();
    let fire = if water > 0 {
        station.take_fire_report()
    } else {
        None
    };

    let bounds = world.tilemap.bounds();
    if water > 0 {
        let Some(fire) = fire else {
            debug!(prefecture = prefecture.get(), "no fire reported");
            return;
        };
        let Some(route) = PathwayHelper::create(world, start, fire, TerrainPolicy::AllTerrain)
        else {
            debug!(i = fire.i(), j = fire.j(), "fire cannot be reached");
            return;
        };
        let id = world.next_walker_id();
        let state = PrefectState {
            action: PrefectAction::GotoFire,
            water,
            end_patrol_point: start,
        };
        let mut walker = Walker::new(id, Behaviour::Prefect(state), start, bounds);
        walker.base = Some(prefecture);
        walker.walk(route);
        world.add_walker(walker, out);
        return;
    }

    let mut best: Option<(Pathway, BTreeSet<ConstructionId>)> = None;
    for _ in 0..PATROL_CANDIDATES {
        let Some(route) = PathwayHelper::road_patrol(world, start, PATROL_LENGTH) else {
            continue;
        };
        let unserved = unserved_along(world, &route);
        if best
            .as_ref()
            .map_or(true, |(_, current)| unserved.len() > current.len())
        {
            best = Some((route, unserved));
        }
    }
    let Some((route, unserved)) = best else {
        debug!(prefecture = prefecture.get(), "no road to patrol");
        return;
    };
    if unserved.is_empty() {
        debug!(
            prefecture = prefecture.get(),
            "every building along the patrol is already served"
        );
        return;
    }

    let id = world.next_walker_id();
    let state = PrefectState {
        action: PrefectAction::Patrol,
        water: 0,
        end_patrol_point: route.destination(),
    };
    let mut walker = Walker::new(id, Behaviour::Prefect(state), start, bounds);
    walker.base = Some(prefecture);
    for target in unserved {
        if let Some(construction) = world.constructions.get_mut(&target) {
            if construction.reserve_service(ServiceKind::Prefect) {
                walker.reserved.push(target);
            }
        }
    }

    walker.walk(route);
    world.add_walker(walker, out);
}

pub(super) fn on_mid_tile(walker: &mut Walker, world: &mut World, out: &mut Vec<Event>) {
    let Behaviour::Prefect(mut state) = walker.behaviour else {
        return;
    };
    let is_destination = walker.pathway.is_destination();

    match state.action {
        PrefectAction::DoNothing | PrefectAction::FightFire | PrefectAction::FightProtestor => {}
        PrefectAction::Patrol => {
            let reached = reached_buildings(world, walker.pos);
            let mut rerouted = false;
            if let Some(target) = looks_for_protestor(world, walker.pos) {
                if target.distance_from(walker.pos) < FIGHT_DISTANCE {
                    walker.speed = 0.0;
                    state.action = PrefectAction::FightProtestor;
                    rerouted = true;
                } else if let Some(route) =
                    PathwayHelper::create(world, walker.pos, target, TerrainPolicy::AllTerrain)
                {
                    walker.speed = HURRY_SPEED;
                    walker.walk(route);
                    state.action = PrefectAction::GoToProtestor;
                    rerouted = true;
                }
            } else if let Some(fire) = looks_for_fire(world, &reached) {
                report_fire(walker, world, fire, out);
                back_to_prefecture(walker, &mut state, world, out);
                rerouted = true;
            } else {
                serve_buildings(walker, world, &reached);
            }

            if is_destination && !rerouted {
                if base_enter_pos(walker, world) == Some(walker.pos) {
                    walker.delete_later();
                    state.action = PrefectAction::DoNothing;
                } else {
                    back_to_prefecture(walker, &mut state, world, out);
                }
            }
        }
        PrefectAction::GotoFire => {
            let target = walker.pathway.destination();
            if target.distance_from(walker.pos) < FIGHT_DISTANCE && is_burning(world, target) {
                walker.speed = 0.0;
                state.action = PrefectAction::FightFire;
            } else if is_destination {
                seek_fire_or_home(walker, &mut state, world, out);
            }
        }
        PrefectAction::GoToProtestor => match looks_for_protestor(world, walker.pos) {
            Some(target) if target.distance_from(walker.pos) < FIGHT_DISTANCE => {
                walker.speed = 0.0;
                state.action = PrefectAction::FightProtestor;
            }
            Some(target) => {
                if is_destination {
                    match PathwayHelper::create(world, walker.pos, target, TerrainPolicy::AllTerrain)
                    {
                        Some(route) => walker.walk(route),
                        None => back_to_patrol(walker, &mut state, world, out),
                    }
                }
            }
            None => back_to_patrol(walker, &mut state, world, out),
        },
    }

    walker.behaviour = Behaviour::Prefect(state);
}

pub(super) fn time_step(walker: &mut Walker, world: &mut World, out: &mut Vec<Event>) {
    walker.advance(world, out);

    let Behaviour::Prefect(mut state) = walker.behaviour else {
        return;
    };
    match state.action {
        PrefectAction::FightFire => {
            let target = walker.pathway.destination();
            let mut in_fire = false;
            if let Some(ruins) = world.construction_at_mut(target).filter(|ruins| {
                ruins.kind() == ConstructionKind::BurningRuins && !ruins.is_deleted()
            }) {
                let before = ruins.evaluate_service(ServiceKind::Prefect);
                ruins.apply_service(ServiceKind::Prefect, SERVICE_VALUE);
                let after = ruins.evaluate_service(ServiceKind::Prefect);
                let spent = (before - after).clamp(0.0, MAX_WATER_SPENT) as u32;
                state.water = state.water.saturating_sub(spent);
                in_fire = after > 0.0;
            }

            if !in_fire || state.water == 0 {
                walker.speed = HURRY_SPEED;
                state.action = PrefectAction::GotoFire;
                seek_fire_or_home(walker, &mut state, world, out);
            }
        }
        PrefectAction::FightProtestor => {
            let nearby = world.walkers_near(walker.pos, 1, WalkerKind::Protestor);
            match nearby.first() {
                Some((protestor, _)) => {
                    if let Some(protestor) = world.walkers.get_mut(protestor) {
                        protestor.update_health(-PROTESTOR_DAMAGE);
                    }
                }
                None => back_to_patrol(walker, &mut state, world, out),
            }
        }
        _ => {}
    }

    walker.behaviour = Behaviour::Prefect(state);
}

/// Buildings along `route` still waiting for a prefect.
fn unserved_along(world: &World, route: &Pathway) -> BTreeSet<ConstructionId> {
    route
        .tiles()
        .iter()
        .flat_map(|tile| reached_buildings(world, *tile))
        .filter(|id| {
            world.constructions.get(id).is_some_and(|construction| {
                construction.group() != ConstructionGroup::Disaster
                    && !construction.is_service_reserved(ServiceKind::Prefect)
            })
        })
        .collect()
}

/// Nearest live protestor within the scan radius.
fn looks_for_protestor(world: &World, pos: TilePos) -> Option<TilePos> {
    let mut nearest: Option<(f32, TilePos)> = None;
    for (_, candidate) in world.walkers_near(pos, PROTESTOR_SCAN_RADIUS, WalkerKind::Protestor) {
        let distance = candidate.distance_from(pos);
        if nearest.map_or(true, |(best, _)| distance < best) {
            nearest = Some((distance, candidate));
        }
    }
    nearest.map(|(_, candidate)| candidate)
}

fn looks_for_fire(world: &World, reached: &[ConstructionId]) -> Option<TilePos> {
    reached
        .iter()
        .filter_map(|id| world.constructions.get(id))
        .find(|construction| construction.kind() == ConstructionKind::BurningRuins)
        .map(|ruins| ruins.origin())
}

fn is_burning(world: &World, pos: TilePos) -> bool {
    world.construction_at(pos).is_some_and(|construction| {
        construction.kind() == ConstructionKind::BurningRuins && !construction.is_deleted()
    })
}

fn base_enter_pos(walker: &Walker, world: &World) -> Option<TilePos> {
    walker
        .base
        .and_then(|base| world.constructions.get(&base))
        .filter(|base| !base.is_deleted())
        .map(|base| base.enter_pos())
}

fn report_fire(walker: &Walker, world: &mut World, fire: TilePos, out: &mut Vec<Event>) {
    let Some(prefecture) = walker.base else {
        return;
    };
    if let Some(station) = world.constructions.get_mut(&prefecture) {
        station.fire_detect(fire);
        info!(
            prefecture = prefecture.get(),
            i = fire.i(),
            j = fire.j(),
            "fire detected"
        );
        out.push(Event::FireDetected {
            prefecture,
            pos: fire,
        });
    }
}

fn serve_buildings(walker: &mut Walker, world: &mut World, reached: &[ConstructionId]) {
    for id in reached {
        let Some(construction) = world.constructions.get_mut(id) else {
            continue;
        };
        if construction.group() == ConstructionGroup::Disaster {
            continue;
        }
        construction.apply_service(ServiceKind::Prefect, SERVICE_VALUE);
        walker.reserved.retain(|reserved| reserved != id);

        if construction.kind() == ConstructionKind::House && construction.health() < 1 {
            construction.plague(&mut world.dispatcher);
        }
    }
}

/// Heads for the nearest reachable fire, or home when there is none or no
/// water is left.
fn seek_fire_or_home(
    walker: &mut Walker,
    state: &mut PrefectState,
    world: &mut World,
    out: &mut Vec<Event>,
) {
    let fires: Vec<TilePos> = reached_buildings(world, walker.pos)
        .iter()
        .filter_map(|id| world.constructions.get(id))
        .filter(|construction| {
            construction.kind() == ConstructionKind::BurningRuins
                && construction.evaluate_service(ServiceKind::Prefect) > 0.0
        })
        .map(|ruins| ruins.enter_pos())
        .collect();

    if fires.is_empty() || state.water == 0 {
        back_to_prefecture(walker, state, world, out);
        return;
    }

    state.action = PrefectAction::GotoFire;
    let mut best: Option<Pathway> = None;
    for fire in fires {
        if fire.distance_from(walker.pos) < FIGHT_DISTANCE {
            let mut stand = Pathway::new(world.tilemap.bounds(), walker.pos);
            if fire == walker.pos || stand.set_next_tile(fire).is_ok() {
                walker.speed = 0.0;
                state.action = PrefectAction::FightFire;
                walker.set_pathway(stand);
                return;
            }
        }
        let Some(route) = PathwayHelper::create(world, walker.pos, fire, TerrainPolicy::AllTerrain)
        else {
            continue;
        };
        let shorter = best
            .as_ref()
            .map_or(true, |current| route.cmp_by_length(current).is_lt());
        if shorter {
            let direct = route.len() == 1;
            best = Some(route);
            if direct {
                break;
            }
        }
    }

    match best {
        Some(route) => walker.walk(route),
        None => back_to_prefecture(walker, state, world, out),
    }
}

fn back_to_prefecture(
    walker: &mut Walker,
    state: &mut PrefectState,
    world: &mut World,
    out: &mut Vec<Event>,
) {
    let Some(enter) = base_enter_pos(walker, world) else {
        walker.delete_later();
        state.action = PrefectAction::DoNothing;
        return;
    };
    state.end_patrol_point = enter;
    back_to_patrol(walker, state, world, out);
}

fn back_to_patrol(
    walker: &mut Walker,
    state: &mut PrefectState,
    world: &mut World,
    out: &mut Vec<Event>,
) {
    if walker.pos == state.end_patrol_point {
        if base_enter_pos(walker, world) == Some(walker.pos) {
            walker.delete_later();
            state.action = PrefectAction::DoNothing;
        } else {
            back_to_prefecture(walker, state, world, out);
        }
        return;
    }

    match PathwayHelper::create(
        world,
        walker.pos,
        state.end_patrol_point,
        TerrainPolicy::AllTerrain,
    ) {
        Some(route) => {
            state.action = PrefectAction::Patrol;
            walker.speed = PATROL_SPEED;
            walker.walk(route);
        }
        None => {
            state.action = PrefectAction::DoNothing;
            walker.die(world, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apply, ProtestorAction, ProtestorState};
    use civitas_core::{Command, DisasterKind, Direction, WalkerId};

    fn burning(world: &mut World, positions: &[TilePos]) {
        let mut events = Vec::new();
        for pos in positions {
            apply(
                world,
                Command::Disaster {
                    pos: *pos,
                    kind: DisasterKind::Fire,
                },
                &mut events,
            );
        }
        apply(world, Command::Tick, &mut events);
    }

    fn prefect(world: &mut World, pos: TilePos, state: PrefectState) -> Walker {
        let id = world.next_walker_id();
        Walker::new(id, Behaviour::Prefect(state), pos, world.tilemap.bounds())
    }

    fn patrol(end_patrol_point: TilePos) -> PrefectState {
        PrefectState {
            action: PrefectAction::Patrol,
            water: 0,
            end_patrol_point,
        }
    }

    fn with_water(water: u32) -> PrefectState {
        PrefectState {
            action: PrefectAction::GotoFire,
            water,
            end_patrol_point: TilePos::new(0, 0),
        }
    }

    fn idle_protestor(world: &mut World, pos: TilePos) -> WalkerId {
        let id = world.next_walker_id();
        let state = ProtestorState {
            action: ProtestorAction::Wait,
            house_level: 0,
        };
        let walker = Walker::new(id, Behaviour::Protestor(state), pos, world.tilemap.bounds());
        world.add_walker(walker, &mut Vec::new());
        id
    }

    fn action(walker: &Walker) -> Option<PrefectAction> {
        match walker.behaviour {
            Behaviour::Prefect(state) => Some(state.action),
            _ => None,
        }
    }

    #[test]
    fn protestor_in_sight_outranks_fire() {
        let mut world = World::new();
        burning(&mut world, &[TilePos::new(4, 4)]);
        let _ = idle_protestor(&mut world, TilePos::new(3, 7));
        let mut walker = prefect(&mut world, TilePos::new(3, 5), patrol(TilePos::new(3, 9)));
        let mut out = Vec::new();

        on_mid_tile(&mut walker, &mut world, &mut out);

        assert_eq!(action(&walker), Some(PrefectAction::GoToProtestor));
        assert_eq!(walker.speed, HURRY_SPEED);
        assert_eq!(walker.pathway.destination(), TilePos::new(3, 7));
        assert!(!out
            .iter()
            .any(|event| matches!(event, Event::FireDetected { .. })));
    }

    #[test]
    fn adjacent_protestor_is_fought_on_the_spot() {
        let mut world = World::new();
        let _ = idle_protestor(&mut world, TilePos::new(4, 6));
        let mut walker = prefect(&mut world, TilePos::new(3, 5), patrol(TilePos::new(3, 9)));

        on_mid_tile(&mut walker, &mut world, &mut Vec::new());

        assert_eq!(action(&walker), Some(PrefectAction::FightProtestor));
        assert_eq!(walker.speed, 0.0);
        assert_eq!(walker.pos, TilePos::new(3, 5));
    }

    #[test]
    fn fight_wears_protestor_down_then_patrol_resumes() {
        let mut world = World::new();
        let mut state = patrol(TilePos::new(3, 9));
        state.action = PrefectAction::FightProtestor;
        let mut walker = prefect(&mut world, TilePos::new(3, 5), state);
        walker.speed = 0.0;
        let prefect_id = walker.id;
        world.add_walker(walker, &mut Vec::new());
        let protestor = idle_protestor(&mut world, TilePos::new(3, 6));

        let mut events = Vec::new();
        apply(&mut world, Command::Tick, &mut events);
        assert_eq!(world.walkers.get(&protestor).map(|w| w.health), Some(97));

        for _ in 1..33 {
            apply(&mut world, Command::Tick, &mut events);
        }
        assert_eq!(world.walkers.get(&protestor).map(|w| w.health), Some(1));
        assert!(!events
            .iter()
            .any(|event| matches!(event, Event::WalkerDied { .. })));

        let mut events = Vec::new();
        apply(&mut world, Command::Tick, &mut events);
        assert!(events.contains(&Event::WalkerDied {
            walker: protestor,
            kind: WalkerKind::Protestor,
            pos: TilePos::new(3, 6),
        }));

        apply(&mut world, Command::Tick, &mut Vec::new());
        let walker = world.walkers.get(&prefect_id).expect("prefect still out");
        assert_eq!(action(walker), Some(PrefectAction::Patrol));
        assert_eq!(walker.speed, PATROL_SPEED);
        assert_eq!(walker.pathway.destination(), TilePos::new(3, 9));
    }

    #[test]
    fn shortest_route_picks_the_next_fire() {
        let mut world = World::new();
        burning(&mut world, &[TilePos::new(7, 6), TilePos::new(5, 7)]);
        let mut state = with_water(100);
        let mut walker = prefect(&mut world, TilePos::new(5, 5), state);

        seek_fire_or_home(&mut walker, &mut state, &mut world, &mut Vec::new());

        assert_eq!(state.action, PrefectAction::GotoFire);
        assert_eq!(walker.pathway.destination(), TilePos::new(5, 7));
        assert_eq!(walker.pathway.len(), 2);
        assert_ne!(walker.heading, Direction::None);
    }

    #[test]
    fn equally_distant_fires_keep_the_first_found() {
        let mut world = World::new();
        burning(&mut world, &[TilePos::new(7, 5), TilePos::new(5, 7)]);
        let mut state = with_water(100);
        let mut walker = prefect(&mut world, TilePos::new(5, 5), state);

        seek_fire_or_home(&mut walker, &mut state, &mut world, &mut Vec::new());

        assert_eq!(walker.pathway.destination(), TilePos::new(7, 5));
    }

    #[test]
    fn fire_next_door_ends_the_search() {
        let mut world = World::new();
        burning(&mut world, &[TilePos::new(5, 7), TilePos::new(6, 6)]);
        let mut state = with_water(100);
        let mut walker = prefect(&mut world, TilePos::new(5, 5), state);

        seek_fire_or_home(&mut walker, &mut state, &mut world, &mut Vec::new());

        assert_eq!(state.action, PrefectAction::FightFire);
        assert_eq!(walker.speed, 0.0);
        assert_eq!(walker.pos, TilePos::new(5, 5));
        assert_eq!(walker.pathway.destination(), TilePos::new(6, 6));
    }

    #[test]
    fn halting_at_a_fire_stops_the_rest_of_the_move() {
        let mut world = World::new();
        burning(&mut world, &[TilePos::new(5, 1)]);
        let route = PathwayHelper::create(
            &world,
            TilePos::new(1, 1),
            TilePos::new(5, 1),
            TerrainPolicy::AllTerrain,
        )
        .expect("open field");
        let mut walker = prefect(&mut world, TilePos::new(1, 1), with_water(100));
        walker.walk(route);
        let id = walker.id;
        world.add_walker(walker, &mut Vec::new());

        for _ in 0..40 {
            apply(&mut world, Command::Tick, &mut Vec::new());
            let fighting = world
                .walkers
                .get(&id)
                .is_some_and(|walker| action(walker) == Some(PrefectAction::FightFire));
            if fighting {
                break;
            }
        }

        let walker = world.walkers.get(&id).expect("fighting the fire");
        assert_eq!(action(walker), Some(PrefectAction::FightFire));
        assert_eq!(walker.pos, TilePos::new(4, 1));
        assert_eq!(walker.heading, Direction::None);
        assert_eq!(walker.progress, 0.0);

        apply(&mut world, Command::Tick, &mut Vec::new());
        let walker = world.walkers.get(&id).expect("still fighting");
        assert_eq!(walker.pos, TilePos::new(4, 1));
        assert_eq!(walker.progress, 0.0);
    }
}
