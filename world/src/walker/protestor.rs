//! Protestors rioting against richer neighbourhoods.

use civitas_core::{
    ConstructionId, ConstructionKind, ConstructionParam, Event, PersistenceError, TerrainPolicy,
    TilePos, VariantMap, VariantMapExt,
};
use rand::Rng;
use serde_json::Value;
use tracing::debug;

use super::{is_riot_target, Behaviour, Illness, Walker};
use crate::{pathfinder::PathwayHelper, World};

const TARGET_ATTEMPTS: usize = 10;
const WANDER_LENGTH: u32 = 10;
const RIOT_PERIOD: u64 = 16;
const RIOT_DAMAGE: f32 = 5.0;
const ILLNESS_STRENGTH: i32 = 1;
const ILLNESS_PERIOD: u64 = 4;

/// Stage of a protest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtestorAction {
    /// Looking for a house richer than the one the protestor left.
    SearchHouse,
    /// Walking to the chosen target.
    GoToDestination,
    /// Looking for any building that can be damaged.
    SearchAnyBuilding,
    /// Damaging constructions around the current tile.
    DestroyConstruction,
    /// Looking for a random place to wander to.
    GoToAnyPlace,
    /// Leaving the city.
    GoOutFromCity,
    /// Idle.
    Wait,
}

impl ProtestorAction {
    /// Persisted numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::SearchHouse => 0,
            Self::GoToDestination => 1,
            Self::SearchAnyBuilding => 2,
            Self::DestroyConstruction => 3,
            Self::GoToAnyPlace => 4,
            Self::GoOutFromCity => 5,
            Self::Wait => 6,
        }
    }

    /// Decodes a persisted numeric code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::SearchHouse),
            1 => Some(Self::GoToDestination),
            2 => Some(Self::SearchAnyBuilding),
            3 => Some(Self::DestroyConstruction),
            4 => Some(Self::GoToAnyPlace),
            5 => Some(Self::GoOutFromCity),
            6 => Some(Self::Wait),
            _ => None,
        }
    }
}

/// State carried by a protestor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtestorState {
    /// Current stage of the protest.
    pub action: ProtestorAction,
    /// Level of the house the protestor came from.
    pub house_level: u8,
}

impl ProtestorState {
    pub(crate) fn save(&self, stream: &mut VariantMap) {
        let _ = stream.insert("houseLevel".to_owned(), Value::from(self.house_level));
        let _ = stream.insert("state".to_owned(), Value::from(self.action.code()));
    }

    pub(crate) fn load(stream: &VariantMap) -> Result<Self, PersistenceError> {
        let raw = stream.uint("state")?;
        let action = u8::try_from(raw)
            .ok()
            .and_then(ProtestorAction::from_code)
            .ok_or_else(|| PersistenceError::UnknownValue {
                key: "state".to_owned(),
                value: raw.to_string(),
            })?;
        Ok(Self {
            action,
            house_level: u8::try_from(stream.uint("houseLevel")?).unwrap_or(u8::MAX),
        })
    }
}

/// Sends a protestor out of `house`, starting on the house tile.
pub(crate) fn send_to_city(world: &mut World, house: ConstructionId, out: &mut Vec<Event>) {
    let Some(origin) = world
        .constructions
        .get(&house)
        .filter(|origin| origin.kind() == ConstructionKind::House && !origin.is_deleted())
    else {
        debug!(house = house.get(), "no house to send a protestor from");
        return;
    };
    let state = ProtestorState {
        action: ProtestorAction::SearchHouse,
        house_level: origin.level(),
    };
    let pos = origin.origin();

    let id = world.next_walker_id();
    let mut walker = Walker::new(id, Behaviour::Protestor(state), pos, world.tilemap.bounds());
    walker.base = Some(house);
    walker.illness = Some(Illness::new(ILLNESS_STRENGTH, ILLNESS_PERIOD));
    world.add_walker(walker, out);
}

pub(super) fn time_step(walker: &mut Walker, world: &mut World, out: &mut Vec<Event>) {
    walker.advance(world, out);

    let Behaviour::Protestor(mut state) = walker.behaviour else {
        return;
    };
    match state.action {
        ProtestorAction::SearchHouse => {
            let richer: Vec<ConstructionId> = world
                .constructions
                .values()
                .filter(|house| {
                    house.kind() == ConstructionKind::House
                        && !house.is_deleted()
                        && house.level() > state.house_level
                })
                .map(|house| house.id())
                .collect();
            match find_target(world, walker.pos, &richer) {
                Some(route) => {
                    walker.walk(route);
                    state.action = ProtestorAction::GoToDestination;
                }
                None => state.action = ProtestorAction::SearchAnyBuilding,
            }
        }
        ProtestorAction::SearchAnyBuilding => {
            let targets: Vec<ConstructionId> = world
                .constructions
                .values()
                .filter(|target| {
                    target.kind() != ConstructionKind::House
                        && is_riot_target(target.kind())
                        && !target.is_deleted()
                })
                .map(|target| target.id())
                .collect();
            match find_target(world, walker.pos, &targets) {
                Some(route) => {
                    walker.walk(route);
                    state.action = ProtestorAction::GoToDestination;
                }
                None => state.action = ProtestorAction::GoToAnyPlace,
            }
        }
        ProtestorAction::GoToAnyPlace => {
            match PathwayHelper::random_way(world, walker.pos, WANDER_LENGTH) {
                Some(route) => {
                    walker.walk(route);
                    state.action = ProtestorAction::GoToDestination;
                }
                None => {
                    state.action = ProtestorAction::Wait;
                    walker.die(world, out);
                }
            }
        }
        ProtestorAction::DestroyConstruction => {
            if world.tick % RIOT_PERIOD == 1 {
                let victim = world
                    .constructions_near(walker.pos, 1)
                    .into_iter()
                    .find(|id| {
                        world.constructions.get(id).is_some_and(|target| {
                            is_riot_target(target.kind()) && !target.is_deleted()
                        })
                    });
                match victim.and_then(|id| world.constructions.get_mut(&id)) {
                    Some(target) => {
                        target.update_state(ConstructionParam::Fire, RIOT_DAMAGE, true);
                        target.update_state(ConstructionParam::Damage, RIOT_DAMAGE, true);
                    }
                    None => state.action = ProtestorAction::SearchHouse,
                }
            }
        }
        ProtestorAction::GoToDestination | ProtestorAction::GoOutFromCity | ProtestorAction::Wait => {}
    }

    walker.behaviour = Behaviour::Protestor(state);
}

pub(super) fn on_destination(walker: &mut Walker) {
    if let Behaviour::Protestor(mut state) = walker.behaviour {
        if state.action == ProtestorAction::GoToDestination {
            state.action = ProtestorAction::DestroyConstruction;
            walker.behaviour = Behaviour::Protestor(state);
        }
    }
}

/// Route to one of `candidates` picked at random.
///
/// Up to ten random picks are tried; the first reachable one wins.
fn find_target(
    world: &mut World,
    from: TilePos,
    candidates: &[ConstructionId],
) -> Option<civitas_core::Pathway> {
    if candidates.is_empty() {
        return None;
    }
    for _ in 0..TARGET_ATTEMPTS {
        let pick = candidates[world.rng.gen_range(0..candidates.len())];
        let Some(enter) = world.constructions.get(&pick).map(|target| target.enter_pos()) else {
            continue;
        };
        if let Some(route) = PathwayHelper::create(world, from, enter, TerrainPolicy::AllTerrain) {
            return Some(route);
        }
    }
    None
}
