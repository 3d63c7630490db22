//! Walker engine shared by every kind of actor.
//!
//! A walker stands on the centre of a tile between moves. Each tick it covers
//! a quarter of a tile at speed 1.0. Crossing the half-way boundary moves it
//! onto the next tile; reaching that tile's centre runs the kind's mid-tile
//! hook and reads the next step of its pathway. A walker the hook brings to a
//! halt stays on that centre for the rest of the tick.

use civitas_core::{
    ConstructionGroup, ConstructionId, ConstructionKind, Direction, Event, MapBounds, Pathway,
    PersistenceError, ServiceKind, TilePos, VariantMap, VariantMapExt, WalkerId, WalkerKind,
    WalkerSnapshot,
};
use serde_json::Value;
use tracing::{debug, trace};

use crate::World;

pub(crate) mod market_kid;
pub(crate) mod prefect;
pub(crate) mod protestor;
pub(crate) mod ship;

pub use market_kid::MarketKidState;
pub use prefect::{PrefectAction, PrefectState};
pub use protestor::{ProtestorAction, ProtestorState};

const STEP_PER_TICK: f32 = 0.25;
const HALF_TILE: f32 = 0.5;
const FULL_TILE: f32 = 1.0;
const DEFAULT_HEALTH: i32 = 100;
const CORPSE_LIFETIME: u32 = 64;

/// Radius within which service walkers reach buildings.
pub(crate) const SERVICE_RADIUS: u32 = 2;

/// Kind-specific state of a walker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Behaviour {
    /// Fire and crime fighter sent from a prefecture.
    Prefect(PrefectState),
    /// Rioter sent from a house.
    Protestor(ProtestorState),
    /// Helper carrying goods back to a market.
    MarketKid(MarketKidState),
    /// Vessel sailing to a water tile.
    Ship,
    /// Remains of a dead walker.
    Corpse {
        /// Ticks until the remains disappear.
        ticks_left: u32,
    },
}

impl Behaviour {
    /// Walker kind the behaviour belongs to.
    #[must_use]
    pub const fn kind(&self) -> WalkerKind {
        match self {
            Self::Prefect(_) => WalkerKind::Prefect,
            Self::Protestor(_) => WalkerKind::Protestor,
            Self::MarketKid(_) => WalkerKind::MarketKid,
            Self::Ship => WalkerKind::Ship,
            Self::Corpse { .. } => WalkerKind::Corpse,
        }
    }
}

/// Chronic condition draining health on a fixed period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Illness {
    strength: i32,
    period: u64,
}

impl Illness {
    pub(crate) const fn new(strength: i32, period: u64) -> Self {
        Self { strength, period }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Walker {
    id: WalkerId,
    behaviour: Behaviour,
    pos: TilePos,
    pathway: Pathway,
    heading: Direction,
    progress: f32,
    speed: f32,
    health: i32,
    base: Option<ConstructionId>,
    reserved: Vec<ConstructionId>,
    illness: Option<Illness>,
    deleted: bool,
}

impl Walker {
    pub(crate) fn new(id: WalkerId, behaviour: Behaviour, pos: TilePos, bounds: MapBounds) -> Self {
        Self {
            id,
            behaviour,
            pos,
            pathway: Pathway::new(bounds, pos),
            heading: Direction::None,
            progress: 0.0,
            speed: 1.0,
            health: DEFAULT_HEALTH,
            base: None,
            reserved: Vec::new(),
            illness: None,
            deleted: false,
        }
    }

    pub(crate) const fn id(&self) -> WalkerId {
        self.id
    }

    pub(crate) const fn kind(&self) -> WalkerKind {
        self.behaviour.kind()
    }

    pub(crate) const fn behaviour(&self) -> Behaviour {
        self.behaviour
    }

    pub(crate) const fn pos(&self) -> TilePos {
        self.pos
    }

    pub(crate) const fn base(&self) -> Option<ConstructionId> {
        self.base
    }

    pub(crate) const fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub(crate) fn pathway(&self) -> &Pathway {
        &self.pathway
    }

    pub(crate) fn snapshot(&self) -> WalkerSnapshot {
        WalkerSnapshot {
            id: self.id,
            kind: self.kind(),
            pos: self.pos,
            health: self.health,
            speed: self.speed,
            base: self.base,
        }
    }

    fn set_pathway(&mut self, pathway: Pathway) {
        self.pathway = pathway;
    }

    /// Starts moving along the current pathway from the tile centre.
    fn go(&mut self) {
        self.progress = 0.0;
        self.heading = self.pathway.next_direction();
    }

    fn walk(&mut self, pathway: Pathway) {
        self.set_pathway(pathway);
        self.go();
    }

    pub(crate) fn update_health(&mut self, delta: i32) {
        self.health = self.health.saturating_add(delta);
    }

    fn delete_later(&mut self) {
        self.deleted = true;
    }

    /// Marks the walker dead and leaves remains on its tile.
    fn die(&mut self, world: &mut World, out: &mut Vec<Event>) {
        if self.deleted {
            return;
        }
        self.deleted = true;
        debug!(walker = self.id.get(), kind = self.kind().name(), "walker died");
        out.push(Event::WalkerDied {
            walker: self.id,
            kind: self.kind(),
            pos: self.pos,
        });

        if self.kind() == WalkerKind::Corpse {
            return;
        }
        let id = world.next_walker_id();
        let mut corpse = Walker::new(
            id,
            Behaviour::Corpse {
                ticks_left: CORPSE_LIFETIME,
            },
            self.pos,
            world.tilemap.bounds(),
        );
        corpse.speed = 0.0;
        world.add_walker(corpse, out);
    }

    pub(crate) fn time_step(&mut self, world: &mut World, out: &mut Vec<Event>) {
        match self.behaviour {
            Behaviour::Prefect(_) => prefect::time_step(self, world, out),
            Behaviour::Protestor(_) => protestor::time_step(self, world, out),
            Behaviour::MarketKid(_) => market_kid::time_step(self, world, out),
            Behaviour::Ship => self.advance(world, out),
            Behaviour::Corpse { ticks_left } => {
                let ticks_left = ticks_left.saturating_sub(1);
                self.behaviour = Behaviour::Corpse { ticks_left };
                if ticks_left == 0 {
                    self.delete_later();
                }
            }
        }

        if let Some(illness) = self.illness {
            if illness.period > 0 && world.tick % illness.period == 0 {
                self.update_health(-illness.strength);
            }
        }

        if self.health <= 0 {
            self.die(world, out);
        }
    }

    /// Moves the walker along its pathway for one tick.
    fn advance(&mut self, world: &mut World, out: &mut Vec<Event>) {
        let mut budget = self.speed * STEP_PER_TICK;
        while budget > 0.0 && !self.deleted && self.heading != Direction::None {
            let crossing = self.progress < HALF_TILE;
            let needed = if crossing { HALF_TILE } else { FULL_TILE } - self.progress;
            if budget < needed {
                self.progress += budget;
                break;
            }
            budget -= needed;

            if crossing {
                self.progress = HALF_TILE;
                self.pos = self.pos.step(self.heading);
                self.on_new_tile();
                continue;
            }

            self.progress = 0.0;
            self.heading = Direction::None;
            self.on_mid_tile(world, out);
            if self.speed <= 0.0 {
                break;
            }
            if self.heading == Direction::None && !self.deleted {
                self.heading = self.pathway.next_direction();
                if self.heading == Direction::None {
                    self.on_destination(world);
                }
            }
        }
    }

    fn on_new_tile(&mut self) {
        trace!(
            walker = self.id.get(),
            i = self.pos.i(),
            j = self.pos.j(),
            "walker entered tile"
        );
    }

    fn on_mid_tile(&mut self, world: &mut World, out: &mut Vec<Event>) {
        if let Behaviour::Prefect(_) = self.behaviour {
            prefect::on_mid_tile(self, world, out);
        }
    }

    fn on_destination(&mut self, world: &mut World) {
        match self.behaviour {
            Behaviour::Protestor(_) => protestor::on_destination(self),
            Behaviour::MarketKid(_) => market_kid::on_destination(self, world),
            Behaviour::Ship => self.delete_later(),
            Behaviour::Prefect(_) | Behaviour::Corpse { .. } => {}
        }
    }

    /// Releases every service visit the walker reserved and did not deliver.
    pub(crate) fn cancel_reservations(&mut self, world: &mut World) {
        for id in self.reserved.drain(..) {
            if let Some(construction) = world.constructions.get_mut(&id) {
                construction.cancel_service(ServiceKind::Prefect);
            }
        }
    }

    pub(crate) fn save(&self) -> VariantMap {
        let mut stream = VariantMap::new();
        let _ = stream.insert("type".to_owned(), Value::from(self.kind().name()));
        let _ = stream.insert("id".to_owned(), Value::from(self.id.get()));
        let _ = stream.insert(
            "pos".to_owned(),
            civitas_core::variant::tile_pos_value(self.pos),
        );
        let _ = stream.insert("pathway".to_owned(), Value::Object(self.pathway.save()));
        let _ = stream.insert("heading".to_owned(), Value::from(self.heading.code()));
        let _ = stream.insert("progress".to_owned(), Value::from(self.progress));
        let _ = stream.insert("speed".to_owned(), Value::from(self.speed));
        let _ = stream.insert("health".to_owned(), Value::from(self.health));
        let base = self
            .base
            .map_or(Value::Null, |base| Value::from(base.get()));
        let _ = stream.insert("base".to_owned(), base);
        let reserved: Vec<Value> = self
            .reserved
            .iter()
            .map(|id| Value::from(id.get()))
            .collect();
        let _ = stream.insert("reserved".to_owned(), Value::from(reserved));
        if let Some(illness) = self.illness {
            let _ = stream.insert(
                "illness".to_owned(),
                Value::from(vec![
                    i64::from(illness.strength),
                    i64::try_from(illness.period).unwrap_or(i64::MAX),
                ]),
            );
        }

        match self.behaviour {
            Behaviour::Prefect(state) => state.save(&mut stream),
            Behaviour::Protestor(state) => state.save(&mut stream),
            Behaviour::MarketKid(state) => state.save(&mut stream),
            Behaviour::Ship => {}
            Behaviour::Corpse { ticks_left } => {
                let _ = stream.insert("ticksLeft".to_owned(), Value::from(ticks_left));
            }
        }
        stream
    }

    pub(crate) fn load(bounds: MapBounds, stream: &VariantMap) -> Result<Self, PersistenceError> {
        let kind_name = stream.text("type")?;
        let kind = WalkerKind::from_name(kind_name).ok_or_else(|| PersistenceError::UnknownValue {
            key: "type".to_owned(),
            value: kind_name.to_owned(),
        })?;
        let behaviour = match kind {
            WalkerKind::Prefect => Behaviour::Prefect(PrefectState::load(stream)?),
            WalkerKind::Protestor => Behaviour::Protestor(ProtestorState::load(stream)?),
            WalkerKind::MarketKid => Behaviour::MarketKid(MarketKidState::load(stream)?),
            WalkerKind::Ship => Behaviour::Ship,
            WalkerKind::Corpse => Behaviour::Corpse {
                ticks_left: u32_value(stream, "ticksLeft")?,
            },
        };

        let id = WalkerId::new(u32_value(stream, "id")?);
        let pos = stream.tile_pos("pos")?;
        let mut walker = Walker::new(id, behaviour, pos, bounds);
        if let Some(pathway) = Pathway::load(bounds, stream.node("pathway")?)? {
            walker.pathway = pathway;
        }
        let heading = u8::try_from(stream.uint("heading")?)
            .ok()
            .and_then(Direction::from_code)
            .ok_or_else(|| PersistenceError::UnknownValue {
                key: "heading".to_owned(),
                value: stream
                    .value("heading")
                    .map(|value| value.to_string())
                    .unwrap_or_default(),
            })?;
        walker.heading = heading;
        walker.progress = stream.float_or("progress", 0.0)? as f32;
        walker.speed = stream.float("speed")? as f32;
        walker.health = i32::try_from(stream.int("health")?).unwrap_or(0);
        walker.base = match stream.value("base")? {
            Value::Null => None,
            _ => Some(ConstructionId::new(u32_value(stream, "base")?)),
        };
        walker.reserved = stream
            .list("reserved")?
            .iter()
            .filter_map(Value::as_u64)
            .filter_map(|raw| u32::try_from(raw).ok())
            .map(ConstructionId::new)
            .collect();
        if let Ok(illness) = stream.list("illness") {
            if let [strength, period] = illness.as_slice() {
                let strength = strength.as_i64().and_then(|raw| i32::try_from(raw).ok());
                let period = period.as_u64();
                if let (Some(strength), Some(period)) = (strength, period) {
                    walker.illness = Some(Illness::new(strength, period));
                }
            }
        }
        Ok(walker)
    }
}

fn u32_value(stream: &VariantMap, key: &str) -> Result<u32, PersistenceError> {
    u32::try_from(stream.uint(key)?).map_err(|_| PersistenceError::WrongType {
        key: key.to_owned(),
        expected: "a 32-bit unsigned integer",
    })
}

/// Buildings a service walker standing on `pos` can reach.
fn reached_buildings(world: &World, pos: TilePos) -> Vec<ConstructionId> {
    world
        .constructions_near(pos, SERVICE_RADIUS)
        .into_iter()
        .filter(|id| {
            world.constructions.get(id).is_some_and(|construction| {
                construction.kind() != ConstructionKind::Road
                    && !construction.is_deleted()
            })
        })
        .collect()
}

/// Whether the construction may be targeted by rioters.
fn is_riot_target(kind: ConstructionKind) -> bool {
    kind != ConstructionKind::Road && kind.group() != ConstructionGroup::Disaster
}
