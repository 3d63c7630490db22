//! Savegame encoding of the whole world.
//!
//! A savegame is a single [`VariantMap`] tree. Tiles are stored as a flat list
//! of flag bits in row-major order; constructions and walkers are lists of
//! nodes keyed by their persisted names.

use std::collections::BTreeMap;

use civitas_core::{
    variant::{tile_pos_from_value, tile_pos_value},
    ConstructionId, ConstructionKind, ConstructionParam, FundIssueKind,
    PersistenceError, ServiceKind, TraineeKind, VariantMap, VariantMapExt, WalkerKind,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    construction::Construction, funds::Funds, tilemap::TileFlags, walker::Walker, World,
    WorldConfig,
};

/// Serialises the world into a savegame tree.
///
/// Commands still waiting in the dispatcher are not part of the savegame.
#[must_use]
pub fn save_world(world: &World) -> VariantMap {
    let mut stream = VariantMap::new();

    let mut tilemap = VariantMap::new();
    let _ = tilemap.insert("columns".to_owned(), Value::from(world.tilemap.columns()));
    let _ = tilemap.insert("rows".to_owned(), Value::from(world.tilemap.rows()));
    let flags: Vec<Value> = world
        .tilemap
        .iter()
        .map(|tile| Value::from(tile.flags().bits()))
        .collect();
    let _ = tilemap.insert("flags".to_owned(), Value::from(flags));
    let _ = stream.insert("tilemap".to_owned(), Value::Object(tilemap));

    let mut funds = VariantMap::new();
    let _ = funds.insert("balance".to_owned(), Value::from(world.funds.balance()));
    let ledger: VariantMap = world
        .funds
        .ledger()
        .map(|(kind, amount)| (kind.name().to_owned(), Value::from(amount)))
        .collect();
    let _ = funds.insert("ledger".to_owned(), Value::Object(ledger));
    let _ = stream.insert("funds".to_owned(), Value::Object(funds));

    let _ = stream.insert("tick".to_owned(), Value::from(world.tick));
    let _ = stream.insert("seed".to_owned(), Value::from(world.seed));
    let _ = stream.insert(
        "wordPos".to_owned(),
        Value::from(world.rng.get_word_pos().to_string()),
    );
    let _ = stream.insert(
        "nextConstruction".to_owned(),
        Value::from(world.next_construction),
    );
    let _ = stream.insert("nextWalker".to_owned(), Value::from(world.next_walker));

    let constructions: Vec<Value> = world
        .constructions
        .values()
        .filter(|construction| !construction.is_deleted())
        .map(|construction| Value::Object(save_construction(construction)))
        .collect();
    let _ = stream.insert("constructions".to_owned(), Value::from(constructions));

    let walkers: Vec<Value> = world
        .walkers
        .values()
        .filter(|walker| !walker.is_deleted())
        .map(|walker| Value::Object(walker.save()))
        .collect();
    let _ = stream.insert("walkers".to_owned(), Value::from(walkers));

    stream
}

/// Rebuilds a world from a savegame written by [`save_world`].
///
/// Access roads are recomputed from the restored tiles. Prefects whose
/// prefecture no longer exists are dropped with a warning.
pub fn load_world(stream: &VariantMap) -> Result<World, PersistenceError> {
    let tilemap = stream.node("tilemap")?;
    let config = WorldConfig {
        columns: u32_value(tilemap, "columns")?,
        rows: u32_value(tilemap, "rows")?,
        seed: stream.uint("seed")?,
        initial_funds: 0,
    };
    let mut world = World::with_config(config);

    let positions: Vec<_> = world.tilemap.iter().map(|tile| tile.pos()).collect();
    let flags = tilemap.list("flags")?;
    if flags.len() != positions.len() {
        return Err(PersistenceError::WrongType {
            key: "flags".to_owned(),
            expected: "one entry per tile",
        });
    }
    for (pos, bits) in positions.into_iter().zip(flags) {
        let bits = bits
            .as_u64()
            .and_then(|bits| u16::try_from(bits).ok())
            .ok_or_else(|| PersistenceError::WrongType {
                key: "flags".to_owned(),
                expected: "16-bit tile flags",
            })?;
        if let Some(tile) = world.tilemap.tile_mut(pos) {
            *tile.flags_mut() = TileFlags::from_bits_truncate(bits);
        }
    }

    let funds = stream.node("funds")?;
    let mut ledger = BTreeMap::new();
    for (name, amount) in funds.node("ledger")? {
        let kind = FundIssueKind::from_name(name).ok_or_else(|| PersistenceError::UnknownValue {
            key: "ledger".to_owned(),
            value: name.clone(),
        })?;
        let amount = amount.as_i64().ok_or_else(|| PersistenceError::WrongType {
            key: name.clone(),
            expected: "an integer",
        })?;
        let _ = ledger.insert(kind, amount);
    }
    world.funds = Funds::restore(funds.int("balance")?, ledger);

    world.tick = stream.uint("tick")?;
    let word_pos = stream.text("wordPos")?;
    let word_pos = word_pos
        .parse::<u128>()
        .map_err(|_| PersistenceError::UnknownValue {
            key: "wordPos".to_owned(),
            value: word_pos.to_owned(),
        })?;
    world.rng = ChaCha8Rng::seed_from_u64(world.seed);
    world.rng.set_word_pos(word_pos);
    world.next_construction = u32_value(stream, "nextConstruction")?;
    world.next_walker = u32_value(stream, "nextWalker")?;

    for node in stream.list("constructions")? {
        let node = as_node("constructions", node)?;
        let construction = load_construction(node)?;
        let id = construction.id();
        let footprint = world
            .tilemap
            .area(construction.origin(), construction.size())
            .ok_or_else(|| PersistenceError::WrongType {
                key: "origin".to_owned(),
                expected: "a footprint inside the map",
            })?;
        for pos in footprint {
            if let Some(tile) = world.tilemap.tile_mut(pos) {
                tile.attach(id, construction.origin());
            }
        }
        let _ = world.constructions.insert(id, construction);
    }
    for construction in world.constructions.values_mut() {
        construction.compute_access_roads(&world.tilemap);
    }

    let bounds = world.tilemap.bounds();
    for node in stream.list("walkers")? {
        let walker = Walker::load(bounds, as_node("walkers", node)?)?;
        if walker.kind() == WalkerKind::Prefect {
            let stationed = walker.base().is_some_and(|base| {
                world
                    .constructions
                    .get(&base)
                    .is_some_and(|station| station.kind() == ConstructionKind::Prefecture)
            });
            if !stationed {
                warn!(
                    walker = walker.id().get(),
                    base = ?walker.base().map(|base| base.get()),
                    "prefect without a prefecture dropped"
                );
                continue;
            }
        }
        let _ = world.walkers.insert(walker.id(), walker);
    }

    info!(
        tick = world.tick,
        constructions = world.constructions.len(),
        walkers = world.walkers.len(),
        "world loaded"
    );
    Ok(world)
}

fn save_construction(construction: &Construction) -> VariantMap {
    let mut stream = VariantMap::new();
    let _ = stream.insert("id".to_owned(), Value::from(construction.id().get()));
    let _ = stream.insert("type".to_owned(), Value::from(construction.kind().name()));
    let _ = stream.insert("origin".to_owned(), tile_pos_value(construction.origin()));
    let _ = stream.insert(
        "fire".to_owned(),
        Value::from(construction.state(ConstructionParam::Fire)),
    );
    let _ = stream.insert(
        "damage".to_owned(),
        Value::from(construction.state(ConstructionParam::Damage)),
    );
    let services: Vec<Value> = construction
        .reserved_services()
        .map(|service| Value::from(service.name()))
        .collect();
    let _ = stream.insert("services".to_owned(), Value::from(services));
    let trainees: VariantMap = construction
        .trainees()
        .map(|(kind, level)| (kind.name().to_owned(), Value::from(level)))
        .collect();
    let _ = stream.insert("trainees".to_owned(), Value::Object(trainees));
    let reserved: Vec<Value> = construction
        .reserved_trainees()
        .map(|kind| Value::from(kind.name()))
        .collect();
    let _ = stream.insert("reservedTrainees".to_owned(), Value::from(reserved));

    match construction.kind() {
        ConstructionKind::House => {
            let _ = stream.insert("level".to_owned(), Value::from(construction.level()));
            let _ = stream.insert("health".to_owned(), Value::from(construction.health()));
        }
        ConstructionKind::Market => {
            let _ = stream.insert("stock".to_owned(), Value::from(construction.stock()));
        }
        ConstructionKind::Prefecture => {
            let report = construction
                .pending_fire()
                .map_or(Value::Null, tile_pos_value);
            let _ = stream.insert("fireReport".to_owned(), report);
        }
        _ => {}
    }
    stream
}

fn load_construction(stream: &VariantMap) -> Result<Construction, PersistenceError> {
    let name = stream.text("type")?;
    let kind = ConstructionKind::from_name(name).ok_or_else(|| PersistenceError::UnknownValue {
        key: "type".to_owned(),
        value: name.to_owned(),
    })?;
    let id = ConstructionId::new(u32_value(stream, "id")?);
    let mut construction = Construction::new(id, kind, stream.tile_pos("origin")?);
    construction.update_state(ConstructionParam::Fire, stream.float("fire")? as f32, false);
    construction.update_state(
        ConstructionParam::Damage,
        stream.float("damage")? as f32,
        false,
    );

    for service in stream.list("services")? {
        let service = service
            .as_str()
            .and_then(ServiceKind::from_name)
            .ok_or_else(|| unknown("services", service))?;
        let _ = construction.reserve_service(service);
    }
    for (name, level) in stream.node("trainees")? {
        let kind = TraineeKind::from_name(name).ok_or_else(|| PersistenceError::UnknownValue {
            key: "trainees".to_owned(),
            value: name.clone(),
        })?;
        let level = level
            .as_i64()
            .and_then(|level| i32::try_from(level).ok())
            .ok_or_else(|| unknown("trainees", level))?;
        construction.restore_trainee(kind, level);
    }
    for trainee in stream.list("reservedTrainees")? {
        let kind = trainee
            .as_str()
            .and_then(TraineeKind::from_name)
            .ok_or_else(|| unknown("reservedTrainees", trainee))?;
        construction.reserve_trainee(kind);
    }

    match kind {
        ConstructionKind::House => {
            let level = u8::try_from(stream.uint("level")?).unwrap_or(u8::MAX);
            let health = u8::try_from(stream.uint("health")?).unwrap_or(u8::MAX);
            construction.configure_house(level, health);
        }
        ConstructionKind::Market => construction.restore_stock(u32_value(stream, "stock")?),
        ConstructionKind::Prefecture => {
            if let Some(report) = stream.get("fireReport").filter(|report| !report.is_null()) {
                construction.fire_detect(tile_pos_from_value("fireReport", report)?);
            }
        }
        _ => {}
    }
    Ok(construction)
}

fn as_node<'a>(key: &str, value: &'a Value) -> Result<&'a VariantMap, PersistenceError> {
    value.as_object().ok_or_else(|| PersistenceError::WrongType {
        key: key.to_owned(),
        expected: "a list of maps",
    })
}

fn u32_value(stream: &VariantMap, key: &str) -> Result<u32, PersistenceError> {
    u32::try_from(stream.uint(key)?).map_err(|_| PersistenceError::WrongType {
        key: key.to_owned(),
        expected: "a 32-bit unsigned integer",
    })
}

fn unknown(key: &str, value: &Value) -> PersistenceError {
    PersistenceError::UnknownValue {
        key: key.to_owned(),
        value: value.to_string(),
    }
}
