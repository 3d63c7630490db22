//! Ships sailing across open water.

use civitas_core::{Event, TerrainPolicy, TilePos};
use tracing::debug;

use super::{Behaviour, Walker};
use crate::{pathfinder::PathwayHelper, tilemap::TileFlags, World};

/// Launches a ship on `from` bound for `to`.
pub(crate) fn send_to_city(world: &mut World, from: TilePos, to: TilePos, out: &mut Vec<Event>) {
    let on_water = world
        .tilemap
        .tile(from)
        .is_some_and(|tile| tile.flags().contains(TileFlags::WATER));
    if !on_water {
        debug!(i = from.i(), j = from.j(), "ships start on water");
        return;
    }
    let Some(route) = PathwayHelper::create(world, from, to, TerrainPolicy::WaterOnly) else {
        debug!(i = to.i(), j = to.j(), "no water route");
        return;
    };

    let id = world.next_walker_id();
    let mut walker = Walker::new(id, Behaviour::Ship, from, world.tilemap.bounds());
    walker.walk(route);
    world.add_walker(walker, out);
}
