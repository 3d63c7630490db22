//! Route search over the tile grid.

use civitas_core::{Direction, Pathway, TerrainPolicy, TilePos};
use pathfinding::prelude::astar;
use rand::{seq::SliceRandom, Rng};

use crate::{tilemap::Tilemap, World};

const RANDOM_WAY_ATTEMPTS: usize = 10;

/// A* route search owned by the world.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pathfinder;

impl Pathfinder {
    /// Finds the shortest route from `origin` into the square of radius
    /// `margin` around `goal`.
    ///
    /// Intermediate tiles must be walkable under `policy`; the origin and the
    /// goal itself are always admitted so walkers can leave and enter
    /// buildings. Returns `None` when no route exists or the route is empty.
    #[must_use]
    pub fn get_path(
        &self,
        tilemap: &Tilemap,
        origin: TilePos,
        goal: TilePos,
        policy: TerrainPolicy,
        allow_diagonal: bool,
        margin: u32,
    ) -> Option<Pathway> {
        if !tilemap.is_inside(origin) || !tilemap.is_inside(goal) {
            return None;
        }

        let directions: &[Direction] = if allow_diagonal {
            &Direction::COMPASS
        } else {
            &Direction::CARDINAL
        };

        let (tiles, _cost) = astar(
            &origin,
            |pos| {
                let pos = *pos;
                directions
                    .iter()
                    .map(move |direction| pos.step(*direction))
                    .filter(|next| *next == goal || tilemap.is_walkable(*next, policy))
                    .map(|next| (next, 1u32))
                    .collect::<Vec<_>>()
            },
            |pos| remaining(*pos, goal, margin, allow_diagonal),
            |pos| pos.chebyshev_distance(goal) <= margin,
        )?;

        Pathway::from_tiles(tilemap.bounds(), &tiles)
            .ok()
            .flatten()
            .filter(Pathway::is_valid)
    }
}

fn remaining(pos: TilePos, goal: TilePos, margin: u32, allow_diagonal: bool) -> u32 {
    let di = pos.i().abs_diff(goal.i()).saturating_sub(margin);
    let dj = pos.j().abs_diff(goal.j()).saturating_sub(margin);
    if allow_diagonal {
        di.max(dj)
    } else {
        di + dj
    }
}

/// Route recipes used by walker state machines.
#[derive(Debug)]
pub struct PathwayHelper;

impl PathwayHelper {
    /// Shortest route between two tiles under `policy`.
    ///
    /// Ships may cut corners on open water; land walkers move in rook steps.
    #[must_use]
    pub fn create(
        world: &World,
        from: TilePos,
        to: TilePos,
        policy: TerrainPolicy,
    ) -> Option<Pathway> {
        let allow_diagonal = policy == TerrainPolicy::WaterOnly;
        world
            .pathfinder
            .get_path(&world.tilemap, from, to, policy, allow_diagonal, 0)
    }

    /// Route to a random reachable tile within `max_length` of `from`.
    ///
    /// Up to ten random destinations are tried; the first one reachable in at
    /// most `max_length` steps wins.
    pub fn random_way(world: &mut World, from: TilePos, max_length: u32) -> Option<Pathway> {
        let radius = max_length as i32;
        for _ in 0..RANDOM_WAY_ATTEMPTS {
            let offset = TilePos::new(
                world.rng.gen_range(-radius..=radius),
                world.rng.gen_range(-radius..=radius),
            );
            let destination = from + offset;
            if destination == from || !world.tilemap.is_inside(destination) {
                continue;
            }
            if let Some(pathway) =
                Self::create(world, from, destination, TerrainPolicy::AllTerrain)
            {
                if pathway.len() <= max_length as usize {
                    return Some(pathway);
                }
            }
        }
        None
    }

    /// Random self-avoiding walk of at most `max_length` steps over roads.
    #[must_use]
    pub fn road_patrol(world: &mut World, from: TilePos, max_length: u32) -> Option<Pathway> {
        let mut pathway = Pathway::new(world.tilemap.bounds(), from);
        let mut pos = from;
        for _ in 0..max_length {
            let candidates: Vec<TilePos> = Direction::CARDINAL
                .iter()
                .map(|direction| pos.step(*direction))
                .filter(|next| {
                    world.tilemap.is_walkable(*next, TerrainPolicy::RoadOnly)
                        && !pathway.contains(*next)
                })
                .collect();
            let Some(next) = candidates.choose(&mut world.rng).copied() else {
                break;
            };
            if pathway.set_next_tile(next).is_err() {
                break;
            }
            pos = next;
        }
        Some(pathway).filter(Pathway::is_valid)
    }
}
