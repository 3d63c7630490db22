//! Discrete routes across the tile grid.
//!
//! A [`Pathway`] records the compass steps leading from an origin tile to a
//! destination tile together with the tiles visited on the way. Walkers replay
//! the steps through a cursor that can run forward from the origin, backward
//! from the destination, or be flipped mid-route.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::{
    variant::{tile_pos_value, PersistenceError, VariantMap, VariantMapExt},
    Direction, TilePos,
};

const KEY_START: &str = "startPos";
const KEY_STOP: &str = "stopPos";
const KEY_DIRECTIONS: &str = "directions";
const KEY_REVERSE: &str = "reverse";
const KEY_STEP: &str = "step";

/// Rectangular extent a route must stay within.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapBounds {
    columns: u32,
    rows: u32,
}

impl MapBounds {
    /// Creates bounds covering `columns` by `rows` tiles anchored at `[0,0]`.
    #[must_use]
    pub const fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }

    /// Number of columns covered.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows covered.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Reports whether the tile lies inside the bounds.
    #[must_use]
    pub const fn contains(&self, pos: TilePos) -> bool {
        pos.i() >= 0
            && pos.j() >= 0
            && (pos.i() as u32) < self.columns
            && (pos.j() as u32) < self.rows
    }
}

/// Reasons a route extension is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PathwayError {
    /// The step would leave the map.
    #[error("destination {pos} lies outside the map")]
    OutOfBounds {
        /// Tile the step would have reached.
        pos: TilePos,
    },
    /// The requested tile is not a neighbour of the current destination.
    #[error("tile {tile} is not adjacent to destination {destination}")]
    NotAdjacent {
        /// Current destination of the route.
        destination: TilePos,
        /// Tile that was requested.
        tile: TilePos,
    },
    /// [`Direction::None`] cannot extend a route.
    #[error("a route cannot be extended without a direction")]
    NoDirection,
}

/// Ordered route of compass steps from an origin tile.
///
/// The destination always equals the origin displaced by every recorded step,
/// and the tile list always holds one more entry than the step list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pathway {
    bounds: MapBounds,
    origin: TilePos,
    destination: TilePos,
    directions: Vec<Direction>,
    tiles: Vec<TilePos>,
    forward: usize,
    backward: usize,
    reverse: bool,
}

impl Pathway {
    /// Creates an empty route starting and ending at `origin`.
    #[must_use]
    pub fn new(bounds: MapBounds, origin: TilePos) -> Self {
        Self {
            bounds,
            origin,
            destination: origin,
            directions: Vec::new(),
            tiles: vec![origin],
            forward: 0,
            backward: 0,
            reverse: false,
        }
    }

    /// Builds a route visiting `tiles` in order; the first tile is the origin.
    ///
    /// Returns `None` for an empty tile list.
    pub fn from_tiles(bounds: MapBounds, tiles: &[TilePos]) -> Result<Option<Self>, PathwayError> {
        let Some((&origin, rest)) = tiles.split_first() else {
            return Ok(None);
        };
        let mut pathway = Self::new(bounds, origin);
        for &tile in rest {
            pathway.set_next_tile(tile)?;
        }
        Ok(Some(pathway))
    }

    /// Resets the route to start and end at `origin`.
    pub fn init(&mut self, bounds: MapBounds, origin: TilePos) {
        *self = Self::new(bounds, origin);
    }

    /// Number of steps in the route.
    #[must_use]
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    /// Reports whether the route holds no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    /// A route is usable only when it contains at least one step.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_empty()
    }

    /// Tile the route starts from.
    #[must_use]
    pub const fn origin(&self) -> TilePos {
        self.origin
    }

    /// Tile the route ends on.
    #[must_use]
    pub const fn destination(&self) -> TilePos {
        self.destination
    }

    /// Map extent the route was validated against.
    #[must_use]
    pub const fn bounds(&self) -> MapBounds {
        self.bounds
    }

    /// Whether the cursor currently runs from the destination to the origin.
    #[must_use]
    pub const fn is_reverse(&self) -> bool {
        self.reverse
    }

    /// Number of steps consumed by the active cursor.
    #[must_use]
    pub const fn step(&self) -> usize {
        if self.reverse {
            self.backward
        } else {
            self.forward
        }
    }

    /// Recorded steps from origin to destination.
    #[must_use]
    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    /// Every tile on the route, origin first.
    #[must_use]
    pub fn tiles(&self) -> &[TilePos] {
        &self.tiles
    }

    /// Rewinds the forward cursor to the origin and makes it active.
    pub fn begin(&mut self) {
        self.forward = 0;
        self.reverse = false;
    }

    /// Rewinds the backward cursor to the destination and makes it active.
    pub fn rbegin(&mut self) {
        self.backward = 0;
        self.reverse = true;
    }

    /// Returns the next step and advances the active cursor.
    ///
    /// [`Direction::None`] signals that the end of the route was reached.
    /// Walking backward yields the opposite of every recorded step.
    pub fn next_direction(&mut self) -> Direction {
        let count = self.directions.len();
        if self.reverse {
            if self.backward >= count {
                return Direction::None;
            }
            let direction = self.directions[count - 1 - self.backward].opposite();
            self.backward += 1;
            direction
        } else {
            if self.forward >= count {
                return Direction::None;
            }
            let direction = self.directions[self.forward];
            self.forward += 1;
            direction
        }
    }

    /// Reports whether the active cursor consumed every step.
    #[must_use]
    pub fn is_destination(&self) -> bool {
        self.step() >= self.directions.len()
    }

    /// Flips the travel direction while keeping the walker's place in the route.
    ///
    /// The new cursor mirrors the old one, so the next step retraces the last
    /// consumed step and toggling twice restores the original cursor.
    pub fn toggle_direction(&mut self) {
        let count = self.directions.len();
        if self.reverse {
            self.reverse = false;
            self.forward = count - self.backward.min(count);
        } else {
            self.reverse = true;
            self.backward = count - self.forward.min(count);
        }
    }

    /// Appends a step to the route.
    ///
    /// Steps leaving the map and [`Direction::None`] are logged and refused
    /// without touching the destination.
    pub fn set_next_direction(&mut self, direction: Direction) -> Result<(), PathwayError> {
        if direction == Direction::None {
            warn!(
                i = self.destination.i(),
                j = self.destination.j(),
                "pathway extension without direction"
            );
            return Err(PathwayError::NoDirection);
        }

        let next = self.destination.step(direction);
        if !self.bounds.contains(next) {
            warn!(i = next.i(), j = next.j(), "pathway destination out of map");
            return Err(PathwayError::OutOfBounds { pos: next });
        }

        self.destination = next;
        self.directions.push(direction);
        self.tiles.push(next);
        Ok(())
    }

    /// Appends the step leading from the current destination to `tile`.
    ///
    /// The tile must be one of the eight neighbours of the destination.
    pub fn set_next_tile(&mut self, tile: TilePos) -> Result<(), PathwayError> {
        match Direction::between(self.destination, tile) {
            Some(Direction::None) | None => {
                warn!(
                    di = tile.i() - self.destination.i(),
                    dj = tile.j() - self.destination.j(),
                    "pathway tile is not adjacent to destination"
                );
                Err(PathwayError::NotAdjacent {
                    destination: self.destination,
                    tile,
                })
            }
            Some(direction) => self.set_next_direction(direction),
        }
    }

    /// Reports whether the route passes through `tile`.
    ///
    /// The scan starts at the destination end, where callers usually look.
    #[must_use]
    pub fn contains(&self, tile: TilePos) -> bool {
        self.tiles.iter().rev().any(|candidate| *candidate == tile)
    }

    /// Orders routes by length. Equal lengths compare equal.
    #[must_use]
    pub fn cmp_by_length(&self, other: &Pathway) -> Ordering {
        self.len().cmp(&other.len())
    }

    /// Serialises the route; an empty route produces an empty map.
    #[must_use]
    pub fn save(&self) -> VariantMap {
        let mut stream = VariantMap::new();
        if self.is_empty() {
            return stream;
        }

        let directions: Vec<Value> = self
            .directions
            .iter()
            .map(|direction| Value::from(direction.code()))
            .collect();

        let _ = stream.insert(KEY_START.to_owned(), tile_pos_value(self.origin));
        let _ = stream.insert(KEY_STOP.to_owned(), tile_pos_value(self.destination));
        let _ = stream.insert(KEY_DIRECTIONS.to_owned(), Value::from(directions));
        let _ = stream.insert(KEY_REVERSE.to_owned(), Value::from(self.reverse));
        let _ = stream.insert(KEY_STEP.to_owned(), Value::from(self.step()));
        stream
    }

    /// Rebuilds a route saved by [`Pathway::save`].
    ///
    /// Every saved step is replayed from the origin, then both cursors seek to
    /// the saved step offset. An empty map yields `None`.
    pub fn load(bounds: MapBounds, stream: &VariantMap) -> Result<Option<Self>, PersistenceError> {
        if stream.is_empty() {
            return Ok(None);
        }

        let origin = stream.tile_pos(KEY_START)?;
        let mut pathway = Self::new(bounds, origin);
        for value in stream.list(KEY_DIRECTIONS)? {
            let direction = value
                .as_u64()
                .and_then(|code| u8::try_from(code).ok())
                .and_then(Direction::from_code)
                .ok_or_else(|| PersistenceError::UnknownValue {
                    key: KEY_DIRECTIONS.to_owned(),
                    value: value.to_string(),
                })?;
            pathway.set_next_direction(direction)?;
        }

        if let Ok(stop) = stream.tile_pos(KEY_STOP) {
            if stop != pathway.destination {
                warn!(
                    saved = %stop,
                    replayed = %pathway.destination,
                    "saved pathway destination disagrees with its steps"
                );
            }
        }

        let offset = usize::try_from(stream.uint(KEY_STEP)?).unwrap_or(usize::MAX);
        let offset = offset.min(pathway.len());
        pathway.reverse = stream.flag(KEY_REVERSE)?;
        pathway.forward = offset;
        pathway.backward = offset;
        Ok(Some(pathway))
    }
}

impl fmt::Display for Pathway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}:", self.origin, self.destination)?;
        for direction in &self.directions {
            write!(f, " {}", direction.label())?;
        }
        Ok(())
    }
}
