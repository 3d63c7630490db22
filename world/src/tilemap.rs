//! Tile grid holding terrain flags and overlay handles.

use std::ops::BitOr;

use civitas_core::{ConstructionId, MapBounds, Size, Terrain, TerrainPolicy, TilePos};

/// Bit set describing what a tile carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TileFlags(u16);

impl TileFlags {
    /// Paved road.
    pub const ROAD: Self = Self(1 << 0);
    /// Open water.
    pub const WATER: Self = Self(1 << 1);
    /// Impassable rock.
    pub const ROCK: Self = Self(1 << 2);
    /// Forest.
    pub const TREE: Self = Self(1 << 3);
    /// Covered by a building footprint.
    pub const BUILDING: Self = Self(1 << 4);
    /// Covered by a garden.
    pub const GARDEN: Self = Self(1 << 5);
    /// Fertile land.
    pub const MEADOW: Self = Self(1 << 6);

    /// Flags removed when land is cleared.
    pub const CLEARABLE: Self = Self(Self::ROAD.0 | Self::TREE.0 | Self::BUILDING.0 | Self::GARDEN.0);

    /// Empty flag set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bit representation, as persisted.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Rebuilds flags from persisted bits, dropping unknown bits.
    #[must_use]
    pub const fn from_bits_truncate(bits: u16) -> Self {
        Self(bits & 0x7f)
    }

    /// Reports whether every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Reports whether any flag in `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Sets every flag in `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clears every flag in `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for TileFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Single cell of the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tile {
    pos: TilePos,
    flags: TileFlags,
    overlay: Option<ConstructionId>,
    master: Option<TilePos>,
}

impl Tile {
    fn new(pos: TilePos) -> Self {
        Self {
            pos,
            flags: TileFlags::empty(),
            overlay: None,
            master: None,
        }
    }

    /// Grid coordinate of the tile.
    #[must_use]
    pub const fn pos(&self) -> TilePos {
        self.pos
    }

    /// Terrain and occupation flags.
    #[must_use]
    pub const fn flags(&self) -> TileFlags {
        self.flags
    }

    /// Construction covering the tile, if any.
    #[must_use]
    pub const fn overlay(&self) -> Option<ConstructionId> {
        self.overlay
    }

    /// Master tile of the covering construction, if any.
    #[must_use]
    pub const fn master(&self) -> Option<TilePos> {
        self.master
    }

    /// Whether the tile carries a road.
    #[must_use]
    pub const fn is_road(&self) -> bool {
        self.flags.contains(TileFlags::ROAD)
    }

    pub(crate) fn flags_mut(&mut self) -> &mut TileFlags {
        &mut self.flags
    }

    pub(crate) fn attach(&mut self, overlay: ConstructionId, master: TilePos) {
        self.overlay = Some(overlay);
        self.master = Some(master);
    }

    pub(crate) fn detach(&mut self) {
        self.overlay = None;
        self.master = None;
    }
}

/// Dense rectangular grid of tiles.
#[derive(Clone, Debug)]
pub struct Tilemap {
    columns: u32,
    rows: u32,
    tiles: Vec<Tile>,
}

impl Tilemap {
    /// Creates an empty grass map.
    #[must_use]
    pub fn new(columns: u32, rows: u32) -> Self {
        let mut tiles = Vec::with_capacity(columns as usize * rows as usize);
        for j in 0..rows {
            for i in 0..columns {
                tiles.push(Tile::new(TilePos::new(i as i32, j as i32)));
            }
        }
        Self {
            columns,
            rows,
            tiles,
        }
    }

    /// Number of columns.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Extent routes are validated against.
    #[must_use]
    pub const fn bounds(&self) -> MapBounds {
        MapBounds::new(self.columns, self.rows)
    }

    /// Reports whether the tile lies on the map.
    #[must_use]
    pub const fn is_inside(&self, pos: TilePos) -> bool {
        self.bounds().contains(pos)
    }

    fn index(&self, pos: TilePos) -> Option<usize> {
        if !self.is_inside(pos) {
            return None;
        }
        Some(pos.j() as usize * self.columns as usize + pos.i() as usize)
    }

    /// Returns the tile at `pos`.
    #[must_use]
    pub fn tile(&self, pos: TilePos) -> Option<&Tile> {
        self.index(pos).map(|index| &self.tiles[index])
    }

    pub(crate) fn tile_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        let index = self.index(pos)?;
        Some(&mut self.tiles[index])
    }

    /// Iterates over every tile row by row.
    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// Tiles of a footprint anchored at `pos`, or `None` if it leaves the map.
    #[must_use]
    pub fn area(&self, pos: TilePos, size: Size) -> Option<Vec<TilePos>> {
        let mut tiles = Vec::with_capacity(size.area() as usize);
        for dj in 0..size.height() as i32 {
            for di in 0..size.width() as i32 {
                let tile = pos + TilePos::new(di, dj);
                if !self.is_inside(tile) {
                    return None;
                }
                tiles.push(tile);
            }
        }
        Some(tiles)
    }

    /// Tiles within `radius` king moves of `center`, clipped to the map.
    #[must_use]
    pub fn square(&self, center: TilePos, radius: u32) -> Vec<TilePos> {
        let radius = radius as i32;
        let mut tiles = Vec::new();
        for dj in -radius..=radius {
            for di in -radius..=radius {
                let tile = center + TilePos::new(di, dj);
                if self.is_inside(tile) {
                    tiles.push(tile);
                }
            }
        }
        tiles
    }

    /// Whether a construction may be placed on the tile.
    #[must_use]
    pub fn is_constructible(&self, pos: TilePos) -> bool {
        self.tile(pos).is_some_and(|tile| {
            tile.overlay.is_none()
                && !tile.flags.intersects(
                    TileFlags::WATER | TileFlags::ROCK | TileFlags::TREE | TileFlags::ROAD,
                )
        })
    }

    /// Whether whatever stands on the tile may be cleared or destroyed.
    #[must_use]
    pub fn is_destructible(&self, pos: TilePos) -> bool {
        self.tile(pos)
            .is_some_and(|tile| !tile.flags.intersects(TileFlags::WATER | TileFlags::ROCK))
    }

    /// Whether a walker restricted by `policy` may cross the tile.
    #[must_use]
    pub fn is_walkable(&self, pos: TilePos, policy: TerrainPolicy) -> bool {
        let Some(tile) = self.tile(pos) else {
            return false;
        };
        match policy {
            TerrainPolicy::RoadOnly => tile.is_road(),
            TerrainPolicy::AllTerrain => {
                tile.is_road()
                    || (tile.overlay.is_none()
                        && !tile
                            .flags
                            .intersects(TileFlags::WATER | TileFlags::ROCK | TileFlags::TREE))
            }
            TerrainPolicy::WaterOnly => tile.flags.contains(TileFlags::WATER),
        }
    }

    /// Replaces the natural terrain of an unoccupied tile.
    ///
    /// Returns `false` when the tile is off the map or covered by a construction.
    pub(crate) fn set_terrain(&mut self, pos: TilePos, terrain: Terrain) -> bool {
        let Some(tile) = self.tile_mut(pos) else {
            return false;
        };
        if tile.overlay.is_some() {
            return false;
        }
        tile.flags
            .remove(TileFlags::WATER | TileFlags::ROCK | TileFlags::TREE | TileFlags::MEADOW);
        match terrain {
            Terrain::Grass => {}
            Terrain::Meadow => tile.flags.insert(TileFlags::MEADOW),
            Terrain::Water => tile.flags.insert(TileFlags::WATER),
            Terrain::Rock => tile.flags.insert(TileFlags::ROCK),
            Terrain::Tree => tile.flags.insert(TileFlags::TREE),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_leaving_map_is_rejected() {
        let tilemap = Tilemap::new(4, 4);

        assert_eq!(
            tilemap.area(TilePos::new(2, 2), Size::square(2)).map(|a| a.len()),
            Some(4)
        );
        assert!(tilemap.area(TilePos::new(3, 3), Size::square(2)).is_none());
    }

    #[test]
    fn terrain_drives_construction_and_walking() {
        let mut tilemap = Tilemap::new(4, 4);
        assert!(tilemap.set_terrain(TilePos::new(0, 0), Terrain::Water));
        assert!(tilemap.set_terrain(TilePos::new(1, 0), Terrain::Tree));
        assert!(tilemap.set_terrain(TilePos::new(2, 0), Terrain::Meadow));

        assert!(!tilemap.is_constructible(TilePos::new(0, 0)));
        assert!(!tilemap.is_destructible(TilePos::new(0, 0)));
        assert!(tilemap.is_walkable(TilePos::new(0, 0), TerrainPolicy::WaterOnly));
        assert!(!tilemap.is_constructible(TilePos::new(1, 0)));
        assert!(tilemap.is_destructible(TilePos::new(1, 0)));
        assert!(!tilemap.is_walkable(TilePos::new(1, 0), TerrainPolicy::AllTerrain));
        assert!(tilemap.is_constructible(TilePos::new(2, 0)));
        assert!(!tilemap.is_walkable(TilePos::new(2, 0), TerrainPolicy::RoadOnly));
        assert!(!tilemap.is_constructible(TilePos::new(4, 0)));
    }

    #[test]
    fn square_is_clipped_to_map() {
        let tilemap = Tilemap::new(5, 5);

        assert_eq!(tilemap.square(TilePos::new(0, 0), 1).len(), 4);
        assert_eq!(tilemap.square(TilePos::new(2, 2), 2).len(), 25);
    }

    #[test]
    fn flags_round_trip_through_bits() {
        let flags = TileFlags::ROAD | TileFlags::MEADOW;

        assert_eq!(TileFlags::from_bits_truncate(flags.bits()), flags);
        assert!(flags.contains(TileFlags::ROAD));
        assert!(!flags.intersects(TileFlags::WATER | TileFlags::ROCK));
    }
}
