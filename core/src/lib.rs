#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Civitas simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters and systems submit
//! [`Command`] values describing desired mutations. Configuration commands take
//! effect immediately; world mutations are queued and flushed in append order
//! once per tick, after constructions and walkers have stepped. The world then
//! broadcasts [`Event`] values describing what changed so systems can react
//! deterministically on the next pass.

use std::{
    fmt,
    ops::{Add, Sub},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod pathway;
pub mod variant;

pub use pathway::{MapBounds, Pathway, PathwayError};
pub use variant::{PersistenceError, VariantMap, VariantMapExt};

/// Canonical banner emitted when the simulation boots.
pub const WELCOME_BANNER: &str = "Ave, governor. The city awaits your orders.";

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the tilemap with an empty grid of the provided dimensions.
    ConfigureTilemap {
        /// Number of tile columns (the `i` axis).
        columns: u32,
        /// Number of tile rows (the `j` axis).
        rows: u32,
    },
    /// Overrides the natural terrain of a single tile.
    SetTerrain {
        /// Tile receiving the terrain.
        pos: TilePos,
        /// Terrain to apply.
        terrain: Terrain,
    },
    /// Advances the simulation by one tick and flushes pending mutations.
    Tick,
    /// Requests construction of a building or road anchored at `pos`.
    Build {
        /// Master tile of the footprint.
        pos: TilePos,
        /// Kind of construction to erect.
        kind: ConstructionKind,
    },
    /// Requests that the overlay covering `pos` be removed and the land cleared.
    ClearLand {
        /// Tile selected for clearing.
        pos: TilePos,
    },
    /// Replaces the construction covering `pos` with ruins.
    Disaster {
        /// Tile struck by the disaster.
        pos: TilePos,
        /// Type of disaster, which selects the resulting ruins.
        kind: DisasterKind,
    },
    /// Books a signed amount against the city treasury.
    FundIssue {
        /// Ledger category of the transaction.
        kind: FundIssueKind,
        /// Signed amount in denarii; negative values are expenses.
        amount: i64,
    },
    /// Sets a fire or damage parameter of a construction.
    UpdateConstructionState {
        /// Construction being updated.
        construction: ConstructionId,
        /// Parameter to modify.
        param: ConstructionParam,
        /// Amount to add, or the absolute value when `relative` is false.
        value: f32,
        /// Whether `value` is added to the current level.
        relative: bool,
    },
    /// Sets the desirability level and health of a house.
    ConfigureHouse {
        /// House being configured.
        house: ConstructionId,
        /// Housing level; protests target houses above the protestor's level.
        level: u8,
        /// Health of the inhabitants in `[0, 100]`.
        health: u8,
    },
    /// Sends a prefect out of a prefecture.
    SendPrefect {
        /// Prefecture that owns the prefect.
        prefecture: ConstructionId,
        /// Water carried by the prefect; zero dispatches a patrol.
        water: u32,
    },
    /// Sends a protestor out of a house.
    SpawnProtestor {
        /// House the protestor originates from.
        house: ConstructionId,
    },
    /// Sends a market kid back to its market along a market lady's route.
    SpawnMarketKid {
        /// Market that receives the basket.
        market: ConstructionId,
        /// Route walked by the market lady, from the market outward.
        pathway: Pathway,
        /// Quantity of goods carried home.
        basket: u32,
        /// Ticks to wait before starting to walk.
        delay: u32,
    },
    /// Launches a ship along open water.
    SpawnShip {
        /// Water tile the ship starts on.
        from: TilePos,
        /// Water tile the ship sails to.
        to: TilePos,
    },
}

impl Command {
    /// Reports whether the command is queued until the next tick flush.
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        !matches!(
            self,
            Self::ConfigureTilemap { .. } | Self::SetTerrain { .. } | Self::Tick
        )
    }
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Index of the tick that just completed.
        tick: u64,
    },
    /// Confirms that a construction was erected.
    ConstructionBuilt {
        /// Identifier allocated to the construction.
        construction: ConstructionId,
        /// Kind of construction built.
        kind: ConstructionKind,
        /// Master tile of the footprint.
        origin: TilePos,
    },
    /// Reports that a build request was rejected.
    BuildRejected {
        /// Kind of construction requested.
        kind: ConstructionKind,
        /// Requested master tile.
        pos: TilePos,
        /// Specific reason the build failed.
        reason: BuildError,
    },
    /// Confirms that a construction left the map.
    ConstructionRemoved {
        /// Identifier of the removed construction.
        construction: ConstructionId,
        /// Kind of the removed construction.
        kind: ConstructionKind,
    },
    /// Announces that a disaster replaced a construction with ruins.
    DisasterStruck {
        /// Tile struck by the disaster.
        pos: TilePos,
        /// Type of disaster.
        kind: DisasterKind,
    },
    /// Reports a treasury movement.
    FundsChanged {
        /// Ledger category of the transaction.
        kind: FundIssueKind,
        /// Signed amount booked.
        amount: i64,
        /// Treasury balance after booking.
        balance: i64,
    },
    /// Advisory message for the player.
    WarningMessage {
        /// Construction the warning concerns.
        construction: ConstructionId,
        /// Warning raised.
        warning: Warning,
    },
    /// Confirms that a walker joined the city.
    WalkerSpawned {
        /// Identifier allocated to the walker.
        walker: WalkerId,
        /// Kind of walker spawned.
        kind: WalkerKind,
        /// Tile the walker starts on.
        pos: TilePos,
    },
    /// Confirms that a walker left the city's walker list.
    WalkerRemoved {
        /// Identifier of the removed walker.
        walker: WalkerId,
        /// Kind of the removed walker.
        kind: WalkerKind,
    },
    /// Reports that a walker died in place.
    WalkerDied {
        /// Identifier of the walker that died.
        walker: WalkerId,
        /// Kind of the walker that died.
        kind: WalkerKind,
        /// Tile the walker died on.
        pos: TilePos,
    },
    /// A patrolling prefect spotted burning ruins and reported them home.
    FireDetected {
        /// Prefecture that received the report.
        prefecture: ConstructionId,
        /// Location of the fire.
        pos: TilePos,
    },
}

/// Integer grid coordinate of a tile.
///
/// `i` grows eastward and `j` grows northward. Ordering is lexicographic on
/// `(i, j)`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TilePos {
    i: i32,
    j: i32,
}

impl TilePos {
    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }

    /// Column component.
    #[must_use]
    pub const fn i(&self) -> i32 {
        self.i
    }

    /// Row component.
    #[must_use]
    pub const fn j(&self) -> i32 {
        self.j
    }

    /// Returns the neighbouring tile reached by moving one step in `direction`.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (di, dj) = direction.offset();
        Self::new(self.i + di, self.j + dj)
    }

    /// Euclidean distance between two tiles.
    #[must_use]
    pub fn distance_from(self, other: TilePos) -> f32 {
        let di = (self.i - other.i) as f32;
        let dj = (self.j - other.j) as f32;
        (di * di + dj * dj).sqrt()
    }

    /// Number of king moves separating two tiles.
    #[must_use]
    pub const fn chebyshev_distance(self, other: TilePos) -> u32 {
        let di = self.i.abs_diff(other.i);
        let dj = self.j.abs_diff(other.j);
        if di > dj {
            di
        } else {
            dj
        }
    }
}

impl Add for TilePos {
    type Output = TilePos;

    fn add(self, rhs: TilePos) -> TilePos {
        TilePos::new(self.i + rhs.i, self.j + rhs.j)
    }
}

impl Sub for TilePos {
    type Output = TilePos;

    fn sub(self, rhs: TilePos) -> TilePos {
        TilePos::new(self.i - rhs.i, self.j - rhs.j)
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.i, self.j)
    }
}

/// Footprint of a construction measured in whole tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    width: u32,
    height: u32,
}

impl Size {
    /// Creates a new size descriptor with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Creates a square footprint.
    #[must_use]
    pub const fn square(side: u32) -> Self {
        Self::new(side, side)
    }

    /// Extent along the `i` axis.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Extent along the `j` axis.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of tiles covered.
    #[must_use]
    pub const fn area(&self) -> u32 {
        self.width * self.height
    }
}

/// Compass direction of a single grid step.
///
/// The numeric codes match the savegame schema: `None` is zero and the eight
/// compass points follow clockwise from north, so the opposite of a direction
/// sits four codes away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// No movement; marks the end of a route.
    None,
    /// Toward increasing `j`.
    North,
    /// Toward increasing `i` and `j`.
    NorthEast,
    /// Toward increasing `i`.
    East,
    /// Toward increasing `i` and decreasing `j`.
    SouthEast,
    /// Toward decreasing `j`.
    South,
    /// Toward decreasing `i` and `j`.
    SouthWest,
    /// Toward decreasing `i`.
    West,
    /// Toward decreasing `i` and increasing `j`.
    NorthWest,
}

impl Direction {
    /// The eight compass directions in code order.
    pub const COMPASS: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// The four rook directions.
    pub const CARDINAL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit `(di, dj)` offset travelled by one step.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::None => (0, 0),
            Self::North => (0, 1),
            Self::NorthEast => (1, 1),
            Self::East => (1, 0),
            Self::SouthEast => (1, -1),
            Self::South => (0, -1),
            Self::SouthWest => (-1, -1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, 1),
        }
    }

    /// Direction pointing the other way; `None` stays `None`.
    #[must_use]
    pub const fn opposite(self) -> Self {
        if matches!(self, Self::None) {
            return Self::None;
        }
        let code = self.code();
        let mirrored = if code + 4 < 9 { code + 4 } else { code - 4 };
        match Self::from_code(mirrored) {
            Some(opposite) => opposite,
            None => Self::None,
        }
    }

    /// Numeric code persisted in savegames.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::North => 1,
            Self::NorthEast => 2,
            Self::East => 3,
            Self::SouthEast => 4,
            Self::South => 5,
            Self::SouthWest => 6,
            Self::West => 7,
            Self::NorthWest => 8,
        }
    }

    /// Decodes a persisted direction code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::North),
            2 => Some(Self::NorthEast),
            3 => Some(Self::East),
            4 => Some(Self::SouthEast),
            5 => Some(Self::South),
            6 => Some(Self::SouthWest),
            7 => Some(Self::West),
            8 => Some(Self::NorthWest),
            _ => None,
        }
    }

    /// Direction of the step from `from` to `to`.
    ///
    /// Identical tiles map to [`Direction::None`]; tiles that are not
    /// neighbours yield `None`.
    #[must_use]
    pub fn between(from: TilePos, to: TilePos) -> Option<Self> {
        let delta = to - from;
        if delta == TilePos::default() {
            return Some(Self::None);
        }
        Self::COMPASS
            .into_iter()
            .find(|direction| direction.offset() == (delta.i(), delta.j()))
    }

    /// Short compass label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "-",
            Self::North => "N",
            Self::NorthEast => "NE",
            Self::East => "E",
            Self::SouthEast => "SE",
            Self::South => "S",
            Self::SouthWest => "SW",
            Self::West => "W",
            Self::NorthWest => "NW",
        }
    }
}

/// Unique identifier assigned to a construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstructionId(u32);

impl ConstructionId {
    /// Creates a new construction identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a walker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WalkerId(u32);

impl WalkerId {
    /// Creates a new walker identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Natural terrain a tile can be configured with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    /// Open buildable land.
    Grass,
    /// Fertile buildable land.
    Meadow,
    /// Open water, navigable by ships only.
    Water,
    /// Impassable rock.
    Rock,
    /// Forest; blocks construction until cleared.
    Tree,
}

/// Types of overlays that can occupy tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstructionKind {
    /// Paved road segment.
    Road,
    /// Dwelling whose level drives protests.
    House,
    /// Base of prefects.
    Prefecture,
    /// Food distribution point fed by market kids.
    Market,
    /// Food storage.
    Granary,
    /// Small temple.
    Temple,
    /// Trading dock on the shore.
    Dock,
    /// Ship builder on the shore.
    Shipyard,
    /// Decorative statue.
    SmallStatue,
    /// Decorative garden.
    Garden,
    /// Ruins still on fire.
    BurningRuins,
    /// Rubble left by a collapse or an extinguished fire.
    CollapsedRuins,
    /// Quarantined ruins left by a plague.
    PlagueRuins,
}

impl ConstructionKind {
    /// Every construction kind in declaration order.
    pub const ALL: [ConstructionKind; 13] = [
        Self::Road,
        Self::House,
        Self::Prefecture,
        Self::Market,
        Self::Granary,
        Self::Temple,
        Self::Dock,
        Self::Shipyard,
        Self::SmallStatue,
        Self::Garden,
        Self::BurningRuins,
        Self::CollapsedRuins,
        Self::PlagueRuins,
    ];

    /// Functional group the kind belongs to.
    #[must_use]
    pub const fn group(self) -> ConstructionGroup {
        match self {
            Self::Road => ConstructionGroup::Road,
            Self::House => ConstructionGroup::Housing,
            Self::Prefecture => ConstructionGroup::Security,
            Self::Market | Self::Granary | Self::Dock => ConstructionGroup::Commerce,
            Self::Temple => ConstructionGroup::Religion,
            Self::Shipyard => ConstructionGroup::Industry,
            Self::SmallStatue | Self::Garden => ConstructionGroup::Decoration,
            Self::BurningRuins | Self::CollapsedRuins | Self::PlagueRuins => {
                ConstructionGroup::Disaster
            }
        }
    }

    /// Footprint occupied on the map.
    #[must_use]
    pub const fn size(self) -> Size {
        match self {
            Self::Market | Self::Granary | Self::Dock | Self::Shipyard => Size::square(2),
            _ => Size::square(1),
        }
    }

    /// Construction cost in denarii.
    #[must_use]
    pub const fn cost(self) -> i64 {
        match self {
            Self::Road | Self::Garden => 4,
            Self::House => 10,
            Self::Prefecture => 30,
            Self::Market => 40,
            Self::Granary => 100,
            Self::Temple => 50,
            Self::Dock => 100,
            Self::Shipyard => 100,
            Self::SmallStatue => 12,
            Self::BurningRuins | Self::CollapsedRuins | Self::PlagueRuins => 0,
        }
    }

    /// Radius of the road-access scan around the footprint.
    #[must_use]
    pub const fn road_access_distance(self) -> u32 {
        match self {
            Self::House => 2,
            _ => 1,
        }
    }

    /// Whether the construction warns when built without an adjacent road.
    #[must_use]
    pub const fn needs_road_access(self) -> bool {
        !matches!(
            self,
            Self::Road
                | Self::SmallStatue
                | Self::Garden
                | Self::BurningRuins
                | Self::CollapsedRuins
                | Self::PlagueRuins
        )
    }

    /// Persisted name of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Road => "road",
            Self::House => "house",
            Self::Prefecture => "prefecture",
            Self::Market => "market",
            Self::Granary => "granary",
            Self::Temple => "smallTemple",
            Self::Dock => "dock",
            Self::Shipyard => "shipyard",
            Self::SmallStatue => "smallStatue",
            Self::Garden => "garden",
            Self::BurningRuins => "burningRuins",
            Self::CollapsedRuins => "collapsedRuins",
            Self::PlagueRuins => "plagueRuins",
        }
    }

    /// Decodes a persisted kind name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Fire risk accumulated every tick.
    #[must_use]
    pub const fn fire_increment(self) -> f32 {
        match self {
            Self::House => 0.05,
            Self::Prefecture | Self::Market | Self::Temple => 0.02,
            Self::Granary | Self::Dock | Self::Shipyard => 0.04,
            _ => 0.0,
        }
    }

    /// Structural damage accumulated every tick.
    #[must_use]
    pub const fn damage_increment(self) -> f32 {
        match self {
            Self::House | Self::Granary | Self::Dock | Self::Shipyard => 0.02,
            Self::Prefecture | Self::Market | Self::Temple => 0.01,
            _ => 0.0,
        }
    }
}

/// Functional grouping of construction kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstructionGroup {
    /// Road network.
    Road,
    /// Dwellings.
    Housing,
    /// Prefectures and other law enforcement.
    Security,
    /// Food and trade distribution.
    Commerce,
    /// Temples.
    Religion,
    /// Production buildings.
    Industry,
    /// Statues and gardens.
    Decoration,
    /// Ruins left by disasters.
    Disaster,
}

/// Continuous state parameters tracked for every construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstructionParam {
    /// Fire risk; reaching 100 sets the construction ablaze.
    Fire,
    /// Structural damage; reaching 100 collapses the construction.
    Damage,
}

/// Services a walker can deliver to buildings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceKind {
    /// Fire prevention and firefighting.
    Prefect,
    /// Structural maintenance.
    Engineer,
}

impl ServiceKind {
    /// Persisted name of the service.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Prefect => "prefect",
            Self::Engineer => "engineer",
        }
    }

    /// Decodes a persisted service name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "prefect" => Some(Self::Prefect),
            "engineer" => Some(Self::Engineer),
            _ => None,
        }
    }
}

/// Trainees delivered by training buildings to entertainment venues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TraineeKind {
    /// Trained at an actor colony.
    Actor,
    /// Trained at a gladiator school.
    Gladiator,
    /// Trained at a lion house.
    LionTamer,
    /// Trained at a chariot workshop.
    Charioteer,
}

impl TraineeKind {
    /// Persisted name of the trainee kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Actor => "actor",
            Self::Gladiator => "gladiator",
            Self::LionTamer => "lionTamer",
            Self::Charioteer => "charioteer",
        }
    }

    /// Decodes a persisted trainee name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "actor" => Some(Self::Actor),
            "gladiator" => Some(Self::Gladiator),
            "lionTamer" => Some(Self::LionTamer),
            "charioteer" => Some(Self::Charioteer),
            _ => None,
        }
    }
}

/// Kinds of walkers roaming the city.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WalkerKind {
    /// Patrolling fire and crime fighter.
    Prefect,
    /// Rioter damaging richer neighbourhoods.
    Protestor,
    /// Helper carrying food back to a market.
    MarketKid,
    /// Vessel sailing on open water.
    Ship,
    /// Remains left behind by a dead walker.
    Corpse,
}

impl WalkerKind {
    /// Persisted name of the walker kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Prefect => "prefect",
            Self::Protestor => "protestor",
            Self::MarketKid => "marketKid",
            Self::Ship => "ship",
            Self::Corpse => "corpse",
        }
    }

    /// Decodes a persisted walker kind name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::Prefect,
            Self::Protestor,
            Self::MarketKid,
            Self::Ship,
            Self::Corpse,
        ]
        .into_iter()
        .find(|kind| kind.name() == name)
    }
}

/// Disasters that replace constructions with ruins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisasterKind {
    /// The construction burnt.
    Fire,
    /// The construction collapsed.
    Collapse,
    /// The inhabitants caught the plague.
    Plague,
}

impl DisasterKind {
    /// Ruins left behind on every tile of the footprint.
    #[must_use]
    pub const fn ruins(self) -> ConstructionKind {
        match self {
            Self::Fire => ConstructionKind::BurningRuins,
            Self::Collapse => ConstructionKind::CollapsedRuins,
            Self::Plague => ConstructionKind::PlagueRuins,
        }
    }
}

/// Treasury ledger categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FundIssueKind {
    /// Construction expenses.
    Construction,
    /// Tax income.
    Taxes,
    /// Import and export settlements.
    Trade,
    /// Anything else, such as donations.
    Other,
}

impl FundIssueKind {
    /// Persisted name of the ledger category.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Construction => "construction",
            Self::Taxes => "taxes",
            Self::Trade => "trade",
            Self::Other => "other",
        }
    }

    /// Decodes a persisted ledger category name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Construction, Self::Taxes, Self::Trade, Self::Other]
            .into_iter()
            .find(|kind| kind.name() == name)
    }
}

/// Terrain restrictions applied when searching for a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainPolicy {
    /// Only road tiles may be traversed.
    RoadOnly,
    /// Roads and open land without buildings may be traversed.
    AllTerrain,
    /// Only water tiles may be traversed.
    WaterOnly,
}

/// Advisory messages raised for the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Warning {
    /// The construction was built without any adjacent road.
    NeedRoadAccess,
}

/// Reasons a build request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum BuildError {
    /// The requested footprint extends beyond the map.
    #[error("footprint extends beyond the map")]
    OutOfBounds,
    /// A tile of the footprint cannot hold a construction.
    #[error("footprint covers a tile that cannot be built on")]
    NotConstructible,
}

/// Immutable representation of a single walker used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WalkerSnapshot {
    /// Unique identifier assigned to the walker.
    pub id: WalkerId,
    /// Kind of walker.
    pub kind: WalkerKind,
    /// Tile currently occupied.
    pub pos: TilePos,
    /// Remaining health.
    pub health: i32,
    /// Current movement speed.
    pub speed: f32,
    /// Building the walker was sent from, if any.
    pub base: Option<ConstructionId>,
}

/// Read-only snapshot describing all walkers in the city.
#[derive(Clone, Debug, Default)]
pub struct WalkerView {
    snapshots: Vec<WalkerSnapshot>,
}

impl WalkerView {
    /// Creates a new walker view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<WalkerSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured walker snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &WalkerSnapshot> {
        self.snapshots.iter()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<WalkerSnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a prefecture used by dispatch systems.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefectureSnapshot {
    /// Identifier of the prefecture.
    pub id: ConstructionId,
    /// Tile prefects leave from.
    pub enter_pos: TilePos,
    /// Number of patrolling prefects currently out.
    pub patrols_out: usize,
    /// Number of water-carrying prefects currently out.
    pub water_carriers_out: usize,
    /// Fire reported by a patrol and not yet handed to a water carrier.
    pub pending_fire: Option<TilePos>,
}

/// Read-only snapshot describing all prefectures in the city.
#[derive(Clone, Debug, Default)]
pub struct PrefectureView {
    snapshots: Vec<PrefectureSnapshot>,
}

impl PrefectureView {
    /// Creates a new prefecture view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<PrefectureSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured prefecture snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &PrefectureSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of a single prefecture.
    #[must_use]
    pub fn get(&self, id: ConstructionId) -> Option<&PrefectureSnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_directions_sit_four_codes_apart() {
        for direction in Direction::COMPASS {
            let opposite = direction.opposite();
            assert_eq!(direction.code().abs_diff(opposite.code()), 4);
            assert_eq!(opposite.opposite(), direction);
            let (di, dj) = direction.offset();
            assert_eq!(opposite.offset(), (-di, -dj));
        }
        assert_eq!(Direction::None.opposite(), Direction::None);
    }

    #[test]
    fn direction_between_neighbours() {
        let origin = TilePos::new(3, 3);
        assert_eq!(
            Direction::between(origin, TilePos::new(3, 4)),
            Some(Direction::North)
        );
        assert_eq!(
            Direction::between(origin, TilePos::new(2, 2)),
            Some(Direction::SouthWest)
        );
        assert_eq!(Direction::between(origin, origin), Some(Direction::None));
        assert_eq!(Direction::between(origin, TilePos::new(5, 3)), None);
    }

    #[test]
    fn direction_codes_round_trip() {
        for code in 0..9 {
            let direction = Direction::from_code(code).expect("valid code");
            assert_eq!(direction.code(), code);
        }
        assert_eq!(Direction::from_code(9), None);
    }

    #[test]
    fn tile_distances_match_expectation() {
        let origin = TilePos::new(1, 1);
        let other = TilePos::new(4, 5);
        assert!((origin.distance_from(other) - 5.0).abs() < f32::EPSILON);
        assert_eq!(origin.chebyshev_distance(other), 4);
    }

    #[test]
    fn configuration_commands_apply_immediately() {
        assert!(!Command::Tick.is_deferred());
        assert!(!Command::ConfigureTilemap {
            columns: 4,
            rows: 4
        }
        .is_deferred());
        assert!(Command::ClearLand {
            pos: TilePos::new(0, 0)
        }
        .is_deferred());
    }

    #[test]
    fn houses_scan_wider_for_roads() {
        assert_eq!(ConstructionKind::House.road_access_distance(), 2);
        assert_eq!(ConstructionKind::Prefecture.road_access_distance(), 1);
        assert!(!ConstructionKind::Road.needs_road_access());
        assert_eq!(
            DisasterKind::Fire.ruins().group(),
            ConstructionGroup::Disaster
        );
    }
}
