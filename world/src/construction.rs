//! Buildings, roads and ruins occupying the map.

use std::collections::{BTreeMap, BTreeSet};

use civitas_core::{
    Command, ConstructionGroup, ConstructionId, ConstructionKind, ConstructionParam, DisasterKind,
    ServiceKind, Size, TilePos, TraineeKind,
};
use tracing::{debug, info};

use crate::{dispatcher::Dispatcher, tilemap::Tilemap};

const MAX_STATE: f32 = 100.0;
const BURNING_RUINS_FIRE: f32 = 99.0;
const BURNING_RUINS_DECAY: f32 = 0.25;
const TRAINEE_DELIVERY: i32 = 100;
const MAX_TRAINEE_LEVEL: i32 = 200;
const TRAINEE_NEED: i32 = 100;

/// Default level of a freshly built house.
pub(crate) const DEFAULT_HOUSE_LEVEL: u8 = 1;
/// Default health of a freshly built house.
pub(crate) const DEFAULT_HOUSE_HEALTH: u8 = 100;

/// Overlay occupying one or more tiles.
///
/// Fire and damage accumulate every tick. Reaching the maximum on either
/// marks the construction deleted and dispatches a disaster; the map itself is
/// only touched when the dispatcher is flushed.
#[derive(Clone, Debug, PartialEq)]
pub struct Construction {
    id: ConstructionId,
    kind: ConstructionKind,
    origin: TilePos,
    fire: f32,
    damage: f32,
    access_roads: Vec<TilePos>,
    reserved_services: BTreeSet<ServiceKind>,
    trainees: BTreeMap<TraineeKind, i32>,
    reserved_trainees: BTreeSet<TraineeKind>,
    level: u8,
    health: u8,
    stock: u32,
    fire_report: Option<TilePos>,
    deleted: bool,
}

impl Construction {
    pub(crate) fn new(id: ConstructionId, kind: ConstructionKind, origin: TilePos) -> Self {
        let fire = if kind == ConstructionKind::BurningRuins {
            BURNING_RUINS_FIRE
        } else {
            0.0
        };
        Self {
            id,
            kind,
            origin,
            fire,
            damage: 0.0,
            access_roads: Vec::new(),
            reserved_services: BTreeSet::new(),
            trainees: BTreeMap::new(),
            reserved_trainees: BTreeSet::new(),
            level: DEFAULT_HOUSE_LEVEL,
            health: DEFAULT_HOUSE_HEALTH,
            stock: 0,
            fire_report: None,
            deleted: false,
        }
    }

    /// Identifier of the construction.
    #[must_use]
    pub const fn id(&self) -> ConstructionId {
        self.id
    }

    /// Kind of the construction.
    #[must_use]
    pub const fn kind(&self) -> ConstructionKind {
        self.kind
    }

    /// Functional group of the construction.
    #[must_use]
    pub const fn group(&self) -> ConstructionGroup {
        self.kind.group()
    }

    /// Master tile of the footprint.
    #[must_use]
    pub const fn origin(&self) -> TilePos {
        self.origin
    }

    /// Footprint dimensions.
    #[must_use]
    pub const fn size(&self) -> Size {
        self.kind.size()
    }

    /// Reports whether `pos` lies within the footprint.
    #[must_use]
    pub fn covers(&self, pos: TilePos) -> bool {
        let offset = pos - self.origin;
        offset.i() >= 0
            && offset.j() >= 0
            && (offset.i() as u32) < self.size().width()
            && (offset.j() as u32) < self.size().height()
    }

    /// Road tiles found around the footprint when the construction was built.
    #[must_use]
    pub fn access_roads(&self) -> &[TilePos] {
        &self.access_roads
    }

    /// Tile walkers leave from and head to.
    ///
    /// Kinds that need road access enter through their first access road;
    /// everything else is entered on its master tile.
    #[must_use]
    pub fn enter_pos(&self) -> TilePos {
        if self.kind.needs_road_access() {
            if let Some(road) = self.access_roads.first() {
                return *road;
            }
        }
        self.origin
    }

    /// Current level of a state parameter in `[0, 100]`.
    #[must_use]
    pub const fn state(&self, param: ConstructionParam) -> f32 {
        match param {
            ConstructionParam::Fire => self.fire,
            ConstructionParam::Damage => self.damage,
        }
    }

    /// Whether the construction is scheduled for removal.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Housing level; meaningful for houses only.
    #[must_use]
    pub const fn level(&self) -> u8 {
        self.level
    }

    /// Health of the inhabitants; meaningful for houses only.
    #[must_use]
    pub const fn health(&self) -> u8 {
        self.health
    }

    /// Goods delivered to a market.
    #[must_use]
    pub const fn stock(&self) -> u32 {
        self.stock
    }

    /// Fire reported to a prefecture and not yet answered.
    #[must_use]
    pub const fn pending_fire(&self) -> Option<TilePos> {
        self.fire_report
    }

    /// Whether a walker already reserved a visit for `service`.
    #[must_use]
    pub fn is_service_reserved(&self, service: ServiceKind) -> bool {
        self.reserved_services.contains(&service)
    }

    /// Services currently reserved.
    pub fn reserved_services(&self) -> impl Iterator<Item = ServiceKind> + '_ {
        self.reserved_services.iter().copied()
    }

    /// How much the construction needs `service`; zero when already reserved.
    ///
    /// Burning ruins always report their fire so firefighters can measure
    /// progress.
    #[must_use]
    pub fn evaluate_service(&self, service: ServiceKind) -> f32 {
        if self.kind == ConstructionKind::BurningRuins && service == ServiceKind::Prefect {
            return self.fire;
        }
        if self.is_service_reserved(service) {
            return 0.0;
        }
        match service {
            ServiceKind::Prefect => self.fire,
            ServiceKind::Engineer => self.damage,
        }
    }

    /// Trainees of `kind` currently housed.
    #[must_use]
    pub fn trainee_level(&self, kind: TraineeKind) -> i32 {
        self.trainees.get(&kind).copied().unwrap_or(0)
    }

    /// Trainee kinds with a visit on its way.
    pub fn reserved_trainees(&self) -> impl Iterator<Item = TraineeKind> + '_ {
        self.reserved_trainees.iter().copied()
    }

    /// Demand for trainees of `kind`; zero while one is already on its way.
    #[must_use]
    pub fn evaluate_trainee(&self, kind: TraineeKind) -> i32 {
        if self.reserved_trainees.contains(&kind) {
            return 0;
        }
        (TRAINEE_NEED - self.trainee_level(kind)).max(0)
    }

    /// Marks a trainee of `kind` as on its way.
    pub fn reserve_trainee(&mut self, kind: TraineeKind) {
        let _ = self.reserved_trainees.insert(kind);
    }

    /// Drops the reservation of a trainee of `kind`.
    pub fn cancel_trainee(&mut self, kind: TraineeKind) {
        let _ = self.reserved_trainees.remove(&kind);
    }

    /// Receives a trainee of `kind`.
    pub fn apply_trainee(&mut self, kind: TraineeKind) {
        self.cancel_trainee(kind);
        let level = self.trainees.entry(kind).or_insert(0);
        *level = (*level + TRAINEE_DELIVERY).min(MAX_TRAINEE_LEVEL);
    }

    pub(crate) fn compute_access_roads(&mut self, tilemap: &Tilemap) {
        self.access_roads.clear();
        let radius = self.kind.road_access_distance() as i32;
        let size = self.size();
        let (width, height) = (size.width() as i32, size.height() as i32);
        for j in (self.origin.j() - radius)..(self.origin.j() + height + radius) {
            for i in (self.origin.i() - radius)..(self.origin.i() + width + radius) {
                let pos = TilePos::new(i, j);
                if self.covers(pos) {
                    continue;
                }
                if tilemap.tile(pos).is_some_and(|tile| tile.is_road()) {
                    self.access_roads.push(pos);
                }
            }
        }
    }

    pub(crate) fn update_state(&mut self, param: ConstructionParam, value: f32, relative: bool) {
        let slot = match param {
            ConstructionParam::Fire => &mut self.fire,
            ConstructionParam::Damage => &mut self.damage,
        };
        let target = if relative { *slot + value } else { value };
        *slot = target.clamp(0.0, MAX_STATE);
    }

    pub(crate) fn time_step(&mut self, dispatcher: &mut Dispatcher) {
        if self.deleted {
            return;
        }

        match self.kind {
            ConstructionKind::BurningRuins => {
                self.fire = (self.fire - BURNING_RUINS_DECAY).max(0.0);
                if self.fire <= 0.0 {
                    self.deleted = true;
                    debug!(i = self.origin.i(), j = self.origin.j(), "fire burnt out");
                    dispatcher.dispatch(Command::Disaster {
                        pos: self.origin,
                        kind: DisasterKind::Collapse,
                    });
                }
            }
            kind if kind.group() == ConstructionGroup::Disaster => {}
            kind => {
                self.update_state(ConstructionParam::Fire, kind.fire_increment(), true);
                self.update_state(ConstructionParam::Damage, kind.damage_increment(), true);
                if self.damage >= MAX_STATE {
                    self.collapse(dispatcher);
                } else if self.fire >= MAX_STATE {
                    self.burn(dispatcher);
                }
            }
        }
    }

    pub(crate) fn collapse(&mut self, dispatcher: &mut Dispatcher) {
        self.strike(DisasterKind::Collapse, dispatcher);
    }

    pub(crate) fn burn(&mut self, dispatcher: &mut Dispatcher) {
        self.strike(DisasterKind::Fire, dispatcher);
    }

    pub(crate) fn plague(&mut self, dispatcher: &mut Dispatcher) {
        self.strike(DisasterKind::Plague, dispatcher);
    }

    fn strike(&mut self, kind: DisasterKind, dispatcher: &mut Dispatcher) {
        self.deleted = true;
        info!(
            construction = self.id.get(),
            kind = self.kind.name(),
            disaster = ?kind,
            i = self.origin.i(),
            j = self.origin.j(),
            "construction struck"
        );
        dispatcher.dispatch(Command::Disaster {
            pos: self.origin,
            kind,
        });
    }

    pub(crate) fn reserve_service(&mut self, service: ServiceKind) -> bool {
        self.reserved_services.insert(service)
    }

    pub(crate) fn cancel_service(&mut self, service: ServiceKind) {
        let _ = self.reserved_services.remove(&service);
    }

    pub(crate) fn apply_service(&mut self, service: ServiceKind, value: f32) {
        match (service, self.kind) {
            (ServiceKind::Prefect, ConstructionKind::BurningRuins) => {
                self.fire = (self.fire - value).max(0.0);
            }
            (ServiceKind::Prefect, _) => self.fire = 0.0,
            (ServiceKind::Engineer, _) => self.damage = 0.0,
        }
        self.cancel_service(service);
    }

    pub(crate) fn configure_house(&mut self, level: u8, health: u8) {
        self.level = level;
        self.health = health.min(MAX_STATE as u8);
    }

    pub(crate) fn store(&mut self, quantity: u32) {
        self.stock = self.stock.saturating_add(quantity);
    }

    pub(crate) fn fire_detect(&mut self, pos: TilePos) {
        self.fire_report = Some(pos);
    }

    pub(crate) fn take_fire_report(&mut self) -> Option<TilePos> {
        self.fire_report.take()
    }

    pub(crate) fn restore_trainee(&mut self, kind: TraineeKind, level: i32) {
        let _ = self.trainees.insert(kind, level.clamp(0, MAX_TRAINEE_LEVEL));
    }

    pub(crate) fn restore_stock(&mut self, stock: u32) {
        self.stock = stock;
    }

    pub(crate) fn trainees(&self) -> impl Iterator<Item = (TraineeKind, i32)> + '_ {
        self.trainees.iter().map(|(kind, level)| (*kind, *level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn construction(kind: ConstructionKind) -> Construction {
        Construction::new(ConstructionId::new(1), kind, TilePos::new(3, 3))
    }

    #[test]
    fn full_damage_dispatches_collapse_on_next_step() {
        let mut dispatcher = Dispatcher::default();
        let mut granary = construction(ConstructionKind::Granary);

        granary.update_state(ConstructionParam::Damage, 100.0, false);
        assert!(!granary.is_deleted());
        assert_eq!(dispatcher.len(), 0);

        granary.time_step(&mut dispatcher);

        assert!(granary.is_deleted());
        assert_eq!(
            dispatcher.pop(),
            Some(Command::Disaster {
                pos: TilePos::new(3, 3),
                kind: DisasterKind::Collapse,
            })
        );

        granary.time_step(&mut dispatcher);
        assert!(dispatcher.pop().is_none());
    }

    #[test]
    fn full_fire_dispatches_burn() {
        let mut dispatcher = Dispatcher::default();
        let mut house = construction(ConstructionKind::House);

        house.update_state(ConstructionParam::Fire, 99.99, false);
        house.time_step(&mut dispatcher);

        assert_eq!(
            dispatcher.pop(),
            Some(Command::Disaster {
                pos: TilePos::new(3, 3),
                kind: DisasterKind::Fire,
            })
        );
    }

    #[test]
    fn states_are_clamped() {
        let mut temple = construction(ConstructionKind::Temple);

        temple.update_state(ConstructionParam::Fire, 250.0, false);
        temple.update_state(ConstructionParam::Damage, -4.0, true);

        assert_eq!(temple.state(ConstructionParam::Fire), 100.0);
        assert_eq!(temple.state(ConstructionParam::Damage), 0.0);
    }

    #[test]
    fn ruins_never_ignite() {
        let mut dispatcher = Dispatcher::default();
        let mut ruins = construction(ConstructionKind::CollapsedRuins);

        for _ in 0..10_000 {
            ruins.time_step(&mut dispatcher);
        }

        assert_eq!(ruins.state(ConstructionParam::Fire), 0.0);
        assert_eq!(dispatcher.len(), 0);
    }

    #[test]
    fn extinguished_ruins_collapse() {
        let mut dispatcher = Dispatcher::default();
        let mut ruins = construction(ConstructionKind::BurningRuins);
        assert_eq!(ruins.evaluate_service(ServiceKind::Prefect), 99.0);

        for _ in 0..19 {
            ruins.apply_service(ServiceKind::Prefect, 5.0);
        }
        assert!(ruins.evaluate_service(ServiceKind::Prefect) > 0.0);
        ruins.apply_service(ServiceKind::Prefect, 5.0);
        assert_eq!(ruins.evaluate_service(ServiceKind::Prefect), 0.0);

        ruins.time_step(&mut dispatcher);

        assert!(ruins.is_deleted());
        assert!(matches!(
            dispatcher.pop(),
            Some(Command::Disaster {
                kind: DisasterKind::Collapse,
                ..
            })
        ));
    }

    #[test]
    fn applying_service_resets_risk_and_reservation() {
        let mut market = construction(ConstructionKind::Market);
        market.update_state(ConstructionParam::Fire, 40.0, false);
        market.update_state(ConstructionParam::Damage, 30.0, false);

        assert!(market.reserve_service(ServiceKind::Prefect));
        assert!(!market.reserve_service(ServiceKind::Prefect));
        assert_eq!(market.evaluate_service(ServiceKind::Prefect), 0.0);
        assert_eq!(market.evaluate_service(ServiceKind::Engineer), 30.0);

        market.apply_service(ServiceKind::Prefect, 5.0);

        assert!(!market.is_service_reserved(ServiceKind::Prefect));
        assert_eq!(market.state(ConstructionParam::Fire), 0.0);
        assert_eq!(market.state(ConstructionParam::Damage), 30.0);
    }

    #[test]
    fn trainee_bookkeeping_gates_demand() {
        let mut venue = construction(ConstructionKind::Temple);
        assert_eq!(venue.evaluate_trainee(TraineeKind::Actor), 100);

        venue.reserve_trainee(TraineeKind::Actor);
        assert_eq!(venue.evaluate_trainee(TraineeKind::Actor), 0);

        venue.apply_trainee(TraineeKind::Actor);
        venue.apply_trainee(TraineeKind::Actor);
        venue.apply_trainee(TraineeKind::Actor);

        assert_eq!(venue.trainee_level(TraineeKind::Actor), 200);
        assert_eq!(venue.evaluate_trainee(TraineeKind::Actor), 0);
        assert_eq!(venue.reserved_trainees().count(), 0);
        assert_eq!(venue.evaluate_trainee(TraineeKind::Gladiator), 100);
    }

    #[test]
    fn access_roads_scan_includes_corners() {
        let mut tilemap = Tilemap::new(8, 8);
        for pos in [TilePos::new(2, 2), TilePos::new(4, 4), TilePos::new(5, 5)] {
            tilemap
                .tile_mut(pos)
                .expect("inside")
                .flags_mut()
                .insert(crate::tilemap::TileFlags::ROAD);
        }

        let mut prefecture = construction(ConstructionKind::Prefecture);
        prefecture.compute_access_roads(&tilemap);
        assert_eq!(
            prefecture.access_roads(),
            &[TilePos::new(2, 2), TilePos::new(4, 4)]
        );
        assert_eq!(prefecture.enter_pos(), TilePos::new(2, 2));

        let mut house = construction(ConstructionKind::House);
        house.compute_access_roads(&tilemap);
        assert_eq!(house.access_roads().len(), 3);

        let statue = construction(ConstructionKind::SmallStatue);
        assert_eq!(statue.enter_pos(), TilePos::new(3, 3));
    }
}
