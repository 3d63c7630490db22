//! Market kids carrying a basket home along a market lady's route.

use civitas_core::{
    ConstructionId, ConstructionKind, Event, Pathway, PersistenceError, VariantMap,
    VariantMapExt,
};
use serde_json::Value;
use tracing::{debug, info};

use super::{u32_value, Behaviour, Walker};
use crate::World;

/// State carried by a market kid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarketKidState {
    /// Market receiving the basket.
    pub market: ConstructionId,
    /// Goods carried.
    pub basket: u32,
    /// Ticks left before the kid starts walking.
    pub delay: u32,
}

impl MarketKidState {
    pub(crate) fn save(&self, stream: &mut VariantMap) {
        let _ = stream.insert("market".to_owned(), Value::from(self.market.get()));
        let _ = stream.insert("basket".to_owned(), Value::from(self.basket));
        let _ = stream.insert("delay".to_owned(), Value::from(self.delay));
    }

    pub(crate) fn load(stream: &VariantMap) -> Result<Self, PersistenceError> {
        Ok(Self {
            market: ConstructionId::new(u32_value(stream, "market")?),
            basket: u32_value(stream, "basket")?,
            delay: stream.uint("delay").map_or(0, |delay| {
                u32::try_from(delay).unwrap_or(u32::MAX)
            }),
        })
    }
}

/// Sends a kid from the far end of `pathway` back to `market`.
pub(crate) fn send_to_city(
    world: &mut World,
    market: ConstructionId,
    mut pathway: Pathway,
    basket: u32,
    delay: u32,
    out: &mut Vec<Event>,
) {
    if !pathway.is_valid() {
        debug!(market = market.get(), "market kid needs a route");
        return;
    }
    let known = world
        .constructions
        .get(&market)
        .is_some_and(|target| target.kind() == ConstructionKind::Market && !target.is_deleted());
    if !known {
        debug!(market = market.get(), "no market to carry goods to");
        return;
    }

    let state = MarketKidState {
        market,
        basket,
        delay,
    };
    let id = world.next_walker_id();
    let mut walker = Walker::new(
        id,
        Behaviour::MarketKid(state),
        pathway.destination(),
        world.tilemap.bounds(),
    );
    walker.base = Some(market);
    pathway.rbegin();
    walker.walk(pathway);
    world.add_walker(walker, out);
}

pub(super) fn time_step(walker: &mut Walker, world: &mut World, out: &mut Vec<Event>) {
    if let Behaviour::MarketKid(mut state) = walker.behaviour {
        if state.delay > 0 {
            state.delay -= 1;
            walker.behaviour = Behaviour::MarketKid(state);
            return;
        }
    }
    walker.advance(world, out);
}

pub(super) fn on_destination(walker: &mut Walker, world: &mut World) {
    let Behaviour::MarketKid(state) = walker.behaviour else {
        return;
    };
    walker.delete_later();
    match world
        .constructions
        .get_mut(&state.market)
        .filter(|market| !market.is_deleted())
    {
        Some(market) => {
            market.store(state.basket);
            info!(
                market = state.market.get(),
                basket = state.basket,
                "market kid delivered goods"
            );
        }
        None => debug!(market = state.market.get(), "market kid lost its market"),
    }
}
