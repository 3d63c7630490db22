#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic spawning system responsible for sending prefects out.

use std::collections::{BTreeMap, BTreeSet};

use civitas_core::{Command, ConstructionId, Event, PrefectureView};
use tracing::debug;

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    patrol_interval: u32,
    water_supply: u32,
}

impl Config {
    /// Creates a new configuration using the provided patrol cadence and the
    /// water handed to every firefighting prefect.
    #[must_use]
    pub const fn new(patrol_interval: u32, water_supply: u32) -> Self {
        Self {
            patrol_interval,
            water_supply,
        }
    }
}

/// Pure system that emits prefect dispatch commands for every prefecture.
#[derive(Debug)]
pub struct Spawning {
    patrol_interval: u32,
    water_supply: u32,
    timers: BTreeMap<ConstructionId, u32>,
}

impl Spawning {
    /// Creates a new spawning system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            patrol_interval: config.patrol_interval,
            water_supply: config.water_supply,
            timers: BTreeMap::new(),
        }
    }

    /// Consumes events and the prefecture view to emit dispatch commands.
    ///
    /// Patrols leave once the prefecture's timer reaches the patrol interval
    /// and nobody from it is on patrol. Reported fires get a water carrier
    /// unless one is already out.
    pub fn handle(
        &mut self,
        events: &[Event],
        prefectures: &PrefectureView,
        out: &mut Vec<Command>,
    ) {
        self.timers
            .retain(|id, _| prefectures.get(*id).is_some());

        let elapsed = events
            .iter()
            .filter(|event| matches!(event, Event::TimeAdvanced { .. }))
            .count();
        let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);

        let mut burning: BTreeSet<ConstructionId> = events
            .iter()
            .filter_map(|event| match event {
                Event::FireDetected { prefecture, .. } => Some(*prefecture),
                _ => None,
            })
            .collect();
        if elapsed > 0 {
            burning.extend(
                prefectures
                    .iter()
                    .filter(|snapshot| snapshot.pending_fire.is_some())
                    .map(|snapshot| snapshot.id),
            );
        }

        for id in burning {
            let Some(snapshot) = prefectures.get(id) else {
                continue;
            };
            if snapshot.water_carriers_out > 0 || self.water_supply == 0 {
                continue;
            }
            debug!(prefecture = id.get(), "sending water to a reported fire");
            out.push(Command::SendPrefect {
                prefecture: id,
                water: self.water_supply,
            });
        }

        if elapsed == 0 || self.patrol_interval == 0 {
            return;
        }
        for snapshot in prefectures.iter() {
            let timer = self.timers.entry(snapshot.id).or_insert(0);
            *timer = timer.saturating_add(elapsed);
            if *timer < self.patrol_interval || snapshot.patrols_out > 0 {
                continue;
            }
            *timer = 0;
            out.push(Command::SendPrefect {
                prefecture: snapshot.id,
                water: 0,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civitas_core::{PrefectureSnapshot, TilePos};

    fn view(patrols_out: usize) -> PrefectureView {
        PrefectureView::from_snapshots(vec![PrefectureSnapshot {
            id: ConstructionId::new(7),
            enter_pos: TilePos::new(1, 0),
            patrols_out,
            water_carriers_out: 0,
            pending_fire: None,
        }])
    }

    #[test]
    fn timers_wait_for_returning_patrols() {
        let mut spawning = Spawning::new(Config::new(2, 100));
        let mut commands = Vec::new();
        let tick = [Event::TimeAdvanced { tick: 1 }];

        spawning.handle(&tick, &view(1), &mut commands);
        spawning.handle(&tick, &view(1), &mut commands);
        spawning.handle(&tick, &view(1), &mut commands);
        assert!(commands.is_empty());

        spawning.handle(&tick, &view(0), &mut commands);
        assert_eq!(
            commands,
            vec![Command::SendPrefect {
                prefecture: ConstructionId::new(7),
                water: 0,
            }]
        );
    }

    #[test]
    fn vanished_prefectures_drop_their_timers() {
        let mut spawning = Spawning::new(Config::new(5, 100));
        let mut commands = Vec::new();
        spawning.handle(&[Event::TimeAdvanced { tick: 1 }], &view(0), &mut commands);
        assert_eq!(spawning.timers.len(), 1);

        spawning.handle(&[], &PrefectureView::default(), &mut commands);

        assert!(spawning.timers.is_empty());
        assert!(commands.is_empty());
    }
}
