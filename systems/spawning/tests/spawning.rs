use civitas_core::{Command, ConstructionKind, DisasterKind, Event, TilePos, WalkerKind};
use civitas_system_spawning::{Config, Spawning};
use civitas_world::{self as world, query, World};

fn drive(world: &mut World, spawning: &mut Spawning, ticks: usize) -> (Vec<Event>, Vec<Command>) {
    let mut log = Vec::new();
    let mut issued = Vec::new();
    for _ in 0..ticks {
        let mut events = Vec::new();
        world::apply(world, Command::Tick, &mut events);

        let prefectures = query::prefecture_view(world);
        let mut commands = Vec::new();
        spawning.handle(&events, &prefectures, &mut commands);
        for command in commands {
            issued.push(command.clone());
            let mut generated = Vec::new();
            world::apply(world, command, &mut generated);
            events.extend(generated);
        }
        log.extend(events);
    }
    (log, issued)
}

fn city(world: &mut World) {
    let mut events = Vec::new();
    world::apply(
        world,
        Command::Build {
            pos: TilePos::new(2, 2),
            kind: ConstructionKind::Prefecture,
        },
        &mut events,
    );
    for j in 1..=10 {
        world::apply(
            world,
            Command::Build {
                pos: TilePos::new(3, j),
                kind: ConstructionKind::Road,
            },
            &mut events,
        );
    }
}

#[test]
fn patrols_leave_on_cadence() {
    let mut world = World::new();
    city(&mut world);
    let mut spawning = Spawning::new(Config::new(3, 100));

    let (events, issued) = drive(&mut world, &mut spawning, 4);

    assert_eq!(
        issued
            .iter()
            .filter(|command| matches!(command, Command::SendPrefect { water: 0, .. }))
            .count(),
        1
    );
    assert!(events.iter().any(|event| matches!(
        event,
        Event::WalkerSpawned {
            kind: WalkerKind::Prefect,
            ..
        }
    )));

    let (_, issued) = drive(&mut world, &mut spawning, 8);
    assert!(issued.is_empty(), "patrol still out: {issued:?}");

    let (events, issued) = drive(&mut world, &mut spawning, 200);
    assert!(events.iter().any(|event| matches!(
        event,
        Event::WalkerRemoved {
            kind: WalkerKind::Prefect,
            ..
        }
    )));
    assert!(
        issued
            .iter()
            .filter(|command| matches!(command, Command::SendPrefect { water: 0, .. }))
            .count()
            >= 1
    );
}

#[test]
fn reported_fire_gets_one_water_carrier() {
    let mut world = World::new();
    city(&mut world);
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::Disaster {
            pos: TilePos::new(4, 8),
            kind: DisasterKind::Fire,
        },
        &mut events,
    );
    let mut spawning = Spawning::new(Config::new(1, 100));

    let (events, issued) = drive(&mut world, &mut spawning, 150);

    assert!(events
        .iter()
        .any(|event| matches!(event, Event::FireDetected { pos, .. } if *pos == TilePos::new(4, 8))));
    assert!(issued
        .iter()
        .any(|command| matches!(command, Command::SendPrefect { water: 100, .. })));
    assert!(events.contains(&Event::DisasterStruck {
        pos: TilePos::new(4, 8),
        kind: DisasterKind::Collapse,
    }));
    assert_eq!(
        query::construction_at(&world, TilePos::new(4, 8)).map(|ruins| ruins.kind()),
        Some(ConstructionKind::CollapsedRuins)
    );
}
