use civitas_core::{
    Command, ConstructionKind, ConstructionParam, DisasterKind, Event, FundIssueKind, TilePos,
};
use civitas_world::{self as world, query, World};

fn run(world: &mut World, commands: Vec<Command>) -> Vec<Event> {
    let mut events = Vec::new();
    for command in commands {
        world::apply(world, command, &mut events);
    }
    world::apply(world, Command::Tick, &mut events);
    events
}

fn tick(world: &mut World) -> Vec<Event> {
    run(world, Vec::new())
}

fn build(pos: TilePos, kind: ConstructionKind) -> Command {
    Command::Build { pos, kind }
}

#[test]
fn building_charges_the_treasury() {
    let mut world = World::new();

    let events = run(
        &mut world,
        vec![
            build(TilePos::new(4, 4), ConstructionKind::Road),
            build(TilePos::new(5, 4), ConstructionKind::Prefecture),
        ],
    );

    assert_eq!(query::funds(&world).balance(), 5000 - 4 - 30);
    assert_eq!(query::funds(&world).issued(FundIssueKind::Construction), -34);
    assert!(events.contains(&Event::FundsChanged {
        kind: FundIssueKind::Construction,
        amount: -30,
        balance: 4966,
    }));
    let prefecture = query::construction_at(&world, TilePos::new(5, 4)).expect("built");
    assert_eq!(prefecture.enter_pos(), TilePos::new(4, 4));
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::WarningMessage { .. })));
}

#[test]
fn commands_flush_in_append_order() {
    let mut world = World::new();

    let events = run(
        &mut world,
        vec![
            build(TilePos::new(2, 2), ConstructionKind::House),
            Command::ClearLand {
                pos: TilePos::new(2, 2),
            },
            build(TilePos::new(2, 2), ConstructionKind::Garden),
        ],
    );

    let kinds: Vec<ConstructionKind> = events
        .iter()
        .filter_map(|event| match event {
            Event::ConstructionBuilt { kind, .. } | Event::ConstructionRemoved { kind, .. } => {
                Some(*kind)
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            ConstructionKind::House,
            ConstructionKind::House,
            ConstructionKind::Garden,
        ]
    );
    assert_eq!(
        query::construction_at(&world, TilePos::new(2, 2)).map(|garden| garden.kind()),
        Some(ConstructionKind::Garden)
    );
}

#[test]
fn fire_leaves_burning_ruins_on_every_tile() {
    let mut world = World::new();
    let _ = run(
        &mut world,
        vec![build(TilePos::new(6, 6), ConstructionKind::Granary)],
    );

    let events = run(
        &mut world,
        vec![Command::Disaster {
            pos: TilePos::new(7, 7),
            kind: DisasterKind::Fire,
        }],
    );

    assert!(events.contains(&Event::DisasterStruck {
        pos: TilePos::new(7, 7),
        kind: DisasterKind::Fire,
    }));
    let ruins: Vec<TilePos> = query::constructions(&world)
        .filter(|construction| construction.kind() == ConstructionKind::BurningRuins)
        .map(|construction| construction.origin())
        .collect();
    assert_eq!(
        ruins,
        vec![
            TilePos::new(6, 6),
            TilePos::new(7, 6),
            TilePos::new(6, 7),
            TilePos::new(7, 7),
        ]
    );
    assert_eq!(query::funds(&world).balance(), 5000 - 100);
}

#[test]
fn full_damage_collapses_on_the_next_tick() {
    let mut world = World::new();
    let _ = run(
        &mut world,
        vec![build(TilePos::new(3, 3), ConstructionKind::House)],
    );
    let house = query::construction_at(&world, TilePos::new(3, 3))
        .expect("house built")
        .id();
    let _ = run(
        &mut world,
        vec![Command::UpdateConstructionState {
            construction: house,
            param: ConstructionParam::Damage,
            value: 100.0,
            relative: false,
        }],
    );
    assert!(query::construction(&world, house).is_some());

    let events = tick(&mut world);

    assert!(events.contains(&Event::DisasterStruck {
        pos: TilePos::new(3, 3),
        kind: DisasterKind::Collapse,
    }));
    assert!(query::construction(&world, house).is_none());
    assert_eq!(
        query::construction_at(&world, TilePos::new(3, 3)).map(|ruins| ruins.kind()),
        Some(ConstructionKind::CollapsedRuins)
    );
}

#[test]
fn unattended_fire_burns_out_into_rubble() {
    let mut world = World::new();
    let _ = run(
        &mut world,
        vec![Command::Disaster {
            pos: TilePos::new(1, 1),
            kind: DisasterKind::Fire,
        }],
    );
    let ruins = query::construction_at(&world, TilePos::new(1, 1)).expect("ruins built");
    assert_eq!(ruins.kind(), ConstructionKind::BurningRuins);
    assert!(ruins.state(ConstructionParam::Fire) > 98.0);

    let mut collapsed = false;
    for _ in 0..400 {
        let events = tick(&mut world);
        if events.contains(&Event::DisasterStruck {
            pos: TilePos::new(1, 1),
            kind: DisasterKind::Collapse,
        }) {
            collapsed = true;
            break;
        }
    }

    assert!(collapsed, "burning ruins never burnt out");
    assert_eq!(
        query::construction_at(&world, TilePos::new(1, 1)).map(|ruins| ruins.kind()),
        Some(ConstructionKind::CollapsedRuins)
    );
}

#[test]
fn rioters_damage_richer_houses() {
    let mut world = World::new();
    let _ = run(
        &mut world,
        vec![
            build(TilePos::new(2, 2), ConstructionKind::House),
            build(TilePos::new(6, 2), ConstructionKind::House),
        ],
    );
    let poor = query::construction_at(&world, TilePos::new(2, 2))
        .expect("built")
        .id();
    let rich = query::construction_at(&world, TilePos::new(6, 2))
        .expect("built")
        .id();
    let _ = run(
        &mut world,
        vec![
            Command::ConfigureHouse {
                house: rich,
                level: 5,
                health: 100,
            },
            Command::SpawnProtestor { house: poor },
        ],
    );

    for _ in 0..60 {
        let _ = tick(&mut world);
    }

    let rich = query::construction(&world, rich).expect("still standing");
    assert!(rich.state(ConstructionParam::Damage) >= 5.0);
    assert!(rich.state(ConstructionParam::Fire) >= 5.0);
    assert!(query::construction(&world, poor)
        .expect("still standing")
        .state(ConstructionParam::Damage)
        < 5.0);
}
