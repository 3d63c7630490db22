use civitas_core::{Direction, MapBounds, Pathway, TilePos, VariantMap};

fn bounds() -> MapBounds {
    MapBounds::new(16, 16)
}

fn route(origin: TilePos, directions: &[Direction]) -> Pathway {
    let mut pathway = Pathway::new(bounds(), origin);
    for direction in directions {
        pathway
            .set_next_direction(*direction)
            .expect("step stays on the map");
    }
    pathway
}

#[test]
fn east_east_north_reaches_expected_destination() {
    let mut pathway = route(
        TilePos::new(0, 0),
        &[Direction::East, Direction::East, Direction::North],
    );

    assert_eq!(pathway.destination(), TilePos::new(2, 1));
    assert_eq!(pathway.tiles().len(), 4);
    assert_eq!(pathway.len(), 3);

    pathway.begin();
    assert_eq!(pathway.next_direction(), Direction::East);
    assert_eq!(pathway.next_direction(), Direction::East);
    assert_eq!(pathway.next_direction(), Direction::North);
    assert_eq!(pathway.next_direction(), Direction::None);
}

#[test]
fn destination_is_origin_plus_every_offset() {
    let directions = [
        Direction::NorthEast,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::North,
        Direction::NorthWest,
        Direction::West,
    ];
    let origin = TilePos::new(5, 5);
    let pathway = route(origin, &directions);

    let (di, dj) = directions.iter().fold((0, 0), |(i, j), direction| {
        let (oi, oj) = direction.offset();
        (i + oi, j + oj)
    });
    assert_eq!(pathway.destination(), origin + TilePos::new(di, dj));
    assert_eq!(pathway.len(), directions.len());
    assert_eq!(pathway.tiles().len(), directions.len() + 1);
}

#[test]
fn toggling_twice_restores_cursor_at_every_offset() {
    let directions = [
        Direction::East,
        Direction::North,
        Direction::North,
        Direction::West,
    ];

    for consumed in 0..=directions.len() {
        let mut pathway = route(TilePos::new(4, 4), &directions);
        pathway.begin();
        for _ in 0..consumed {
            let _ = pathway.next_direction();
        }

        let mut reference = pathway.clone();
        pathway.toggle_direction();
        pathway.toggle_direction();

        assert!(!pathway.is_reverse());
        assert_eq!(pathway.step(), consumed);
        assert_eq!(pathway.next_direction(), reference.next_direction());
    }
}

#[test]
fn toggled_cursor_walks_back_to_origin() {
    let mut pathway = route(
        TilePos::new(1, 1),
        &[Direction::East, Direction::East, Direction::North],
    );
    pathway.begin();
    let mut pos = pathway.origin();
    for _ in 0..2 {
        pos = pos.step(pathway.next_direction());
    }

    pathway.toggle_direction();
    loop {
        let direction = pathway.next_direction();
        if direction == Direction::None {
            break;
        }
        pos = pos.step(direction);
    }

    assert_eq!(pos, pathway.origin());
}

#[test]
fn contains_covers_every_tile_including_origin() {
    let pathway = route(TilePos::new(3, 3), &[Direction::South, Direction::South]);

    for tile in [
        TilePos::new(3, 3),
        TilePos::new(3, 2),
        TilePos::new(3, 1),
    ] {
        assert!(pathway.contains(tile));
    }
    assert!(!pathway.contains(TilePos::new(3, 0)));
    assert!(!pathway.contains(TilePos::new(2, 2)));
}

#[test]
fn save_and_load_restore_route_and_cursors() {
    let mut pathway = route(
        TilePos::new(2, 2),
        &[
            Direction::East,
            Direction::NorthEast,
            Direction::North,
            Direction::North,
        ],
    );
    pathway.rbegin();
    let _ = pathway.next_direction();
    let _ = pathway.next_direction();

    let stream = pathway.save();
    let mut loaded = Pathway::load(bounds(), &stream)
        .expect("stream decodes")
        .expect("route is not empty");

    assert_eq!(loaded.directions(), pathway.directions());
    assert_eq!(loaded.destination(), pathway.destination());
    assert!(loaded.is_reverse());
    assert_eq!(loaded.step(), 2);
    assert_eq!(loaded.next_direction(), pathway.next_direction());

    loaded.toggle_direction();
    assert_eq!(loaded.step(), 1);
}

#[test]
fn empty_route_saves_empty_map() {
    let pathway = Pathway::new(bounds(), TilePos::new(7, 7));

    let stream = pathway.save();

    assert!(stream.is_empty());
    assert!(Pathway::load(bounds(), &VariantMap::new())
        .expect("empty stream decodes")
        .is_none());
}

#[test]
fn saved_schema_uses_direction_codes() {
    let pathway = route(TilePos::new(0, 0), &[Direction::East, Direction::North]);

    let stream = pathway.save();

    assert_eq!(stream["startPos"], serde_json::json!([0, 0]));
    assert_eq!(stream["stopPos"], serde_json::json!([1, 1]));
    assert_eq!(stream["directions"], serde_json::json!([3, 1]));
    assert_eq!(stream["reverse"], serde_json::json!(false));
    assert_eq!(stream["step"], serde_json::json!(0));
}

#[test]
fn from_tiles_rebuilds_steps() {
    let tiles = [
        TilePos::new(0, 0),
        TilePos::new(1, 0),
        TilePos::new(1, 1),
        TilePos::new(0, 2),
    ];

    let pathway = Pathway::from_tiles(bounds(), &tiles)
        .expect("tiles are adjacent")
        .expect("tiles are present");

    assert_eq!(
        pathway.directions(),
        &[Direction::East, Direction::North, Direction::NorthWest]
    );
    assert_eq!(pathway.tiles(), &tiles);
    assert!(Pathway::from_tiles(bounds(), &[])
        .expect("nothing to replay")
        .is_none());
}
