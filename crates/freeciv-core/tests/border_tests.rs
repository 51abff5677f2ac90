//! Border claiming tests.
//!
//! These tests cover:
//! - Strength falling off with distance from a source
//! - Contested tiles going to the stronger source
//! - Borders following cities through conquest and destruction
//! - Border vision in the modes that grant it

use freeciv_core::{
    BorderMode, DiplStatus, GameSettings, Map, PlayerId, Ruleset, TileIndex, VisionLayer, World,
};
use proptest::prelude::*;

// =============================================================================
// Test Helpers
// =============================================================================

const WIDTH: u32 = 24;
const HEIGHT: u32 = 16;

fn create_world(borders: BorderMode) -> World {
    let ruleset = Ruleset::classic();
    let grass = ruleset.terrain_by_name("Grassland").unwrap();
    let map = Map::filled(WIDTH, HEIGHT, false, grass);
    let mut settings = GameSettings::new();
    settings.borders = borders;
    let mut world = World::new(ruleset, settings, map).unwrap();
    world.add_player("Romans").unwrap();
    world.add_player("Greeks").unwrap();
    world
}

fn idx(x: usize, y: usize) -> TileIndex {
    y * WIDTH as usize + x
}

fn owner(world: &World, x: usize, y: usize) -> Option<PlayerId> {
    world.map.tile(idx(x, y)).owner
}

// =============================================================================
// 1. Strength
// =============================================================================

mod strength {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn test_strength_never_grows_with_distance(
            size in 1u32..30,
            a in (0usize..24, 0usize..16),
            b in (0usize..24, 0usize..16),
        ) {
            let mut world = create_world(BorderMode::Expand);
            let source = idx(12, 8);
            let city = world.create_city(0, source, "Rome").unwrap();
            world.city_change_size(city, size).unwrap();

            let (ta, tb) = (idx(a.0, a.1), idx(b.0, b.1));
            let (da, db) = (world.map.sq_distance(source, ta), world.map.sq_distance(source, tb));
            let (sa, sb) = (
                world.tile_border_strength(ta, source),
                world.tile_border_strength(tb, source),
            );
            if da <= db {
                prop_assert!(sa >= sb);
            } else {
                prop_assert!(sa <= sb);
            }
        }
    }

    #[test]
    fn test_bigger_city_pushes_border_back() {
        let mut world = create_world(BorderMode::Expand);
        let rome = world.create_city(0, idx(4, 8), "Rome").unwrap();
        world.create_city(1, idx(12, 8), "Athens").unwrap();
        // Midway tiles split evenly at equal size.
        assert_eq!(owner(&world, 7, 8), Some(0));
        assert_eq!(owner(&world, 9, 8), Some(1));

        world.city_change_size(rome, 8).unwrap();
        world.map_calculate_borders();
        assert_eq!(owner(&world, 9, 8), Some(0));
        // The rival's own surroundings stay theirs.
        assert_eq!(owner(&world, 11, 8), Some(1));
    }
}

// =============================================================================
// 2. Cities and Bases
// =============================================================================

mod sources {
    use super::*;

    #[test]
    fn test_destroyed_city_releases_border() {
        let mut world = create_world(BorderMode::Expand);
        let rome = world.create_city(0, idx(6, 6), "Rome").unwrap();
        assert_eq!(owner(&world, 8, 6), Some(0));
        world.remove_city(rome).unwrap();
        assert_eq!(owner(&world, 8, 6), None);
        assert_eq!(owner(&world, 6, 6), None);
    }

    #[test]
    fn test_transferred_city_takes_border_along() {
        let mut world = create_world(BorderMode::Expand);
        let rome = world.create_city(0, idx(6, 6), "Rome").unwrap();
        world.transfer_city(rome, 1).unwrap();
        assert_eq!(owner(&world, 6, 6), Some(1));
        assert_eq!(owner(&world, 8, 7), Some(1));
        assert_eq!(world.city(rome).unwrap().owner, 1);
    }

    #[test]
    fn test_conquered_city_changes_hands() {
        let mut world = create_world(BorderMode::Expand);
        world.set_diplstate(0, 1, DiplStatus::War);
        let athens = world.create_city(1, idx(10, 8), "Athens").unwrap();
        world.city_change_size(athens, 3).unwrap();
        let legion = world.ruleset.unit_type_by_name("Legion").unwrap();
        let attacker = world.create_unit(0, legion, idx(9, 8), 0).unwrap();

        world.unit_move_handling(attacker, idx(10, 8), false).unwrap();
        let city = world.city(athens).unwrap();
        assert_eq!(city.owner, 0);
        assert_eq!(city.size, 2);
        assert_eq!(owner(&world, 10, 8), Some(0));
        assert_eq!(world.units[&attacker].tile, idx(10, 8));
    }

    #[test]
    fn test_conquering_smallest_city_destroys_it() {
        let mut world = create_world(BorderMode::Expand);
        world.set_diplstate(0, 1, DiplStatus::War);
        let athens = world.create_city(1, idx(10, 8), "Athens").unwrap();
        let legion = world.ruleset.unit_type_by_name("Legion").unwrap();
        let attacker = world.create_unit(0, legion, idx(9, 8), 0).unwrap();
        world.players[0].connection.take_packets();

        world.unit_move_handling(attacker, idx(10, 8), false).unwrap();
        assert!(world.city(athens).is_err());
        assert!(world.map.tile(idx(10, 8)).city.is_none());
        let destroyed = world.players[0].connection.take_packets().into_iter().any(|p| {
            matches!(p, freeciv_core::Packet::Notify { message, .. } if message == "You destroy Athens.")
        });
        assert!(destroyed);
    }

    #[test]
    fn test_fortress_borders_lose_to_cities() {
        let mut world = create_world(BorderMode::Expand);
        let fortress = world.ruleset.extra_by_name("Fortress").unwrap();
        world.map.tile_mut(idx(14, 8)).extras.insert(fortress);
        world.map_claim_ownership(idx(14, 8), Some(1), Some(idx(14, 8)), true);
        world.map_claim_border(idx(14, 8), 1, -1);
        assert_eq!(owner(&world, 13, 8), Some(1));

        world.create_city(0, idx(11, 8), "Rome").unwrap();
        // Distance 4 from a size 1 city beats distance 1 from a fortress.
        assert_eq!(owner(&world, 13, 8), Some(0));
        assert_eq!(owner(&world, 14, 8), Some(1));
    }
}

// =============================================================================
// 3. Border Vision
// =============================================================================

mod border_vision {
    use super::*;

    #[test]
    fn test_see_inside_lets_owner_watch_territory() {
        let mut world = create_world(BorderMode::SeeInside);
        // Below Expand only known tiles are claimed.
        world.map_show_all(0);
        world.create_city(0, idx(10, 8), "Rome").unwrap();
        // Outside the city's own sight, but inside its border.
        let edge = idx(14, 8);
        assert_eq!(owner(&world, 14, 8), Some(0));
        assert!(world.map_get_seen(0, edge, VisionLayer::Main) >= 1);
    }

    #[test]
    fn test_enabled_mode_grants_no_vision() {
        let mut world = create_world(BorderMode::Enabled);
        world.map_show_all(0);
        world.create_city(0, idx(10, 8), "Rome").unwrap();
        assert_eq!(owner(&world, 14, 8), Some(0));
        assert_eq!(world.map_get_seen(0, idx(14, 8), VisionLayer::Main), 0);
    }

    #[test]
    fn test_fogged_borders_hide_changes() {
        let mut world = create_world(BorderMode::Expand);
        world.settings.foggedborders = true;
        world.map_show_all(1);
        world.players[1].connection.take_packets();
        world.create_city(0, idx(10, 8), "Rome").unwrap();
        // Player 1 knows the tiles but sees none of them.
        assert!(world.players[1].connection.take_packets().is_empty());
        assert_eq!(world.plrtile(1, idx(12, 8)).unwrap().owner, None);
    }
}
