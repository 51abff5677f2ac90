//! Fog of war tests for the vision ledger.
//!
//! These tests cover:
//! - Seen counters staying consistent with own and shared sources
//! - Fogged tiles keeping the last snapshot
//! - Shared vision being transitive and revocable
//! - Units appearing and disappearing as sight changes
//! - Random walks never breaking the counters

use freeciv_core::{
    GameSettings, KnownState, Map, Packet, PlayerId, Ruleset, TileIndex, VRadius, VisionLayer,
    World,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

// =============================================================================
// Test Helpers
// =============================================================================

const WIDTH: u32 = 12;
const HEIGHT: u32 = 12;

/// Grassland world with `players` players.
fn create_world(players: usize) -> World {
    let ruleset = Ruleset::classic();
    let grass = ruleset.terrain_by_name("Grassland").unwrap();
    let map = Map::filled(WIDTH, HEIGHT, false, grass);
    let mut world = World::new(ruleset, GameSettings::new(), map).unwrap();
    for i in 0..players {
        world.add_player(format!("Player {}", i + 1)).unwrap();
    }
    world
}

fn idx(x: usize, y: usize) -> TileIndex {
    y * WIDTH as usize + x
}

/// Every counter equals the player's own sources plus those of everyone
/// sharing vision with them, and no invisible layer outruns the main layer.
fn assert_ledger_consistent(world: &World) {
    let players = world.alive_players();
    for tile in 0..world.map.len() {
        for &p in &players {
            let pt = world.plrtile(p, tile).unwrap();
            let main = pt.seen_count[VisionLayer::Main.index()];
            assert!(pt.seen_count[VisionLayer::Invis.index()] <= main);
            assert!(pt.seen_count[VisionLayer::Subsurface.index()] <= main);
            if main > 0 {
                assert!(pt.known, "seen tile {tile} not known to {p}");
            }

            let mut expected = pt.own_seen;
            for &q in &players {
                if q != p && world.really_gives_vision(q, p) {
                    let other = world.plrtile(q, tile).unwrap().own_seen;
                    for v in 0..VisionLayer::COUNT {
                        expected[v] += other[v];
                    }
                }
            }
            assert_eq!(pt.seen_count, expected, "player {p} tile {tile}");
        }
    }
}

fn known_tiles(world: &World, player: PlayerId) -> BTreeSet<TileIndex> {
    (0..world.map.len())
        .filter(|t| world.map_is_known(player, *t))
        .collect()
}

fn unit_of(world: &mut World, owner: PlayerId, name: &str, tile: TileIndex) -> u32 {
    let utype = world.ruleset.unit_type_by_name(name).unwrap();
    world.create_unit(owner, utype, tile, 0).unwrap()
}

// =============================================================================
// 1. Seen Counter Properties
// =============================================================================

mod seen_counters {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_sources_balance_out(
            sources in prop::collection::vec((0usize..144, 0i32..10, 0i32..3), 1..8),
            gifts in prop::collection::vec((0u8..3, 0u8..3), 0..4),
        ) {
            let mut world = create_world(3);
            for (from, to) in gifts {
                if from != to && !world.gives_shared_vision(from, to) {
                    world.give_shared_vision(from, to);
                }
            }

            let mut ids = Vec::new();
            for (i, (tile, main, invis)) in sources.into_iter().enumerate() {
                let owner = (i % 3) as PlayerId;
                let id = world.vision_new(owner, tile, true);
                world.vision_change_sight(id, VRadius::new(main, invis.min(main), -1));
                ids.push(id);
                assert_ledger_consistent(&world);
            }

            let known_before: Vec<_> = (0..3).map(|p| known_tiles(&world, p)).collect();
            for id in ids.into_iter().rev() {
                world.vision_clear_sight(id);
                world.vision_free(id);
            }
            assert_ledger_consistent(&world);
            for p in 0..3u8 {
                for tile in 0..world.map.len() {
                    prop_assert_eq!(world.plrtile(p, tile).unwrap().seen_count, [0; 3]);
                }
                // Knowledge never goes away.
                prop_assert_eq!(&known_tiles(&world, p), &known_before[p as usize]);
            }
        }

        #[test]
        fn test_shared_vision_is_transitive_closure(
            edges in prop::collection::vec((0u8..4, 0u8..4), 0..10),
        ) {
            let mut world = create_world(4);
            let mut direct = BTreeSet::new();
            for (from, to) in edges {
                if from != to && direct.insert((from, to)) {
                    world.give_shared_vision(from, to);
                }
            }
            for a in 0..4u8 {
                let mut reach = BTreeSet::new();
                let mut stack = vec![a];
                while let Some(n) = stack.pop() {
                    for &(f, t) in &direct {
                        if f == n && t != a && reach.insert(t) {
                            stack.push(t);
                        }
                    }
                }
                for b in 0..4u8 {
                    prop_assert_eq!(world.really_gives_vision(a, b), reach.contains(&b));
                }
            }
        }
    }

    #[test]
    fn test_resizing_a_source_touches_only_the_annulus() {
        let mut world = create_world(1);
        let id = world.vision_new(0, idx(6, 6), true);
        world.vision_change_sight(id, VRadius::new(2, -1, -1));
        world.vision_change_sight(id, VRadius::new(5, -1, -1));
        assert_eq!(world.map_get_seen(0, idx(6, 6), VisionLayer::Main), 1);
        assert_eq!(world.map_get_seen(0, idx(8, 7), VisionLayer::Main), 1);
        world.vision_change_sight(id, VRadius::new(2, -1, -1));
        assert_eq!(world.map_get_seen(0, idx(8, 7), VisionLayer::Main), 0);
        assert_eq!(world.tile_get_known(0, idx(8, 7)), KnownState::KnownUnseen);
        assert_ledger_consistent(&world);
    }
}

// =============================================================================
// 2. Fogged Snapshots
// =============================================================================

mod fogged_snapshots {
    use super::*;

    #[test]
    fn test_fogged_tile_keeps_old_terrain() {
        let mut world = create_world(1);
        let hills = world.ruleset.terrain_by_name("Hills").unwrap();
        let grass = world.ruleset.terrain_by_name("Grassland").unwrap();
        let id = world.vision_new(0, idx(3, 3), true);
        world.vision_change_sight(id, VRadius::new(2, -1, -1));
        world.vision_clear_sight(id);

        world.map.tile_mut(idx(3, 3)).terrain = hills;
        world.update_tile_knowledge(idx(3, 3));
        assert_eq!(world.plrtile(0, idx(3, 3)).unwrap().terrain, Some(grass));

        world.vision_change_sight(id, VRadius::new(0, -1, -1));
        assert_eq!(world.plrtile(0, idx(3, 3)).unwrap().terrain, Some(hills));
    }

    #[test]
    fn test_fog_arrives_in_one_batch() {
        let mut world = create_world(1);
        let id = world.vision_new(0, idx(6, 6), true);
        world.vision_change_sight(id, VRadius::new(5, -1, -1));
        world.players[0].connection.take_batches();
        world.vision_clear_sight(id);
        let batches = world.players[0].connection.take_batches();
        assert_eq!(batches.len(), 1);
        assert!(batches[0]
            .packets
            .iter()
            .all(|p| matches!(p, Packet::TileInfo(info) if info.known == KnownState::KnownUnseen)));
    }
}

// =============================================================================
// 3. Shared Vision
// =============================================================================

mod shared_vision {
    use super::*;

    #[test]
    fn test_revoking_shared_vision_fogs_and_hides_units() {
        let mut world = create_world(2);
        let scout = unit_of(&mut world, 0, "Warriors", idx(2, 2));
        unit_of(&mut world, 1, "Warriors", idx(9, 9));

        world.give_shared_vision(0, 1);
        assert_eq!(world.tile_get_known(1, idx(2, 2)), KnownState::KnownSeen);
        assert!(world.can_player_see_unit(1, scout));
        world.players[1].connection.take_packets();

        world.remove_shared_vision(0, 1);
        assert_eq!(world.tile_get_known(1, idx(2, 2)), KnownState::KnownUnseen);
        assert!(!world.can_player_see_unit(1, scout));
        let packets = world.players[1].connection.take_packets();
        assert!(packets.contains(&Packet::UnitRemove { id: scout }));
        // Their own sight is untouched.
        assert_eq!(world.tile_get_known(1, idx(9, 9)), KnownState::KnownSeen);
        assert_ledger_consistent(&world);
    }

    #[test]
    fn test_chain_relays_new_sight() {
        let mut world = create_world(3);
        world.give_shared_vision(0, 1);
        world.give_shared_vision(1, 2);
        let scout = unit_of(&mut world, 0, "Explorer", idx(5, 5));
        assert_eq!(world.tile_get_known(2, idx(5, 5)), KnownState::KnownSeen);
        assert!(world.can_player_see_unit(2, scout));

        world.remove_shared_vision(1, 2);
        assert_eq!(world.tile_get_known(2, idx(5, 5)), KnownState::KnownUnseen);
        assert_ledger_consistent(&world);
    }

    #[test]
    fn test_moving_unit_updates_receivers() {
        let mut world = create_world(2);
        world.give_shared_vision(0, 1);
        let scout = unit_of(&mut world, 0, "Explorer", idx(5, 5));
        world
            .unit_move_handling(scout, idx(6, 5), true)
            .unwrap();
        assert_eq!(world.tile_get_known(1, idx(7, 5)), KnownState::KnownSeen);
        assert_eq!(world.tile_get_known(1, idx(4, 5)), KnownState::KnownUnseen);
        assert_ledger_consistent(&world);
    }
}

// =============================================================================
// 4. Random Walks
// =============================================================================

mod random_walks {
    use super::*;
    use freeciv_core::Direction8;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_random_walks_keep_ledger_consistent() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut world = create_world(3);
        let mut scouts = Vec::new();
        for p in 0..3 {
            for _ in 0..2 {
                let tile = idx(rng.gen_range(0..12), rng.gen_range(0..12));
                scouts.push(unit_of(&mut world, p, "Explorer", tile));
            }
        }

        for step in 0..200 {
            let scout = scouts[rng.gen_range(0..scouts.len())];
            let tile = world.unit(scout).unwrap().tile;
            let dir = Direction8::ALL[rng.gen_range(0..Direction8::ALL.len())];
            if let Some(dest) = world.map.mapstep(tile, dir) {
                assert!(world.unit_move(scout, dest, 0));
            }

            if step % 20 == 0 {
                let from = rng.gen_range(0..3);
                let to = (from + rng.gen_range(1..3)) % 3;
                if rng.gen_bool(0.5) {
                    world.give_shared_vision(from, to);
                } else {
                    world.remove_shared_vision(from, to);
                }
                assert_ledger_consistent(&world);
            }
        }
        assert_ledger_consistent(&world);

        for &scout in &scouts {
            let unit = world.unit(scout).unwrap();
            assert_eq!(
                world.tile_get_known(unit.owner, unit.tile),
                KnownState::KnownSeen
            );
        }
    }
}
