//! Integration tests for tileset loading and tile rendering.
//!
//! These tests verify end-to-end scenarios including:
//! - Capability and topology checks while loading
//! - Sprite tag resolution and duplicate handling
//! - Terrain matching for single, same-group and full-group styles
//! - Extras, units, cities, fog and borders on a client map
//! - Rendering a map fed by engine packets

use freeciv_core::packets::{CityInfo, TileInfo, UnitInfo, UnitShortInfo};
use freeciv_core::{
    ActivityType, ExtraSet, GameSettings, KnownState, Map, Packet, PlayerId, Ruleset, TerrainId,
    TileIndex, World,
};
use freeciv_tileset::capability::{SPEC_CAPSTR, TILESPEC_CAPSTR};
use freeciv_tileset::layer::terrain::variant_for_tile;
use freeciv_tileset::{
    CapabilityError, ClientMap, DrawContext, Edge, LayerKind, MemorySource, MapView, Rgb, Sprite,
    SpriteId, Tileset, TilesetError, TilesetOptions,
};
use proptest::prelude::*;

// =============================================================================
// Test Helpers
// =============================================================================

const WIDTH: u32 = 5;
const HEIGHT: u32 = 5;
const CENTER: TileIndex = 12;

fn idx(x: usize, y: usize) -> TileIndex {
    y * WIDTH as usize + x
}

fn terrain(name: &str) -> TerrainId {
    Ruleset::classic().terrain_by_name(name).unwrap()
}

fn builtin_tilespec() -> String {
    freeciv_tileset::builtin::files()
        .into_iter()
        .find(|(path, _)| path == "trident.tilespec")
        .map(|(_, text)| text)
        .unwrap()
}

/// The built-in tileset with its tilespec replaced.
fn with_tilespec(text: String) -> MemorySource {
    MemorySource::builtin().with_file("trident.tilespec", text)
}

fn load(source: &MemorySource) -> Result<Tileset, TilesetError> {
    Tileset::load(source, "trident", &Ruleset::classic())
}

fn trident() -> Tileset {
    load(&MemorySource::builtin()).unwrap()
}

fn tile_info(tile: TileIndex, known: KnownState, terrain: TerrainId) -> TileInfo {
    TileInfo {
        tile,
        known,
        terrain: Some(terrain),
        extras: ExtraSet::EMPTY,
        resource: None,
        owner: None,
        extras_owner: None,
        continent: 1,
    }
}

/// A fully seen map of `default` with the listed tiles changed.
fn seen_map(default: TerrainId, tiles: &[(TileIndex, TerrainId)]) -> ClientMap {
    let mut map = ClientMap::new(WIDTH, HEIGHT, false);
    for tile in 0..(WIDTH * HEIGHT) as usize {
        let t = tiles
            .iter()
            .find(|(i, _)| *i == tile)
            .map_or(default, |(_, t)| *t);
        map.apply(&Packet::TileInfo(tile_info(tile, KnownState::KnownSeen, t)));
    }
    map
}

fn with_extras(map: &mut ClientMap, tile: TileIndex, extras: &[u8], owner: Option<PlayerId>) {
    let mut set = ExtraSet::EMPTY;
    for e in extras {
        set.insert(*e);
    }
    let mut info = tile_info(tile, KnownState::KnownSeen, map.terrain(tile).unwrap());
    info.extras = set;
    info.extras_owner = owner;
    info.owner = owner;
    map.apply(&Packet::TileInfo(info));
}

fn sprites_of(
    tileset: &Tileset,
    kind: LayerKind,
    ctx: &DrawContext,
    view: &dyn MapView,
) -> Vec<SpriteId> {
    tileset
        .fill_sprite_array(kind, ctx, view)
        .into_iter()
        .map(|d| d.sprite)
        .collect()
}

fn tag(tileset: &Tileset, tag: &str) -> SpriteId {
    tileset
        .sprites()
        .lookup(tag)
        .unwrap_or_else(|| panic!("no sprite {tag}"))
}

// =============================================================================
// 1. Loading
// =============================================================================

mod loading {
    use super::*;

    #[test]
    fn test_builtin_has_every_layer_in_default_order() {
        let tileset = trident();
        let kinds: Vec<LayerKind> = tileset.layers().iter().map(|l| l.kind()).collect();
        assert_eq!(kinds, LayerKind::ALL.to_vec());
        assert!(tileset.sprites().duplicate_tags().is_empty());
    }

    #[test]
    fn test_old_tilespec_is_too_old() {
        let text = builtin_tilespec().replace(TILESPEC_CAPSTR, "+Freeciv-tilespec-Devel-2015-Mar-25");
        match load(&with_tilespec(text)) {
            Err(TilesetError::Capability {
                source: CapabilityError::TooOld { missing },
                ..
            }) => assert_eq!(missing, "+Freeciv-tilespec-Devel-2019-Jul-03"),
            other => panic!("expected TooOld, got {other:?}"),
        }
    }

    #[test]
    fn test_newer_tilespec_is_unsupported() {
        let text = builtin_tilespec().replace(
            TILESPEC_CAPSTR,
            &format!("{TILESPEC_CAPSTR} +hex_corners"),
        );
        assert!(matches!(
            load(&with_tilespec(text)),
            Err(TilesetError::Capability {
                source: CapabilityError::Unsupported { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_spec_file_capability_is_checked() {
        let source = MemorySource::builtin().with_file(
            "trident/units.spec",
            freeciv_tileset::builtin::files()
                .into_iter()
                .find(|(p, _)| p == "trident/units.spec")
                .unwrap()
                .1
                .replace(SPEC_CAPSTR, "+Freeciv-spec-Devel-2011-Oct-01"),
        );
        match load(&source) {
            Err(TilesetError::Capability { file, .. }) => assert_eq!(file, "trident/units.spec"),
            other => panic!("expected a capability error, got {other:?}"),
        }
    }

    #[test]
    fn test_hex_tilesets_are_rejected() {
        let hex = builtin_tilespec().replace("type = \"overhead\"", "type = \"hexagonal\"");
        assert!(matches!(
            load(&with_tilespec(hex)),
            Err(TilesetError::HexUnsupported)
        ));

        let flagged = builtin_tilespec().replace("name = \"Trident\"", "name = \"Trident\"\nis_hex = TRUE");
        assert!(matches!(
            load(&with_tilespec(flagged)),
            Err(TilesetError::HexUnsupported)
        ));
    }

    #[test]
    fn test_unknown_terrain_tag_is_fatal() {
        let text = builtin_tilespec().replace("tag = \"tundra\"", "tag = \"permafrost\"");
        assert!(matches!(
            load(&with_tilespec(text)),
            Err(TilesetError::Fatal(_))
        ));
    }

    #[test]
    fn test_partial_layer_order_is_completed() {
        let text = builtin_tilespec().replace(
            "name = \"Trident\"",
            "name = \"Trident\"\nlayer_order = \"Terrain1\", \"Background\"",
        );
        let tileset = load(&with_tilespec(text)).unwrap();
        assert_eq!(tileset.layers().len(), LayerKind::COUNT);
        assert_eq!(tileset.layers()[0].kind(), LayerKind::Terrain1);
        assert_eq!(tileset.layers()[1].kind(), LayerKind::Background);
    }

    #[test]
    fn test_duplicate_tag_last_file_wins() {
        let dup = format!(
            "[spec]\noptions = \"+Freeciv-spec-Devel-2019-Jul-03\"\n\n[file]\ngfx = \"dup\"\n\n\
             [grid_main]\ndx = 30\ndy = 30\ntiles = {{ \"row\", \"column\", \"tag\"\n  0, 0, \"u.warriors\"\n}}\n"
        );
        let text = builtin_tilespec().replace(
            "\"trident/cities.spec\"",
            "\"trident/cities.spec\", \"dup.spec\"",
        );
        let source = with_tilespec(text).with_file("dup.spec", dup);
        let tileset = load(&source).unwrap();

        assert_eq!(tileset.sprites().duplicate_tags(), ["u.warriors".to_string()]);
        let warriors = Ruleset::classic().unit_type_by_name("Warriors").unwrap();
        let sprite = tileset.get_unit_sprite(warriors).unwrap();
        assert!(matches!(
            tileset.sprite(sprite),
            Some(Sprite::Region { file, .. }) if file == "dup"
        ));
    }
}

// =============================================================================
// 2. Terrain Matching
// =============================================================================

mod terrain_matching {
    use super::*;

    #[test]
    fn test_same_group_uses_cardinal_mask() {
        let tileset = trident();
        let map = seen_map(
            terrain("Grassland"),
            &[
                (CENTER, terrain("Ocean")),
                (idx(2, 1), terrain("Deep Ocean")),
                (idx(3, 2), terrain("Lake")),
            ],
        );
        let sprites = sprites_of(&tileset, LayerKind::Terrain1, &DrawContext::tile(CENTER), &map);
        assert_eq!(sprites, vec![tag(&tileset, "t.l0.coast_n1e1s0w0")]);
    }

    #[test]
    fn test_unknown_neighbours_match_own_terrain() {
        let tileset = trident();
        let mut map = ClientMap::new(WIDTH, HEIGHT, false);
        map.apply(&Packet::TileInfo(tile_info(
            CENTER,
            KnownState::KnownSeen,
            terrain("Ocean"),
        )));
        let sprites = sprites_of(&tileset, LayerKind::Terrain1, &DrawContext::tile(CENTER), &map);
        assert_eq!(sprites, vec![tag(&tileset, "t.l0.coast_n1e1s1w1")]);
    }

    #[test]
    fn test_single_sprite_variant_is_stable() {
        let tileset = trident();
        let map = seen_map(terrain("Grassland"), &[]);
        for tile in 0..(WIDTH * HEIGHT) as usize {
            let expected = format!("t.l0.grassland{}", variant_for_tile(tile, 2) + 1);
            let ctx = DrawContext::tile(tile);
            let first = sprites_of(&tileset, LayerKind::Terrain1, &ctx, &map);
            assert_eq!(first, vec![tag(&tileset, &expected)]);
            assert_eq!(first, sprites_of(&tileset, LayerKind::Terrain1, &ctx, &map));
        }
    }

    #[test]
    fn test_unknown_tile_draws_nothing() {
        let tileset = trident();
        let map = ClientMap::new(WIDTH, HEIGHT, false);
        assert!(tileset.render_tile(&map, CENTER).is_empty());
    }
}

// =============================================================================
// 3. Full Matching
// =============================================================================

mod full_matching {
    use super::*;

    const GROUPS: [&str; 3] = ["shallow", "deep", "land"];

    fn group_of(gfx: &str) -> &'static str {
        match gfx {
            "lake" | "coast" => "shallow",
            "floor" => "deep",
            _ => "land",
        }
    }

    /// The built-in tileset with every terrain drawn as corner cells cut
    /// from cellgroup sprites.
    fn corner_tileset() -> Tileset {
        let base = builtin_tilespec();
        let head = &base[..base.find("[layer0]").unwrap()];
        let tail = &base[base.find("[extras]").unwrap()..];

        let mut body = String::from("[layer0]\nmatch_types = \"shallow\", \"deep\", \"land\"\n\n");
        for t in &Ruleset::classic().terrains {
            let own = group_of(&t.graphic_str);
            let others: Vec<String> = GROUPS
                .iter()
                .filter(|g| **g != own)
                .map(|g| format!("\"{g}\""))
                .collect();
            body.push_str(&format!(
                "[tile_{name}]\ntag = \"{name}\"\nnum_layers = 1\n\
                 layer0_match_type = \"{own}\"\nlayer0_match_with = {with}\n\
                 layer0_sprite_type = \"corner\"\n\n",
                name = t.graphic_str,
                with = others.join(", ")
            ));
        }
        let head = head.replace(
            "\"trident/cities.spec\"",
            "\"trident/cities.spec\", \"full/cells.spec\"",
        );

        let mut cells = format!(
            "[spec]\noptions = \"{SPEC_CAPSTR}\"\n\n[file]\ngfx = \"full/cells\"\n\n\
             [grid_main]\ndx = 30\ndy = 30\ntiles = {{ \"row\", \"column\", \"tag\"\n"
        );
        for i in 0..81 {
            let g = [i % 3, (i / 3) % 3, (i / 9) % 3, i / 27].map(|n| GROUPS[n]);
            cells.push_str(&format!(
                "  {}, {}, \"t.l0.cellgroup_{}_{}_{}_{}\"\n",
                i / 9,
                i % 9,
                g[0],
                g[1],
                g[2],
                g[3]
            ));
        }
        cells.push_str("}\n");

        let source = with_tilespec(format!("{head}{body}{tail}")).with_file("full/cells.spec", cells);
        load(&source).unwrap()
    }

    fn region(tileset: &Tileset, id: SpriteId) -> (String, u32, u32, u32, u32) {
        match tileset.sprite(id) {
            Some(Sprite::Region {
                file,
                x,
                y,
                width,
                height,
            }) => (file.clone(), *x, *y, *width, *height),
            other => panic!("expected a region, got {other:?}"),
        }
    }

    #[test]
    fn test_uniform_land_cuts_one_cellgroup() {
        let tileset = corner_tileset();
        let map = seen_map(terrain("Grassland"), &[]);
        let drawn = tileset.fill_sprite_array(LayerKind::Terrain1, &DrawContext::tile(CENTER), &map);
        assert_eq!(drawn.len(), 4);

        let (_, gx, gy, _, _) = region(&tileset, tag(&tileset, "t.l0.cellgroup_land_land_land_land"));
        let crops = [(7, 15), (7, 0), (0, 7), (15, 7)];
        let offsets = [(0, 0), (15, 15), (15, 0), (0, 15)];
        for (i, piece) in drawn.iter().enumerate() {
            let (file, x, y, w, h) = region(&tileset, piece.sprite);
            assert_eq!(file, "full/cells");
            assert_eq!((x, y), (gx + crops[i].0, gy + crops[i].1));
            assert_eq!((w, h), (15, 15));
            assert_eq!((piece.offset_x, piece.offset_y), offsets[i]);
        }
    }

    #[test]
    fn test_island_north_corner_faces_water() {
        let tileset = corner_tileset();
        let map = seen_map(terrain("Ocean"), &[(CENTER, terrain("Grassland"))]);
        let drawn = tileset.fill_sprite_array(LayerKind::Terrain1, &DrawContext::tile(CENTER), &map);
        let (_, gx, gy, _, _) = region(
            &tileset,
            tag(&tileset, "t.l0.cellgroup_shallow_shallow_land_shallow"),
        );
        let (_, x, y, _, _) = region(&tileset, drawn[0].sprite);
        assert_eq!((x, y), (gx + 7, gy + 15));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_full_matching_is_deterministic(terrains in prop::collection::vec(0u8..13, 25)) {
            let tileset = corner_tileset();
            let tiles: Vec<(TileIndex, TerrainId)> = terrains.iter().copied().enumerate().collect();
            let map = seen_map(0, &tiles);
            let ctx = DrawContext::tile(CENTER);
            let first = tileset.fill_sprite_array(LayerKind::Terrain1, &ctx, &map);
            let second = tileset.fill_sprite_array(LayerKind::Terrain1, &ctx, &map);
            prop_assert_eq!(first.len(), 4);
            prop_assert_eq!(&first, &second);
            for piece in &first {
                let (file, _, _, w, h) = region(&tileset, piece.sprite);
                prop_assert_eq!(file, "full/cells".to_string());
                prop_assert_eq!((w, h), (15, 15));
            }
        }
    }
}

// =============================================================================
// 4. Extras
// =============================================================================

mod extras {
    use super::*;

    fn extra(name: &str) -> u8 {
        Ruleset::classic().extra_by_name(name).unwrap()
    }

    #[test]
    fn test_road_connects_to_neighbour() {
        let tileset = trident();
        let road = extra("Road");
        let mut map = seen_map(terrain("Grassland"), &[]);
        with_extras(&mut map, CENTER, &[road], None);
        let ctx = DrawContext::tile(CENTER);
        assert_eq!(
            sprites_of(&tileset, LayerKind::Roads, &ctx, &map),
            vec![tag(&tileset, "road.road_isolated")]
        );

        with_extras(&mut map, idx(3, 2), &[road], None);
        assert_eq!(
            sprites_of(&tileset, LayerKind::Roads, &ctx, &map),
            vec![tag(&tileset, "road.road_e")]
        );
    }

    #[test]
    fn test_river_outlet_into_ocean() {
        let tileset = trident();
        let mut map = seen_map(terrain("Grassland"), &[(idx(2, 1), terrain("Ocean"))]);
        with_extras(&mut map, CENTER, &[extra("River")], None);
        assert_eq!(
            sprites_of(&tileset, LayerKind::Water, &DrawContext::tile(CENTER), &map),
            vec![
                tag(&tileset, "road.river_s_n0e0s0w0"),
                tag(&tileset, "road.river_outlet_n")
            ]
        );
    }

    #[test]
    fn test_specials_split_across_bands() {
        let tileset = trident();
        let mut map = seen_map(terrain("Grassland"), &[]);
        with_extras(
            &mut map,
            CENTER,
            &[extra("Irrigation"), extra("Fortress")],
            None,
        );
        let ctx = DrawContext::tile(CENTER);
        assert_eq!(
            sprites_of(&tileset, LayerKind::Special1, &ctx, &map),
            vec![tag(&tileset, "tx.irrigation"), tag(&tileset, "base.fortress_bg")]
        );
        assert!(sprites_of(&tileset, LayerKind::Special2, &ctx, &map).is_empty());
        assert_eq!(
            sprites_of(&tileset, LayerKind::Special3, &ctx, &map),
            vec![tag(&tileset, "base.fortress_fg")]
        );
    }

    #[test]
    fn test_base_flag_needs_owner_colour() {
        let mut tileset = trident();
        let mut map = seen_map(terrain("Grassland"), &[]);
        with_extras(&mut map, CENTER, &[extra("Fortress")], Some(0));
        let ctx = DrawContext::tile(CENTER);
        assert!(sprites_of(&tileset, LayerKind::BaseFlags, &ctx, &map).is_empty());

        tileset.initialize_player(0, Rgb::new(0, 0, 200));
        let flags = sprites_of(&tileset, LayerKind::BaseFlags, &ctx, &map);
        assert_eq!(flags.len(), 1);
        assert!(matches!(
            tileset.sprite(flags[0]),
            Some(Sprite::Solid { color, .. }) if *color == Rgb::new(0, 0, 200)
        ));
    }

    #[test]
    fn test_specials_option_hides_them() {
        let mut tileset = trident();
        let mut map = seen_map(terrain("Grassland"), &[]);
        with_extras(&mut map, CENTER, &[extra("Mine")], None);
        let ctx = DrawContext::tile(CENTER);
        assert_eq!(
            sprites_of(&tileset, LayerKind::Special2, &ctx, &map),
            vec![tag(&tileset, "tx.mine")]
        );
        tileset.set_options(TilesetOptions {
            draw_specials: false,
            ..TilesetOptions::default()
        });
        assert!(sprites_of(&tileset, LayerKind::Special2, &ctx, &map).is_empty());
    }
}

// =============================================================================
// 5. Units and Cities
// =============================================================================

mod units_and_cities {
    use super::*;

    fn place_units(map: &mut ClientMap) {
        let warriors = Ruleset::classic().unit_type_by_name("Warriors").unwrap();
        map.apply(&Packet::UnitInfo(UnitInfo {
            id: 1,
            owner: 0,
            nationality: 0,
            tile: CENTER,
            utype: warriors,
            hp: 10,
            veteran: 1,
            moves_left: 3,
            fuel: 0,
            activity: ActivityType::Fortified,
            activity_target: None,
            transported_by: None,
            has_orders: false,
            done_moving: false,
        }));
        map.apply(&Packet::UnitShortInfo(UnitShortInfo {
            id: 2,
            owner: 1,
            tile: CENTER,
            utype: warriors,
            hp: 5,
            veteran: 0,
            activity: ActivityType::Idle,
            transported: false,
        }));
    }

    #[test]
    fn test_top_unit_with_decorations() {
        let tileset = trident();
        let mut map = seen_map(terrain("Grassland"), &[]);
        place_units(&mut map);
        let ctx = DrawContext::tile(CENTER);
        assert_eq!(
            sprites_of(&tileset, LayerKind::Unit, &ctx, &map),
            vec![
                tag(&tileset, "u.warriors"),
                tag(&tileset, "unit.fortified"),
                tag(&tileset, "unit.vet_1"),
                tag(&tileset, "unit.hp_100"),
                tag(&tileset, "unit.stack"),
            ]
        );
        assert!(sprites_of(&tileset, LayerKind::FocusUnit, &ctx, &map).is_empty());
    }

    #[test]
    fn test_focus_unit_moves_to_focus_band() {
        let tileset = trident();
        let mut map = seen_map(terrain("Grassland"), &[]);
        place_units(&mut map);
        map.set_focus(Some(2));
        let ctx = DrawContext::tile(CENTER);
        assert!(sprites_of(&tileset, LayerKind::Unit, &ctx, &map).is_empty());
        assert_eq!(
            sprites_of(&tileset, LayerKind::FocusUnit, &ctx, &map),
            vec![
                tag(&tileset, "u.warriors"),
                tag(&tileset, "unit.hp_50"),
                tag(&tileset, "unit.stack"),
                tag(&tileset, "unit.select0"),
            ]
        );
    }

    #[test]
    fn test_unit_type_without_unit() {
        let tileset = trident();
        let map = ClientMap::new(WIDTH, HEIGHT, false);
        let settlers = Ruleset::classic().unit_type_by_name("Settlers").unwrap();
        assert_eq!(
            sprites_of(&tileset, LayerKind::Unit, &DrawContext::unit_type(settlers), &map),
            vec![tag(&tileset, "u.settlers")]
        );
    }

    #[test]
    fn test_city_building_and_size() {
        let tileset = trident();
        let mut map = seen_map(terrain("Grassland"), &[]);
        let city = CityInfo {
            id: 7,
            owner: 0,
            tile: CENTER,
            name: "Roma".to_string(),
            size: 15,
            walls: true,
            occupied: false,
        };
        map.apply(&Packet::CityInfo(city.clone()));
        let ctx = DrawContext::tile(CENTER);
        assert_eq!(
            sprites_of(&tileset, LayerKind::City1, &ctx, &map),
            vec![
                tag(&tileset, "city.european_city_12"),
                tag(&tileset, "city.european_wall_0"),
            ]
        );
        assert_eq!(
            sprites_of(&tileset, LayerKind::City2, &ctx, &map),
            vec![tag(&tileset, "city.size_10"), tag(&tileset, "city.size_5")]
        );
        assert_eq!(
            tileset.get_city_sprite(&city),
            Some(tag(&tileset, "city.european_city_12"))
        );
    }

    #[test]
    fn test_attention_crosshair() {
        let tileset = trident();
        let mut map = seen_map(terrain("Grassland"), &[]);
        let ctx = DrawContext::tile(CENTER);
        assert!(sprites_of(&tileset, LayerKind::Overlays, &ctx, &map).is_empty());
        map.set_attention(CENTER, true);
        assert_eq!(
            sprites_of(&tileset, LayerKind::Overlays, &ctx, &map),
            vec![tag(&tileset, "user.attention")]
        );
    }
}

// =============================================================================
// 6. Fog, Darkness and Borders
// =============================================================================

mod fog_and_borders {
    use super::*;

    #[test]
    fn test_fogged_tile_gets_fog_sprite() {
        let tileset = trident();
        let mut map = ClientMap::new(WIDTH, HEIGHT, false);
        map.apply(&Packet::TileInfo(tile_info(
            CENTER,
            KnownState::KnownUnseen,
            terrain("Plains"),
        )));
        let ctx = DrawContext::tile(CENTER);
        assert_eq!(
            sprites_of(&tileset, LayerKind::Fog, &ctx, &map),
            vec![tag(&tileset, "tx.fog")]
        );

        map.apply(&Packet::TileInfo(tile_info(
            CENTER,
            KnownState::KnownSeen,
            terrain("Plains"),
        )));
        assert!(sprites_of(&tileset, LayerKind::Fog, &ctx, &map).is_empty());
    }

    #[test]
    fn test_darkness_towards_unknown() {
        let tileset = trident();
        let mut map = seen_map(terrain("Plains"), &[]);
        map.apply(&Packet::TileInfo(TileInfo {
            terrain: None,
            ..tile_info(idx(2, 1), KnownState::Unknown, 0)
        }));
        assert_eq!(
            sprites_of(&tileset, LayerKind::Darkness, &DrawContext::tile(CENTER), &map),
            vec![tag(&tileset, "tx.darkness_n")]
        );
        assert_eq!(tileset.get_darkness_sprite(0), Some(tag(&tileset, "tx.darkness_n")));
    }

    #[test]
    fn test_border_between_owners() {
        let mut tileset = trident();
        tileset.initialize_player(0, Rgb::new(255, 0, 0));
        let mut map = seen_map(terrain("Plains"), &[]);
        with_extras(&mut map, CENTER, &[], Some(0));
        let north = DrawContext::edge(Edge::north_of(&map, CENTER));

        assert!(sprites_of(&tileset, LayerKind::Grid1, &north, &map).is_empty());
        let borders = sprites_of(&tileset, LayerKind::Grid2, &north, &map);
        assert_eq!(borders.len(), 1);
        assert!(matches!(
            tileset.sprite(borders[0]),
            Some(Sprite::Solid { width: 30, .. })
        ));

        tileset.set_options(TilesetOptions {
            draw_map_grid: true,
            ..TilesetOptions::default()
        });
        let drawn = sprites_of(&tileset, LayerKind::Grid2, &north, &map);
        assert_eq!(drawn[0], tag(&tileset, "grid.main.ns"));
        assert_eq!(drawn.len(), 2);
    }

    #[test]
    fn test_background_when_terrain_hidden() {
        let mut tileset = trident();
        let map = seen_map(terrain("Plains"), &[]);
        let ctx = DrawContext::tile(CENTER);
        assert!(sprites_of(&tileset, LayerKind::Background, &ctx, &map).is_empty());
        tileset.set_options(TilesetOptions {
            draw_terrain: false,
            ..TilesetOptions::default()
        });
        assert_eq!(sprites_of(&tileset, LayerKind::Background, &ctx, &map).len(), 1);
        assert!(sprites_of(&tileset, LayerKind::Terrain1, &ctx, &map).is_empty());
    }
}

// =============================================================================
// 7. Engine to Client
// =============================================================================

mod engine_to_client {
    use super::*;

    #[test]
    fn test_render_what_the_engine_reveals() {
        let ruleset = Ruleset::classic();
        let grass = ruleset.terrain_by_name("Grassland").unwrap();
        let warriors = ruleset.unit_type_by_name("Warriors").unwrap();
        let map = Map::filled(16, 12, false, grass);
        let mut world = World::new(ruleset, GameSettings::new(), map).unwrap();
        let player = world.add_player("Romans").unwrap();
        let home = 5 * 16 + 5;
        world.create_unit(player, warriors, home, 0).unwrap();

        let packets = world.players[player as usize].connection.take_packets();
        let mut client = ClientMap::new(16, 12, false);
        client.apply_all(&packets);

        let tileset = trident();
        let drawn: Vec<SpriteId> = tileset
            .render_tile(&client, home)
            .into_iter()
            .map(|d| d.sprite)
            .collect();
        assert!(drawn.contains(&tileset.get_unit_sprite(warriors).unwrap()));
        assert!(drawn.iter().any(|s| {
            *s == tag(&tileset, "t.l0.grassland1") || *s == tag(&tileset, "t.l0.grassland2")
        }));

        let far = 11 * 16 + 15;
        assert_eq!(client.known(far), KnownState::Unknown);
        assert!(tileset.render_tile(&client, far).is_empty());
    }
}
