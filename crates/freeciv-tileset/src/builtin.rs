//! The built-in "trident" tileset: a 30x30 overhead tileset covering the
//! classic ruleset, generated as tileset files.

use crate::capability::{SPEC_CAPSTR, TILESPEC_CAPSTR};
use crate::layer::terrain::cardinal_index_str;
use freeciv_core::Direction8;
use std::fmt::Write;

const TILE: u32 = 30;

/// Terrain tags drawn with one plain sprite each.
const PLAIN_TERRAINS: [(&str, &str); 12] = [
    ("lake", "ocean"),
    ("floor", "ocean"),
    ("arctic", "land"),
    ("desert", "land"),
    ("forest", "land"),
    ("grassland", "land"),
    ("hills", "land"),
    ("jungle", "land"),
    ("mountains", "land"),
    ("plains", "land"),
    ("swamp", "land"),
    ("tundra", "land"),
];

/// Extra styles by graphic tag.
const EXTRA_STYLES: [(&str, &str); 9] = [
    ("tx.irrigation", "Single1"),
    ("tx.mine", "Single2"),
    ("road.road", "RoadAllSeparate"),
    ("road.river", "River"),
    ("base.fortress", "3Layer"),
    ("base.airbase", "3Layer"),
    ("tx.village", "Single1"),
    ("ts.fish", "Single1"),
    ("ts.oil", "Single1"),
];

const UNITS: [&str; 10] = [
    "settlers",
    "workers",
    "warriors",
    "phalanx",
    "archers",
    "horsemen",
    "legion",
    "explorer",
    "trireme",
    "submarine",
];

const UNIT_DECORATIONS: [&str; 11] = [
    "unit.fortifying",
    "unit.fortified",
    "unit.sentry",
    "unit.irrigate",
    "unit.mine",
    "unit.road",
    "unit.fortress",
    "unit.pillage",
    "unit.stack",
    "unit.select0",
    "unit.vet_1",
];

/// Every file of the tileset as `(path, contents)`.
pub fn files() -> Vec<(String, String)> {
    vec![
        ("trident.tilespec".to_string(), tilespec()),
        ("trident/tiles.spec".to_string(), tiles_spec()),
        ("trident/extras.spec".to_string(), extras_spec()),
        ("trident/units.spec".to_string(), units_spec()),
        ("trident/cities.spec".to_string(), cities_spec()),
    ]
}

fn tilespec() -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[tilespec]\n\
         options = \"{TILESPEC_CAPSTR}\"\n\
         name = \"Trident\"\n\
         type = \"overhead\"\n\
         normal_tile_width = {TILE}\n\
         normal_tile_height = {TILE}\n\
         small_tile_width = 15\n\
         small_tile_height = 20\n\
         unit_offset_x = 0\n\
         unit_offset_y = 0\n\
         city_offset_x = 0\n\
         city_offset_y = 0\n\
         fog_style = \"Sprite\"\n\
         darkness_style = \"CardinalSingle\"\n\
         city_style = \"european\"\n\
         files =\n  \"trident/tiles.spec\",\n  \"trident/extras.spec\",\n  \
         \"trident/units.spec\",\n  \"trident/cities.spec\"\n"
    );

    let _ = writeln!(out, "[layer0]\nmatch_types = \"ocean\", \"land\"\n");

    let _ = writeln!(
        out,
        "[tile_coast]\ntag = \"coast\"\nnum_layers = 1\n\
         layer0_match_type = \"ocean\"\nlayer0_match_with = \"ocean\"\n"
    );
    for (name, group) in PLAIN_TERRAINS {
        let _ = writeln!(
            out,
            "[tile_{name}]\ntag = \"{name}\"\nnum_layers = 1\nlayer0_match_type = \"{group}\"\n"
        );
    }

    out.push_str("[extras]\nstyles =\n  { \"name\", \"style\"\n");
    for (name, style) in EXTRA_STYLES {
        let _ = writeln!(out, "    \"{name}\", \"{style}\"");
    }
    out.push_str("  }\n");
    out
}

/// A spec file with one grid holding `tags`, one row of sprites per
/// inner list.
fn spec_file(gfx: &str, rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[spec]\noptions = \"{SPEC_CAPSTR}\"\n\n[file]\ngfx = \"{gfx}\"\n\n\
         [grid_main]\nx_top_left = 0\ny_top_left = 0\ndx = {TILE}\ndy = {TILE}\n\
         pixel_border = 1\n\ntiles = {{ \"row\", \"column\", \"tag\""
    );
    for (r, row) in rows.iter().enumerate() {
        for (c, tag) in row.iter().enumerate() {
            let _ = writeln!(out, "  {r}, {c}, \"{tag}\"");
        }
    }
    out.push_str("}\n");
    out
}

fn tiles_spec() -> String {
    let mut plain: Vec<String> = PLAIN_TERRAINS
        .iter()
        .map(|(name, _)| format!("t.l0.{name}1"))
        .collect();
    plain.push("t.l0.grassland2".to_string());
    let coast = (0..16)
        .map(|i| format!("t.l0.coast_{}", cardinal_index_str(i)))
        .collect();
    let mut misc: Vec<String> = Direction8::CARDINALS
        .iter()
        .map(|d| format!("tx.darkness_{}", d.short_name()))
        .collect();
    misc.extend(
        ["tx.fog", "grid.main.ns", "grid.main.we", "user.attention"]
            .iter()
            .map(|t| t.to_string()),
    );
    spec_file("trident/tiles", &[plain, coast, misc])
}

fn extras_spec() -> String {
    let mut river: Vec<String> = (0..16)
        .map(|i| format!("road.river_s_{}", cardinal_index_str(i)))
        .collect();
    river.extend(
        Direction8::CARDINALS
            .iter()
            .map(|d| format!("road.river_outlet_{}", d.short_name())),
    );
    let mut road = vec!["road.road_isolated".to_string()];
    road.extend(
        Direction8::ALL
            .iter()
            .map(|d| format!("road.road_{}", d.short_name())),
    );
    let specials = [
        "tx.irrigation",
        "tx.mine",
        "tx.village",
        "ts.fish",
        "ts.oil",
        "base.fortress_bg",
        "base.fortress_fg",
        "base.airbase_mg",
    ]
    .iter()
    .map(|t| t.to_string())
    .collect();
    spec_file("trident/extras", &[river, road, specials])
}

fn units_spec() -> String {
    let units = UNITS.iter().map(|u| format!("u.{u}")).collect();
    let decorations = UNIT_DECORATIONS.iter().map(|t| t.to_string()).collect();
    let hp = (0..=10).map(|i| format!("unit.hp_{}", i * 10)).collect();
    spec_file("trident/units", &[units, decorations, hp])
}

fn cities_spec() -> String {
    let mut city: Vec<String> = [0, 4, 8, 12, 16]
        .iter()
        .map(|size| format!("city.european_city_{size}"))
        .collect();
    city.push("city.european_wall_0".to_string());
    city.push("city.european_occupied_0".to_string());
    let ones = (0..10).map(|d| format!("city.size_{d}")).collect();
    let tens = (1..10).map(|d| format!("city.size_{d}0")).collect();
    spec_file("trident/cities", &[city, ones, tens])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secfile::SectionFile;

    #[test]
    fn test_files_parse() {
        for (path, contents) in files() {
            let file = SectionFile::parse(&path, &contents);
            assert!(file.is_ok(), "{path}: {:?}", file.err());
        }
    }

    #[test]
    fn test_tilespec_lists_every_spec_file() {
        let files = files();
        let tilespec = SectionFile::parse("trident.tilespec", &files[0].1).unwrap();
        let listed = tilespec.lookup_str_vec("tilespec", "files").unwrap();
        assert_eq!(listed.len(), files.len() - 1);
        for spec in listed {
            assert!(files.iter().any(|(path, _)| path == spec));
        }
    }

    #[test]
    fn test_coast_has_all_cardinal_tags() {
        let spec = SectionFile::parse("tiles.spec", &tiles_spec()).unwrap();
        let table = spec.lookup_table("grid_main", "tiles").unwrap();
        let coast = (0..table.rows.len())
            .filter_map(|r| table.get(r, "tag").and_then(|v| v.as_str()))
            .filter(|t| t.starts_with("t.l0.coast_"))
            .count();
        assert_eq!(coast, 16);
    }
}
