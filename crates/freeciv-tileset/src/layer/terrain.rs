//! Terrain layers and terrain matching.
//!
//! Each `[tile_*]` section of a tilespec says how one terrain is drawn on
//! up to three terrain layers. On each layer the terrain belongs to a
//! matching group and lists the groups it reacts to. The number of groups
//! picks the match style, and the cell type picks whether the tile is one
//! sprite or four corner pieces:
//!
//! | groups | style | whole-tile tags | corner tags |
//! |--------|-------|-----------------|-------------|
//! | 0 or 1 | none | `t.l0.grassland1`, `2`, ... | `t.l0.grassland_cell_u` |
//! | own twice | same | `t.l0.coast_n1e0s1w0` | `t.l0.coast_cell_u101` |
//! | 2 distinct | pair | | `t.l0.coast_cell_u_c_l_c` |
//! | more | full | | `t.l0.cellgroup_shallow_deep_land_land` |

use super::{DrawContext, DrawnSprite, Geometry, LayerKind};
use crate::error::{tileset_error, LogLevel, TilesetError};
use crate::secfile::SectionFile;
use crate::sprite::{SpriteId, SpriteStore};
use crate::tileset::TilesetOptions;
use crate::view::MapView;
use freeciv_core::{Direction8, KnownState, TerrainId, TileIndex};

/// Terrain layers a tileset may have.
pub const MAX_NUM_LAYERS: usize = 3;

/// Corner cells, in the order corner tables are laid out.
const CORNER_DIRS: [Direction8; 4] = [
    Direction8::North,
    Direction8::South,
    Direction8::East,
    Direction8::West,
];

/// Tag letters of the corner cells, indexed like `CORNER_DIRS`.
pub const CORNER_LETTERS: [char; 4] = ['u', 'd', 'r', 'l'];

/// How many neighbouring groups a terrain reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchStyle {
    None,
    Same,
    Pair,
    Full,
}

/// Sprite granularity of a terrain layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellType {
    /// One sprite per tile.
    Whole,
    /// Four sprites per tile, one per corner.
    Corner,
}

impl CellType {
    fn parse(name: &str) -> Option<CellType> {
        match name {
            "whole" | "single" => Some(CellType::Whole),
            "corner" | "rect" => Some(CellType::Corner),
            _ => None,
        }
    }
}

/// One layer of a `[tile_*]` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagLayer {
    pub cell: CellType,
    /// The terrain's own group followed by the groups it matches against.
    pub match_index: Vec<usize>,
    pub style: MatchStyle,
    pub offset_x: i32,
    pub offset_y: i32,
}

/// How one terrain tag is drawn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerrainTag {
    /// Base of the sprite tags, such as `grassland`.
    pub name: String,
    pub layers: Vec<TagLayer>,
    /// Terrain layer after which neighbouring tiles are blended in.
    pub blend_layer: Option<usize>,
    pub is_tall: bool,
}

impl TerrainTag {
    /// Read the `[tile_*]` section `section`. `match_types[l]` are the
    /// group names declared for terrain layer `l`.
    pub fn parse(
        file: &SectionFile,
        section: &str,
        match_types: &[Vec<String>],
    ) -> Result<TerrainTag, TilesetError> {
        let name = file.lookup_str(section, "tag")?.to_string();
        let num_layers = file.lookup_int(section, "num_layers")?;
        if num_layers < 1 || num_layers as usize > MAX_NUM_LAYERS {
            return Err(TilesetError::Fatal(format!(
                "[{section}] num_layers is {num_layers}, it must be between 1 and {MAX_NUM_LAYERS}."
            )));
        }
        let num_layers = num_layers as usize;

        let mut layers = Vec::with_capacity(num_layers);
        for l in 0..num_layers {
            let types = match_types.get(l).map(Vec::as_slice).unwrap_or(&[]);
            let group = |group: &str| -> Result<usize, TilesetError> {
                types.iter().position(|t| t == group).ok_or_else(|| {
                    TilesetError::Fatal(format!(
                        "[{section}] unknown match type \"{group}\" on layer {l}."
                    ))
                })
            };

            let mut match_index = Vec::new();
            let match_type = file.lookup_str_default("", section, &format!("layer{l}_match_type"))?;
            let match_with = file.lookup_str_vec(section, &format!("layer{l}_match_with"))?;
            if !match_type.is_empty() {
                match_index.push(group(match_type)?);
                for other in match_with {
                    match_index.push(group(other)?);
                }
            } else if !match_with.is_empty() {
                return Err(TilesetError::Fatal(format!(
                    "[{section}] layer{l}_match_with needs layer{l}_match_type."
                )));
            }

            let sprite_type =
                file.lookup_str_default("whole", section, &format!("layer{l}_sprite_type"))?;
            let cell = CellType::parse(sprite_type).ok_or_else(|| {
                TilesetError::Fatal(format!(
                    "[{section}] unknown sprite type \"{sprite_type}\" on layer {l}."
                ))
            })?;
            let style = match_style_for(&match_index);
            if cell == CellType::Whole && matches!(style, MatchStyle::Pair | MatchStyle::Full) {
                return Err(TilesetError::Fatal(format!(
                    "[{section}] whole-tile sprites cannot match more than their own group."
                )));
            }

            layers.push(TagLayer {
                cell,
                match_index,
                style,
                offset_x: file.lookup_int_default(0, section, &format!("layer{l}_offset_x"))? as i32,
                offset_y: file.lookup_int_default(0, section, &format!("layer{l}_offset_y"))? as i32,
            });
        }

        let blend = file.lookup_int_default(-1, section, "blend_layer")?;
        let blend_layer = if blend < 0 {
            None
        } else if (blend as usize) < num_layers {
            Some(blend as usize)
        } else {
            tileset_error(
                LogLevel::Error,
                format!("[{section}] blend_layer {blend} is not one of its layers."),
            )?;
            None
        };

        Ok(TerrainTag {
            name,
            layers,
            blend_layer,
            is_tall: file.lookup_bool_default(false, section, "is_tall")?,
        })
    }
}

/// Match style for a layer matching `match_index`.
pub fn match_style_for(match_index: &[usize]) -> MatchStyle {
    match match_index {
        [] | [_] => MatchStyle::None,
        [own, other] if own == other => MatchStyle::Same,
        [_, _] => MatchStyle::Pair,
        _ => MatchStyle::Full,
    }
}

/// Cardinal adjacency suffix such as `n1e0s1w0` for `index`, with bits
/// N=1, E=2, S=4, W=8.
pub fn cardinal_index_str(index: usize) -> String {
    format!(
        "n{}e{}s{}w{}",
        index & 1,
        (index >> 1) & 1,
        (index >> 2) & 1,
        (index >> 3) & 1
    )
}

/// Variant of a multi-sprite terrain drawn on `tile`. Stable per tile so a
/// redraw never changes the picture.
pub fn variant_for_tile(tile: TileIndex, count: usize) -> usize {
    if count == 0 {
        0
    } else {
        ((tile.wrapping_mul(10007)) % 1009) % count
    }
}

/// Position in a full-match corner table. `positions` are the places of the
/// three neighbouring groups in the match list, counter-clockwise first.
pub fn full_cell_index(positions: [usize; 3], count: usize, corner: usize) -> usize {
    ((positions[2] * count + positions[1]) * count + positions[0]) * 4 + corner
}

/// Groups `[n, e, s, w]` of the cellgroup sprite a corner piece is cut from.
/// `this` is the tile's own group and `v` the three neighbours,
/// counter-clockwise first.
pub fn cellgroup_groups(corner: usize, this: usize, v: [usize; 3]) -> [usize; 4] {
    match corner {
        // North
        0 => [v[1], v[2], this, v[0]],
        // South
        1 => [this, v[0], v[1], v[2]],
        // East
        2 => [v[0], v[1], v[2], this],
        // West
        _ => [v[2], this, v[0], v[1]],
    }
}

#[derive(Clone, Debug)]
enum LayerSprites {
    /// Whole-tile variants picked per tile.
    Variants(Vec<SpriteId>),
    /// Whole tiles indexed by the cardinal adjacency mask.
    Cardinal(Vec<SpriteId>),
    /// Corner pieces indexed by `value * 4 + corner`.
    Cells(Vec<Option<SpriteId>>),
}

#[derive(Clone, Debug)]
struct TerrainDrawing {
    layer: TagLayer,
    sprites: LayerSprites,
}

impl TerrainDrawing {
    fn group(&self) -> Option<usize> {
        self.layer.match_index.first().copied()
    }
}

/// One of the three terrain bands.
#[derive(Clone, Debug)]
pub struct TerrainLayer {
    number: usize,
    geometry: Geometry,
    match_types: Vec<String>,
    /// Indexed by terrain.
    drawings: Vec<Option<TerrainDrawing>>,
    /// Terrains whose blend pass runs after this layer.
    blend_here: Vec<bool>,
    /// Blend pieces of each terrain, indexed N, S, E, W.
    blends: Vec<Option<[SpriteId; 4]>>,
}

impl TerrainLayer {
    pub fn new(number: usize, geometry: Geometry, match_types: Vec<String>) -> Self {
        Self {
            number,
            geometry,
            match_types,
            drawings: Vec::new(),
            blend_here: Vec::new(),
            blends: Vec::new(),
        }
    }

    pub fn kind(&self) -> LayerKind {
        match self.number {
            0 => LayerKind::Terrain1,
            1 => LayerKind::Terrain2,
            _ => LayerKind::Terrain3,
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn match_types(&self) -> &[String] {
        &self.match_types
    }

    /// Resolve the sprites of every terrain. `tags[t]` draws terrain `t`.
    pub fn initialize_terrain(
        &mut self,
        sprites: &mut SpriteStore,
        tags: &[&TerrainTag],
        blends: &[Option<[SpriteId; 4]>],
    ) -> Result<(), TilesetError> {
        let mut drawings = Vec::with_capacity(tags.len());
        let mut blend_here = Vec::with_capacity(tags.len());
        for tag in tags {
            let drawing = match tag.layers.get(self.number) {
                Some(layer) => Some(self.build_drawing(tag, layer, sprites)?),
                None => None,
            };
            drawings.push(drawing);
            blend_here.push(tag.blend_layer == Some(self.number));
        }
        self.drawings = drawings;
        self.blend_here = blend_here;
        self.blends = blends.to_vec();
        Ok(())
    }

    fn group_name(&self, group: usize) -> &str {
        self.match_types.get(group).map(String::as_str).unwrap_or("")
    }

    fn group_initial(&self, group: usize) -> char {
        self.group_name(group).chars().next().unwrap_or('?')
    }

    fn build_drawing(
        &self,
        tag: &TerrainTag,
        layer: &TagLayer,
        sprites: &mut SpriteStore,
    ) -> Result<TerrainDrawing, TilesetError> {
        let l = self.number;
        let name = &tag.name;
        let required = |sprites: &SpriteStore, key: String| {
            sprites.lookup(&key).ok_or_else(|| {
                TilesetError::Fatal(format!("Missing terrain sprite for tag \"{key}\"."))
            })
        };

        let built = match (layer.cell, layer.style) {
            (CellType::Whole, MatchStyle::None) => {
                let mut variants = Vec::new();
                while let Some(id) = sprites.lookup(&format!("t.l{l}.{name}{}", variants.len() + 1))
                {
                    variants.push(id);
                }
                if variants.is_empty() {
                    return Err(TilesetError::Fatal(format!(
                        "Missing base sprite for tag \"t.l{l}.{name}1\"."
                    )));
                }
                LayerSprites::Variants(variants)
            }
            (CellType::Whole, MatchStyle::Same) => {
                let mut table = Vec::with_capacity(16);
                for index in 0..16 {
                    table.push(required(
                        sprites,
                        format!("t.l{l}.{name}_{}", cardinal_index_str(index)),
                    )?);
                }
                LayerSprites::Cardinal(table)
            }
            (CellType::Whole, _) => {
                return Err(TilesetError::Fatal(format!(
                    "Tag \"{name}\" layer {l}: whole-tile sprites cannot match several groups."
                )));
            }
            (CellType::Corner, MatchStyle::None) => {
                let mut table = Vec::with_capacity(4);
                for letter in CORNER_LETTERS {
                    table.push(Some(required(
                        sprites,
                        format!("t.l{l}.{name}_cell_{letter}"),
                    )?));
                }
                LayerSprites::Cells(table)
            }
            (CellType::Corner, style @ (MatchStyle::Same | MatchStyle::Pair)) => {
                let mut table = Vec::with_capacity(32);
                for i in 0..32 {
                    let letter = CORNER_LETTERS[i % 4];
                    let value = i / 4;
                    let bits = [value & 1, (value >> 1) & 1, (value >> 2) & 1];
                    let key = if style == MatchStyle::Same {
                        format!("t.l{l}.{name}_cell_{letter}{}{}{}", bits[0], bits[1], bits[2])
                    } else {
                        let g = bits.map(|b| self.group_initial(layer.match_index[b]));
                        format!("t.l{l}.{name}_cell_{letter}_{}_{}_{}", g[0], g[1], g[2])
                    };
                    table.push(Some(required(sprites, key)?));
                }
                LayerSprites::Cells(table)
            }
            (CellType::Corner, MatchStyle::Full) => {
                LayerSprites::Cells(self.build_cellgroups(layer, sprites)?)
            }
        };

        Ok(TerrainDrawing {
            layer: layer.clone(),
            sprites: built,
        })
    }

    /// Cut the corner pieces of a full-match layer out of the shared
    /// cellgroup sprites.
    fn build_cellgroups(
        &self,
        layer: &TagLayer,
        sprites: &mut SpriteStore,
    ) -> Result<Vec<Option<SpriteId>>, TilesetError> {
        let l = self.number;
        let count = layer.match_index.len();
        let (w, h) = (self.geometry.tile_width, self.geometry.tile_height);
        let crop_x = [w / 4, w / 4, 0, w / 2];
        let crop_y = [h / 2, 0, h / 4, h / 4];
        let this = layer.match_index[0];

        let mut table = Vec::with_capacity(count * count * count * 4);
        for i in 0..count * count * count * 4 {
            let corner = i % 4;
            let value = i / 4;
            let v = [value % count, (value / count) % count, value / count / count]
                .map(|pos| layer.match_index[pos]);
            let [n, e, s, wst] = cellgroup_groups(corner, this, v);
            let key = format!(
                "t.l{l}.cellgroup_{}_{}_{}_{}",
                self.group_name(n),
                self.group_name(e),
                self.group_name(s),
                self.group_name(wst)
            );
            match sprites.lookup(&key) {
                Some(group) => {
                    table.push(sprites.crop(group, crop_x[corner], crop_y[corner], w / 2, h / 2));
                }
                None => {
                    tileset_error(
                        LogLevel::Error,
                        format!("Terrain graphics tag \"{key}\" is missing."),
                    )?;
                    table.push(None);
                }
            }
        }
        Ok(table)
    }

    fn drawing(&self, terrain: TerrainId) -> Option<&TerrainDrawing> {
        self.drawings.get(terrain as usize).and_then(Option::as_ref)
    }

    fn group_of(&self, terrain: TerrainId) -> Option<usize> {
        self.drawing(terrain).and_then(TerrainDrawing::group)
    }

    pub fn fill_sprite_array(
        &self,
        ctx: &DrawContext,
        view: &dyn MapView,
        options: &TilesetOptions,
    ) -> Vec<DrawnSprite> {
        let mut out = Vec::new();
        let Some(tile) = ctx.tile else {
            return out;
        };
        if !options.draw_terrain || view.known(tile) == KnownState::Unknown {
            return out;
        }
        let Some(terrain) = view.terrain(tile) else {
            return out;
        };
        let near = terrain_near(view, tile, terrain);

        if let Some(drawing) = self.drawing(terrain) {
            self.fill_terrain(&mut out, tile, drawing, &near);
        }
        if self.blend_here.get(terrain as usize).copied().unwrap_or(false) {
            self.fill_blending(&mut out, view, tile, terrain, &near);
        }
        out
    }

    fn fill_terrain(
        &self,
        out: &mut Vec<DrawnSprite>,
        tile: TileIndex,
        drawing: &TerrainDrawing,
        near: &[TerrainId; 8],
    ) {
        let layer = &drawing.layer;
        let (ox, oy) = (layer.offset_x, layer.offset_y);
        let matched = layer.match_index.get(1).copied();

        match &drawing.sprites {
            LayerSprites::Variants(variants) => {
                let sprite = variants[variant_for_tile(tile, variants.len())];
                out.push(DrawnSprite::at(sprite, ox, oy, true));
            }
            LayerSprites::Cardinal(table) => {
                let index = Direction8::CARDINALS
                    .iter()
                    .enumerate()
                    .filter(|(_, dir)| self.group_of(near[dir.index()]) == matched)
                    .fold(0, |acc, (bit, _)| acc | (1 << bit));
                out.push(DrawnSprite::at(table[index], ox, oy, true));
            }
            LayerSprites::Cells(table) => {
                let offsets = self.geometry.corner_offsets();
                for (corner, dir) in CORNER_DIRS.iter().enumerate() {
                    let diagonal = dir.ccw();
                    let around = [diagonal.ccw(), diagonal, diagonal.cw()]
                        .map(|d| self.group_of(near[d.index()]));
                    let index = match layer.style {
                        MatchStyle::None => corner,
                        MatchStyle::Same | MatchStyle::Pair => {
                            let value = around
                                .iter()
                                .enumerate()
                                .filter(|(_, g)| **g == matched)
                                .fold(0, |acc, (bit, _)| acc | (1 << bit));
                            value * 4 + corner
                        }
                        MatchStyle::Full => {
                            let positions = around.map(|g| {
                                g.and_then(|g| layer.match_index.iter().position(|m| *m == g))
                                    .unwrap_or(0)
                            });
                            full_cell_index(positions, layer.match_index.len(), corner)
                        }
                    };
                    if let Some(Some(sprite)) = table.get(index) {
                        let (x, y) = offsets[corner];
                        out.push(DrawnSprite::at(*sprite, x + ox, y + oy, true));
                    }
                }
            }
        }
    }

    fn fill_blending(
        &self,
        out: &mut Vec<DrawnSprite>,
        view: &dyn MapView,
        tile: TileIndex,
        terrain: TerrainId,
        near: &[TerrainId; 8],
    ) {
        let offsets = self.geometry.quarter_offsets();
        for (i, dir) in CORNER_DIRS.iter().enumerate() {
            let Some(adjacent) = view.mapstep(tile, *dir) else {
                continue;
            };
            if view.known(adjacent) == KnownState::Unknown {
                continue;
            }
            let other = near[dir.index()];
            if other == terrain {
                continue;
            }
            if let Some(Some(pieces)) = self.blends.get(other as usize) {
                let (x, y) = offsets[i];
                out.push(DrawnSprite::at(pieces[i], x, y, true));
            }
        }
    }
}

/// Terrain of each neighbour, indexed by direction. Unknown and off-map
/// neighbours count as the tile's own terrain.
fn terrain_near(view: &dyn MapView, tile: TileIndex, own: TerrainId) -> [TerrainId; 8] {
    let mut near = [own; 8];
    for dir in Direction8::ALL {
        near[dir.index()] = view
            .mapstep(tile, dir)
            .filter(|t| view.known(*t) != KnownState::Unknown)
            .and_then(|t| view.terrain(t))
            .unwrap_or(own);
    }
    near
}

/// Quarter pieces of a blend sprite, indexed N, S, E, W.
pub fn blend_pieces(
    sprites: &mut SpriteStore,
    blender: SpriteId,
    geometry: &Geometry,
) -> Option<[SpriteId; 4]> {
    let (w, h) = (geometry.tile_width, geometry.tile_height);
    let offsets = geometry.quarter_offsets();
    let mut pieces = [SpriteId(0); 4];
    for (piece, (x, y)) in pieces.iter_mut().zip(offsets) {
        *piece = sprites.crop(blender, x as u32, y as u32, w / 2, h / 2)?;
    }
    Some(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // Match Styles
    // ==========================================================================

    #[test]
    fn test_match_style_from_group_count() {
        assert_eq!(match_style_for(&[]), MatchStyle::None);
        assert_eq!(match_style_for(&[2]), MatchStyle::None);
        assert_eq!(match_style_for(&[1, 1]), MatchStyle::Same);
        assert_eq!(match_style_for(&[1, 0]), MatchStyle::Pair);
        assert_eq!(match_style_for(&[0, 1, 2]), MatchStyle::Full);
    }

    #[test]
    fn test_cardinal_index_str() {
        assert_eq!(cardinal_index_str(0), "n0e0s0w0");
        assert_eq!(cardinal_index_str(0b0011), "n1e1s0w0");
        assert_eq!(cardinal_index_str(15), "n1e1s1w1");
    }

    #[test]
    fn test_variant_is_stable_and_in_range() {
        for tile in 0..500 {
            let v = variant_for_tile(tile, 3);
            assert!(v < 3);
            assert_eq!(v, variant_for_tile(tile, 3));
        }
        assert_eq!(variant_for_tile(1, 3), (10007 % 1009) % 3);
        assert_eq!(variant_for_tile(7, 0), 0);
    }

    // ==========================================================================
    // Full Matching
    // ==========================================================================

    #[test]
    fn test_full_cell_index_layout() {
        assert_eq!(full_cell_index([0, 0, 0], 3, 2), 2);
        assert_eq!(full_cell_index([1, 0, 0], 3, 0), 4);
        assert_eq!(full_cell_index([0, 1, 0], 3, 0), 12);
        assert_eq!(full_cell_index([2, 2, 2], 3, 3), 26 * 4 + 3);
    }

    #[test]
    fn test_cellgroup_groups_place_own_group_opposite_corner() {
        // The north corner piece is the south quarter of its cellgroup.
        assert_eq!(cellgroup_groups(0, 9, [1, 2, 3]), [2, 3, 9, 1]);
        assert_eq!(cellgroup_groups(1, 9, [1, 2, 3]), [9, 1, 2, 3]);
        assert_eq!(cellgroup_groups(2, 9, [1, 2, 3]), [1, 2, 3, 9]);
        assert_eq!(cellgroup_groups(3, 9, [1, 2, 3]), [3, 9, 1, 2]);
    }

    // ==========================================================================
    // Tile Sections
    // ==========================================================================

    fn match_types() -> Vec<Vec<String>> {
        vec![vec!["shallow".to_string(), "deep".to_string(), "land".to_string()]]
    }

    #[test]
    fn test_parse_tag_with_matching() {
        let file = SectionFile::parse(
            "test.tilespec",
            "[tile_coast]\ntag = \"coast\"\nnum_layers = 1\n\
             layer0_match_type = \"shallow\"\nlayer0_match_with = \"deep\", \"land\"\n\
             layer0_sprite_type = \"corner\"\n",
        )
        .unwrap();
        let tag = TerrainTag::parse(&file, "tile_coast", &match_types()).unwrap();
        assert_eq!(tag.name, "coast");
        assert_eq!(tag.layers[0].match_index, vec![0, 1, 2]);
        assert_eq!(tag.layers[0].style, MatchStyle::Full);
        assert_eq!(tag.layers[0].cell, CellType::Corner);
        assert_eq!(tag.blend_layer, None);
    }

    #[test]
    fn test_parse_rejects_whole_pair() {
        let file = SectionFile::parse(
            "test.tilespec",
            "[tile_coast]\ntag = \"coast\"\nnum_layers = 1\n\
             layer0_match_type = \"shallow\"\nlayer0_match_with = \"deep\"\n",
        )
        .unwrap();
        assert!(matches!(
            TerrainTag::parse(&file, "tile_coast", &match_types()),
            Err(TilesetError::Fatal(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_group() {
        let file = SectionFile::parse(
            "test.tilespec",
            "[tile_hills]\ntag = \"hills\"\nnum_layers = 1\nlayer0_match_type = \"rock\"\n",
        )
        .unwrap();
        assert!(TerrainTag::parse(&file, "tile_hills", &match_types()).is_err());
    }
}
