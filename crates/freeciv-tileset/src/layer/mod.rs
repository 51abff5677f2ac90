//! Sprite layers.
//!
//! A tileset draws a tile by asking each of its layers, in z-order, for the
//! sprites that belong to a [`DrawContext`] and concatenating the answers.
//! Layers never look at each other's output.

pub mod background;
pub mod city;
pub mod darkness;
pub mod fog;
pub mod grid;
pub mod overlays;
pub mod special;
pub mod terrain;
pub mod units;

use crate::error::TilesetError;
use crate::sprite::{Rgb, SpriteId, SpriteStore};
use crate::tileset::TilesetOptions;
use crate::view::MapView;
use freeciv_core::{CityId, Direction8, ExtraId, PlayerId, Ruleset, TileIndex, UnitId, UnitTypeId};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use background::BackgroundLayer;
pub use city::CityLayer;
pub use darkness::DarknessLayer;
pub use fog::FogLayer;
pub use grid::GridLayer;
pub use overlays::OverlaysLayer;
pub use special::{
    BaseFlagsLayer, ExtraGraphics, ExtraSprites, ExtraStyle, RoadsLayer, SpecialLayer, WaterLayer,
};
pub use terrain::{TerrainLayer, TerrainTag};
pub use units::{UnitDecorations, UnitSprites, UnitsLayer};

/// Drawing bands, in their default z-order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerKind {
    Background,
    Terrain1,
    Darkness,
    Terrain2,
    Terrain3,
    Water,
    Roads,
    Special1,
    Grid1,
    City1,
    Special2,
    Fog,
    Unit,
    Special3,
    BaseFlags,
    City2,
    Grid2,
    Overlays,
    TileLabel,
    FocusUnit,
    Goto,
    WorkerTask,
    Editor,
    Infrawork,
}

impl LayerKind {
    pub const COUNT: usize = 24;

    /// Every kind in default z-order.
    pub const ALL: [LayerKind; LayerKind::COUNT] = [
        LayerKind::Background,
        LayerKind::Terrain1,
        LayerKind::Darkness,
        LayerKind::Terrain2,
        LayerKind::Terrain3,
        LayerKind::Water,
        LayerKind::Roads,
        LayerKind::Special1,
        LayerKind::Grid1,
        LayerKind::City1,
        LayerKind::Special2,
        LayerKind::Fog,
        LayerKind::Unit,
        LayerKind::Special3,
        LayerKind::BaseFlags,
        LayerKind::City2,
        LayerKind::Grid2,
        LayerKind::Overlays,
        LayerKind::TileLabel,
        LayerKind::FocusUnit,
        LayerKind::Goto,
        LayerKind::WorkerTask,
        LayerKind::Editor,
        LayerKind::Infrawork,
    ];

    /// Name used in `layer_order`.
    pub const fn name(self) -> &'static str {
        match self {
            LayerKind::Background => "Background",
            LayerKind::Terrain1 => "Terrain1",
            LayerKind::Darkness => "Darkness",
            LayerKind::Terrain2 => "Terrain2",
            LayerKind::Terrain3 => "Terrain3",
            LayerKind::Water => "Water",
            LayerKind::Roads => "Roads",
            LayerKind::Special1 => "Special1",
            LayerKind::Grid1 => "Grid1",
            LayerKind::City1 => "City1",
            LayerKind::Special2 => "Special2",
            LayerKind::Fog => "Fog",
            LayerKind::Unit => "Unit",
            LayerKind::Special3 => "Special3",
            LayerKind::BaseFlags => "BaseFlags",
            LayerKind::City2 => "City2",
            LayerKind::Grid2 => "Grid2",
            LayerKind::Overlays => "Overlays",
            LayerKind::TileLabel => "TileLabel",
            LayerKind::FocusUnit => "FocusUnit",
            LayerKind::Goto => "Goto",
            LayerKind::WorkerTask => "WorkerTask",
            LayerKind::Editor => "Editor",
            LayerKind::Infrawork => "Infrawork",
        }
    }

    pub fn from_name(name: &str) -> Option<LayerKind> {
        LayerKind::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pixel size and projection of a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub tile_width: u32,
    pub tile_height: u32,
    pub isometric: bool,
}

impl Geometry {
    /// Offsets of the four corner cells of a tile, indexed N, S, E, W.
    pub fn corner_offsets(&self) -> [(i32, i32); 4] {
        let (w, h) = (self.tile_width as i32, self.tile_height as i32);
        if self.isometric {
            [(w / 4, 0), (w / 4, h / 2), (w / 2, h / 4), (0, h / 4)]
        } else {
            [(0, 0), (w / 2, h / 2), (w / 2, 0), (0, h / 2)]
        }
    }

    /// Offsets of the four quarter pieces used for blending and darkness,
    /// indexed N, S, E, W.
    pub fn quarter_offsets(&self) -> [(i32, i32); 4] {
        let (w, h) = (self.tile_width as i32, self.tile_height as i32);
        [(w / 2, 0), (0, h / 2), (w / 2, h / 2), (0, 0)]
    }
}

/// Which side of a tile an edge lies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Separates a tile from its northern neighbour.
    NorthSouth,
    /// Separates a tile from its western neighbour.
    WestEast,
}

impl EdgeKind {
    pub const fn tag(self) -> &'static str {
        match self {
            EdgeKind::NorthSouth => "ns",
            EdgeKind::WestEast => "we",
        }
    }

    pub const fn index(self) -> usize {
        match self {
            EdgeKind::NorthSouth => 0,
            EdgeKind::WestEast => 1,
        }
    }
}

/// The boundary between two tiles. `tiles[0]` is the northern or western
/// one; either may be off the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub kind: EdgeKind,
    pub tiles: [Option<TileIndex>; 2],
}

impl Edge {
    /// The edge along the north side of `tile`.
    pub fn north_of(view: &dyn MapView, tile: TileIndex) -> Self {
        Self {
            kind: EdgeKind::NorthSouth,
            tiles: [view.mapstep(tile, Direction8::North), Some(tile)],
        }
    }

    /// The edge along the west side of `tile`.
    pub fn west_of(view: &dyn MapView, tile: TileIndex) -> Self {
        Self {
            kind: EdgeKind::WestEast,
            tiles: [view.mapstep(tile, Direction8::West), Some(tile)],
        }
    }
}

/// The point where four tiles meet, listed clockwise from the north-west.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Corner {
    pub tiles: [Option<TileIndex>; 4],
}

impl Corner {
    /// The corner at the north-west of `tile`.
    pub fn north_west_of(view: &dyn MapView, tile: TileIndex) -> Self {
        Self {
            tiles: [
                view.mapstep(tile, Direction8::NorthWest),
                view.mapstep(tile, Direction8::North),
                Some(tile),
                view.mapstep(tile, Direction8::West),
            ],
        }
    }
}

/// What is being drawn. Each layer picks the parts it cares about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawContext {
    pub tile: Option<TileIndex>,
    pub edge: Option<Edge>,
    pub corner: Option<Corner>,
    pub unit: Option<UnitId>,
    pub city: Option<CityId>,
    pub unit_type: Option<UnitTypeId>,
}

impl DrawContext {
    pub fn tile(tile: TileIndex) -> Self {
        Self {
            tile: Some(tile),
            ..Self::default()
        }
    }

    pub fn edge(edge: Edge) -> Self {
        Self {
            edge: Some(edge),
            ..Self::default()
        }
    }

    pub fn corner(corner: Corner) -> Self {
        Self {
            corner: Some(corner),
            ..Self::default()
        }
    }

    /// A unit type on its own, as shown in dialogs.
    pub fn unit_type(unit_type: UnitTypeId) -> Self {
        Self {
            unit_type: Some(unit_type),
            ..Self::default()
        }
    }

    pub fn with_unit(mut self, unit: Option<UnitId>) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_city(mut self, city: Option<CityId>) -> Self {
        self.city = city;
        self
    }
}

/// One sprite to blit, relative to the tile origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawnSprite {
    pub sprite: SpriteId,
    pub offset_x: i32,
    pub offset_y: i32,
    /// Darkened when the tile is fogged.
    pub foggable: bool,
}

impl DrawnSprite {
    pub fn new(sprite: SpriteId, foggable: bool) -> Self {
        Self::at(sprite, 0, 0, foggable)
    }

    pub fn at(sprite: SpriteId, offset_x: i32, offset_y: i32, foggable: bool) -> Self {
        Self {
            sprite,
            offset_x,
            offset_y,
            foggable,
        }
    }
}

/// A drawing band and the tables it draws from.
#[derive(Clone, Debug)]
pub enum Layer {
    Background(BackgroundLayer),
    Darkness(DarknessLayer),
    Terrain(TerrainLayer),
    Water(WaterLayer),
    Roads(RoadsLayer),
    Special(SpecialLayer),
    BaseFlags(BaseFlagsLayer),
    City(CityLayer),
    Grid(GridLayer),
    Fog(FogLayer),
    Units(UnitsLayer),
    Overlays(OverlaysLayer),
    /// Bands drawn by the client itself, such as labels and goto lines.
    Passive(LayerKind),
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Background(_) => LayerKind::Background,
            Layer::Darkness(_) => LayerKind::Darkness,
            Layer::Terrain(l) => l.kind(),
            Layer::Water(_) => LayerKind::Water,
            Layer::Roads(_) => LayerKind::Roads,
            Layer::Special(l) => l.kind(),
            Layer::BaseFlags(_) => LayerKind::BaseFlags,
            Layer::City(l) => l.kind(),
            Layer::Grid(l) => l.kind(),
            Layer::Fog(_) => LayerKind::Fog,
            Layer::Units(l) => l.kind(),
            Layer::Overlays(_) => LayerKind::Overlays,
            Layer::Passive(kind) => *kind,
        }
    }

    /// The sprites this layer draws for `ctx`, bottom first.
    pub fn fill_sprite_array(
        &self,
        ctx: &DrawContext,
        view: &dyn MapView,
        options: &TilesetOptions,
    ) -> Vec<DrawnSprite> {
        match self {
            Layer::Background(l) => l.fill_sprite_array(ctx, view, options),
            Layer::Darkness(l) => l.fill_sprite_array(ctx, view),
            Layer::Terrain(l) => l.fill_sprite_array(ctx, view, options),
            Layer::Water(l) => l.fill_sprite_array(ctx, view, options),
            Layer::Roads(l) => l.fill_sprite_array(ctx, view, options),
            Layer::Special(l) => l.fill_sprite_array(ctx, view, options),
            Layer::BaseFlags(l) => l.fill_sprite_array(ctx, view, options),
            Layer::City(l) => l.fill_sprite_array(ctx, view, options),
            Layer::Grid(l) => l.fill_sprite_array(ctx, view, options),
            Layer::Fog(l) => l.fill_sprite_array(ctx, view, options),
            Layer::Units(l) => l.fill_sprite_array(ctx, view, options),
            Layer::Overlays(l) => l.fill_sprite_array(ctx, view),
            Layer::Passive(_) => Vec::new(),
        }
    }

    /// Build the per-terrain tables after a ruleset is loaded.
    /// `tags[t]` is the tile section drawing terrain `t`.
    pub fn initialize_terrain(
        &mut self,
        ruleset: &Ruleset,
        sprites: &mut SpriteStore,
        tags: &[&TerrainTag],
        blends: &[Option<[SpriteId; 4]>],
    ) -> Result<(), TilesetError> {
        match self {
            Layer::Terrain(l) => l.initialize_terrain(sprites, tags, blends),
            Layer::Water(l) => {
                l.initialize_terrain(ruleset);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Record the sprites of one extra type.
    pub fn setup_extra(&mut self, extra: ExtraId, sprites: &ExtraSprites) {
        match self {
            Layer::Water(l) => l.setup_extra(extra, sprites),
            Layer::Roads(l) => l.setup_extra(extra, sprites),
            Layer::Special(l) => l.setup_extra(extra, sprites),
            Layer::BaseFlags(l) => l.setup_extra(extra, sprites),
            _ => {}
        }
    }

    /// Record the sprites of one unit type.
    pub fn setup_unit_type(&mut self, utype: UnitTypeId, sprites: &UnitSprites) {
        if let Layer::Units(l) = self {
            l.setup_unit_type(utype, sprites);
        }
    }

    /// Create the sprites that depend on a player's colour.
    pub fn initialize_player(&mut self, player: PlayerId, color: Rgb, sprites: &mut SpriteStore) {
        match self {
            Layer::Background(l) => l.initialize_player(player, color, sprites),
            Layer::BaseFlags(l) => l.initialize_player(player, color, sprites),
            Layer::Grid(l) => l.initialize_player(player, color, sprites),
            Layer::Units(l) => l.initialize_player(player, color, sprites),
            _ => {}
        }
    }
}

/// Grow `table` so that `index` is valid and store `value` there.
pub(crate) fn set_indexed<T: Clone + Default>(table: &mut Vec<T>, index: usize, value: T) {
    if table.len() <= index {
        table.resize(index + 1, T::default());
    }
    table[index] = value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order_has_every_kind_once() {
        let mut seen = std::collections::BTreeSet::new();
        for kind in LayerKind::ALL {
            assert!(seen.insert(kind));
        }
        assert_eq!(seen.len(), LayerKind::COUNT);
        assert_eq!(LayerKind::ALL[0], LayerKind::Background);
        assert_eq!(LayerKind::ALL[23], LayerKind::Infrawork);
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in LayerKind::ALL {
            assert_eq!(LayerKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(LayerKind::from_name("Terrain4"), None);
    }

    #[test]
    fn test_corner_offsets() {
        let iso = Geometry {
            tile_width: 96,
            tile_height: 48,
            isometric: true,
        };
        assert_eq!(iso.corner_offsets(), [(24, 0), (24, 24), (48, 12), (0, 12)]);
        let flat = Geometry {
            isometric: false,
            ..iso
        };
        assert_eq!(flat.corner_offsets()[1], (48, 24));
    }
}
