//! Map grid and national borders, drawn along tile edges.

use super::{set_indexed, DrawContext, DrawnSprite, EdgeKind, Geometry, LayerKind};
use crate::sprite::{Rgb, SpriteId, SpriteStore};
use crate::tileset::TilesetOptions;
use crate::view::MapView;
use freeciv_core::{KnownState, PlayerId};

/// Pixel width of a border line.
const BORDER_WIDTH: u32 = 2;

/// Grid line sprites, indexed by [`EdgeKind::index`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridSprites {
    pub main: [Option<SpriteId>; 2],
}

impl GridSprites {
    pub fn load(sprites: &SpriteStore) -> Self {
        Self {
            main: [
                sprites.lookup(&format!("grid.main.{}", EdgeKind::NorthSouth.tag())),
                sprites.lookup(&format!("grid.main.{}", EdgeKind::WestEast.tag())),
            ],
        }
    }
}

/// Grid lines and borders. Isometric tilesets draw them on the first
/// band, overhead ones on the second.
#[derive(Clone, Debug)]
pub struct GridLayer {
    number: usize,
    geometry: Geometry,
    sprites: GridSprites,
    /// Border lines per player, indexed by [`EdgeKind::index`].
    borders: Vec<Option<[SpriteId; 2]>>,
}

impl GridLayer {
    /// `number` is 1 or 2.
    pub fn new(number: usize, geometry: Geometry, sprites: GridSprites) -> Self {
        Self {
            number,
            geometry,
            sprites,
            borders: Vec::new(),
        }
    }

    pub fn kind(&self) -> LayerKind {
        if self.number == 1 {
            LayerKind::Grid1
        } else {
            LayerKind::Grid2
        }
    }

    fn active(&self) -> bool {
        (self.number == 1) == self.geometry.isometric
    }

    pub fn initialize_player(&mut self, player: PlayerId, color: Rgb, sprites: &mut SpriteStore) {
        let ns = sprites.solid(color, self.geometry.tile_width, BORDER_WIDTH);
        let we = sprites.solid(color, BORDER_WIDTH, self.geometry.tile_height);
        set_indexed(&mut self.borders, player as usize, Some([ns, we]));
    }

    fn border(&self, player: PlayerId, kind: EdgeKind) -> Option<SpriteId> {
        self.borders
            .get(player as usize)
            .copied()
            .flatten()
            .map(|b| b[kind.index()])
    }

    pub fn fill_sprite_array(
        &self,
        ctx: &DrawContext,
        view: &dyn MapView,
        options: &TilesetOptions,
    ) -> Vec<DrawnSprite> {
        let mut out = Vec::new();
        let Some(edge) = ctx.edge else {
            return out;
        };
        if !self.active() {
            return out;
        }
        let known = edge
            .tiles
            .map(|t| t.filter(|t| view.known(*t) != KnownState::Unknown));
        if known.iter().all(Option::is_none) {
            return out;
        }

        if options.draw_map_grid {
            if let Some(line) = self.sprites.main[edge.kind.index()] {
                out.push(DrawnSprite::new(line, false));
            }
        }

        if options.draw_borders {
            let owners = known.map(|t| t.and_then(|t| view.owner(t)));
            if owners[0] != owners[1] {
                for owner in owners.into_iter().flatten() {
                    if let Some(line) = self.border(owner, edge.kind) {
                        out.push(DrawnSprite::new(line, false));
                    }
                }
            }
        }
        out
    }
}
