//! Darkness along the edge of the known world.

use super::terrain::cardinal_index_str;
use super::{DrawContext, DrawnSprite, Geometry};
use crate::error::TilesetError;
use crate::sprite::{SpriteId, SpriteStore};
use crate::tileset::DarknessStyle;
use crate::view::MapView;
use freeciv_core::{Direction8, KnownState, TileIndex};

#[derive(Clone, Debug)]
pub struct DarknessLayer {
    style: DarknessStyle,
    /// Indexed by cardinal direction, or by cardinal mask for the full
    /// style.
    sprites: Vec<SpriteId>,
    offsets: [(i32, i32); 4],
}

impl DarknessLayer {
    pub fn load(
        style: DarknessStyle,
        store: &mut SpriteStore,
        geometry: &Geometry,
    ) -> Result<Self, TilesetError> {
        let (w, h) = (geometry.tile_width, geometry.tile_height);
        let required = |store: &SpriteStore, tag: String| {
            store.lookup(&tag).ok_or_else(|| {
                TilesetError::Fatal(format!("Missing darkness sprite for tag \"{tag}\"."))
            })
        };
        let mut offsets = [(0, 0); 4];
        let sprites = match style {
            DarknessStyle::None | DarknessStyle::Corner => Vec::new(),
            DarknessStyle::IsoRect => {
                let darkness = required(store, "t.darkness".to_string())?;
                let corners = [(w / 2, 0), (w / 2, h / 2), (0, h / 2), (0, 0)];
                let mut pieces = Vec::with_capacity(4);
                for (i, (x, y)) in corners.into_iter().enumerate() {
                    let piece = store.crop(darkness, x, y, w / 2, h / 2).ok_or_else(|| {
                        TilesetError::Fatal("Darkness sprite is smaller than a tile.".to_string())
                    })?;
                    pieces.push(piece);
                    offsets[i] = (x as i32, y as i32);
                }
                pieces
            }
            DarknessStyle::CardinalSingle => {
                let mut pieces = Vec::with_capacity(4);
                for dir in Direction8::CARDINALS {
                    pieces.push(required(store, format!("tx.darkness_{}", dir.short_name()))?);
                }
                pieces
            }
            DarknessStyle::CardinalFull => {
                let mut pieces = Vec::with_capacity(16);
                for index in 0..16 {
                    pieces.push(required(
                        store,
                        format!("tx.darkness_{}", cardinal_index_str(index)),
                    )?);
                }
                pieces
            }
        };
        Ok(Self {
            style,
            sprites,
            offsets,
        })
    }

    pub fn style(&self) -> DarknessStyle {
        self.style
    }

    pub fn sprite(&self, index: usize) -> Option<SpriteId> {
        self.sprites.get(index).copied()
    }

    pub fn fill_sprite_array(&self, ctx: &DrawContext, view: &dyn MapView) -> Vec<DrawnSprite> {
        let mut out = Vec::new();
        let Some(tile) = ctx.tile else {
            return out;
        };
        if view.known(tile) == KnownState::Unknown {
            return out;
        }
        let unknown = |dir: Direction8| is_unknown(view, view.mapstep(tile, dir));

        match self.style {
            DarknessStyle::None | DarknessStyle::Corner => {}
            DarknessStyle::IsoRect | DarknessStyle::CardinalSingle => {
                for (i, dir) in Direction8::CARDINALS.into_iter().enumerate() {
                    if unknown(dir) {
                        let (x, y) = self.offsets[i];
                        out.push(DrawnSprite::at(self.sprites[i], x, y, false));
                    }
                }
            }
            DarknessStyle::CardinalFull => {
                let mask = Direction8::CARDINALS
                    .into_iter()
                    .enumerate()
                    .filter(|(_, dir)| unknown(*dir))
                    .fold(0, |acc, (bit, _)| acc | (1 << bit));
                if mask != 0 {
                    out.push(DrawnSprite::new(self.sprites[mask], false));
                }
            }
        }
        out
    }
}

/// Off-map tiles count as unknown.
fn is_unknown(view: &dyn MapView, tile: Option<TileIndex>) -> bool {
    tile.map_or(true, |t| view.known(t) == KnownState::Unknown)
}
