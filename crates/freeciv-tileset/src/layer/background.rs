//! Plain backgrounds shown when terrain drawing is off.

use super::{set_indexed, DrawContext, DrawnSprite};
use crate::sprite::{Rgb, SpriteId, SpriteStore};
use crate::tileset::TilesetOptions;
use crate::view::MapView;
use freeciv_core::{KnownState, PlayerId};

#[derive(Clone, Debug)]
pub struct BackgroundLayer {
    tile_size: (u32, u32),
    /// Background of unowned tiles.
    blank: SpriteId,
    players: Vec<Option<SpriteId>>,
}

impl BackgroundLayer {
    pub fn new(tile_size: (u32, u32), sprites: &mut SpriteStore) -> Self {
        Self {
            tile_size,
            blank: sprites.solid(Rgb::BLACK, tile_size.0, tile_size.1),
            players: Vec::new(),
        }
    }

    pub fn initialize_player(&mut self, player: PlayerId, color: Rgb, sprites: &mut SpriteStore) {
        let solid = sprites.solid(color, self.tile_size.0, self.tile_size.1);
        set_indexed(&mut self.players, player as usize, Some(solid));
    }

    pub fn fill_sprite_array(
        &self,
        ctx: &DrawContext,
        view: &dyn MapView,
        options: &TilesetOptions,
    ) -> Vec<DrawnSprite> {
        let Some(tile) = ctx.tile else {
            return Vec::new();
        };
        if options.draw_terrain || view.known(tile) == KnownState::Unknown {
            return Vec::new();
        }
        let sprite = view
            .owner(tile)
            .and_then(|p| self.players.get(p as usize).copied().flatten())
            .unwrap_or(self.blank);
        vec![DrawnSprite::new(sprite, true)]
    }
}
