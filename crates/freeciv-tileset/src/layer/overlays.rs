//! Markers drawn over everything else on a tile.

use super::{DrawContext, DrawnSprite};
use crate::sprite::SpriteId;
use crate::view::MapView;

#[derive(Clone, Debug)]
pub struct OverlaysLayer {
    attention: Option<SpriteId>,
}

impl OverlaysLayer {
    pub fn new(attention: Option<SpriteId>) -> Self {
        Self { attention }
    }

    pub fn fill_sprite_array(&self, ctx: &DrawContext, view: &dyn MapView) -> Vec<DrawnSprite> {
        match (ctx.tile, self.attention) {
            (Some(tile), Some(crosshair)) if view.has_attention(tile) => {
                vec![DrawnSprite::new(crosshair, false)]
            }
            _ => Vec::new(),
        }
    }
}
