//! Fog of war over tiles that are known but not seen.

use super::{DrawContext, DrawnSprite};
use crate::error::TilesetError;
use crate::sprite::{SpriteId, SpriteStore};
use crate::tileset::{DarknessStyle, FogStyle, TilesetOptions};
use crate::view::MapView;
use freeciv_core::KnownState;

/// Letters of the knowledge states in corner fog tags.
const FOG_LETTERS: [char; 3] = ['u', 'f', 'k'];

/// Combinations of four corner tiles in three states.
pub const NUM_CORNER_FOG: usize = 81;

/// Tag of the corner fog sprite at `index`, such as `t.fog_u_f_k_k`.
pub fn corner_fog_tag(index: usize) -> String {
    let mut tag = String::from("t.fog");
    let mut rest = index;
    for _ in 0..4 {
        tag.push('_');
        tag.push(FOG_LETTERS[rest % 3]);
        rest /= 3;
    }
    tag
}

fn corner_value(known: Option<KnownState>) -> usize {
    match known {
        Some(KnownState::Unknown) => 0,
        None | Some(KnownState::KnownUnseen) => 1,
        Some(KnownState::KnownSeen) => 2,
    }
}

#[derive(Clone, Debug)]
pub struct FogLayer {
    style: FogStyle,
    fog: Option<SpriteId>,
    /// Corner fog, present with corner darkness.
    corners: Vec<SpriteId>,
}

impl FogLayer {
    pub fn load(
        style: FogStyle,
        darkness: DarknessStyle,
        store: &SpriteStore,
    ) -> Result<Self, TilesetError> {
        let fog = match style {
            FogStyle::Sprite => Some(store.lookup("tx.fog").ok_or_else(|| {
                TilesetError::Fatal("Missing fog sprite \"tx.fog\".".to_string())
            })?),
            FogStyle::Auto | FogStyle::Darkness => None,
        };
        let mut corners = Vec::new();
        if darkness == DarknessStyle::Corner {
            for index in 0..NUM_CORNER_FOG {
                let tag = corner_fog_tag(index);
                corners.push(store.lookup(&tag).ok_or_else(|| {
                    TilesetError::Fatal(format!("Missing corner fog sprite \"{tag}\"."))
                })?);
            }
        }
        Ok(Self {
            style,
            fog,
            corners,
        })
    }

    pub fn fog_sprite(&self) -> Option<SpriteId> {
        self.fog
    }

    pub fn fill_sprite_array(
        &self,
        ctx: &DrawContext,
        view: &dyn MapView,
        options: &TilesetOptions,
    ) -> Vec<DrawnSprite> {
        let mut out = Vec::new();
        if !options.draw_fog_of_war {
            return out;
        }

        if let (Some(fog), Some(tile)) = (self.fog, ctx.tile) {
            if self.style == FogStyle::Sprite && view.known(tile) == KnownState::KnownUnseen {
                out.push(DrawnSprite::new(fog, false));
            }
        }

        if let Some(corner) = ctx.corner.filter(|_| !self.corners.is_empty()) {
            let index = corner
                .tiles
                .iter()
                .rev()
                .fold(0, |acc, t| acc * 3 + corner_value(t.map(|t| view.known(t))));
            out.push(DrawnSprite::new(self.corners[index], false));
        }
        out
    }
}
