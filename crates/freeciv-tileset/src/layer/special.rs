//! Extras: specials, roads, rivers and base flags.

use super::{set_indexed, DrawContext, DrawnSprite, LayerKind};
use crate::error::TilesetError;
use crate::layer::terrain::cardinal_index_str;
use crate::sprite::{Rgb, SpriteId, SpriteStore};
use crate::tileset::TilesetOptions;
use crate::view::MapView;
use freeciv_core::{Direction8, ExtraId, KnownState, PlayerId, Ruleset, TerrainId, TileIndex};

/// How an extra's sprites are laid out, from the `[extras] styles` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtraStyle {
    /// One sprite on the first special layer.
    Single1,
    /// One sprite on the second special layer.
    Single2,
    /// Background, middle and foreground sprites on the three special layers.
    ThreeLayer,
    /// An isolated sprite plus one sprite per connected direction.
    RoadAllSeparate,
    /// One sprite per combination of connected cardinal neighbours.
    Cardinals,
    /// Cardinal river pieces plus outlets into the sea.
    River,
}

impl ExtraStyle {
    pub fn from_name(name: &str) -> Option<ExtraStyle> {
        match name {
            "Single1" => Some(ExtraStyle::Single1),
            "Single2" => Some(ExtraStyle::Single2),
            "3Layer" => Some(ExtraStyle::ThreeLayer),
            "RoadAllSeparate" => Some(ExtraStyle::RoadAllSeparate),
            "Cardinals" => Some(ExtraStyle::Cardinals),
            "River" => Some(ExtraStyle::River),
            _ => None,
        }
    }
}

/// Resolved sprites of one extra type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtraGraphics {
    Single1(SpriteId),
    Single2(SpriteId),
    ThreeLayer {
        background: Option<SpriteId>,
        middleground: Option<SpriteId>,
        foreground: Option<SpriteId>,
    },
    RoadAllSeparate {
        isolated: SpriteId,
        /// Indexed by direction.
        directions: [SpriteId; 8],
    },
    Cardinals([SpriteId; 16]),
    River {
        cardinals: [SpriteId; 16],
        /// Indexed N, E, S, W.
        outlets: [SpriteId; 4],
    },
}

impl ExtraGraphics {
    pub fn style(&self) -> ExtraStyle {
        match self {
            ExtraGraphics::Single1(_) => ExtraStyle::Single1,
            ExtraGraphics::Single2(_) => ExtraStyle::Single2,
            ExtraGraphics::ThreeLayer { .. } => ExtraStyle::ThreeLayer,
            ExtraGraphics::RoadAllSeparate { .. } => ExtraStyle::RoadAllSeparate,
            ExtraGraphics::Cardinals(_) => ExtraStyle::Cardinals,
            ExtraGraphics::River { .. } => ExtraStyle::River,
        }
    }

    /// Look up the sprites of `style` under the tag base `tag`.
    pub fn load(
        sprites: &SpriteStore,
        style: ExtraStyle,
        tag: &str,
    ) -> Result<ExtraGraphics, TilesetError> {
        let required = |key: String| {
            sprites.lookup(&key).ok_or_else(|| {
                TilesetError::Fatal(format!("Missing extra sprite for tag \"{key}\"."))
            })
        };
        let cardinals = |prefix: &str| -> Result<[SpriteId; 16], TilesetError> {
            let mut table = [SpriteId(0); 16];
            for (index, slot) in table.iter_mut().enumerate() {
                *slot = required(format!("{prefix}{}", cardinal_index_str(index)))?;
            }
            Ok(table)
        };

        Ok(match style {
            ExtraStyle::Single1 => ExtraGraphics::Single1(required(tag.to_string())?),
            ExtraStyle::Single2 => ExtraGraphics::Single2(required(tag.to_string())?),
            ExtraStyle::ThreeLayer => ExtraGraphics::ThreeLayer {
                background: sprites.lookup(&format!("{tag}_bg")),
                middleground: sprites.lookup(&format!("{tag}_mg")),
                foreground: sprites.lookup(&format!("{tag}_fg")),
            },
            ExtraStyle::RoadAllSeparate => {
                let mut directions = [SpriteId(0); 8];
                for dir in Direction8::ALL {
                    directions[dir.index()] = required(format!("{tag}_{}", dir.short_name()))?;
                }
                ExtraGraphics::RoadAllSeparate {
                    isolated: required(format!("{tag}_isolated"))?,
                    directions,
                }
            }
            ExtraStyle::Cardinals => ExtraGraphics::Cardinals(cardinals(&format!("{tag}_"))?),
            ExtraStyle::River => {
                let mut outlets = [SpriteId(0); 4];
                for (slot, dir) in outlets.iter_mut().zip(Direction8::CARDINALS) {
                    *slot = required(format!("{tag}_outlet_{}", dir.short_name()))?;
                }
                ExtraGraphics::River {
                    cardinals: cardinals(&format!("{tag}_s_"))?,
                    outlets,
                }
            }
        })
    }
}

/// Everything the layers need to draw one extra type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtraSprites {
    pub graphics: ExtraGraphics,
    /// Bases show their owner's flag.
    pub is_base: bool,
}

/// Cardinal neighbours of `tile` that also have `extra`, as a 4-bit mask.
fn cardinal_mask(view: &dyn MapView, tile: TileIndex, extra: ExtraId) -> usize {
    Direction8::CARDINALS
        .iter()
        .enumerate()
        .filter(|(_, dir)| {
            view.mapstep(tile, **dir)
                .is_some_and(|t| view.known(t) != KnownState::Unknown && view.extras(t).contains(extra))
        })
        .fold(0, |acc, (bit, _)| acc | (1 << bit))
}

fn visible_tile(ctx: &DrawContext, view: &dyn MapView) -> Option<TileIndex> {
    ctx.tile.filter(|t| view.known(*t) != KnownState::Unknown)
}

/// One of the three special bands.
#[derive(Clone, Debug)]
pub struct SpecialLayer {
    number: usize,
    extras: Vec<Option<ExtraSprites>>,
}

impl SpecialLayer {
    /// `number` is 1, 2 or 3.
    pub fn new(number: usize) -> Self {
        Self {
            number,
            extras: Vec::new(),
        }
    }

    pub fn kind(&self) -> LayerKind {
        match self.number {
            1 => LayerKind::Special1,
            2 => LayerKind::Special2,
            _ => LayerKind::Special3,
        }
    }

    pub fn setup_extra(&mut self, extra: ExtraId, sprites: &ExtraSprites) {
        let used = match (&sprites.graphics, self.number) {
            (ExtraGraphics::Single1(_) | ExtraGraphics::Cardinals(_), 1) => true,
            (ExtraGraphics::Single2(_), 2) => true,
            (ExtraGraphics::ThreeLayer { .. }, _) => true,
            _ => false,
        };
        if used {
            set_indexed(&mut self.extras, extra as usize, Some(sprites.clone()));
        }
    }

    pub fn fill_sprite_array(
        &self,
        ctx: &DrawContext,
        view: &dyn MapView,
        options: &TilesetOptions,
    ) -> Vec<DrawnSprite> {
        let mut out = Vec::new();
        let Some(tile) = visible_tile(ctx, view) else {
            return out;
        };
        if !options.draw_specials {
            return out;
        }
        for extra in view.extras(tile).iter() {
            let Some(Some(sprites)) = self.extras.get(extra as usize) else {
                continue;
            };
            let sprite = match &sprites.graphics {
                ExtraGraphics::Single1(s) | ExtraGraphics::Single2(s) => Some(*s),
                ExtraGraphics::ThreeLayer {
                    background,
                    middleground,
                    foreground,
                } => match self.number {
                    1 => *background,
                    2 => *middleground,
                    _ => *foreground,
                },
                ExtraGraphics::Cardinals(table) => Some(table[cardinal_mask(view, tile, extra)]),
                _ => None,
            };
            if let Some(sprite) = sprite {
                out.push(DrawnSprite::new(sprite, true));
            }
        }
        out
    }
}

/// Roads drawn as an isolated dot or one arm per connected neighbour.
#[derive(Clone, Debug, Default)]
pub struct RoadsLayer {
    extras: Vec<Option<ExtraSprites>>,
}

impl RoadsLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn setup_extra(&mut self, extra: ExtraId, sprites: &ExtraSprites) {
        if sprites.graphics.style() == ExtraStyle::RoadAllSeparate {
            set_indexed(&mut self.extras, extra as usize, Some(sprites.clone()));
        }
    }

    pub fn fill_sprite_array(
        &self,
        ctx: &DrawContext,
        view: &dyn MapView,
        options: &TilesetOptions,
    ) -> Vec<DrawnSprite> {
        let mut out = Vec::new();
        let Some(tile) = visible_tile(ctx, view) else {
            return out;
        };
        if !options.draw_roads {
            return out;
        }
        for extra in view.extras(tile).iter() {
            let Some(Some(ExtraSprites {
                graphics:
                    ExtraGraphics::RoadAllSeparate {
                        isolated,
                        directions,
                    },
                ..
            })) = self.extras.get(extra as usize)
            else {
                continue;
            };
            let connected: Vec<Direction8> = Direction8::ALL
                .into_iter()
                .filter(|dir| {
                    view.mapstep(tile, *dir).is_some_and(|t| {
                        view.known(t) != KnownState::Unknown
                            && (view.extras(t).contains(extra) || view.city_at(t).is_some())
                    })
                })
                .collect();
            if connected.is_empty() {
                out.push(DrawnSprite::new(*isolated, true));
            } else {
                out.extend(
                    connected
                        .into_iter()
                        .map(|dir| DrawnSprite::new(directions[dir.index()], true)),
                );
            }
        }
        out
    }
}

/// Rivers and their outlets.
#[derive(Clone, Debug, Default)]
pub struct WaterLayer {
    extras: Vec<Option<ExtraSprites>>,
    /// Indexed by terrain.
    ocean: Vec<bool>,
}

impl WaterLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize_terrain(&mut self, ruleset: &Ruleset) {
        self.ocean = (0..ruleset.terrains.len())
            .map(|t| ruleset.is_ocean(t as TerrainId))
            .collect();
    }

    fn is_ocean(&self, terrain: Option<TerrainId>) -> bool {
        terrain
            .and_then(|t| self.ocean.get(t as usize).copied())
            .unwrap_or(false)
    }

    pub fn setup_extra(&mut self, extra: ExtraId, sprites: &ExtraSprites) {
        if sprites.graphics.style() == ExtraStyle::River {
            set_indexed(&mut self.extras, extra as usize, Some(sprites.clone()));
        }
    }

    pub fn fill_sprite_array(
        &self,
        ctx: &DrawContext,
        view: &dyn MapView,
        options: &TilesetOptions,
    ) -> Vec<DrawnSprite> {
        let mut out = Vec::new();
        let Some(tile) = visible_tile(ctx, view) else {
            return out;
        };
        if !options.draw_terrain {
            return out;
        }
        let land = !self.is_ocean(view.terrain(tile));
        for extra in view.extras(tile).iter() {
            let Some(Some(ExtraSprites {
                graphics: ExtraGraphics::River { cardinals, outlets },
                ..
            })) = self.extras.get(extra as usize)
            else {
                continue;
            };
            out.push(DrawnSprite::new(
                cardinals[cardinal_mask(view, tile, extra)],
                true,
            ));
            if land {
                for (i, dir) in Direction8::CARDINALS.iter().enumerate() {
                    let sea = view
                        .mapstep(tile, *dir)
                        .filter(|t| view.known(*t) != KnownState::Unknown)
                        .is_some_and(|t| self.is_ocean(view.terrain(t)));
                    if sea {
                        out.push(DrawnSprite::new(outlets[i], true));
                    }
                }
            }
        }
        out
    }
}

/// The owner's flag over bases.
#[derive(Clone, Debug)]
pub struct BaseFlagsLayer {
    flag_size: (u32, u32),
    offset: (i32, i32),
    bases: Vec<bool>,
    flags: Vec<Option<SpriteId>>,
}

impl BaseFlagsLayer {
    pub fn new(flag_size: (u32, u32), offset: (i32, i32)) -> Self {
        Self {
            flag_size,
            offset,
            bases: Vec::new(),
            flags: Vec::new(),
        }
    }

    pub fn setup_extra(&mut self, extra: ExtraId, sprites: &ExtraSprites) {
        set_indexed(&mut self.bases, extra as usize, sprites.is_base);
    }

    pub fn initialize_player(&mut self, player: PlayerId, color: Rgb, sprites: &mut SpriteStore) {
        let flag = sprites.solid(color, self.flag_size.0, self.flag_size.1);
        set_indexed(&mut self.flags, player as usize, Some(flag));
    }

    pub fn fill_sprite_array(
        &self,
        ctx: &DrawContext,
        view: &dyn MapView,
        options: &TilesetOptions,
    ) -> Vec<DrawnSprite> {
        let Some(tile) = visible_tile(ctx, view) else {
            return Vec::new();
        };
        if !options.draw_specials {
            return Vec::new();
        }
        let has_base = view
            .extras(tile)
            .iter()
            .any(|e| self.bases.get(e as usize).copied().unwrap_or(false));
        let flag = view
            .extras_owner(tile)
            .and_then(|p| self.flags.get(p as usize).copied().flatten());
        match flag {
            Some(flag) if has_base => {
                vec![DrawnSprite::at(flag, self.offset.0, self.offset.1, true)]
            }
            _ => Vec::new(),
        }
    }
}
