//! Cities.

use super::{DrawContext, DrawnSprite, LayerKind};
use crate::error::TilesetError;
use crate::sprite::{SpriteId, SpriteStore};
use crate::tileset::TilesetOptions;
use crate::view::MapView;
use freeciv_core::packets::CityInfo;
use freeciv_core::KnownState;

/// Largest size threshold looked up for city sprites.
pub const MAX_CITY_THRESHOLD: u32 = 32;

/// Sprites chosen by city size: each entry applies from its threshold up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Thresholds(Vec<(u32, SpriteId)>);

impl Thresholds {
    fn load(sprites: &SpriteStore, prefix: &str) -> Self {
        Thresholds(
            (0..=MAX_CITY_THRESHOLD)
                .filter_map(|size| sprites.lookup(&format!("{prefix}_{size}")).map(|s| (size, s)))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sprite for a city of `size`; the smallest one if none applies.
    pub fn for_size(&self, size: u32) -> Option<SpriteId> {
        self.0
            .iter()
            .rev()
            .find(|(threshold, _)| *threshold <= size)
            .or_else(|| self.0.first())
            .map(|(_, s)| *s)
    }
}

/// Every sprite of one city style.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CitySprites {
    pub city: Thresholds,
    pub walls: Thresholds,
    pub occupied: Thresholds,
    /// Ones digit of the size label.
    pub size_ones: [Option<SpriteId>; 10],
    /// Tens digit of the size label.
    pub size_tens: [Option<SpriteId>; 10],
}

impl CitySprites {
    pub fn load(sprites: &SpriteStore, style: &str) -> Result<Self, TilesetError> {
        let city = Thresholds::load(sprites, &format!("city.{style}_city"));
        if city.is_empty() {
            return Err(TilesetError::Fatal(format!(
                "No city sprites for style \"{style}\"."
            )));
        }
        let mut size_ones = [None; 10];
        let mut size_tens = [None; 10];
        for digit in 0..10 {
            size_ones[digit] = sprites.lookup(&format!("city.size_{digit}"));
            size_tens[digit] = sprites.lookup(&format!("city.size_{digit}0"));
        }
        Ok(Self {
            city,
            walls: Thresholds::load(sprites, &format!("city.{style}_wall")),
            occupied: Thresholds::load(sprites, &format!("city.{style}_occupied")),
            size_ones,
            size_tens,
        })
    }

    pub fn city_sprite(&self, city: &CityInfo) -> Option<SpriteId> {
        self.city.for_size(city.size)
    }
}

/// City buildings on the first band, size labels on the second.
#[derive(Clone, Debug)]
pub struct CityLayer {
    number: usize,
    offset: (i32, i32),
    sprites: CitySprites,
}

impl CityLayer {
    /// `number` is 1 or 2.
    pub fn new(number: usize, offset: (i32, i32), sprites: CitySprites) -> Self {
        Self {
            number,
            offset,
            sprites,
        }
    }

    pub fn kind(&self) -> LayerKind {
        if self.number == 1 {
            LayerKind::City1
        } else {
            LayerKind::City2
        }
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
        if !options.draw_cities || view.known(tile) == KnownState::Unknown {
            return out;
        }
        let Some(city) = view.city_at(tile) else {
            return out;
        };
        let (ox, oy) = self.offset;

        if self.number == 1 {
            if let Some(sprite) = self.sprites.city_sprite(city) {
                out.push(DrawnSprite::at(sprite, ox, oy, true));
            }
            if city.walls {
                if let Some(sprite) = self.sprites.walls.for_size(city.size) {
                    out.push(DrawnSprite::at(sprite, ox, oy, true));
                }
            }
            if city.occupied {
                if let Some(sprite) = self.sprites.occupied.for_size(city.size) {
                    out.push(DrawnSprite::at(sprite, ox, oy, true));
                }
            }
        } else {
            let size = city.size.min(99) as usize;
            if size >= 10 {
                if let Some(tens) = self.sprites.size_tens[size / 10] {
                    out.push(DrawnSprite::at(tens, ox, oy, false));
                }
            }
            if let Some(ones) = self.sprites.size_ones[size % 10] {
                out.push(DrawnSprite::at(ones, ox, oy, false));
            }
        }
        out
    }
}
