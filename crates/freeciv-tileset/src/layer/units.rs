//! Units and their decorations.

use super::{set_indexed, DrawContext, DrawnSprite, LayerKind};
use crate::sprite::{Rgb, SpriteId, SpriteStore};
use crate::tileset::TilesetOptions;
use crate::view::MapView;
use freeciv_core::{ActivityType, PlayerId, UnitTypeId};

/// Steps of the hit point bar.
pub const NUM_HP_SPRITES: usize = 11;

/// Tag of the sprite shown for a unit busy with `activity`.
pub fn activity_tag(activity: ActivityType) -> Option<&'static str> {
    match activity {
        ActivityType::Idle => None,
        ActivityType::Fortifying => Some("unit.fortifying"),
        ActivityType::Fortified => Some("unit.fortified"),
        ActivityType::Sentry => Some("unit.sentry"),
        ActivityType::Irrigate => Some("unit.irrigate"),
        ActivityType::Mine => Some("unit.mine"),
        ActivityType::GenRoad => Some("unit.road"),
        ActivityType::Base => Some("unit.fortress"),
        ActivityType::Pillage => Some("unit.pillage"),
    }
}

const ACTIVITIES: [ActivityType; 8] = [
    ActivityType::Fortifying,
    ActivityType::Fortified,
    ActivityType::Sentry,
    ActivityType::Irrigate,
    ActivityType::Mine,
    ActivityType::GenRoad,
    ActivityType::Base,
    ActivityType::Pillage,
];

/// Sprites shared by all unit types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitDecorations {
    pub activities: Vec<(ActivityType, SpriteId)>,
    /// `veteran[l - 1]` marks veteran level `l`.
    pub veteran: Vec<SpriteId>,
    /// Health bar from empty to full.
    pub hp: [Option<SpriteId>; NUM_HP_SPRITES],
    pub stack: Option<SpriteId>,
    /// Marks the focus unit.
    pub select: Option<SpriteId>,
}

impl UnitDecorations {
    /// Collect whichever decorations the tileset provides.
    pub fn load(sprites: &SpriteStore, max_veteran_level: u8) -> Self {
        let activities = ACTIVITIES
            .into_iter()
            .filter_map(|a| {
                let tag = activity_tag(a)?;
                sprites.lookup(tag).map(|s| (a, s))
            })
            .collect();
        let veteran = (1..=max_veteran_level)
            .map_while(|level| sprites.lookup(&format!("unit.vet_{level}")))
            .collect();
        let mut hp = [None; NUM_HP_SPRITES];
        for (i, slot) in hp.iter_mut().enumerate() {
            *slot = sprites.lookup(&format!("unit.hp_{}", i * 10));
        }
        Self {
            activities,
            veteran,
            hp,
            stack: sprites.lookup("unit.stack"),
            select: sprites.lookup("unit.select0"),
        }
    }

    pub fn activity(&self, activity: ActivityType) -> Option<SpriteId> {
        self.activities
            .iter()
            .find(|(a, _)| *a == activity)
            .map(|(_, s)| *s)
    }

    /// Health bar step for `hp` out of `max_hp`.
    pub fn hp_step(hp: i32, max_hp: i32) -> usize {
        if max_hp <= 0 {
            return 0;
        }
        let step = (NUM_HP_SPRITES as i32 - 1) * hp / max_hp;
        step.clamp(0, NUM_HP_SPRITES as i32 - 1) as usize
    }
}

/// Sprite of one unit type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitSprites {
    pub sprite: SpriteId,
    pub max_hp: i32,
}

/// Units, either all but the focus unit or only the focus unit.
#[derive(Clone, Debug)]
pub struct UnitsLayer {
    focus: bool,
    offset: (i32, i32),
    tile_size: (u32, u32),
    decorations: UnitDecorations,
    types: Vec<Option<UnitSprites>>,
    backgrounds: Vec<Option<SpriteId>>,
}

impl UnitsLayer {
    pub fn new(
        focus: bool,
        offset: (i32, i32),
        tile_size: (u32, u32),
        decorations: UnitDecorations,
    ) -> Self {
        Self {
            focus,
            offset,
            tile_size,
            decorations,
            types: Vec::new(),
            backgrounds: Vec::new(),
        }
    }

    pub fn kind(&self) -> LayerKind {
        if self.focus {
            LayerKind::FocusUnit
        } else {
            LayerKind::Unit
        }
    }

    pub fn setup_unit_type(&mut self, utype: UnitTypeId, sprites: &UnitSprites) {
        set_indexed(&mut self.types, utype as usize, Some(*sprites));
    }

    pub fn initialize_player(&mut self, player: PlayerId, color: Rgb, sprites: &mut SpriteStore) {
        let solid = sprites.solid(color, self.tile_size.0, self.tile_size.1);
        set_indexed(&mut self.backgrounds, player as usize, Some(solid));
    }

    fn unit_type(&self, utype: UnitTypeId) -> Option<&UnitSprites> {
        self.types.get(utype as usize).and_then(Option::as_ref)
    }

    pub fn fill_sprite_array(
        &self,
        ctx: &DrawContext,
        view: &dyn MapView,
        options: &TilesetOptions,
    ) -> Vec<DrawnSprite> {
        let (ox, oy) = self.offset;
        let mut out = Vec::new();

        let unit = ctx
            .unit
            .or_else(|| ctx.tile.and_then(|t| view.drawable_unit(t)))
            .and_then(|id| view.unit(id));
        let Some(unit) = unit else {
            if let Some(utype) = ctx.unit_type.filter(|_| !self.focus) {
                if let Some(sprites) = self.unit_type(utype) {
                    out.push(DrawnSprite::at(sprites.sprite, ox, oy, false));
                }
            }
            return out;
        };

        let is_focus = view.focus_unit() == Some(unit.id);
        if is_focus != self.focus {
            return out;
        }
        let shown = if is_focus {
            options.draw_focus_unit || options.draw_units
        } else {
            options.draw_units
        };
        if !shown {
            return out;
        }

        if options.solid_color_behind_units {
            if let Some(Some(background)) = self.backgrounds.get(unit.owner as usize) {
                out.push(DrawnSprite::new(*background, false));
            }
        }
        let Some(type_sprites) = self.unit_type(unit.utype) else {
            tracing::warn!(utype = unit.utype, "no sprite for unit type");
            return out;
        };
        out.push(DrawnSprite::at(type_sprites.sprite, ox, oy, false));

        if let Some(activity) = self.decorations.activity(unit.activity) {
            out.push(DrawnSprite::at(activity, ox, oy, false));
        }
        if unit.veteran > 0 {
            if let Some(vet) = self.decorations.veteran.get(unit.veteran as usize - 1) {
                out.push(DrawnSprite::at(*vet, ox, oy, false));
            }
        }
        let step = UnitDecorations::hp_step(unit.hp, type_sprites.max_hp);
        if let Some(hp) = self.decorations.hp[step] {
            out.push(DrawnSprite::at(hp, ox, oy, false));
        }
        if let (Some(stack), Some(tile)) = (self.decorations.stack, ctx.tile) {
            if view.units_at(tile).len() > 1 {
                out.push(DrawnSprite::at(stack, ox, oy, false));
            }
        }
        if is_focus {
            if let Some(select) = self.decorations.select {
                out.push(DrawnSprite::at(select, ox, oy, false));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::Sprite;

    #[test]
    fn test_hp_step() {
        assert_eq!(UnitDecorations::hp_step(10, 10), 10);
        assert_eq!(UnitDecorations::hp_step(0, 10), 0);
        assert_eq!(UnitDecorations::hp_step(5, 10), 5);
        assert_eq!(UnitDecorations::hp_step(29, 30), 9);
        assert_eq!(UnitDecorations::hp_step(40, 10), 10);
        assert_eq!(UnitDecorations::hp_step(3, 0), 0);
    }

    #[test]
    fn test_idle_has_no_activity_sprite() {
        assert_eq!(activity_tag(ActivityType::Idle), None);
        assert_eq!(activity_tag(ActivityType::GenRoad), Some("unit.road"));
    }

    #[test]
    fn test_veteran_sprites_stop_at_first_gap() {
        let mut store = SpriteStore::new();
        let mark = Sprite::Solid {
            color: Rgb::BLACK,
            width: 4,
            height: 4,
        };
        store.register("unit.vet_1", mark.clone(), false, "units.spec");
        store.register("unit.vet_3", mark, false, "units.spec");
        let decorations = UnitDecorations::load(&store, 3);
        assert_eq!(decorations.veteran.len(), 1);
        assert_eq!(decorations.select, None);
    }
}
