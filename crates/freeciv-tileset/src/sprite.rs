//! Sprite arena.
//!
//! Sprites are descriptions of image regions, not pixels: the renderer
//! resolves them against the image files. Every sprite, including ones
//! cropped out of others at load time, is owned by the [`SpriteStore`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Handle to a sprite in a [`SpriteStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpriteId(pub u32);

/// An RGB colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// What a sprite draws.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sprite {
    /// A rectangle of an image file.
    Region {
        file: String,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    /// A filled rectangle.
    Solid { color: Rgb, width: u32, height: u32 },
}

impl Sprite {
    pub fn size(&self) -> (u32, u32) {
        match self {
            Sprite::Region { width, height, .. } | Sprite::Solid { width, height, .. } => {
                (*width, *height)
            }
        }
    }
}

/// Owner of every sprite a tileset uses, with the tag index.
#[derive(Clone, Debug, Default)]
pub struct SpriteStore {
    sprites: Vec<Sprite>,
    tags: HashMap<String, SpriteId>,
    /// Tags registered more than once.
    duplicates: Vec<String>,
}

impl SpriteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    /// Add an untagged sprite.
    pub fn add(&mut self, sprite: Sprite) -> SpriteId {
        let id = SpriteId(self.sprites.len() as u32);
        self.sprites.push(sprite);
        id
    }

    /// Add a sprite under `tag`. A tag registered again points at the new
    /// sprite; unless `duplicates_ok`, that is worth a warning.
    pub fn register(&mut self, tag: &str, sprite: Sprite, duplicates_ok: bool, file: &str) {
        let id = self.add(sprite);
        if self.tags.insert(tag.to_string(), id).is_some() {
            if !duplicates_ok {
                tracing::warn!(file, tag, "already have a sprite for this tag");
            }
            self.duplicates.push(tag.to_string());
        }
    }

    pub fn get(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.get(id.0 as usize)
    }

    pub fn lookup(&self, tag: &str) -> Option<SpriteId> {
        self.tags.get(tag).copied()
    }

    /// `tag`, or `alt` when `tag` is missing.
    pub fn lookup_alt(&self, tag: &str, alt: &str) -> Option<SpriteId> {
        self.lookup(tag).or_else(|| self.lookup(alt))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Tags that were registered more than once, in registration order.
    pub fn duplicate_tags(&self) -> &[String] {
        &self.duplicates
    }

    /// Add a solid sprite.
    pub fn solid(&mut self, color: Rgb, width: u32, height: u32) -> SpriteId {
        self.add(Sprite::Solid {
            color,
            width,
            height,
        })
    }

    /// Cut a `width` x `height` piece at `(x, y)` out of `source` as a new
    /// sprite. The piece is clipped to the source.
    pub fn crop(
        &mut self,
        source: SpriteId,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Option<SpriteId> {
        let (sw, sh) = self.get(source)?.size();
        if x >= sw || y >= sh {
            return None;
        }
        let width = width.min(sw - x);
        let height = height.min(sh - y);
        let piece = match self.get(source)? {
            Sprite::Region {
                file,
                x: sx,
                y: sy,
                ..
            } => Sprite::Region {
                file: file.clone(),
                x: sx + x,
                y: sy + y,
                width,
                height,
            },
            Sprite::Solid { color, .. } => Sprite::Solid {
                color: *color,
                width,
                height,
            },
        };
        Some(self.add(piece))
    }
}
