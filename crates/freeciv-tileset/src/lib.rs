//! Freeciv Tileset Library
//!
//! Client-side rendering model: turns the partial map a client learns from
//! the engine's packets into ordered lists of sprites, one list per layer.
//!
//! # Design Principles
//!
//! - **Closed layer set**: every drawing band is a variant of [`Layer`],
//!   dispatched through a single `fill_sprite_array`
//! - **Arena sprites**: sprites live in a [`SpriteStore`] owned by the
//!   tileset and are referred to by [`SpriteId`]
//! - **Read-only rendering**: a loaded [`Tileset`] is only mutated by its
//!   lifecycle hooks, never while drawing
//! - **Stable tags**: sprite tag names follow the tileset art conventions
//!   exactly, so existing art packages load unchanged
//!
//! # Example
//!
//! ```
//! use freeciv_core::Ruleset;
//! use freeciv_tileset::{MemorySource, Tileset};
//!
//! let ruleset = Ruleset::classic();
//! let source = MemorySource::builtin();
//! let tileset = Tileset::load(&source, "trident", &ruleset).unwrap();
//! assert_eq!(tileset.layers().len(), 24);
//! ```

// File formats
pub mod builtin;
pub mod capability;
pub mod secfile;
pub mod source;

// Sprites and the tileset itself
pub mod error;
pub mod sprite;
pub mod tileset;

// Drawing
pub mod layer;
pub mod view;

// Re-exports for convenience
pub use capability::{check_capabilities, has_capabilities, has_capability, CapabilityError};
pub use error::{LogLevel, TilesetError};
pub use layer::{Corner, DrawContext, DrawnSprite, Edge, EdgeKind, Layer, LayerKind};
pub use secfile::{SecfileError, SectionFile, Table, Value};
pub use source::{DirSource, MemorySource, TilesetSource};
pub use sprite::{Rgb, Sprite, SpriteId, SpriteStore};
pub use tileset::{DarknessStyle, FogStyle, Tileset, TilesetOptions, TilesetType};
pub use view::{ClientMap, ClientUnit, MapView};
