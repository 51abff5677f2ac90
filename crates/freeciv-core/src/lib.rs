//! Freeciv Core Library
//!
//! Server-side game engine for a Freeciv-style strategy game: what each
//! player can see, who owns which tile, and how units move, fight and
//! follow orders.
//!
//! # Design Principles
//!
//! - **One context object**: all state lives in [`World`]; subsystems are
//!   `impl World` blocks in their own modules
//! - **Ids, not pointers**: units, cities and vision sources refer to each
//!   other by id
//! - **Deterministic**: the game RNG is seeded from the settings
//! - **Packets out**: clients learn about the world only through queued
//!   [`Packet`]s on their [`Connection`]

// Core modules
pub mod coord;
pub mod map;
pub mod ruleset;
pub mod types;

// Game state modules
pub mod diplomacy;
pub mod error;
pub mod player;
pub mod settings;
pub mod world;

// Randomness
pub mod rng;

// Networking surface
pub mod packets;

// Vision and fog of war
pub mod player_tile;
pub mod vision;

// Borders
pub mod borders;

// Cities
pub mod city;

// Units, movement and combat
pub mod actions;
pub mod combat;
pub mod movement;
pub mod orders;
pub mod transport;
pub mod turn;
pub mod unit;

// Re-exports for convenience
pub use actions::{ActionError, ActionId, ActionProbability};
pub use city::City;
pub use combat::{win_chance, AttackOutcome, CombatResult};
pub use coord::{Direction8, MapCoord};
pub use diplomacy::{DiplStatus, DiplomacyState};
pub use error::GameError;
pub use map::{Map, Tile};
pub use movement::MoveError;
pub use orders::{validate_orders, OrderError};
pub use packets::{Connection, EventType, Packet, PacketBatch};
pub use player::Player;
pub use player_tile::{PlayerTile, VisionSite};
pub use rng::GameRng;
pub use ruleset::{
    ExtraCause, ExtraType, HutBehavior, Ruleset, RulesetError, TerrainClass, TerrainType,
    UnitClass, UnitType, UnitTypeFlag,
};
pub use settings::{BorderMode, GameSettings, SettingsError};
pub use types::*;
pub use unit::{ActivityType, Order, OrderList, Unit};
pub use vision::{VisionArena, VisionId, VisionSource};
pub use world::{WipeReason, World};
