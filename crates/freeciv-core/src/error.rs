//! Errors returned by world operations.

use crate::actions::ActionError;
use crate::movement::MoveError;
use crate::orders::OrderError;
use crate::ruleset::RulesetError;
use crate::settings::SettingsError;
use crate::types::{CityId, PlayerId, TileIndex, UnitId, MAX_PLAYERS};
use crate::unit::ActivityType;
use thiserror::Error;

/// Errors that can occur while manipulating the world.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("player {0} is no longer in the game")]
    PlayerDead(PlayerId),
    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),
    #[error("unknown city {0}")]
    UnknownCity(CityId),
    #[error("tile {0} is not on the map")]
    InvalidTile(TileIndex),
    #[error("no more than {} players are supported", MAX_PLAYERS)]
    TooManyPlayers,
    #[error("{unit} cannot exist on tile {tile}")]
    NonNativeTile { unit: String, tile: TileIndex },
    #[error("tile {0} already has a city")]
    CityExists(TileIndex),
    #[error("unit cannot start {0} here")]
    IllegalActivity(ActivityType),
    #[error("invalid ruleset: {0}")]
    Ruleset(#[from] RulesetError),
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("orders rejected: {0}")]
    Orders(#[from] OrderError),
    #[error("illegal move: {0}")]
    Move(#[from] MoveError),
    #[error(transparent)]
    Action(#[from] ActionError),
}
