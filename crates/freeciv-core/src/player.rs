//! Player state.

use crate::packets::Connection;
use crate::player_tile::PlayerTile;
use crate::ruleset::{Ruleset, TechFlag};
use crate::types::{AdvanceId, PlayerId, PlayerSet};
use std::collections::BTreeSet;

/// A player in the game.
#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_alive: bool,
    /// Current gold in treasury.
    pub gold: i32,
    /// Known advances.
    pub advances: BTreeSet<AdvanceId>,
    /// Players this player shares vision with directly.
    pub gives_shared_vision: PlayerSet,
    /// Transitive closure of `gives_shared_vision`.
    pub really_gives_vision: PlayerSet,
    /// Whether owned territory counts as seen.
    pub border_vision: bool,
    /// Private map, one entry per tile. Empty once the player has left.
    pub tiles: Vec<PlayerTile>,
    /// Outbound packets.
    pub connection: Connection,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, map_size: usize) -> Self {
        Self {
            id,
            name: name.into(),
            is_alive: true,
            gold: 50,
            advances: BTreeSet::new(),
            gives_shared_vision: PlayerSet::EMPTY,
            really_gives_vision: PlayerSet::EMPTY,
            border_vision: false,
            tiles: vec![PlayerTile::default(); map_size],
            connection: Connection::new(id),
        }
    }

    pub fn knows_advance(&self, advance: AdvanceId) -> bool {
        self.advances.contains(&advance)
    }

    /// Whether any known advance carries `flag`.
    pub fn has_tech_flag(&self, ruleset: &Ruleset, flag: TechFlag) -> bool {
        self.advances.iter().any(|a| {
            ruleset
                .advances
                .get(*a as usize)
                .is_some_and(|adv| adv.flags.contains(&flag))
        })
    }

    /// Whether the private map still exists.
    pub fn has_map(&self) -> bool {
        !self.tiles.is_empty()
    }
}
