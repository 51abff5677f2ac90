//! Core type aliases and small value types used throughout the crate.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Player index (0..MAX_PLAYERS).
pub type PlayerId = u8;

/// Unique identifier for a unit.
pub type UnitId = u32;

/// Unique identifier for a city.
pub type CityId = u32;

/// Linear index of a tile in the map's tile array.
pub type TileIndex = usize;

/// Index into the ruleset's terrain table.
pub type TerrainId = u8;

/// Index into the ruleset's extra table.
pub type ExtraId = u8;

/// Index into the ruleset's unit type table.
pub type UnitTypeId = u8;

/// Index into the ruleset's unit class table.
pub type UnitClassId = u8;

/// Index into the ruleset's advance table.
pub type AdvanceId = u8;

/// Maximum number of players a [`PlayerSet`] can hold.
pub const MAX_PLAYERS: usize = 64;

/// Move fragments in one full move.
pub const SINGLE_MOVE: i32 = 3;

/// Scale applied to attack and defense strengths.
pub const POWER_FACTOR: i32 = 10;

/// Scale applied to terrain activity progress.
pub const ACTIVITY_FACTOR: i32 = 10;

/// Longest order list a unit may hold.
pub const MAX_LEN_ROUTE: usize = 2000;

/// Largest squared radius a city work area may have.
pub const CITY_MAP_MAX_RADIUS_SQ: i32 = 26;

/// Independent visibility channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VisionLayer {
    /// Normal sight.
    #[default]
    Main,
    /// Detects invisible units.
    Invis,
    /// Detects submerged units.
    Subsurface,
}

impl VisionLayer {
    /// Number of vision layers.
    pub const COUNT: usize = 3;

    /// All layers in index order.
    pub const ALL: [VisionLayer; 3] = [
        VisionLayer::Main,
        VisionLayer::Invis,
        VisionLayer::Subsurface,
    ];

    /// Position of this layer in per-layer arrays.
    pub const fn index(self) -> usize {
        match self {
            VisionLayer::Main => 0,
            VisionLayer::Invis => 1,
            VisionLayer::Subsurface => 2,
        }
    }
}

/// Per-layer squared vision radius. A negative value means no vision at all,
/// zero means only the anchor tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VRadius(pub [i32; VisionLayer::COUNT]);

impl VRadius {
    /// No vision on any layer.
    pub const NONE: VRadius = VRadius([-1, -1, -1]);

    pub const fn new(main: i32, invis: i32, subsurface: i32) -> Self {
        VRadius([main, invis, subsurface])
    }

    /// Largest radius over all layers.
    pub fn max(&self) -> i32 {
        self.0.iter().copied().max().unwrap_or(-1)
    }
}

impl Default for VRadius {
    fn default() -> Self {
        VRadius::NONE
    }
}

impl Index<VisionLayer> for VRadius {
    type Output = i32;

    fn index(&self, layer: VisionLayer) -> &i32 {
        &self.0[layer.index()]
    }
}

impl IndexMut<VisionLayer> for VRadius {
    fn index_mut(&mut self, layer: VisionLayer) -> &mut i32 {
        &mut self.0[layer.index()]
    }
}

/// Signed per-layer change applied to seen counters.
pub type VChange = [i32; VisionLayer::COUNT];

/// What a player knows about a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum KnownState {
    /// Never seen.
    #[default]
    Unknown,
    /// Seen before, currently fogged.
    KnownUnseen,
    /// Currently in sight.
    KnownSeen,
}

/// Set of players stored as a bitset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct PlayerSet(u64);

impl PlayerSet {
    pub const EMPTY: PlayerSet = PlayerSet(0);

    pub fn contains(&self, player: PlayerId) -> bool {
        (player as usize) < MAX_PLAYERS && self.0 & (1u64 << player) != 0
    }

    pub fn insert(&mut self, player: PlayerId) {
        debug_assert!((player as usize) < MAX_PLAYERS);
        self.0 |= 1u64 << (player as u64 % MAX_PLAYERS as u64);
    }

    pub fn remove(&mut self, player: PlayerId) {
        self.0 &= !(1u64 << (player as u64 % MAX_PLAYERS as u64));
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = PlayerId> + '_ {
        (0..MAX_PLAYERS as u8).filter(move |p| self.contains(*p))
    }
}

/// Set of extras present on a tile, indexed by [`ExtraId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ExtraSet(u64);

impl ExtraSet {
    pub const EMPTY: ExtraSet = ExtraSet(0);

    pub fn contains(&self, extra: ExtraId) -> bool {
        extra < 64 && self.0 & (1u64 << extra) != 0
    }

    pub fn insert(&mut self, extra: ExtraId) {
        debug_assert!(extra < 64);
        self.0 |= 1u64 << (extra % 64);
    }

    pub fn remove(&mut self, extra: ExtraId) {
        self.0 &= !(1u64 << (extra % 64));
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Raw bit representation, as sent to clients.
    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn from_bits(bits: u64) -> Self {
        ExtraSet(bits)
    }

    pub fn iter(&self) -> impl Iterator<Item = ExtraId> + '_ {
        (0..64u8).filter(move |e| self.contains(*e))
    }
}

impl FromIterator<ExtraId> for ExtraSet {
    fn from_iter<I: IntoIterator<Item = ExtraId>>(iter: I) -> Self {
        let mut set = ExtraSet::EMPTY;
        for extra in iter {
            set.insert(extra);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vradius_index_by_layer() {
        let mut radius = VRadius::new(5, 2, 2);
        assert_eq!(radius[VisionLayer::Main], 5);
        radius[VisionLayer::Subsurface] = 0;
        assert_eq!(radius.0, [5, 2, 0]);
        assert_eq!(radius.max(), 5);
        assert_eq!(VRadius::NONE.max(), -1);
    }

    #[test]
    fn test_player_set() {
        let mut set = PlayerSet::default();
        assert!(set.is_empty());
        set.insert(3);
        set.insert(63);
        assert!(set.contains(3));
        assert!(set.contains(63));
        assert!(!set.contains(4));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 63]);
        set.remove(3);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_extra_set_collect() {
        let set: ExtraSet = [1u8, 4, 9].into_iter().collect();
        assert!(set.contains(4));
        assert!(!set.contains(2));
        assert_eq!(set.bits(), (1 << 1) | (1 << 4) | (1 << 9));
    }
}
