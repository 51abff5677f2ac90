//! Square map coordinates and compass directions.
//!
//! Tiles are addressed by `(x, y)` with `x` growing east and `y` growing
//! south. Every tile has eight neighbours; the four cardinal ones share an
//! edge with it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a tile on the map.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct MapCoord {
    /// Column coordinate
    pub x: i32,
    /// Row coordinate
    pub y: i32,
}

impl PartialOrd for MapCoord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MapCoord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Row-major, matching linear tile indices
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl MapCoord {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The coordinate one step away in `dir`, without any wrapping.
    #[inline]
    pub fn step(&self, dir: Direction8) -> MapCoord {
        let (dx, dy) = dir.delta();
        MapCoord::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for MapCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The eight compass directions, in the canonical ruleset order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction8 {
    NorthWest,
    North,
    NorthEast,
    West,
    East,
    SouthWest,
    South,
    SouthEast,
}

impl Direction8 {
    /// All directions in canonical order.
    pub const ALL: [Direction8; 8] = [
        Direction8::NorthWest,
        Direction8::North,
        Direction8::NorthEast,
        Direction8::West,
        Direction8::East,
        Direction8::SouthWest,
        Direction8::South,
        Direction8::SouthEast,
    ];

    /// Cardinal directions in the order used for whole-tile matching
    /// indices: north, east, south, west.
    pub const CARDINALS: [Direction8; 4] = [
        Direction8::North,
        Direction8::East,
        Direction8::South,
        Direction8::West,
    ];

    /// `(dx, dy)` of one step in this direction.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction8::NorthWest => (-1, -1),
            Direction8::North => (0, -1),
            Direction8::NorthEast => (1, -1),
            Direction8::West => (-1, 0),
            Direction8::East => (1, 0),
            Direction8::SouthWest => (-1, 1),
            Direction8::South => (0, 1),
            Direction8::SouthEast => (1, 1),
        }
    }

    /// Position in [`Direction8::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Direction8::NorthWest => 0,
            Direction8::North => 1,
            Direction8::NorthEast => 2,
            Direction8::West => 3,
            Direction8::East => 4,
            Direction8::SouthWest => 5,
            Direction8::South => 6,
            Direction8::SouthEast => 7,
        }
    }

    /// Next direction clockwise.
    pub const fn cw(self) -> Direction8 {
        match self {
            Direction8::North => Direction8::NorthEast,
            Direction8::NorthEast => Direction8::East,
            Direction8::East => Direction8::SouthEast,
            Direction8::SouthEast => Direction8::South,
            Direction8::South => Direction8::SouthWest,
            Direction8::SouthWest => Direction8::West,
            Direction8::West => Direction8::NorthWest,
            Direction8::NorthWest => Direction8::North,
        }
    }

    /// Next direction counter-clockwise.
    pub const fn ccw(self) -> Direction8 {
        match self {
            Direction8::North => Direction8::NorthWest,
            Direction8::NorthWest => Direction8::West,
            Direction8::West => Direction8::SouthWest,
            Direction8::SouthWest => Direction8::South,
            Direction8::South => Direction8::SouthEast,
            Direction8::SouthEast => Direction8::East,
            Direction8::East => Direction8::NorthEast,
            Direction8::NorthEast => Direction8::North,
        }
    }

    pub const fn opposite(self) -> Direction8 {
        match self {
            Direction8::North => Direction8::South,
            Direction8::NorthEast => Direction8::SouthWest,
            Direction8::East => Direction8::West,
            Direction8::SouthEast => Direction8::NorthWest,
            Direction8::South => Direction8::North,
            Direction8::SouthWest => Direction8::NorthEast,
            Direction8::West => Direction8::East,
            Direction8::NorthWest => Direction8::SouthEast,
        }
    }

    /// Whether this direction crosses a tile edge rather than a corner.
    pub const fn is_cardinal(self) -> bool {
        matches!(
            self,
            Direction8::North | Direction8::East | Direction8::South | Direction8::West
        )
    }

    /// Short lowercase name used in sprite tags ("n", "ne", ...).
    pub const fn short_name(self) -> &'static str {
        match self {
            Direction8::North => "n",
            Direction8::NorthEast => "ne",
            Direction8::East => "e",
            Direction8::SouthEast => "se",
            Direction8::South => "s",
            Direction8::SouthWest => "sw",
            Direction8::West => "w",
            Direction8::NorthWest => "nw",
        }
    }

    /// Human readable name for log and notification text.
    pub const fn name(self) -> &'static str {
        match self {
            Direction8::North => "north",
            Direction8::NorthEast => "northeast",
            Direction8::East => "east",
            Direction8::SouthEast => "southeast",
            Direction8::South => "south",
            Direction8::SouthWest => "southwest",
            Direction8::West => "west",
            Direction8::NorthWest => "northwest",
        }
    }
}

impl fmt::Display for Direction8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cw_ccw_inverse() {
        for dir in Direction8::ALL {
            assert_eq!(dir.cw().ccw(), dir);
            assert_eq!(dir.ccw().cw(), dir);
        }
    }

    #[test]
    fn test_eight_cw_steps_return() {
        let mut dir = Direction8::North;
        for _ in 0..8 {
            dir = dir.cw();
        }
        assert_eq!(dir, Direction8::North);
    }

    #[test]
    fn test_opposite_delta_cancels() {
        for dir in Direction8::ALL {
            let (dx, dy) = dir.delta();
            let (ox, oy) = dir.opposite().delta();
            assert_eq!((dx + ox, dy + oy), (0, 0));
        }
    }

    #[test]
    fn test_index_matches_all_order() {
        for (i, dir) in Direction8::ALL.iter().enumerate() {
            assert_eq!(dir.index(), i);
        }
    }

    #[test]
    fn test_cardinals() {
        let count = Direction8::ALL.iter().filter(|d| d.is_cardinal()).count();
        assert_eq!(count, 4);
        assert!(Direction8::CARDINALS.iter().all(|d| d.is_cardinal()));
    }

    #[test]
    fn test_coord_step_and_order() {
        let c = MapCoord::new(3, 3);
        assert_eq!(c.step(Direction8::North), MapCoord::new(3, 2));
        assert_eq!(c.step(Direction8::SouthEast), MapCoord::new(4, 4));
        assert!(MapCoord::new(9, 0) < MapCoord::new(0, 1));
        assert_eq!(c.to_string(), "(3, 3)");
    }
}
