//! Game map structure with tiles and spatial queries.
//!
//! The map is a dense row-major array of [`Tile`]s addressed by
//! [`TileIndex`]. The topology is square with eight neighbours per tile and
//! optional east-west wrapping.

use crate::coord::{Direction8, MapCoord};
use crate::ruleset::Ruleset;
use crate::types::{CityId, ExtraId, ExtraSet, PlayerId, TerrainId, TileIndex, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The game map containing all tiles.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Map {
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    /// Does the map wrap horizontally?
    pub wrap_x: bool,
    /// All tiles in row-major order.
    pub tiles: Vec<Tile>,
    /// Number of land continents (numbered 1..=n).
    pub num_continents: i32,
    /// Number of oceans (numbered -1..=-n).
    pub num_oceans: i32,
    /// Tile count per ocean, indexed by `-continent`.
    pub ocean_sizes: Vec<i32>,
    /// Land continent enclosing each ocean, indexed by `-continent`.
    /// Zero when no land touches it, -1 when several continents do.
    pub lake_surrounders: Vec<i32>,
}

impl Map {
    /// Create a map filled with a single terrain type.
    pub fn filled(width: u32, height: u32, wrap_x: bool, terrain: TerrainId) -> Self {
        let tiles = (0..(width * height) as usize)
            .map(|index| Tile::new(index, terrain))
            .collect();
        Self {
            width,
            height,
            wrap_x,
            tiles,
            num_continents: 0,
            num_oceans: 0,
            ocean_sizes: vec![0],
            lake_surrounders: vec![0],
        }
    }

    /// Count total tiles in the map.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile(&self, index: TileIndex) -> &Tile {
        &self.tiles[index]
    }

    pub fn tile_mut(&mut self, index: TileIndex) -> &mut Tile {
        &mut self.tiles[index]
    }

    /// Check if a coordinate is within the map bounds.
    pub fn in_bounds(&self, coord: &MapCoord) -> bool {
        let x_ok = self.wrap_x || (coord.x >= 0 && (coord.x as u32) < self.width);
        x_ok && coord.y >= 0 && (coord.y as u32) < self.height
    }

    /// Wrap a coordinate if the map wraps horizontally.
    pub fn wrap_coord(&self, coord: &MapCoord) -> MapCoord {
        if self.wrap_x {
            let w = self.width as i32;
            MapCoord::new(coord.x.rem_euclid(w), coord.y)
        } else {
            *coord
        }
    }

    /// Linear index of a coordinate, or `None` when off the map.
    pub fn index_of(&self, coord: &MapCoord) -> Option<TileIndex> {
        if !self.in_bounds(coord) {
            return None;
        }
        let c = self.wrap_coord(coord);
        Some(c.y as usize * self.width as usize + c.x as usize)
    }

    pub fn coord_of(&self, index: TileIndex) -> MapCoord {
        let w = self.width as usize;
        MapCoord::new((index % w) as i32, (index / w) as i32)
    }

    /// The tile one step away in `dir`, if any.
    pub fn mapstep(&self, index: TileIndex, dir: Direction8) -> Option<TileIndex> {
        self.index_of(&self.coord_of(index).step(dir))
    }

    /// Shortest `(dx, dy)` from `a` to `b`, taking wrapping into account.
    pub fn distance_vector(&self, a: TileIndex, b: TileIndex) -> (i32, i32) {
        let ca = self.coord_of(a);
        let cb = self.coord_of(b);
        let mut dx = cb.x - ca.x;
        let dy = cb.y - ca.y;
        if self.wrap_x {
            let w = self.width as i32;
            dx = dx.rem_euclid(w);
            if dx > w / 2 {
                dx -= w;
            }
        }
        (dx, dy)
    }

    /// Squared euclidean distance between two tiles.
    pub fn sq_distance(&self, a: TileIndex, b: TileIndex) -> i32 {
        let (dx, dy) = self.distance_vector(a, b);
        dx * dx + dy * dy
    }

    /// Number of king moves between two tiles.
    pub fn real_distance(&self, a: TileIndex, b: TileIndex) -> i32 {
        let (dx, dy) = self.distance_vector(a, b);
        dx.abs().max(dy.abs())
    }

    pub fn is_adjacent(&self, a: TileIndex, b: TileIndex) -> bool {
        a != b && self.real_distance(a, b) == 1
    }

    /// Direction of the single step from `a` to the adjacent tile `b`.
    pub fn direction_between(&self, a: TileIndex, b: TileIndex) -> Option<Direction8> {
        Direction8::ALL
            .into_iter()
            .find(|d| self.mapstep(a, *d) == Some(b))
    }

    /// Neighbouring tiles in canonical direction order.
    pub fn adjacent(&self, index: TileIndex) -> Vec<TileIndex> {
        self.adjacent_dirs(index).into_iter().map(|(_, t)| t).collect()
    }

    /// Neighbouring tiles with the direction leading to each.
    pub fn adjacent_dirs(&self, index: TileIndex) -> Vec<(Direction8, TileIndex)> {
        Direction8::ALL
            .into_iter()
            .filter_map(|d| self.mapstep(index, d).map(|t| (d, t)))
            .collect()
    }

    /// Edge-sharing neighbours.
    pub fn cardinal_adjacent(&self, index: TileIndex) -> Vec<TileIndex> {
        Direction8::CARDINALS
            .into_iter()
            .filter_map(|d| self.mapstep(index, d))
            .collect()
    }

    /// Tiles within `radius_sq` of `center` together with their squared
    /// distance, ordered by increasing distance (ties by index). A negative
    /// radius yields nothing.
    pub fn circle_dxyr(&self, center: TileIndex, radius_sq: i32) -> Vec<(TileIndex, i32)> {
        if radius_sq < 0 {
            return Vec::new();
        }
        let r = isqrt(radius_sq);
        let c = self.coord_of(center);
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                let dr = dx * dx + dy * dy;
                if dr > radius_sq {
                    continue;
                }
                if let Some(t) = self.index_of(&MapCoord::new(c.x + dx, c.y + dy)) {
                    out.push((t, dr));
                }
            }
        }
        out.sort_by_key(|&(t, dr)| (dr, t));
        // On narrow wrapped maps the same tile can be reached twice.
        out.retain(|(t, _)| seen.insert(*t));
        out
    }

    /// Whether the tile's terrain is oceanic.
    pub fn is_ocean_tile(&self, ruleset: &Ruleset, index: TileIndex) -> bool {
        ruleset.is_ocean(self.tile(index).terrain)
    }

    /// Size of an ocean by its (negative) continent number.
    pub fn ocean_size(&self, continent: i32) -> i32 {
        self.ocean_sizes
            .get(continent.unsigned_abs() as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Continent enclosing an ocean, see [`Map::lake_surrounders`].
    pub fn lake_surrounder(&self, continent: i32) -> i32 {
        self.lake_surrounders
            .get(continent.unsigned_abs() as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Number all land masses (positive) and bodies of water (negative),
    /// then compute ocean sizes and lake surrounders.
    pub fn assign_continent_numbers(&mut self, ruleset: &Ruleset) {
        for tile in &mut self.tiles {
            tile.continent = 0;
        }
        self.num_continents = 0;
        self.num_oceans = 0;
        self.ocean_sizes = vec![0];

        for start in 0..self.tiles.len() {
            if self.tiles[start].continent != 0 {
                continue;
            }
            let ocean = self.is_ocean_tile(ruleset, start);
            let number = if ocean {
                self.num_oceans += 1;
                -self.num_oceans
            } else {
                self.num_continents += 1;
                self.num_continents
            };
            let size = self.flood_continent(ruleset, start, number, ocean);
            if ocean {
                self.ocean_sizes.push(size);
            }
        }

        self.lake_surrounders = vec![0; self.num_oceans as usize + 1];
        for index in 0..self.tiles.len() {
            let cont = self.tiles[index].continent;
            if cont >= 0 {
                continue;
            }
            for adj in self.adjacent(index) {
                let land = self.tiles[adj].continent;
                if land <= 0 {
                    continue;
                }
                let slot = &mut self.lake_surrounders[(-cont) as usize];
                if *slot == 0 {
                    *slot = land;
                } else if *slot != land {
                    *slot = -1;
                }
            }
        }
        tracing::debug!(
            continents = self.num_continents,
            oceans = self.num_oceans,
            "assigned continent numbers"
        );
    }

    fn flood_continent(&mut self, ruleset: &Ruleset, start: TileIndex, number: i32, ocean: bool) -> i32 {
        let mut stack = vec![start];
        self.tiles[start].continent = number;
        let mut size = 0;
        while let Some(index) = stack.pop() {
            size += 1;
            for adj in self.adjacent(index) {
                if self.tiles[adj].continent == 0 && self.is_ocean_tile(ruleset, adj) == ocean {
                    self.tiles[adj].continent = number;
                    stack.push(adj);
                }
            }
        }
        size
    }
}

fn isqrt(n: i32) -> i32 {
    let mut r = (n as f64).sqrt() as i32;
    while r * r > n {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= n {
        r += 1;
    }
    r
}

/// A single tile on the map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tile {
    /// Linear position on the map.
    pub index: TileIndex,
    pub terrain: TerrainId,
    /// Improvements, bases, huts and rivers.
    pub extras: ExtraSet,
    pub resource: Option<ExtraId>,
    /// Player owning the tile through borders.
    pub owner: Option<PlayerId>,
    /// Border source tile that claimed this tile.
    pub claimer: Option<TileIndex>,
    /// Player owning the bases on this tile.
    pub extras_owner: Option<PlayerId>,
    /// Continent (> 0) or ocean (< 0) number.
    pub continent: i32,
    pub city: Option<CityId>,
    /// Units on the tile, in arrival order.
    pub units: Vec<UnitId>,
}

impl Tile {
    pub fn new(index: TileIndex, terrain: TerrainId) -> Self {
        Self {
            index,
            terrain,
            extras: ExtraSet::EMPTY,
            resource: None,
            owner: None,
            claimer: None,
            extras_owner: None,
            continent: 0,
            city: None,
            units: Vec::new(),
        }
    }

    pub fn has_extra(&self, extra: ExtraId) -> bool {
        self.extras.contains(extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OCEAN: TerrainId = 1;
    const GRASSLAND: TerrainId = 6;

    fn island_map() -> Map {
        // 8x6 ocean with a 2x2 island at (2,2) and a single tile island at (6,4)
        let mut map = Map::filled(8, 6, false, OCEAN);
        for (x, y) in [(2, 2), (3, 2), (2, 3), (3, 3), (6, 4)] {
            let idx = map.index_of(&MapCoord::new(x, y)).unwrap();
            map.tile_mut(idx).terrain = GRASSLAND;
        }
        map.assign_continent_numbers(&Ruleset::classic());
        map
    }

    #[test]
    fn test_map_filled() {
        let map = Map::filled(10, 10, false, GRASSLAND);
        assert_eq!(map.len(), 100);
        assert_eq!(map.tile(55).terrain, GRASSLAND);
        assert_eq!(map.coord_of(55), MapCoord::new(5, 5));
    }

    #[test]
    fn test_mapstep_bounds() {
        let map = Map::filled(5, 5, false, GRASSLAND);
        assert_eq!(map.mapstep(0, Direction8::North), None);
        assert_eq!(map.mapstep(0, Direction8::West), None);
        assert_eq!(map.mapstep(0, Direction8::SouthEast), Some(6));
        assert_eq!(map.adjacent(0).len(), 3);
        assert_eq!(map.adjacent(12).len(), 8);
        assert_eq!(map.cardinal_adjacent(12).len(), 4);
    }

    #[test]
    fn test_map_wrap() {
        let map = Map::filled(5, 5, true, GRASSLAND);
        assert_eq!(map.mapstep(0, Direction8::West), Some(4));
        assert_eq!(map.distance_vector(0, 4), (-1, 0));
        assert_eq!(map.sq_distance(0, 4), 1);
        assert!(map.is_adjacent(0, 4));
        assert_eq!(map.direction_between(0, 4), Some(Direction8::West));
    }

    // =========================================================================
    // Circle iteration
    // =========================================================================

    #[test]
    fn test_circle_zero_radius_is_center() {
        let map = Map::filled(9, 9, false, GRASSLAND);
        assert_eq!(map.circle_dxyr(40, 0), vec![(40, 0)]);
        assert!(map.circle_dxyr(40, -1).is_empty());
    }

    #[test]
    fn test_circle_radius_two() {
        let map = Map::filled(9, 9, false, GRASSLAND);
        let circle = map.circle_dxyr(40, 2);
        assert_eq!(circle.len(), 9);
        assert_eq!(circle[0], (40, 0));
        assert!(circle.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_circle_radius_five() {
        let map = Map::filled(9, 9, false, GRASSLAND);
        // 1 + 4 + 4 + 4 + 8 tiles at distances 0, 1, 2, 4, 5
        assert_eq!(map.circle_dxyr(40, 5).len(), 21);
    }

    #[test]
    fn test_circle_clipped_at_edge() {
        let map = Map::filled(9, 9, false, GRASSLAND);
        assert_eq!(map.circle_dxyr(0, 2).len(), 4);
    }

    #[test]
    fn test_circle_no_duplicates_on_narrow_wrap() {
        let map = Map::filled(3, 9, true, GRASSLAND);
        let circle = map.circle_dxyr(13, 8);
        let unique: HashSet<_> = circle.iter().map(|(t, _)| *t).collect();
        assert_eq!(unique.len(), circle.len());
    }

    // =========================================================================
    // Continents
    // =========================================================================

    #[test]
    fn test_continent_numbering() {
        let map = island_map();
        assert_eq!(map.num_continents, 2);
        assert_eq!(map.num_oceans, 1);
        let island = map.index_of(&MapCoord::new(2, 2)).unwrap();
        let other = map.index_of(&MapCoord::new(3, 3)).unwrap();
        assert_eq!(map.tile(island).continent, map.tile(other).continent);
        assert!(map.tile(0).continent < 0);
        assert_eq!(map.ocean_size(-1), 48 - 5);
    }

    #[test]
    fn test_lake_surrounder_single_continent() {
        // 5x5 land with one lake tile in the middle
        let mut map = Map::filled(5, 5, false, GRASSLAND);
        map.tile_mut(12).terrain = 0;
        map.assign_continent_numbers(&Ruleset::classic());
        let lake = map.tile(12).continent;
        assert_eq!(lake, -1);
        assert_eq!(map.ocean_size(lake), 1);
        assert_eq!(map.lake_surrounder(lake), 1);
    }

    #[test]
    fn test_ocean_touching_two_continents() {
        let map = island_map();
        assert_eq!(map.lake_surrounder(-1), -1);
    }
}
