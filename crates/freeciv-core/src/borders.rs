//! National borders.
//!
//! Cities and territory-claiming bases are border sources. Each source
//! claims the tiles within its radius unless a stronger source already
//! holds them; a tile's strength from a source falls off with the squared
//! distance. Removing a source only releases what it held, without letting
//! weaker rivals take over, so [`World::map_calculate_borders`] is run once
//! per turn to settle everything.

use crate::ruleset::TechFlag;
use crate::settings::BorderMode;
use crate::types::{ExtraId, PlayerId, TileIndex, VRadius, CITY_MAP_MAX_RADIUS_SQ};
use crate::world::World;

/// Lakes up to this many tiles may be claimed from their shore.
pub const MINIMUM_CLAIMED_OCEAN_SIZE: i32 = 10;

impl World {
    // =========================================================================
    // Sources and strength
    // =========================================================================

    /// Whether `tile` holds a city or an owned territory-claiming base.
    pub fn is_border_source(&self, tile: TileIndex) -> bool {
        let t = self.map.tile(tile);
        if t.city.is_some() {
            return true;
        }
        t.extras_owner.is_some()
            && t
                .extras
                .iter()
                .any(|e| self.ruleset.extra(e).claims_territory())
    }

    /// Player on whose behalf a source tile claims borders.
    pub fn border_source_owner(&self, tile: TileIndex) -> Option<PlayerId> {
        self.city_owner_at(tile)
            .or_else(|| self.map.tile(tile).extras_owner)
    }

    /// Squared radius a source claims.
    pub fn tile_border_source_radius_sq(&self, tile: TileIndex) -> i32 {
        if self.settings.borders == BorderMode::Disabled {
            return 0;
        }
        let t = self.map.tile(tile);
        if let Some(city) = t.city.and_then(|c| self.cities.get(&c)) {
            return self.settings.border_city_radius_sq
                + (city.size as i32).min(CITY_MAP_MAX_RADIUS_SQ) * self.settings.border_size_effect;
        }
        t.extras
            .iter()
            .map(|e| self.ruleset.extra(e))
            .filter(|e| e.claims_territory())
            .map(|e| e.border_sq)
            .max()
            .unwrap_or(0)
    }

    /// Raw strength of a source: city size plus two, or one for bases.
    pub fn tile_border_source_strength(&self, source: TileIndex) -> i32 {
        match self.map.tile(source).city.and_then(|c| self.cities.get(&c)) {
            Some(city) => city.size as i32 + 2,
            None => 1,
        }
    }

    /// Strength of `source`'s claim on `tile`. A source holds its own tile
    /// with infinite strength.
    pub fn tile_border_strength(&self, tile: TileIndex, source: TileIndex) -> i32 {
        let sq_dist = self.map.sq_distance(tile, source);
        if sq_dist == 0 {
            return i32::MAX;
        }
        let strength = self.tile_border_source_strength(source);
        strength * strength / sq_dist
    }

    /// Whether ocean `tile` may be claimed from `source` by `player`.
    pub fn is_claimable_ocean(&self, tile: TileIndex, source: TileIndex, player: PlayerId) -> bool {
        let cont = self.map.tile(tile).continent;
        let source_cont = self.map.tile(source).continent;

        if self.map.ocean_size(cont) <= MINIMUM_CLAIMED_OCEAN_SIZE
            && self.map.lake_surrounder(cont) == source_cont
        {
            return true;
        }
        if tile == source {
            return true;
        }
        if let Ok(p) = self.player(player) {
            if p.has_tech_flag(&self.ruleset, TechFlag::ClaimOcean)
                || (source_cont < 0 && p.has_tech_flag(&self.ruleset, TechFlag::ClaimOceanLimited))
            {
                return true;
            }
        }

        let mut ocean_tiles = 0;
        let mut other_continent = false;
        for adj in self.map.adjacent(tile) {
            if adj == source {
                return true;
            }
            let adj_cont = self.map.tile(adj).continent;
            if adj_cont == cont {
                ocean_tiles += 1;
            } else if adj_cont != source_cont {
                other_continent = true;
            }
        }
        !other_continent && ocean_tiles <= 2
    }

    // =========================================================================
    // Claiming
    // =========================================================================

    /// Claim the tiles around `source` for `owner`. A negative `radius_sq`
    /// means the source's own radius.
    pub fn map_claim_border(&mut self, source: TileIndex, owner: PlayerId, radius_sq: i32) {
        if self.settings.borders == BorderMode::Disabled {
            return;
        }
        let radius_sq = if radius_sq < 0 {
            self.tile_border_source_radius_sq(source)
        } else {
            radius_sq
        };
        tracing::debug!(source, owner, radius_sq, "claiming border");

        for (tile, dr) in self.map.circle_dxyr(source, radius_sq) {
            let claimer = self.map.tile(tile).claimer;
            if dr != 0 && self.is_border_source(tile) {
                continue;
            }
            if claimer == Some(source) {
                continue;
            }
            if let Some(incumbent) = claimer {
                if self.within_permanent_radius(tile, incumbent) {
                    continue;
                }
                let old = self.tile_border_strength(tile, incumbent);
                let new = self.tile_border_strength(tile, source);
                if new <= old {
                    continue;
                }
            }
            if self.map.is_ocean_tile(&self.ruleset, tile) {
                if !self.is_claimable_ocean(tile, source, owner) {
                    continue;
                }
            } else if self.map.tile(tile).continent != self.map.tile(source).continent {
                continue;
            }
            if self.settings.borders < BorderMode::Expand && !self.map_is_known(owner, tile) {
                continue;
            }
            self.map_claim_ownership(tile, Some(owner), Some(source), dr == 0);
        }
    }

    /// Whether `tile` lies in the never-lost area of the city at `claimer`.
    fn within_permanent_radius(&self, tile: TileIndex, claimer: TileIndex) -> bool {
        let Some(city) = self.map.tile(claimer).city.and_then(|c| self.cities.get(&c)) else {
            return false;
        };
        self.map.sq_distance(claimer, tile)
            <= city.radius_sq + self.settings.border_city_permanent_radius_sq
    }

    /// Release every tile claimed by `source`. Other sources are not
    /// consulted; the next full recalculation settles the freed tiles.
    pub fn map_clear_border(&mut self, source: TileIndex) {
        let radius_sq = self.tile_border_source_radius_sq(source);
        tracing::debug!(source, radius_sq, "clearing border");
        for (tile, _) in self.map.circle_dxyr(source, radius_sq) {
            if self.map.tile(tile).claimer == Some(source) {
                self.map_claim_ownership(tile, None, None, false);
            }
        }
    }

    /// Set the owner and claimer of a tile and tell everyone who should know.
    pub fn map_claim_ownership(
        &mut self,
        tile: TileIndex,
        owner: Option<PlayerId>,
        source: Option<TileIndex>,
        claim_bases: bool,
    ) {
        let old_owner = self.map.tile(tile).owner;
        if old_owner != owner {
            self.map_update_border(tile, old_owner, owner);
        }
        let t = self.map.tile_mut(tile);
        t.owner = owner;
        t.claimer = source;
        if claim_bases {
            self.tile_claim_bases(tile, owner);
        }

        let fogged_borders = self.settings.foggedborders;
        for p in self.alive_players() {
            if self.map_is_known_and_seen(p, tile, crate::types::VisionLayer::Main) {
                if self.update_player_tile_knowledge(p, tile) {
                    self.send_tile_info(p, tile);
                }
            } else if !fogged_borders && self.map_is_known(p, tile) {
                self.send_tile_info(p, tile);
            }
        }
    }

    /// Give every base on `tile` to `owner`, moving base vision along.
    pub fn tile_claim_bases(&mut self, tile: TileIndex, owner: Option<PlayerId>) {
        let old = self.map.tile(tile).extras_owner;
        if old == owner {
            return;
        }
        let bases: Vec<ExtraId> = self
            .map
            .tile(tile)
            .extras
            .iter()
            .filter(|e| self.ruleset.extra(*e).is_base())
            .collect();
        if bases.is_empty() {
            return;
        }
        self.map.tile_mut(tile).extras_owner = owner;
        for base in bases {
            self.map_claim_base(tile, base, owner);
        }
    }

    /// Move the vision of one base to `owner`.
    pub fn map_claim_base(&mut self, tile: TileIndex, base: ExtraId, owner: Option<PlayerId>) {
        if !self.map.tile(tile).has_extra(base) {
            return;
        }
        if let Some(vision) = self.base_visions.remove(&(tile, base)) {
            self.vision_clear_sight(vision);
            self.vision_free(vision);
        }
        let extra = self.ruleset.extra(base);
        let (Some(owner), true) = (owner, extra.has_vision()) else {
            return;
        };
        let radius = VRadius::new(extra.vision_main_sq, extra.vision_invis_sq, extra.vision_subs_sq);
        tracing::debug!(tile, base, owner, "base vision transferred");
        let vision = self.vision_new(owner, tile, self.settings.vision_reveal_tiles);
        self.vision_change_sight(vision, radius);
        self.base_visions.insert((tile, base), vision);
    }

    /// Ownership changed: move border vision from the old owner to the new.
    pub fn map_update_border(&mut self, tile: TileIndex, old: Option<PlayerId>, new: Option<PlayerId>) {
        if !self.settings.borders.grants_vision() || old == new {
            return;
        }
        if let Some(p) = new {
            if self.players.get(p as usize).is_some_and(|p| p.border_vision) {
                self.shared_vision_change_seen(p, tile, [1, 0, 0], true);
            }
        }
        if let Some(p) = old {
            if self.players.get(p as usize).is_some_and(|p| p.border_vision) {
                self.shared_vision_change_seen(p, tile, [-1, 0, 0], true);
            }
        }
    }

    /// Turn seeing inside one's own borders on or off.
    pub fn set_border_vision(&mut self, player: PlayerId, enabled: bool) {
        let Some(current) = self.players.get(player as usize).map(|p| p.border_vision) else {
            return;
        };
        if current == enabled {
            return;
        }
        self.players[player as usize].border_vision = enabled;
        if !self.settings.borders.grants_vision() {
            return;
        }
        let change = if enabled { 1 } else { -1 };
        self.buffer_shared_vision(player);
        for tile in 0..self.map.len() {
            if self.map.tile(tile).owner == Some(player) {
                self.shared_vision_change_seen(player, tile, [change, 0, 0], true);
            }
        }
        self.unbuffer_shared_vision(player);
    }

    /// Recompute every border from every source.
    pub fn map_calculate_borders(&mut self) {
        if self.settings.borders == BorderMode::Disabled {
            return;
        }
        tracing::debug!(turn = self.turn, "recalculating borders");
        for tile in 0..self.map.len() {
            if !self.is_border_source(tile) {
                continue;
            }
            if let Some(owner) = self.border_source_owner(tile) {
                self.map_claim_border(tile, owner, -1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::map::Map;
    use crate::ruleset::Ruleset;
    use crate::settings::{BorderMode, GameSettings};
    use crate::types::{KnownState, VisionLayer};
    use crate::world::World;

    fn world_with(settings: GameSettings) -> World {
        let ruleset = Ruleset::classic();
        let grass = ruleset.terrain_by_name("Grassland").unwrap();
        let map = Map::filled(20, 20, false, grass);
        let mut world = World::new(ruleset, settings, map).unwrap();
        world.add_player("A").unwrap();
        world.add_player("B").unwrap();
        world
    }

    fn world() -> World {
        let mut settings = GameSettings::new();
        settings.borders = BorderMode::Expand;
        world_with(settings)
    }

    fn idx(x: usize, y: usize) -> usize {
        y * 20 + x
    }

    // =========================================================================
    // Strength
    // =========================================================================

    #[test]
    fn test_strength_falls_with_distance() {
        let mut world = world();
        let city = world.create_city(0, idx(5, 5), "Ur").unwrap();
        let near = world.tile_border_strength(idx(6, 5), idx(5, 5));
        let far = world.tile_border_strength(idx(8, 5), idx(5, 5));
        assert_eq!(near, 9);
        assert_eq!(far, 1);
        assert_eq!(world.tile_border_strength(idx(5, 5), idx(5, 5)), i32::MAX);
        world.city_change_size(city, 4).unwrap();
        assert_eq!(world.tile_border_strength(idx(6, 5), idx(5, 5)), 36);
    }

    #[test]
    fn test_source_radius_grows_with_size() {
        let mut world = world();
        let city = world.create_city(0, idx(5, 5), "Ur").unwrap();
        assert_eq!(world.tile_border_source_radius_sq(idx(5, 5)), 18);
        world.city_change_size(city, 5).unwrap();
        assert_eq!(world.tile_border_source_radius_sq(idx(5, 5)), 22);
    }

    // =========================================================================
    // Claims
    // =========================================================================

    #[test]
    fn test_stronger_source_takes_contested_tile() {
        let mut world = world();
        let a = world.create_city(0, idx(4, 10), "Ur").unwrap();
        world.create_city(1, idx(10, 10), "Uruk").unwrap();
        // Tile (7,10) is equidistant; the first claimer keeps the tie.
        assert_eq!(world.map.tile(idx(7, 10)).owner, Some(0));

        assert_eq!(world.city(a).unwrap().size, 1);
        let b = world.map.tile(idx(10, 10)).city.unwrap();
        world.city_change_size(b, 6).unwrap();
        assert_eq!(world.map.tile(idx(7, 10)).owner, Some(1));
    }

    #[test]
    fn test_clear_border_leaves_tiles_unowned() {
        let mut world = world();
        let a = world.create_city(0, idx(4, 10), "Ur").unwrap();
        world.create_city(1, idx(10, 10), "Uruk").unwrap();
        world.remove_city(a).unwrap();
        assert_eq!(world.map.tile(idx(7, 10)).owner, None);

        world.map_calculate_borders();
        assert_eq!(world.map.tile(idx(7, 10)).owner, Some(1));
    }

    #[test]
    fn test_enabled_mode_skips_unknown_tiles() {
        let mut world = world_with(GameSettings::new());
        world.create_city(0, idx(10, 10), "Ur").unwrap();
        assert_eq!(world.map.tile(idx(12, 10)).owner, Some(0));
        assert_eq!(world.map.tile(idx(14, 10)).owner, None);
    }

    #[test]
    fn test_border_vision_in_see_inside_mode() {
        let mut settings = GameSettings::new();
        settings.borders = BorderMode::SeeInside;
        let mut world = world_with(settings);
        world.create_city(0, idx(10, 10), "Ur").unwrap();
        // Inside city vision and owned: two sources.
        assert_eq!(world.map_get_seen(0, idx(11, 10), VisionLayer::Main), 2);
        world.set_border_vision(0, false);
        assert_eq!(world.map_get_seen(0, idx(11, 10), VisionLayer::Main), 1);
    }

    #[test]
    fn test_small_lake_claimed_from_shore() {
        let mut world = world();
        let lake = world.ruleset.terrain_by_name("Lake").unwrap();
        world.map.tile_mut(idx(6, 5)).terrain = lake;
        world.map.assign_continent_numbers(&world.ruleset);
        world.create_city(0, idx(5, 5), "Ur").unwrap();
        assert_eq!(world.map.tile(idx(6, 5)).owner, Some(0));
        assert!(world.is_claimable_ocean(idx(6, 5), idx(5, 5), 0));
    }

    #[test]
    fn test_fortress_claims_and_sees() {
        let mut world = world();
        let fortress = world.ruleset.extra_by_name("Fortress").unwrap();
        let tile = idx(15, 15);
        world.map.tile_mut(tile).extras.insert(fortress);
        world.map_claim_ownership(tile, Some(1), Some(tile), true);
        world.map_claim_border(tile, 1, -1);

        assert!(world.is_border_source(tile));
        assert_eq!(world.map.tile(tile).extras_owner, Some(1));
        assert_eq!(world.map.tile(idx(16, 16)).owner, Some(1));
        assert_eq!(world.tile_get_known(1, idx(17, 15)), KnownState::KnownSeen);
        assert_eq!(world.map_get_seen(1, idx(16, 15), VisionLayer::Invis), 1);
        assert_eq!(world.base_visions.len(), 1);

        world.tile_claim_bases(tile, None);
        assert!(world.base_visions.is_empty());
        assert_eq!(world.map_get_seen(1, idx(16, 15), VisionLayer::Invis), 0);
    }
}
