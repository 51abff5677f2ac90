//! Per-player tile knowledge: the vision ledger.
//!
//! Every player holds one [`PlayerTile`] per map tile. It records what the
//! player last saw there and how many of their vision sources currently
//! cover it, per vision layer. A tile is *known* once revealed and stays
//! known forever; it is *seen* while the main-layer counter is positive.
//! While unseen, the snapshot is frozen at what was visible when the last
//! source looked away.

use crate::city::City;
use crate::packets::{Packet, TileInfo};
use crate::types::{
    AdvanceId, CityId, ExtraId, ExtraSet, KnownState, PlayerId, TerrainId, TileIndex, VisionLayer,
};
use crate::world::World;
use serde::{Deserialize, Serialize};

/// What a player remembers of a city they cannot currently see.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionSite {
    pub id: CityId,
    pub owner: PlayerId,
    pub tile: TileIndex,
    pub name: String,
    pub size: u32,
    pub walls: bool,
    pub occupied: bool,
}

impl VisionSite {
    pub fn from_city(city: &City, occupied: bool) -> Self {
        Self {
            id: city.id,
            owner: city.owner,
            tile: city.tile,
            name: city.name.clone(),
            size: city.size,
            walls: city.walls,
            occupied,
        }
    }
}

/// One player's view of one tile.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlayerTile {
    pub known: bool,
    pub terrain: Option<TerrainId>,
    pub extras: ExtraSet,
    pub resource: Option<ExtraId>,
    pub owner: Option<PlayerId>,
    pub extras_owner: Option<PlayerId>,
    /// Fogged city, if any.
    pub site: Option<VisionSite>,
    /// Turn the snapshot was last refreshed.
    pub last_updated: u32,
    /// Vision sources covering the tile, own and shared.
    pub seen_count: [u32; VisionLayer::COUNT],
    /// Vision sources of this player only.
    pub own_seen: [u32; VisionLayer::COUNT],
}

impl World {
    pub fn map_is_known(&self, player: PlayerId, tile: TileIndex) -> bool {
        self.plrtile(player, tile).is_some_and(|pt| pt.known)
    }

    pub fn map_is_known_and_seen(&self, player: PlayerId, tile: TileIndex, layer: VisionLayer) -> bool {
        self.plrtile(player, tile)
            .is_some_and(|pt| pt.known && pt.seen_count[layer.index()] > 0)
    }

    pub fn map_get_seen(&self, player: PlayerId, tile: TileIndex, layer: VisionLayer) -> u32 {
        self.plrtile(player, tile)
            .map_or(0, |pt| pt.seen_count[layer.index()])
    }

    pub fn map_get_own_seen(&self, player: PlayerId, tile: TileIndex, layer: VisionLayer) -> u32 {
        self.plrtile(player, tile)
            .map_or(0, |pt| pt.own_seen[layer.index()])
    }

    pub fn tile_get_known(&self, player: PlayerId, tile: TileIndex) -> KnownState {
        match self.plrtile(player, tile) {
            Some(pt) if pt.known && pt.seen_count[VisionLayer::Main.index()] > 0 => {
                KnownState::KnownSeen
            }
            Some(pt) if pt.known => KnownState::KnownUnseen,
            _ => KnownState::Unknown,
        }
    }

    pub(crate) fn map_set_known(&mut self, player: PlayerId, tile: TileIndex) {
        if let Some(pt) = self.plrtile_mut(player, tile) {
            pt.known = true;
        }
    }

    /// Forget a tile entirely. Used by scenario setup only.
    pub fn map_clear_known(&mut self, player: PlayerId, tile: TileIndex) {
        if let Some(pt) = self.plrtile_mut(player, tile) {
            pt.known = false;
        }
    }

    /// Whether `player` is able to notice `extra` at all.
    pub fn player_knows_extra_exist(&self, player: PlayerId, extra: ExtraId) -> bool {
        match self.ruleset.extra(extra).visibility_req {
            None => true,
            Some(req) => self
                .players
                .get(player as usize)
                .is_some_and(|p| p.knows_advance(req)),
        }
    }

    /// Extras and resource of the real tile, filtered by what `player` can notice.
    fn visible_extras(&self, player: PlayerId, tile: TileIndex) -> (ExtraSet, Option<ExtraId>) {
        let t = self.map.tile(tile);
        let extras = t
            .extras
            .iter()
            .filter(|e| self.player_knows_extra_exist(player, *e))
            .collect();
        let resource = t
            .resource
            .filter(|r| self.player_knows_extra_exist(player, *r));
        (extras, resource)
    }

    /// Copy the real tile into the player's snapshot. Returns whether
    /// anything changed.
    pub fn update_player_tile_knowledge(&mut self, player: PlayerId, tile: TileIndex) -> bool {
        if !self.has_player_map(player) {
            return false;
        }
        let (extras, resource) = self.visible_extras(player, tile);
        let real = self.map.tile(tile);
        let (terrain, owner, extras_owner) = (real.terrain, real.owner, real.extras_owner);
        let turn = self.turn;
        let Some(pt) = self.plrtile_mut(player, tile) else {
            return false;
        };
        pt.last_updated = turn;
        if pt.terrain == Some(terrain)
            && pt.extras == extras
            && pt.resource == resource
            && pt.owner == owner
            && pt.extras_owner == extras_owner
        {
            return false;
        }
        pt.terrain = Some(terrain);
        pt.extras = extras;
        pt.resource = resource;
        pt.owner = owner;
        pt.extras_owner = extras_owner;
        true
    }

    /// Refresh the snapshot of every player currently seeing `tile` and
    /// tell those whose knowledge changed.
    pub fn update_tile_knowledge(&mut self, tile: TileIndex) {
        for player in self.alive_players() {
            if self.map_is_known_and_seen(player, tile, VisionLayer::Main)
                && self.update_player_tile_knowledge(player, tile)
            {
                self.send_tile_info(player, tile);
            }
        }
    }

    /// Give `player` permanent sight of the whole map on every layer.
    pub fn map_know_and_see_all(&mut self, player: PlayerId) {
        tracing::info!(player, "player sees the whole map");
        self.buffer_shared_vision(player);
        for tile in 0..self.map.len() {
            self.map_change_seen(player, tile, [1; VisionLayer::COUNT], true);
        }
        self.unbuffer_shared_vision(player);
    }

    /// Teach `player` an advance. Seen tiles holding extras that the
    /// advance makes noticeable are refreshed.
    pub fn give_advance(&mut self, player: PlayerId, advance: AdvanceId) {
        let Some(p) = self.players.get_mut(player as usize) else {
            return;
        };
        if !p.advances.insert(advance) {
            return;
        }
        tracing::info!(player, advance, "advance learned");
        let revealed: Vec<ExtraId> = (0..self.ruleset.extras.len())
            .map(|e| e as ExtraId)
            .filter(|e| self.ruleset.extra(*e).visibility_req == Some(advance))
            .collect();
        if revealed.is_empty() {
            return;
        }
        for tile in 0..self.map.len() {
            let t = self.map.tile(tile);
            if !revealed
                .iter()
                .any(|e| t.has_extra(*e) || t.resource == Some(*e))
            {
                continue;
            }
            if self.map_is_known_and_seen(player, tile, VisionLayer::Main)
                && self.update_player_tile_knowledge(player, tile)
            {
                self.send_tile_info(player, tile);
            }
        }
    }

    /// Queue a tile info packet describing `tile` as `player` knows it.
    /// Unknown tiles are never sent.
    pub fn send_tile_info(&mut self, player: PlayerId, tile: TileIndex) {
        let known = self.tile_get_known(player, tile);
        let info = match known {
            KnownState::Unknown => return,
            KnownState::KnownSeen => {
                let (extras, resource) = self.visible_extras(player, tile);
                let real = self.map.tile(tile);
                TileInfo {
                    tile,
                    known,
                    terrain: Some(real.terrain),
                    extras,
                    resource,
                    owner: real.owner,
                    extras_owner: real.extras_owner,
                    continent: real.continent,
                }
            }
            KnownState::KnownUnseen => {
                let real_owner = self.map.tile(tile).owner;
                let continent = self.map.tile(tile).continent;
                let fogged_borders = self.settings.foggedborders;
                let Some(pt) = self.plrtile_mut(player, tile) else {
                    return;
                };
                if !fogged_borders {
                    pt.owner = real_owner;
                }
                TileInfo {
                    tile,
                    known,
                    terrain: pt.terrain,
                    extras: pt.extras,
                    resource: pt.resource,
                    owner: pt.owner,
                    extras_owner: pt.extras_owner,
                    continent,
                }
            }
        };
        self.send_packet(player, Packet::TileInfo(info));
    }

    /// Send tile info to every player who knows the tile.
    pub fn send_tile_info_all(&mut self, tile: TileIndex) {
        for player in self.alive_players() {
            self.send_tile_info(player, tile);
        }
    }

    /// Refresh the player's vision site for a city they can see.
    /// Returns whether the site changed.
    pub fn update_dumb_city(&mut self, player: PlayerId, city: CityId) -> bool {
        let Some(c) = self.cities.get(&city) else {
            return false;
        };
        let occupied = !self.map.tile(c.tile).units.is_empty();
        let site = VisionSite::from_city(c, occupied);
        let tile = c.tile;
        let Some(pt) = self.plrtile_mut(player, tile) else {
            return false;
        };
        if pt.site.as_ref() == Some(&site) {
            return false;
        }
        pt.site = Some(site);
        true
    }

    /// Drop a remembered city that no longer exists at `tile`.
    pub fn reality_check_city(&mut self, player: PlayerId, tile: TileIndex) {
        let real = self.map.tile(tile).city;
        let Some(pt) = self.plrtile_mut(player, tile) else {
            return;
        };
        let stale = match &pt.site {
            Some(site) if Some(site.id) != real => Some(site.id),
            _ => None,
        };
        if let Some(id) = stale {
            pt.site = None;
            tracing::debug!(player, tile, city = id, "removing stale vision site");
            self.send_packet(player, Packet::CityRemove { id });
        }
    }

    /// Copy `from`'s memory of `tile` to `dest` when it is newer than
    /// what `dest` has and `dest` cannot see the tile itself.
    pub(crate) fn give_tile_info_from_player_to_player(
        &mut self,
        from: PlayerId,
        dest: PlayerId,
        tile: TileIndex,
    ) {
        if !self.map_is_known(from, tile)
            || self.map_is_known_and_seen(dest, tile, VisionLayer::Main)
        {
            return;
        }
        let Some(src) = self.plrtile(from, tile).cloned() else {
            return;
        };
        let dest_known = self.map_is_known(dest, tile);
        let dest_updated = self.plrtile(dest, tile).map_or(0, |pt| pt.last_updated);
        if dest_known && src.last_updated <= dest_updated {
            return;
        }

        let Some(pt) = self.plrtile_mut(dest, tile) else {
            return;
        };
        pt.known = true;
        pt.terrain = src.terrain;
        pt.extras = src.extras;
        pt.resource = src.resource;
        pt.owner = src.owner;
        pt.extras_owner = src.extras_owner;
        pt.last_updated = src.last_updated;
        let old_site = pt.site.take();
        pt.site = src.site.clone();
        self.send_tile_info(dest, tile);

        if let Some(old) = old_site {
            if src.site.as_ref().map(|s| s.id) != Some(old.id) {
                self.send_packet(dest, Packet::CityRemove { id: old.id });
            }
        }
        if let Some(site) = src.site {
            self.send_packet(dest, Packet::CityShortInfo(site.into()));
        }
    }

    /// Give `dest` everything `from` knows that is newer.
    pub fn really_give_map_from_player_to_player(&mut self, from: PlayerId, dest: PlayerId) {
        self.buffer_shared_vision(dest);
        for tile in 0..self.map.len() {
            self.give_tile_info_from_player_to_player(from, dest, tile);
        }
        self.unbuffer_shared_vision(dest);
    }
}

impl From<VisionSite> for crate::packets::CityInfo {
    fn from(site: VisionSite) -> Self {
        Self {
            id: site.id,
            owner: site.owner,
            tile: site.tile,
            name: site.name,
            size: site.size,
            walls: site.walls,
            occupied: site.occupied,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::map::Map;
    use crate::packets::Packet;
    use crate::ruleset::Ruleset;
    use crate::settings::GameSettings;
    use crate::types::{KnownState, VisionLayer};
    use crate::world::World;

    fn world() -> World {
        let ruleset = Ruleset::classic();
        let grass = ruleset.terrain_by_name("Grassland").unwrap();
        let map = Map::filled(6, 6, false, grass);
        let mut world = World::new(ruleset, GameSettings::new(), map).unwrap();
        world.add_player("A").unwrap();
        world.add_player("B").unwrap();
        world
    }

    #[test]
    fn test_unknown_by_default() {
        let world = world();
        assert_eq!(world.tile_get_known(0, 7), KnownState::Unknown);
        assert!(!world.map_is_known(0, 7));
        assert_eq!(world.map_get_seen(0, 7, VisionLayer::Main), 0);
    }

    #[test]
    fn test_known_unseen_after_set_known() {
        let mut world = world();
        world.map_set_known(0, 7);
        assert_eq!(world.tile_get_known(0, 7), KnownState::KnownUnseen);
    }

    #[test]
    fn test_update_knowledge_reports_change_once() {
        let mut world = world();
        world.map_set_known(0, 7);
        assert!(world.update_player_tile_knowledge(0, 7));
        assert!(!world.update_player_tile_knowledge(0, 7));
        world.map.tile_mut(7).terrain = world.ruleset.terrain_by_name("Hills").unwrap();
        assert!(world.update_player_tile_knowledge(0, 7));
    }

    #[test]
    fn test_hidden_extra_filtered() {
        let mut world = world();
        let oil = world.ruleset.extra_by_name("Oil").unwrap();
        world.map.tile_mut(7).resource = Some(oil);
        world.map_set_known(0, 7);
        world.update_player_tile_knowledge(0, 7);
        assert_eq!(world.plrtile(0, 7).unwrap().resource, None);

        let refining = world.ruleset.advance_by_name("Refining").unwrap();
        world.players[0].advances.insert(refining);
        assert!(world.update_player_tile_knowledge(0, 7));
        assert_eq!(world.plrtile(0, 7).unwrap().resource, Some(oil));
    }

    #[test]
    fn test_learning_advance_reveals_seen_resource() {
        let mut world = world();
        let oil = world.ruleset.extra_by_name("Oil").unwrap();
        world.map.tile_mut(7).resource = Some(oil);
        world.map_know_and_see_all(0);
        assert_eq!(world.plrtile(0, 7).unwrap().resource, None);
        world.players[0].connection.take_packets();

        let refining = world.ruleset.advance_by_name("Refining").unwrap();
        world.give_advance(0, refining);
        assert_eq!(world.plrtile(0, 7).unwrap().resource, Some(oil));
        let packets = world.players[0].connection.take_packets();
        assert!(matches!(packets.as_slice(), [Packet::TileInfo(info)] if info.tile == 7));
    }

    #[test]
    fn test_know_and_see_all_covers_every_layer() {
        let mut world = world();
        world.map_know_and_see_all(1);
        for tile in 0..world.map.len() {
            assert_eq!(world.tile_get_known(1, tile), KnownState::KnownSeen);
            assert_eq!(world.map_get_seen(1, tile, VisionLayer::Subsurface), 1);
        }
    }

    #[test]
    fn test_send_tile_info_skips_unknown() {
        let mut world = world();
        world.send_tile_info(0, 3);
        assert!(world.players[0].connection.take_packets().is_empty());

        world.map_set_known(0, 3);
        world.update_player_tile_knowledge(0, 3);
        world.send_tile_info(0, 3);
        let packets = world.players[0].connection.take_packets();
        assert!(matches!(
            packets.as_slice(),
            [Packet::TileInfo(info)] if info.known == KnownState::KnownUnseen
        ));
    }

    #[test]
    fn test_give_tile_info_copies_newer_memory() {
        let mut world = world();
        world.turn = 4;
        world.map_set_known(0, 9);
        world.update_player_tile_knowledge(0, 9);
        world.give_tile_info_from_player_to_player(0, 1, 9);
        assert!(world.map_is_known(1, 9));
        assert_eq!(world.plrtile(1, 9).unwrap().last_updated, 4);
        assert_eq!(
            world.plrtile(1, 9).unwrap().terrain,
            world.plrtile(0, 9).unwrap().terrain
        );
    }
}
