//! The world context: every piece of mutable game state in one place.
//!
//! Subsystems are implemented as `impl World` blocks in their own modules
//! (vision, borders, movement, orders, ...) and reach shared state through
//! `&mut self`, so tests can build small isolated worlds.

use crate::city::City;
use crate::diplomacy::{DiplStatus, DiplomacyState};
use crate::error::GameError;
use crate::map::Map;
use crate::packets::{EventType, Packet};
use crate::player::Player;
use crate::player_tile::PlayerTile;
use crate::rng::GameRng;
use crate::ruleset::Ruleset;
use crate::settings::GameSettings;
use crate::types::{
    CityId, ExtraId, PlayerId, TileIndex, UnitId, UnitTypeId, MAX_PLAYERS,
};
use crate::unit::Unit;
use crate::vision::{VisionArena, VisionId};
use std::collections::BTreeMap;

/// Why a unit left the game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WipeReason {
    Killed,
    Disbanded,
    /// Its transport died over terrain it cannot survive on.
    TransportLost,
    /// Killed by barbarians released from a hut.
    HutBarbarians,
    /// The owning player left the game.
    PlayerLeft,
}

/// Complete game state.
#[derive(Debug)]
pub struct World {
    pub ruleset: Ruleset,
    pub settings: GameSettings,
    pub map: Map,
    /// Indexed by [`PlayerId`]; dead players keep their slot.
    pub players: Vec<Player>,
    pub diplomacy: DiplomacyState,
    pub units: BTreeMap<UnitId, Unit>,
    pub cities: BTreeMap<CityId, City>,
    pub visions: VisionArena,
    /// Vision sources of owned bases, by tile and base extra.
    pub base_visions: BTreeMap<(TileIndex, ExtraId), VisionId>,
    pub rng: GameRng,
    pub turn: u32,
    next_unit_id: UnitId,
    next_city_id: CityId,
}

impl World {
    /// Build a world over `map`. Continent numbers are assigned here.
    pub fn new(ruleset: Ruleset, settings: GameSettings, mut map: Map) -> Result<Self, GameError> {
        ruleset.validate()?;
        settings.validate()?;
        map.assign_continent_numbers(&ruleset);
        let rng = GameRng::new(settings.seed);
        tracing::info!(
            ruleset = %ruleset.name,
            width = map.width,
            height = map.height,
            "world created"
        );
        Ok(Self {
            ruleset,
            settings,
            map,
            players: Vec::new(),
            diplomacy: DiplomacyState::default(),
            units: BTreeMap::new(),
            cities: BTreeMap::new(),
            visions: VisionArena::default(),
            base_visions: BTreeMap::new(),
            rng,
            turn: 1,
            next_unit_id: 1,
            next_city_id: 1,
        })
    }

    // =========================================================================
    // Players
    // =========================================================================

    /// Add a player and allocate their private map.
    pub fn add_player(&mut self, name: impl Into<String>) -> Result<PlayerId, GameError> {
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::TooManyPlayers);
        }
        let id = self.players.len() as PlayerId;
        let player = Player::new(id, name, self.map.len());
        tracing::info!(player = id, name = %player.name, "player added");
        self.players.push(player);
        if self.settings.borders.grants_vision() {
            self.set_border_vision(id, true);
        }
        Ok(id)
    }

    /// Remove a player: their units and cities disappear, shared vision
    /// edges are cut, their territory is released and their map freed.
    pub fn remove_player(&mut self, player: PlayerId) -> Result<(), GameError> {
        self.check_alive(player)?;
        tracing::info!(player, "player leaving the game");

        let units: Vec<UnitId> = self
            .units
            .values()
            .filter(|u| u.owner == player)
            .map(|u| u.id)
            .collect();
        for id in units {
            self.wipe_unit(id, WipeReason::PlayerLeft);
        }
        let cities: Vec<CityId> = self
            .cities
            .values()
            .filter(|c| c.owner == player)
            .map(|c| c.id)
            .collect();
        for id in cities {
            self.remove_city(id)?;
        }
        for other in self.alive_players() {
            if self.gives_shared_vision(player, other) {
                self.remove_shared_vision(player, other);
            }
            if self.gives_shared_vision(other, player) {
                self.remove_shared_vision(other, player);
            }
        }
        self.set_border_vision(player, false);
        for tile in 0..self.map.len() {
            if self.map.tile(tile).owner == Some(player) {
                self.map_claim_ownership(tile, None, None, false);
            }
            if self.map.tile(tile).extras_owner == Some(player) {
                self.tile_claim_bases(tile, None);
            }
        }

        let p = &mut self.players[player as usize];
        p.is_alive = false;
        p.tiles = Vec::new();
        p.gives_shared_vision = Default::default();
        p.really_gives_vision = Default::default();
        self.diplomacy.remove_player(player);
        Ok(())
    }

    /// Ids of players still in the game, ascending.
    pub fn alive_players(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.is_alive)
            .map(|p| p.id)
            .collect()
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player, GameError> {
        self.players
            .get(id as usize)
            .ok_or(GameError::UnknownPlayer(id))
    }

    pub(crate) fn check_alive(&self, id: PlayerId) -> Result<(), GameError> {
        if self.player(id)?.is_alive {
            Ok(())
        } else {
            Err(GameError::PlayerDead(id))
        }
    }

    pub(crate) fn has_player_map(&self, id: PlayerId) -> bool {
        self.players.get(id as usize).is_some_and(|p| p.has_map())
    }

    /// The player's memory of a tile; `None` for unknown players or tiles.
    pub fn plrtile(&self, player: PlayerId, tile: TileIndex) -> Option<&PlayerTile> {
        self.players.get(player as usize)?.tiles.get(tile)
    }

    pub(crate) fn plrtile_mut(&mut self, player: PlayerId, tile: TileIndex) -> Option<&mut PlayerTile> {
        self.players.get_mut(player as usize)?.tiles.get_mut(tile)
    }

    /// Change diplomatic state and refresh who can see whose units.
    pub fn set_diplstate(&mut self, a: PlayerId, b: PlayerId, status: DiplStatus) {
        self.diplomacy.set_status(a, b, status);
        let affected: Vec<UnitId> = self
            .units
            .values()
            .filter(|u| u.owner == a || u.owner == b)
            .map(|u| u.id)
            .collect();
        for id in affected {
            let owner = self.units[&id].owner;
            let other = if owner == a { b } else { a };
            if self.can_player_see_unit(other, id) {
                self.send_unit_info(Some(other), id);
            } else {
                self.send_packet(other, Packet::UnitRemove { id });
            }
        }
    }

    // =========================================================================
    // Packets
    // =========================================================================

    pub(crate) fn send_packet(&mut self, player: PlayerId, packet: Packet) {
        if let Some(p) = self.players.get_mut(player as usize) {
            if p.is_alive {
                p.connection.send(packet);
            }
        }
    }

    /// Send a message to a player.
    pub fn notify_player(
        &mut self,
        player: PlayerId,
        tile: Option<TileIndex>,
        event: EventType,
        message: impl Into<String>,
    ) {
        let message = message.into();
        tracing::debug!(player, ?event, %message, "notify");
        self.send_packet(
            player,
            Packet::Notify {
                tile,
                event,
                message,
            },
        );
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn unit(&self, id: UnitId) -> Result<&Unit, GameError> {
        self.units.get(&id).ok_or(GameError::UnknownUnit(id))
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Result<&mut Unit, GameError> {
        self.units.get_mut(&id).ok_or(GameError::UnknownUnit(id))
    }

    pub fn city(&self, id: CityId) -> Result<&City, GameError> {
        self.cities.get(&id).ok_or(GameError::UnknownCity(id))
    }

    pub(crate) fn next_city_id(&mut self) -> CityId {
        let id = self.next_city_id;
        self.next_city_id += 1;
        id
    }

    pub(crate) fn check_tile(&self, tile: TileIndex) -> Result<(), GameError> {
        if tile < self.map.len() {
            Ok(())
        } else {
            Err(GameError::InvalidTile(tile))
        }
    }

    /// Whether any unit on `tile` belongs to a player not allied with `player`.
    pub fn is_non_allied_unit_tile(&self, tile: TileIndex, player: PlayerId) -> bool {
        self.map
            .tile(tile)
            .units
            .iter()
            .filter_map(|id| self.units.get(id))
            .any(|u| !self.diplomacy.allied(player, u.owner))
    }

    /// Whether any unit on `tile` belongs to `player` or an ally.
    pub fn is_allied_unit_tile(&self, tile: TileIndex, player: PlayerId) -> bool {
        self.map
            .tile(tile)
            .units
            .iter()
            .filter_map(|id| self.units.get(id))
            .any(|u| self.diplomacy.allied(player, u.owner))
    }

    /// Whether any unit on `tile` belongs to a player at war with `player`.
    pub fn is_enemy_unit_tile(&self, tile: TileIndex, player: PlayerId) -> bool {
        self.map
            .tile(tile)
            .units
            .iter()
            .filter_map(|id| self.units.get(id))
            .any(|u| self.diplomacy.at_war(player, u.owner))
    }

    /// City on `tile` owned by someone not allied with `player`.
    pub fn is_non_allied_city_tile(&self, tile: TileIndex, player: PlayerId) -> Option<CityId> {
        let city = self.map.tile(tile).city?;
        let owner = self.cities.get(&city)?.owner;
        (!self.diplomacy.allied(player, owner)).then_some(city)
    }

    // =========================================================================
    // Unit lifecycle
    // =========================================================================

    /// Place a new unit. Units created on terrain they cannot survive on are
    /// loaded into a transport there, or rejected.
    pub fn create_unit(
        &mut self,
        owner: PlayerId,
        utype: UnitTypeId,
        tile: TileIndex,
        veteran: u8,
    ) -> Result<UnitId, GameError> {
        self.check_alive(owner)?;
        self.check_tile(tile)?;
        if utype as usize >= self.ruleset.unit_types.len() {
            return Err(GameError::UnknownUnit(utype as UnitId));
        }
        let native = self
            .ruleset
            .is_native_terrain(utype, self.map.tile(tile).terrain);
        let id = self.next_unit_id;
        let transport = if native {
            None
        } else {
            let t = self.transporter_for_unit_at(owner, utype, tile);
            if t.is_none() {
                return Err(GameError::NonNativeTile {
                    unit: self.ruleset.unit_type(utype).name.clone(),
                    tile,
                });
            }
            t
        };
        self.next_unit_id += 1;

        let vision = self.vision_new(owner, tile, self.settings.vision_reveal_tiles);
        let mut unit = Unit::new(id, utype, owner, tile, vision, &self.ruleset);
        unit.veteran = veteran.min(self.ruleset.max_veteran_level());
        unit.homecity = self
            .map
            .tile(tile)
            .city
            .filter(|c| self.cities.get(c).is_some_and(|c| c.owner == owner));
        self.units.insert(id, unit);
        self.map.tile_mut(tile).units.push(id);
        if let Some(transport) = transport {
            self.unit_transport_load(id, transport);
        }
        tracing::debug!(unit = id, owner, utype, tile, "unit created");

        self.unit_refresh_vision(id);
        self.send_unit_info(None, id);
        self.refresh_city_occupancy(tile);
        Ok(id)
    }

    /// Remove a unit from the game, dealing with its cargo and vision.
    pub fn wipe_unit(&mut self, id: UnitId, reason: WipeReason) {
        let Some(unit) = self.units.get(&id) else {
            return;
        };
        let (owner, tile, vision) = (unit.owner, unit.tile, unit.vision);
        tracing::debug!(unit = id, owner, tile, ?reason, "wiping unit");

        for cargo in self.unit_list_cargo(id) {
            let cargo_type = self.units[&cargo].utype;
            if self
                .ruleset
                .is_native_terrain(cargo_type, self.map.tile(tile).terrain)
            {
                self.unit_transport_unload(cargo);
                self.send_unit_info(None, cargo);
            } else {
                self.wipe_unit(cargo, WipeReason::TransportLost);
            }
        }
        if self.units[&id].is_transported() {
            self.unit_transport_unload(id);
        }

        for p in self.alive_players() {
            if p == owner || self.can_player_see_unit(p, id) {
                self.send_packet(p, Packet::UnitRemove { id });
            }
        }
        self.vision_clear_sight(vision);
        self.vision_free(vision);
        self.map.tile_mut(tile).units.retain(|u| *u != id);
        self.units.remove(&id);
        self.refresh_city_occupancy(tile);
    }
}
