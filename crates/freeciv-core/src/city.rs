//! Cities, as far as vision and borders need them.

use crate::error::GameError;
use crate::packets::{CityInfo, EventType, Packet};
use crate::types::{CityId, PlayerId, TileIndex, VRadius, VisionLayer};
use crate::vision::VisionId;
use crate::world::World;
use serde::{Deserialize, Serialize};

/// City size at which the work radius grows by one step.
const CITY_RADIUS_STEPS: [u32; 2] = [8, 16];

/// A city on the game map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub owner: PlayerId,
    /// Player who founded the city.
    pub original_owner: PlayerId,
    pub tile: TileIndex,
    pub name: String,
    /// Number of citizens.
    pub size: u32,
    /// Squared work radius.
    pub radius_sq: i32,
    pub walls: bool,
    pub vision: VisionId,
}

impl City {
    /// Squared work radius for a city of `size` starting at `init_radius_sq`.
    pub fn radius_sq_for_size(init_radius_sq: i32, size: u32) -> i32 {
        init_radius_sq
            + CITY_RADIUS_STEPS
                .iter()
                .filter(|step| size >= **step)
                .count() as i32
    }
}

impl World {
    /// Found a city. The city claims its own tile and the borders around it.
    pub fn create_city(
        &mut self,
        owner: PlayerId,
        tile: TileIndex,
        name: impl Into<String>,
    ) -> Result<CityId, GameError> {
        self.check_alive(owner)?;
        self.check_tile(tile)?;
        if self.map.tile(tile).city.is_some() {
            return Err(GameError::CityExists(tile));
        }
        if self.map.is_ocean_tile(&self.ruleset, tile) {
            return Err(GameError::InvalidTile(tile));
        }

        let id = self.next_city_id();
        let vision = self.vision_new(owner, tile, true);
        let city = City {
            id,
            owner,
            original_owner: owner,
            tile,
            name: name.into(),
            size: 1,
            radius_sq: self.settings.init_city_radius_sq,
            walls: false,
            vision,
        };
        tracing::info!(city = id, owner, tile, name = %city.name, "city founded");
        self.cities.insert(id, city);
        self.map.tile_mut(tile).city = Some(id);
        for unit in self.map.tile(tile).units.clone() {
            if let Some(u) = self.units.get_mut(&unit) {
                if u.owner == owner && u.homecity.is_none() {
                    u.homecity = Some(id);
                }
            }
        }

        self.city_refresh_vision(id);
        self.map_claim_ownership(tile, Some(owner), Some(tile), true);
        self.map_claim_border(tile, owner, -1);
        self.send_city_info(None, id);
        Ok(id)
    }

    /// Destroy a city. Players who see the tile learn at once; others keep
    /// their stale site until they look again.
    pub fn remove_city(&mut self, id: CityId) -> Result<(), GameError> {
        let city = self.city(id)?.clone();
        tracing::info!(city = id, owner = city.owner, tile = city.tile, "city removed");

        self.map_clear_border(city.tile);
        self.vision_clear_sight(city.vision);
        self.vision_free(city.vision);
        self.map.tile_mut(city.tile).city = None;
        self.cities.remove(&id);
        for u in self.units.values_mut() {
            if u.homecity == Some(id) {
                u.homecity = None;
            }
        }
        if self.map.tile(city.tile).claimer == Some(city.tile) {
            self.map_claim_ownership(city.tile, None, None, false);
        }

        for p in self.alive_players() {
            if p == city.owner {
                if let Some(pt) = self.plrtile_mut(p, city.tile) {
                    pt.site = None;
                }
                self.send_packet(p, Packet::CityRemove { id });
            } else if self.map_is_known_and_seen(p, city.tile, VisionLayer::Main) {
                self.reality_check_city(p, city.tile);
            }
        }
        Ok(())
    }

    /// Hand a city to another player, moving its vision and borders along.
    pub fn transfer_city(&mut self, id: CityId, new_owner: PlayerId) -> Result<(), GameError> {
        self.check_alive(new_owner)?;
        let city = self.city(id)?.clone();
        if city.owner == new_owner {
            return Ok(());
        }
        tracing::info!(city = id, from = city.owner, to = new_owner, "city transferred");

        self.map_clear_border(city.tile);
        let vision = self.vision_new(new_owner, city.tile, true);
        if let Some(c) = self.cities.get_mut(&id) {
            c.owner = new_owner;
            c.vision = vision;
        }
        self.city_refresh_vision(id);
        self.vision_clear_sight(city.vision);
        self.vision_free(city.vision);

        for u in self.units.values_mut() {
            if u.homecity == Some(id) && u.owner != new_owner {
                u.homecity = None;
            }
        }
        self.map_claim_ownership(city.tile, Some(new_owner), Some(city.tile), true);
        self.map_claim_border(city.tile, new_owner, -1);

        // The old owner now sees the city like any other foreign one.
        if self.map_is_known_and_seen(city.owner, city.tile, VisionLayer::Main) {
            self.update_dumb_city(city.owner, id);
        }
        self.send_city_info(None, id);
        self.notify_player(
            city.owner,
            Some(city.tile),
            EventType::CityLost,
            format!("You lost {}.", city.name),
        );
        self.notify_player(
            new_owner,
            Some(city.tile),
            EventType::CityTransfer,
            format!("You acquire {}.", city.name),
        );
        Ok(())
    }

    /// Change a city's size. Work radius, vision and borders follow.
    pub fn city_change_size(&mut self, id: CityId, size: u32) -> Result<(), GameError> {
        let init = self.settings.init_city_radius_sq;
        let city = self
            .cities
            .get_mut(&id)
            .ok_or(GameError::UnknownCity(id))?;
        let size = size.max(1);
        if city.size == size {
            return Ok(());
        }
        let (owner, tile) = (city.owner, city.tile);
        city.size = size;
        city.radius_sq = City::radius_sq_for_size(init, size);
        tracing::debug!(city = id, size, radius_sq = city.radius_sq, "city size changed");

        self.city_refresh_vision(id);
        self.map_claim_border(tile, owner, -1);
        self.send_city_info(None, id);
        Ok(())
    }

    /// Squared vision radii of a city on each layer.
    pub fn city_vision_radius(&self, id: CityId) -> VRadius {
        match self.cities.get(&id) {
            Some(c) => VRadius::new(self.settings.init_vision_radius_sq.max(c.radius_sq), 2, 2),
            None => VRadius::NONE,
        }
    }

    pub fn city_refresh_vision(&mut self, id: CityId) {
        let Some(vision) = self.cities.get(&id).map(|c| c.vision) else {
            return;
        };
        let radius = self.city_vision_radius(id);
        self.vision_change_sight(vision, radius);
    }

    /// Send city data to `dest`, or to every player who should get it.
    ///
    /// Owners get the live city. Other players seeing the tile have their
    /// vision site refreshed and get the site; an explicit `dest` also gets
    /// its (possibly stale) site while the tile is fogged.
    pub fn send_city_info(&mut self, dest: Option<PlayerId>, city: CityId) {
        let Some(c) = self.cities.get(&city) else {
            return;
        };
        let (owner, tile) = (c.owner, c.tile);
        let full = CityInfo {
            id: c.id,
            owner,
            tile,
            name: c.name.clone(),
            size: c.size,
            walls: c.walls,
            occupied: !self.map.tile(tile).units.is_empty(),
        };
        let targets = match dest {
            Some(p) => vec![p],
            None => self.alive_players(),
        };
        for p in targets {
            if p == owner {
                self.send_packet(p, Packet::CityInfo(full.clone()));
                continue;
            }
            let seen = self.map_is_known_and_seen(p, tile, VisionLayer::Main);
            if seen {
                self.update_dumb_city(p, city);
            }
            if !seen && dest.is_none() {
                continue;
            }
            let site = self.plrtile(p, tile).and_then(|pt| pt.site.clone());
            if let Some(site) = site.filter(|s| s.id == city) {
                self.send_packet(p, Packet::CityShortInfo(site.into()));
            }
        }
    }

    /// Resend a city whose occupied flag may have changed.
    pub(crate) fn refresh_city_occupancy(&mut self, tile: TileIndex) {
        if let Some(city) = self.map.tile(tile).city {
            self.send_city_info(None, city);
        }
    }

    /// Owner of the city on `tile`, if any.
    pub fn city_owner_at(&self, tile: TileIndex) -> Option<PlayerId> {
        let id = self.map.tile(tile).city?;
        self.cities.get(&id).map(|c| c.owner)
    }
}
