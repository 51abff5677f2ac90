//! What the client knows about the map.
//!
//! Layers draw from a [`MapView`], never from the engine's world. A
//! [`ClientMap`] builds one from the packets a connection receives.

use freeciv_core::packets::{CityInfo, TileInfo, UnitInfo, UnitShortInfo};
use freeciv_core::{
    ActivityType, CityId, Direction8, ExtraSet, KnownState, Map, Packet, PlayerId, TerrainId,
    TileIndex, UnitId, UnitTypeId,
};
use std::collections::{BTreeMap, BTreeSet};

/// Read access to the client's picture of the map.
pub trait MapView {
    fn mapstep(&self, tile: TileIndex, dir: Direction8) -> Option<TileIndex>;
    fn known(&self, tile: TileIndex) -> KnownState;
    /// Terrain of a known tile.
    fn terrain(&self, tile: TileIndex) -> Option<TerrainId>;
    /// Extras on the tile, the resource included.
    fn extras(&self, tile: TileIndex) -> ExtraSet;
    fn owner(&self, tile: TileIndex) -> Option<PlayerId>;
    fn extras_owner(&self, tile: TileIndex) -> Option<PlayerId>;
    fn city_at(&self, tile: TileIndex) -> Option<&CityInfo>;
    fn unit(&self, id: UnitId) -> Option<&ClientUnit>;
    /// Units on the tile, in arrival order.
    fn units_at(&self, tile: TileIndex) -> Vec<UnitId>;

    fn focus_unit(&self) -> Option<UnitId> {
        None
    }

    /// Whether the tile is marked for the player's attention.
    fn has_attention(&self, _tile: TileIndex) -> bool {
        false
    }

    /// The unit drawn for a tile: the focus unit if it is there, else the
    /// first unit not inside a transport.
    fn drawable_unit(&self, tile: TileIndex) -> Option<UnitId> {
        let units = self.units_at(tile);
        if let Some(focus) = self.focus_unit() {
            if units.contains(&focus) {
                return Some(focus);
            }
        }
        units
            .into_iter()
            .find(|id| self.unit(*id).is_some_and(|u| !u.transported))
    }
}

/// A unit as the client sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientUnit {
    pub id: UnitId,
    pub owner: PlayerId,
    pub tile: TileIndex,
    pub utype: UnitTypeId,
    pub hp: i32,
    pub veteran: u8,
    pub activity: ActivityType,
    pub transported: bool,
}

impl From<&UnitInfo> for ClientUnit {
    fn from(info: &UnitInfo) -> Self {
        Self {
            id: info.id,
            owner: info.owner,
            tile: info.tile,
            utype: info.utype,
            hp: info.hp,
            veteran: info.veteran,
            activity: info.activity,
            transported: info.transported_by.is_some(),
        }
    }
}

impl From<&UnitShortInfo> for ClientUnit {
    fn from(info: &UnitShortInfo) -> Self {
        Self {
            id: info.id,
            owner: info.owner,
            tile: info.tile,
            utype: info.utype,
            hp: info.hp,
            veteran: info.veteran,
            activity: info.activity,
            transported: info.transported,
        }
    }
}

/// A partial map fed by engine packets.
#[derive(Clone, Debug)]
pub struct ClientMap {
    map: Map,
    known: Vec<KnownState>,
    units: BTreeMap<UnitId, ClientUnit>,
    cities: BTreeMap<CityId, CityInfo>,
    focus: Option<UnitId>,
    attention: BTreeSet<TileIndex>,
    messages: Vec<String>,
}

impl ClientMap {
    /// An unknown map of the given size.
    pub fn new(width: u32, height: u32, wrap_x: bool) -> Self {
        let map = Map::filled(width, height, wrap_x, 0);
        let known = vec![KnownState::Unknown; map.len()];
        Self {
            map,
            known,
            units: BTreeMap::new(),
            cities: BTreeMap::new(),
            focus: None,
            attention: BTreeSet::new(),
            messages: Vec::new(),
        }
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn units(&self) -> impl Iterator<Item = &ClientUnit> {
        self.units.values()
    }

    pub fn cities(&self) -> impl Iterator<Item = &CityInfo> {
        self.cities.values()
    }

    /// Notification texts, oldest first.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn set_focus(&mut self, unit: Option<UnitId>) {
        self.focus = unit;
    }

    pub fn set_attention(&mut self, tile: TileIndex, on: bool) {
        if on {
            self.attention.insert(tile);
        } else {
            self.attention.remove(&tile);
        }
    }

    fn valid(&self, tile: TileIndex) -> bool {
        tile < self.known.len()
    }

    /// Apply every packet of a batch in order.
    pub fn apply_all<'a>(&mut self, packets: impl IntoIterator<Item = &'a Packet>) {
        for packet in packets {
            self.apply(packet);
        }
    }

    pub fn apply(&mut self, packet: &Packet) {
        match packet {
            Packet::TileInfo(info) => self.apply_tile(info),
            Packet::UnitInfo(info) => self.place_unit(ClientUnit::from(info)),
            Packet::UnitShortInfo(info) => self.place_unit(ClientUnit::from(info)),
            Packet::UnitRemove { id } => self.remove_unit(*id),
            Packet::CityInfo(info) | Packet::CityShortInfo(info) => self.place_city(info),
            Packet::CityRemove { id } => self.remove_city(*id),
            Packet::Notify { message, .. } => self.messages.push(message.clone()),
        }
    }

    fn apply_tile(&mut self, info: &TileInfo) {
        if !self.valid(info.tile) {
            tracing::warn!(tile = info.tile, "tile info for a tile off the map");
            return;
        }
        self.known[info.tile] = info.known;
        let tile = self.map.tile_mut(info.tile);
        if let Some(terrain) = info.terrain {
            tile.terrain = terrain;
        }
        tile.extras = info.extras;
        tile.resource = info.resource;
        tile.owner = info.owner;
        tile.extras_owner = info.extras_owner;
        tile.continent = info.continent;

        if info.known == KnownState::Unknown {
            let gone: Vec<UnitId> = tile.units.drain(..).collect();
            for id in gone {
                self.units.remove(&id);
            }
            if let Some(city) = self.map.tile_mut(info.tile).city.take() {
                self.cities.remove(&city);
            }
        }
    }

    fn place_unit(&mut self, unit: ClientUnit) {
        if !self.valid(unit.tile) {
            tracing::warn!(unit = unit.id, tile = unit.tile, "unit info for a tile off the map");
            return;
        }
        if let Some(old) = self.units.get(&unit.id) {
            if old.tile != unit.tile {
                let old_tile = old.tile;
                self.map.tile_mut(old_tile).units.retain(|u| *u != unit.id);
            }
        }
        let units = &mut self.map.tile_mut(unit.tile).units;
        if !units.contains(&unit.id) {
            units.push(unit.id);
        }
        self.units.insert(unit.id, unit);
    }

    fn remove_unit(&mut self, id: UnitId) {
        if let Some(unit) = self.units.remove(&id) {
            self.map.tile_mut(unit.tile).units.retain(|u| *u != id);
        }
        if self.focus == Some(id) {
            self.focus = None;
        }
    }

    fn place_city(&mut self, info: &CityInfo) {
        if !self.valid(info.tile) {
            tracing::warn!(city = info.id, tile = info.tile, "city info for a tile off the map");
            return;
        }
        self.map.tile_mut(info.tile).city = Some(info.id);
        self.cities.insert(info.id, info.clone());
    }

    fn remove_city(&mut self, id: CityId) {
        if let Some(city) = self.cities.remove(&id) {
            self.map.tile_mut(city.tile).city = None;
        }
    }
}

impl MapView for ClientMap {
    fn mapstep(&self, tile: TileIndex, dir: Direction8) -> Option<TileIndex> {
        self.map.mapstep(tile, dir)
    }

    fn known(&self, tile: TileIndex) -> KnownState {
        self.known.get(tile).copied().unwrap_or_default()
    }

    fn terrain(&self, tile: TileIndex) -> Option<TerrainId> {
        match self.known(tile) {
            KnownState::Unknown => None,
            _ => Some(self.map.tile(tile).terrain),
        }
    }

    fn extras(&self, tile: TileIndex) -> ExtraSet {
        if self.known(tile) == KnownState::Unknown {
            return ExtraSet::EMPTY;
        }
        let t = self.map.tile(tile);
        let mut extras = t.extras;
        if let Some(resource) = t.resource {
            extras.insert(resource);
        }
        extras
    }

    fn owner(&self, tile: TileIndex) -> Option<PlayerId> {
        self.valid(tile).then(|| self.map.tile(tile).owner).flatten()
    }

    fn extras_owner(&self, tile: TileIndex) -> Option<PlayerId> {
        self.valid(tile)
            .then(|| self.map.tile(tile).extras_owner)
            .flatten()
    }

    fn city_at(&self, tile: TileIndex) -> Option<&CityInfo> {
        if !self.valid(tile) {
            return None;
        }
        self.map
            .tile(tile)
            .city
            .and_then(|id| self.cities.get(&id))
    }

    fn unit(&self, id: UnitId) -> Option<&ClientUnit> {
        self.units.get(&id)
    }

    fn units_at(&self, tile: TileIndex) -> Vec<UnitId> {
        if !self.valid(tile) {
            return Vec::new();
        }
        self.map.tile(tile).units.clone()
    }

    fn focus_unit(&self) -> Option<UnitId> {
        self.focus
    }

    fn has_attention(&self, tile: TileIndex) -> bool {
        self.attention.contains(&tile)
    }
}
