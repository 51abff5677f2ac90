//! Vision sources, seen-count accounting and shared vision.
//!
//! Units, cities and vision-granting bases each own a [`VisionSource`]
//! anchored at a tile. Changing a source's radius walks the annulus between
//! the old and new circles and adds or removes one from the owner's seen
//! counters on each tile, relaying the same change to every player the owner
//! (transitively) shares vision with.
//!
//! Counter transitions drive everything a client learns: a tile whose main
//! counter leaves zero becomes seen (and known, if the source may reveal),
//! one returning to zero is fogged. Units on invisible layers are hidden
//! before the tile is fogged, so a client never holds a fogged tile with
//! units still on it.

use crate::packets::{Packet, UnitInfo, UnitShortInfo};
use crate::types::{
    PlayerId, TileIndex, UnitId, VChange, VRadius, VisionLayer,
};
use crate::world::World;
use serde::{Deserialize, Serialize};

/// Handle of a vision source in the [`VisionArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VisionId(pub(crate) usize);

/// Something that lets a player see the tiles around it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionSource {
    pub player: PlayerId,
    pub tile: TileIndex,
    /// Whether this source turns unknown tiles into known ones.
    pub can_reveal_tiles: bool,
    pub radius_sq: VRadius,
}

/// Owner of all vision sources.
#[derive(Clone, Debug, Default)]
pub struct VisionArena {
    slots: Vec<Option<VisionSource>>,
    free: Vec<usize>,
}

impl VisionArena {
    pub fn insert(&mut self, source: VisionSource) -> VisionId {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(source);
                VisionId(slot)
            }
            None => {
                self.slots.push(Some(source));
                VisionId(self.slots.len() - 1)
            }
        }
    }

    pub fn get(&self, id: VisionId) -> Option<&VisionSource> {
        self.slots.get(id.0).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: VisionId) -> Option<&mut VisionSource> {
        self.slots.get_mut(id.0).and_then(|s| s.as_mut())
    }

    pub fn remove(&mut self, id: VisionId) -> Option<VisionSource> {
        let source = self.slots.get_mut(id.0)?.take();
        if source.is_some() {
            self.free.push(id.0);
        }
        source
    }

    /// Number of live sources.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl World {
    // =========================================================================
    // Vision sources
    // =========================================================================

    /// Create a source with no vision yet.
    pub fn vision_new(&mut self, player: PlayerId, tile: TileIndex, can_reveal_tiles: bool) -> VisionId {
        self.visions.insert(VisionSource {
            player,
            tile,
            can_reveal_tiles,
            radius_sq: VRadius::NONE,
        })
    }

    /// Remove a source, clearing its sight first if that was forgotten.
    pub fn vision_free(&mut self, id: VisionId) {
        let cleared = self
            .visions
            .get(id)
            .is_some_and(|s| s.radius_sq == VRadius::NONE);
        if !cleared {
            tracing::error!(?id, "vision source freed while still seeing");
            debug_assert!(false, "vision source freed while still seeing");
            self.vision_clear_sight(id);
        }
        self.visions.remove(id);
    }

    /// Set a new radius, updating seen counters over the changed annulus.
    pub fn vision_change_sight(&mut self, id: VisionId, radius_sq: VRadius) {
        let Some(source) = self.visions.get(id).cloned() else {
            tracing::error!(?id, "vision change on unknown source");
            return;
        };
        if source.radius_sq == radius_sq {
            return;
        }
        self.map_vision_update(
            source.player,
            source.tile,
            source.radius_sq,
            radius_sq,
            source.can_reveal_tiles,
        );
        if let Some(s) = self.visions.get_mut(id) {
            s.radius_sq = radius_sq;
        }
    }

    /// Stop seeing anything.
    pub fn vision_clear_sight(&mut self, id: VisionId) {
        self.vision_change_sight(id, VRadius::NONE);
    }

    /// Change the reveal flag, returning the previous value.
    pub fn vision_reveal_tiles(&mut self, id: VisionId, reveal: bool) -> bool {
        match self.visions.get_mut(id) {
            Some(s) => std::mem::replace(&mut s.can_reveal_tiles, reveal),
            None => false,
        }
    }

    /// Apply the change from `old` to `new` radii around `tile` for `player`.
    pub fn map_vision_update(
        &mut self,
        player: PlayerId,
        tile: TileIndex,
        old: VRadius,
        new: VRadius,
        can_reveal: bool,
    ) {
        if old == new {
            return;
        }
        let max_radius = old.max().max(new.max());
        tracing::trace!(player, tile, ?old, ?new, "vision update");

        self.buffer_shared_vision(player);
        for (t, dr) in self.map.circle_dxyr(tile, max_radius) {
            let mut change: VChange = [0; VisionLayer::COUNT];
            for layer in VisionLayer::ALL {
                let v = layer.index();
                change[v] = if dr > old.0[v] && dr <= new.0[v] {
                    1
                } else if dr > new.0[v] && dr <= old.0[v] {
                    -1
                } else {
                    0
                };
            }
            if change != [0; VisionLayer::COUNT] {
                self.shared_vision_change_seen(player, t, change, can_reveal);
            }
        }
        self.unbuffer_shared_vision(player);
    }

    /// Apply a change to the owner's own counters and to everyone who
    /// shares the owner's vision.
    pub fn shared_vision_change_seen(
        &mut self,
        player: PlayerId,
        tile: TileIndex,
        change: VChange,
        can_reveal: bool,
    ) {
        self.map_change_own_seen(player, tile, change);
        self.map_change_seen(player, tile, change, can_reveal);
        for other in self.alive_players() {
            if self.really_gives_vision(player, other) {
                self.map_change_seen(other, tile, change, can_reveal);
            }
        }
    }

    pub(crate) fn map_change_own_seen(&mut self, player: PlayerId, tile: TileIndex, change: VChange) {
        let Some(pt) = self.plrtile_mut(player, tile) else {
            return;
        };
        for v in 0..VisionLayer::COUNT {
            pt.own_seen[v] = apply_change(pt.own_seen[v], change[v], player, tile);
        }
    }

    /// Change `player`'s seen counters on `tile` and emit the resulting
    /// hide, fog, reveal and discovery information.
    pub fn map_change_seen(&mut self, player: PlayerId, tile: TileIndex, change: VChange, can_reveal: bool) {
        let Some(before) = self.plrtile(player, tile).map(|pt| pt.seen_count) else {
            return;
        };
        let [main, invis, subs] = [
            VisionLayer::Main.index(),
            VisionLayer::Invis.index(),
            VisionLayer::Subsurface.index(),
        ];

        // Invisible layers go first: their units must be gone before the
        // main layer fogs the tile.
        let main_after = before[main] as i32 + change[main];
        for layer in [VisionLayer::Invis, VisionLayer::Subsurface] {
            let v = layer.index();
            if change[v] < 0 && before[v] as i32 == -change[v] {
                tracing::trace!(player, tile, ?layer, "hiding units");
                for uid in self.map.tile(tile).units.clone() {
                    let Some(owner) = self.units.get(&uid).map(|u| u.owner) else {
                        continue;
                    };
                    if self.unit_vlayer(uid) == layer
                        && self.can_player_see_unit(player, uid)
                        && (main_after <= 0 || !self.diplomacy.allied(player, owner))
                    {
                        self.unit_goes_out_of_sight(player, uid);
                    }
                }
            }
        }
        if change[main] < 0 && before[main] as i32 == -change[main] {
            tracing::trace!(player, tile, "hiding visible units");
            for uid in self.map.tile(tile).units.clone() {
                if self.unit_vlayer(uid) == VisionLayer::Main && self.can_player_see_unit(player, uid) {
                    self.unit_goes_out_of_sight(player, uid);
                }
            }
        }

        let Some(pt) = self.plrtile_mut(player, tile) else {
            return;
        };
        for v in 0..VisionLayer::COUNT {
            pt.seen_count[v] = apply_change(pt.seen_count[v], change[v], player, tile);
        }
        let after = pt.seen_count;
        let known = pt.known;
        if after[invis] > after[main] || after[subs] > after[main] {
            tracing::error!(player, tile, ?after, "invisible layer seen more than main layer");
            debug_assert!(false, "seen_count layer dominance violated");
        }

        // Fog
        if change[main] < 0 && after[main] == 0 {
            tracing::trace!(player, tile, "fogging tile");
            self.send_tile_info(player, tile);
        }

        let revealing = !known && after[main] > 0 && can_reveal;
        if revealing {
            tracing::trace!(player, tile, "revealing tile");
            self.map_set_known(player, tile);
        }
        let became_seen = change[main] > 0 && after[main] as i32 == change[main];

        // Tile first, so the client has it before the units on it.
        if revealing || (became_seen && known) {
            self.update_player_tile_knowledge(player, tile);
            self.send_tile_info(player, tile);
        }

        if (revealing && after[main] > 0) || became_seen {
            self.discover_units(player, tile, VisionLayer::Main);
            self.reality_check_city(player, tile);
            if let Some(city) = self.map.tile(tile).city {
                self.send_city_info(Some(player), city);
            }
        }
        for layer in [VisionLayer::Invis, VisionLayer::Subsurface] {
            let v = layer.index();
            if (revealing && after[v] > 0) || (change[v] > 0 && after[v] as i32 == change[v]) {
                self.discover_units(player, tile, layer);
            }
        }
    }

    fn discover_units(&mut self, player: PlayerId, tile: TileIndex, layer: VisionLayer) {
        for uid in self.map.tile(tile).units.clone() {
            if self.unit_vlayer(uid) == layer {
                self.send_unit_info(Some(player), uid);
            }
        }
    }

    /// Make `player` and everyone sharing their vision know `tile` now,
    /// without adding a lasting vision source.
    pub fn map_show_tile(&mut self, player: PlayerId, tile: TileIndex) {
        tracing::debug!(player, tile, "showing tile");
        for p in self.alive_players() {
            if p != player && !self.really_gives_vision(player, p) {
                continue;
            }
            if self.map_is_known_and_seen(p, tile, VisionLayer::Main) {
                continue;
            }
            self.map_set_known(p, tile);
            self.update_player_tile_knowledge(p, tile);
            self.send_tile_info(p, tile);
            self.reality_check_city(p, tile);
            if let Some(city) = self.map.tile(tile).city {
                // The tile may stay fogged, so refresh the site explicitly.
                self.update_dumb_city(p, city);
                self.send_city_info(Some(p), city);
            }
            for layer in VisionLayer::ALL {
                if self.map_get_seen(p, tile, layer) > 0 {
                    self.discover_units(p, tile, layer);
                }
            }
        }
    }

    /// Show every tile within `radius_sq` of `center`.
    pub fn map_show_circle(&mut self, player: PlayerId, center: TileIndex, radius_sq: i32) {
        self.buffer_shared_vision(player);
        for (tile, _) in self.map.circle_dxyr(center, radius_sq) {
            self.map_show_tile(player, tile);
        }
        self.unbuffer_shared_vision(player);
    }

    /// Show the whole map.
    pub fn map_show_all(&mut self, player: PlayerId) {
        self.buffer_shared_vision(player);
        for tile in 0..self.map.len() {
            self.map_show_tile(player, tile);
        }
        self.unbuffer_shared_vision(player);
    }

    /// Remove and re-add vision over a circle, re-sending everything seen
    /// there. Used after terrain changes that alter what can be seen.
    pub fn map_refog_circle(
        &mut self,
        player: PlayerId,
        center: TileIndex,
        old_radius_sq: i32,
        new_radius_sq: i32,
        can_reveal: bool,
    ) {
        if old_radius_sq == new_radius_sq {
            return;
        }
        let old = VRadius::new(old_radius_sq, -1, -1);
        let new = VRadius::new(new_radius_sq, -1, -1);
        self.map_vision_update(player, center, old, new, can_reveal);
    }

    // =========================================================================
    // Shared vision
    // =========================================================================

    pub fn gives_shared_vision(&self, from: PlayerId, to: PlayerId) -> bool {
        self.players
            .get(from as usize)
            .is_some_and(|p| p.gives_shared_vision.contains(to))
    }

    pub fn really_gives_vision(&self, from: PlayerId, to: PlayerId) -> bool {
        self.players
            .get(from as usize)
            .is_some_and(|p| p.really_gives_vision.contains(to))
    }

    /// Recompute the transitive closure of the shared vision graph.
    pub fn create_vision_dependencies(&mut self) {
        for p in &mut self.players {
            p.really_gives_vision = p.gives_shared_vision;
        }
        let ids: Vec<PlayerId> = self.players.iter().map(|p| p.id).collect();
        loop {
            let mut added = false;
            for &a in &ids {
                for &b in &ids {
                    if a == b || !self.really_gives_vision(a, b) {
                        continue;
                    }
                    for &c in &ids {
                        if a != c && self.really_gives_vision(b, c) && !self.really_gives_vision(a, c) {
                            self.players[a as usize].really_gives_vision.insert(c);
                            added = true;
                        }
                    }
                }
            }
            if !added {
                break;
            }
        }
    }

    /// Let `to` see everything `from` sees, now and in the future.
    pub fn give_shared_vision(&mut self, from: PlayerId, to: PlayerId) {
        if from == to {
            return;
        }
        if self.gives_shared_vision(from, to) {
            tracing::warn!(from, to, "shared vision already given");
            return;
        }
        tracing::debug!(from, to, "giving shared vision");
        let saved: Vec<_> = self.players.iter().map(|p| p.really_gives_vision).collect();
        self.players[from as usize].gives_shared_vision.insert(to);
        self.create_vision_dependencies();

        for giver in self.alive_players() {
            self.buffer_shared_vision(giver);
            for receiver in self.alive_players() {
                if self.really_gives_vision(giver, receiver)
                    && !saved[giver as usize].contains(receiver)
                {
                    tracing::debug!(giver, receiver, "really giving vision");
                    self.apply_own_vision_to(giver, receiver, 1);
                    self.really_give_map_from_player_to_player(giver, receiver);
                }
            }
            self.unbuffer_shared_vision(giver);
        }
    }

    /// Stop sharing vision. Tiles only seen through the removed edge fog;
    /// they stay known.
    pub fn remove_shared_vision(&mut self, from: PlayerId, to: PlayerId) {
        if from == to {
            return;
        }
        if !self.gives_shared_vision(from, to) {
            tracing::warn!(from, to, "shared vision was not given");
            return;
        }
        tracing::debug!(from, to, "removing shared vision");
        let saved: Vec<_> = self.players.iter().map(|p| p.really_gives_vision).collect();
        self.players[from as usize].gives_shared_vision.remove(to);
        self.create_vision_dependencies();

        for giver in self.alive_players() {
            self.buffer_shared_vision(giver);
            for receiver in self.alive_players() {
                if !self.really_gives_vision(giver, receiver)
                    && saved[giver as usize].contains(receiver)
                {
                    tracing::debug!(giver, receiver, "really removing vision");
                    self.apply_own_vision_to(giver, receiver, -1);
                }
            }
            self.unbuffer_shared_vision(giver);
        }
    }

    /// Add (`sign` = 1) or remove (-1) all of `giver`'s own vision to
    /// `receiver`'s counters.
    fn apply_own_vision_to(&mut self, giver: PlayerId, receiver: PlayerId, sign: i32) {
        for tile in 0..self.map.len() {
            let Some(own) = self.plrtile(giver, tile).map(|pt| pt.own_seen) else {
                return;
            };
            if own == [0; VisionLayer::COUNT] {
                continue;
            }
            let change = own.map(|c| sign * c as i32);
            let can_reveal = sign < 0 || self.map_is_known(giver, tile);
            self.map_change_seen(receiver, tile, change, can_reveal);
        }
    }

    /// Freeze the connections of `player` and of everyone receiving their
    /// vision, so a multi-tile update is delivered in one batch.
    pub fn buffer_shared_vision(&mut self, player: PlayerId) {
        for p in self.shared_vision_audience(player) {
            self.players[p as usize].connection.freeze();
        }
    }

    pub fn unbuffer_shared_vision(&mut self, player: PlayerId) {
        for p in self.shared_vision_audience(player) {
            self.players[p as usize].connection.thaw();
        }
    }

    fn shared_vision_audience(&self, player: PlayerId) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.id == player || self.really_gives_vision(player, p.id))
            .map(|p| p.id)
            .collect()
    }

    // =========================================================================
    // Unit visibility
    // =========================================================================

    pub(crate) fn unit_vlayer(&self, unit: UnitId) -> VisionLayer {
        self.units
            .get(&unit)
            .map_or(VisionLayer::Main, |u| self.ruleset.unit_type(u.utype).vlayer)
    }

    /// Whether `player` would see `unit` if it stood at `tile`.
    pub fn can_player_see_unit_at(
        &self,
        player: PlayerId,
        unit: UnitId,
        tile: TileIndex,
        is_transported: bool,
    ) -> bool {
        let Some(u) = self.units.get(&unit) else {
            return false;
        };
        if u.owner == player {
            return true;
        }
        if self.tile_get_known(player, tile) != crate::types::KnownState::KnownSeen {
            return false;
        }
        let allied = self.diplomacy.allied(player, u.owner);
        // Cargo of non-allied transports is hidden.
        if is_transported && !allied {
            return false;
        }
        if let Some(city) = self.map.tile(tile).city {
            if !self.can_player_see_units_in_city(player, city) {
                return false;
            }
        }
        let vlayer = self.ruleset.unit_type(u.utype).vlayer;
        if allied || vlayer == VisionLayer::Main {
            return true;
        }
        self.map_get_seen(player, tile, vlayer) > 0
    }

    pub fn can_player_see_unit(&self, player: PlayerId, unit: UnitId) -> bool {
        match self.units.get(&unit) {
            Some(u) => self.can_player_see_unit_at(player, unit, u.tile, u.is_transported()),
            None => false,
        }
    }

    /// Only the owner and allies see the units inside a city.
    pub fn can_player_see_units_in_city(&self, player: PlayerId, city: crate::types::CityId) -> bool {
        self.cities
            .get(&city)
            .is_some_and(|c| self.diplomacy.allied(player, c.owner))
    }

    pub(crate) fn unit_goes_out_of_sight(&mut self, player: PlayerId, unit: UnitId) {
        let owner = self.units.get(&unit).map(|u| u.owner);
        if owner == Some(player) || owner.is_none() {
            return;
        }
        self.send_packet(player, Packet::UnitRemove { id: unit });
    }

    /// Send unit info to `dest`, or to every player who can see the unit.
    pub fn send_unit_info(&mut self, dest: Option<PlayerId>, unit: UnitId) {
        let Some(u) = self.units.get(&unit) else {
            return;
        };
        let full = UnitInfo {
            id: u.id,
            owner: u.owner,
            nationality: u.nationality,
            tile: u.tile,
            utype: u.utype,
            hp: u.hp,
            veteran: u.veteran,
            moves_left: u.moves_left,
            fuel: u.fuel,
            activity: u.activity,
            activity_target: u.activity_target,
            transported_by: u.transported_by,
            has_orders: u.has_orders(),
            done_moving: u.done_moving,
        };
        let short = UnitShortInfo {
            id: u.id,
            owner: u.owner,
            tile: u.tile,
            utype: u.utype,
            hp: u.hp,
            veteran: u.veteran,
            activity: u.activity,
            transported: u.is_transported(),
        };
        let owner = u.owner;
        let targets = match dest {
            Some(p) => vec![p],
            None => self.alive_players(),
        };
        for p in targets {
            if p == owner {
                self.send_packet(p, Packet::UnitInfo(full.clone()));
            } else if self.can_player_see_unit(p, unit) {
                self.send_packet(p, Packet::UnitShortInfo(short.clone()));
            }
        }
    }

    // =========================================================================
    // Vision radii
    // =========================================================================

    /// Squared vision radius of `unit` on `layer` if it stood at `tile`.
    pub fn get_unit_vision_at(&self, unit: UnitId, tile: TileIndex, layer: VisionLayer) -> i32 {
        let Some(u) = self.units.get(&unit) else {
            return -1;
        };
        let t = self.map.tile(tile);
        let extras_bonus: i32 = t
            .extras
            .iter()
            .map(|e| self.ruleset.extra(e).vision_bonus_sq)
            .sum();
        let base = self.ruleset.unit_type(u.utype).vision_radius_sq
            + self.ruleset.terrain(t.terrain).vision_bonus_sq
            + extras_bonus;
        match layer {
            VisionLayer::Main => base.max(0),
            VisionLayer::Invis | VisionLayer::Subsurface => base.clamp(0, 2),
        }
    }

    pub(crate) fn unit_vision_radius_at(&self, unit: UnitId, tile: TileIndex) -> VRadius {
        VRadius::new(
            self.get_unit_vision_at(unit, tile, VisionLayer::Main),
            self.get_unit_vision_at(unit, tile, VisionLayer::Invis),
            self.get_unit_vision_at(unit, tile, VisionLayer::Subsurface),
        )
    }

    /// Recompute a unit's vision at its current tile.
    pub fn unit_refresh_vision(&mut self, unit: UnitId) {
        let Some((tile, vision)) = self.units.get(&unit).map(|u| (u.tile, u.vision)) else {
            return;
        };
        let radius = self.unit_vision_radius_at(unit, tile);
        self.vision_change_sight(vision, radius);
    }
}

/// Add a signed change to a counter; underflow is a bug and clamps to zero.
fn apply_change(count: u32, change: i32, player: PlayerId, tile: TileIndex) -> u32 {
    let next = count as i64 + change as i64;
    if next < 0 {
        tracing::error!(player, tile, count, change, "seen counter underflow");
        debug_assert!(false, "seen counter underflow");
        return 0;
    }
    next as u32
}
