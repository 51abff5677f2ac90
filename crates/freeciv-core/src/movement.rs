//! Unit movement.
//!
//! [`World::unit_move`] is the single place a unit changes tile. It brings
//! up vision at the destination before dropping vision at the source, so
//! observers never see a gap, moves loaded cargo along, and then runs the
//! consequences of arriving: base conquest, automatic boarding, waking
//! enemy sentries, autoattack and huts.

use crate::actions::ActionId;
use crate::error::GameError;
use crate::packets::{EventType, Packet};
use crate::ruleset::{ExtraCause, HutBehavior, TerrainClass, UnitTypeFlag};
use crate::types::{
    AdvanceId, ExtraId, PlayerId, TileIndex, UnitId, UnitTypeId, CITY_MAP_MAX_RADIUS_SQ,
    SINGLE_MOVE,
};
use crate::unit::ActivityType;
use crate::world::{WipeReason, World};
use thiserror::Error;

/// Squared radius of the map handed out by huts.
const HUT_MAP_RADIUS_SQ: i32 = 25;

/// Units within this many tiles of an arriving enemy wake from sentry.
const SENTRY_WAKE_DISTANCE: i32 = 3;

/// Why a unit cannot step onto a tile.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("unit {0} does not exist")]
    UnknownUnit(UnitId),
    #[error("no moves left")]
    NoMovesLeft,
    #[error("destination is not adjacent")]
    NotAdjacent,
    #[error("destination is occupied by a non-allied unit")]
    NonAlliedUnit,
    #[error("destination is a non-allied city")]
    NonAlliedCity,
    #[error("unit cannot survive on the destination terrain")]
    NonNative,
    #[error("zone of control blocks the move")]
    ZoneOfControl,
    #[error("cannot enter territory of a player at peace")]
    PeacefulTerritory,
    #[error("no transport at the destination has room")]
    TransportFull,
}

impl World {
    // =========================================================================
    // Terrain and costs
    // =========================================================================

    /// Whether a unit of `utype` can stay on `tile`. Cities shelter units
    /// next to terrain native to them.
    pub fn can_unit_exist_at_tile(&self, utype: UnitTypeId, tile: TileIndex) -> bool {
        if self.ruleset.is_native_terrain(utype, self.map.tile(tile).terrain) {
            return true;
        }
        self.map.tile(tile).city.is_some()
            && self
                .map
                .adjacent(tile)
                .into_iter()
                .any(|adj| self.ruleset.is_native_terrain(utype, self.map.tile(adj).terrain))
    }

    /// Move fragments a unit of `utype` spends stepping from `src` to `dest`.
    pub fn map_move_cost(&self, utype: UnitTypeId, src: TileIndex, dest: TileIndex) -> i32 {
        let class = self.ruleset.class_of(utype);
        if !class.native_to.contains(&TerrainClass::Land) {
            return SINGLE_MOVE;
        }
        let (s, d) = (self.map.tile(src), self.map.tile(dest));
        let road = d
            .extras
            .iter()
            .filter(|e| s.has_extra(*e))
            .filter_map(|e| self.ruleset.extra(e).move_cost)
            .min();
        if let Some(cost) = road {
            return cost;
        }
        if self.ruleset.is_ocean(d.terrain) || self.ruleset.is_ocean(s.terrain) {
            return SINGLE_MOVE;
        }
        self.ruleset.terrain(d.terrain).movement_cost * SINGLE_MOVE
    }

    pub fn map_move_cost_unit(&self, unit: UnitId, dest: TileIndex) -> i32 {
        match self.units.get(&unit) {
            Some(u) => self.map_move_cost(u.utype, u.tile, dest),
            None => SINGLE_MOVE,
        }
    }

    // =========================================================================
    // Legality
    // =========================================================================

    /// Whether `tile` is free of enemy zones of control for `player`.
    pub fn is_my_zoc(&self, player: PlayerId, tile: TileIndex) -> bool {
        for adj in self.map.adjacent(tile) {
            if self.map.is_ocean_tile(&self.ruleset, adj) {
                continue;
            }
            let hostile = self.map.tile(adj).units.iter().any(|id| {
                self.units.get(id).is_some_and(|u| {
                    !self.diplomacy.allied(player, u.owner)
                        && self.ruleset.class_of(u.utype).zoc
                        && self.ruleset.unit_type(u.utype).is_military()
                })
            });
            if hostile {
                return false;
            }
        }
        true
    }

    /// Zone of control rule: a unit may not go from one enemy-controlled
    /// tile to another.
    pub fn can_step_taken_wrt_to_zoc(&self, unit: UnitId, dest: TileIndex) -> bool {
        let Some(u) = self.units.get(&unit) else {
            return false;
        };
        let utype = self.ruleset.unit_type(u.utype);
        if utype.has_flag(UnitTypeFlag::IgZoc) || !self.ruleset.class_of(u.utype).zoc {
            return true;
        }
        if self.is_allied_unit_tile(dest, u.owner) {
            return true;
        }
        if self
            .city_owner_at(dest)
            .is_some_and(|o| self.diplomacy.allied(u.owner, o))
        {
            return true;
        }
        if self.map.is_ocean_tile(&self.ruleset, u.tile) || self.map.is_ocean_tile(&self.ruleset, dest) {
            return true;
        }
        self.is_my_zoc(u.owner, u.tile) || self.is_my_zoc(u.owner, dest)
    }

    /// Check a regular step onto an adjacent tile.
    pub fn can_unit_move_to_tile(&self, unit: UnitId, dest: TileIndex, igzoc: bool) -> Result<(), MoveError> {
        let u = self.units.get(&unit).ok_or(MoveError::UnknownUnit(unit))?;
        if u.moves_left <= 0 {
            return Err(MoveError::NoMovesLeft);
        }
        if !self.map.is_adjacent(u.tile, dest) {
            return Err(MoveError::NotAdjacent);
        }
        if self.is_non_allied_unit_tile(dest, u.owner) {
            return Err(MoveError::NonAlliedUnit);
        }
        if self.is_non_allied_city_tile(dest, u.owner).is_some() {
            return Err(MoveError::NonAlliedCity);
        }
        if !self.can_unit_exist_at_tile(u.utype, dest)
            && self.transporter_for_unit_at(u.owner, u.utype, dest).is_none()
        {
            let class = self.ruleset.unit_type(u.utype).class;
            let full_transport = self.map.tile(dest).units.iter().any(|id| {
                self.units.get(id).is_some_and(|t| {
                    self.diplomacy.allied(u.owner, t.owner)
                        && self.ruleset.unit_type(t.utype).can_carry(class)
                })
            });
            return Err(if full_transport {
                MoveError::TransportFull
            } else {
                MoveError::NonNative
            });
        }
        if let Some(owner) = self.map.tile(dest).owner {
            if owner != u.owner
                && self.diplomacy.status(u.owner, owner) == crate::diplomacy::DiplStatus::Peace
                && self.ruleset.unit_type(u.utype).is_military()
            {
                return Err(MoveError::PeacefulTerritory);
            }
        }
        if !igzoc && !self.can_step_taken_wrt_to_zoc(unit, dest) {
            return Err(MoveError::ZoneOfControl);
        }
        Ok(())
    }

    // =========================================================================
    // Moving
    // =========================================================================

    /// Handle a request to move onto `dest`. Unless `move_do_not_act`,
    /// stepping onto enemies attacks them and stepping into an empty enemy
    /// city conquers it.
    pub fn unit_move_handling(
        &mut self,
        unit: UnitId,
        dest: TileIndex,
        move_do_not_act: bool,
    ) -> Result<(), GameError> {
        let owner = self.unit(unit)?.owner;
        if !move_do_not_act {
            if self.is_non_allied_unit_tile(dest, owner)
                && self.action_prob_vs_tile(unit, ActionId::Attack, dest).is_possible()
            {
                return self.perform_action(unit, ActionId::Attack, Some(dest), None);
            }
            if self.is_non_allied_city_tile(dest, owner).is_some()
                && self
                    .action_prob_vs_tile(unit, ActionId::ConquerCity, dest)
                    .is_possible()
            {
                return self.perform_action(unit, ActionId::ConquerCity, Some(dest), None);
            }
        }
        self.can_unit_move_to_tile(unit, dest, false)?;
        let cost = self.map_move_cost_unit(unit, dest);
        self.unit_move(unit, dest, cost);
        Ok(())
    }

    /// `unit` followed by everything it carries, outermost first.
    fn unit_and_cargo_deep(&self, unit: UnitId) -> Vec<UnitId> {
        let mut out = vec![unit];
        let mut i = 0;
        while i < out.len() {
            let cargo = self.unit_list_cargo(out[i]);
            for c in cargo {
                if !out.contains(&c) {
                    out.push(c);
                }
            }
            i += 1;
        }
        out
    }

    /// Move a unit and its cargo to `dest`, spending `move_cost`.
    /// Returns whether the unit is still alive afterwards.
    pub fn unit_move(&mut self, unit: UnitId, dest: TileIndex, move_cost: i32) -> bool {
        let Some(u) = self.units.get(&unit) else {
            return false;
        };
        let src = u.tile;
        tracing::debug!(unit, src, dest, move_cost, "moving unit");
        if u.is_transported() {
            self.unit_transport_unload(unit);
        }

        let movers = self.unit_and_cargo_deep(unit);
        let players = self.alive_players();
        let observers: Vec<(UnitId, Vec<PlayerId>)> = movers
            .iter()
            .map(|id| {
                let seen_by = players
                    .iter()
                    .copied()
                    .filter(|p| self.can_player_see_unit(*p, *id))
                    .collect();
                (*id, seen_by)
            })
            .collect();

        // Sight at the destination comes up before the source goes dark.
        let mut old_visions = Vec::with_capacity(movers.len());
        for &id in &movers {
            let Some(owner) = self.units.get(&id).map(|m| m.owner) else {
                continue;
            };
            let radius = self.unit_vision_radius_at(id, dest);
            let vision = self.vision_new(owner, dest, self.settings.vision_reveal_tiles);
            self.vision_change_sight(vision, radius);
            if let Some(m) = self.units.get_mut(&id) {
                old_visions.push(std::mem::replace(&mut m.vision, vision));
            }
        }

        for &id in &movers {
            self.map.tile_mut(src).units.retain(|u| *u != id);
            self.map.tile_mut(dest).units.push(id);
            if let Some(m) = self.units.get_mut(&id) {
                m.tile = dest;
            }
        }
        if let Some(m) = self.units.get_mut(&unit) {
            m.moves_left = (m.moves_left - move_cost).max(0);
            m.moved = true;
            if m.activity != ActivityType::Sentry {
                m.activity = ActivityType::Idle;
                m.activity_target = None;
                m.activity_count = 0;
            }
        }

        for (id, seen_by) in observers {
            self.send_unit_info(None, id);
            for p in seen_by {
                if !self.can_player_see_unit(p, id) {
                    self.send_packet(p, Packet::UnitRemove { id });
                }
            }
        }
        for vision in old_visions {
            self.vision_clear_sight(vision);
            self.vision_free(vision);
        }
        self.refresh_city_occupancy(src);
        self.refresh_city_occupancy(dest);

        self.unit_conquer_extras(unit);
        self.unit_autoload(unit);
        self.wakeup_neighbor_sentries(unit);
        self.cancel_vigilant_orders_near(dest);

        if self.settings.autoattack && !self.unit_survive_autoattack(unit) {
            return false;
        }
        if !self.units.contains_key(&unit) {
            return false;
        }
        self.unit_enter_hut(unit)
    }

    /// Board a transport when left standing on terrain the unit cannot
    /// survive on.
    fn unit_autoload(&mut self, unit: UnitId) {
        let Some(u) = self.units.get(&unit) else {
            return;
        };
        if u.is_transported() || self.can_unit_exist_at_tile(u.utype, u.tile) {
            return;
        }
        if let Some(transport) = self.transporter_for_unit(unit) {
            self.unit_transport_load(unit, transport);
            self.send_unit_info(None, unit);
        }
    }

    /// Take over the bases on the unit's tile from an enemy, with the
    /// territory they claim.
    fn unit_conquer_extras(&mut self, unit: UnitId) -> bool {
        let Some(u) = self.units.get(&unit) else {
            return false;
        };
        let (owner, tile) = (u.owner, u.tile);
        if !self.ruleset.class_of(u.utype).can_occupy_city
            || !self.ruleset.unit_type(u.utype).is_military()
        {
            return false;
        }
        let t = self.map.tile(tile);
        if t.city.is_some() || !t.extras.iter().any(|e| self.ruleset.extra(e).is_base()) {
            return false;
        }
        match t.extras_owner {
            Some(old) if old == owner || !self.diplomacy.at_war(owner, old) => return false,
            _ => {}
        }
        let claims = t
            .extras
            .iter()
            .any(|e| self.ruleset.extra(e).claims_territory());
        let had_owner = t.extras_owner.is_some();
        tracing::info!(unit, owner, tile, "bases conquered");

        if claims {
            if had_owner {
                self.map_clear_border(tile);
            }
            self.map_claim_ownership(tile, Some(owner), Some(tile), true);
            self.map_claim_border(tile, owner, -1);
        } else {
            self.tile_claim_bases(tile, Some(owner));
            self.update_tile_knowledge(tile);
        }
        true
    }

    /// Enemy sentries near the unit's new position wake up if they see it.
    fn wakeup_neighbor_sentries(&mut self, unit: UnitId) {
        let Some(u) = self.units.get(&unit) else {
            return;
        };
        let (owner, tile) = (u.owner, u.tile);
        if !self.ruleset.unit_type(u.utype).is_military() {
            return;
        }
        let sleepers: Vec<UnitId> = self
            .units
            .values()
            .filter(|s| {
                s.activity == ActivityType::Sentry
                    && self.diplomacy.at_war(s.owner, owner)
                    && self.map.real_distance(s.tile, tile) <= SENTRY_WAKE_DISTANCE
            })
            .map(|s| s.id)
            .collect();
        for id in sleepers {
            let Some(sleeper_owner) = self.units.get(&id).map(|s| s.owner) else {
                continue;
            };
            if !self.can_player_see_unit(sleeper_owner, unit) {
                continue;
            }
            if let Some(s) = self.units.get_mut(&id) {
                s.activity = ActivityType::Idle;
            }
            tracing::debug!(unit = id, "sentry woken by enemy");
            self.send_unit_info(None, id);
        }
    }

    // =========================================================================
    // Autoattack
    // =========================================================================

    /// Let adjacent enemies attack a unit that just arrived. Returns whether
    /// the unit survived.
    pub fn unit_survive_autoattack(&mut self, unit: UnitId) -> bool {
        let Some(u) = self.units.get(&unit) else {
            return false;
        };
        let (owner, tile) = (u.owner, u.tile);
        let provoking = self.ruleset.unit_type(u.utype).has_flag(UnitTypeFlag::Provoking);

        let mut candidates = Vec::new();
        for adj in self.map.adjacent(tile) {
            for &enemy in &self.map.tile(adj).units {
                let Some(e) = self.units.get(&enemy) else {
                    continue;
                };
                if !self.diplomacy.at_war(e.owner, owner) || e.moves_left <= 0 {
                    continue;
                }
                let prob = self.action_prob_vs_tile(enemy, ActionId::Attack, tile);
                if prob.is_possible() {
                    candidates.push((enemy, prob));
                }
            }
        }
        // Deepest cargo first, then best odds.
        candidates.sort_by(|(a, pa), (b, pb)| {
            self.unit_transport_depth(*b)
                .cmp(&self.unit_transport_depth(*a))
                .then_with(|| pb.cmp_pessimist(pa))
        });

        for (enemy, _) in candidates {
            if !self.units.contains_key(&unit) {
                return false;
            }
            let Some(enemy_tile) = self.units.get(&enemy).map(|e| e.tile) else {
                continue;
            };
            let prob = self.action_prob_vs_tile(enemy, ActionId::Attack, tile);
            if !prob.is_possible() {
                continue;
            }
            let enemy_win = prob.pessimist();
            let unit_win = self
                .get_defender(unit, enemy_tile)
                .map_or(0.0, |d| self.unit_win_chance(unit, d));
            let alone_in_city = self.map.tile(enemy_tile).city.is_some()
                && self.map.tile(enemy_tile).units.len() == 1;
            let threshold = if alone_in_city { 0.90 } else { 0.25 };

            if (enemy_win > 1.0 - unit_win || provoking) && enemy_win > threshold {
                tracing::debug!(enemy, unit, enemy_win, unit_win, "autoattack");
                self.unit_attack(enemy, tile);
            } else {
                tracing::trace!(enemy, unit, enemy_win, unit_win, "autoattack declined");
            }
        }
        self.units.contains_key(&unit)
    }

    // =========================================================================
    // Huts
    // =========================================================================

    /// Enter any hut on the unit's tile. Returns whether the unit survived.
    pub fn unit_enter_hut(&mut self, unit: UnitId) -> bool {
        let Some(u) = self.units.get(&unit) else {
            return false;
        };
        let (owner, tile) = (u.owner, u.tile);
        let behavior = self.ruleset.class_of(u.utype).hut_behavior;
        let huts: Vec<ExtraId> = self
            .map
            .tile(tile)
            .extras
            .iter()
            .filter(|e| self.ruleset.extra(*e).cause == ExtraCause::Hut)
            .collect();
        if huts.is_empty() || !self.settings.huts_enabled || behavior == HutBehavior::Nothing {
            return true;
        }
        for hut in huts {
            self.tile_remove_extra(tile, hut);
        }
        if behavior == HutBehavior::Frighten {
            let message = format!(
                "Your overly aggressive {} scared the tribe away.",
                self.units[&unit].name(&self.ruleset)
            );
            self.notify_player(owner, Some(tile), EventType::HutFrighten, message);
            return true;
        }

        match self.rng.rand(12) {
            0 => self.hut_get_gold(owner, tile, 25),
            1..=3 => self.hut_get_gold(owner, tile, 50),
            4 => self.hut_get_gold(owner, tile, 100),
            5..=7 => self.hut_get_tech(owner, tile),
            8 | 9 => self.hut_get_mercenaries(owner, tile),
            10 => return self.hut_get_barbarians(unit, tile),
            _ => {
                self.notify_player(
                    owner,
                    Some(tile),
                    EventType::HutMap,
                    "You find a map of the surrounding terrain.",
                );
                self.map_show_circle(owner, tile, HUT_MAP_RADIUS_SQ);
            }
        }
        true
    }

    fn hut_get_gold(&mut self, owner: PlayerId, tile: TileIndex, amount: i32) {
        if let Some(p) = self.players.get_mut(owner as usize) {
            p.gold += amount;
        }
        self.notify_player(owner, Some(tile), EventType::HutGold, format!("You found {amount} gold."));
    }

    fn hut_get_tech(&mut self, owner: PlayerId, tile: TileIndex) {
        let unknown: Vec<AdvanceId> = (0..self.ruleset.advances.len())
            .map(|a| a as AdvanceId)
            .filter(|a| !self.players[owner as usize].knows_advance(*a))
            .collect();
        if unknown.is_empty() {
            self.hut_get_gold(owner, tile, 25);
            return;
        }
        let advance = unknown[self.rng.rand(unknown.len() as u32) as usize];
        let name = self.ruleset.advances[advance as usize].name.clone();
        self.notify_player(
            owner,
            Some(tile),
            EventType::HutTech,
            format!("You found {name} in ancient scrolls of wisdom."),
        );
        self.give_advance(owner, advance);
    }

    fn hut_get_mercenaries(&mut self, owner: PlayerId, tile: TileIndex) {
        let Some(utype) = self.ruleset.hut_mercenary else {
            self.hut_get_gold(owner, tile, 25);
            return;
        };
        match self.create_unit(owner, utype, tile, 0) {
            Ok(_) => self.notify_player(
                owner,
                Some(tile),
                EventType::HutMerc,
                "A band of friendly mercenaries joins your cause.",
            ),
            Err(err) => {
                tracing::warn!(%err, "mercenaries could not be placed");
                self.hut_get_gold(owner, tile, 25);
            }
        }
    }

    /// Barbarians kill the unit unless a city is close enough to scare them.
    fn hut_get_barbarians(&mut self, unit: UnitId, tile: TileIndex) -> bool {
        let Some(owner) = self.units.get(&unit).map(|u| u.owner) else {
            return false;
        };
        let city_near = self
            .cities
            .values()
            .any(|c| self.map.sq_distance(c.tile, tile) <= CITY_MAP_MAX_RADIUS_SQ);
        if city_near {
            self.notify_player(owner, Some(tile), EventType::HutBarbCityNear, "An abandoned village is here.");
            return true;
        }
        self.notify_player(
            owner,
            Some(tile),
            EventType::HutBarb,
            "You have unleashed a horde of barbarians!",
        );
        self.wipe_unit(unit, WipeReason::HutBarbarians);
        false
    }
}
