//! Combat between units.
//!
//! Strength is expressed in power units (`POWER_FACTOR` per point of
//! attack or defense), scaled by veteran level, terrain, extras and
//! fortification. A fight is a series of rounds; each round one side
//! loses the other side's firepower in hit points, the loser being drawn
//! with odds proportional to the two powers.

use crate::packets::EventType;
use crate::ruleset::{TerrainClass, UnitTypeFlag};
use crate::types::{TileIndex, UnitId, POWER_FACTOR, SINGLE_MOVE};
use crate::unit::ActivityType;
use crate::world::{WipeReason, World};
use serde::{Deserialize, Serialize};

/// Outcome of one fight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatResult {
    pub rounds: i32,
    pub attacker_hp: i32,
    pub defender_hp: i32,
}

impl CombatResult {
    pub fn attacker_won(&self) -> bool {
        self.defender_hp <= 0 && self.attacker_hp > 0
    }

    pub fn defender_won(&self) -> bool {
        self.attacker_hp <= 0
    }
}

/// What happened when a unit attacked a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttackOutcome {
    AttackerWon { defender: UnitId },
    DefenderWon { defender: UnitId },
    /// The round cap ended the fight with both units alive.
    Draw { defender: UnitId },
}

/// Chance that an attacker with the given strength, hit points and
/// firepower wins against the defender.
pub fn win_chance(
    att_strength: i32,
    att_hp: i32,
    att_fp: i32,
    def_strength: i32,
    def_hp: i32,
    def_fp: i32,
) -> f64 {
    if att_strength + def_strength <= 0 || att_fp <= 0 || def_fp <= 0 {
        return 0.0;
    }
    // Rounds each side can lose before dying.
    let att_n_lose = (att_hp + def_fp - 1) / def_fp;
    let def_n_lose = (def_hp + att_fp - 1) / att_fp;
    if def_n_lose <= 0 {
        return 1.0;
    }
    if att_n_lose <= 0 {
        return 0.0;
    }
    let att_p_lose1 = def_strength as f64 / (att_strength + def_strength) as f64;
    let def_p_lose1 = 1.0 - att_p_lose1;

    // Sum over the number of rounds the attacker loses before the
    // defender's last one.
    let mut binom_save = def_p_lose1.powi(def_n_lose - 1);
    let mut accum_prob = binom_save;
    for lr in 1..att_n_lose {
        let n = lr + def_n_lose - 1;
        binom_save *= n as f64;
        binom_save /= lr as f64;
        binom_save *= att_p_lose1;
        accum_prob += binom_save;
    }
    accum_prob * def_p_lose1
}

impl World {
    // =========================================================================
    // Strength
    // =========================================================================

    /// Attack power of a unit, before any defender-dependent modifier.
    pub fn get_attack_power(&self, unit: UnitId) -> i32 {
        let Some(u) = self.units.get(&unit) else {
            return 0;
        };
        let utype = self.ruleset.unit_type(u.utype);
        let mut power = utype.attack * POWER_FACTOR * self.ruleset.veteran_level(u.veteran).power_fact / 100;
        if self.settings.tired_attack && u.moves_left < SINGLE_MOVE {
            power = power * u.moves_left.max(0) / SINGLE_MOVE;
        }
        power
    }

    /// Defense power of a unit, before any terrain or fortification bonus.
    pub fn get_defense_power(&self, unit: UnitId) -> i32 {
        let Some(u) = self.units.get(&unit) else {
            return 0;
        };
        let utype = self.ruleset.unit_type(u.utype);
        utype.defense * POWER_FACTOR * self.ruleset.veteran_level(u.veteran).power_fact / 100
    }

    pub fn get_total_attack_power(&self, attacker: UnitId, _defender: UnitId) -> i32 {
        self.get_attack_power(attacker)
    }

    /// Defense power of `defender` against `attacker` on its own tile.
    pub fn get_total_defense_power(&self, _attacker: UnitId, defender: UnitId) -> i32 {
        let Some(d) = self.units.get(&defender) else {
            return 0;
        };
        let class = self.ruleset.class_of(d.utype);
        let utype = self.ruleset.unit_type(d.utype);
        let tile = self.map.tile(d.tile);
        let mut power = self.get_defense_power(defender);

        if class.terrain_defense {
            power += power * self.ruleset.terrain(tile.terrain).defense_bonus / 100;
            let extras_bonus: i32 = tile
                .extras
                .iter()
                .map(|e| self.ruleset.extra(e))
                .filter(|e| e.is_native_to(TerrainClass::Land))
                .map(|e| e.defense_bonus)
                .sum();
            power += power * extras_bonus / 100;
        }
        let fortified = d.activity == ActivityType::Fortified || tile.city.is_some();
        if fortified && class.can_fortify && !utype.has_flag(UnitTypeFlag::CantFortify) {
            power = power * 3 / 2;
        }
        power
    }

    /// Firepower of both sides after situational modifiers.
    pub fn get_modified_firepower(&self, attacker: UnitId, defender: UnitId) -> (i32, i32) {
        let (Some(a), Some(d)) = (self.units.get(&attacker), self.units.get(&defender)) else {
            return (1, 1);
        };
        let atype = self.ruleset.unit_type(a.utype);
        let dtype = self.ruleset.unit_type(d.utype);
        let mut att_fp = atype.firepower;
        let mut def_fp = dtype.firepower;
        let def_tile = self.map.tile(d.tile);

        if dtype.has_flag(UnitTypeFlag::BadCityDefender) && def_tile.city.is_some() {
            att_fp *= 2;
            def_fp = 1;
        }
        // Ships bombarding land fight at minimal firepower.
        let attacker_is_sea = !self.ruleset.class_of(a.utype).native_to.contains(&TerrainClass::Land);
        if attacker_is_sea && !self.ruleset.is_ocean(def_tile.terrain) {
            att_fp = 1;
            def_fp = 1;
        }
        (att_fp, def_fp)
    }

    /// Chance that `attacker` beats `defender`.
    pub fn unit_win_chance(&self, attacker: UnitId, defender: UnitId) -> f64 {
        let (Some(a), Some(d)) = (self.units.get(&attacker), self.units.get(&defender)) else {
            return 0.0;
        };
        let (att_fp, def_fp) = self.get_modified_firepower(attacker, defender);
        win_chance(
            self.get_total_attack_power(attacker, defender),
            a.hp,
            att_fp,
            self.get_total_defense_power(attacker, defender),
            d.hp,
            def_fp,
        )
    }

    /// Defense power times the rounds the defender survives times its
    /// firepower.
    pub fn get_defense_rating(&self, attacker: UnitId, defender: UnitId) -> i32 {
        let Some(d) = self.units.get(&defender) else {
            return 0;
        };
        let (att_fp, def_fp) = self.get_modified_firepower(attacker, defender);
        self.get_total_defense_power(attacker, defender) * ((d.hp + att_fp - 1) / att_fp) * def_fp
    }

    /// The unit on `tile` that would defend against `attacker`.
    pub fn get_defender(&self, attacker: UnitId, tile: TileIndex) -> Option<UnitId> {
        let owner = self.units.get(&attacker)?.owner;
        let mut best: Option<(i32, i32, UnitId)> = None;
        for &id in &self.map.tile(tile).units {
            let Some(d) = self.units.get(&id) else {
                continue;
            };
            if d.owner == owner || !self.can_unit_exist_at_tile(d.utype, tile) {
                continue;
            }
            let rating = self.get_defense_rating(attacker, id);
            let cost = self.ruleset.unit_type(d.utype).build_cost;
            let better = match best {
                None => true,
                Some((best_rating, best_cost, _)) => {
                    rating > best_rating || (rating == best_rating && cost < best_cost)
                }
            };
            if better {
                best = Some((rating, cost, id));
            }
        }
        best.map(|(_, _, id)| id)
    }

    // =========================================================================
    // Fighting
    // =========================================================================

    /// Fight until one side dies or the round cap is reached. Hit points
    /// of both units are updated.
    pub fn unit_versus_unit(&mut self, attacker: UnitId, defender: UnitId) -> CombatResult {
        let attack = self.get_total_attack_power(attacker, defender);
        let defense = self.get_total_defense_power(attacker, defender);
        let (att_fp, def_fp) = self.get_modified_firepower(attacker, defender);
        let mut att_hp = self.units.get(&attacker).map_or(0, |u| u.hp);
        let mut def_hp = self.units.get(&defender).map_or(0, |u| u.hp);
        let max_rounds = self.settings.combat_max_rounds;
        let mut rounds = 0;

        if attack == 0 {
            att_hp = 0;
        } else if defense == 0 {
            def_hp = 0;
        }
        while att_hp > 0 && def_hp > 0 && (max_rounds == 0 || rounds < max_rounds) {
            if self.rng.rand((attack + defense) as u32) >= defense as u32 {
                def_hp -= att_fp;
            } else {
                att_hp -= def_fp;
            }
            rounds += 1;
        }
        let result = CombatResult {
            rounds,
            attacker_hp: att_hp.max(0),
            defender_hp: def_hp.max(0),
        };
        tracing::debug!(attacker, defender, attack, defense, ?result, "combat");

        if let Some(u) = self.units.get_mut(&attacker) {
            u.hp = result.attacker_hp;
        }
        if let Some(u) = self.units.get_mut(&defender) {
            u.hp = result.defender_hp;
        }
        result
    }

    /// Possibly raise the veteran level of a unit that survived combat.
    pub fn maybe_make_veteran(&mut self, unit: UnitId) -> bool {
        let Some(u) = self.units.get(&unit) else {
            return false;
        };
        if u.veteran >= self.ruleset.max_veteran_level() {
            return false;
        }
        let chance = self.ruleset.veteran_level(u.veteran).raise_chance;
        if !self.rng.percent(chance) {
            return false;
        }
        let (owner, tile) = (u.owner, u.tile);
        let level = u.veteran + 1;
        if let Some(u) = self.units.get_mut(&unit) {
            u.veteran = level;
        }
        let message = format!(
            "Your {} became more experienced and is now {}.",
            self.units[&unit].name(&self.ruleset),
            self.ruleset.veteran_level(level).name
        );
        self.notify_player(owner, Some(tile), EventType::UnitBecameVet, message);
        true
    }

    /// Kill `victim`, and with killstack every unit on its tile whose owner
    /// is at war with the killer. Cities and bases protect the stack.
    /// Owners of the stack are told; the victim's owner hears from the
    /// caller.
    pub fn kill_unit(&mut self, killer: UnitId, victim: UnitId) {
        let (Some(k), Some(v)) = (self.units.get(&killer), self.units.get(&victim)) else {
            return;
        };
        let (killer_owner, tile) = (k.owner, v.tile);
        let victim_name = v.name(&self.ruleset).to_string();
        let t = self.map.tile(tile);
        let protected = t.city.is_some() || t.extras.iter().any(|e| self.ruleset.extra(e).is_base());

        let mut doomed = vec![victim];
        if self.settings.killstack && !protected {
            doomed.extend(t.units.iter().copied().filter(|id| {
                *id != victim
                    && self
                        .units
                        .get(id)
                        .is_some_and(|u| self.diplomacy.at_war(killer_owner, u.owner))
            }));
        }

        tracing::debug!(killer, victim, tile, stack = doomed.len(), "killing units");
        for id in doomed {
            let Some(u) = self.units.get(&id) else {
                continue;
            };
            if id != victim {
                let owner = u.owner;
                let message = format!(
                    "Your {} was lost along with the {victim_name}.",
                    u.name(&self.ruleset)
                );
                self.notify_player(owner, Some(tile), EventType::UnitLoseDef, message);
            }
            self.wipe_unit(id, WipeReason::Killed);
        }
    }

    /// Attack the best defender on `tile`. `None` when nobody defends.
    pub fn unit_attack(&mut self, attacker: UnitId, tile: TileIndex) -> Option<AttackOutcome> {
        let defender = self.get_defender(attacker, tile)?;
        let a = self.units.get(&attacker)?;
        let d = self.units.get(&defender)?;
        let (att_owner, def_owner) = (a.owner, d.owner);
        let att_name = a.name(&self.ruleset).to_string();
        let def_name = d.name(&self.ruleset).to_string();
        let one_attack = self.ruleset.unit_type(a.utype).has_flag(UnitTypeFlag::OneAttack);
        tracing::debug!(attacker, defender, tile, "attack");

        if let Some(u) = self.units.get_mut(&attacker) {
            u.activity = ActivityType::Idle;
            u.activity_target = None;
        }
        let result = self.unit_versus_unit(attacker, defender);
        if let Some(u) = self.units.get_mut(&attacker) {
            u.moved = true;
            u.moves_left = if one_attack { 0 } else { (u.moves_left - SINGLE_MOVE).max(0) };
        }

        let att_player = self.players[att_owner as usize].name.clone();
        let def_player = self.players[def_owner as usize].name.clone();
        if result.defender_won() {
            self.notify_player(
                att_owner,
                Some(tile),
                EventType::UnitLoseAtt,
                format!("Your attacking {att_name} failed against the {def_player} {def_name}!"),
            );
            self.notify_player(
                def_owner,
                Some(tile),
                EventType::UnitWinDef,
                format!("Your {def_name} survived the pitiful attack of the {att_player} {att_name}."),
            );
            self.kill_unit(defender, attacker);
            self.maybe_make_veteran(defender);
            self.send_unit_info(None, defender);
            return Some(AttackOutcome::DefenderWon { defender });
        }
        if !result.attacker_won() {
            self.send_unit_info(None, attacker);
            self.send_unit_info(None, defender);
            return Some(AttackOutcome::Draw { defender });
        }

        self.notify_player(
            att_owner,
            Some(tile),
            EventType::UnitWinAtt,
            format!("Your attacking {att_name} succeeded against the {def_player} {def_name}!"),
        );
        self.notify_player(
            def_owner,
            Some(tile),
            EventType::UnitLoseDef,
            format!("Your {def_name} was killed by the {att_player} {att_name}."),
        );
        self.kill_unit(attacker, defender);
        self.maybe_make_veteran(attacker);
        self.send_unit_info(None, attacker);

        let occupy = self.settings.occupychance > 0
            && self.map.tile(tile).units.is_empty()
            && self.can_unit_move_to_tile(attacker, tile, false).is_ok()
            && self.rng.percent(self.settings.occupychance);
        if occupy {
            tracing::debug!(attacker, tile, "occupying emptied tile");
            let cost = self.map_move_cost_unit(attacker, tile);
            self.unit_move(attacker, tile, cost);
        }
        Some(AttackOutcome::AttackerWon { defender })
    }
}
