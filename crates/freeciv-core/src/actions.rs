//! Actions units can perform, and the odds of success.

use crate::error::GameError;
use crate::ruleset::UnitTypeFlag;
use crate::types::{ExtraId, TileIndex, UnitId};
use crate::unit::ActivityType;
use crate::world::{WipeReason, World};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Something a unit can do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionId {
    /// Fight the units on an adjacent tile.
    Attack,
    /// Walk into an empty enemy city.
    ConquerCity,
    Fortify,
    Sentry,
    /// Board a transport on the same tile.
    TransportBoard,
    /// Leave the current transport.
    TransportAlight,
    DisbandUnit,
    Pillage,
}

impl ActionId {
    pub fn name(self) -> &'static str {
        match self {
            ActionId::Attack => "Attack",
            ActionId::ConquerCity => "Conquer City",
            ActionId::Fortify => "Fortify",
            ActionId::Sentry => "Sentry",
            ActionId::TransportBoard => "Board",
            ActionId::TransportAlight => "Alight",
            ActionId::DisbandUnit => "Disband Unit",
            ActionId::Pillage => "Pillage",
        }
    }

    /// Whether the action targets an adjacent tile rather than the actor's own.
    pub fn targets_adjacent_tile(self) -> bool {
        matches!(self, ActionId::Attack | ActionId::ConquerCity)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Largest probability value; 200 steps of half a percent.
pub const ACTPROB_VAL_MAX: u8 = 200;

/// Success chance of an action as a range, in half percent steps.
///
/// A range wider than a point means the actor cannot know the exact odds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionProbability {
    pub min: u8,
    pub max: u8,
}

impl ActionProbability {
    pub const IMPOSSIBLE: Self = Self { min: 0, max: 0 };
    pub const CERTAIN: Self = Self {
        min: ACTPROB_VAL_MAX,
        max: ACTPROB_VAL_MAX,
    };
    /// Possible, odds unknown.
    pub const NOT_KNOWN: Self = Self {
        min: 0,
        max: ACTPROB_VAL_MAX,
    };

    /// Exact probability from a chance in `0.0..=1.0`.
    pub fn from_chance(chance: f64) -> Self {
        let v = (chance.clamp(0.0, 1.0) * ACTPROB_VAL_MAX as f64).round() as u8;
        Self { min: v, max: v }
    }

    pub fn is_possible(&self) -> bool {
        self.max > 0
    }

    pub fn is_certain(&self) -> bool {
        self.min >= ACTPROB_VAL_MAX
    }

    /// Lower bound as a chance in `0.0..=1.0`.
    pub fn pessimist(&self) -> f64 {
        self.min as f64 / ACTPROB_VAL_MAX as f64
    }

    /// Compare by the worst case first, then by the best case.
    pub fn cmp_pessimist(&self, other: &Self) -> Ordering {
        self.min.cmp(&other.min).then(self.max.cmp(&other.max))
    }
}

/// Why an action was not carried out.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("{0} is not possible here")]
    Illegal(ActionId),
    #[error("{0} needs a target tile")]
    MissingTarget(ActionId),
}

impl World {
    // =========================================================================
    // Probabilities
    // =========================================================================

    /// Odds of `actor` doing `action` against `tile`. Self-targeted actions
    /// ignore `tile`.
    pub fn action_prob_vs_tile(&self, actor: UnitId, action: ActionId, tile: TileIndex) -> ActionProbability {
        let Some(u) = self.units.get(&actor) else {
            return ActionProbability::IMPOSSIBLE;
        };
        if !action.targets_adjacent_tile() {
            return self.action_prob_self(actor, action, None);
        }
        if u.moves_left <= 0 || !self.map.is_adjacent(u.tile, tile) {
            return ActionProbability::IMPOSSIBLE;
        }
        let utype = self.ruleset.unit_type(u.utype);
        let class = self.ruleset.class_of(u.utype);
        match action {
            ActionId::Attack => {
                if utype.attack <= 0 || (u.is_transported() && !self.can_unit_exist_at_tile(u.utype, u.tile)) {
                    return ActionProbability::IMPOSSIBLE;
                }
                let units = &self.map.tile(tile).units;
                let mut any_enemy = false;
                for id in units {
                    let Some(other) = self.units.get(id) else {
                        continue;
                    };
                    if !self.diplomacy.at_war(u.owner, other.owner) {
                        return ActionProbability::IMPOSSIBLE;
                    }
                    any_enemy = true;
                }
                if !any_enemy {
                    return ActionProbability::IMPOSSIBLE;
                }
                if !units.iter().any(|id| self.can_player_see_unit(u.owner, *id)) {
                    return ActionProbability::NOT_KNOWN;
                }
                match self.get_defender(actor, tile) {
                    Some(defender) => ActionProbability::from_chance(self.unit_win_chance(actor, defender)),
                    None => ActionProbability::IMPOSSIBLE,
                }
            }
            ActionId::ConquerCity => {
                let Some(city_owner) = self.city_owner_at(tile) else {
                    return ActionProbability::IMPOSSIBLE;
                };
                let legal = self.diplomacy.at_war(u.owner, city_owner)
                    && class.can_occupy_city
                    && utype.is_military()
                    && !self.is_non_allied_unit_tile(tile, u.owner)
                    && self.can_unit_exist_at_tile(u.utype, tile);
                if legal {
                    ActionProbability::CERTAIN
                } else {
                    ActionProbability::IMPOSSIBLE
                }
            }
            _ => ActionProbability::IMPOSSIBLE,
        }
    }

    /// Odds of `actor` doing `action` to the unit `target`: an attack on
    /// the target's tile.
    pub fn action_prob_vs_unit(&self, actor: UnitId, action: ActionId, target: UnitId) -> ActionProbability {
        match self.units.get(&target) {
            Some(t) => self.action_prob_vs_tile(actor, action, t.tile),
            None => ActionProbability::IMPOSSIBLE,
        }
    }

    /// Odds of an action the unit does to itself or its own tile.
    pub fn action_prob_self(&self, actor: UnitId, action: ActionId, target: Option<ExtraId>) -> ActionProbability {
        let Some(u) = self.units.get(&actor) else {
            return ActionProbability::IMPOSSIBLE;
        };
        let legal = match action {
            ActionId::Fortify => {
                !matches!(u.activity, ActivityType::Fortified | ActivityType::Fortifying)
                    && self.can_unit_do_activity(actor, ActivityType::Fortifying, None)
            }
            ActionId::Sentry => u.activity != ActivityType::Sentry,
            ActionId::TransportBoard => !u.is_transported() && self.transporter_for_unit(actor).is_some(),
            ActionId::TransportAlight => u.is_transported() && self.can_unit_exist_at_tile(u.utype, u.tile),
            ActionId::DisbandUnit => true,
            ActionId::Pillage => {
                self.ruleset.class_of(u.utype).can_pillage
                    && !self.ruleset.unit_type(u.utype).has_flag(UnitTypeFlag::NonMil)
                    && self.can_unit_do_activity(actor, ActivityType::Pillage, target)
            }
            ActionId::Attack | ActionId::ConquerCity => false,
        };
        if legal {
            ActionProbability::CERTAIN
        } else {
            ActionProbability::IMPOSSIBLE
        }
    }

    // =========================================================================
    // Performing
    // =========================================================================

    /// Carry out an action. The caller supplies the target tile for
    /// tile-targeted actions.
    pub fn perform_action(
        &mut self,
        actor: UnitId,
        action: ActionId,
        tile: Option<TileIndex>,
        target: Option<ExtraId>,
    ) -> Result<(), GameError> {
        self.unit(actor)?;
        let prob = if action.targets_adjacent_tile() {
            let tile = tile.ok_or(ActionError::MissingTarget(action))?;
            self.action_prob_vs_tile(actor, action, tile)
        } else {
            self.action_prob_self(actor, action, target)
        };
        if !prob.is_possible() {
            return Err(ActionError::Illegal(action).into());
        }
        tracing::debug!(actor, %action, ?tile, "performing action");

        match action {
            ActionId::Attack => {
                let tile = tile.ok_or(ActionError::MissingTarget(action))?;
                self.unit_attack(actor, tile);
            }
            ActionId::ConquerCity => {
                let tile = tile.ok_or(ActionError::MissingTarget(action))?;
                let cost = self.map_move_cost_unit(actor, tile);
                if self.unit_move(actor, tile, cost) {
                    self.unit_conquer_city(actor, tile)?;
                }
            }
            ActionId::Fortify => self.set_unit_activity(actor, ActivityType::Fortifying, None)?,
            ActionId::Sentry => self.set_unit_activity(actor, ActivityType::Sentry, None)?,
            ActionId::TransportBoard => {
                if let Some(transport) = self.transporter_for_unit(actor) {
                    self.unit_transport_load(actor, transport);
                    self.send_unit_info(None, actor);
                }
            }
            ActionId::TransportAlight => {
                self.unit_transport_unload(actor);
                self.send_unit_info(None, actor);
            }
            ActionId::DisbandUnit => self.wipe_unit(actor, WipeReason::Disbanded),
            ActionId::Pillage => self.set_unit_activity(actor, ActivityType::Pillage, target)?,
        }
        Ok(())
    }

    /// Take over the city on `tile` after a conquering unit entered it.
    fn unit_conquer_city(&mut self, actor: UnitId, tile: TileIndex) -> Result<(), GameError> {
        let Some(city) = self.map.tile(tile).city else {
            return Ok(());
        };
        let owner = self.unit(actor)?.owner;
        let size = self.city(city)?.size;
        if size <= 1 {
            let name = self.city(city)?.name.clone();
            tracing::info!(city, owner, "city destroyed by conquest");
            self.notify_player(
                owner,
                Some(tile),
                crate::packets::EventType::UnitWinAtt,
                format!("You destroy {name}."),
            );
            return self.remove_city(city);
        }
        self.city_change_size(city, size - 1)?;
        self.transfer_city(city, owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pessimist_ordering() {
        let sure = ActionProbability::CERTAIN;
        let unknown = ActionProbability::NOT_KNOWN;
        let half = ActionProbability::from_chance(0.5);
        assert_eq!(half.cmp_pessimist(&unknown), Ordering::Greater);
        assert_eq!(sure.cmp_pessimist(&half), Ordering::Greater);
        assert_eq!(unknown.cmp_pessimist(&ActionProbability::IMPOSSIBLE), Ordering::Greater);
    }

    #[test]
    fn test_from_chance_rounds_and_clamps() {
        assert_eq!(ActionProbability::from_chance(0.25), ActionProbability { min: 50, max: 50 });
        assert_eq!(ActionProbability::from_chance(2.0), ActionProbability::CERTAIN);
        assert!(!ActionProbability::from_chance(0.0).is_possible());
        assert!((ActionProbability::from_chance(0.9).pessimist() - 0.9).abs() < 1e-9);
    }
}
