//! Standing orders.
//!
//! A unit with orders executes them as far as its movement allows, then
//! picks up where it stopped at the start of the next turn. Any order that
//! cannot be carried out cancels the whole list with a single message to
//! the owner.

use crate::actions::ActionId;
use crate::error::GameError;
use crate::packets::EventType;
use crate::types::{TileIndex, UnitId, MAX_LEN_ROUTE};
use crate::unit::{ActivityType, Order, OrderList};
use crate::world::World;
use thiserror::Error;

/// Why an order list was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order list is empty")]
    Empty,
    #[error("order list is longer than {} entries", MAX_LEN_ROUTE)]
    TooLong,
    #[error("order {index}: {activity} cannot be ordered")]
    BadActivity { index: usize, activity: ActivityType },
    #[error("order {index}: {activity} needs a target")]
    MissingTarget { index: usize, activity: ActivityType },
    #[error("order {index}: {action} needs a direction")]
    MissingDirection { index: usize, action: ActionId },
    #[error("order {index}: {action} acts on the unit's own tile")]
    BadActionTarget { index: usize, action: ActionId },
}

/// Check an order list before it is given to a unit.
pub fn validate_orders(orders: &[Order]) -> Result<(), OrderError> {
    if orders.is_empty() {
        return Err(OrderError::Empty);
    }
    if orders.len() > MAX_LEN_ROUTE {
        return Err(OrderError::TooLong);
    }
    for (index, order) in orders.iter().enumerate() {
        match order {
            Order::Activity { activity, target } => match activity {
                ActivityType::Idle | ActivityType::Fortified => {
                    return Err(OrderError::BadActivity {
                        index,
                        activity: *activity,
                    })
                }
                ActivityType::Fortifying | ActivityType::Sentry if target.is_some() => {
                    return Err(OrderError::BadActivity {
                        index,
                        activity: *activity,
                    })
                }
                ActivityType::Irrigate
                | ActivityType::Mine
                | ActivityType::GenRoad
                | ActivityType::Base
                    if target.is_none() =>
                {
                    return Err(OrderError::MissingTarget {
                        index,
                        activity: *activity,
                    })
                }
                _ => {}
            },
            Order::PerformAction { action, dir, .. } => {
                if action.targets_adjacent_tile() && dir.is_none() {
                    return Err(OrderError::MissingDirection {
                        index,
                        action: *action,
                    });
                }
                if !action.targets_adjacent_tile() && dir.is_some() {
                    return Err(OrderError::BadActionTarget {
                        index,
                        action: *action,
                    });
                }
            }
            Order::Move(_) | Order::ActionMove(_) | Order::FullMp => {}
        }
    }
    Ok(())
}

/// What happened to the order being executed.
enum Step {
    /// Done; go on to the next order.
    Next,
    /// Try again later.
    Wait,
    /// Orders cancelled, or the unit is gone.
    Stop,
}

impl World {
    /// Give `unit` a new order list and start executing it if the unit can
    /// still move this turn.
    pub fn set_unit_orders(
        &mut self,
        unit: UnitId,
        orders: Vec<Order>,
        repeat: bool,
        vigilant: bool,
    ) -> Result<(), GameError> {
        self.unit(unit)?;
        validate_orders(&orders)?;
        let len = orders.len();
        let list = OrderList::new(orders, repeat, vigilant).ok_or(OrderError::Empty)?;
        let u = self.unit_mut(unit)?;
        u.orders = Some(list);
        u.activity = ActivityType::Idle;
        u.activity_target = None;
        u.activity_count = 0;
        u.done_moving = false;
        let moves_left = u.moves_left;
        tracing::debug!(unit, len, repeat, vigilant, "orders set");
        self.send_unit_info(None, unit);
        if moves_left > 0 {
            self.execute_orders(unit);
        }
        Ok(())
    }

    /// Drop a unit's orders.
    pub fn cancel_orders(&mut self, unit: UnitId) {
        let Some(u) = self.units.get_mut(&unit) else {
            return;
        };
        if u.orders.take().is_some() {
            tracing::debug!(unit, "orders cancelled");
            self.send_unit_info(None, unit);
        }
    }

    /// Cancel orders and tell the owner why, once.
    fn abort_orders(&mut self, unit: UnitId, reason: &str) {
        let Some(u) = self.units.get(&unit) else {
            return;
        };
        let (owner, tile) = (u.owner, u.tile);
        let message = format!("Orders for {} aborted {reason}.", u.name(&self.ruleset));
        self.cancel_orders(unit);
        self.notify_player(owner, Some(tile), EventType::UnitOrders, message);
    }

    /// Whether a visible enemy military unit stands next to `unit`.
    fn enemy_adjacent(&self, unit: UnitId) -> bool {
        let Some(u) = self.units.get(&unit) else {
            return false;
        };
        self.map.adjacent(u.tile).into_iter().any(|adj| {
            self.map.tile(adj).units.iter().any(|id| {
                self.units.get(id).is_some_and(|e| {
                    self.diplomacy.at_war(u.owner, e.owner)
                        && self.ruleset.unit_type(e.utype).is_military()
                        && self.can_player_see_unit(u.owner, *id)
                })
            })
        })
    }

    /// Cancel vigilant orders when an enemy is adjacent. Returns whether
    /// the orders were cancelled.
    pub fn maybe_cancel_goto_due_to_enemy(&mut self, unit: UnitId) -> bool {
        let vigilant = self
            .units
            .get(&unit)
            .and_then(|u| u.orders.as_ref())
            .is_some_and(|o| o.vigilant);
        if !vigilant || !self.enemy_adjacent(unit) {
            return false;
        }
        self.abort_orders(unit, "because an enemy came into view");
        true
    }

    /// Vigilant units around `tile` react to an arrival there.
    pub(crate) fn cancel_vigilant_orders_near(&mut self, tile: TileIndex) {
        let mut watchers = Vec::new();
        for adj in self.map.adjacent(tile) {
            watchers.extend(self.map.tile(adj).units.iter().copied());
        }
        for id in watchers {
            self.maybe_cancel_goto_due_to_enemy(id);
        }
    }

    /// Move the order index past the current order, dropping a finished list.
    fn advance_orders(&mut self, unit: UnitId) {
        let Some(u) = self.units.get_mut(&unit) else {
            return;
        };
        let Some(orders) = u.orders.as_mut() else {
            return;
        };
        if orders.is_last() {
            u.orders = None;
            tracing::debug!(unit, "orders completed");
            self.send_unit_info(None, unit);
        } else {
            orders.index = (orders.index + 1) % orders.len();
        }
    }

    /// Run the unit's orders until they finish, wait, or fail. Returns
    /// whether the unit is still alive.
    pub fn execute_orders(&mut self, unit: UnitId) -> bool {
        // A repeating list that spends no movement would otherwise never stop.
        let mut steps_without_moving = 0;
        loop {
            let Some(u) = self.units.get(&unit) else {
                return false;
            };
            let Some(orders) = u.orders.as_ref() else {
                return true;
            };
            let len = orders.len();
            let Some(order) = orders.current().cloned() else {
                self.cancel_orders(unit);
                return true;
            };
            if u.activity != ActivityType::Idle {
                self.set_done_moving(unit);
                return true;
            }
            if self.maybe_cancel_goto_due_to_enemy(unit) {
                return true;
            }
            let moves_before = self.units.get(&unit).map_or(0, |u| u.moves_left);
            tracing::trace!(unit, ?order, "executing order");

            match self.execute_order(unit, &order) {
                Step::Next => {}
                Step::Wait => {
                    self.set_done_moving(unit);
                    return true;
                }
                Step::Stop => return self.units.contains_key(&unit),
            }
            let Some(moves_after) = self.units.get(&unit).map(|u| u.moves_left) else {
                return false;
            };
            self.advance_orders(unit);
            if matches!(order, Order::Activity { .. }) {
                self.set_done_moving(unit);
                return true;
            }

            if moves_after == moves_before {
                steps_without_moving += 1;
                if steps_without_moving > len {
                    self.set_done_moving(unit);
                    return true;
                }
            } else {
                steps_without_moving = 0;
            }
        }
    }

    fn set_done_moving(&mut self, unit: UnitId) {
        if let Some(u) = self.units.get_mut(&unit) {
            u.done_moving = true;
        }
    }

    fn execute_order(&mut self, unit: UnitId, order: &Order) -> Step {
        let Some(u) = self.units.get(&unit) else {
            return Step::Stop;
        };
        let (owner, tile, moves_left) = (u.owner, u.tile, u.moves_left);
        if order.needs_moves() && moves_left <= 0 {
            return Step::Wait;
        }

        match order {
            Order::FullMp => {
                if moves_left < u.move_rate(&self.ruleset) {
                    return Step::Wait;
                }
                Step::Next
            }
            Order::Activity { activity, target } => {
                if let Err(err) = self.set_unit_activity(unit, *activity, *target) {
                    tracing::debug!(unit, %err, "order activity refused");
                    self.abort_orders(unit, "because of an illegal activity");
                    return Step::Stop;
                }
                Step::Next
            }
            Order::Move(dir) | Order::ActionMove(dir) => {
                let Some(dest) = self.map.mapstep(tile, *dir) else {
                    self.abort_orders(unit, "since they give an invalid location");
                    return Step::Stop;
                };
                let plain_move = matches!(order, Order::Move(_));
                if plain_move
                    && (self.is_non_allied_unit_tile(dest, owner)
                        || self.is_non_allied_city_tile(dest, owner).is_some())
                {
                    self.abort_orders(unit, "as there are units in the way");
                    return Step::Stop;
                }
                if let Err(err) = self.unit_move_handling(unit, dest, plain_move) {
                    tracing::debug!(unit, dest, %err, "order move failed");
                    self.abort_orders(unit, "because of failed move");
                    return Step::Stop;
                }
                match self.units.get(&unit) {
                    None => Step::Stop,
                    Some(u) if plain_move && u.tile != dest => {
                        self.abort_orders(unit, "because of failed move");
                        Step::Stop
                    }
                    Some(_) => Step::Next,
                }
            }
            Order::PerformAction { action, dir, target } => {
                let dest = match dir {
                    Some(dir) => match self.map.mapstep(tile, *dir) {
                        Some(dest) => Some(dest),
                        None => {
                            self.abort_orders(unit, "since they give an invalid location");
                            return Step::Stop;
                        }
                    },
                    None => None,
                };
                let prob = match dest {
                    Some(dest) => self.action_prob_vs_tile(unit, *action, dest),
                    None => self.action_prob_self(unit, *action, *target),
                };
                if !prob.is_possible() {
                    self.abort_orders(unit, &format!("because {action} is no longer possible"));
                    return Step::Stop;
                }
                if let Err(err) = self.perform_action(unit, *action, dest, *target) {
                    tracing::debug!(unit, %action, %err, "order action failed");
                    self.abort_orders(unit, &format!("because {action} is no longer possible"));
                    return Step::Stop;
                }
                if self.units.contains_key(&unit) {
                    Step::Next
                } else {
                    Step::Stop
                }
            }
        }
    }
}
