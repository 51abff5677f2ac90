//! Units, their activities and order lists.

use crate::actions::ActionId;
use crate::coord::Direction8;
use crate::ruleset::{ExtraCause, Ruleset, UnitType};
use crate::types::{
    CityId, ExtraId, PlayerId, TileIndex, UnitId, UnitTypeId, MAX_LEN_ROUTE, SINGLE_MOVE,
};
use crate::vision::VisionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A unit's current multi-turn task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ActivityType {
    #[default]
    Idle,
    /// Becomes `Fortified` at the start of the next turn.
    Fortifying,
    Fortified,
    /// Sleeps until an enemy comes near.
    Sentry,
    Irrigate,
    Mine,
    /// Build a road.
    GenRoad,
    /// Build a base.
    Base,
    Pillage,
}

impl ActivityType {
    /// Activities that change the tile and accumulate progress.
    pub fn is_tile_work(self) -> bool {
        matches!(
            self,
            ActivityType::Irrigate
                | ActivityType::Mine
                | ActivityType::GenRoad
                | ActivityType::Base
                | ActivityType::Pillage
        )
    }

    /// Extra cause this activity builds, if any.
    pub fn builds(self) -> Option<ExtraCause> {
        match self {
            ActivityType::Irrigate => Some(ExtraCause::Irrigation),
            ActivityType::Mine => Some(ExtraCause::Mine),
            ActivityType::GenRoad => Some(ExtraCause::Road),
            ActivityType::Base => Some(ExtraCause::Base),
            _ => None,
        }
    }

    /// Whether the activity acts on a specific extra.
    pub fn needs_target(self) -> bool {
        self.is_tile_work()
    }

    pub fn name(self) -> &'static str {
        match self {
            ActivityType::Idle => "Idle",
            ActivityType::Fortifying => "Fortifying",
            ActivityType::Fortified => "Fortified",
            ActivityType::Sentry => "Sentry",
            ActivityType::Irrigate => "Irrigate",
            ActivityType::Mine => "Mine",
            ActivityType::GenRoad => "Road",
            ActivityType::Base => "Base",
            ActivityType::Pillage => "Pillage",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry in a unit's order list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    /// Step without performing any action at the destination.
    Move(Direction8),
    /// Step, attacking or conquering if that is what entering requires.
    ActionMove(Direction8),
    /// Wait until movement is fully restored.
    FullMp,
    /// Start an activity on the current tile.
    Activity {
        activity: ActivityType,
        target: Option<ExtraId>,
    },
    /// Perform an action against the adjacent tile in `dir`, or the
    /// unit's own tile when `dir` is `None`.
    PerformAction {
        action: ActionId,
        dir: Option<Direction8>,
        target: Option<ExtraId>,
    },
}

impl Order {
    /// Orders that need movement left before they are tried.
    pub fn needs_moves(&self) -> bool {
        matches!(
            self,
            Order::Move(_) | Order::ActionMove(_) | Order::PerformAction { .. }
        )
    }
}

/// A bounded queue of orders.
///
/// `index` always points into `list`; an exhausted, non-repeating list is
/// dropped from the unit rather than kept with an out-of-range index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderList {
    pub list: Vec<Order>,
    pub index: usize,
    /// Start over after the last order.
    pub repeat: bool,
    /// Cancel as soon as an enemy is adjacent.
    pub vigilant: bool,
}

impl OrderList {
    /// Build a list; `None` when empty or longer than [`MAX_LEN_ROUTE`].
    pub fn new(list: Vec<Order>, repeat: bool, vigilant: bool) -> Option<Self> {
        if list.is_empty() || list.len() > MAX_LEN_ROUTE {
            return None;
        }
        Some(Self {
            list,
            index: 0,
            repeat,
            vigilant,
        })
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn current(&self) -> Option<&Order> {
        self.list.get(self.index)
    }

    /// Whether the current order is the final one of a non-repeating list.
    pub fn is_last(&self) -> bool {
        !self.repeat && self.index + 1 == self.list.len()
    }
}

/// A unit on the game map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub utype: UnitTypeId,
    pub owner: PlayerId,
    /// Player the unit was originally built for.
    pub nationality: PlayerId,
    pub tile: TileIndex,
    pub hp: i32,
    pub fuel: i32,
    pub veteran: u8,
    /// Move fragments left this turn.
    pub moves_left: i32,
    pub activity: ActivityType,
    pub activity_target: Option<ExtraId>,
    /// Progress on the current tile work.
    pub activity_count: i32,
    pub orders: Option<OrderList>,
    /// Transport this unit is loaded into.
    pub transported_by: Option<UnitId>,
    pub homecity: Option<CityId>,
    pub vision: VisionId,
    /// Set when orders must wait for the next turn.
    pub done_moving: bool,
    /// Whether the unit has moved this turn.
    pub moved: bool,
}

impl Unit {
    pub fn new(
        id: UnitId,
        utype: UnitTypeId,
        owner: PlayerId,
        tile: TileIndex,
        vision: VisionId,
        ruleset: &Ruleset,
    ) -> Self {
        let ut = ruleset.unit_type(utype);
        Self {
            id,
            utype,
            owner,
            nationality: owner,
            tile,
            hp: ut.hp,
            fuel: 0,
            veteran: 0,
            moves_left: ut.move_rate * SINGLE_MOVE,
            activity: ActivityType::Idle,
            activity_target: None,
            activity_count: 0,
            orders: None,
            transported_by: None,
            homecity: None,
            vision,
            done_moving: false,
            moved: false,
        }
    }

    pub fn unit_type<'a>(&self, ruleset: &'a Ruleset) -> &'a UnitType {
        ruleset.unit_type(self.utype)
    }

    /// Move fragments restored at turn start.
    pub fn move_rate(&self, ruleset: &Ruleset) -> i32 {
        let base = self.unit_type(ruleset).move_rate * SINGLE_MOVE;
        (base + ruleset.veteran_level(self.veteran).move_bonus).max(0)
    }

    pub fn has_orders(&self) -> bool {
        self.orders.is_some()
    }

    pub fn is_transported(&self) -> bool {
        self.transported_by.is_some()
    }

    /// Readable name for notifications, e.g. "Warriors".
    pub fn name<'a>(&self, ruleset: &'a Ruleset) -> &'a str {
        &self.unit_type(ruleset).name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_unit_full_moves_and_hp() {
        let ruleset = Ruleset::classic();
        let horsemen = ruleset.unit_type_by_name("Horsemen").unwrap();
        let unit = Unit::new(1, horsemen, 0, 5, VisionId(0), &ruleset);
        assert_eq!(unit.moves_left, 2 * SINGLE_MOVE);
        assert_eq!(unit.hp, 10);
        assert_eq!(unit.activity, ActivityType::Idle);
        assert!(!unit.has_orders());
        assert_eq!(unit.name(&ruleset), "Horsemen");
    }

    #[test]
    fn test_order_list_bounds() {
        assert!(OrderList::new(vec![], false, false).is_none());
        let too_long = vec![Order::FullMp; MAX_LEN_ROUTE + 1];
        assert!(OrderList::new(too_long, false, false).is_none());

        let mut orders = OrderList::new(
            vec![Order::Move(Direction8::North), Order::FullMp],
            false,
            false,
        )
        .unwrap();
        assert_eq!(orders.current(), Some(&Order::Move(Direction8::North)));
        assert!(!orders.is_last());
        orders.index = 1;
        assert!(orders.is_last());
    }

    #[test]
    fn test_repeat_list_never_last() {
        let orders = OrderList::new(vec![Order::FullMp], true, false).unwrap();
        assert!(!orders.is_last());
    }

    #[test]
    fn test_activity_classification() {
        assert!(ActivityType::Mine.is_tile_work());
        assert!(!ActivityType::Fortified.is_tile_work());
        assert_eq!(ActivityType::GenRoad.builds(), Some(ExtraCause::Road));
        assert_eq!(ActivityType::Pillage.builds(), None);
        assert!(Order::Move(Direction8::East).needs_moves());
        assert!(!Order::FullMp.needs_moves());
    }
}
