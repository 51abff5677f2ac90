//! Activities, tile extras and the turn cycle.

use crate::error::GameError;
use crate::packets::EventType;
use crate::ruleset::{ExtraCause, UnitTypeFlag};
use crate::types::{ExtraId, PlayerId, TileIndex, UnitId, ACTIVITY_FACTOR};
use crate::unit::ActivityType;
use crate::world::World;

/// Units working the same activity on the same tile pool their progress.
struct WorkGroup {
    tile: TileIndex,
    activity: ActivityType,
    target: Option<ExtraId>,
    progress: i32,
    workers: Vec<UnitId>,
}

impl World {
    // =========================================================================
    // Activities
    // =========================================================================

    fn can_build_extra(&self, extra: ExtraId, cause: ExtraCause, tile: TileIndex) -> bool {
        let e = self.ruleset.extra(extra);
        let t = self.map.tile(tile);
        e.cause == cause
            && e.build_time > 0
            && e.is_native_to(self.ruleset.terrain(t.terrain).class)
            && !t.has_extra(extra)
    }

    fn can_pillage_extra(&self, extra: ExtraId, tile: TileIndex) -> bool {
        self.map.tile(tile).has_extra(extra) && self.ruleset.extra(extra).pillageable
    }

    /// First extra `activity` could act on at `tile`.
    fn first_activity_target(&self, activity: ActivityType, tile: TileIndex) -> Option<ExtraId> {
        if activity == ActivityType::Pillage {
            return self
                .map
                .tile(tile)
                .extras
                .iter()
                .find(|e| self.can_pillage_extra(*e, tile));
        }
        let cause = activity.builds()?;
        self.ruleset
            .extras_with_cause(cause)
            .find(|e| self.can_build_extra(*e, cause, tile))
    }

    /// Whether `unit` may start `activity`. Tile work without a target
    /// asks whether any target exists.
    pub fn can_unit_do_activity(&self, unit: UnitId, activity: ActivityType, target: Option<ExtraId>) -> bool {
        let Some(u) = self.units.get(&unit) else {
            return false;
        };
        let utype = self.ruleset.unit_type(u.utype);
        let class = self.ruleset.class_of(u.utype);
        match activity {
            ActivityType::Idle | ActivityType::Sentry => true,
            ActivityType::Fortifying => {
                class.can_fortify
                    && !utype.has_flag(UnitTypeFlag::CantFortify)
                    && u.activity != ActivityType::Fortified
                    && !u.is_transported()
            }
            ActivityType::Fortified => false,
            ActivityType::Pillage => {
                class.can_pillage
                    && match target {
                        Some(extra) => self.can_pillage_extra(extra, u.tile),
                        None => self.first_activity_target(activity, u.tile).is_some(),
                    }
            }
            ActivityType::Irrigate | ActivityType::Mine | ActivityType::GenRoad | ActivityType::Base => {
                let Some(cause) = activity.builds() else {
                    return false;
                };
                utype.has_flag(UnitTypeFlag::Settlers)
                    && match target {
                        Some(extra) => self.can_build_extra(extra, cause, u.tile),
                        None => self.first_activity_target(activity, u.tile).is_some(),
                    }
            }
        }
    }

    /// Start an activity. Tile work without a target picks the first
    /// eligible extra.
    pub fn set_unit_activity(
        &mut self,
        unit: UnitId,
        activity: ActivityType,
        target: Option<ExtraId>,
    ) -> Result<(), GameError> {
        let tile = self.unit(unit)?.tile;
        let target = if activity.needs_target() {
            let target = target.or_else(|| self.first_activity_target(activity, tile));
            if target.is_none() {
                return Err(GameError::IllegalActivity(activity));
            }
            target
        } else {
            None
        };
        if !self.can_unit_do_activity(unit, activity, target) {
            return Err(GameError::IllegalActivity(activity));
        }
        let u = self.unit_mut(unit)?;
        u.activity = activity;
        u.activity_target = target;
        u.activity_count = 0;
        tracing::debug!(unit, %activity, ?target, "activity set");
        self.send_unit_info(None, unit);
        Ok(())
    }

    /// Advance every unit's activity by one turn and finish the work that
    /// is done.
    pub fn update_unit_activities(&mut self) {
        let mut changed = Vec::new();
        let mut groups: Vec<WorkGroup> = Vec::new();
        for u in self.units.values_mut() {
            match u.activity {
                ActivityType::Fortifying => {
                    u.activity = ActivityType::Fortified;
                    changed.push(u.id);
                }
                activity if activity.is_tile_work() => {
                    u.activity_count += ACTIVITY_FACTOR;
                    let existing = groups.iter_mut().find(|g| {
                        g.tile == u.tile && g.activity == activity && g.target == u.activity_target
                    });
                    match existing {
                        Some(g) => {
                            g.progress += u.activity_count;
                            g.workers.push(u.id);
                        }
                        None => groups.push(WorkGroup {
                            tile: u.tile,
                            activity,
                            target: u.activity_target,
                            progress: u.activity_count,
                            workers: vec![u.id],
                        }),
                    }
                }
                _ => {}
            }
        }
        for id in changed {
            self.send_unit_info(None, id);
        }

        for group in groups {
            let Some(target) = group.target else {
                continue;
            };
            let needed = if group.activity == ActivityType::Pillage {
                ACTIVITY_FACTOR
            } else {
                self.ruleset.extra(target).build_time * ACTIVITY_FACTOR
            };
            if group.progress < needed {
                continue;
            }
            let Some(owner) = group.workers.first().and_then(|w| self.units.get(w)).map(|u| u.owner) else {
                continue;
            };
            if group.activity == ActivityType::Pillage {
                self.tile_remove_extra(group.tile, target);
            } else {
                self.tile_add_extra(group.tile, target);
                if self.ruleset.extra(target).is_base() {
                    self.claim_built_base(group.tile, owner);
                }
            }
            tracing::info!(tile = group.tile, activity = %group.activity, target, "work finished");
            for id in group.workers {
                let Some(u) = self.units.get_mut(&id) else {
                    continue;
                };
                u.activity = ActivityType::Idle;
                u.activity_target = None;
                u.activity_count = 0;
                let worker_owner = u.owner;
                let message = format!(
                    "{} finished {} at the {}.",
                    self.units[&id].name(&self.ruleset),
                    group.activity,
                    self.ruleset.extra(target).name
                );
                self.send_unit_info(None, id);
                self.notify_player(worker_owner, Some(group.tile), EventType::WorkerDone, message);
            }
        }
    }

    /// A base finished by `builder` belongs to them, with its territory.
    fn claim_built_base(&mut self, tile: TileIndex, builder: PlayerId) {
        let claims = self
            .map
            .tile(tile)
            .extras
            .iter()
            .any(|e| self.ruleset.extra(e).claims_territory());
        if claims && self.map.tile(tile).owner.map_or(true, |o| o == builder) {
            self.map_claim_ownership(tile, Some(builder), Some(tile), true);
            self.map_claim_border(tile, builder, -1);
        } else if self.map.tile(tile).extras_owner.is_none() {
            self.tile_claim_bases(tile, Some(builder));
        }
        self.update_tile_knowledge(tile);
    }

    // =========================================================================
    // Extras
    // =========================================================================

    /// Put `extra` on `tile`, removing whatever conflicts with it.
    pub fn tile_add_extra(&mut self, tile: TileIndex, extra: ExtraId) {
        if self.map.tile(tile).has_extra(extra) {
            return;
        }
        for conflict in self.ruleset.extra(extra).conflicts.clone() {
            self.tile_remove_extra(tile, conflict);
        }
        self.map.tile_mut(tile).extras.insert(extra);
        tracing::debug!(tile, extra, "extra added");

        let e = self.ruleset.extra(extra);
        let (is_base, claims, vision_bonus) = (e.is_base(), e.claims_territory(), e.vision_bonus_sq);
        if is_base {
            if let Some(owner) = self.map.tile(tile).extras_owner {
                self.map_claim_base(tile, extra, Some(owner));
                if claims {
                    self.map_claim_border(tile, owner, -1);
                }
            }
        }
        if vision_bonus != 0 {
            for unit in self.map.tile(tile).units.clone() {
                self.unit_refresh_vision(unit);
            }
        }
        self.update_tile_knowledge(tile);
    }

    /// Take `extra` off `tile`. Base vision and claimed territory go first.
    pub fn tile_remove_extra(&mut self, tile: TileIndex, extra: ExtraId) {
        if !self.map.tile(tile).has_extra(extra) {
            return;
        }
        let e = self.ruleset.extra(extra);
        let (is_base, claims, vision_bonus) = (e.is_base(), e.claims_territory(), e.vision_bonus_sq);
        if is_base {
            if claims && self.map.tile(tile).extras_owner.is_some() && self.map.tile(tile).city.is_none() {
                self.map_clear_border(tile);
            }
            if let Some(vision) = self.base_visions.remove(&(tile, extra)) {
                self.vision_clear_sight(vision);
                self.vision_free(vision);
            }
        }
        self.map.tile_mut(tile).extras.remove(extra);
        tracing::debug!(tile, extra, "extra removed");

        if is_base {
            let any_base_left = self
                .map
                .tile(tile)
                .extras
                .iter()
                .any(|e| self.ruleset.extra(e).is_base());
            if !any_base_left {
                self.map.tile_mut(tile).extras_owner = None;
            }
        }
        if vision_bonus != 0 {
            for unit in self.map.tile(tile).units.clone() {
                self.unit_refresh_vision(unit);
            }
        }
        self.update_tile_knowledge(tile);
    }

    // =========================================================================
    // Turn cycle
    // =========================================================================

    /// Start a new turn: work progresses, movement is restored, standing
    /// orders run in unit id order and borders are recalculated.
    pub fn begin_turn(&mut self) {
        self.turn += 1;
        tracing::info!(turn = self.turn, "turn begins");
        let players = self.alive_players();
        for &p in &players {
            self.players[p as usize].connection.freeze();
        }

        self.update_unit_activities();
        let ruleset = &self.ruleset;
        for u in self.units.values_mut() {
            u.moves_left = u.move_rate(ruleset);
            u.done_moving = false;
            u.moved = false;
        }
        let ids: Vec<UnitId> = self.units.keys().copied().collect();
        for &id in &ids {
            if self.units.contains_key(&id) {
                self.send_unit_info(None, id);
            }
        }
        for id in ids {
            if self.units.get(&id).is_some_and(|u| u.has_orders()) {
                self.execute_orders(id);
            }
        }
        self.map_calculate_borders();

        for p in players {
            if let Some(player) = self.players.get_mut(p as usize) {
                player.connection.thaw();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Map;
    use crate::packets::Packet;
    use crate::ruleset::Ruleset;
    use crate::settings::GameSettings;
    use crate::types::VisionLayer;

    fn world() -> World {
        let ruleset = Ruleset::classic();
        let grass = ruleset.terrain_by_name("Grassland").unwrap();
        let map = Map::filled(10, 10, false, grass);
        let mut world = World::new(ruleset, GameSettings::new(), map).unwrap();
        world.add_player("A").unwrap();
        world.add_player("B").unwrap();
        world
    }

    fn unit(world: &mut World, owner: PlayerId, name: &str, tile: TileIndex) -> UnitId {
        let utype = world.ruleset.unit_type_by_name(name).unwrap();
        world.create_unit(owner, utype, tile, 0).unwrap()
    }

    // =========================================================================
    // Activities
    // =========================================================================

    #[test]
    fn test_only_settlers_build() {
        let mut world = world();
        let w = unit(&mut world, 0, "Warriors", 44);
        let s = unit(&mut world, 0, "Settlers", 44);
        assert!(!world.can_unit_do_activity(w, ActivityType::GenRoad, None));
        assert!(world.can_unit_do_activity(s, ActivityType::GenRoad, None));
        assert!(matches!(
            world.set_unit_activity(w, ActivityType::Mine, None),
            Err(GameError::IllegalActivity(ActivityType::Mine))
        ));
    }

    #[test]
    fn test_set_activity_picks_target() {
        let mut world = world();
        let s = unit(&mut world, 0, "Settlers", 44);
        world.set_unit_activity(s, ActivityType::GenRoad, None).unwrap();
        let road = world.ruleset.extra_by_name("Road").unwrap();
        assert_eq!(world.units[&s].activity_target, Some(road));
    }

    #[test]
    fn test_fortifying_becomes_fortified() {
        let mut world = world();
        let w = unit(&mut world, 0, "Warriors", 44);
        world.set_unit_activity(w, ActivityType::Fortifying, None).unwrap();
        world.update_unit_activities();
        assert_eq!(world.units[&w].activity, ActivityType::Fortified);
        assert!(!world.can_unit_do_activity(w, ActivityType::Fortifying, None));
    }

    #[test]
    fn test_ships_cannot_fortify() {
        let ruleset = Ruleset::classic();
        let ocean = ruleset.terrain_by_name("Ocean").unwrap();
        let map = Map::filled(6, 6, false, ocean);
        let mut world = World::new(ruleset, GameSettings::new(), map).unwrap();
        world.add_player("A").unwrap();
        let boat = unit(&mut world, 0, "Trireme", 7);
        assert!(!world.can_unit_do_activity(boat, ActivityType::Fortifying, None));
    }

    #[test]
    fn test_two_workers_pool_progress() {
        let mut world = world();
        let road = world.ruleset.extra_by_name("Road").unwrap();
        let a = unit(&mut world, 0, "Settlers", 44);
        let b = unit(&mut world, 0, "Settlers", 44);
        world.set_unit_activity(a, ActivityType::GenRoad, Some(road)).unwrap();
        world.set_unit_activity(b, ActivityType::GenRoad, Some(road)).unwrap();
        world.players[0].connection.take_packets();
        world.update_unit_activities();
        assert!(world.map.tile(44).has_extra(road));
        assert_eq!(world.units[&a].activity, ActivityType::Idle);
        let done = world.players[0]
            .connection
            .take_packets()
            .into_iter()
            .filter(|p| matches!(p, Packet::Notify { event: EventType::WorkerDone, .. }))
            .count();
        assert_eq!(done, 2);
    }

    #[test]
    fn test_single_worker_needs_full_time() {
        let mut world = world();
        let road = world.ruleset.extra_by_name("Road").unwrap();
        let s = unit(&mut world, 0, "Settlers", 44);
        world.set_unit_activity(s, ActivityType::GenRoad, Some(road)).unwrap();
        world.update_unit_activities();
        assert!(!world.map.tile(44).has_extra(road));
        world.update_unit_activities();
        assert!(world.map.tile(44).has_extra(road));
    }

    #[test]
    fn test_pillage_takes_one_turn() {
        let mut world = world();
        let road = world.ruleset.extra_by_name("Road").unwrap();
        world.map.tile_mut(44).extras.insert(road);
        let w = unit(&mut world, 0, "Warriors", 44);
        world.set_unit_activity(w, ActivityType::Pillage, None).unwrap();
        world.update_unit_activities();
        assert!(!world.map.tile(44).has_extra(road));
    }

    // =========================================================================
    // Extras
    // =========================================================================

    #[test]
    fn test_mine_replaces_irrigation() {
        let mut world = world();
        let irrigation = world.ruleset.extra_by_name("Irrigation").unwrap();
        let mine = world.ruleset.extra_by_name("Mine").unwrap();
        world.tile_add_extra(44, irrigation);
        world.tile_add_extra(44, mine);
        assert!(world.map.tile(44).has_extra(mine));
        assert!(!world.map.tile(44).has_extra(irrigation));
    }

    #[test]
    fn test_built_fortress_claims_for_builder() {
        let mut world = world();
        let s = unit(&mut world, 0, "Settlers", 44);
        world.set_unit_activity(s, ActivityType::Base, None).unwrap();
        for _ in 0..3 {
            world.update_unit_activities();
        }
        assert_eq!(world.map.tile(44).extras_owner, Some(0));
        assert_eq!(world.map.tile(44).owner, Some(0));
        assert_eq!(world.base_visions.len(), 1);
    }

    #[test]
    fn test_removing_fortress_drops_its_vision() {
        let mut world = world();
        let fortress = world.ruleset.extra_by_name("Fortress").unwrap();
        world.map.tile_mut(44).extras.insert(fortress);
        world.tile_claim_bases(44, Some(1));
        assert_eq!(world.map_get_seen(1, 44, VisionLayer::Main), 1);
        world.tile_remove_extra(44, fortress);
        assert_eq!(world.map_get_seen(1, 44, VisionLayer::Main), 0);
        assert_eq!(world.map.tile(44).extras_owner, None);
        assert!(world.base_visions.is_empty());
    }

    // =========================================================================
    // Turn cycle
    // =========================================================================

    #[test]
    fn test_begin_turn_restores_moves() {
        let mut world = world();
        let w = unit(&mut world, 0, "Horsemen", 44);
        world.units.get_mut(&w).unwrap().moves_left = 0;
        world.begin_turn();
        assert_eq!(world.turn, 2);
        assert_eq!(world.units[&w].moves_left, 2 * crate::types::SINGLE_MOVE);
        assert!(!world.players[0].connection.is_frozen());
    }
}
