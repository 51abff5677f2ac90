//! Transport relationships between units.
//!
//! A unit refers to its transport by id; a transport's cargo is found by
//! scanning the units on its tile. Loading refuses anything that would
//! create a cycle.

use crate::types::{PlayerId, TileIndex, UnitId, UnitTypeId};
use crate::world::World;

impl World {
    /// Units directly loaded in `transport`, in tile order.
    pub fn unit_list_cargo(&self, transport: UnitId) -> Vec<UnitId> {
        let Some(t) = self.units.get(&transport) else {
            return Vec::new();
        };
        self.map
            .tile(t.tile)
            .units
            .iter()
            .copied()
            .filter(|id| {
                self.units
                    .get(id)
                    .is_some_and(|u| u.transported_by == Some(transport))
            })
            .collect()
    }

    /// Number of units directly loaded in `transport`.
    pub fn get_transporter_occupancy(&self, transport: UnitId) -> usize {
        self.unit_list_cargo(transport).len()
    }

    /// How many transports deep `unit` is nested; 0 when not transported.
    pub fn unit_transport_depth(&self, unit: UnitId) -> usize {
        let mut depth = 0;
        let mut current = self.units.get(&unit).and_then(|u| u.transported_by);
        while let Some(t) = current {
            depth += 1;
            if depth > self.units.len() {
                tracing::error!(unit, "transport chain loops");
                debug_assert!(false, "transport chain loops");
                break;
            }
            current = self.units.get(&t).and_then(|u| u.transported_by);
        }
        depth
    }

    /// Whether `unit` is inside `transport`, directly or through other
    /// transports.
    pub fn unit_contained_in(&self, unit: UnitId, transport: UnitId) -> bool {
        let mut current = self.units.get(&unit).and_then(|u| u.transported_by);
        let mut steps = 0;
        while let Some(t) = current {
            if t == transport {
                return true;
            }
            steps += 1;
            if steps > self.units.len() {
                return false;
            }
            current = self.units.get(&t).and_then(|u| u.transported_by);
        }
        false
    }

    /// Whether a unit of `utype` owned by `owner` fits into `transport`.
    fn transport_accepts(&self, owner: PlayerId, utype: UnitTypeId, transport: UnitId) -> bool {
        let Some(t) = self.units.get(&transport) else {
            return false;
        };
        let ttype = self.ruleset.unit_type(t.utype);
        self.diplomacy.allied(owner, t.owner)
            && ttype.can_carry(self.ruleset.unit_type(utype).class)
            && self.get_transporter_occupancy(transport) < ttype.transport_capacity as usize
    }

    /// Whether `cargo` can be loaded into `transport` right now.
    pub fn could_unit_load(&self, cargo: UnitId, transport: UnitId) -> bool {
        let (Some(c), Some(t)) = (self.units.get(&cargo), self.units.get(&transport)) else {
            return false;
        };
        cargo != transport
            && c.tile == t.tile
            && c.transported_by != Some(transport)
            && !self.unit_contained_in(transport, cargo)
            && self.transport_accepts(c.owner, c.utype, transport)
    }

    /// A transport on `tile` with room for a unit of `utype`.
    pub(crate) fn transporter_for_unit_at(
        &self,
        owner: PlayerId,
        utype: UnitTypeId,
        tile: TileIndex,
    ) -> Option<UnitId> {
        self.map
            .tile(tile)
            .units
            .iter()
            .copied()
            .find(|t| self.transport_accepts(owner, utype, *t))
    }

    /// A transport on the unit's own tile that it could board.
    pub fn transporter_for_unit(&self, unit: UnitId) -> Option<UnitId> {
        let u = self.units.get(&unit)?;
        self.map
            .tile(u.tile)
            .units
            .iter()
            .copied()
            .find(|t| self.could_unit_load(unit, *t))
    }

    /// Load `cargo` into `transport`. Returns whether it was loaded.
    pub fn unit_transport_load(&mut self, cargo: UnitId, transport: UnitId) -> bool {
        if self.units.get(&cargo).is_some_and(|u| u.is_transported()) {
            tracing::error!(cargo, transport, "loading a unit that is already transported");
            debug_assert!(false, "unit in two transports");
            self.unit_transport_unload(cargo);
        }
        if !self.could_unit_load(cargo, transport) {
            tracing::warn!(cargo, transport, "transport cannot take unit");
            return false;
        }
        if let Some(u) = self.units.get_mut(&cargo) {
            u.transported_by = Some(transport);
        }
        tracing::trace!(cargo, transport, "unit loaded");
        true
    }

    /// Take `cargo` out of its transport. Returns whether it was loaded.
    pub fn unit_transport_unload(&mut self, cargo: UnitId) -> bool {
        match self.units.get_mut(&cargo) {
            Some(u) if u.transported_by.is_some() => {
                tracing::trace!(cargo, transport = ?u.transported_by, "unit unloaded");
                u.transported_by = None;
                true
            }
            _ => false,
        }
    }
}
