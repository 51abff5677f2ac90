//! Static game rules: terrains, extras, unit classes and types, veteran
//! levels and advances.
//!
//! A [`Ruleset`] is immutable once a [`crate::world::World`] is built from it.
//! The built-in [`Ruleset::classic`] covers the common tile and unit set;
//! alternative rulesets load from JSON.

use crate::types::{AdvanceId, ExtraId, TerrainId, UnitClassId, UnitTypeId, VisionLayer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad terrain category used for native-terrain checks and continents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainClass {
    Land,
    Oceanic,
}

/// A terrain type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainType {
    pub name: String,
    /// Primary tileset tag base.
    pub graphic_str: String,
    /// Fallback tileset tag base.
    pub graphic_alt: String,
    pub class: TerrainClass,
    /// Whole moves needed to enter.
    pub movement_cost: i32,
    /// Defense bonus in percent.
    pub defense_bonus: i32,
    /// Added to the squared vision radius of units standing here.
    #[serde(default)]
    pub vision_bonus_sq: i32,
}

/// What an extra is and how it comes to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtraCause {
    Irrigation,
    Mine,
    Road,
    Base,
    River,
    Hut,
    Resource,
}

/// A tile feature layered on terrain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtraType {
    pub name: String,
    pub graphic_str: String,
    pub graphic_alt: String,
    pub cause: ExtraCause,
    /// Turns of work to build (0 = cannot be built).
    #[serde(default)]
    pub build_time: i32,
    /// Move fragments to travel along it, for roads and rivers.
    #[serde(default)]
    pub move_cost: Option<i32>,
    /// Defense bonus in percent.
    #[serde(default)]
    pub defense_bonus: i32,
    /// Squared border radius claimed by a base (-1 = none).
    #[serde(default = "no_radius")]
    pub border_sq: i32,
    #[serde(default = "no_radius")]
    pub vision_main_sq: i32,
    #[serde(default = "no_radius")]
    pub vision_invis_sq: i32,
    #[serde(default = "no_radius")]
    pub vision_subs_sq: i32,
    /// Added to the squared vision radius of units on the tile.
    #[serde(default)]
    pub vision_bonus_sq: i32,
    #[serde(default)]
    pub pillageable: bool,
    /// Extras removed when this one is built.
    #[serde(default)]
    pub conflicts: Vec<ExtraId>,
    /// Terrain classes this extra may exist on.
    pub native_to: Vec<TerrainClass>,
    /// Advance needed to see this extra at all.
    #[serde(default)]
    pub visibility_req: Option<AdvanceId>,
}

fn no_radius() -> i32 {
    -1
}

impl ExtraType {
    pub fn is_base(&self) -> bool {
        self.cause == ExtraCause::Base
    }

    /// Bases with a border radius act as border sources.
    pub fn claims_territory(&self) -> bool {
        self.is_base() && self.border_sq >= 0
    }

    pub fn has_vision(&self) -> bool {
        self.vision_main_sq >= 0
    }

    pub fn is_native_to(&self, class: TerrainClass) -> bool {
        self.native_to.contains(&class)
    }
}

/// What happens when a unit of a class enters a hut.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HutBehavior {
    #[default]
    Normal,
    Nothing,
    Frighten,
}

/// Shared movement behaviour of a group of unit types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitClass {
    pub name: String,
    pub native_to: Vec<TerrainClass>,
    /// Subject to zones of control.
    pub zoc: bool,
    pub can_occupy_city: bool,
    pub can_fortify: bool,
    /// Receives terrain defense bonuses.
    pub terrain_defense: bool,
    pub can_pillage: bool,
    #[serde(default)]
    pub hut_behavior: HutBehavior,
}

/// Special abilities of unit types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitTypeFlag {
    /// Can build terrain improvements.
    Settlers,
    /// Ignores zones of control.
    IgZoc,
    /// Always provokes autoattack, even when the odds are poor.
    Provoking,
    /// Defends badly inside cities.
    BadCityDefender,
    CantFortify,
    /// Attacking uses all movement.
    OneAttack,
    /// Non-military unit.
    NonMil,
}

/// A unit type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitType {
    pub name: String,
    pub graphic_str: String,
    pub graphic_alt: String,
    pub class: UnitClassId,
    pub attack: i32,
    pub defense: i32,
    pub hp: i32,
    pub firepower: i32,
    /// Whole moves per turn.
    pub move_rate: i32,
    pub vision_radius_sq: i32,
    /// Layer this unit is visible on.
    #[serde(default)]
    pub vlayer: VisionLayer,
    #[serde(default)]
    pub transport_capacity: u8,
    /// Classes this type can carry.
    #[serde(default)]
    pub cargo: Vec<UnitClassId>,
    #[serde(default)]
    pub flags: Vec<UnitTypeFlag>,
    pub build_cost: i32,
}

impl UnitType {
    pub fn has_flag(&self, flag: UnitTypeFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_military(&self) -> bool {
        !self.has_flag(UnitTypeFlag::NonMil)
    }

    pub fn can_carry(&self, class: UnitClassId) -> bool {
        self.transport_capacity > 0 && self.cargo.contains(&class)
    }
}

/// One step of the veteran ladder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VeteranLevel {
    pub name: String,
    /// Combat strength in percent.
    pub power_fact: i32,
    /// Chance in percent to reach the next level after surviving combat.
    pub raise_chance: i32,
    /// Extra move fragments per turn.
    #[serde(default)]
    pub move_bonus: i32,
}

/// Flags granted by knowing an advance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TechFlag {
    /// Borders may extend over any ocean.
    ClaimOcean,
    /// Borders may extend over ocean from ocean-based sources.
    ClaimOceanLimited,
}

/// A technology.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Advance {
    pub name: String,
    #[serde(default)]
    pub flags: Vec<TechFlag>,
}

/// Errors produced while loading or validating a ruleset.
#[derive(Debug, Error)]
pub enum RulesetError {
    #[error("ruleset has no terrains")]
    NoTerrains,
    #[error("ruleset has no veteran levels")]
    NoVeteranLevels,
    #[error("too many extras: {0} (max 64)")]
    TooManyExtras(usize),
    #[error("duplicate {kind} name \"{name}\"")]
    DuplicateName { kind: &'static str, name: String },
    #[error("unit type \"{unit}\" refers to missing class {class}")]
    MissingClass { unit: String, class: UnitClassId },
    #[error("extra \"{0}\" has invisible-layer vision wider than its main vision")]
    VisionLayerOrder(String),
    #[error("extra \"{extra}\" refers to missing {kind} {index}")]
    DanglingReference {
        extra: String,
        kind: &'static str,
        index: usize,
    },
    #[error("malformed ruleset JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The complete rule set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ruleset {
    pub name: String,
    pub terrains: Vec<TerrainType>,
    pub extras: Vec<ExtraType>,
    pub unit_classes: Vec<UnitClass>,
    pub unit_types: Vec<UnitType>,
    pub veteran_levels: Vec<VeteranLevel>,
    pub advances: Vec<Advance>,
    /// Unit type handed out by huts as mercenaries.
    #[serde(default)]
    pub hut_mercenary: Option<UnitTypeId>,
}

impl Ruleset {
    /// Parse and validate a ruleset from JSON.
    pub fn from_json(json: &str) -> Result<Self, RulesetError> {
        let ruleset: Ruleset = serde_json::from_str(json)?;
        ruleset.validate()?;
        Ok(ruleset)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), RulesetError> {
        if self.terrains.is_empty() {
            return Err(RulesetError::NoTerrains);
        }
        if self.veteran_levels.is_empty() {
            return Err(RulesetError::NoVeteranLevels);
        }
        if self.extras.len() > 64 {
            return Err(RulesetError::TooManyExtras(self.extras.len()));
        }
        check_unique("terrain", self.terrains.iter().map(|t| t.name.as_str()))?;
        check_unique("extra", self.extras.iter().map(|e| e.name.as_str()))?;
        check_unique("unit type", self.unit_types.iter().map(|u| u.name.as_str()))?;
        for utype in &self.unit_types {
            if utype.class as usize >= self.unit_classes.len() {
                return Err(RulesetError::MissingClass {
                    unit: utype.name.clone(),
                    class: utype.class,
                });
            }
        }
        for extra in &self.extras {
            if extra.vision_invis_sq > extra.vision_main_sq
                || extra.vision_subs_sq > extra.vision_main_sq
            {
                return Err(RulesetError::VisionLayerOrder(extra.name.clone()));
            }
            if let Some(&bad) = extra
                .conflicts
                .iter()
                .find(|c| **c as usize >= self.extras.len())
            {
                return Err(RulesetError::DanglingReference {
                    extra: extra.name.clone(),
                    kind: "extra",
                    index: bad as usize,
                });
            }
            if let Some(req) = extra.visibility_req {
                if req as usize >= self.advances.len() {
                    return Err(RulesetError::DanglingReference {
                        extra: extra.name.clone(),
                        kind: "advance",
                        index: req as usize,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn terrain(&self, id: TerrainId) -> &TerrainType {
        &self.terrains[id as usize]
    }

    pub fn extra(&self, id: ExtraId) -> &ExtraType {
        &self.extras[id as usize]
    }

    pub fn unit_type(&self, id: UnitTypeId) -> &UnitType {
        &self.unit_types[id as usize]
    }

    pub fn unit_class(&self, id: UnitClassId) -> &UnitClass {
        &self.unit_classes[id as usize]
    }

    /// Class of a unit type.
    pub fn class_of(&self, id: UnitTypeId) -> &UnitClass {
        self.unit_class(self.unit_type(id).class)
    }

    pub fn terrain_by_name(&self, name: &str) -> Option<TerrainId> {
        self.terrains
            .iter()
            .position(|t| t.name == name)
            .map(|i| i as TerrainId)
    }

    pub fn extra_by_name(&self, name: &str) -> Option<ExtraId> {
        self.extras
            .iter()
            .position(|e| e.name == name)
            .map(|i| i as ExtraId)
    }

    pub fn unit_type_by_name(&self, name: &str) -> Option<UnitTypeId> {
        self.unit_types
            .iter()
            .position(|u| u.name == name)
            .map(|i| i as UnitTypeId)
    }

    pub fn advance_by_name(&self, name: &str) -> Option<AdvanceId> {
        self.advances
            .iter()
            .position(|a| a.name == name)
            .map(|i| i as AdvanceId)
    }

    /// All extras with the given cause.
    pub fn extras_with_cause(&self, cause: ExtraCause) -> impl Iterator<Item = ExtraId> + '_ {
        self.extras
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.cause == cause)
            .map(|(i, _)| i as ExtraId)
    }

    pub fn is_ocean(&self, terrain: TerrainId) -> bool {
        self.terrain(terrain).class == TerrainClass::Oceanic
    }

    /// Whether units of the given type can exist on the terrain.
    pub fn is_native_terrain(&self, utype: UnitTypeId, terrain: TerrainId) -> bool {
        self.class_of(utype)
            .native_to
            .contains(&self.terrain(terrain).class)
    }

    /// Highest veteran level index.
    pub fn max_veteran_level(&self) -> u8 {
        (self.veteran_levels.len().saturating_sub(1)) as u8
    }

    /// Veteran level data, clamped to the top of the ladder.
    pub fn veteran_level(&self, level: u8) -> &VeteranLevel {
        let idx = (level as usize).min(self.veteran_levels.len().saturating_sub(1));
        &self.veteran_levels[idx]
    }

    /// The classic rule set.
    pub fn classic() -> Self {
        use ExtraCause::*;
        use TerrainClass::*;
        use UnitTypeFlag::*;

        let terrain = |name: &str, gfx: &str, class, movement_cost, defense_bonus| TerrainType {
            name: name.to_string(),
            graphic_str: gfx.to_string(),
            graphic_alt: "-".to_string(),
            class,
            movement_cost,
            defense_bonus,
            vision_bonus_sq: 0,
        };
        let extra = |name: &str, gfx: &str, cause, native_to: Vec<TerrainClass>| ExtraType {
            name: name.to_string(),
            graphic_str: gfx.to_string(),
            graphic_alt: "-".to_string(),
            cause,
            build_time: 0,
            move_cost: None,
            defense_bonus: 0,
            border_sq: -1,
            vision_main_sq: -1,
            vision_invis_sq: -1,
            vision_subs_sq: -1,
            vision_bonus_sq: 0,
            pillageable: false,
            conflicts: Vec::new(),
            native_to,
            visibility_req: None,
        };
        let unit = |name: &str, gfx: &str, class, (attack, defense, hp, firepower), move_rate| {
            UnitType {
                name: name.to_string(),
                graphic_str: gfx.to_string(),
                graphic_alt: "-".to_string(),
                class,
                attack,
                defense,
                hp,
                firepower,
                move_rate,
                vision_radius_sq: 2,
                vlayer: VisionLayer::Main,
                transport_capacity: 0,
                cargo: Vec::new(),
                flags: Vec::new(),
                build_cost: 10 * (attack + defense).max(1),
            }
        };

        let terrains = vec![
            terrain("Lake", "lake", Oceanic, 1, 0),
            terrain("Ocean", "coast", Oceanic, 1, 0),
            terrain("Deep Ocean", "floor", Oceanic, 1, 0),
            terrain("Glacier", "arctic", Land, 2, 0),
            terrain("Desert", "desert", Land, 1, 0),
            terrain("Forest", "forest", Land, 2, 25),
            terrain("Grassland", "grassland", Land, 1, 0),
            terrain("Hills", "hills", Land, 2, 50),
            terrain("Jungle", "jungle", Land, 2, 25),
            terrain("Mountains", "mountains", Land, 3, 100),
            terrain("Plains", "plains", Land, 1, 0),
            terrain("Swamp", "swamp", Land, 2, 25),
            terrain("Tundra", "tundra", Land, 1, 0),
        ];

        let mut irrigation = extra("Irrigation", "tx.irrigation", Irrigation, vec![Land]);
        irrigation.build_time = 5;
        irrigation.pillageable = true;
        irrigation.conflicts = vec![1];
        let mut mine = extra("Mine", "tx.mine", Mine, vec![Land]);
        mine.build_time = 10;
        mine.pillageable = true;
        mine.conflicts = vec![0];
        let mut road = extra("Road", "road.road", Road, vec![Land]);
        road.build_time = 2;
        road.move_cost = Some(1);
        road.pillageable = true;
        let mut river = extra("River", "road.river", River, vec![Land]);
        river.defense_bonus = 25;
        let mut fortress = extra("Fortress", "base.fortress", Base, vec![Land]);
        fortress.build_time = 3;
        fortress.defense_bonus = 100;
        fortress.border_sq = 5;
        fortress.vision_main_sq = 5;
        fortress.vision_invis_sq = 2;
        fortress.vision_subs_sq = 2;
        fortress.pillageable = true;
        let mut airbase = extra("Airbase", "base.airbase", Base, vec![Land]);
        airbase.build_time = 3;
        airbase.pillageable = true;
        let hut = extra("Hut", "tx.village", Hut, vec![Land]);
        let fish = extra("Fish", "ts.fish", Resource, vec![Oceanic]);
        let mut oil = extra("Oil", "ts.oil", Resource, vec![Land]);
        oil.visibility_req = Some(3);
        let extras = vec![irrigation, mine, road, river, fortress, airbase, hut, fish, oil];

        let unit_classes = vec![
            UnitClass {
                name: "Land".to_string(),
                native_to: vec![Land],
                zoc: true,
                can_occupy_city: true,
                can_fortify: true,
                terrain_defense: true,
                can_pillage: true,
                hut_behavior: HutBehavior::Normal,
            },
            UnitClass {
                name: "Sea".to_string(),
                native_to: vec![Oceanic],
                zoc: false,
                can_occupy_city: false,
                can_fortify: false,
                terrain_defense: false,
                can_pillage: false,
                hut_behavior: HutBehavior::Nothing,
            },
        ];

        let mut settlers = unit("Settlers", "u.settlers", 0, (0, 1, 20, 1), 1);
        settlers.flags = vec![Settlers, NonMil];
        settlers.build_cost = 30;
        let mut workers = unit("Workers", "u.workers", 0, (0, 1, 10, 1), 1);
        workers.flags = vec![Settlers, NonMil];
        let warriors = unit("Warriors", "u.warriors", 0, (1, 1, 10, 1), 1);
        let phalanx = unit("Phalanx", "u.phalanx", 0, (1, 2, 10, 1), 1);
        let archers = unit("Archers", "u.archers", 0, (3, 2, 10, 1), 1);
        let horsemen = unit("Horsemen", "u.horsemen", 0, (2, 1, 10, 1), 2);
        let legion = unit("Legion", "u.legion", 0, (4, 2, 10, 1), 1);
        let mut explorer = unit("Explorer", "u.explorer", 0, (0, 1, 10, 1), 3);
        explorer.flags = vec![IgZoc, NonMil];
        let mut trireme = unit("Trireme", "u.trireme", 1, (1, 1, 10, 1), 3);
        trireme.transport_capacity = 2;
        trireme.cargo = vec![0];
        let mut submarine = unit("Submarine", "u.submarine", 1, (12, 2, 30, 2), 5);
        submarine.vlayer = VisionLayer::Invis;
        submarine.flags = vec![BadCityDefender];
        let unit_types = vec![
            settlers, workers, warriors, phalanx, archers, horsemen, legion, explorer, trireme,
            submarine,
        ];

        let level = |name: &str, power_fact, raise_chance| VeteranLevel {
            name: name.to_string(),
            power_fact,
            raise_chance,
            move_bonus: 0,
        };
        let veteran_levels = vec![
            level("green", 100, 50),
            level("veteran", 150, 33),
            level("hardened", 175, 20),
            level("elite", 200, 0),
        ];

        let advance = |name: &str, flags: Vec<TechFlag>| Advance {
            name: name.to_string(),
            flags,
        };
        let advances = vec![
            advance("Bronze Working", vec![]),
            advance("Map Making", vec![TechFlag::ClaimOceanLimited]),
            advance("Navigation", vec![]),
            advance("Refining", vec![]),
            advance("Amphibious Warfare", vec![TechFlag::ClaimOcean]),
        ];

        Self {
            name: "classic".to_string(),
            terrains,
            extras,
            unit_classes,
            unit_types,
            veteran_levels,
            advances,
            hut_mercenary: Some(3),
        }
    }
}

impl Default for Ruleset {
    fn default() -> Self {
        Self::classic()
    }
}

fn check_unique<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), RulesetError> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(RulesetError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_is_valid() {
        let ruleset = Ruleset::classic();
        assert!(ruleset.validate().is_ok());
        assert_eq!(ruleset.terrain_by_name("Ocean"), Some(1));
        assert!(ruleset.is_ocean(1));
        assert!(!ruleset.is_ocean(ruleset.terrain_by_name("Plains").unwrap()));
    }

    #[test]
    fn test_lookups_by_name() {
        let ruleset = Ruleset::classic();
        let fortress = ruleset.extra_by_name("Fortress").unwrap();
        assert!(ruleset.extra(fortress).claims_territory());
        assert!(ruleset.extra(fortress).has_vision());
        let airbase = ruleset.extra_by_name("Airbase").unwrap();
        assert!(!ruleset.extra(airbase).claims_territory());
        assert_eq!(ruleset.unit_type_by_name("Trireme"), Some(8));
        assert_eq!(ruleset.advance_by_name("Refining"), Some(3));
    }

    #[test]
    fn test_native_terrain() {
        let ruleset = Ruleset::classic();
        let warriors = ruleset.unit_type_by_name("Warriors").unwrap();
        let trireme = ruleset.unit_type_by_name("Trireme").unwrap();
        let ocean = ruleset.terrain_by_name("Ocean").unwrap();
        let hills = ruleset.terrain_by_name("Hills").unwrap();
        assert!(ruleset.is_native_terrain(warriors, hills));
        assert!(!ruleset.is_native_terrain(warriors, ocean));
        assert!(ruleset.is_native_terrain(trireme, ocean));
        assert!(ruleset.unit_type(trireme).can_carry(0));
    }

    #[test]
    fn test_veteran_level_clamped() {
        let ruleset = Ruleset::classic();
        assert_eq!(ruleset.max_veteran_level(), 3);
        assert_eq!(ruleset.veteran_level(9).power_fact, 200);
    }

    #[test]
    fn test_json_roundtrip_validates() {
        let json = serde_json::to_string(&Ruleset::classic()).unwrap();
        let loaded = Ruleset::from_json(&json).unwrap();
        assert_eq!(loaded.terrains.len(), Ruleset::classic().terrains.len());
    }

    #[test]
    fn test_duplicate_terrain_rejected() {
        let mut ruleset = Ruleset::classic();
        let dup = ruleset.terrains[4].clone();
        ruleset.terrains.push(dup);
        assert!(matches!(
            ruleset.validate(),
            Err(RulesetError::DuplicateName { kind: "terrain", .. })
        ));
    }

    #[test]
    fn test_extra_vision_order_checked() {
        let mut ruleset = Ruleset::classic();
        ruleset.extras[4].vision_invis_sq = 10;
        assert!(matches!(
            ruleset.validate(),
            Err(RulesetError::VisionLayerOrder(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            Ruleset::from_json("{ not json"),
            Err(RulesetError::Json(_))
        ));
    }
}
