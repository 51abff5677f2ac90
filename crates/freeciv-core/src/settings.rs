//! Server settings that shape vision, borders and combat.

use crate::types::CITY_MAP_MAX_RADIUS_SQ;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How national borders behave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum BorderMode {
    /// No borders at all.
    Disabled,
    /// Borders are claimed over tiles the owner knows.
    #[default]
    Enabled,
    /// Owners also see everything inside their borders.
    SeeInside,
    /// Borders also extend over unknown tiles.
    Expand,
}

impl BorderMode {
    /// Whether owning a tile grants vision of it.
    pub fn grants_vision(&self) -> bool {
        *self >= BorderMode::SeeInside
    }
}

/// Configuration for a game session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Border behaviour.
    pub borders: BorderMode,
    /// Base squared radius claimed by a city.
    pub border_city_radius_sq: i32,
    /// Squared radius around a city, beyond its work area, that is never lost.
    pub border_city_permanent_radius_sq: i32,
    /// Squared radius added per citizen.
    pub border_size_effect: i32,
    /// Whether fogged tiles keep showing their old owner.
    pub foggedborders: bool,
    /// Squared city work radius for new cities.
    pub init_city_radius_sq: i32,
    /// Squared main vision radius of cities.
    pub init_vision_radius_sq: i32,
    /// Whether unit and city vision reveals unknown tiles.
    pub vision_reveal_tiles: bool,
    /// Whether units get a chance to attack enemies moving next to them.
    pub autoattack: bool,
    /// Whether losing the defender kills every unit on the tile.
    pub killstack: bool,
    /// Chance in percent that a victorious attacker moves into the emptied tile.
    pub occupychance: i32,
    /// Round cap per combat (0 = until one side dies).
    pub combat_max_rounds: i32,
    /// Whether attacking with partial moves weakens the attack.
    pub tired_attack: bool,
    /// Whether huts give their rewards.
    pub huts_enabled: bool,
    /// Seed for the deterministic game RNG.
    pub seed: u64,
}

impl GameSettings {
    pub fn new() -> Self {
        Self {
            borders: BorderMode::Enabled,
            border_city_radius_sq: 17,
            border_city_permanent_radius_sq: 0,
            border_size_effect: 1,
            foggedborders: false,
            init_city_radius_sq: 5,
            init_vision_radius_sq: 5,
            vision_reveal_tiles: true,
            autoattack: false,
            killstack: true,
            occupychance: 0,
            combat_max_rounds: 0,
            tired_attack: true,
            huts_enabled: true,
            seed: 0x5eed,
        }
    }

    /// Settings used by scripted scenarios: no randomness in movement side
    /// effects, borders granting vision.
    pub fn scenario() -> Self {
        Self {
            borders: BorderMode::SeeInside,
            huts_enabled: false,
            ..Self::new()
        }
    }

    /// Parse settings from JSON; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: GameSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings and return any errors.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.border_city_radius_sq < 0 {
            return Err(SettingsError::NegativeRadius("border_city_radius_sq"));
        }
        if self.init_city_radius_sq < 0 || self.init_city_radius_sq > CITY_MAP_MAX_RADIUS_SQ {
            return Err(SettingsError::CityRadiusOutOfRange(self.init_city_radius_sq));
        }
        // Cities see invisible layers at radius 2, main vision must cover that.
        if self.init_vision_radius_sq < 2 {
            return Err(SettingsError::VisionTooSmall(self.init_vision_radius_sq));
        }
        if !(0..=100).contains(&self.occupychance) {
            return Err(SettingsError::PercentOutOfRange("occupychance"));
        }
        if self.combat_max_rounds < 0 {
            return Err(SettingsError::NegativeRadius("combat_max_rounds"));
        }
        Ok(())
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{0} must not be negative")]
    NegativeRadius(&'static str),
    #[error("city radius_sq {0} is out of range")]
    CityRadiusOutOfRange(i32),
    #[error("city vision radius_sq {0} must be at least 2")]
    VisionTooSmall(i32),
    #[error("{0} must be between 0 and 100")]
    PercentOutOfRange(&'static str),
    #[error("malformed settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}
