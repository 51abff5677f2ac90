//! Pairwise diplomatic states.
//!
//! Vision, zones of control, border entry and autoattack all ask the same
//! three questions: are two players at war, allied, or bound not to attack.

use crate::types::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Diplomatic state between two players.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DiplStatus {
    /// The players have never met. Treated as war.
    #[default]
    NoContact,
    War,
    Ceasefire,
    Peace,
    Alliance,
}

/// Diplomatic state between all players.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DiplomacyState {
    /// Relationships between player pairs, keyed by `(low, high)`.
    /// Serialized as a sequence of key-value pairs since JSON requires string keys.
    #[serde(with = "tuple_key_map")]
    relationships: HashMap<(PlayerId, PlayerId), DiplStatus>,
}

/// Custom serialization module for HashMap with tuple keys.
mod tuple_key_map {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(
        map: &HashMap<(PlayerId, PlayerId), DiplStatus>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(map.len()))?;
        for (key, value) in map {
            seq.serialize_element(&(key, value))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<HashMap<(PlayerId, PlayerId), DiplStatus>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs: Vec<((PlayerId, PlayerId), DiplStatus)> =
            Deserialize::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

fn key(a: PlayerId, b: PlayerId) -> (PlayerId, PlayerId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

impl DiplomacyState {
    /// State between two distinct players. A player is allied with itself.
    pub fn status(&self, a: PlayerId, b: PlayerId) -> DiplStatus {
        if a == b {
            return DiplStatus::Alliance;
        }
        self.relationships
            .get(&key(a, b))
            .copied()
            .unwrap_or_default()
    }

    /// Set the state between two players, symmetrically.
    pub fn set_status(&mut self, a: PlayerId, b: PlayerId, status: DiplStatus) {
        if a == b {
            return;
        }
        tracing::debug!(a, b, ?status, "diplomatic state changed");
        self.relationships.insert(key(a, b), status);
    }

    /// Check if two players are at war. Players without contact count as at war.
    pub fn at_war(&self, a: PlayerId, b: PlayerId) -> bool {
        a != b && matches!(self.status(a, b), DiplStatus::War | DiplStatus::NoContact)
    }

    pub fn allied(&self, a: PlayerId, b: PlayerId) -> bool {
        self.status(a, b) == DiplStatus::Alliance
    }

    /// Whether a treaty forbids attacks between the two players.
    pub fn non_attack(&self, a: PlayerId, b: PlayerId) -> bool {
        matches!(
            self.status(a, b),
            DiplStatus::Peace | DiplStatus::Ceasefire
        )
    }

    /// Forget every relationship involving `player`.
    pub fn remove_player(&mut self, player: PlayerId) {
        self.relationships
            .retain(|(a, b), _| *a != player && *b != player);
    }
}
