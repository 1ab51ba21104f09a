//! Damage types and mitigation
//!
//! Defense mitigates physical damage only; every other type bypasses it.
//! HP never drops below 0 and dead combatants take no further damage.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::combatant::Combatant;

/// Types of damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    /// Weapons, claws, crushing blows
    #[default]
    Physical,
    Fire,
    Cold,
    Lightning,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    /// Mind-rending damage
    Psychic,
    /// Raw elemental force channelled by party members
    Arcane,
}

impl DamageType {
    /// Get all damage types
    pub fn all() -> &'static [DamageType] {
        &[
            DamageType::Physical,
            DamageType::Fire,
            DamageType::Cold,
            DamageType::Lightning,
            DamageType::Acid,
            DamageType::Poison,
            DamageType::Necrotic,
            DamageType::Radiant,
            DamageType::Psychic,
            DamageType::Arcane,
        ]
    }

    /// Whether defense reduces damage of this type
    pub fn mitigated_by_defense(&self) -> bool {
        matches!(self, DamageType::Physical)
    }
}

impl FromStr for DamageType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "physical" | "phys" | "slashing" | "piercing" | "bludgeoning" => {
                Ok(DamageType::Physical)
            }
            "fire" | "burning" => Ok(DamageType::Fire),
            "cold" | "ice" | "frost" => Ok(DamageType::Cold),
            "lightning" | "electric" | "shock" => Ok(DamageType::Lightning),
            "acid" => Ok(DamageType::Acid),
            "poison" | "poisoned" => Ok(DamageType::Poison),
            "necrotic" | "death" => Ok(DamageType::Necrotic),
            "radiant" | "holy" => Ok(DamageType::Radiant),
            "psychic" | "mental" => Ok(DamageType::Psychic),
            "arcane" | "element" | "elemental" => Ok(DamageType::Arcane),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for DamageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DamageType::Physical => "physical",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Acid => "acid",
            DamageType::Poison => "poison",
            DamageType::Necrotic => "necrotic",
            DamageType::Radiant => "radiant",
            DamageType::Psychic => "psychic",
            DamageType::Arcane => "arcane",
        };
        write!(f, "{}", s)
    }
}

/// Result of applying damage to a combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageOutcome {
    /// Damage before mitigation
    pub raw: i32,
    /// Amount absorbed by defense
    pub prevented: i32,
    /// HP actually subtracted
    pub applied: i32,
    pub damage_type: DamageType,
    /// Whether a barrier nullified the hit entirely
    pub blocked: bool,
}

impl DamageOutcome {
    /// Outcome for a hit that landed nothing
    pub fn none(raw: i32, damage_type: DamageType) -> Self {
        Self {
            raw,
            prevented: 0,
            applied: 0,
            damage_type,
            blocked: false,
        }
    }

    /// Outcome for a hit that a barrier swallowed
    pub fn blocked(raw: i32, damage_type: DamageType) -> Self {
        Self {
            blocked: true,
            ..Self::none(raw, damage_type)
        }
    }
}

/// Amount left after defense, never negative
pub fn mitigate(raw: i32, defense: i32, damage_type: DamageType) -> i32 {
    if damage_type.mitigated_by_defense() {
        (raw - defense.max(0)).max(0)
    } else {
        raw.max(0)
    }
}

/// Apply incoming damage to a combatant and return what actually landed.
pub fn apply_damage(target: &mut Combatant, raw: i32, damage_type: DamageType) -> DamageOutcome {
    if !target.is_alive() {
        return DamageOutcome::none(raw, damage_type);
    }

    let mitigated = mitigate(raw, target.effective_defense(), damage_type);
    let applied = mitigated.min(target.hp);
    target.hp -= applied;

    DamageOutcome {
        raw,
        prevented: raw.max(0) - mitigated,
        applied,
        damage_type,
        blocked: false,
    }
}
