//! Tunable combat rules

use serde::{Deserialize, Serialize};

/// Numbers that shape an encounter. Loaded as the `[rules]` config table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Initiative jitter applied each round, as +/- this many points
    pub initiative_jitter: i32,
    /// HP fraction below which a party member counts as low
    pub low_hp_threshold: f64,
    /// Fraction of current HP lost when fleeing
    pub flee_hp_fraction: f64,
    /// Fraction of current sanity lost when fleeing
    pub flee_sanity_fraction: f64,
    /// Live player-side summons allowed at once
    pub max_player_summons: usize,
    pub max_level: u32,
    /// XP granted by enemies whose template omits `xp_reward`
    pub default_xp_reward: u32,
    /// Sanity regained by the defend action
    pub defend_sanity_restore: i32,
    /// Sanity spent by the element action
    pub element_sanity_cost: i32,
    /// Rebuild attempts when the queue points at a removed combatant
    pub max_queue_retries: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            initiative_jitter: 3,
            low_hp_threshold: 0.3,
            flee_hp_fraction: 0.5,
            flee_sanity_fraction: 0.5,
            max_player_summons: 2,
            max_level: 10,
            default_xp_reward: 10,
            defend_sanity_restore: 5,
            element_sanity_cost: 5,
            max_queue_retries: 4,
        }
    }
}
