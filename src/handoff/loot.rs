//! Depth-scaled loot drops

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::{DefeatedEnemy, LootDrop};

/// Drop rate used when a depth has no entry and depth 1 is missing too
pub const DEFAULT_DROP_RATE: f64 = 0.15;

/// Enemies at or above this threat level always drop something
const GUARANTEED_DROP_THREAT: u32 = 3;

/// Per-depth drop rates and item pools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootTable {
    pub drop_rates: BTreeMap<u32, f64>,
    pub pools: BTreeMap<u32, Vec<String>>,
}

impl Default for LootTable {
    fn default() -> Self {
        let drop_rates = [
            (1, 0.15),
            (2, 0.18),
            (3, 0.22),
            (4, 0.25),
            (5, 0.30),
            (6, 0.35),
            (7, 0.50),
        ]
        .into_iter()
        .collect();

        let pool = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let pools = [
            (1, pool(&["small_health_potion", "torch"])),
            (2, pool(&["small_health_potion", "torch", "antidote"])),
            (3, pool(&["health_potion", "small_sanity_tonic", "bandage"])),
            (4, pool(&["health_potion", "sanity_tonic", "smoke_bomb"])),
            (5, pool(&["large_health_potion", "sanity_tonic", "adrenaline_shot"])),
            (6, pool(&["large_health_potion", "large_sanity_tonic", "elixir"])),
            (7, pool(&["elixir", "phoenix_feather", "large_health_potion", "large_sanity_tonic"])),
        ]
        .into_iter()
        .collect();

        Self { drop_rates, pools }
    }
}

impl LootTable {
    pub fn drop_rate(&self, depth: u32) -> f64 {
        self.drop_rates
            .get(&depth)
            .or_else(|| self.drop_rates.get(&1))
            .copied()
            .unwrap_or(DEFAULT_DROP_RATE)
    }

    pub fn pool(&self, depth: u32) -> &[String] {
        self.pools
            .get(&depth)
            .or_else(|| self.pools.get(&1))
            .map_or(&[], Vec::as_slice)
    }

    /// Roll one drop chance per defeated enemy
    pub fn roll_drops<R: Rng + ?Sized>(
        &self,
        depth: u32,
        defeated: &[DefeatedEnemy],
        rng: &mut R,
    ) -> Vec<LootDrop> {
        let rate = self.drop_rate(depth);
        let pool = self.pool(depth);
        let mut drops = Vec::new();

        for enemy in defeated {
            let guaranteed = enemy.threat_level >= GUARANTEED_DROP_THREAT;
            if !guaranteed && rng.random::<f64>() >= rate {
                continue;
            }
            if let Some(item) = pool.choose(rng) {
                debug!("{} dropped {}", enemy.name, item);
                drops.push(LootDrop {
                    item_id: item.clone(),
                    from_enemy: enemy.name.clone(),
                });
            }
        }
        drops
    }
}
