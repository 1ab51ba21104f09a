//! Exploration layer boundary
//!
//! - `CombatHandoff` comes in: which enemies, the party snapshot, inventory, depth
//! - `CombatResult` goes out: outcome, survivors, XP, loot, and the full log
//!
//! Both are plain JSON documents; the exploration layer owns persistence.

mod loot;

pub use loot::{LootTable, DEFAULT_DROP_RATE};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use crate::combat::{
    ActiveStatus, CombatEvent, CombatantId, DiceSpec, EncounterState, Faction, FleeLoss,
};

/// Which party slot a member fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartySlot {
    Player,
    Companion,
}

impl PartySlot {
    pub fn faction(&self) -> Faction {
        match self {
            PartySlot::Player => Faction::Player,
            PartySlot::Companion => Faction::Companion,
        }
    }
}

/// An enemy named by the exploration layer, either a bare id or an id with
/// a formation position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnemyRef {
    Id(String),
    Placed { id: String, position: u32 },
}

impl EnemyRef {
    pub fn id(&self) -> &str {
        match self {
            EnemyRef::Id(id) | EnemyRef::Placed { id, .. } => id,
        }
    }

    pub fn position(&self) -> Option<u32> {
        match self {
            EnemyRef::Id(_) => None,
            EnemyRef::Placed { position, .. } => Some(*position),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Persistent state of one party member going into combat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyMemberSnapshot {
    pub slot: PartySlot,
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub sanity: i32,
    pub max_sanity: i32,
    /// Unscaled maxima; default to the current maxima
    #[serde(default)]
    pub base_hp: Option<i32>,
    #[serde(default)]
    pub base_sanity: Option<i32>,
    #[serde(default)]
    pub defense: i32,
    #[serde(default)]
    pub initiative: i32,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub xp: u32,
    #[serde(default)]
    pub xp_to_next_level: Option<u32>,
    #[serde(default)]
    pub basic_attack: DiceSpec,
    #[serde(default)]
    pub abilities: Vec<String>,
    #[serde(default = "default_true")]
    pub alive: bool,
}

/// Item id to count
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    items: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("empty item id")]
    EmptyId,
    #[error("zero quantity")]
    ZeroQuantity,
    #[error("item count overflow for {0}")]
    Overflow(String),
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add items, returning the new count
    pub fn add(&mut self, item_id: &str, quantity: u32) -> Result<u32, InventoryError> {
        if item_id.trim().is_empty() {
            return Err(InventoryError::EmptyId);
        }
        if quantity == 0 {
            return Err(InventoryError::ZeroQuantity);
        }
        let slot = self.items.entry(item_id.to_string()).or_insert(0);
        *slot = slot
            .checked_add(quantity)
            .ok_or_else(|| InventoryError::Overflow(item_id.to_string()))?;
        Ok(*slot)
    }

    pub fn count(&self, item_id: &str) -> u32 {
        self.items.get(item_id).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u32)> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn default_depth() -> u32 {
    1
}

/// Everything the exploration layer hands over when a fight starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatHandoff {
    #[serde(default)]
    pub encounter_id: String,
    pub enemies: Vec<EnemyRef>,
    pub party: Vec<PartyMemberSnapshot>,
    #[serde(default)]
    pub inventory: Option<Inventory>,
    #[serde(default = "default_depth")]
    pub depth: u32,
}

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("failed to read handoff {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid handoff: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("handoff has no player")]
    NoPlayer,
}

impl CombatHandoff {
    pub fn from_json(text: &str) -> Result<Self, HandoffError> {
        let handoff: CombatHandoff = serde_json::from_str(text)?;
        if !handoff.party.iter().any(|m| m.slot == PartySlot::Player) {
            return Err(HandoffError::NoPlayer);
        }
        Ok(handoff)
    }

    pub fn load(path: &Path) -> Result<Self, HandoffError> {
        let text = std::fs::read_to_string(path).map_err(|source| HandoffError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Enemies in formation order; unplaced enemies keep their listed order
    /// after the placed ones
    pub fn enemies_in_order(&self) -> Vec<&str> {
        let mut refs: Vec<&EnemyRef> = self.enemies.iter().collect();
        refs.sort_by_key(|r| r.position().unwrap_or(u32::MAX));
        refs.into_iter().map(EnemyRef::id).collect()
    }
}

/// Final state of a party member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberOutcome {
    pub slot: PartySlot,
    pub name: String,
    pub alive: bool,
    pub hp: i32,
    pub max_hp: i32,
    pub sanity: i32,
    pub max_sanity: i32,
    pub level: u32,
    pub xp: u32,
    pub xp_to_next_level: u32,
    pub status_effects: Vec<ActiveStatus>,
}

/// One enemy that fell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefeatedEnemy {
    pub combatant: CombatantId,
    pub template_id: String,
    pub name: String,
    pub threat_level: u32,
    pub xp_reward: u32,
}

/// An item dropped on victory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootDrop {
    pub item_id: String,
    pub from_enemy: String,
}

/// Terminal snapshot handed back to the exploration layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatResult {
    pub session_id: Uuid,
    pub encounter_id: String,
    pub outcome: EncounterState,
    pub rounds: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub members: Vec<MemberOutcome>,
    pub xp_awarded: u32,
    pub enemies_defeated: Vec<DefeatedEnemy>,
    pub loot_drops: Vec<LootDrop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flee_summary: Option<Vec<FleeLoss>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Inventory>,
    pub log: Vec<CombatEvent>,
}
