//! Enemy and summon templates

use serde::{Deserialize, Serialize};

use crate::combat::{Combatant, DiceSpec, Faction, SummonBehavior, SummonState};

fn one() -> u32 {
    1
}

/// Combat stats shared by every instance of an enemy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyStats {
    pub hp: i32,
    #[serde(default)]
    pub basic_attack: DiceSpec,
    #[serde(default)]
    pub sanity_damage: i32,
    #[serde(default)]
    pub defense: i32,
    #[serde(default)]
    pub init: i32,
}

fn default_on_hit_magnitude() -> i32 {
    2
}

/// Status a basic attack may inflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnHitEffect {
    pub status_id: String,
    pub chance: f64,
    #[serde(default)]
    pub duration: Option<u32>,
    /// Instance magnitude; damage per tick for damage-over-time statuses
    #[serde(default = "default_on_hit_magnitude")]
    pub damage_per_turn: i32,
}

/// How many minions a summon ability calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummonCount {
    pub min: u32,
    pub max: u32,
}

impl Default for SummonCount {
    fn default() -> Self {
        Self { min: 1, max: 1 }
    }
}

/// Status rider attached to an enemy HP attack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityRider {
    #[serde(alias = "type")]
    pub status_id: String,
    #[serde(default)]
    pub chance: Option<f64>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub damage_per_turn: Option<i32>,
}

/// What an enemy special ability does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnemyAbilityKind {
    /// Call minions from the enemy catalog
    Summon {
        summon_ids: Vec<String>,
        #[serde(default)]
        summon_count: SummonCount,
    },
    /// Sanity damage to the whole living party
    SanityAttack {
        #[serde(default)]
        sanity_damage: Option<DiceSpec>,
    },
    /// Physical strike on one party member
    HpAttack {
        #[serde(default)]
        damage: Option<DiceSpec>,
        #[serde(default)]
        effect: Option<AbilityRider>,
    },
}

/// Special ability on an enemy template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyAbility {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub kind: EnemyAbilityKind,
    #[serde(default)]
    pub chance: Option<f64>,
}

impl EnemyAbility {
    /// Chance the ability fires when considered
    pub fn chance(&self) -> f64 {
        self.chance.unwrap_or(0.5).clamp(0.0, 1.0)
    }

    pub fn summon_ids(&self) -> &[String] {
        match &self.kind {
            EnemyAbilityKind::Summon { summon_ids, .. } => summon_ids,
            _ => &[],
        }
    }

    pub fn is_summon(&self) -> bool {
        matches!(self.kind, EnemyAbilityKind::Summon { .. })
    }
}

/// Decision hints for enemies with special abilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiLogic {
    #[serde(default)]
    pub summon_if_no_minions: bool,
    #[serde(default)]
    pub preferred_ability_order: Vec<String>,
}

/// Catalog entry for an enemy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "one")]
    pub threat_level: u32,
    pub base_stats: EnemyStats,
    #[serde(default)]
    pub on_hit: Option<OnHitEffect>,
    #[serde(default)]
    pub xp_reward: Option<u32>,
    #[serde(default)]
    pub abilities: Vec<EnemyAbility>,
    #[serde(default)]
    pub ai_logic: AiLogic,
}

impl EnemyTemplate {
    /// Build a fresh enemy combatant
    pub fn instantiate(&self) -> Combatant {
        let stats = &self.base_stats;
        let mut c = Combatant::new(&self.name, Faction::Enemy, stats.hp, 0);
        c.template_id = self.id.clone();
        c.defense = stats.defense;
        c.initiative = stats.init;
        c.basic_attack = stats.basic_attack;
        c.sanity_damage = stats.sanity_damage;
        c.level = self.threat_level;
        c
    }

    pub fn ability(&self, id: &str) -> Option<&EnemyAbility> {
        self.abilities.iter().find(|a| a.id == id)
    }

    /// Abilities in the order the AI should consider them
    pub fn ability_order(&self) -> Vec<&EnemyAbility> {
        if self.ai_logic.preferred_ability_order.is_empty() {
            self.abilities.iter().collect()
        } else {
            self.ai_logic
                .preferred_ability_order
                .iter()
                .filter_map(|id| self.ability(id))
                .collect()
        }
    }

    /// First summon ability, if any
    pub fn summon_ability(&self) -> Option<&EnemyAbility> {
        self.abilities.iter().find(|a| a.is_summon())
    }
}

/// Summon base stats with the defaults used when a template omits them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummonStats {
    pub hp: i32,
    pub sanity: i32,
    pub basic_attack: DiceSpec,
    pub support_power: i32,
    pub defense: i32,
    pub init: i32,
}

impl Default for SummonStats {
    fn default() -> Self {
        Self {
            hp: 10,
            sanity: 5,
            basic_attack: DiceSpec::new(1, 4),
            support_power: 5,
            defense: 0,
            init: 5,
        }
    }
}

fn default_summon_duration() -> u32 {
    3
}

/// Catalog entry for a player-side summon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummonTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub base_stats: SummonStats,
    /// Own turns before the summon fades
    #[serde(default = "default_summon_duration")]
    pub duration: u32,
    #[serde(default)]
    pub ai_behavior: SummonBehavior,
}

impl SummonTemplate {
    /// Build a fresh summon combatant
    pub fn instantiate(&self) -> Combatant {
        let stats = &self.base_stats;
        let mut c = Combatant::new(&self.name, Faction::Summon, stats.hp, stats.sanity);
        c.template_id = self.id.clone();
        c.defense = stats.defense;
        c.initiative = stats.init;
        c.basic_attack = stats.basic_attack;
        c.summon = Some(SummonState {
            behavior: self.ai_behavior,
            remaining_duration: self.duration.max(1),
            support_power: stats.support_power,
        });
        c
    }
}
