//! Combatants and the roster arena
//!
//! Every participant lives in a single `Roster` for the whole encounter and
//! is addressed by a stable `CombatantId`. Death and despawn clear the
//! `alive` flag; records are never removed, so ids never dangle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::dice::DiceSpec;
use super::effects::{BuffType, StatusEffects, TimedFlags};

/// Stable index into the roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombatantId(pub u32);

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which side a combatant fights for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    Player,
    Companion,
    Summon,
    Enemy,
}

impl Faction {
    /// Player, companion and player-side summons
    pub fn is_party_side(&self) -> bool {
        !matches!(self, Faction::Enemy)
    }

    /// Player and companion take actions from the party controller
    pub fn is_party_member(&self) -> bool {
        matches!(self, Faction::Player | Faction::Companion)
    }

    pub fn is_ally_of(&self, other: Faction) -> bool {
        self.is_party_side() == other.is_party_side()
    }
}

impl FromStr for Faction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "player" | "hero" => Ok(Faction::Player),
            "companion" | "ally" => Ok(Faction::Companion),
            "summon" | "summoned" => Ok(Faction::Summon),
            "enemy" | "monster" => Ok(Faction::Enemy),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Faction::Player => "player",
            Faction::Companion => "companion",
            Faction::Summon => "summon",
            Faction::Enemy => "enemy",
        };
        write!(f, "{}", s)
    }
}

/// A depletable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    #[default]
    Hp,
    Sanity,
}

/// Fixed target-selection policy for player-side summons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummonBehavior {
    #[default]
    AttackWeakest,
    AttackStrongest,
    SupportHeal,
}

/// Extra state carried by a summoned ally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummonState {
    pub behavior: SummonBehavior,
    /// Own turns left before the summon fades
    pub remaining_duration: u32,
    pub support_power: i32,
}

/// One participant in the encounter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    /// Catalog id of the template this combatant was built from
    pub template_id: String,
    pub faction: Faction,
    pub hp: i32,
    pub max_hp: i32,
    pub sanity: i32,
    pub max_sanity: i32,
    pub defense: i32,
    /// Base initiative before per-round jitter
    pub initiative: i32,
    pub level: u32,
    pub xp: u32,
    pub xp_to_next_level: u32,
    /// Unscaled maxima used to recompute stats on level-up
    pub base_hp: i32,
    pub base_sanity: i32,
    pub basic_attack: DiceSpec,
    /// Flat sanity damage dealt by this combatant's basic attacks
    pub sanity_damage: i32,
    pub abilities: Vec<String>,
    pub statuses: StatusEffects,
    pub flags: TimedFlags,
    pub alive: bool,
    pub last_attacker: Option<CombatantId>,
    pub summon: Option<SummonState>,
    /// Summoner that spawned this enemy minion
    pub minion_of: Option<CombatantId>,
}

impl Combatant {
    /// Create a combatant at full health with neutral stats
    pub fn new(name: &str, faction: Faction, max_hp: i32, max_sanity: i32) -> Self {
        let max_hp = max_hp.max(1);
        let max_sanity = max_sanity.max(0);
        Self {
            id: CombatantId(0),
            name: name.to_string(),
            template_id: String::new(),
            faction,
            hp: max_hp,
            max_hp,
            sanity: max_sanity,
            max_sanity,
            defense: 0,
            initiative: 0,
            level: 0,
            xp: 0,
            xp_to_next_level: 0,
            base_hp: max_hp,
            base_sanity: max_sanity,
            basic_attack: DiceSpec::default(),
            sanity_damage: 0,
            abilities: Vec::new(),
            statuses: StatusEffects::new(),
            flags: TimedFlags::default(),
            alive: true,
            last_attacker: None,
            summon: None,
            minion_of: None,
        }
    }

    /// Alive flag set and HP above zero
    pub fn is_alive(&self) -> bool {
        self.alive && self.hp > 0
    }

    pub fn is_injured(&self) -> bool {
        self.hp < self.max_hp
    }

    /// Current HP as a fraction of max
    pub fn hp_ratio(&self) -> f64 {
        if self.max_hp <= 0 {
            0.0
        } else {
            self.hp as f64 / self.max_hp as f64
        }
    }

    /// Defense including active defense buffs
    pub fn effective_defense(&self) -> i32 {
        self.defense + self.statuses.buff_bonus(BuffType::Defense)
    }

    /// Bonus damage from active attack buffs
    pub fn attack_bonus(&self) -> i32 {
        self.statuses.buff_bonus(BuffType::Attack)
    }

    /// Restore a resource, clamped to its max. Returns the amount gained.
    pub fn restore(&mut self, resource: Resource, amount: i32) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let (current, max) = match resource {
            Resource::Hp => (&mut self.hp, self.max_hp),
            Resource::Sanity => (&mut self.sanity, self.max_sanity),
        };
        let gained = amount.min((max - *current).max(0));
        *current += gained;
        gained
    }

    /// Lose sanity, floored at 0. Returns the amount lost.
    pub fn lose_sanity(&mut self, amount: i32) -> i32 {
        let lost = amount.max(0).min(self.sanity);
        self.sanity -= lost;
        lost
    }

    /// Mark as out of the fight
    pub fn mark_dead(&mut self) {
        self.alive = false;
        self.hp = 0;
    }

    /// Current resource value
    pub fn resource(&self, resource: Resource) -> i32 {
        match resource {
            Resource::Hp => self.hp,
            Resource::Sanity => self.sanity,
        }
    }
}

/// Arena of all combatants in an encounter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    combatants: Vec<Combatant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a combatant, assigning its id
    pub fn insert(&mut self, mut combatant: Combatant) -> CombatantId {
        let id = CombatantId(self.combatants.len() as u32);
        combatant.id = id;
        self.combatants.push(combatant);
        id
    }

    pub fn get(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.combatants.get_mut(id.0 as usize)
    }

    pub fn is_live(&self, id: CombatantId) -> bool {
        self.get(id).is_some_and(|c| c.is_alive())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Combatant> {
        self.combatants.iter_mut()
    }

    pub fn living(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.iter().filter(|c| c.is_alive())
    }

    /// Living combatants of one faction
    pub fn living_in(&self, faction: Faction) -> impl Iterator<Item = &Combatant> {
        self.living().filter(move |c| c.faction == faction)
    }

    /// Living combatants on the same side as `faction`
    pub fn living_allies_of(&self, faction: Faction) -> impl Iterator<Item = &Combatant> {
        self.living().filter(move |c| c.faction.is_ally_of(faction))
    }

    /// Living combatants on the opposing side of `faction`
    pub fn living_opponents_of(&self, faction: Faction) -> impl Iterator<Item = &Combatant> {
        self.living().filter(move |c| !c.faction.is_ally_of(faction))
    }

    /// The player character, alive or not
    pub fn player(&self) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.faction == Faction::Player)
    }

    pub fn enemies_remaining(&self) -> usize {
        self.living_in(Faction::Enemy).count()
    }

    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }
}
