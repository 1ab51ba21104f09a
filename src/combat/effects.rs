//! Status effects system
//!
//! Manages timed modifiers on combatants:
//! - Damage over time (poison, fire, bleeding)
//! - Heal over time and resource regeneration
//! - Behavioral tags (stun, charm)
//! - Buffs that raise attack or defense
//! - Timed flags (barrier, immobilize, confusion, weapon coating)
//!
//! Statuses tick once at the start of their owner's turn. A status applied
//! for `d` turns is removed after exactly `d` ticks.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use super::combatant::{Combatant, CombatantId, Resource};
use super::damage::{apply_damage, DamageType};
use super::dice::Magnitude;

/// Cap for stackable statuses that do not declare one
pub const DEFAULT_MAX_STACKS: u32 = 99;

/// Duration used when neither the effect nor the status names one
pub const FALLBACK_DURATION: u32 = 2;

/// Behavioral tags carried by status definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTag {
    /// Owner loses its turn
    NoAction,
    /// Presentation hint: owner drops to the back of the queue display
    MoveToBack,
    /// Owner's actions are taken over and turned on its allies
    AiOverride,
    AttackAllies,
    #[serde(other)]
    Other,
}

impl FromStr for StatusTag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "no_action" | "stun" => Ok(StatusTag::NoAction),
            "move_to_back" => Ok(StatusTag::MoveToBack),
            "ai_override" | "charm" => Ok(StatusTag::AiOverride),
            "attack_allies" => Ok(StatusTag::AttackAllies),
            _ => Err(()),
        }
    }
}

/// Which stat a buff raises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffType {
    Attack,
    Defense,
}

/// Catalog definition of a status effect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEffectDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<StatusTag>,
    #[serde(default)]
    pub damage_type: Option<DamageType>,
    /// Damage rolled every tick, overriding the instance magnitude
    #[serde(default)]
    pub tick_damage: Option<Magnitude>,
    #[serde(default)]
    pub tick_heal: Option<Magnitude>,
    /// Resource restored each tick by the instance magnitude
    #[serde(default)]
    pub resource: Option<Resource>,
    #[serde(default)]
    pub buff_type: Option<BuffType>,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default)]
    pub max_stacks: Option<u32>,
    #[serde(default)]
    pub default_duration: Option<u32>,
}

impl StatusEffectDefinition {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            tags: Vec::new(),
            damage_type: None,
            tick_damage: None,
            tick_heal: None,
            resource: None,
            buff_type: None,
            stackable: false,
            max_stacks: None,
            default_duration: None,
        }
    }

    pub fn has_tag(&self, tag: StatusTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Whether the instance magnitude is dealt as damage on each tick.
    /// Only statuses with a damage type do this; buffs and behavioral
    /// statuses carry a magnitude without hurting their owner.
    pub fn ticks_instance_damage(&self) -> bool {
        self.tick_damage.is_none() && self.damage_type.is_some() && self.buff_type.is_none()
    }

    /// Whether the instance magnitude restores a resource on each tick
    pub fn ticks_instance_restore(&self) -> bool {
        self.resource.is_some() && self.damage_type.is_none() && self.buff_type.is_none()
    }

    pub fn stack_cap(&self) -> u32 {
        self.max_stacks.unwrap_or(DEFAULT_MAX_STACKS).max(1)
    }
}

/// Lookup of status definitions by id
pub trait StatusLookup {
    fn status(&self, id: &str) -> Option<&StatusEffectDefinition>;
}

impl StatusLookup for HashMap<String, StatusEffectDefinition> {
    fn status(&self, id: &str) -> Option<&StatusEffectDefinition> {
        self.get(id)
    }
}

/// A status instance on a combatant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStatus {
    pub id: String,
    pub name: String,
    /// Owner ticks remaining
    pub duration: u32,
    /// Magnitude rolled when the status was applied
    pub magnitude: i32,
    pub stacks: u32,
    pub applied_by: Option<CombatantId>,
    pub buff: Option<BuffType>,
}

/// What happened when a status was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Stacked { stacks: u32 },
    Refreshed,
}

/// Active statuses on a single combatant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusEffects {
    active: Vec<ActiveStatus>,
}

impl StatusEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a status, stacking or refreshing an existing instance of the same id
    pub fn apply(
        &mut self,
        def: &StatusEffectDefinition,
        duration: u32,
        magnitude: i32,
        applied_by: Option<CombatantId>,
    ) -> ApplyOutcome {
        let duration = duration.max(1);
        if let Some(existing) = self.active.iter_mut().find(|s| s.id == def.id) {
            existing.duration = existing.duration.max(duration);
            if def.stackable {
                existing.stacks = (existing.stacks + 1).min(def.stack_cap());
                return ApplyOutcome::Stacked { stacks: existing.stacks };
            }
            return ApplyOutcome::Refreshed;
        }

        self.active.push(ActiveStatus {
            id: def.id.clone(),
            name: def.name.clone(),
            duration,
            magnitude,
            stacks: 1,
            applied_by,
            buff: def.buff_type,
        });
        ApplyOutcome::Applied
    }

    /// Remove a status by id
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.active.len();
        self.active.retain(|s| s.id != id);
        before != self.active.len()
    }

    /// Remove everything, returning how many were removed
    pub fn clear(&mut self) -> usize {
        let n = self.active.len();
        self.active.clear();
        n
    }

    pub fn has(&self, id: &str) -> bool {
        self.active.iter().any(|s| s.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&ActiveStatus> {
        self.active.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveStatus> {
        self.active.iter()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.active.iter().map(|s| s.id.clone()).collect()
    }

    /// Whether any active status carries the tag
    pub fn any_tagged<L: StatusLookup + ?Sized>(&self, lookup: &L, tag: StatusTag) -> bool {
        self.active
            .iter()
            .filter_map(|s| lookup.status(&s.id))
            .any(|def| def.has_tag(tag))
    }

    /// Summed bonus from active buffs of one kind
    pub fn buff_bonus(&self, kind: BuffType) -> i32 {
        self.active
            .iter()
            .filter(|s| s.buff == Some(kind))
            .map(|s| s.magnitude.max(0) * s.stacks as i32)
            .sum()
    }

    /// Decrement every duration by one and drop expired instances
    fn decrement(&mut self) -> Vec<ActiveStatus> {
        for status in &mut self.active {
            status.duration = status.duration.saturating_sub(1);
        }
        let (expired, remaining): (Vec<_>, Vec<_>) =
            self.active.drain(..).partition(|s| s.duration == 0);
        self.active = remaining;
        expired
    }
}

/// Poison or fire applied to a weapon; adds damage to basic attacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponCoating {
    pub damage_type: DamageType,
    pub damage_per_hit: Magnitude,
    pub remaining: u32,
}

/// Timed flags consumed by the surrounding combat logic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedFlags {
    /// Incoming attack and ability damage is nullified
    pub barrier: Option<u32>,
    /// Owner loses its turn
    pub immobilized: Option<u32>,
    /// Owner's attacks land on a random combatant
    pub confusion: Option<u32>,
    pub coating: Option<WeaponCoating>,
}

impl TimedFlags {
    pub fn set_barrier(&mut self, turns: u32) {
        self.barrier = Some(self.barrier.unwrap_or(0).max(turns.max(1)));
    }

    pub fn set_immobilized(&mut self, turns: u32) {
        self.immobilized = Some(self.immobilized.unwrap_or(0).max(turns.max(1)));
    }

    pub fn set_confusion(&mut self, turns: u32) {
        self.confusion = Some(self.confusion.unwrap_or(0).max(turns.max(1)));
    }

    pub fn has_barrier(&self) -> bool {
        self.barrier.is_some()
    }

    pub fn is_immobilized(&self) -> bool {
        self.immobilized.is_some()
    }

    pub fn is_confused(&self) -> bool {
        self.confusion.is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Decrement all flags, returning the names of those that ran out
    fn tick(&mut self) -> Vec<&'static str> {
        fn step(slot: &mut Option<u32>) -> bool {
            match slot {
                Some(n) if *n <= 1 => {
                    *slot = None;
                    true
                }
                Some(n) => {
                    *n -= 1;
                    false
                }
                None => false,
            }
        }

        let mut expired = Vec::new();
        if step(&mut self.barrier) {
            expired.push("barrier");
        }
        if step(&mut self.immobilized) {
            expired.push("immobilize");
        }
        if step(&mut self.confusion) {
            expired.push("confusion");
        }
        if let Some(coating) = self.coating.as_mut() {
            coating.remaining = coating.remaining.saturating_sub(1);
            if coating.remaining == 0 {
                self.coating = None;
                expired.push("weapon_coating");
            }
        }
        expired
    }
}

/// One thing that happened during a status tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TickEvent {
    Damage { status_id: String, amount: i32, damage_type: DamageType },
    Restore { status_id: String, resource: Resource, amount: i32 },
    Expired { status_id: String },
    FlagExpired { flag: String },
}

/// Run one start-of-turn tick for a combatant.
///
/// Applies periodic damage and healing, then decrements every duration.
pub fn tick<L, R>(combatant: &mut Combatant, lookup: &L, rng: &mut R) -> Vec<TickEvent>
where
    L: StatusLookup + ?Sized,
    R: Rng + ?Sized,
{
    let mut events = Vec::new();
    let snapshot: Vec<ActiveStatus> = combatant.statuses.iter().cloned().collect();

    for status in &snapshot {
        let Some(def) = lookup.status(&status.id) else {
            continue;
        };
        let stacks = status.stacks.max(1) as i32;

        let per_stack = match &def.tick_damage {
            Some(spec) => Some(spec.roll(rng)),
            None if def.ticks_instance_damage() => Some(status.magnitude),
            None => None,
        };
        if let Some(amount) = per_stack {
            let total = amount * stacks;
            if total > 0 {
                let dtype = def.damage_type.unwrap_or_default();
                let outcome = apply_damage(combatant, total, dtype);
                events.push(TickEvent::Damage {
                    status_id: status.id.clone(),
                    amount: outcome.applied,
                    damage_type: dtype,
                });
            }
        }

        if let Some(spec) = &def.tick_heal {
            let healed = combatant.restore(Resource::Hp, spec.roll(rng));
            events.push(TickEvent::Restore {
                status_id: status.id.clone(),
                resource: Resource::Hp,
                amount: healed,
            });
        }

        if def.ticks_instance_restore() {
            if let Some(resource) = def.resource {
                let restored = combatant.restore(resource, status.magnitude * stacks);
                events.push(TickEvent::Restore {
                    status_id: status.id.clone(),
                    resource,
                    amount: restored,
                });
            }
        }
    }

    for expired in combatant.statuses.decrement() {
        events.push(TickEvent::Expired { status_id: expired.id });
    }
    for flag in combatant.flags.tick() {
        events.push(TickEvent::FlagExpired { flag: flag.to_string() });
    }

    events
}

/// Whether the combatant loses its turn to a status
pub fn is_stunned<L: StatusLookup + ?Sized>(combatant: &Combatant, lookup: &L) -> bool {
    combatant.statuses.any_tagged(lookup, StatusTag::NoAction)
}

/// Whether the combatant's actions are turned against its own side
pub fn is_charmed<L: StatusLookup + ?Sized>(combatant: &Combatant, lookup: &L) -> bool {
    combatant.statuses.any_tagged(lookup, StatusTag::AiOverride)
}

/// Stunned or immobilized
pub fn is_incapacitated<L: StatusLookup + ?Sized>(combatant: &Combatant, lookup: &L) -> bool {
    is_stunned(combatant, lookup) || combatant.flags.is_immobilized()
}
