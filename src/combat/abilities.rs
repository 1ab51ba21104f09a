//! Ability resolution
//!
//! Abilities are catalog data: a list of base effects plus level rules that
//! scale chance, magnitude and target scope as the caster levels up.
//! `resolve` turns one use of an ability into a list of per-target
//! `EffectResult` records; callers never need to know effect internals.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::Catalog;

use super::combatant::{CombatantId, Faction, Resource, Roster};
use super::damage::DamageType;
use super::dice::Magnitude;
use super::effects::{ApplyOutcome, WeaponCoating, FALLBACK_DURATION};
use super::session::CombatSession;

/// Failure reasons recorded on individual effect results
pub mod reason {
    pub const MISSED: &str = "missed";
    pub const UNKNOWN_STATUS: &str = "unknown_status";
    pub const INVENTORY_UNAVAILABLE: &str = "inventory_unavailable";
    pub const ITEM_ADD_FAILED: &str = "item_add_failed";
    pub const MISSING_SUMMON_ID: &str = "missing_summon_id";
    pub const SUMMON_SYSTEM_UNAVAILABLE: &str = "summon_system_unavailable";
    pub const BLOCKED: &str = "blocked";
    pub const NOTHING_TO_CLEANSE: &str = "nothing_to_cleanse";
    pub const UNKNOWN_META_ACTION: &str = "unknown_meta_action";
}

/// Errors that stop an ability before any effect applies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbilityError {
    #[error("unknown ability: {0}")]
    UnknownAbility(String),
    #[error("ability {ability} cannot be used by {caster}")]
    RestrictedCaster { ability: String, caster: CombatantId },
    #[error("unknown caster: {0}")]
    UnknownCaster(CombatantId),
}

/// Who an effect lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetScope {
    #[serde(rename = "self")]
    SelfOnly,
    Ally,
    AllyTeam,
    #[default]
    Enemy,
    EnemyTeam,
    LastAttacker,
}

impl TargetScope {
    /// Widen a single-target scope when a level rule grants a team override
    pub fn widened_by(self, target_override: Option<TargetScope>) -> TargetScope {
        match (self, target_override) {
            (TargetScope::Enemy, Some(TargetScope::EnemyTeam)) => TargetScope::EnemyTeam,
            (TargetScope::Ally, Some(TargetScope::AllyTeam)) => TargetScope::AllyTeam,
            (scope, _) => scope,
        }
    }
}

/// Broad grouping used by controllers and presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityCategory {
    #[default]
    Offense,
    Support,
    Reaction,
    #[serde(other)]
    Utility,
}

/// Which casters may use an ability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Restriction {
    /// Player, companion or player-side summon
    PlayerSide,
}

/// Encounter-wide actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaAction {
    /// Full HP and sanity for the living party, statuses cleared
    RestParty,
    /// One-turn barrier on the target
    NullifyIncomingDamage,
    #[serde(other)]
    Unknown,
}

/// The effect-specific part of an effect, keyed by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    Damage {
        #[serde(default)]
        damage_type: Option<DamageType>,
    },
    Heal {
        #[serde(default)]
        resource: Resource,
    },
    Status {
        status_id: String,
        #[serde(default)]
        duration_turns: Option<u32>,
    },
    Buff {
        status_id: String,
        #[serde(default)]
        duration_turns: Option<u32>,
    },
    Cleanse {
        #[serde(default)]
        status_id: Option<String>,
    },
    CureAll,
    WeaponCoating {
        #[serde(default)]
        coating_type: Option<DamageType>,
        #[serde(default)]
        duration: Option<u32>,
    },
    Barrier {
        #[serde(default)]
        duration: Option<u32>,
    },
    Immobilize {
        #[serde(default)]
        duration: Option<u32>,
    },
    Confusion {
        #[serde(default)]
        duration: Option<u32>,
    },
    Summon {
        #[serde(default)]
        summon_id: Option<String>,
    },
    GrantItem {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default = "one")]
        quantity: u32,
    },
    Meta {
        meta_action: MetaAction,
    },
}

fn one() -> u32 {
    1
}

impl EffectKind {
    pub fn effect_type(&self) -> EffectType {
        match self {
            EffectKind::Damage { .. } => EffectType::Damage,
            EffectKind::Heal { .. } => EffectType::Heal,
            EffectKind::Status { .. } => EffectType::Status,
            EffectKind::Buff { .. } => EffectType::Buff,
            EffectKind::Cleanse { .. } => EffectType::Cleanse,
            EffectKind::CureAll => EffectType::CureAll,
            EffectKind::WeaponCoating { .. } => EffectType::WeaponCoating,
            EffectKind::Barrier { .. } => EffectType::Barrier,
            EffectKind::Immobilize { .. } => EffectType::Immobilize,
            EffectKind::Confusion { .. } => EffectType::Confusion,
            EffectKind::Summon { .. } => EffectType::Summon,
            EffectKind::GrantItem { .. } => EffectType::GrantItem,
            EffectKind::Meta { .. } => EffectType::Meta,
        }
    }
}

/// A single base effect of an ability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    #[serde(flatten)]
    pub kind: EffectKind,
    #[serde(default)]
    pub target_scope: TargetScope,
    #[serde(default)]
    pub magnitude: Magnitude,
    /// Success chance in [0, 1]; missing means certain
    #[serde(default)]
    pub chance: Option<f64>,
    /// Leave out the caster's level bonus
    #[serde(default)]
    pub skip_level_bonus: bool,
}

impl Effect {
    pub fn new(kind: EffectKind, target_scope: TargetScope, magnitude: Magnitude) -> Self {
        Self {
            kind,
            target_scope,
            magnitude,
            chance: None,
            skip_level_bonus: false,
        }
    }

    pub fn with_chance(mut self, chance: f64) -> Self {
        self.chance = Some(chance);
        self
    }
}

/// Scaling tier unlocked at `min_level`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRule {
    pub min_level: u32,
    #[serde(default)]
    pub target_override: Option<TargetScope>,
    #[serde(default)]
    pub chance_delta: f64,
    #[serde(default)]
    pub magnitude_delta: Option<String>,
}

/// Catalog entry for an ability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: AbilityCategory,
    #[serde(default)]
    pub base_effects: Vec<Effect>,
    #[serde(default)]
    pub level_rules: Vec<LevelRule>,
    #[serde(default)]
    pub restricted_to: Option<Restriction>,
}

impl AbilityDefinition {
    /// Highest rule with `min_level <= level`. Levels below 1 use the level-1 tier.
    pub fn level_rule(&self, level: u32) -> Option<&LevelRule> {
        let level = level.max(1);
        self.level_rules
            .iter()
            .filter(|r| r.min_level <= level)
            .max_by_key(|r| r.min_level)
    }

    /// Whether a caster of this faction may use the ability
    pub fn allows(&self, faction: Faction) -> bool {
        match self.restricted_to {
            Some(Restriction::PlayerSide) => faction.is_party_side(),
            None => true,
        }
    }

    /// Whether any effect restores HP
    pub fn heals(&self) -> bool {
        self.base_effects
            .iter()
            .any(|e| matches!(e.kind, EffectKind::Heal { resource: Resource::Hp }))
    }
}

/// Ambient power growth added to every magnitude: `ceil(level * 1.5)`
pub fn level_bonus(level: u32) -> i32 {
    ((level * 3).div_ceil(2)) as i32
}

/// Kind tag for an effect result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    Damage,
    Heal,
    Status,
    Buff,
    Cleanse,
    CureAll,
    WeaponCoating,
    Barrier,
    Immobilize,
    Confusion,
    Summon,
    GrantItem,
    Meta,
    /// Sanity damage from an enemy
    SanityDamage,
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EffectType::Damage => "damage",
            EffectType::Heal => "heal",
            EffectType::Status => "status",
            EffectType::Buff => "buff",
            EffectType::Cleanse => "cleanse",
            EffectType::CureAll => "cure_all",
            EffectType::WeaponCoating => "weapon_coating",
            EffectType::Barrier => "barrier",
            EffectType::Immobilize => "immobilize",
            EffectType::Confusion => "confusion",
            EffectType::Summon => "summon",
            EffectType::GrantItem => "grant_item",
            EffectType::Meta => "meta",
            EffectType::SanityDamage => "sanity_damage",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one effect against one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectResult {
    pub target: CombatantId,
    #[serde(rename = "type")]
    pub effect: EffectType,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EffectResult {
    pub fn applied(target: CombatantId, effect: EffectType, amount: i32) -> Self {
        Self {
            target,
            effect,
            success: true,
            amount: Some(amount),
            reason: None,
        }
    }

    pub fn failed(target: CombatantId, effect: EffectType, reason: impl Into<String>) -> Self {
        Self {
            target,
            effect,
            success: false,
            amount: None,
            reason: Some(reason.into()),
        }
    }

    pub fn missed(target: CombatantId, effect: EffectType) -> Self {
        Self::failed(target, effect, reason::MISSED)
    }
}

/// Resolve one use of an ability.
///
/// `targets` is the caller's choice for single-target scopes; team scopes
/// and level-rule overrides ignore it. Dead targets are skipped silently.
pub fn resolve(
    session: &mut CombatSession,
    ability_id: &str,
    caster: CombatantId,
    targets: &[CombatantId],
) -> Result<Vec<EffectResult>, AbilityError> {
    let catalog = session.catalog_handle();
    let ability = catalog
        .ability(ability_id)
        .ok_or_else(|| AbilityError::UnknownAbility(ability_id.to_string()))?;

    let (faction, level, last_attacker) = {
        let c = session
            .roster()
            .get(caster)
            .ok_or(AbilityError::UnknownCaster(caster))?;
        (c.faction, c.level, c.last_attacker)
    };

    if !ability.allows(faction) {
        return Err(AbilityError::RestrictedCaster {
            ability: ability.id.clone(),
            caster,
        });
    }

    let rule = ability.level_rule(level);
    let bonus = level_bonus(level);
    let chance_delta = rule.map_or(0.0, |r| r.chance_delta);
    let magnitude_delta = rule.and_then(|r| r.magnitude_delta.as_deref());
    let target_override = rule.and_then(|r| r.target_override);

    debug!(
        "{} uses {} (level {}, rule {:?})",
        caster,
        ability.id,
        level,
        rule.map(|r| r.min_level)
    );

    let mut results = Vec::new();
    for effect in &ability.base_effects {
        let scope = effect.target_scope.widened_by(target_override);
        let resolved =
            resolve_targets(session.roster(), scope, caster, faction, last_attacker, targets);
        let chance = (effect.chance.unwrap_or(1.0) + chance_delta).clamp(0.0, 1.0);
        let spec = effect.magnitude.with_delta(magnitude_delta);

        for target in resolved {
            if !session.roster().is_live(target) {
                continue;
            }
            let effect_type = effect.kind.effect_type();
            if session.rng().random::<f64>() >= chance {
                results.push(EffectResult::missed(target, effect_type));
                continue;
            }
            let rolled = spec.roll(session.rng());
            let magnitude = if effect.skip_level_bonus { rolled } else { rolled + bonus };
            results.push(apply_effect(session, &catalog, effect, &spec, magnitude, caster, target));
        }
    }

    Ok(results)
}

/// Turn a scope into concrete living target ids
fn resolve_targets(
    roster: &Roster,
    scope: TargetScope,
    caster: CombatantId,
    faction: Faction,
    last_attacker: Option<CombatantId>,
    chosen: &[CombatantId],
) -> Vec<CombatantId> {
    let pick = |want_ally: bool| -> Vec<CombatantId> {
        chosen
            .iter()
            .copied()
            .filter(|id| {
                roster
                    .get(*id)
                    .is_some_and(|c| c.is_alive() && c.faction.is_ally_of(faction) == want_ally)
            })
            .collect()
    };

    match scope {
        TargetScope::SelfOnly => vec![caster],
        TargetScope::Ally => {
            let picked = pick(true);
            if picked.is_empty() {
                vec![caster]
            } else {
                picked
            }
        }
        TargetScope::Enemy => {
            let picked = pick(false);
            if picked.is_empty() {
                roster.living_opponents_of(faction).map(|c| c.id).take(1).collect()
            } else {
                picked
            }
        }
        TargetScope::AllyTeam => roster.living_allies_of(faction).map(|c| c.id).collect(),
        TargetScope::EnemyTeam => roster.living_opponents_of(faction).map(|c| c.id).collect(),
        TargetScope::LastAttacker => last_attacker
            .filter(|id| roster.is_live(*id))
            .into_iter()
            .collect(),
    }
}

/// Dispatch one effect against one live target
fn apply_effect(
    session: &mut CombatSession,
    catalog: &Catalog,
    effect: &Effect,
    spec: &Magnitude,
    magnitude: i32,
    caster: CombatantId,
    target: CombatantId,
) -> EffectResult {
    let effect_type = effect.kind.effect_type();

    match &effect.kind {
        EffectKind::Damage { damage_type } => {
            let damage_type = damage_type.unwrap_or_default();
            let outcome = session.deal_damage(Some(caster), target, magnitude, damage_type);
            if outcome.blocked {
                EffectResult::failed(target, effect_type, reason::BLOCKED)
            } else {
                EffectResult::applied(target, effect_type, outcome.applied)
            }
        }
        EffectKind::Heal { resource } => {
            let healed = session
                .roster_mut()
                .get_mut(target)
                .map_or(0, |c| c.restore(*resource, magnitude));
            EffectResult::applied(target, effect_type, healed)
        }
        EffectKind::Status { status_id, duration_turns }
        | EffectKind::Buff { status_id, duration_turns } => {
            let Some(def) = catalog.status(status_id) else {
                warn!("Effect references unknown status {}", status_id);
                return EffectResult::failed(target, effect_type, reason::UNKNOWN_STATUS);
            };
            let duration = duration_turns
                .or(def.default_duration)
                .unwrap_or(FALLBACK_DURATION);
            match session.roster_mut().get_mut(target) {
                Some(c) => match c.statuses.apply(def, duration, magnitude, Some(caster)) {
                    ApplyOutcome::Stacked { stacks } => {
                        EffectResult::applied(target, effect_type, stacks as i32)
                    }
                    ApplyOutcome::Applied | ApplyOutcome::Refreshed => {
                        EffectResult::applied(target, effect_type, magnitude)
                    }
                },
                None => EffectResult::failed(target, effect_type, reason::MISSED),
            }
        }
        EffectKind::Cleanse { status_id } => {
            let removed = session.roster_mut().get_mut(target).map_or(0, |c| match status_id {
                Some(id) => usize::from(c.statuses.remove(id)),
                None => c.statuses.clear(),
            });
            if removed == 0 {
                EffectResult::failed(target, effect_type, reason::NOTHING_TO_CLEANSE)
            } else {
                EffectResult::applied(target, effect_type, removed as i32)
            }
        }
        EffectKind::CureAll => {
            let removed = session.roster_mut().get_mut(target).map_or(0, |c| c.statuses.clear());
            EffectResult::applied(target, effect_type, removed as i32)
        }
        EffectKind::WeaponCoating { coating_type, duration } => {
            let damage_per_hit = if effect.magnitude == Magnitude::default() {
                Magnitude::from("1d6")
            } else {
                spec.clone()
            };
            let turns = duration.unwrap_or(3);
            if let Some(c) = session.roster_mut().get_mut(target) {
                c.flags.coating = Some(WeaponCoating {
                    damage_type: coating_type.unwrap_or(DamageType::Poison),
                    damage_per_hit,
                    remaining: turns,
                });
            }
            EffectResult::applied(target, effect_type, turns as i32)
        }
        EffectKind::Barrier { duration } => {
            let turns = duration.unwrap_or(2);
            set_flag(session, target, effect_type, turns, |f, n| f.set_barrier(n))
        }
        EffectKind::Immobilize { duration } => {
            let turns = duration.unwrap_or(2);
            set_flag(session, target, effect_type, turns, |f, n| f.set_immobilized(n))
        }
        EffectKind::Confusion { duration } => {
            let turns = duration.unwrap_or(2);
            set_flag(session, target, effect_type, turns, |f, n| f.set_confusion(n))
        }
        EffectKind::Summon { summon_id } => {
            let Some(summon_id) = summon_id else {
                return EffectResult::failed(target, effect_type, reason::MISSING_SUMMON_ID);
            };
            let on_party_side = session
                .roster()
                .get(caster)
                .is_some_and(|c| c.faction.is_party_side());
            if !on_party_side {
                return EffectResult::failed(target, effect_type, reason::SUMMON_SYSTEM_UNAVAILABLE);
            }
            match session.spawn_summon(summon_id, Some(caster)) {
                Ok(id) => EffectResult::applied(id, effect_type, 1),
                Err(e) => EffectResult::failed(target, effect_type, e.to_string()),
            }
        }
        EffectKind::GrantItem { item_id, quantity } => {
            let Some(inventory) = session.inventory_mut() else {
                return EffectResult::failed(target, effect_type, reason::INVENTORY_UNAVAILABLE);
            };
            match item_id.as_deref().map(|id| inventory.add(id, *quantity)) {
                Some(Ok(total)) => EffectResult::applied(target, effect_type, total as i32),
                _ => EffectResult::failed(target, effect_type, reason::ITEM_ADD_FAILED),
            }
        }
        EffectKind::Meta { meta_action } => match meta_action {
            MetaAction::RestParty => {
                let mut restored = 0;
                let party = session
                    .roster_mut()
                    .iter_mut()
                    .filter(|c| c.is_alive() && c.faction.is_party_member());
                for c in party {
                    restored += c.restore(Resource::Hp, c.max_hp);
                    restored += c.restore(Resource::Sanity, c.max_sanity);
                    c.statuses.clear();
                }
                EffectResult::applied(target, effect_type, restored)
            }
            MetaAction::NullifyIncomingDamage => {
                set_flag(session, target, effect_type, 1, |f, n| f.set_barrier(n))
            }
            MetaAction::Unknown => {
                EffectResult::failed(target, effect_type, reason::UNKNOWN_META_ACTION)
            }
        },
    }
}

fn set_flag(
    session: &mut CombatSession,
    target: CombatantId,
    effect_type: EffectType,
    turns: u32,
    set: impl FnOnce(&mut super::effects::TimedFlags, u32),
) -> EffectResult {
    match session.roster_mut().get_mut(target) {
        Some(c) => {
            set(&mut c.flags, turns);
            EffectResult::applied(target, effect_type, turns as i32)
        }
        None => EffectResult::failed(target, effect_type, reason::MISSED),
    }
}
