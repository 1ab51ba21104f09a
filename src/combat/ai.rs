//! Adversary decision logic
//!
//! Every non-player-controlled turn is decided by a `Strategy`:
//! - `AttackWeakest` / `AttackStrongest` / `SupportHeal` for player-side summons
//! - `EnemyAbilityPriority` for catalog enemies (summon gating, preferred
//!   ability order, weighted basic-attack targeting)
//! - `Charmed` for anyone whose actions are turned against their own side
//!
//! Strategies only read the roster; the session carries out the returned
//! `Action`.

use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::catalog::{Catalog, EnemyTemplate};

use super::combatant::{Combatant, CombatantId, Faction, Roster, SummonBehavior};
use super::rules::RulesConfig;

/// What a controlled combatant does with its turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Basic attack
    Attack { target: CombatantId },
    /// Restore HP on an ally
    Heal { target: CombatantId, amount: i32 },
    /// Special ability from the actor's enemy template
    UseEnemyAbility { ability_id: String },
    Wait,
}

/// Read-only view handed to strategies
pub struct DecisionContext<'a> {
    pub roster: &'a Roster,
    pub catalog: &'a Catalog,
    pub rules: &'a RulesConfig,
}

/// One decision policy
pub trait Strategy {
    fn decide_action(
        &self,
        actor: &Combatant,
        ctx: &DecisionContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Action;
}

/// Pick the strategy for a combatant that is not taking party input
pub fn strategy_for(actor: &Combatant, charmed: bool) -> &'static dyn Strategy {
    if charmed {
        return &Charmed;
    }
    match (&actor.summon, actor.faction) {
        (Some(state), _) => match state.behavior {
            SummonBehavior::AttackWeakest => &AttackWeakest,
            SummonBehavior::AttackStrongest => &AttackStrongest,
            SummonBehavior::SupportHeal => &SupportHeal,
        },
        (None, Faction::Enemy) => &EnemyAbilityPriority,
        (None, _) => &AttackWeakest,
    }
}

/// Living opponent with the lowest HP
pub struct AttackWeakest;

impl Strategy for AttackWeakest {
    fn decide_action(
        &self,
        actor: &Combatant,
        ctx: &DecisionContext<'_>,
        _rng: &mut dyn RngCore,
    ) -> Action {
        ctx.roster
            .living_opponents_of(actor.faction)
            .min_by_key(|c| c.hp)
            .map_or(Action::Wait, |c| Action::Attack { target: c.id })
    }
}

/// Living opponent with the highest HP
pub struct AttackStrongest;

impl Strategy for AttackStrongest {
    fn decide_action(
        &self,
        actor: &Combatant,
        ctx: &DecisionContext<'_>,
        _rng: &mut dyn RngCore,
    ) -> Action {
        // max_by_key returns the last maximum; keep the first like a stable sort would
        ctx.roster
            .living_opponents_of(actor.faction)
            .fold(None::<&Combatant>, |best, c| match best {
                Some(b) if b.hp >= c.hp => Some(b),
                _ => Some(c),
            })
            .map_or(Action::Wait, |c| Action::Attack { target: c.id })
    }
}

/// Heal the most hurt ally, preferring anyone below max HP.
///
/// Heal amount is uniform in `[3, support_power + 2]`.
pub struct SupportHeal;

impl Strategy for SupportHeal {
    fn decide_action(
        &self,
        actor: &Combatant,
        ctx: &DecisionContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Action {
        let allies: Vec<&Combatant> = ctx.roster.living_allies_of(actor.faction).collect();
        let injured: Vec<&Combatant> = allies.iter().copied().filter(|c| c.is_injured()).collect();
        let pool = if injured.is_empty() { &allies } else { &injured };

        let target = pool.iter().copied().fold(None::<&Combatant>, |best, c| match best {
            Some(b) if b.hp_ratio() <= c.hp_ratio() => Some(b),
            _ => Some(c),
        });
        let Some(target) = target else {
            return Action::Wait;
        };

        let power = actor.summon.as_ref().map_or(6, |s| s.support_power).max(1);
        Action::Heal {
            target: target.id,
            amount: rng.random_range(3..=power + 2),
        }
    }
}

/// Catalog enemy: special abilities by priority, else a weighted basic attack
pub struct EnemyAbilityPriority;

impl Strategy for EnemyAbilityPriority {
    fn decide_action(
        &self,
        actor: &Combatant,
        ctx: &DecisionContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Action {
        if let Some(template) = ctx.catalog.enemy(&actor.template_id) {
            if let Some(ability_id) = pick_enemy_ability(template, ctx.roster, rng) {
                return Action::UseEnemyAbility { ability_id };
            }
        }
        choose_party_target(ctx.roster, ctx.rules.low_hp_threshold, rng)
            .map_or(Action::Wait, |target| Action::Attack { target })
    }
}

/// Strike a random member of one's own side (other than oneself) or a
/// player-side summon; oneself if nobody else is left.
pub struct Charmed;

impl Strategy for Charmed {
    fn decide_action(
        &self,
        actor: &Combatant,
        ctx: &DecisionContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Action {
        let victims: Vec<CombatantId> = ctx
            .roster
            .living()
            .filter(|c| c.id != actor.id)
            .filter(|c| c.faction == Faction::Summon || c.faction.is_ally_of(actor.faction))
            .map(|c| c.id)
            .collect();
        let target = victims.choose(rng).copied().unwrap_or(actor.id);
        Action::Attack { target }
    }
}

/// Whether any living enemy was built from one of `template_ids`
pub fn has_living_minions(roster: &Roster, template_ids: &[String]) -> bool {
    let ids: HashSet<&str> = template_ids.iter().map(String::as_str).collect();
    roster
        .living_in(Faction::Enemy)
        .any(|c| ids.contains(c.template_id.as_str()))
}

/// Special ability an enemy uses this turn, if any.
///
/// With `summon_if_no_minions` and no living minions the summon ability is
/// attempted first. A failed roll there falls through to the preferred
/// order, which skips that summon. Summons whose minions are already up are
/// never chosen while summon gating is on.
pub fn pick_enemy_ability<R: Rng + ?Sized>(
    template: &EnemyTemplate,
    roster: &Roster,
    rng: &mut R,
) -> Option<String> {
    if template.abilities.is_empty() {
        return None;
    }
    let gating = template.ai_logic.summon_if_no_minions;

    let mut attempted = None;
    if gating {
        if let Some(summon) = template.summon_ability() {
            if !has_living_minions(roster, summon.summon_ids()) {
                if rng.random::<f64>() < summon.chance() {
                    return Some(summon.id.clone());
                }
                attempted = Some(summon.id.as_str());
            }
        }
    }

    for ability in template.ability_order() {
        if attempted == Some(ability.id.as_str()) {
            continue;
        }
        if gating && ability.is_summon() && has_living_minions(roster, ability.summon_ids()) {
            continue;
        }
        if rng.random::<f64>() < ability.chance() {
            return Some(ability.id.clone());
        }
    }
    None
}

/// Choose which party member an enemy basic attack lands on.
///
/// Only the player and companion are considered. "Low" means below
/// `low_hp_threshold` of max HP:
/// - companion missing or down: the player
/// - only the companion low: player 40%
/// - only the player low: player 80%
/// - otherwise: player 60%
pub fn choose_party_target<R: Rng + ?Sized>(
    roster: &Roster,
    low_hp_threshold: f64,
    rng: &mut R,
) -> Option<CombatantId> {
    let player = roster.living_in(Faction::Player).next();
    let companion = roster.living_in(Faction::Companion).next();

    match (player, companion) {
        (None, None) => None,
        (Some(p), None) => Some(p.id),
        (None, Some(c)) => Some(c.id),
        (Some(p), Some(c)) => {
            let low = |x: &Combatant| (x.hp as f64) < x.max_hp as f64 * low_hp_threshold;
            let player_odds = match (low(p), low(c)) {
                (false, true) => 0.4,
                (true, false) => 0.8,
                _ => 0.6,
            };
            Some(if rng.random::<f64>() < player_odds { p.id } else { c.id })
        }
    }
}

/// Target for an enemy HP attack ability: the player 60% of the time while
/// the companion stands
pub fn choose_strike_target<R: Rng + ?Sized>(roster: &Roster, rng: &mut R) -> Option<CombatantId> {
    choose_party_target(roster, 0.0, rng)
}
