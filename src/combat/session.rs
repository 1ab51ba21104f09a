//! Combat session
//!
//! `CombatSession` owns everything an encounter mutates: the roster, the
//! turn queue, the RNG and the log. Callers drive it one step at a time:
//!
//! - `advance()` ticks the next actor's statuses, then resolves a controlled
//!   turn, reports a skipped turn, or stops and waits for party input
//! - `submit()` carries out a player or companion decision
//! - `flee()` ends the encounter immediately, whoever holds the turn
//!
//! End conditions are checked after every action and status tick. Once the
//! state is terminal no further turns are scheduled and `result()` yields
//! the `CombatResult` for the exploration layer.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{Catalog, EnemyAbilityKind};
use crate::handoff::{
    CombatHandoff, CombatResult, DefeatedEnemy, Inventory, LootDrop, LootTable, MemberOutcome,
    PartySlot,
};
use crate::party;

use super::abilities::{self, reason, AbilityError, EffectResult, EffectType};
use super::ai::{self, Action, DecisionContext};
use super::combatant::{Combatant, CombatantId, Faction, Resource, Roster};
use super::damage::{apply_damage, DamageOutcome, DamageType};
use super::dice;
use super::effects::{self, FALLBACK_DURATION};
use super::log::{CombatLog, EventKind, SkipReason};
use super::rules::RulesConfig;
use super::scheduler::{Advance, TurnQueue};
use super::state::{self, EncounterState, FleeLoss};

/// Damage of the party's elemental strike
const ELEMENT_DAMAGE: &str = "1d12+7";

/// Sanity damage of an enemy sanity attack with no dice and no flat value
const FALLBACK_SANITY_ATTACK: i32 = 5;

/// Why a summon or spawn did not happen
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummonError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error("summon limit of {limit} reached")]
    LimitReached { limit: usize },
}

/// Rejected calls into the session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("unknown combatant: {0}")]
    UnknownCombatant(CombatantId),
    #[error("no party member is waiting for input")]
    NotAwaitingInput,
    #[error("it is not {0}'s turn")]
    NotActorsTurn(CombatantId),
    #[error("the encounter is over")]
    EncounterOver,
    #[error("invalid target: {0}")]
    InvalidTarget(CombatantId),
    #[error(transparent)]
    Ability(#[from] AbilityError),
    #[error(transparent)]
    Spawn(#[from] SummonError),
}

/// A decision for a player or companion turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerAction {
    /// Level-scaled basic attack
    Attack { target: CombatantId },
    /// Brace and steady the mind
    Defend,
    /// Arcane strike that costs sanity
    Element { target: CombatantId },
    Ability {
        ability_id: String,
        #[serde(default)]
        target: Option<CombatantId>,
    },
    Flee,
}

/// What one turn did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReport {
    pub actor: CombatantId,
    /// "attack", "defend", "element", "heal", "wait", "flee" or an ability id
    pub action: String,
    pub results: Vec<EffectResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TurnReport {
    fn new(actor: CombatantId, action: &str, results: Vec<EffectResult>) -> Self {
        Self {
            actor,
            action: action.to_string(),
            results,
            note: None,
        }
    }

    fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Outcome of one `advance()` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    RoundStarted { round: u32 },
    Acted { actor: CombatantId, report: TurnReport },
    Skipped { actor: CombatantId, reason: SkipReason },
    /// A party member holds the turn; call `submit()`
    AwaitingInput { actor: CombatantId },
    Ended { outcome: EncounterState },
}

/// One encounter
pub struct CombatSession {
    id: Uuid,
    encounter_id: String,
    depth: u32,
    catalog: Arc<Catalog>,
    rules: RulesConfig,
    roster: Roster,
    queue: TurnQueue,
    rng: StdRng,
    state: EncounterState,
    awaiting: Option<CombatantId>,
    inventory: Option<Inventory>,
    log: CombatLog,
    defeated: Vec<DefeatedEnemy>,
    xp_awarded: u32,
    flee_summary: Option<Vec<FleeLoss>>,
    loot_table: LootTable,
    loot: Vec<LootDrop>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl CombatSession {
    /// Empty session; add combatants, then call `advance()`.
    ///
    /// A seed makes every roll reproducible.
    pub fn new(catalog: Arc<Catalog>, rules: RulesConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            id: Uuid::new_v4(),
            encounter_id: String::new(),
            depth: 1,
            catalog,
            queue: TurnQueue::new(rules.initiative_jitter),
            rules,
            roster: Roster::new(),
            rng,
            state: EncounterState::Active,
            awaiting: None,
            inventory: None,
            log: CombatLog::new(),
            defeated: Vec::new(),
            xp_awarded: 0,
            flee_summary: None,
            loot_table: LootTable::default(),
            loot: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn with_encounter(mut self, encounter_id: &str, depth: u32) -> Self {
        self.encounter_id = encounter_id.to_string();
        self.depth = depth.max(1);
        self
    }

    pub fn with_inventory(mut self, inventory: Inventory) -> Self {
        self.inventory = Some(inventory);
        self
    }

    pub fn with_loot_table(mut self, loot_table: LootTable) -> Self {
        self.loot_table = loot_table;
        self
    }

    /// Build a session from the exploration layer's handoff
    pub fn from_handoff(
        handoff: &CombatHandoff,
        catalog: Arc<Catalog>,
        rules: RulesConfig,
        seed: Option<u64>,
    ) -> Result<Self, CombatError> {
        let mut session = Self::new(catalog, rules, seed)
            .with_encounter(&handoff.encounter_id, handoff.depth);
        session.inventory = handoff.inventory.clone();

        // Player first so ties in initiative favor the player
        let mut members: Vec<_> = handoff.party.iter().collect();
        members.sort_by_key(|m| m.slot != PartySlot::Player);
        for member in members {
            let c = party::hydrate(member, &session.rules);
            session.add_combatant(c);
        }
        for enemy_id in handoff.enemies_in_order() {
            session.spawn_enemy(enemy_id, None)?;
        }

        info!(
            "Encounter {} ({}) ready: {} combatants at depth {}",
            session.encounter_id,
            session.id,
            session.roster.len(),
            session.depth
        );
        Ok(session)
    }

    /// Add a combatant; joins the turn order immediately if the fight is running
    pub fn add_combatant(&mut self, combatant: Combatant) -> CombatantId {
        debug!("{} joins as {}", combatant.name, combatant.faction);
        let id = self.roster.insert(combatant);
        self.on_roster_change();
        id
    }

    /// Spawn an enemy from its template, optionally as a summoner's minion
    pub fn spawn_enemy(
        &mut self,
        template_id: &str,
        minion_of: Option<CombatantId>,
    ) -> Result<CombatantId, SummonError> {
        let catalog = Arc::clone(&self.catalog);
        let template = catalog
            .enemy(template_id)
            .ok_or_else(|| SummonError::UnknownTemplate(template_id.to_string()))?;

        let mut enemy = template.instantiate();
        enemy.minion_of = minion_of;
        let id = self.roster.insert(enemy);
        if minion_of.is_some() {
            info!("{} joins the fight", template.name);
            self.push_event(EventKind::Summoned {
                summoner: minion_of,
                summoned: id,
                template_id: template_id.to_string(),
            });
        }
        self.on_roster_change();
        Ok(id)
    }

    /// Call a player-side summon from the summon catalog
    pub fn spawn_summon(
        &mut self,
        template_id: &str,
        summoner: Option<CombatantId>,
    ) -> Result<CombatantId, SummonError> {
        let catalog = Arc::clone(&self.catalog);
        let template = catalog
            .summon(template_id)
            .ok_or_else(|| SummonError::UnknownTemplate(template_id.to_string()))?;

        let limit = self.rules.max_player_summons;
        if self.roster.living_in(Faction::Summon).count() >= limit {
            return Err(SummonError::LimitReached { limit });
        }

        let id = self.roster.insert(template.instantiate());
        info!("{} is summoned", template.name);
        self.push_event(EventKind::Summoned {
            summoner,
            summoned: id,
            template_id: template_id.to_string(),
        });
        self.on_roster_change();
        Ok(id)
    }

    /// Roll the first round. `advance()` does this on its own when needed.
    pub fn start(&mut self) -> Step {
        if self.state.is_terminal() {
            return Step::Ended { outcome: self.state };
        }
        if self.queue.round() > 0 {
            return Step::RoundStarted { round: self.queue.round() };
        }
        self.check_end();
        if self.state.is_terminal() {
            return Step::Ended { outcome: self.state };
        }
        self.begin_round()
    }

    /// Run the scheduler forward by one step
    pub fn advance(&mut self) -> Step {
        if self.state.is_terminal() {
            return Step::Ended { outcome: self.state };
        }
        if let Some(actor) = self.awaiting {
            return Step::AwaitingInput { actor };
        }
        if self.queue.round() == 0 {
            return self.start();
        }

        let mut retries = 0;
        loop {
            let roster = &self.roster;
            match self.queue.advance(|id| roster.is_live(id)) {
                Advance::Actor(id) => return self.take_turn(id),
                Advance::RoundComplete | Advance::Idle => return self.begin_round(),
                Advance::Stale(id) => {
                    retries += 1;
                    warn!("Turn queue reached removed combatant {}; rebuilding", id);
                    if retries > self.rules.max_queue_retries {
                        return self.begin_round();
                    }
                    self.rebuild_queue();
                }
            }
        }
    }

    /// Carry out a decision for the party member holding the turn.
    ///
    /// `Flee` is honored for any party member, whoever holds the turn.
    pub fn submit(
        &mut self,
        actor: CombatantId,
        action: PlayerAction,
    ) -> Result<TurnReport, CombatError> {
        if self.state.is_terminal() {
            return Err(CombatError::EncounterOver);
        }
        let Some(faction) = self.roster.get(actor).map(|c| c.faction) else {
            return Err(CombatError::UnknownCombatant(actor));
        };
        if action == PlayerAction::Flee {
            if !faction.is_party_member() {
                return Err(CombatError::NotActorsTurn(actor));
            }
            return Ok(self.flee(actor));
        }
        match self.awaiting {
            None => return Err(CombatError::NotAwaitingInput),
            Some(current) if current != actor => return Err(CombatError::NotActorsTurn(actor)),
            Some(_) => {}
        }

        let report = match action {
            PlayerAction::Attack { target } => {
                self.require_live(target)?;
                TurnReport::new(actor, "attack", self.basic_attack(actor, target))
            }
            PlayerAction::Defend => {
                let amount = self.rules.defend_sanity_restore;
                let restored = self
                    .roster
                    .get_mut(actor)
                    .map_or(0, |c| c.restore(Resource::Sanity, amount));
                self.push_event(EventKind::Defended {
                    actor,
                    sanity_restored: restored,
                });
                TurnReport::new(actor, "defend", Vec::new())
            }
            PlayerAction::Element { target } => {
                self.require_live(target)?;
                TurnReport::new(actor, "element", self.element_strike(actor, target))
            }
            PlayerAction::Ability { ability_id, target } => {
                if let Some(target) = target {
                    self.require_live(target)?;
                }
                let targets: Vec<CombatantId> = target.into_iter().collect();
                match abilities::resolve(self, &ability_id, actor, &targets) {
                    Ok(results) => {
                        self.push_event(EventKind::AbilityUsed {
                            caster: actor,
                            ability_id: ability_id.clone(),
                            results: results.clone(),
                        });
                        TurnReport::new(actor, &ability_id, results)
                    }
                    Err(e @ AbilityError::UnknownAbility(_)) => {
                        // Unknown ids still cost the turn
                        warn!("{} tried {}: {}", actor, ability_id, e);
                        self.push_event(EventKind::AbilityFailed {
                            caster: actor,
                            ability_id: ability_id.clone(),
                            reason: e.to_string(),
                        });
                        TurnReport::new(actor, &ability_id, Vec::new()).with_note(e.to_string())
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            PlayerAction::Flee => return Ok(self.flee(actor)),
        };

        self.awaiting = None;
        self.settle_casualties();
        self.end_own_turn(actor);
        Ok(report)
    }

    /// Pay the flee penalty and end the encounter
    fn flee(&mut self, actor: CombatantId) -> TurnReport {
        if self.state.is_terminal() {
            return TurnReport::new(actor, "flee", Vec::new()).with_note("encounter already over");
        }
        let losses = state::apply_flee_penalty(&mut self.roster, &self.rules);
        info!("{} leads the party in retreat", actor);
        self.flee_summary = Some(losses);
        self.finish(EncounterState::Fled);
        TurnReport::new(actor, "flee", Vec::new())
    }

    /// Apply damage from a source, honoring barriers.
    ///
    /// Does not settle deaths; the turn does that once its action is done.
    pub fn deal_damage(
        &mut self,
        source: Option<CombatantId>,
        target: CombatantId,
        raw: i32,
        damage_type: DamageType,
    ) -> DamageOutcome {
        let Some(victim) = self.roster.get_mut(target) else {
            return DamageOutcome::none(raw, damage_type);
        };
        if victim.flags.has_barrier() {
            debug!("{}'s barrier absorbs {} {} damage", victim.name, raw, damage_type);
            return DamageOutcome::blocked(raw, damage_type);
        }
        let outcome = apply_damage(victim, raw, damage_type);
        if let Some(source) = source.filter(|s| *s != target) {
            victim.last_attacker = Some(source);
        }
        outcome
    }

    /// Build the terminal snapshot; `None` while the fight goes on
    pub fn result(&self) -> Option<CombatResult> {
        if !self.state.is_terminal() {
            return None;
        }
        let members = self
            .roster
            .iter()
            .filter_map(|c| {
                let slot = match c.faction {
                    Faction::Player => PartySlot::Player,
                    Faction::Companion => PartySlot::Companion,
                    _ => return None,
                };
                Some(MemberOutcome {
                    slot,
                    name: c.name.clone(),
                    alive: c.is_alive(),
                    hp: c.hp,
                    max_hp: c.max_hp,
                    sanity: c.sanity,
                    max_sanity: c.max_sanity,
                    level: c.level,
                    xp: c.xp,
                    xp_to_next_level: c.xp_to_next_level,
                    status_effects: c.statuses.iter().cloned().collect(),
                })
            })
            .collect();

        Some(CombatResult {
            session_id: self.id,
            encounter_id: self.encounter_id.clone(),
            outcome: self.state,
            rounds: self.queue.round(),
            started_at: self.started_at,
            ended_at: self.ended_at.unwrap_or_else(Utc::now),
            members,
            xp_awarded: self.xp_awarded,
            enemies_defeated: self.defeated.clone(),
            loot_drops: self.loot.clone(),
            flee_summary: self.flee_summary.clone(),
            inventory: self.inventory.clone(),
            log: self.log.events().to_vec(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn encounter_id(&self) -> &str {
        &self.encounter_id
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn state(&self) -> EncounterState {
        self.state
    }

    /// Party member whose decision is pending
    pub fn awaiting(&self) -> Option<CombatantId> {
        self.awaiting
    }

    pub fn round(&self) -> u32 {
        self.queue.round()
    }

    pub fn queue(&self) -> &TurnQueue {
        &self.queue
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Shared handle, for holding catalog data across `&mut self` calls
    pub fn catalog_handle(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn log(&self) -> &CombatLog {
        &self.log
    }

    pub fn inventory(&self) -> Option<&Inventory> {
        self.inventory.as_ref()
    }

    pub fn inventory_mut(&mut self) -> Option<&mut Inventory> {
        self.inventory.as_mut()
    }

    pub fn xp_awarded(&self) -> u32 {
        self.xp_awarded
    }

    pub fn defeated(&self) -> &[DefeatedEnemy] {
        &self.defeated
    }

    fn push_event(&mut self, kind: EventKind) {
        self.log.push(self.queue.round(), kind);
    }

    fn require_live(&self, target: CombatantId) -> Result<(), CombatError> {
        match self.roster.get(target) {
            None => Err(CombatError::UnknownCombatant(target)),
            Some(c) if !c.is_alive() => Err(CombatError::InvalidTarget(target)),
            Some(_) => Ok(()),
        }
    }

    fn begin_round(&mut self) -> Step {
        self.queue.start_round(self.roster.living(), &mut self.rng);
        let round = self.queue.round();
        info!("Round {} begins", round);
        self.push_event(EventKind::RoundStarted {
            order: self.queue.order(),
        });
        Step::RoundStarted { round }
    }

    fn rebuild_queue(&mut self) {
        self.queue.rebuild(self.roster.living(), &mut self.rng);
        self.push_event(EventKind::QueueRebuilt {
            order: self.queue.order(),
        });
    }

    /// Deaths, summons and despawns mid-fight reshuffle the queue
    fn on_roster_change(&mut self) {
        if self.queue.round() > 0 && !self.state.is_terminal() {
            self.rebuild_queue();
        }
    }

    /// Status tick, then the actor's turn
    fn take_turn(&mut self, actor: CombatantId) -> Step {
        self.push_event(EventKind::TurnStarted { actor });
        let catalog = Arc::clone(&self.catalog);

        let Some(c) = self.roster.get_mut(actor) else {
            return Step::Skipped {
                actor,
                reason: SkipReason::Idle,
            };
        };
        // Snapshot before the tick so a 1-turn stun still costs a turn
        let incapacitated = if effects::is_stunned(c, catalog.as_ref()) {
            Some(SkipReason::Stunned)
        } else if c.flags.is_immobilized() {
            Some(SkipReason::Immobilized)
        } else {
            None
        };
        let events = effects::tick(c, catalog.as_ref(), &mut self.rng);
        let charmed = effects::is_charmed(c, catalog.as_ref());
        let faction = c.faction;

        if !events.is_empty() {
            self.push_event(EventKind::StatusTick { actor, events });
        }

        if !self.roster.is_live(actor) {
            self.push_event(EventKind::TurnSkipped {
                actor,
                reason: SkipReason::Succumbed,
            });
            self.settle_casualties();
            return Step::Skipped {
                actor,
                reason: SkipReason::Succumbed,
            };
        }

        if let Some(reason) = incapacitated {
            debug!("{} loses the turn: {:?}", actor, reason);
            self.push_event(EventKind::TurnSkipped { actor, reason });
            self.end_own_turn(actor);
            return Step::Skipped { actor, reason };
        }

        if faction.is_party_member() && !charmed {
            self.awaiting = Some(actor);
            return Step::AwaitingInput { actor };
        }

        let action = match self.roster.get(actor) {
            Some(c) => {
                let ctx = DecisionContext {
                    roster: &self.roster,
                    catalog: catalog.as_ref(),
                    rules: &self.rules,
                };
                ai::strategy_for(c, charmed).decide_action(c, &ctx, &mut self.rng)
            }
            None => Action::Wait,
        };
        debug!("{} decides {:?}", actor, action);

        let report = self.perform(actor, action);
        self.settle_casualties();
        self.end_own_turn(actor);
        Step::Acted { actor, report }
    }

    /// Execute a controlled combatant's action
    fn perform(&mut self, actor: CombatantId, action: Action) -> TurnReport {
        match action {
            Action::Attack { target } => {
                TurnReport::new(actor, "attack", self.basic_attack(actor, target))
            }
            Action::Heal { target, amount } => {
                let healed = self
                    .roster
                    .get_mut(target)
                    .filter(|c| c.is_alive())
                    .map_or(0, |c| c.restore(Resource::Hp, amount));
                self.push_event(EventKind::Healed {
                    source: actor,
                    target,
                    amount: healed,
                });
                let result = EffectResult::applied(target, EffectType::Heal, healed);
                TurnReport::new(actor, "heal", vec![result])
            }
            Action::UseEnemyAbility { ability_id } => {
                let results = self.enemy_ability(actor, &ability_id);
                self.push_event(EventKind::AbilityUsed {
                    caster: actor,
                    ability_id: ability_id.clone(),
                    results: results.clone(),
                });
                TurnReport::new(actor, &ability_id, results)
            }
            Action::Wait => {
                self.push_event(EventKind::TurnSkipped {
                    actor,
                    reason: SkipReason::Idle,
                });
                TurnReport::new(actor, "wait", Vec::new())
            }
        }
    }

    /// Random living combatant other than `actor`, or `actor` itself
    fn confused_target(&mut self, actor: CombatantId) -> CombatantId {
        let others: Vec<CombatantId> = self
            .roster
            .living()
            .map(|c| c.id)
            .filter(|id| *id != actor)
            .collect();
        others.choose(&mut self.rng).copied().unwrap_or(actor)
    }

    fn damage_result(target: CombatantId, outcome: &DamageOutcome) -> EffectResult {
        if outcome.blocked {
            EffectResult::failed(target, EffectType::Damage, reason::BLOCKED)
        } else {
            EffectResult::applied(target, EffectType::Damage, outcome.applied)
        }
    }

    /// Basic attack with everything that rides on it: attack buffs, weapon
    /// coating, enemy sanity damage and on-hit statuses
    fn basic_attack(&mut self, attacker: CombatantId, target: CombatantId) -> Vec<EffectResult> {
        let Some(a) = self.roster.get(attacker) else {
            return Vec::new();
        };
        let faction = a.faction;
        let confused = a.flags.is_confused();
        let coating = a.flags.coating.clone();
        let sanity_damage = a.sanity_damage;
        let template_id = a.template_id.clone();
        let bonus = a.attack_bonus();
        let roll = if faction.is_party_member() {
            party::scaled_attack_roll(a, &mut self.rng)
        } else {
            a.basic_attack.roll(&mut self.rng)
        };

        let target = if confused {
            let redirected = self.confused_target(attacker);
            debug!("{} is confused and swings at {}", attacker, redirected);
            redirected
        } else {
            target
        };

        let outcome = self.deal_damage(Some(attacker), target, roll + bonus, DamageType::Physical);
        self.push_event(EventKind::Attack {
            attacker,
            target,
            damage: outcome,
        });
        let mut results = vec![Self::damage_result(target, &outcome)];
        if outcome.blocked {
            return results;
        }

        if let Some(coating) = coating {
            if self.roster.is_live(target) {
                let extra = coating.damage_per_hit.roll(&mut self.rng);
                let outcome = self.deal_damage(Some(attacker), target, extra, coating.damage_type);
                self.push_event(EventKind::Attack {
                    attacker,
                    target,
                    damage: outcome,
                });
                results.push(Self::damage_result(target, &outcome));
            }
        }

        if faction != Faction::Enemy {
            return results;
        }

        let struck_party = self
            .roster
            .get(target)
            .is_some_and(|c| c.faction.is_party_member());
        if struck_party && sanity_damage > 0 {
            let lost = self.roster.get_mut(target).map_or(0, |c| c.lose_sanity(sanity_damage));
            self.push_event(EventKind::SanityLoss {
                source: attacker,
                target,
                amount: lost,
            });
            results.push(EffectResult::applied(target, EffectType::SanityDamage, lost));
        }

        let catalog = Arc::clone(&self.catalog);
        if let Some(on_hit) = catalog.enemy(&template_id).and_then(|t| t.on_hit.as_ref()) {
            if self.roster.is_live(target) && self.rng.random::<f64>() < on_hit.chance {
                results.push(self.inflict(
                    attacker,
                    target,
                    &on_hit.status_id,
                    on_hit.duration,
                    on_hit.damage_per_turn,
                ));
            }
        }
        results
    }

    /// Party elemental strike: arcane damage paid for with sanity
    fn element_strike(&mut self, actor: CombatantId, target: CombatantId) -> Vec<EffectResult> {
        let cost = self.rules.element_sanity_cost;
        if let Some(c) = self.roster.get_mut(actor) {
            c.lose_sanity(cost);
        }
        let raw = dice::roll(ELEMENT_DAMAGE, &mut self.rng);
        let outcome = self.deal_damage(Some(actor), target, raw, DamageType::Arcane);
        self.push_event(EventKind::Attack {
            attacker: actor,
            target,
            damage: outcome,
        });
        vec![Self::damage_result(target, &outcome)]
    }

    /// Apply a catalog status from an enemy attack
    fn inflict(
        &mut self,
        source: CombatantId,
        target: CombatantId,
        status_id: &str,
        duration: Option<u32>,
        magnitude: i32,
    ) -> EffectResult {
        let catalog = Arc::clone(&self.catalog);
        let Some(def) = catalog.status(status_id) else {
            warn!("Enemy attack references unknown status {}", status_id);
            return EffectResult::failed(target, EffectType::Status, reason::UNKNOWN_STATUS);
        };
        let duration = duration.or(def.default_duration).unwrap_or(FALLBACK_DURATION);
        match self.roster.get_mut(target).filter(|c| c.is_alive()) {
            Some(c) => {
                c.statuses.apply(def, duration, magnitude, Some(source));
                debug!("{} suffers {} for {} turns", c.name, def.name, duration);
                EffectResult::applied(target, EffectType::Status, duration as i32)
            }
            None => EffectResult::missed(target, EffectType::Status),
        }
    }

    /// Execute a special ability from the actor's enemy template
    fn enemy_ability(&mut self, actor: CombatantId, ability_id: &str) -> Vec<EffectResult> {
        let catalog = Arc::clone(&self.catalog);
        let Some((ability, fallback_sanity, basic_attack)) = self.roster.get(actor).and_then(|c| {
            catalog
                .enemy(&c.template_id)
                .and_then(|t| t.ability(ability_id))
                .map(|a| (a, c.sanity_damage, c.basic_attack))
        }) else {
            warn!("{} has no ability {}", actor, ability_id);
            return Vec::new();
        };
        info!("{} uses {}", actor, ability.name);

        match &ability.kind {
            EnemyAbilityKind::Summon { summon_ids, summon_count } => {
                let (min, max) = (summon_count.min, summon_count.max.max(summon_count.min));
                let count = self.rng.random_range(min..=max);
                let mut results = Vec::new();
                for _ in 0..count {
                    let Some(template_id) = summon_ids.choose(&mut self.rng).cloned() else {
                        results.push(EffectResult::failed(
                            actor,
                            EffectType::Summon,
                            reason::MISSING_SUMMON_ID,
                        ));
                        break;
                    };
                    match self.spawn_enemy(&template_id, Some(actor)) {
                        Ok(id) => results.push(EffectResult::applied(id, EffectType::Summon, 1)),
                        Err(e) => {
                            warn!("{} failed to summon {}: {}", actor, template_id, e);
                            let failure =
                                EffectResult::failed(actor, EffectType::Summon, e.to_string());
                            results.push(failure);
                        }
                    }
                }
                results
            }
            EnemyAbilityKind::SanityAttack { sanity_damage } => {
                let amount = match sanity_damage {
                    Some(spec) => spec.roll(&mut self.rng),
                    None if fallback_sanity > 0 => fallback_sanity,
                    None => FALLBACK_SANITY_ATTACK,
                };
                let victims: Vec<CombatantId> = self
                    .roster
                    .living()
                    .filter(|c| c.faction.is_party_member())
                    .map(|c| c.id)
                    .collect();
                let mut results = Vec::new();
                for target in victims {
                    let lost = self.roster.get_mut(target).map_or(0, |c| c.lose_sanity(amount));
                    self.push_event(EventKind::SanityLoss {
                        source: actor,
                        target,
                        amount: lost,
                    });
                    results.push(EffectResult::applied(target, EffectType::SanityDamage, lost));
                }
                results
            }
            EnemyAbilityKind::HpAttack { damage, effect } => {
                let Some(target) = ai::choose_strike_target(&self.roster, &mut self.rng) else {
                    return Vec::new();
                };
                let raw = damage.unwrap_or(basic_attack).roll(&mut self.rng);
                let outcome = self.deal_damage(Some(actor), target, raw, DamageType::Physical);
                self.push_event(EventKind::Attack {
                    attacker: actor,
                    target,
                    damage: outcome,
                });
                let mut results = vec![Self::damage_result(target, &outcome)];

                if let Some(rider) = effect.as_ref().filter(|_| !outcome.blocked) {
                    let chance = rider.chance.unwrap_or(1.0);
                    if self.roster.is_live(target) && self.rng.random::<f64>() < chance {
                        let magnitude = rider.damage_per_turn.unwrap_or(0);
                        let status_id = &rider.status_id;
                        let duration = rider.duration;
                        results.push(self.inflict(actor, target, status_id, duration, magnitude));
                    } else {
                        results.push(EffectResult::missed(target, EffectType::Status));
                    }
                }
                results
            }
        }
    }

    /// Mark the fallen, hand out XP, reshuffle the queue and check for an end
    fn settle_casualties(&mut self) {
        let fallen: Vec<CombatantId> = self
            .roster
            .iter()
            .filter(|c| c.alive && c.hp <= 0)
            .map(|c| c.id)
            .collect();

        for id in &fallen {
            let Some(c) = self.roster.get_mut(*id) else {
                continue;
            };
            c.mark_dead();
            info!("{} is defeated", c.name);
            let enemy = (c.faction == Faction::Enemy)
                .then(|| (c.template_id.clone(), c.name.clone()));
            self.push_event(EventKind::Defeated { combatant: *id });

            if let Some((template_id, name)) = enemy {
                let template = self.catalog.enemy(&template_id);
                let xp_reward = template
                    .and_then(|t| t.xp_reward)
                    .unwrap_or(self.rules.default_xp_reward);
                let threat_level = template.map_or(1, |t| t.threat_level);
                self.defeated.push(DefeatedEnemy {
                    combatant: *id,
                    template_id,
                    name,
                    threat_level,
                    xp_reward,
                });
                self.award_party_xp(xp_reward);
            }
        }

        if !fallen.is_empty() {
            self.check_end();
            self.on_roster_change();
        }
    }

    /// XP goes to every living party member
    fn award_party_xp(&mut self, amount: u32) {
        self.xp_awarded = self.xp_awarded.saturating_add(amount);
        let mut level_ups = Vec::new();
        for c in self.roster.iter_mut().filter(|c| match c.faction {
            Faction::Player | Faction::Companion => c.is_alive(),
            _ => false,
        }) {
            for level in party::award_xp(c, amount, &self.rules) {
                level_ups.push((c.id, level));
            }
        }
        for (combatant, level) in level_ups {
            self.push_event(EventKind::LevelUp { combatant, level });
        }
    }

    /// Summons fade after their last own turn
    fn end_own_turn(&mut self, actor: CombatantId) {
        let Some(c) = self.roster.get_mut(actor) else {
            return;
        };
        let Some(summon) = c.summon.as_mut() else {
            return;
        };
        summon.remaining_duration = summon.remaining_duration.saturating_sub(1);
        if summon.remaining_duration > 0 || !c.alive {
            return;
        }

        c.alive = false;
        info!("{} fades away", c.name);
        self.push_event(EventKind::Despawned { combatant: actor });
        self.on_roster_change();
    }

    fn check_end(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let outcome = state::evaluate(&self.roster);
        if outcome.is_terminal() {
            self.finish(outcome);
        }
    }

    fn finish(&mut self, outcome: EncounterState) {
        self.state = outcome;
        self.awaiting = None;
        self.queue.stop();
        self.ended_at = Some(Utc::now());

        if outcome == EncounterState::Victory {
            self.loot = self.loot_table.roll_drops(self.depth, &self.defeated, &mut self.rng);
            if let Some(inventory) = self.inventory.as_mut() {
                for drop in &self.loot {
                    if let Err(e) = inventory.add(&drop.item_id, 1) {
                        warn!("Could not stash {}: {}", drop.item_id, e);
                    }
                }
            }
        }

        info!(
            "Encounter {} ends in {} after {} rounds",
            self.encounter_id,
            outcome,
            self.queue.round()
        );
        self.push_event(EventKind::Ended { outcome });
    }
}
