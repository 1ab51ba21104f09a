//! Structured combat log
//!
//! The session appends one event per notable step. Presentation layers
//! turn these into prose; the engine never does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::abilities::EffectResult;
use super::combatant::CombatantId;
use super::damage::DamageOutcome;
use super::effects::TickEvent;
use super::state::EncounterState;

/// Why a combatant's turn passed without an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Stunned,
    Immobilized,
    /// Died to a status tick at the start of its turn
    Succumbed,
    /// Nothing worth doing (no valid targets)
    Idle,
}

/// What happened
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    RoundStarted { order: Vec<CombatantId> },
    QueueRebuilt { order: Vec<CombatantId> },
    TurnStarted { actor: CombatantId },
    StatusTick { actor: CombatantId, events: Vec<TickEvent> },
    TurnSkipped { actor: CombatantId, reason: SkipReason },
    Attack { attacker: CombatantId, target: CombatantId, damage: DamageOutcome },
    SanityLoss { source: CombatantId, target: CombatantId, amount: i32 },
    Healed { source: CombatantId, target: CombatantId, amount: i32 },
    Defended { actor: CombatantId, sanity_restored: i32 },
    AbilityUsed { caster: CombatantId, ability_id: String, results: Vec<EffectResult> },
    AbilityFailed { caster: CombatantId, ability_id: String, reason: String },
    Summoned { summoner: Option<CombatantId>, summoned: CombatantId, template_id: String },
    Despawned { combatant: CombatantId },
    Defeated { combatant: CombatantId },
    LevelUp { combatant: CombatantId, level: u32 },
    Ended { outcome: EncounterState },
}

/// One log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatEvent {
    pub round: u32,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Append-only event log for one encounter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatLog {
    events: Vec<CombatEvent>,
}

impl CombatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, round: u32, kind: EventKind) {
        self.events.push(CombatEvent {
            round,
            at: Utc::now(),
            kind,
        });
    }

    pub fn events(&self) -> &[CombatEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events for one round, in order
    pub fn round(&self, round: u32) -> impl Iterator<Item = &CombatEvent> {
        self.events.iter().filter(move |e| e.round == round)
    }

    pub fn into_events(self) -> Vec<CombatEvent> {
        self.events
    }
}
