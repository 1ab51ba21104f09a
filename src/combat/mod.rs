//! Combat engine
//!
//! Turn-based party-vs-monsters combat:
//! - Dice notation and damage mitigation
//! - Status effects, timed flags and weapon coatings
//! - Data-driven abilities resolved against a live roster
//! - Initiative queue with mid-round rebuilds
//! - Enemy and summon AI strategies
//! - `CombatSession`, the state machine that ties it together

pub mod abilities;
pub mod ai;
pub mod combatant;
pub mod damage;
pub mod dice;
pub mod effects;
pub mod log;
pub mod rules;
pub mod scheduler;
pub mod session;
pub mod state;

pub use abilities::{
    level_bonus, AbilityCategory, AbilityDefinition, AbilityError, Effect, EffectKind, EffectResult,
    EffectType, LevelRule, MetaAction, Restriction, TargetScope,
};
pub use ai::{Action, DecisionContext, Strategy};
pub use combatant::{Combatant, CombatantId, Faction, Resource, Roster, SummonBehavior, SummonState};
pub use damage::{apply_damage, mitigate, DamageOutcome, DamageType};
pub use dice::{DiceError, DiceExpr, DiceSpec, Magnitude};
pub use effects::{
    ActiveStatus, ApplyOutcome, BuffType, StatusEffectDefinition, StatusEffects, StatusLookup,
    StatusTag, TickEvent, TimedFlags, WeaponCoating,
};
pub use log::{CombatEvent, CombatLog, EventKind, SkipReason};
pub use rules::RulesConfig;
pub use scheduler::{Advance, SchedulerPhase, TurnQueue};
pub use session::{CombatError, CombatSession, PlayerAction, Step, SummonError, TurnReport};
pub use state::{EncounterState, FleeLoss};
